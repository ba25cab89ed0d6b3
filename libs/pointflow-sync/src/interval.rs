//! Time interval bounds

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{tick, Stamp};

/// Inclusive time interval with optional bounds
///
/// `after`/`before` are the exclusive views of the same bounds, one tick
/// outside the inclusive ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeInterval {
    not_before: Option<Stamp>,
    not_after: Option<Stamp>,
}

impl TimeInterval {
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Instant interval
    pub fn at(stamp: Stamp) -> Self {
        Self {
            not_before: Some(stamp),
            not_after: Some(stamp),
        }
    }

    pub fn with_not_before(mut self, stamp: Stamp) -> Self {
        self.not_before = Some(stamp);
        self
    }

    pub fn with_not_after(mut self, stamp: Stamp) -> Self {
        self.not_after = Some(stamp);
        self
    }

    /// Exclusive lower bound
    pub fn with_after(mut self, stamp: Stamp) -> Self {
        self.not_before = stamp.checked_add_signed(tick()).or(Some(stamp));
        self
    }

    /// Exclusive upper bound
    pub fn with_before(mut self, stamp: Stamp) -> Self {
        self.not_after = stamp.checked_sub_signed(tick()).or(Some(stamp));
        self
    }

    pub fn not_before(&self) -> Option<Stamp> {
        self.not_before
    }

    pub fn not_after(&self) -> Option<Stamp> {
        self.not_after
    }

    pub fn after(&self) -> Option<Stamp> {
        self.not_before
            .and_then(|stamp| stamp.checked_sub_signed(tick()))
    }

    pub fn before(&self) -> Option<Stamp> {
        self.not_after
            .and_then(|stamp| stamp.checked_add_signed(tick()))
    }

    pub fn contains(&self, stamp: Stamp) -> bool {
        self.not_before.map_or(true, |bound| stamp >= bound)
            && self.not_after.map_or(true, |bound| stamp <= bound)
    }

    pub fn is_instant(&self) -> bool {
        matches!((self.not_before, self.not_after), (Some(a), Some(b)) if a == b)
    }

    /// The whole interval lies after the stamp
    pub fn starts_after(&self, stamp: Stamp) -> bool {
        self.not_before.is_some_and(|bound| bound > stamp)
    }

    /// The whole interval lies before the stamp
    pub fn ends_before(&self, stamp: Stamp) -> bool {
        self.not_after.is_some_and(|bound| bound < stamp)
    }

    pub fn is_unlimited(&self) -> bool {
        self.not_before.is_none() && self.not_after.is_none()
    }

    pub fn is_bounded(&self) -> bool {
        self.not_before.is_some() && self.not_after.is_some()
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_instant() {
            if let Some(stamp) = self.not_before {
                return write!(f, "[{}]", stamp.to_rfc3339());
            }
        }

        match self.not_before {
            Some(stamp) => write!(f, "[{}", stamp.to_rfc3339())?,
            None => write!(f, "(-inf")?,
        }
        match self.not_after {
            Some(stamp) => write!(f, ", {}]", stamp.to_rfc3339()),
            None => write!(f, ", +inf)"),
        }
    }
}
