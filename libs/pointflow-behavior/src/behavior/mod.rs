//! Behavior chains
//!
//! Each relation carries an ordered chain of behaviors. The head is the
//! primary behavior owning trigger and select logic; the behaviors after it
//! only add capabilities (synchronized, interpolated, extrapolated,
//! required) that are folded over the whole chain.
//!
//! ```text
//!  notice ──▶ prepare_trigger (pass 1, 2, ..) ──▶ trigger ──▶ result stamps
//!  result ──▶ prepare_select  (pass 1, 2, ..) ──▶ select  ──▶ result inputs
//! ```

mod primary;
mod settings;
mod synchronized;
mod triggers;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::batch::{Batch, LookUpPass};
use crate::error::BehaviorError;
use crate::point::{Params, Relation};
use crate::value::{PointValue, ResultValue};

pub use settings::PrimarySettings;

pub const SELECT_SYNC_POSITION: &str = "SelectSyncPosition";
pub const SINCE_SYNC_POSITION: &str = "SinceSyncPosition";
pub const SINCE_RESULT_SYNC_POSITION: &str = "SinceResultSyncPosition";
pub const AFTER_RESULT_SYNC_POSITION: &str = "AfterResultSyncPosition";
pub const SELECT_PREVIOUS_VALUE: &str = "SelectPreviousValue";
pub const POLATOR_TIME_LIMIT: &str = "PolatorTimeLimit";

/// Outcome of a prepare step for one look-up pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prepared {
    /// No further pass needed
    Done,
    /// Another pass is needed once queued queries are resolved
    Pending,
}

impl Prepared {
    pub fn is_done(self) -> bool {
        self == Self::Done
    }

    fn done_if(done: bool) -> Self {
        if done {
            Self::Done
        } else {
            Self::Pending
        }
    }
}

/// Behavior policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorKind {
    AlwaysTriggers,
    NeverTriggers,
    TriggersNew,
    Retriggers,
    Synchronized,
    Interpolated,
    Extrapolated,
    Required,
}

impl BehaviorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlwaysTriggers => "AlwaysTriggers",
            Self::NeverTriggers => "NeverTriggers",
            Self::TriggersNew => "TriggersNew",
            Self::Retriggers => "Retriggers",
            Self::Synchronized => "Synchronized",
            Self::Interpolated => "Interpolated",
            Self::Extrapolated => "Extrapolated",
            Self::Required => "Required",
        }
    }

    /// May head a chain
    pub fn is_primary_capable(&self) -> bool {
        matches!(
            self,
            Self::AlwaysTriggers
                | Self::NeverTriggers
                | Self::TriggersNew
                | Self::Retriggers
                | Self::Synchronized
        )
    }

    /// May only head a chain
    pub fn is_primary_only(&self) -> bool {
        matches!(
            self,
            Self::AlwaysTriggers | Self::NeverTriggers | Self::TriggersNew | Self::Retriggers
        )
    }
}

impl fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BehaviorKind {
    type Err = BehaviorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let name = name.strip_suffix("Behavior").unwrap_or(name);
        match name.to_ascii_lowercase().as_str() {
            "alwaystriggers" | "always_triggers" => Ok(Self::AlwaysTriggers),
            "nevertriggers" | "never_triggers" => Ok(Self::NeverTriggers),
            "triggersnew" | "triggers_new" => Ok(Self::TriggersNew),
            "retriggers" => Ok(Self::Retriggers),
            "synchronized" => Ok(Self::Synchronized),
            "interpolated" => Ok(Self::Interpolated),
            "extrapolated" => Ok(Self::Extrapolated),
            "required" => Ok(Self::Required),
            _ => Err(BehaviorError::UnknownBehavior(s.to_string())),
        }
    }
}

/// One behavior in a chain
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorLink {
    pub kind: BehaviorKind,
    /// Added from the point's defaults rather than the relation itself
    pub inherited: bool,
    pub params: Params,
}

impl BehaviorLink {
    pub fn new(kind: BehaviorKind) -> Self {
        Self {
            kind,
            inherited: false,
            params: Params::default(),
        }
    }

    pub fn inherited(mut self) -> Self {
        self.inherited = true;
        self
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

/// Set-up behavior chain of one relation
#[derive(Debug, Clone)]
pub struct BehaviorChain {
    relation: Arc<Relation>,
    links: Vec<BehaviorLink>,
    settings: PrimarySettings,
}

impl BehaviorChain {
    pub fn relation(&self) -> &Arc<Relation> {
        &self.relation
    }

    pub fn links(&self) -> &[BehaviorLink] {
        &self.links
    }

    pub fn settings(&self) -> &PrimarySettings {
        &self.settings
    }

    pub fn primary_kind(&self) -> BehaviorKind {
        // set_up guarantees a primary-capable head
        self.links
            .first()
            .map_or(BehaviorKind::NeverTriggers, |link| link.kind)
    }

    pub fn input_point(&self) -> &Arc<str> {
        &self.relation.input.name
    }

    pub fn result_point(&self) -> &Arc<str> {
        &self.relation.result.name
    }

    fn has(&self, kind: BehaviorKind) -> bool {
        self.links.iter().any(|link| link.kind == kind)
    }

    pub fn is_synchronized(&self) -> bool {
        self.has(BehaviorKind::Synchronized)
    }

    pub fn is_input_interpolated(&self) -> bool {
        self.has(BehaviorKind::Interpolated)
    }

    pub fn is_input_extrapolated(&self) -> bool {
        self.has(BehaviorKind::Extrapolated)
    }

    pub fn is_input_required(&self) -> bool {
        self.has(BehaviorKind::Required)
    }

    /// The select phase also needs the existing result value
    pub fn is_result_fetched(&self) -> bool {
        match self.primary_kind() {
            BehaviorKind::AlwaysTriggers => !self.is_synchronized(),
            BehaviorKind::TriggersNew | BehaviorKind::Retriggers => true,
            _ => false,
        }
    }

    /// Every behavior in the chain accepts the input for the result
    pub fn is_input_valid(&self, input: &PointValue, result: &ResultValue) -> bool {
        self.links.iter().all(|link| match link.kind {
            BehaviorKind::Synchronized => self.synchronized_input_valid(input, result),
            _ => true,
        })
    }

    pub fn prepare_trigger<B: Batch + ?Sized>(
        &self,
        notice: &PointValue,
        batch: &mut B,
        pass: LookUpPass,
    ) -> Prepared {
        let synchronized = self.is_synchronized();
        match self.primary_kind() {
            BehaviorKind::AlwaysTriggers if !synchronized => {
                self.always_prepare_trigger(notice, batch, pass)
            },
            BehaviorKind::TriggersNew => self.triggers_new_prepare_trigger(notice, batch, pass),
            BehaviorKind::Retriggers if !synchronized => {
                self.retriggers_prepare_trigger(notice, batch, pass)
            },
            BehaviorKind::NeverTriggers => Prepared::Done,
            _ if synchronized => self.synchronized_prepare_trigger(notice, batch, pass),
            _ => Prepared::Done,
        }
    }

    pub fn trigger<B: Batch + ?Sized>(&self, notice: &PointValue, batch: &mut B) {
        let synchronized = self.is_synchronized();
        match self.primary_kind() {
            BehaviorKind::AlwaysTriggers if !synchronized => self.always_trigger(notice, batch),
            BehaviorKind::TriggersNew => self.triggers_new_trigger(notice, batch),
            BehaviorKind::Retriggers => self.retriggers_trigger(notice, batch),
            BehaviorKind::NeverTriggers => {},
            _ if synchronized => self.synchronized_trigger(notice, batch),
            _ => {},
        }
    }

    pub fn prepare_select<B: Batch + ?Sized>(
        &self,
        result: &ResultValue,
        batch: &mut B,
        pass: LookUpPass,
    ) -> Prepared {
        if self.is_synchronized() {
            self.synchronized_prepare_select(result, batch, pass)
        } else {
            self.primary_prepare_select(result, batch, pass)
        }
    }

    /// Add this relation's input to the result
    ///
    /// Returns `false` when a required input is missing.
    pub fn select<B: Batch + ?Sized>(&self, result: &mut ResultValue, batch: &B) -> bool {
        if self.is_synchronized() {
            self.synchronized_select(result, batch)
        } else {
            self.primary_select(result, batch)
        }
    }
}

impl fmt::Display for BehaviorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} [", self.input_point(), self.result_point())?;
        for (i, link) in self.links.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", link.kind)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests;
