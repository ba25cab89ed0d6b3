//! Serde sync definitions

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::crontab::Crontab;
use crate::error::{Result, SyncError};
use crate::sync::TimeSync;
use crate::zone::Zone;

/// Sync definition as found in configuration files
///
/// Exactly one of `crontab`, `elapsed` or `stamps` must be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crontab: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stamps: Option<Vec<DateTime<Utc>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl SyncConfig {
    pub fn crontab(entry: impl Into<String>) -> Self {
        Self {
            crontab: Some(entry.into()),
            ..Self::default()
        }
    }

    pub fn elapsed(elapsed: impl Into<String>) -> Self {
        Self {
            elapsed: Some(elapsed.into()),
            ..Self::default()
        }
    }

    pub fn build(&self) -> Result<TimeSync> {
        let sources = [
            self.crontab.is_some(),
            self.elapsed.is_some(),
            self.stamps.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count();
        if sources != 1 {
            return Err(SyncError::config(format!(
                "expected exactly one of crontab, elapsed or stamps, found {}",
                sources
            )));
        }
        if self.offset.is_some() && self.elapsed.is_none() {
            return Err(SyncError::config("offset is only valid with elapsed"));
        }

        let zone = match &self.time_zone {
            Some(text) => Zone::parse(text)?,
            None => Zone::default(),
        };

        let sync = if let Some(entry) = &self.crontab {
            TimeSync::crontab(Crontab::parse(entry)?)
        } else if let Some(elapsed) = &self.elapsed {
            let offset = self.offset.as_deref().map(parse_elapsed).transpose()?;
            TimeSync::elapsed(parse_elapsed(elapsed)?, offset)?
        } else {
            TimeSync::stamps(self.stamps.clone().unwrap_or_default())?
        };

        Ok(sync.with_zone(zone))
    }
}

/// Parse `500ms`, `15s`, `15m`, `1h`, `1d`, `HH:MM[:SS[.fff]]` or plain seconds
pub fn parse_elapsed(text: &str) -> Result<Duration> {
    let trimmed = text.trim();
    let invalid = || SyncError::invalid_elapsed(trimmed);

    if trimmed.contains(':') {
        return parse_clock(trimmed).ok_or_else(invalid);
    }

    let split = trimmed
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let number: f64 = number.trim().parse().map_err(|_| invalid())?;
    if !number.is_finite() || number < 0.0 {
        return Err(invalid());
    }

    let millis_per_unit = match unit.trim() {
        "ms" => 1.0,
        "" | "s" => 1_000.0,
        "m" | "min" => 60_000.0,
        "h" => 3_600_000.0,
        "d" => 86_400_000.0,
        _ => return Err(invalid()),
    };

    let millis = number * millis_per_unit;
    if millis > i64::MAX as f64 {
        return Err(invalid());
    }
    Duration::try_milliseconds(millis.round() as i64).ok_or_else(invalid)
}

fn parse_clock(text: &str) -> Option<Duration> {
    let mut parts = text.split(':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds: f64 = match parts.next() {
        Some(seconds) => seconds.parse().ok()?,
        None => 0.0,
    };
    if parts.next().is_some() || minutes > 59 || !(0.0..60.0).contains(&seconds) || hours < 0 {
        return None;
    }

    let millis = (hours * 3600 + minutes * 60) * 1000 + (seconds * 1000.0).round() as i64;
    Duration::try_milliseconds(millis)
}
