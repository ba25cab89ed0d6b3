//! Time zones used to decompose stamps into calendar fields

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::Stamp;

/// Zone in which calendar schedules are evaluated
///
/// Only UTC, the host local zone and fixed offsets are supported; named
/// zones would need a tz database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Zone {
    #[default]
    Utc,
    Local,
    Fixed(FixedOffset),
}

impl Zone {
    /// Parse `UTC`, `Z`, `GMT`, `Local`, `+05:30`, `-0800` or `+02`
    pub fn parse(text: &str) -> Result<Self, SyncError> {
        let trimmed = text.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "UTC" | "Z" | "GMT" => return Ok(Self::Utc),
            "LOCAL" => return Ok(Self::Local),
            _ => {},
        }

        parse_offset(trimmed)
            .map(Self::Fixed)
            .ok_or_else(|| SyncError::UnknownTimeZone(trimmed.to_string()))
    }

    /// Local calendar representation of a stamp
    pub fn to_local(&self, stamp: Stamp) -> NaiveDateTime {
        match self {
            Self::Utc => stamp.naive_utc(),
            Self::Local => stamp.with_timezone(&chrono::Local).naive_local(),
            Self::Fixed(offset) => stamp.with_timezone(offset).naive_local(),
        }
    }

    /// Instant for a local calendar time
    ///
    /// Ambiguous local times resolve to the earliest instant when `earliest`
    /// is set and to the latest otherwise; local times inside a gap are `None`.
    pub fn from_local(&self, local: NaiveDateTime, earliest: bool) -> Option<Stamp> {
        match self {
            Self::Utc => Some(chrono::Utc.from_utc_datetime(&local)),
            Self::Local => {
                let mapped = chrono::Local.from_local_datetime(&local);
                let picked = if earliest {
                    mapped.earliest()
                } else {
                    mapped.latest()
                };
                picked.map(|stamp| stamp.with_timezone(&chrono::Utc))
            },
            Self::Fixed(offset) => offset
                .from_local_datetime(&local)
                .single()
                .map(|stamp: DateTime<FixedOffset>| stamp.with_timezone(&chrono::Utc)),
        }
    }
}

fn parse_offset(text: &str) -> Option<FixedOffset> {
    let (sign, digits) = match text.as_bytes().first()? {
        b'+' => (1, &text[1..]),
        b'-' => (-1, &text[1..]),
        _ => return None,
    };

    let (hours, minutes) = if let Some((h, m)) = digits.split_once(':') {
        (h, m)
    } else if digits.len() == 4 {
        digits.split_at(2)
    } else {
        (digits, "0")
    };

    if hours.is_empty() || hours.len() > 2 || !hours.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utc => write!(f, "UTC"),
            Self::Local => write!(f, "Local"),
            Self::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

impl FromStr for Zone {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Zone {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Zone> for String {
    fn from(zone: Zone) -> Self {
        zone.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    #[test]
    fn test_parse_named_zones() {
        assert_eq!(Zone::parse("UTC").unwrap(), Zone::Utc);
        assert_eq!(Zone::parse(" z ").unwrap(), Zone::Utc);
        assert_eq!(Zone::parse("local").unwrap(), Zone::Local);
    }

    #[test]
    fn test_parse_offsets() {
        let east = Zone::parse("+05:30").unwrap();
        assert_eq!(east, Zone::Fixed(FixedOffset::east_opt(5 * 3600 + 1800).unwrap()));

        let west = Zone::parse("-0800").unwrap();
        assert_eq!(west, Zone::Fixed(FixedOffset::west_opt(8 * 3600).unwrap()));

        assert_eq!(
            Zone::parse("+02").unwrap(),
            Zone::Fixed(FixedOffset::east_opt(7200).unwrap())
        );
    }

    #[test]
    fn test_parse_unknown_zone() {
        let err = Zone::parse("Mars/Olympus").unwrap_err();
        assert_eq!(err, SyncError::UnknownTimeZone("Mars/Olympus".to_string()));
        assert!(Zone::parse("+25:00").is_err());
    }

    #[test]
    fn test_local_round_trip_fixed_offset() {
        let zone = Zone::parse("-05:00").unwrap();
        let stamp = chrono::Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let local = zone.to_local(stamp);
        assert_eq!(local.hour(), 7);
        assert_eq!(zone.from_local(local, true), Some(stamp));
    }

    #[test]
    fn test_serde_as_string() {
        let zone: Zone = serde_yaml::from_str("\"+01:00\"").unwrap();
        assert_eq!(zone.to_string(), "+01:00");

        let local = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(1, 0, 0)
            .unwrap();
        assert_eq!(
            zone.from_local(local, true),
            Some(chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
    }
}
