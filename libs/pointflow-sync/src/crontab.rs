//! Five-field calendar schedule matcher
//!
//! ```text
//! ┌──────── minute        0-59
//! │ ┌────── hour          0-23
//! │ │ ┌──── day of month  1-31
//! │ │ │ ┌── month         1-12
//! │ │ │ │ ┌ day of week   0-7 (0 and 7 are Sunday)
//! * * * * *
//! ```
//!
//! Each field is a comma separated list of `N`, `N-M` or `*`, optionally
//! followed by `/step`. Missing trailing fields default to `*`. When both the
//! day of month and the day of week are restricted, a day matching either
//! one qualifies.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use regex::Regex;
use tracing::trace;

use crate::error::CrontabError;
use crate::zone::Zone;
use crate::Stamp;

/// Item syntax: `*`, `N` or `N-M`, with an optional `/step`
static ITEM: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\*+|(\d+)(?:-(\d+))?)(?:/(\d+))?$").ok());

/// Upper bound on settle iterations before giving up on a schedule
const MAX_ATTEMPTS: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Field {
    origin: i64,
    limit: i64,
    length: i64,
    wrap: bool,
}

const MINUTES: Field = Field {
    origin: 0,
    limit: 59,
    length: 60,
    wrap: false,
};
const HOURS: Field = Field {
    origin: 0,
    limit: 23,
    length: 24,
    wrap: false,
};
const DAYS: Field = Field {
    origin: 1,
    limit: 31,
    length: 31,
    wrap: false,
};
const MONTHS: Field = Field {
    origin: 1,
    limit: 12,
    length: 12,
    wrap: false,
};
const DAYS_OF_WEEK: Field = Field {
    origin: 0,
    limit: 7,
    length: 7,
    wrap: true,
};

/// Parsed crontab entry
///
/// Masks are bit sets where bit `i` stands for the field value `origin + i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crontab {
    entry: String,
    minutes: u64,
    hours: u64,
    days: u64,
    months: u64,
    days_of_week: u64,
}

impl Crontab {
    pub fn parse(text: &str) -> Result<Self, CrontabError> {
        let fields: Vec<&str> = text.split_whitespace().collect();
        if fields.len() > 5 {
            return Err(CrontabError::TooManyFields(fields.len()));
        }

        let field = |index: usize| fields.get(index).copied().unwrap_or("*");

        let mut crontab = Self {
            entry: text.to_string(),
            minutes: parse_field(field(0), MINUTES)?,
            hours: parse_field(field(1), HOURS)?,
            days: parse_field(field(2), DAYS)?,
            months: parse_field(field(3), MONTHS)?,
            days_of_week: parse_field(field(4), DAYS_OF_WEEK)?,
        };

        if is_wildcard(field(4)) {
            crontab.days_of_week = 0;
        } else if is_wildcard(field(2)) {
            crontab.days = 0;
        }

        trace!(
            "Crontab '{}': min={:016X} hour={:06X} day={:08X} month={:03X} dow={:02X}",
            crontab.entry,
            crontab.minutes,
            crontab.hours,
            crontab.days,
            crontab.months,
            crontab.days_of_week
        );

        Ok(crontab)
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn minutes(&self) -> u64 {
        self.minutes
    }

    pub fn hours(&self) -> u64 {
        self.hours
    }

    pub fn days(&self) -> u64 {
        self.days
    }

    pub fn months(&self) -> u64 {
        self.months
    }

    pub fn days_of_week(&self) -> u64 {
        self.days_of_week
    }

    /// Whether the calendar day qualifies
    ///
    /// Days past the end of a short month collapse onto its last day.
    pub fn is_day_set(&self, date: NaiveDate) -> bool {
        let day = date.day();
        if self.days & (1u64 << (day - 1)) != 0 {
            return true;
        }
        if self.days_of_week & (1u64 << date.weekday().num_days_from_sunday()) != 0 {
            return true;
        }

        day == days_in_month(date.year(), date.month()) && self.days >> day != 0
    }

    pub fn is_in_schedule(&self, stamp: Stamp, zone: Zone) -> bool {
        let local = zone.to_local(stamp);

        local.second() == 0
            && local.nanosecond() == 0
            && is_set(self.minutes, local.minute())
            && is_set(self.hours, local.hour())
            && is_set(self.months, local.month() - 1)
            && self.is_day_set(local.date())
    }

    /// Nearest schedule point strictly after (`forward`) or before the stamp
    ///
    /// Returns `None` when the calendar arithmetic leaves the representable
    /// range.
    pub fn change(&self, stamp: Stamp, zone: Zone, forward: bool) -> Option<Stamp> {
        let local = zone.to_local(stamp);
        let truncated = local.with_second(0)?.with_nanosecond(0)?;

        let mut pad = if forward {
            truncated.checked_add_signed(Duration::minutes(1))?
        } else if truncated == local {
            truncated.checked_sub_signed(Duration::minutes(1))?
        } else {
            truncated
        };

        for _ in 0..MAX_ATTEMPTS {
            pad = self.settle(pad, forward)?;

            if let Some(candidate) = zone.from_local(pad, forward) {
                let beyond = if forward {
                    candidate > stamp
                } else {
                    candidate < stamp
                };
                if beyond {
                    return Some(candidate);
                }
            }

            pad = step_minute(pad, forward)?;
        }

        None
    }

    /// Move the pad onto the nearest local time matching every mask
    fn settle(&self, mut pad: NaiveDateTime, forward: bool) -> Option<NaiveDateTime> {
        for _ in 0..MAX_ATTEMPTS {
            pad = if !is_set(self.months, pad.month() - 1) {
                self.change_month(pad, forward)?
            } else if !self.is_day_set(pad.date()) {
                self.change_day(pad, forward)?
            } else if !is_set(self.hours, pad.hour()) {
                self.change_hour(pad, forward)?
            } else if !is_set(self.minutes, pad.minute()) {
                self.change_minute(pad, forward)?
            } else {
                return Some(pad);
            };
        }

        None
    }

    fn change_month(&self, pad: NaiveDateTime, forward: bool) -> Option<NaiveDateTime> {
        let year = pad.year();
        let month = pad.month();

        if forward {
            match (month + 1..=12).find(|m| is_set(self.months, m - 1)) {
                Some(m) => at(year, m, 1, 0, 0),
                None => at(year.checked_add(1)?, 1, 1, 0, 0),
            }
        } else {
            match (1..month).rev().find(|m| is_set(self.months, m - 1)) {
                Some(m) => at(year, m, days_in_month(year, m), 23, 59),
                None => at(year.checked_sub(1)?, 12, 31, 23, 59),
            }
        }
    }

    fn change_day(&self, pad: NaiveDateTime, forward: bool) -> Option<NaiveDateTime> {
        let (year, month, day) = (pad.year(), pad.month(), pad.day());
        let qualifies = |d: u32| {
            NaiveDate::from_ymd_opt(year, month, d).is_some_and(|date| self.is_day_set(date))
        };

        if forward {
            match (day + 1..=days_in_month(year, month)).find(|&d| qualifies(d)) {
                Some(d) => at(year, month, d, 0, 0),
                None => {
                    let (y, m) = next_month(year, month)?;
                    at(y, m, 1, 0, 0)
                },
            }
        } else {
            match (1..day).rev().find(|&d| qualifies(d)) {
                Some(d) => at(year, month, d, 23, 59),
                None => {
                    let (y, m) = previous_month(year, month)?;
                    at(y, m, days_in_month(y, m), 23, 59)
                },
            }
        }
    }

    fn change_hour(&self, pad: NaiveDateTime, forward: bool) -> Option<NaiveDateTime> {
        let date = pad.date();
        let hour = pad.hour();

        if forward {
            match (hour + 1..24).find(|&h| is_set(self.hours, h)) {
                Some(h) => date.and_hms_opt(h, 0, 0),
                None => date.succ_opt()?.and_hms_opt(0, 0, 0),
            }
        } else {
            match (0..hour).rev().find(|&h| is_set(self.hours, h)) {
                Some(h) => date.and_hms_opt(h, 59, 0),
                None => date.pred_opt()?.and_hms_opt(23, 59, 0),
            }
        }
    }

    fn change_minute(&self, pad: NaiveDateTime, forward: bool) -> Option<NaiveDateTime> {
        let date = pad.date();
        let (hour, minute) = (pad.hour(), pad.minute());

        if forward {
            match (minute + 1..60).find(|&m| is_set(self.minutes, m)) {
                Some(m) => date.and_hms_opt(hour, m, 0),
                None => date
                    .and_hms_opt(hour, 0, 0)?
                    .checked_add_signed(Duration::hours(1)),
            }
        } else {
            match (0..minute).rev().find(|&m| is_set(self.minutes, m)) {
                Some(m) => date.and_hms_opt(hour, m, 0),
                None => date
                    .and_hms_opt(hour, 59, 0)?
                    .checked_sub_signed(Duration::hours(1)),
            }
        }
    }
}

fn parse_field(text: &str, field: Field) -> Result<u64, CrontabError> {
    let mut mask = 0u64;

    for item in text.split(',') {
        let item = if item.is_empty() { "*" } else { item };
        let bad = || CrontabError::bad_item(item);

        let regex = ITEM.as_ref().ok_or_else(bad)?;
        let captures = regex.captures(item).ok_or_else(bad)?;
        let number = |index: usize| -> Result<Option<i64>, CrontabError> {
            captures
                .get(index)
                .map(|m| m.as_str().parse::<i64>().map_err(|_| bad()))
                .transpose()
        };

        let step = number(4)?;
        let (mut begin, mut end) = match number(2)? {
            None => (field.origin, field.limit),
            Some(begin) => {
                let end = match (number(3)?, step) {
                    (Some(end), _) => end,
                    (None, Some(_)) => field.limit,
                    (None, None) => begin,
                };
                (begin, end)
            },
        };
        let step = step.unwrap_or(1);

        begin -= field.origin;
        end -= field.origin;
        if field.wrap && begin == field.length {
            begin = 0;
            if end == field.length {
                end = 0;
            }
        }

        if begin < 0
            || begin > end
            || end > field.length
            || (end == field.length && !field.wrap)
            || step <= 0
            || step >= field.length
        {
            return Err(bad());
        }

        let mut i = begin;
        while i <= end {
            let bit = if i < field.length { i } else { 0 };
            mask |= 1u64 << bit;
            i += step;
        }
    }

    Ok(mask)
}

fn is_wildcard(field: &str) -> bool {
    !field.is_empty() && field.bytes().all(|b| b == b'*')
}

fn is_set(mask: u64, index: u32) -> bool {
    mask & (1u64 << index) != 0
}

fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)
}

fn step_minute(pad: NaiveDateTime, forward: bool) -> Option<NaiveDateTime> {
    if forward {
        pad.checked_add_signed(Duration::minutes(1))
    } else {
        pad.checked_sub_signed(Duration::minutes(1))
    }
}

fn next_month(year: i32, month: u32) -> Option<(i32, u32)> {
    if month == 12 {
        Some((year.checked_add(1)?, 1))
    } else {
        Some((year, month + 1))
    }
}

fn previous_month(year: i32, month: u32) -> Option<(i32, u32)> {
    if month == 1 {
        Some((year.checked_sub(1)?, 12))
    } else {
        Some((year, month - 1))
    }
}

pub(crate) fn days_in_month(year: i32, month: u32) -> u32 {
    next_month(year, month)
        .and_then(|(y, m)| NaiveDate::from_ymd_opt(y, m, 1))
        .and_then(|first| first.pred_opt())
        .map_or(31, |last| last.day())
}

impl fmt::Display for Crontab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.entry)
    }
}

impl FromStr for Crontab {
    type Err = CrontabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
