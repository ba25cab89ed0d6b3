//! Bidirectional schedule cursor
//!
//! A `TimeSync` pairs a schedule definition with a cursor. The cursor is
//! mutable state, so evaluation paths that run independently each work on
//! their own copy (see [`TimeSync::copy`]).

use std::sync::Arc;

use chrono::Duration;
use tracing::trace;

use crate::crontab::Crontab;
use crate::error::{Result, SyncError};
use crate::interval::TimeInterval;
use crate::iter::SyncIter;
use crate::zone::Zone;
use crate::{tick, Stamp};

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// Fixed elapsed-time grid, aligned on the epoch plus an optional offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElapsedSchedule {
    elapsed: Duration,
    offset: Option<Duration>,
}

impl ElapsedSchedule {
    pub fn new(elapsed: Duration, offset: Option<Duration>) -> Result<Self> {
        if elapsed < Duration::milliseconds(1) {
            return Err(SyncError::invalid_elapsed(format!(
                "{} is below the 1ms minimum",
                elapsed
            )));
        }
        if let Some(offset) = offset {
            if offset < Duration::zero() || offset >= elapsed {
                return Err(SyncError::OffsetTooLarge {
                    offset: offset.to_string(),
                    elapsed: elapsed.to_string(),
                });
            }
        }

        Ok(Self { elapsed, offset })
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn offset(&self) -> Option<Duration> {
        self.offset
    }

    fn period(&self) -> i128 {
        duration_nanos(self.elapsed)
    }

    fn origin(&self) -> i128 {
        self.offset.map_or(0, duration_nanos)
    }

    /// Floor onto the global grid
    fn grid_floor(&self, stamp: i128) -> i128 {
        let period = self.period();
        let origin = self.origin();
        (stamp - origin).div_euclid(period) * period + origin
    }

    fn grid_ceil(&self, stamp: i128) -> i128 {
        let floor = self.grid_floor(stamp);
        if floor == stamp {
            floor
        } else {
            floor + self.period()
        }
    }

    fn floor(&self, stamp: i128, limits: &TimeInterval) -> i128 {
        let period = self.period();
        match (limits.not_before(), limits.not_after()) {
            (None, None) => self.grid_floor(stamp),
            (None, Some(end)) => {
                let rest = (stamp_nanos(end) - stamp).rem_euclid(period);
                if rest == 0 {
                    stamp
                } else {
                    stamp - (period - rest)
                }
            },
            (Some(begin), _) => stamp - (stamp - stamp_nanos(begin)).rem_euclid(period),
        }
    }

    fn next(&self, stamp: Stamp, limits: &TimeInterval) -> Option<Stamp> {
        if limits.starts_after(stamp) {
            return limits.not_before();
        }
        let current = stamp_nanos(stamp);
        nanos_stamp(self.floor(current, limits) + self.period())
    }

    fn previous(&self, stamp: Stamp, limits: &TimeInterval) -> Option<Stamp> {
        if let Some(end) = limits.not_after().filter(|end| *end < stamp) {
            let end = stamp_nanos(end);
            return nanos_stamp(self.floor(end, limits));
        }
        let current = stamp_nanos(stamp);
        let floor = self.floor(current, limits);
        if floor == current {
            nanos_stamp(floor - self.period())
        } else {
            nanos_stamp(floor)
        }
    }

    fn is_in_sync(&self, stamp: Stamp, limits: &TimeInterval) -> bool {
        let current = stamp_nanos(stamp);
        self.floor(current, limits) == current
    }

    /// Bounds moved inward onto the grid
    fn trim(&self, limits: TimeInterval) -> TimeInterval {
        let mut trimmed = TimeInterval::unlimited();
        if let Some(begin) = limits
            .not_before()
            .and_then(|begin| nanos_stamp(self.grid_ceil(stamp_nanos(begin))))
        {
            trimmed = trimmed.with_not_before(begin);
        }
        if let Some(end) = limits
            .not_after()
            .and_then(|end| nanos_stamp(self.grid_floor(stamp_nanos(end))))
        {
            trimmed = trimmed.with_not_after(end);
        }
        trimmed
    }
}

/// Schedule definitions shared by every copy of a sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    Crontab(Arc<Crontab>),
    Elapsed(ElapsedSchedule),
    /// Sorted and deduplicated
    Stamps(Arc<[Stamp]>),
    /// Never in sync
    Null,
}

/// Schedule cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSync {
    schedule: Schedule,
    zone: Zone,
    limits: TimeInterval,
    current: Option<Stamp>,
    backup: Option<Stamp>,
    reversed: bool,
}

impl TimeSync {
    fn with_schedule(schedule: Schedule) -> Self {
        let mut sync = Self {
            schedule,
            zone: Zone::default(),
            limits: TimeInterval::unlimited(),
            current: None,
            backup: None,
            reversed: false,
        };
        sync.limits = sync.default_limits();
        sync
    }

    pub fn crontab(crontab: Crontab) -> Self {
        Self::with_schedule(Schedule::Crontab(Arc::new(crontab)))
    }

    pub fn elapsed(elapsed: Duration, offset: Option<Duration>) -> Result<Self> {
        Ok(Self::with_schedule(Schedule::Elapsed(ElapsedSchedule::new(
            elapsed, offset,
        )?)))
    }

    pub fn stamps(mut stamps: Vec<Stamp>) -> Result<Self> {
        if stamps.is_empty() {
            return Err(SyncError::EmptyStamps);
        }
        stamps.sort_unstable();
        stamps.dedup();
        Ok(Self::with_schedule(Schedule::Stamps(stamps.into())))
    }

    pub fn null() -> Self {
        Self::with_schedule(Schedule::Null)
    }

    pub fn with_zone(mut self, zone: Zone) -> Self {
        self.zone = zone;
        self
    }

    /// Same sync with next/previous and first/last swapped
    pub fn reversed(mut self) -> Self {
        self.reversed = !self.reversed;
        self
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Clone sharing the schedule with the cursor reset
    pub fn copy(&self) -> Self {
        Self {
            current: None,
            backup: None,
            ..self.clone()
        }
    }

    pub fn default_limits(&self) -> TimeInterval {
        match &self.schedule {
            Schedule::Stamps(stamps) => match (stamps.first(), stamps.last()) {
                (Some(first), Some(last)) => TimeInterval::unlimited()
                    .with_not_before(*first)
                    .with_not_after(*last),
                _ => TimeInterval::unlimited(),
            },
            _ => TimeInterval::unlimited(),
        }
    }

    pub fn limits(&self) -> TimeInterval {
        self.limits
    }

    pub fn set_limits(&mut self, limits: TimeInterval) {
        self.limits = match &self.schedule {
            Schedule::Elapsed(elapsed) => elapsed.trim(limits),
            _ => limits,
        };
    }

    pub fn is_bounded(&self) -> bool {
        self.limits.is_bounded()
    }

    /// Reposition the cursor, remembering the previous position
    pub fn seed(&mut self, stamp: Stamp) {
        self.backup = self.current;
        self.current = Some(stamp);
    }

    pub fn current_stamp(&self) -> Option<Stamp> {
        self.current
    }

    pub fn is_in_sync(&self) -> bool {
        let Some(current) = self.current else {
            return false;
        };

        match &self.schedule {
            Schedule::Crontab(crontab) => crontab.is_in_schedule(current, self.zone),
            Schedule::Elapsed(elapsed) => elapsed.is_in_sync(current, &self.limits),
            Schedule::Stamps(stamps) => stamps.binary_search(&current).is_ok(),
            Schedule::Null => false,
        }
    }

    pub fn is_in_sync_at(&mut self, stamp: Stamp) -> bool {
        self.seed(stamp);
        self.is_in_sync()
    }

    pub fn next_stamp(&mut self) -> Option<Stamp> {
        self.advance(!self.reversed)
    }

    pub fn previous_stamp(&mut self) -> Option<Stamp> {
        self.advance(self.reversed)
    }

    pub fn next_after(&mut self, stamp: Stamp) -> Option<Stamp> {
        self.seed(stamp);
        self.next_stamp()
    }

    pub fn previous_before(&mut self, stamp: Stamp) -> Option<Stamp> {
        self.seed(stamp);
        self.previous_stamp()
    }

    pub fn next_stamp_by(&mut self, intervals: usize) -> Option<Stamp> {
        self.repeat(intervals, !self.reversed)
    }

    pub fn previous_stamp_by(&mut self, intervals: usize) -> Option<Stamp> {
        self.repeat(intervals, self.reversed)
    }

    pub fn next_after_by(&mut self, stamp: Stamp, intervals: usize) -> Option<Stamp> {
        self.seed(stamp);
        self.next_stamp_by(intervals)
    }

    pub fn previous_before_by(&mut self, stamp: Stamp, intervals: usize) -> Option<Stamp> {
        self.seed(stamp);
        self.previous_stamp_by(intervals)
    }

    /// First stamp inside the limits, `None` without a starting bound
    pub fn first_stamp(&self) -> Option<Stamp> {
        if self.reversed {
            self.bound_stamp(false)
        } else {
            self.bound_stamp(true)
        }
    }

    /// Last stamp inside the limits, `None` without an ending bound
    pub fn last_stamp(&self) -> Option<Stamp> {
        if self.reversed {
            self.bound_stamp(true)
        } else {
            self.bound_stamp(false)
        }
    }

    /// Iterate from the current stamp, or from the start when unseeded
    pub fn iter(&self) -> SyncIter {
        SyncIter::new(self.copy(), self.current)
    }

    pub fn iter_from(&self, stamp: Stamp) -> SyncIter {
        SyncIter::new(self.copy(), Some(stamp))
    }

    pub fn reverse_iter(&self) -> SyncIter {
        SyncIter::new(self.copy().reversed(), self.current)
    }

    pub fn reverse_iter_from(&self, stamp: Stamp) -> SyncIter {
        SyncIter::new(self.copy().reversed(), Some(stamp))
    }

    fn bound_stamp(&self, first: bool) -> Option<Stamp> {
        let bound = if first {
            self.limits.not_before()?
        } else {
            self.limits.not_after()?
        };

        let mut probe = self.copy();
        if probe.is_in_sync_at(bound) {
            Some(bound)
        } else {
            probe.advance(first)
        }
    }

    fn repeat(&mut self, intervals: usize, forward: bool) -> Option<Stamp> {
        let saved = (self.current, self.backup);
        let mut stamp = self.current;

        for _ in 0..intervals {
            match self.advance(forward) {
                Some(next) => stamp = Some(next),
                None => {
                    (self.current, self.backup) = saved;
                    return None;
                },
            }
        }

        stamp
    }

    /// Step one schedule unit in the absolute direction
    ///
    /// The cursor only moves when the step stays inside the limits.
    fn advance(&mut self, forward: bool) -> Option<Stamp> {
        let current = self.current?;
        let candidate = if forward {
            self.raw_next(current)
        } else {
            self.raw_previous(current)
        };

        let candidate = candidate.filter(|stamp| {
            if forward {
                !self.limits.ends_before(*stamp)
            } else {
                !self.limits.starts_after(*stamp)
            }
        });

        match candidate {
            Some(stamp) => {
                self.backup = self.current;
                self.current = Some(stamp);
                Some(stamp)
            },
            None => {
                trace!(
                    "No {} stamp from {} within {}",
                    if forward { "next" } else { "previous" },
                    current.to_rfc3339(),
                    self.limits
                );
                None
            },
        }
    }

    fn raw_next(&self, current: Stamp) -> Option<Stamp> {
        if let Schedule::Elapsed(elapsed) = &self.schedule {
            return elapsed.next(current, &self.limits);
        }

        let start = match self.limits.not_before() {
            Some(begin) if begin > current => begin.checked_sub_signed(tick())?,
            _ => current,
        };

        match &self.schedule {
            Schedule::Crontab(crontab) => crontab.change(start, self.zone, true),
            Schedule::Stamps(stamps) => {
                let index = match stamps.binary_search(&start) {
                    Ok(index) => index + 1,
                    Err(index) => index,
                };
                stamps.get(index).copied()
            },
            Schedule::Null => Some(Stamp::MAX_UTC),
            Schedule::Elapsed(_) => None,
        }
    }

    fn raw_previous(&self, current: Stamp) -> Option<Stamp> {
        if let Schedule::Elapsed(elapsed) = &self.schedule {
            return elapsed.previous(current, &self.limits);
        }

        let start = match self.limits.not_after() {
            Some(end) if end < current => end.checked_add_signed(tick())?,
            _ => current,
        };

        match &self.schedule {
            Schedule::Crontab(crontab) => crontab.change(start, self.zone, false),
            Schedule::Stamps(stamps) => {
                let index = match stamps.binary_search(&start) {
                    Ok(index) | Err(index) => index,
                };
                index.checked_sub(1).and_then(|i| stamps.get(i)).copied()
            },
            Schedule::Null => Some(Stamp::MIN_UTC),
            Schedule::Elapsed(_) => None,
        }
    }
}

fn duration_nanos(duration: Duration) -> i128 {
    i128::from(duration.num_seconds()) * NANOS_PER_SECOND + i128::from(duration.subsec_nanos())
}

fn stamp_nanos(stamp: Stamp) -> i128 {
    i128::from(stamp.timestamp()) * NANOS_PER_SECOND + i128::from(stamp.timestamp_subsec_nanos())
}

fn nanos_stamp(nanos: i128) -> Option<Stamp> {
    let seconds = i64::try_from(nanos.div_euclid(NANOS_PER_SECOND)).ok()?;
    let subsec = u32::try_from(nanos.rem_euclid(NANOS_PER_SECOND)).ok()?;
    Stamp::from_timestamp(seconds, subsec)
}
