//! Position arithmetic and input selection shared by primary behaviors

use pointflow_sync::{Stamp, TimeInterval, TimeSync};
use tracing::debug;

use super::{BehaviorChain, Prepared};
use crate::batch::{Batch, LookUpPass};
use crate::query::ValuesQuery;
use crate::value::{PointValue, ResultValue};

/// Step a seeded sync copy; `None` once the sync runs out of stamps
fn step(mut sync: TimeSync, stamp: Stamp, steps: u64, forward: bool) -> Option<Stamp> {
    let mut stamp = stamp;
    for _ in 0..steps {
        let next = if forward {
            sync.next_stamp()
        } else {
            sync.previous_stamp()
        };
        stamp = next?;
    }
    Some(stamp)
}

impl BehaviorChain {
    /// Input sync stamp `position` steps from `start`
    ///
    /// A start off the sync grid consumes one extra step to land on it.
    /// Without a sync the start is returned unchanged; `None` when the
    /// sync limits are passed first.
    pub fn sync_stamp(&self, position: i64, start: Stamp, forward: bool) -> Option<Stamp> {
        let Some(sync) = &self.settings.sync else {
            return Some(start);
        };
        let mut sync = sync.copy();
        let mut position = position;
        if !sync.is_in_sync_at(start) {
            position -= 1;
        }
        step(sync, start, position.unsigned_abs(), forward)
    }

    /// Result sync stamp `position` steps from `start`
    pub fn result_sync_stamp(&self, position: i64, start: Stamp, forward: bool) -> Option<Stamp> {
        let mut sync = self.settings.result_sync.as_ref()?.copy();
        sync.seed(start);
        step(sync, start, position.unsigned_abs(), forward)
    }

    /// Interval in which the input value for a result is searched
    ///
    /// `None` when a sync position falls outside the input sync limits.
    pub fn select_interval(&self, result_stamp: Stamp) -> Option<TimeInterval> {
        let settings = &self.settings;
        if settings.has_select_sync_position() {
            return self
                .sync_stamp(settings.select_sync_position, result_stamp, false)
                .map(TimeInterval::at);
        }

        let mut interval = if self.relation.is_loop()
            && settings.since_result_sync_position.map_or(true, |p| p == 0)
        {
            TimeInterval::unlimited().with_before(result_stamp)
        } else {
            TimeInterval::unlimited().with_not_after(result_stamp)
        };

        if let Some(since) = settings.since_sync_position {
            interval = interval.with_not_before(self.sync_stamp(since, result_stamp, false)?);
        } else if let Some(since) = settings.since_result_sync_position {
            if let Some(stamp) = self.result_sync_stamp(since, result_stamp, false) {
                interval = interval.with_not_before(stamp);
            }
        } else if let Some(after) = settings.after_result_sync_position {
            if let Some(stamp) = self.result_sync_stamp(after, result_stamp, false) {
                interval = interval.with_after(stamp);
            }
        }

        Some(interval)
    }

    fn input_before<B: Batch + ?Sized>(&self, batch: &B, stamp: Stamp) -> Option<PointValue> {
        batch.get_point_value(
            &ValuesQuery::before(self.input_point(), stamp)
                .with_sync(self.settings.input_sync.clone()),
        )
    }

    pub(super) fn primary_prepare_select<B: Batch + ?Sized>(
        &self,
        result: &ResultValue,
        batch: &mut B,
        pass: LookUpPass,
    ) -> Prepared {
        let Some(interval) = self.select_interval(result.stamp) else {
            return Prepared::Done;
        };
        let input = self.input_point();

        match pass.number() {
            1 => {
                let cached = interval.not_after().and_then(|stamp| {
                    batch.get_point_value(&ValuesQuery::at(input, stamp))
                });
                if cached.is_none() {
                    batch.add_store_values_query(
                        ValuesQuery::in_interval(input, interval)
                            .reversed()
                            .with_rows(1)
                            .with_sync(self.settings.input_sync.clone()),
                    );
                }
                Prepared::done_if(!self.settings.select_previous_value)
            },
            2 if self.settings.select_previous_value => {
                let value = interval
                    .before()
                    .and_then(|before| self.input_before(batch, before));
                if let Some(value) = value {
                    if interval.not_before().map_or(true, |bound| value.stamp > bound) {
                        batch.add_store_values_query(
                            ValuesQuery::before(input, value.stamp)
                                .with_rows(1)
                                .with_sync(self.settings.input_sync.clone()),
                        );
                    }
                }
                Prepared::Done
            },
            _ => Prepared::Done,
        }
    }

    pub(super) fn primary_select<B: Batch + ?Sized>(
        &self,
        result: &mut ResultValue,
        batch: &B,
    ) -> bool {
        let Some(interval) = self.select_interval(result.stamp) else {
            return self.add_input_to_result(None, result);
        };
        let mut input = interval
            .before()
            .and_then(|before| self.input_before(batch, before));

        if self.settings.select_previous_value {
            input = input.and_then(|value| self.input_before(batch, value.stamp));
        }
        if let (Some(value), Some(after)) = (&input, interval.after()) {
            if value.stamp <= after {
                input = None;
            }
        }

        self.add_input_to_result(input, result)
    }

    /// Returns `false` when a required input is missing
    pub(super) fn add_input_to_result(
        &self,
        input: Option<PointValue>,
        result: &mut ResultValue,
    ) -> bool {
        let input = input.filter(|value| {
            let valid = self.is_input_valid(value, result);
            if !valid {
                debug!("Invalid input {} dropped for {}", value, result);
            }
            valid
        });

        if input.is_none() && self.is_input_required() {
            debug!("Required input {} missing for {}", self.input_point(), result);
            return false;
        }

        result.add_input(input);
        true
    }
}
