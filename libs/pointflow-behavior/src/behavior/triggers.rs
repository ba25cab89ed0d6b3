//! Trigger policies of the primary behaviors
//!
//! - AlwaysTriggers: a result at the notice stamp and every existing result
//!   up to the next notice.
//! - TriggersNew: a result at the notice stamp unless one already exists
//!   before a later notice.
//! - Retriggers: existing results only, up to the next notice or the
//!   since/after limit.

use pointflow_sync::{tick, Stamp, TimeInterval};

use super::{BehaviorChain, Prepared};
use crate::batch::{Batch, LookUpPass};
use crate::query::ValuesQuery;
use crate::value::PointValue;

/// Interval from `start` up to an optional exclusive end
fn window(start: Stamp, before: Option<Stamp>) -> TimeInterval {
    let interval = TimeInterval::unlimited().with_not_before(start);
    match before {
        Some(before) => interval.with_before(before),
        None => interval,
    }
}

impl BehaviorChain {
    fn next_notice<B: Batch + ?Sized>(&self, notice: &PointValue, batch: &B) -> Option<PointValue> {
        batch.get_point_value(&ValuesQuery::after(&notice.point, notice.stamp))
    }

    fn results_in<B: Batch + ?Sized>(&self, batch: &B, interval: TimeInterval) -> Vec<PointValue> {
        batch.get_point_values(&ValuesQuery::in_interval(self.result_point(), interval))
    }

    // AlwaysTriggers

    pub(super) fn always_prepare_trigger<B: Batch + ?Sized>(
        &self,
        notice: &PointValue,
        batch: &mut B,
        pass: LookUpPass,
    ) -> Prepared {
        match pass.number() {
            1 => {
                batch.add_store_values_query(
                    ValuesQuery::after(&notice.point, notice.stamp).with_rows(1),
                );
                Prepared::Pending
            },
            2 => {
                let next = self.next_notice(notice, batch).map(|next| next.stamp);
                batch.add_store_values_query(ValuesQuery::in_interval(
                    self.result_point(),
                    window(notice.stamp, next),
                ));
                Prepared::Done
            },
            _ => Prepared::Done,
        }
    }

    pub(super) fn always_trigger<B: Batch + ?Sized>(&self, notice: &PointValue, batch: &mut B) {
        let next = self.next_notice(notice, batch).map(|next| next.stamp);

        if self.in_result_sync(notice.stamp) {
            batch.set_up_result_value(notice, notice.stamp, self.result_point());
        }

        let interval = window(notice.stamp, next).with_after(notice.stamp);
        for result in self.results_in(batch, interval) {
            batch.set_up_result_value(notice, result.stamp, self.result_point());
        }
    }

    // TriggersNew

    pub(super) fn triggers_new_prepare_trigger<B: Batch + ?Sized>(
        &self,
        notice: &PointValue,
        batch: &mut B,
        pass: LookUpPass,
    ) -> Prepared {
        let result = self.result_point();
        if self.is_synchronized() {
            if pass == LookUpPass::FIRST && self.in_result_sync(notice.stamp) {
                batch.add_store_values_query(ValuesQuery::at(result, notice.stamp));
            }
            return Prepared::Done;
        }

        let existing = ValuesQuery::not_before(result, notice.stamp);
        match pass.number() {
            1 => {
                if batch.get_point_value(&existing).is_none() {
                    batch.add_store_values_query(existing.with_rows(1));
                }
                Prepared::Pending
            },
            2 => {
                if batch.get_point_value(&existing).is_some() {
                    batch.add_store_values_query(
                        ValuesQuery::after(&notice.point, notice.stamp).with_rows(1),
                    );
                }
                Prepared::Done
            },
            _ => Prepared::Done,
        }
    }

    pub(super) fn triggers_new_trigger<B: Batch + ?Sized>(
        &self,
        notice: &PointValue,
        batch: &mut B,
    ) {
        let result = self.result_point();

        if self.is_synchronized() {
            if self.in_result_sync(notice.stamp)
                && batch
                    .get_point_value(&ValuesQuery::at(result, notice.stamp))
                    .is_none()
            {
                batch.set_up_result_value(notice, notice.stamp, result);
            }
            return;
        }

        let query = ValuesQuery::not_before(result, notice.stamp);
        if let Some(existing) = batch.get_point_value(&query) {
            let next = self.next_notice(notice, batch);
            if next.is_some_and(|next| existing.stamp < next.stamp) {
                return;
            }
        }

        batch.set_up_result_value(notice, notice.stamp, result);
    }

    // Retriggers

    /// Exclusive end of the window a notice may retrigger
    pub fn trigger_limit(&self, notice: Stamp, next: Option<Stamp>) -> Option<Stamp> {
        let settings = &self.settings;
        let not_after = if let Some(since) = settings.since_sync_position {
            self.sync_stamp(since - 1, notice, true)
                .and_then(|stamp| stamp.checked_sub_signed(tick()))
        } else if let Some(since) = settings.since_result_sync_position {
            self.result_sync_stamp(since, notice, true)
        } else if let Some(after) = settings.after_result_sync_position {
            self.result_sync_stamp(after, notice, true)
                .and_then(|stamp| stamp.checked_add_signed(tick()))
        } else {
            None
        };

        match (not_after, next) {
            (Some(not_after), Some(next)) if not_after >= next => Some(next),
            (Some(not_after), _) => not_after.checked_add_signed(tick()).or(next),
            (None, next) => next,
        }
    }

    pub(super) fn retriggers_prepare_trigger<B: Batch + ?Sized>(
        &self,
        notice: &PointValue,
        batch: &mut B,
        pass: LookUpPass,
    ) -> Prepared {
        let result = self.result_point();
        let mut pass = pass.number();
        let mut notice = notice.clone();

        if self.settings.select_previous_value {
            pass = pass.saturating_sub(1);
            if pass == 0 {
                batch.add_store_values_query(
                    ValuesQuery::after(&notice.point, notice.stamp).with_rows(1),
                );
                return Prepared::Pending;
            }
            match self.next_notice(&notice, batch) {
                Some(next) => notice = next,
                None => return Prepared::Done,
            }
        }

        match pass {
            1 => {
                let limit = self.trigger_limit(notice.stamp, None);
                batch.add_store_values_query(
                    ValuesQuery::in_interval(
                        &notice.point,
                        window(notice.stamp, limit).with_after(notice.stamp),
                    )
                    .with_rows(1),
                );
                Prepared::done_if(notice.point == *result)
            },
            2 if notice.point != *result => {
                let next = self.next_notice(&notice, batch).map(|next| next.stamp);
                batch.add_store_values_query(ValuesQuery::in_interval(
                    result,
                    window(notice.stamp, self.trigger_limit(notice.stamp, next)),
                ));
                Prepared::Done
            },
            _ => Prepared::Done,
        }
    }

    pub(super) fn retriggers_trigger<B: Batch + ?Sized>(&self, notice: &PointValue, batch: &mut B) {
        let result = self.result_point();

        if self.is_synchronized() {
            if let Some(stamp) = self.synchronized_result_stamp(notice, batch) {
                if batch
                    .get_point_value(&ValuesQuery::at(result, stamp))
                    .is_some()
                {
                    batch.set_up_result_value(notice, stamp, result);
                }
            }
            return;
        }

        let notice = if self.settings.select_previous_value {
            match self.next_notice(notice, batch) {
                Some(next) => next,
                None => return,
            }
        } else {
            notice.clone()
        };

        if notice.point == *result {
            if let Some(next) = self.next_notice(&notice, batch) {
                batch.set_up_result_value(&notice, next.stamp, result);
            }
            return;
        }

        let next = self.next_notice(&notice, batch).map(|next| next.stamp);
        let interval = window(notice.stamp, self.trigger_limit(notice.stamp, next));
        for existing in self.results_in(batch, interval) {
            batch.set_up_result_value(&notice, existing.stamp, result);
        }
    }
}
