//! Synchronized behavior: inputs and results meet on the sync grid

use pointflow_sync::Stamp;

use super::{BehaviorChain, Prepared};
use crate::batch::{Batch, LookUpPass};
use crate::query::ValuesQuery;
use crate::value::{PointValue, ResultValue};

impl BehaviorChain {
    /// Result sync is absent or has the stamp on its grid
    pub(super) fn in_result_sync(&self, stamp: Stamp) -> bool {
        self.settings
            .result_sync
            .as_ref()
            .map_or(true, |sync| sync.copy().is_in_sync_at(stamp))
    }

    /// Next result sync stamp, or the stamp itself without a result sync
    fn next_result_stamp(&self, stamp: Stamp) -> Stamp {
        self.settings
            .result_sync
            .as_ref()
            .and_then(|sync| sync.copy().next_after(stamp))
            .unwrap_or(stamp)
    }

    /// Input stamp selected for a result stamp
    fn synchronized_input_stamp(&self, result_stamp: Stamp) -> Option<Stamp> {
        let mut stamp = result_stamp;
        if let (Some(_), Some(sync)) = (&self.settings.result_sync, &self.settings.sync) {
            let mut sync = sync.copy();
            if !sync.is_in_sync_at(stamp) {
                stamp = sync.previous_stamp().unwrap_or(stamp);
            }
        }
        self.sync_stamp(self.settings.select_sync_position, stamp, false)
    }

    fn synchronized_input_query(&self, stamp: Stamp) -> ValuesQuery {
        ValuesQuery::at(self.input_point(), stamp).with_polation(
            self.is_input_interpolated(),
            self.is_input_extrapolated(),
            self.settings.polator_time_limit,
        )
    }

    pub(super) fn synchronized_input_valid(
        &self,
        input: &PointValue,
        result: &ResultValue,
    ) -> bool {
        let Some(stamp) = self.sync_stamp(self.settings.select_sync_position, input.stamp, true)
        else {
            return false;
        };
        let stamp = if self.in_result_sync(stamp) {
            stamp
        } else {
            self.next_result_stamp(stamp)
        };
        stamp == result.stamp
    }

    /// Result stamp a notice synchronizes to, if a computation is due there
    pub fn synchronized_result_stamp<B: Batch + ?Sized>(
        &self,
        notice: &PointValue,
        batch: &B,
    ) -> Option<Stamp> {
        let stamp = self.sync_stamp(self.settings.select_sync_position, notice.stamp, true)?;

        if self.in_result_sync(stamp) {
            if stamp != notice.stamp
                && batch
                    .get_point_value(&ValuesQuery::at(self.input_point(), stamp))
                    .is_none()
                && batch
                    .get_point_value(&ValuesQuery::at(self.result_point(), stamp))
                    .is_none()
            {
                return None;
            }
            Some(stamp)
        } else {
            let stamp = self.next_result_stamp(stamp);
            batch
                .get_point_value(&ValuesQuery::at(self.result_point(), stamp))
                .map(|_| stamp)
        }
    }

    pub(super) fn synchronized_prepare_trigger<B: Batch + ?Sized>(
        &self,
        notice: &PointValue,
        batch: &mut B,
        pass: LookUpPass,
    ) -> Prepared {
        if pass != LookUpPass::FIRST {
            return Prepared::Done;
        }

        let Some(stamp) = self.sync_stamp(self.settings.select_sync_position, notice.stamp, true)
        else {
            return Prepared::Done;
        };
        let in_sync = self.in_result_sync(stamp);
        let stamp = if in_sync {
            stamp
        } else {
            self.next_result_stamp(stamp)
        };

        batch.add_store_values_query(ValuesQuery::at(self.result_point(), stamp));
        if in_sync && stamp != notice.stamp {
            batch.add_store_values_query(ValuesQuery::at(self.input_point(), stamp));
        }
        Prepared::Done
    }

    pub(super) fn synchronized_trigger<B: Batch + ?Sized>(
        &self,
        notice: &PointValue,
        batch: &mut B,
    ) {
        if let Some(stamp) = self.synchronized_result_stamp(notice, batch) {
            batch.set_up_result_value(notice, stamp, self.result_point());
        }
    }

    pub(super) fn synchronized_prepare_select<B: Batch + ?Sized>(
        &self,
        result: &ResultValue,
        batch: &mut B,
        pass: LookUpPass,
    ) -> Prepared {
        if pass != LookUpPass::FIRST {
            return Prepared::Done;
        }

        let Some(stamp) = self.synchronized_input_stamp(result.stamp) else {
            return Prepared::Done;
        };
        if batch
            .get_point_value(&ValuesQuery::at(self.input_point(), stamp))
            .is_none()
        {
            batch.add_store_values_query(self.synchronized_input_query(stamp));
        }
        Prepared::Done
    }

    pub(super) fn synchronized_select<B: Batch + ?Sized>(
        &self,
        result: &mut ResultValue,
        batch: &B,
    ) -> bool {
        let input = self
            .synchronized_input_stamp(result.stamp)
            .and_then(|stamp| batch.get_point_value(&self.synchronized_input_query(stamp)));
        self.add_input_to_result(input, result)
    }
}
