//! Point value queries shared by batch lookups and store requests

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use chrono::Duration;
use pointflow_sync::{Stamp, TimeInterval, TimeSync};

use crate::polator;
use crate::value::PointValue;

/// Values of one point within an interval
///
/// `reverse` returns the newest values first. `rows` caps the number of
/// values a store returns; batch lookups ignore it.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuesQuery {
    pub point: Arc<str>,
    pub interval: TimeInterval,
    pub reverse: bool,
    pub rows: Option<usize>,
    pub sync: Option<TimeSync>,
    pub interpolated: bool,
    pub extrapolated: bool,
    pub polator_time_limit: Option<Duration>,
}

impl ValuesQuery {
    pub fn in_interval(point: &Arc<str>, interval: TimeInterval) -> Self {
        Self {
            point: Arc::clone(point),
            interval,
            reverse: false,
            rows: None,
            sync: None,
            interpolated: false,
            extrapolated: false,
            polator_time_limit: None,
        }
    }

    pub fn at(point: &Arc<str>, stamp: Stamp) -> Self {
        Self::in_interval(point, TimeInterval::at(stamp))
    }

    /// First value strictly after the stamp
    pub fn after(point: &Arc<str>, stamp: Stamp) -> Self {
        Self::in_interval(point, TimeInterval::unlimited().with_after(stamp))
    }

    pub fn not_before(point: &Arc<str>, stamp: Stamp) -> Self {
        Self::in_interval(point, TimeInterval::unlimited().with_not_before(stamp))
    }

    /// Last value strictly before the stamp
    pub fn before(point: &Arc<str>, stamp: Stamp) -> Self {
        Self::in_interval(point, TimeInterval::unlimited().with_before(stamp)).reversed()
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn with_sync(mut self, sync: Option<TimeSync>) -> Self {
        self.sync = sync;
        self
    }

    pub fn with_polation(
        mut self,
        interpolated: bool,
        extrapolated: bool,
        time_limit: Option<Duration>,
    ) -> Self {
        self.interpolated = interpolated;
        self.extrapolated = extrapolated;
        self.polator_time_limit = time_limit;
        self
    }

    pub fn is_polated(&self) -> bool {
        self.interpolated || self.extrapolated
    }

    /// Apply the query to a stamp-ordered series
    ///
    /// Instant queries return the exact value, or a polated one when the
    /// query asks for it.
    pub fn select_from(&self, values: &BTreeMap<Stamp, PointValue>) -> Vec<PointValue> {
        if self.interval.is_instant() {
            let Some(stamp) = self.interval.not_before() else {
                return Vec::new();
            };
            if let Some(value) = values.get(&stamp) {
                return vec![value.clone()];
            }
            if self.is_polated() {
                return polator::polate(values, self, stamp).into_iter().collect();
            }
            return Vec::new();
        }

        let range = (
            self.interval
                .not_before()
                .map_or(Bound::Unbounded, Bound::Included),
            self.interval
                .not_after()
                .map_or(Bound::Unbounded, Bound::Included),
        );
        if let (Bound::Included(low), Bound::Included(high)) = range {
            if low > high {
                return Vec::new();
            }
        }

        let mut sync = self.sync.as_ref().map(TimeSync::copy);
        let mut accepts = |value: &&PointValue| {
            sync.as_mut()
                .map_or(true, |sync| sync.is_in_sync_at(value.stamp))
        };
        let rows = self.rows.unwrap_or(usize::MAX);

        let range = values.range(range).map(|(_, value)| value);
        if self.reverse {
            range.rev().filter(&mut accepts).take(rows).cloned().collect()
        } else {
            range.filter(&mut accepts).take(rows).cloned().collect()
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pointflow_sync::Crontab;

    fn utc(m: u32) -> Stamp {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, m, 0).unwrap()
    }

    fn series(point: &Arc<str>, minutes: &[u32]) -> BTreeMap<Stamp, PointValue> {
        minutes
            .iter()
            .map(|m| (utc(*m), PointValue::new(Arc::clone(point), utc(*m), i64::from(*m))))
            .collect()
    }

    #[test]
    fn test_before_and_after() {
        let point: Arc<str> = "p".into();
        let values = series(&point, &[0, 10, 20, 30]);

        let before = ValuesQuery::before(&point, utc(20)).select_from(&values);
        assert_eq!(before.first().map(|v| v.stamp), Some(utc(10)));

        let after = ValuesQuery::after(&point, utc(20)).select_from(&values);
        assert_eq!(after.first().map(|v| v.stamp), Some(utc(30)));
    }

    #[test]
    fn test_rows_and_sync_filter() {
        let point: Arc<str> = "p".into();
        let values = series(&point, &[0, 5, 10, 15, 20]);
        let sync = TimeSync::crontab(Crontab::parse("*/10").unwrap());

        let selected = ValuesQuery::not_before(&point, utc(1))
            .with_sync(Some(sync))
            .with_rows(1)
            .select_from(&values);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].stamp, utc(10));
    }

    #[test]
    fn test_instant_exact_match() {
        let point: Arc<str> = "p".into();
        let values = series(&point, &[0, 10]);

        assert_eq!(ValuesQuery::at(&point, utc(10)).select_from(&values).len(), 1);
        assert!(ValuesQuery::at(&point, utc(5)).select_from(&values).is_empty());
    }
}
