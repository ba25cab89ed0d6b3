//! Linear interpolation and extrapolation of missing instants

use std::collections::BTreeMap;
use std::ops::Bound;

use chrono::Duration;
use pointflow_sync::Stamp;
use tracing::trace;

use crate::query::ValuesQuery;
use crate::value::{PointValue, Value};

pub const INTERPOLATED_STATE: &str = "interpolated";
pub const EXTRAPOLATED_STATE: &str = "extrapolated";

/// Value for a stamp with no stored value
///
/// Interpolation is tried first, then extrapolation, as the query allows.
pub(crate) fn polate(
    values: &BTreeMap<Stamp, PointValue>,
    query: &ValuesQuery,
    stamp: Stamp,
) -> Option<PointValue> {
    let limit = query.polator_time_limit;
    let within = |from: Stamp, to: Stamp| limit.map_or(true, |limit| to - from <= limit);

    let mut earlier = values.range(..stamp).rev().map(|(_, value)| value);
    let latest = earlier.next();

    if query.interpolated {
        let later = values
            .range((Bound::Excluded(stamp), Bound::Unbounded))
            .map(|(_, value)| value)
            .next();
        if let (Some(before), Some(after)) = (latest, later) {
            if within(before.stamp, stamp) && within(stamp, after.stamp) {
                if let Some(value) = line(before, after, stamp) {
                    trace!("Interpolated {} at {}", query.point, stamp.to_rfc3339());
                    return Some(
                        PointValue::new(query.point.clone(), stamp, value)
                            .with_state(INTERPOLATED_STATE),
                    );
                }
            }
        }
    }

    if query.extrapolated {
        let latest = latest.filter(|latest| within(latest.stamp, stamp))?;
        let value = match earlier.next() {
            Some(previous) => line(previous, latest, stamp)?,
            None => latest.value.clone(),
        };
        trace!("Extrapolated {} at {}", query.point, stamp.to_rfc3339());
        return Some(
            PointValue::new(query.point.clone(), stamp, value).with_state(EXTRAPOLATED_STATE),
        );
    }

    None
}

/// Value at `stamp` on the line through two points
fn line(first: &PointValue, second: &PointValue, stamp: Stamp) -> Option<Value> {
    let y0 = first.value.as_f64()?;
    let y1 = second.value.as_f64()?;
    let span = seconds(second.stamp - first.stamp);
    if span == 0.0 {
        return Some(Value::Float(y1));
    }

    let offset = seconds(stamp - first.stamp);
    Some(Value::Float(y0 + (y1 - y0) * offset / span))
}

fn seconds(duration: Duration) -> f64 {
    duration
        .num_microseconds()
        .map_or(duration.num_seconds() as f64, |micros| micros as f64 / 1e6)
}
