use super::*;
use crate::batch::MemoryBatch;
use crate::error::Result;
use crate::point::Point;
use crate::value::Value;
use chrono::{TimeZone, Utc};
use pointflow_sync::{Crontab, Stamp, TimeInterval, TimeSync};
use tracing_test::traced_test;

fn utc(m: u32) -> Stamp {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, m, 0).unwrap()
}

fn quarter() -> TimeSync {
    TimeSync::crontab(Crontab::parse("*/15").unwrap())
}

fn point(name: &str, sync: Option<TimeSync>) -> Arc<Point> {
    let point = Point::new(name);
    Arc::new(match sync {
        Some(sync) => point.with_sync(sync),
        None => point,
    })
}

fn chain(
    input: Arc<Point>,
    result: Arc<Point>,
    kinds: &[BehaviorKind],
    params: Params,
) -> Result<BehaviorChain> {
    let relation = Relation::new(input, result).with_params(params);
    let links = kinds.iter().copied().map(BehaviorLink::new).collect();
    BehaviorChain::set_up(Arc::new(relation), links)
}

fn plain(kinds: &[BehaviorKind], params: Params) -> BehaviorChain {
    chain(point("in", None), point("out", None), kinds, params).unwrap()
}

fn value(point: &str, m: u32, v: f64) -> PointValue {
    PointValue::new(point, utc(m), v)
}

fn set_up_stamps(batch: &mut MemoryBatch) -> Vec<Stamp> {
    batch.take_results().iter().map(|result| result.stamp).collect()
}

// ============================================================================
// Setup
// ============================================================================

#[test]
fn test_behavior_names() {
    assert_eq!(
        "AlwaysTriggersBehavior".parse::<BehaviorKind>().unwrap(),
        BehaviorKind::AlwaysTriggers
    );
    assert_eq!(
        "triggers_new".parse::<BehaviorKind>().unwrap(),
        BehaviorKind::TriggersNew
    );
    assert!(matches!(
        "Sometimes".parse::<BehaviorKind>(),
        Err(BehaviorError::UnknownBehavior(_))
    ));
    assert!(BehaviorKind::Synchronized.is_primary_capable());
    assert!(!BehaviorKind::Synchronized.is_primary_only());
}

#[test]
fn test_chain_shape() {
    let input = point("in", None);
    let result = point("out", None);

    assert!(matches!(
        chain(input.clone(), result.clone(), &[], Params::new()),
        Err(BehaviorError::NoPrimary(_))
    ));
    assert!(matches!(
        chain(input.clone(), result.clone(), &[BehaviorKind::Required], Params::new()),
        Err(BehaviorError::NoPrimary(_))
    ));
    assert!(matches!(
        chain(
            input,
            result,
            &[BehaviorKind::AlwaysTriggers, BehaviorKind::TriggersNew],
            Params::new()
        ),
        Err(BehaviorError::MultiplePrimary(_))
    ));
}

#[test]
#[traced_test]
fn test_positive_position_is_negated() {
    let chain = chain(
        point("in", Some(quarter())),
        point("out", None),
        &[BehaviorKind::Synchronized],
        Params::new().with(SELECT_SYNC_POSITION, 2i64),
    )
    .unwrap();

    assert_eq!(chain.settings().select_sync_position, -2);
    assert!(logs_contain("is positive"));
}

#[test]
fn test_setup_rejections() {
    let set_up = |params: Params, result_sync: Option<TimeSync>| {
        chain(
            point("in", Some(quarter())),
            point("out", result_sync),
            &[BehaviorKind::NeverTriggers],
            params,
        )
        .unwrap_err()
    };

    assert_eq!(
        set_up(Params::new().with(AFTER_RESULT_SYNC_POSITION, 0i64), Some(quarter())),
        BehaviorError::ZeroNotSupported(AFTER_RESULT_SYNC_POSITION)
    );
    assert!(matches!(
        set_up(
            Params::new()
                .with(SINCE_SYNC_POSITION, -1i64)
                .with(SINCE_RESULT_SYNC_POSITION, -1i64),
            Some(quarter())
        ),
        BehaviorError::MutuallyExclusive(_)
    ));
    assert_eq!(
        set_up(
            Params::new()
                .with(SELECT_SYNC_POSITION, -3i64)
                .with(SINCE_SYNC_POSITION, -1i64),
            None
        ),
        BehaviorError::InvalidSelectionInterval
    );
    assert_eq!(
        set_up(Params::new().with(SINCE_RESULT_SYNC_POSITION, -1i64), None),
        BehaviorError::SyncResultNeeded(SINCE_RESULT_SYNC_POSITION)
    );

    let unsynced = chain(
        point("in", None),
        point("out", None),
        &[BehaviorKind::Synchronized],
        Params::new().with(SELECT_SYNC_POSITION, -1i64),
    );
    assert_eq!(
        unsynced.unwrap_err(),
        BehaviorError::SyncInputNeeded(SELECT_SYNC_POSITION)
    );
}

#[test]
fn test_input_sync_used_when_it_differs_from_result_sync() {
    let hourly = TimeSync::crontab(Crontab::parse("0").unwrap());
    let chain = chain(
        point("in", Some(quarter())),
        point("out", Some(hourly)),
        &[BehaviorKind::Synchronized],
        Params::new(),
    )
    .unwrap();

    assert_eq!(chain.settings().sync, Some(quarter()));
    assert!(chain.settings().input_sync.is_none());
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_always_triggers_rejects_each_selection_param() {
    let cases = [
        (SELECT_SYNC_POSITION, Params::new().with(SELECT_SYNC_POSITION, -1i64)),
        (SINCE_SYNC_POSITION, Params::new().with(SINCE_SYNC_POSITION, 0i64)),
        (
            SINCE_RESULT_SYNC_POSITION,
            Params::new().with(SINCE_RESULT_SYNC_POSITION, -1i64),
        ),
        (SELECT_PREVIOUS_VALUE, Params::new().with(SELECT_PREVIOUS_VALUE, true)),
    ];

    for (param, params) in cases {
        let chain = chain(
            point("in", Some(quarter())),
            point("out", Some(quarter())),
            &[BehaviorKind::AlwaysTriggers],
            params,
        )
        .unwrap();
        assert_eq!(
            chain.validate().unwrap_err(),
            vec![BehaviorError::Incompatible {
                behavior: "AlwaysTriggers",
                param
            }]
        );
    }
}

#[test]
fn test_validation_collects_every_rejection() {
    let chain = chain(
        point("in", Some(quarter())),
        point("out", None),
        &[BehaviorKind::TriggersNew, BehaviorKind::Extrapolated],
        Params::new()
            .with(SELECT_SYNC_POSITION, -1i64)
            .with(SELECT_PREVIOUS_VALUE, "yes"),
    )
    .unwrap();

    let errors = chain.validate().unwrap_err();
    assert_eq!(errors.len(), 3);
    assert!(errors.contains(&BehaviorError::ExtrapolatedNotSupported("TriggersNew")));
}

#[test]
fn test_loops() {
    let counter = point("counter", Some(quarter()));

    let always = chain(
        counter.clone(),
        counter.clone(),
        &[BehaviorKind::AlwaysTriggers],
        Params::new(),
    )
    .unwrap();
    assert_eq!(
        always.validate().unwrap_err(),
        vec![BehaviorError::TriggerLoop("counter".to_string())]
    );

    let retriggers = chain(
        counter.clone(),
        counter.clone(),
        &[BehaviorKind::Retriggers],
        Params::new(),
    )
    .unwrap();
    assert!(retriggers.validate().is_ok());

    let synchronized = chain(
        counter.clone(),
        counter.clone(),
        &[BehaviorKind::Synchronized],
        Params::new(),
    )
    .unwrap();
    assert!(synchronized.validate().is_err());

    let shifted = chain(
        counter.clone(),
        counter,
        &[BehaviorKind::Synchronized, BehaviorKind::Interpolated],
        Params::new().with(SELECT_SYNC_POSITION, -1i64),
    )
    .unwrap();
    assert!(shifted.validate().is_ok());
}

// ============================================================================
// Position arithmetic
// ============================================================================

#[test]
fn test_sync_stamp_rounds_onto_grid() {
    let chain = chain(
        point("in", Some(quarter())),
        point("out", None),
        &[BehaviorKind::Synchronized],
        Params::new().with(SELECT_SYNC_POSITION, -1i64),
    )
    .unwrap();

    assert_eq!(chain.sync_stamp(-1, utc(30), false), Some(utc(15)));
    assert_eq!(chain.sync_stamp(-1, utc(31), false), Some(utc(15)));
    assert_eq!(chain.sync_stamp(0, utc(31), false), Some(utc(30)));
    assert_eq!(chain.sync_stamp(0, utc(31), true), Some(utc(45)));
    assert_eq!(chain.sync_stamp(0, utc(30), true), Some(utc(30)));
    assert_eq!(chain.select_interval(utc(30)), Some(TimeInterval::at(utc(15))));
}

#[test]
fn test_sync_stamp_past_sync_limits() {
    let stamps = TimeSync::stamps(vec![utc(0), utc(15), utc(30)]).unwrap();
    let chain = chain(
        point("in", Some(stamps)),
        point("out", None),
        &[BehaviorKind::Synchronized],
        Params::new().with(SELECT_SYNC_POSITION, -1i64),
    )
    .unwrap();

    assert_eq!(chain.sync_stamp(-2, utc(30), false), Some(utc(0)));
    assert_eq!(chain.sync_stamp(-3, utc(30), false), None);
    assert_eq!(chain.sync_stamp(-1, utc(30), true), None);
    assert_eq!(chain.select_interval(utc(0)), None);
}

#[test]
fn test_sync_stamp_without_sync() {
    let chain = plain(&[BehaviorKind::AlwaysTriggers], Params::new());
    assert_eq!(chain.sync_stamp(-3, utc(7), false), Some(utc(7)));
    assert!(chain.result_sync_stamp(-1, utc(7), false).is_none());
}

#[test]
fn test_trigger_limit() {
    let chain = chain(
        point("in", None),
        point("out", Some(quarter())),
        &[BehaviorKind::Retriggers],
        Params::new().with(SINCE_RESULT_SYNC_POSITION, -1i64),
    )
    .unwrap();

    let limit = chain.trigger_limit(utc(10), None).unwrap();
    assert!(limit > utc(15) && limit < utc(16));
    assert_eq!(chain.trigger_limit(utc(10), Some(utc(12))), Some(utc(12)));
}

// ============================================================================
// Triggers
// ============================================================================

#[test]
fn test_always_triggers_up_to_next_notice() {
    let chain = plain(&[BehaviorKind::AlwaysTriggers], Params::new());
    let notice = value("in", 10, 1.0);
    let mut batch = MemoryBatch::new();

    assert_eq!(
        chain.prepare_trigger(&notice, &mut batch, LookUpPass::FIRST),
        Prepared::Pending
    );
    assert_eq!(batch.pending_queries().len(), 1);
    assert!(chain
        .prepare_trigger(&notice, &mut batch, LookUpPass::new(2))
        .is_done());

    batch.cache(value("in", 30, 2.0));
    batch.cache(value("out", 20, 0.0));
    batch.cache(value("out", 40, 0.0));
    chain.trigger(&notice, &mut batch);

    assert_eq!(set_up_stamps(&mut batch), vec![utc(10), utc(20)]);
    assert!(chain.is_result_fetched());
}

#[test]
fn test_triggers_new() {
    let chain = plain(&[BehaviorKind::TriggersNew], Params::new());
    let notice = value("in", 10, 1.0);

    let mut batch = MemoryBatch::new();
    chain.trigger(&notice, &mut batch);
    assert_eq!(set_up_stamps(&mut batch), vec![utc(10)]);

    let mut batch = MemoryBatch::new();
    batch.cache(value("in", 30, 2.0));
    batch.cache(value("out", 20, 0.0));
    chain.trigger(&notice, &mut batch);
    assert!(set_up_stamps(&mut batch).is_empty());

    let mut batch = MemoryBatch::new();
    batch.cache(value("in", 30, 2.0));
    batch.cache(value("out", 40, 0.0));
    chain.trigger(&notice, &mut batch);
    assert_eq!(set_up_stamps(&mut batch), vec![utc(10)]);
}

#[test]
fn test_triggers_new_without_later_notice() {
    let chain = plain(&[BehaviorKind::TriggersNew], Params::new());
    let notice = value("in", 10, 1.0);
    let mut batch = MemoryBatch::new();
    batch.cache(value("out", 20, 0.0));

    chain.trigger(&notice, &mut batch);
    assert_eq!(set_up_stamps(&mut batch), vec![utc(10)]);
}

#[test]
fn test_retriggers_existing_results_only() {
    let chain = plain(&[BehaviorKind::Retriggers], Params::new());
    let notice = value("in", 10, 1.0);
    let mut batch = MemoryBatch::new();
    batch.cache(value("in", 30, 2.0));
    for m in [5, 10, 20, 40] {
        batch.cache(value("out", m, 0.0));
    }

    chain.trigger(&notice, &mut batch);
    assert_eq!(set_up_stamps(&mut batch), vec![utc(10), utc(20)]);
}

#[test]
fn test_retriggers_within_since_limit() {
    let chain = chain(
        point("in", None),
        point("out", Some(quarter())),
        &[BehaviorKind::Retriggers],
        Params::new().with(SINCE_RESULT_SYNC_POSITION, -1i64),
    )
    .unwrap();
    let notice = value("in", 10, 1.0);
    let mut batch = MemoryBatch::new();
    for m in [10, 15, 30] {
        batch.cache(value("out", m, 0.0));
    }

    chain.trigger(&notice, &mut batch);
    assert_eq!(set_up_stamps(&mut batch), vec![utc(10), utc(15)]);
}

#[test]
#[traced_test]
fn test_retriggers_previous_value_shifts_notice() {
    let chain = plain(
        &[BehaviorKind::Retriggers],
        Params::new().with(SELECT_PREVIOUS_VALUE, true),
    );
    let notice = value("in", 10, 1.0);
    let mut batch = MemoryBatch::new();
    batch.cache(value("in", 20, 2.0));
    for m in [10, 20, 25] {
        batch.cache(value("out", m, 0.0));
    }

    chain.trigger(&notice, &mut batch);
    assert_eq!(set_up_stamps(&mut batch), vec![utc(20), utc(25)]);
    assert!(logs_contain("set up by in@2024-01-01T00:20:00+00:00"));
    assert!(!logs_contain("set up by in@2024-01-01T00:10:00+00:00"));
}

#[test]
fn test_retriggers_self_loop() {
    let counter = point("counter", None);
    let chain = chain(
        counter.clone(),
        counter,
        &[BehaviorKind::Retriggers],
        Params::new(),
    )
    .unwrap();
    let notice = value("counter", 10, 1.0);
    let mut batch = MemoryBatch::new();

    assert!(chain
        .prepare_trigger(&notice, &mut batch, LookUpPass::FIRST)
        .is_done());

    batch.cache(value("counter", 20, 2.0));
    chain.trigger(&notice, &mut batch);
    assert_eq!(set_up_stamps(&mut batch), vec![utc(20)]);
}

#[test]
fn test_synchronized_trigger_moves_to_result_grid() {
    let chain = chain(
        point("in", None),
        point("out", Some(quarter())),
        &[BehaviorKind::Synchronized],
        Params::new(),
    )
    .unwrap();

    let mut batch = MemoryBatch::new();
    chain.trigger(&value("in", 15, 1.0), &mut batch);
    assert_eq!(set_up_stamps(&mut batch), vec![utc(15)]);

    // Off-grid notices only update existing results
    chain.trigger(&value("in", 10, 1.0), &mut batch);
    assert!(set_up_stamps(&mut batch).is_empty());
    batch.cache(value("out", 15, 0.0));
    chain.trigger(&value("in", 10, 1.0), &mut batch);
    assert_eq!(set_up_stamps(&mut batch), vec![utc(15)]);
}

#[test]
fn test_synchronized_trigger_one_interval_later() {
    let chain = chain(
        point("in", Some(quarter())),
        point("out", Some(quarter())),
        &[BehaviorKind::Synchronized],
        Params::new().with(SELECT_SYNC_POSITION, -1i64),
    )
    .unwrap();
    let notice = value("in", 15, 1.0);
    let mut batch = MemoryBatch::new();

    assert!(chain
        .prepare_trigger(&notice, &mut batch, LookUpPass::FIRST)
        .is_done());
    assert_eq!(batch.pending_queries().len(), 2);

    chain.trigger(&notice, &mut batch);
    assert!(set_up_stamps(&mut batch).is_empty());

    batch.cache(value("in", 30, 2.0));
    chain.trigger(&notice, &mut batch);
    assert_eq!(set_up_stamps(&mut batch), vec![utc(30)]);
}

#[test]
fn test_never_triggers() {
    let chain = plain(&[BehaviorKind::NeverTriggers], Params::new());
    let mut batch = MemoryBatch::new();
    let notice = value("in", 10, 1.0);

    assert!(chain
        .prepare_trigger(&notice, &mut batch, LookUpPass::FIRST)
        .is_done());
    chain.trigger(&notice, &mut batch);
    assert_eq!(batch.result_count(), 0);
}

// ============================================================================
// Selection
// ============================================================================

#[test]
fn test_select_latest_input() {
    let chain = plain(&[BehaviorKind::AlwaysTriggers], Params::new());
    let mut result = ResultValue::new("out".into(), utc(25));
    let mut batch = MemoryBatch::new();

    assert!(chain
        .prepare_select(&result, &mut batch, LookUpPass::FIRST)
        .is_done());
    assert_eq!(batch.pending_queries().len(), 1);
    assert!(batch.pending_queries()[0].reverse);

    batch.cache(value("in", 10, 1.0));
    batch.cache(value("in", 20, 2.0));
    batch.cache(value("in", 30, 3.0));
    assert!(chain.select(&mut result, &batch));
    assert_eq!(result.inputs.len(), 1);
    assert_eq!(result.input("in").map(|v| v.stamp), Some(utc(20)));
}

#[test]
fn test_select_previous_value() {
    let chain = plain(
        &[BehaviorKind::Retriggers],
        Params::new().with(SELECT_PREVIOUS_VALUE, true),
    );
    let mut result = ResultValue::new("out".into(), utc(25));
    let mut batch = MemoryBatch::new();

    assert_eq!(
        chain.prepare_select(&result, &mut batch, LookUpPass::FIRST),
        Prepared::Pending
    );

    batch.cache(value("in", 10, 1.0));
    batch.cache(value("in", 20, 2.0));
    assert!(chain
        .prepare_select(&result, &mut batch, LookUpPass::new(2))
        .is_done());
    assert!(chain.select(&mut result, &batch));
    assert_eq!(result.input("in").map(|v| v.stamp), Some(utc(10)));
}

#[test]
fn test_select_self_loop_uses_previous_stamp() {
    let counter = point("counter", None);
    let chain = chain(
        counter.clone(),
        counter,
        &[BehaviorKind::Retriggers],
        Params::new(),
    )
    .unwrap();
    let mut result = ResultValue::new("counter".into(), utc(20));
    let mut batch = MemoryBatch::new();
    batch.cache(value("counter", 10, 1.0));
    batch.cache(value("counter", 20, 2.0));

    assert!(chain.select(&mut result, &batch));
    assert_eq!(result.input("counter").map(|v| v.stamp), Some(utc(10)));
}

#[test]
fn test_select_after_result_position() {
    let chain = chain(
        point("in", None),
        point("out", Some(quarter())),
        &[BehaviorKind::NeverTriggers],
        Params::new().with(AFTER_RESULT_SYNC_POSITION, -1i64),
    )
    .unwrap();

    let mut batch = MemoryBatch::new();
    batch.cache(value("in", 15, 1.0));
    let mut result = ResultValue::new("out".into(), utc(30));
    assert!(chain.select(&mut result, &batch));
    assert_eq!(result.inputs, vec![None]);

    batch.cache(value("in", 20, 2.0));
    let mut result = ResultValue::new("out".into(), utc(30));
    assert!(chain.select(&mut result, &batch));
    assert_eq!(result.input("in").map(|v| v.stamp), Some(utc(20)));
}

#[test]
fn test_required_input_missing() {
    let chain = plain(
        &[BehaviorKind::AlwaysTriggers, BehaviorKind::Required],
        Params::new(),
    );
    let batch = MemoryBatch::new();
    let mut result = ResultValue::new("out".into(), utc(30));

    assert!(!chain.select(&mut result, &batch));
    assert!(result.inputs.is_empty());
}

#[test]
fn test_synchronized_select_previous_interval() {
    let chain = chain(
        point("in", Some(quarter())),
        point("out", Some(quarter())),
        &[BehaviorKind::Synchronized],
        Params::new().with(SELECT_SYNC_POSITION, -1i64),
    )
    .unwrap();
    let mut batch = MemoryBatch::new();
    let mut result = ResultValue::new("out".into(), utc(30));

    assert!(chain
        .prepare_select(&result, &mut batch, LookUpPass::FIRST)
        .is_done());
    assert_eq!(
        batch.pending_queries()[0].interval,
        TimeInterval::at(utc(15))
    );

    batch.cache(value("in", 15, 1.5));
    batch.cache(value("in", 30, 3.0));
    assert!(chain.select(&mut result, &batch));
    assert_eq!(result.input("in").map(|v| v.stamp), Some(utc(15)));
    assert!(chain.is_input_valid(&value("in", 15, 1.5), &result));
    assert!(!chain.is_input_valid(&value("in", 30, 3.0), &result));
}

#[test]
fn test_synchronized_interpolated_select() {
    let chain = plain(
        &[BehaviorKind::Synchronized, BehaviorKind::Interpolated],
        Params::new(),
    );
    let mut batch = MemoryBatch::new();
    batch.cache(value("in", 20, 10.0));
    batch.cache(value("in", 40, 30.0));

    let mut result = ResultValue::new("out".into(), utc(30));
    assert!(chain.select(&mut result, &batch));

    let input = result.input("in").unwrap();
    assert_eq!(input.value, Value::Float(20.0));
    assert_eq!(input.state.as_deref(), Some(crate::polator::INTERPOLATED_STATE));
    assert!(!chain.is_result_fetched());
}

#[test]
fn test_chain_display() {
    let chain = plain(
        &[BehaviorKind::Synchronized, BehaviorKind::Required],
        Params::new(),
    );
    assert_eq!(chain.to_string(), "in -> out [Synchronized, Required]");
}
