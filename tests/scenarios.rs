//! End-to-end dataflow scenarios (spec §8): records in, sinks out, through
//! the real runtime rather than unit-testing individual modules.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::Mutex;

use streamsql::config::StreamConfig;
use streamsql::functions::FunctionRegistry;
use streamsql::runtime::{QueryPlan, Stream};
use streamsql::value::{Record, Value};
use streamsql::window::WindowKind;

fn int_record(pairs: &[(&str, Value)]) -> Record {
    let mut r: Record = IndexMap::new();
    for (k, v) in pairs {
        r.insert(k.to_string(), v.clone());
    }
    r
}

fn collecting_sink() -> (Arc<Mutex<Vec<Record>>>, Arc<dyn streamsql::runtime::Sink>) {
    let collected = Arc::new(Mutex::new(Vec::new()));
    let for_sink = collected.clone();
    let sink: Arc<dyn streamsql::runtime::Sink> =
        Arc::new(move |batch: &[Record]| {
            for_sink.lock().extend(batch.iter().cloned());
        });
    (collected, sink)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn s2_tumbling_aggregate_with_pre_and_post_expressions() {
    let _ = env_logger::try_init();
    let plan = QueryPlan {
        select: vec![
            ("deviceId".into(), "deviceId".into()),
            ("s".into(), "SUM(v)".into()),
            ("a".into(), "AVG(v)".into()),
            ("spa".into(), "SUM(v)+AVG(v)".into()),
        ],
        where_clause: None,
        group_by: vec!["deviceId".into()],
        window: Some(WindowKind::Tumbling { duration_ms: 5_000 }),
        timestamp_field: None,
        time_unit: streamsql::config::TimeUnit::Millis,
    };

    let stream = Stream::execute(plan, StreamConfig::default(), FunctionRegistry::with_builtins()).unwrap();
    let (collected, sink) = collecting_sink();
    stream.add_sink(sink);

    for v in [10.0, 20.0, 30.0] {
        stream
            .emit(int_record(&[
                ("deviceId", Value::Str("dev1".into())),
                ("v", Value::Float(v)),
            ]))
            .await
            .unwrap();
    }
    settle().await;
    stream.trigger();
    settle().await;

    let rows = collected.lock();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.get("deviceId"), Some(&Value::Str("dev1".into())));
    assert_eq!(row.get("s"), Some(&Value::Float(60.0)));
    assert_eq!(row.get("a"), Some(&Value::Float(20.0)));
    assert_eq!(row.get("spa"), Some(&Value::Float(80.0)));
    assert!(row.contains_key("window_start"));
    assert!(row.contains_key("window_end"));

    stream.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn s3_case_inside_sum_filters_and_nulls_are_ignored() {
    let _ = env_logger::try_init();
    let plan = QueryPlan {
        select: vec![
            ("deviceId".into(), "deviceId".into()),
            (
                "hot".into(),
                "SUM(CASE WHEN temperature>25 THEN temperature ELSE NULL END)".into(),
            ),
        ],
        where_clause: None,
        group_by: vec!["deviceId".into()],
        window: Some(WindowKind::Tumbling { duration_ms: 2_000 }),
        timestamp_field: None,
        time_unit: streamsql::config::TimeUnit::Millis,
    };

    let stream = Stream::execute(plan, StreamConfig::default(), FunctionRegistry::with_builtins()).unwrap();
    let (collected, sink) = collecting_sink();
    stream.add_sink(sink);

    for t in [35.0, 25.0, 32.0] {
        stream
            .emit(int_record(&[
                ("deviceId", Value::Str("sensor".into())),
                ("temperature", Value::Float(t)),
            ]))
            .await
            .unwrap();
    }
    settle().await;
    stream.trigger();
    settle().await;

    let rows = collected.lock();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("hot"), Some(&Value::Float(67.0)));

    stream.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn s6_nth_value_first_value_last_value_over_four_records() {
    let _ = env_logger::try_init();
    let plan = QueryPlan {
        select: vec![
            ("deviceId".into(), "deviceId".into()),
            ("nth".into(), "NTH_VALUE(v, 3)".into()),
            ("first".into(), "FIRST_VALUE(v)".into()),
            ("last".into(), "LAST_VALUE(v)".into()),
        ],
        where_clause: None,
        group_by: vec!["deviceId".into()],
        window: Some(WindowKind::Tumbling { duration_ms: 10_000 }),
        timestamp_field: None,
        time_unit: streamsql::config::TimeUnit::Millis,
    };

    let stream = Stream::execute(plan, StreamConfig::default(), FunctionRegistry::with_builtins()).unwrap();
    let (collected, sink) = collecting_sink();
    stream.add_sink(sink);

    for v in [100.0, 200.0, 300.0, 400.0] {
        stream
            .emit(int_record(&[
                ("deviceId", Value::Str("dev1".into())),
                ("v", Value::Float(v)),
            ]))
            .await
            .unwrap();
    }
    settle().await;
    stream.trigger();
    settle().await;

    let rows = collected.lock();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("nth"), Some(&Value::Float(300.0)));
    assert_eq!(rows[0].get("first"), Some(&Value::Float(100.0)));
    assert_eq!(rows[0].get("last"), Some(&Value::Float(400.0)));

    stream.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn non_aggregating_query_emits_synchronously() {
    let _ = env_logger::try_init();
    let plan = QueryPlan {
        select: vec![("ok".into(), "temperature > 20".into())],
        where_clause: Some(
            "(temperature > 20 AND humidity < 80) OR status == 'active'".into(),
        ),
        group_by: vec![],
        window: None,
        timestamp_field: None,
        time_unit: streamsql::config::TimeUnit::Millis,
    };

    let stream = Stream::execute(plan, StreamConfig::default(), FunctionRegistry::with_builtins()).unwrap();

    let passing = stream
        .emit_sync(int_record(&[
            ("temperature", Value::Int(15)),
            ("humidity", Value::Int(70)),
            ("status", Value::Str("active".into())),
        ]))
        .unwrap();
    assert!(passing.is_some());

    let rejected = stream
        .emit_sync(int_record(&[
            ("temperature", Value::Int(15)),
            ("humidity", Value::Int(70)),
            ("status", Value::Str("idle".into())),
        ]))
        .unwrap();
    assert!(rejected.is_none());

    stream.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn idempotent_stop_matches_invariant_6() {
    let _ = env_logger::try_init();
    let plan = QueryPlan {
        select: vec![("ok".into(), "1".into())],
        where_clause: None,
        group_by: vec![],
        window: None,
        timestamp_field: None,
        time_unit: streamsql::config::TimeUnit::Millis,
    };
    let stream = Stream::execute(plan, StreamConfig::default(), FunctionRegistry::with_builtins()).unwrap();
    stream.stop().await;
    stream.stop().await;
    assert!(stream.emit_sync(int_record(&[])).is_err());
}
