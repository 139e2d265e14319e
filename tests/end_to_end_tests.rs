//! The six seed scenarios from spec §8, run through the public
//! `Engine::execute` entry point end to end.

mod support;

use jfrpath::facade::{Engine, QueryOptions, QueryOutcome};
use jfrpath::value::Value;
use jfrpath::Config;
use support::{active_setting_fixture, execution_sample_fixture, file_read_fixture, poll_frame_fixture};

fn rows_of(outcome: QueryOutcome) -> Vec<jfrpath::Row> {
    match outcome {
        QueryOutcome::Rows(rows) => rows,
        QueryOutcome::Echoed(s) => panic!("expected rows, got echoed text {s:?}"),
    }
}

#[test]
fn scenario_1_count_over_threshold() {
    let recording = file_read_fixture();
    let engine = Engine::new(Config::default());
    let rows = rows_of(
        engine
            .execute(&recording, "events/jdk.FileRead[bytes>=1000] | count()", QueryOptions::default())
            .unwrap(),
    );
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("count"), Some(&Value::Int(2)));
}

#[test]
fn scenario_2_stats_over_bytes() {
    let recording = file_read_fixture();
    let engine = Engine::new(Config::default());
    let rows = rows_of(
        engine
            .execute(&recording, "events/jdk.FileRead/bytes | stats()", QueryOptions::default())
            .unwrap(),
    );
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("min"), Some(&Value::Float(500.0)));
    assert_eq!(rows[0].get("max"), Some(&Value::Float(2500.0)));
    assert_eq!(rows[0].get("avg"), Some(&Value::Float(1500.0)));
    assert_eq!(rows[0].get("count"), Some(&Value::Int(3)));
    let stddev = rows[0].get("stddev").and_then(Value::as_f64).unwrap();
    assert!((stddev - 1000.0).abs() < 1e-6);
}

#[test]
fn scenario_3_group_by_thread_then_top_one() {
    let recording = execution_sample_fixture();
    let engine = Engine::new(Config::default());
    let rows = rows_of(
        engine
            .execute(
                &recording,
                "events/jdk.ExecutionSample | groupBy(eventThread/osName) | top(1, by=count)",
                QueryOptions::default(),
            )
            .unwrap(),
    );
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("eventThread/osName"), Some(&Value::Str("B".to_string())));
    assert_eq!(rows[0].get("count"), Some(&Value::Int(3)));
}

#[test]
fn scenario_4_to_map_and_size_introspection() {
    let recording = active_setting_fixture();
    let engine = Engine::new(Config::default());
    engine
        .execute(
            &recording,
            "set cfg = events/jdk.ActiveSetting | select(name, value) | toMap(name, value)",
            QueryOptions::default(),
        )
        .unwrap();

    let echoed = engine.execute(&recording, "echo ${cfg.cpuEngine}", QueryOptions::default()).unwrap();
    match echoed {
        QueryOutcome::Echoed(s) => assert_eq!(s, "asgct"),
        other => panic!("expected echoed text, got {other:?}"),
    }

    let size = engine.execute(&recording, "echo ${cfg.size}", QueryOptions::default()).unwrap();
    match size {
        QueryOutcome::Echoed(s) => assert_eq!(s, "2"),
        other => panic!("expected echoed text, got {other:?}"),
    }
}

#[test]
fn scenario_5_lazy_variable_caches_until_invalidated() {
    let recording = file_read_fixture();
    let engine = Engine::new(Config::default());
    engine
        .execute(&recording, "set a = events/jdk.FileRead[bytes>1000]", QueryOptions::default())
        .unwrap();

    let rows = rows_of(engine.execute(&recording, "${a} | count()", QueryOptions::default()).unwrap());
    assert_eq!(rows[0].get("count"), Some(&Value::Int(2)));

    // A second read from the same cache must not change the result even if
    // it never touched the recording again.
    let rows_again = rows_of(engine.execute(&recording, "${a} | count()", QueryOptions::default()).unwrap());
    assert_eq!(rows_again[0].get("count"), Some(&Value::Int(2)));

    engine.vars.invalidate("a");
    let rows_after_invalidate = rows_of(engine.execute(&recording, "${a} | count()", QueryOptions::default()).unwrap());
    assert_eq!(rows_after_invalidate[0].get("count"), Some(&Value::Int(2)));
}

#[test]
fn scenario_6_any_quantifier_over_nested_frames() {
    let recording = poll_frame_fixture();
    let engine = Engine::new(Config::default());
    let rows = rows_of(
        engine
            .execute(
                &recording,
                r#"events/jdk.ExecutionSample[any:stackTrace/frames[matches(method/name/string, "poll")]]"#,
                QueryOptions::default(),
            )
            .unwrap(),
    );
    assert_eq!(rows.len(), 1);
    let stack_trace = rows[0].get("stackTrace").and_then(Value::as_row).unwrap();
    let frames = stack_trace.get("frames").and_then(Value::as_list).unwrap();
    assert_eq!(frames.len(), 2);
}
