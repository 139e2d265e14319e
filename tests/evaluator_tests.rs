//! Evaluator integration tests: navigation, predicates, constant-pool
//! resolution, and list quantifiers, driven through `jfrpath::eval::evaluate`
//! against the in-memory fixture recordings.

mod support;

use jfrpath::eval::evaluate;
use jfrpath::execution::ExecutionGuard;
use jfrpath::parser::parse_query;
use jfrpath::value::Value;
use jfrpath_ast::ListMatchMode;
use support::{execution_sample_fixture, file_read_fixture, poll_frame_fixture, RecordingBuilder};

fn guard() -> ExecutionGuard {
    ExecutionGuard::default()
}

#[test]
fn navigates_events_and_filters_by_predicate() {
    let recording = file_read_fixture();
    let query = parse_query("events/jdk.FileRead[bytes>=1000]").unwrap();
    let rows = evaluate(&recording, &query, &guard(), ListMatchMode::Any).unwrap();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        let bytes = row.get("bytes").and_then(Value::as_f64).unwrap();
        assert!(bytes >= 1000.0);
    }
}

#[test]
fn scalar_leaf_projects_into_value_column() {
    let recording = file_read_fixture();
    let query = parse_query("events/jdk.FileRead/bytes").unwrap();
    let rows = evaluate(&recording, &query, &guard(), ListMatchMode::Any).unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.get("value").is_some()));
}

#[test]
fn unknown_type_errors() {
    let recording = file_read_fixture();
    let query = parse_query("events/jdk.NoSuchEvent").unwrap();
    let err = evaluate(&recording, &query, &guard(), ListMatchMode::Any).unwrap_err();
    assert!(matches!(err, jfrpath::error::QueryError::UnknownType(_)));
}

#[test]
fn unknown_field_errors() {
    let recording = file_read_fixture();
    let query = parse_query("events/jdk.FileRead/notAField").unwrap();
    let err = evaluate(&recording, &query, &guard(), ListMatchMode::Any).unwrap_err();
    assert!(matches!(err, jfrpath::error::QueryError::UnknownField { .. }));
}

#[test]
fn constant_pool_indirection_resolves_thread_fields() {
    let recording = execution_sample_fixture();
    let query = parse_query("events/jdk.ExecutionSample/eventThread/osName").unwrap();
    let rows = evaluate(&recording, &query, &guard(), ListMatchMode::Any).unwrap();
    let names: Vec<_> = rows.iter().map(|r| r.get("value").unwrap().display_string()).collect();
    assert_eq!(names, vec!["A", "A", "B", "B", "B"]);
}

#[test]
fn list_quantifier_any_matches_when_one_frame_matches() {
    let recording = poll_frame_fixture();
    let query = parse_query(r#"events/jdk.ExecutionSample[any:stackTrace/frames[matches(method/name/string, "poll")]]"#).unwrap();
    let rows = evaluate(&recording, &query, &guard(), ListMatchMode::Any).unwrap();
    assert_eq!(rows.len(), 1);
}

#[test]
fn list_quantifier_all_requires_every_frame_to_match() {
    let recording = poll_frame_fixture();
    let query = parse_query(r#"events/jdk.ExecutionSample[all:stackTrace/frames[matches(method/name/string, "poll|run")]]"#).unwrap();
    let rows = evaluate(&recording, &query, &guard(), ListMatchMode::Any).unwrap();
    assert_eq!(rows.len(), 1, "only the [\"poll\",\"run\"] sample matches every frame");
}

#[test]
fn list_quantifier_none_excludes_any_matching_frame() {
    let recording = poll_frame_fixture();
    let query = parse_query(r#"events/jdk.ExecutionSample[none:stackTrace/frames[matches(method/name/string, "poll")]]"#).unwrap();
    let rows = evaluate(&recording, &query, &guard(), ListMatchMode::Any).unwrap();
    assert_eq!(rows.len(), 1, "only the [\"main\"] sample has no poll frame");
}

#[test]
fn metadata_root_projects_type_descriptor() {
    let recording = RecordingBuilder::new().with_standard_schema().with_file_read_annotation().build();
    let query = parse_query("metadata/jdk.FileRead").unwrap();
    let rows = evaluate(&recording, &query, &guard(), ListMatchMode::Any).unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].get("fields").is_some());
}

#[test]
fn chunks_root_projects_chunk_metadata() {
    use chrono::Duration as ChronoDuration;
    use jfrpath::recording::ChunkInfo;
    let recording = RecordingBuilder::new()
        .with_standard_schema()
        .chunk(ChunkInfo {
            index: 0,
            offset: 0,
            size: 4096,
            start_time: chrono::Utc::now(),
            duration: ChronoDuration::milliseconds(1),
            compressed: false,
        })
        .build();
    let query = parse_query("chunks").unwrap();
    let rows = evaluate(&recording, &query, &guard(), ListMatchMode::Any).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("size"), Some(&Value::Int(4096)));
}
