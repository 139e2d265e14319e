//! Grammar acceptance tests against the byte-for-byte example queries named
//! in spec §6, plus `ParseError` position reporting.

use jfrpath::parser::parse_query;
use jfrpath_ast::{PipelineOp, Root};

#[test]
fn accepts_every_documented_example_query() {
    let examples = [
        "events/jdk.FileRead[bytes>=1000]",
        r#"events/jdk.ExecutionSample[any:stackTrace/frames[matches(method/name/string, ".*Foo.*")]]"#,
        "events/jdk.FileRead/bytes | stats()",
        "events/jdk.ExecutionSample | groupBy(eventThread/osName, agg=count, sortBy=value, asc=false) | top(10)",
        "events/jdk.ActiveSetting | select(name, value) | toMap(name, value)",
        "metadata/java.lang.Thread",
    ];
    for src in examples {
        parse_query(src).unwrap_or_else(|e| panic!("failed to parse {src:?}: {e}"));
    }
}

#[test]
fn parser_round_trip_sanity_holds_for_every_example() {
    // Parsing twice must yield equal ASTs for any canonical query string
    // the parser accepts, the round-trip invariant this engine actually
    // depends on (see spec §8).
    let examples = [
        "events/jdk.FileRead[bytes>=1000]",
        "events/jdk.FileRead/bytes | stats()",
        "events/jdk.ExecutionSample | groupBy(eventThread/osName) | top(10)",
        "events/jdk.ActiveSetting | select(name, value) | toMap(name, value)",
    ];
    for src in examples {
        assert_eq!(parse_query(src).unwrap(), parse_query(src).unwrap(), "mismatch for {src}");
    }
}

#[test]
fn unmatched_bracket_reports_a_position_not_a_partial_ast() {
    let err = parse_query("events/jdk.FileRead[bytes>=1000").unwrap_err();
    assert!(err.position > 0);
}

#[test]
fn unknown_pipeline_operator_is_rejected() {
    let err = parse_query("events/jdk.FileRead | notAThing()").unwrap_err();
    assert!(err.message.contains("notAThing"));
}

#[test]
fn cp_and_chunks_roots_parse() {
    let q = parse_query("cp/java.lang.Thread").unwrap();
    assert_eq!(q.root, Root::Cp);

    let q = parse_query("chunks").unwrap();
    assert_eq!(q.root, Root::Chunks);
    assert!(q.path.is_empty());
}

#[test]
fn list_index_segment_parses_as_index_not_field() {
    let q = parse_query("events/jdk.ExecutionSample/stackTrace/frames/0").unwrap();
    let last = q.path.last().unwrap();
    assert!(matches!(last.segment, jfrpath_ast::Segment::Index(0)));
}

#[test]
fn select_with_computed_expression_and_alias() {
    let q = parse_query(r#"events/jdk.FileRead | select(bytes / 1024 as kb)"#).unwrap();
    match &q.pipeline[0] {
        PipelineOp::Select { items } => {
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].alias.as_deref(), Some("kb"));
        }
        other => panic!("expected Select, got {other:?}"),
    }
}

#[test]
fn value_transform_pipeline_ops_parse_with_arguments() {
    let q = parse_query(r#"events/jdk.ActiveSetting/value | replace("asgct", "AsyncGetCallTrace")"#).unwrap();
    match &q.pipeline[0] {
        PipelineOp::ValueTransform { args, .. } => assert_eq!(args.len(), 2),
        other => panic!("expected ValueTransform, got {other:?}"),
    }
}
