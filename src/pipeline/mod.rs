//! # Pipeline Runtime
//!
//! Every [`PipelineOp`] is a pure `Vec<Row> -> Vec<Row>` transformation;
//! stages compose in the order the user wrote them. `count`/
//! `sum`/`stats` are computed in a single pass; `groupBy`/`top`/`quantiles`/
//! `sketch` retain their working set and are checked against
//! [`ResourceLimits`] as they grow.

use crate::error::QueryError;
use crate::execution::{ExecutionGuard, ResourceLimits};
use crate::value::{numeric_partial_cmp, Row, Value};
use indexmap::IndexMap;
use jfrpath_ast::*;

/// Runs a full pipeline over an evaluator's row output.
pub fn run(rows: Vec<Row>, pipeline: &[PipelineOp], guard: &ExecutionGuard) -> Result<Vec<Row>, QueryError> {
    let mut current = rows;
    for op in pipeline {
        guard.cancellation.check().map_err(|_| QueryError::Cancelled)?;
        current = apply_stage(current, op, &guard.limits)?;
    }
    Ok(current)
}

fn apply_stage(rows: Vec<Row>, op: &PipelineOp, limits: &ResourceLimits) -> Result<Vec<Row>, QueryError> {
    match op {
        PipelineOp::Count => Ok(apply_count(&rows)),
        PipelineOp::Sum { path } => Ok(apply_sum(&rows, path)),
        PipelineOp::Stats { path } => Ok(apply_stats(&rows, path)),
        PipelineOp::Quantiles { quantiles, path } => Ok(apply_quantiles(&rows, quantiles, path)),
        PipelineOp::Sketch { path } => Ok(apply_sketch(&rows, path)),
        PipelineOp::GroupBy {
            key,
            agg,
            value,
            sort_by,
            ascending,
        } => apply_group_by(&rows, key, *agg, value, *sort_by, *ascending, limits),
        PipelineOp::TopN { n, by, ascending } => apply_top_n(rows, *n, by, *ascending, limits),
        PipelineOp::Select { items } => Ok(apply_select(&rows, items)),
        PipelineOp::ToMap { key_field, value_field } => Ok(apply_to_map(&rows, key_field, value_field)),
        PipelineOp::ValueTransform { kind, path, args } => Ok(apply_value_transform(&rows, *kind, path, args)),
    }
}

// ============================================================================
// Path resolution helper (pipeline argument paths, no predicates)
// ============================================================================

fn resolve_pipeline_path(row: &Row, path: &PathRef) -> Value {
    let mut current = Value::Row(row.clone());
    for step in &path.steps {
        current = match &step.segment {
            Segment::Field(name) => match &current {
                Value::Row(r) => r.get(name).cloned().unwrap_or(Value::Null),
                _ => Value::Null,
            },
            Segment::Index(i) => match &current {
                Value::List(items) if *i >= 0 => items.get(*i as usize).cloned().unwrap_or(Value::Null),
                _ => Value::Null,
            },
        };
    }
    current
}

fn column_value(row: &Row, path: &Option<PathRef>) -> Value {
    match path {
        Some(p) => resolve_pipeline_path(row, p),
        None => row.single_value().cloned().unwrap_or(Value::Null),
    }
}

fn path_ref_display(path: &PathRef) -> String {
    path.steps
        .iter()
        .map(|s| match &s.segment {
            Segment::Field(name) => name.clone(),
            Segment::Index(i) => i.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

// ============================================================================
// count / sum
// ============================================================================

fn apply_count(rows: &[Row]) -> Vec<Row> {
    let mut r = Row::new();
    r.insert("count", Value::Int(rows.len() as i64));
    vec![r]
}

fn apply_sum(rows: &[Row], path: &Option<PathRef>) -> Vec<Row> {
    let mut total = 0.0;
    let mut all_int = true;
    let mut any_numeric = false;
    for row in rows {
        let v = column_value(row, path);
        if let Some(n) = v.as_f64() {
            total += n;
            any_numeric = true;
            if !matches!(v, Value::Int(_)) {
                all_int = false;
            }
        }
    }
    let value = if !any_numeric {
        Value::Int(0)
    } else if all_int {
        Value::Int(total as i64)
    } else {
        Value::Float(total)
    };
    let mut r = Row::new();
    r.insert("sum", value);
    vec![r]
}

// ============================================================================
// stats / quantiles / sketch
// ============================================================================

/// Welford's online algorithm for mean and variance.
struct Welford {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl Welford {
    fn new() -> Self {
        Welford {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
        self.min = self.min.min(x);
        self.max = self.max.max(x);
    }

    /// Sample standard deviation; `None` (rendered as null) below 2 samples.
    fn stddev(&self) -> Option<f64> {
        if self.count < 2 {
            None
        } else {
            Some((self.m2 / (self.count - 1) as f64).sqrt())
        }
    }
}

fn collect_numeric_samples(rows: &[Row], path: &Option<PathRef>) -> Vec<f64> {
    rows.iter().filter_map(|row| column_value(row, path).as_f64()).collect()
}

fn stats_row(w: &Welford) -> Row {
    let mut r = Row::new();
    r.insert("min", Value::Float(w.min));
    r.insert("max", Value::Float(w.max));
    r.insert("avg", Value::Float(w.mean));
    r.insert("stddev", w.stddev().map(Value::Float).unwrap_or(Value::Null));
    r.insert("count", Value::Int(w.count as i64));
    r
}

fn apply_stats(rows: &[Row], path: &Option<PathRef>) -> Vec<Row> {
    let samples = collect_numeric_samples(rows, path);
    if samples.is_empty() {
        // Aggregate identity: stats over empty is an empty row sequence.
        return Vec::new();
    }
    let mut w = Welford::new();
    for s in &samples {
        w.push(*s);
    }
    vec![stats_row(&w)]
}

/// Nearest-rank percentile (ceil(q * n), 1-indexed), chosen over linear
/// interpolation for determinism on small samples.
fn nearest_rank(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    let rank = (q * n as f64).ceil() as usize;
    let idx = rank.saturating_sub(1).min(n - 1);
    sorted[idx]
}

fn apply_quantiles(rows: &[Row], quantiles: &[f64], path: &Option<PathRef>) -> Vec<Row> {
    let mut samples = collect_numeric_samples(rows, path);
    if samples.is_empty() {
        return Vec::new();
    }
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mut r = Row::new();
    for q in quantiles {
        let col = format!("p{}", (q * 100.0).round() as i64);
        r.insert(col, Value::Float(nearest_rank(&samples, *q)));
    }
    vec![r]
}

fn apply_sketch(rows: &[Row], path: &Option<PathRef>) -> Vec<Row> {
    let mut samples = collect_numeric_samples(rows, path);
    if samples.is_empty() {
        return Vec::new();
    }
    let mut w = Welford::new();
    for s in &samples {
        w.push(*s);
    }
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mut r = stats_row(&w);
    r.insert("p50", Value::Float(nearest_rank(&samples, 0.5)));
    r.insert("p90", Value::Float(nearest_rank(&samples, 0.9)));
    r.insert("p99", Value::Float(nearest_rank(&samples, 0.99)));
    vec![r]
}

// ============================================================================
// groupBy
// ============================================================================

fn agg_column_name(agg: AggKind) -> &'static str {
    match agg {
        AggKind::Count => "count",
        AggKind::Sum => "sum",
        AggKind::Avg => "avg",
        AggKind::Min => "min",
        AggKind::Max => "max",
    }
}

fn compute_agg(agg: AggKind, samples: &[f64], count: usize) -> Value {
    match agg {
        AggKind::Count => Value::Int(count as i64),
        AggKind::Sum => Value::Float(samples.iter().sum()),
        AggKind::Avg => {
            if samples.is_empty() {
                Value::Null
            } else {
                Value::Float(samples.iter().sum::<f64>() / samples.len() as f64)
            }
        }
        AggKind::Min => samples
            .iter()
            .cloned()
            .fold(None, |acc: Option<f64>, x| Some(acc.map_or(x, |a| a.min(x))))
            .map(Value::Float)
            .unwrap_or(Value::Null),
        AggKind::Max => samples
            .iter()
            .cloned()
            .fold(None, |acc: Option<f64>, x| Some(acc.map_or(x, |a| a.max(x))))
            .map(Value::Float)
            .unwrap_or(Value::Null),
    }
}

fn apply_group_by(
    rows: &[Row],
    key: &PathRef,
    agg: AggKind,
    value: &Option<PathRef>,
    sort_by: SortBy,
    ascending: bool,
    limits: &ResourceLimits,
) -> Result<Vec<Row>, QueryError> {
    let key_column = path_ref_display(key);
    let agg_column = agg_column_name(agg);

    // Null keys form one group keyed "null".
    let mut groups: IndexMap<String, (Value, Vec<f64>, usize)> = IndexMap::new();
    for row in rows {
        let key_val = resolve_pipeline_path(row, key);
        let key_val = if key_val.is_null() {
            Value::Str("null".to_string())
        } else {
            key_val
        };
        let sort_key = key_val.sort_key();
        let entry = groups
            .entry(sort_key)
            .or_insert_with(|| (key_val.clone(), Vec::new(), 0));
        entry.2 += 1;
        if matches!(agg, AggKind::Sum | AggKind::Avg | AggKind::Min | AggKind::Max) {
            if let Some(n) = column_value(row, value).as_f64() {
                entry.1.push(n);
            }
        }
        limits.check_retained("groupBy", groups.len())?;
    }

    let mut out: Vec<(String, Row)> = groups
        .into_iter()
        .map(|(sort_key, (key_val, samples, count))| {
            let agg_value = compute_agg(agg, &samples, count);
            let mut r = Row::new();
            r.insert(key_column.clone(), key_val);
            r.insert(agg_column, agg_value);
            (sort_key, r)
        })
        .collect();

    out.sort_by(|a, b| {
        let ord = match sort_by {
            SortBy::Key => a.0.cmp(&b.0),
            SortBy::Value => {
                let av = a.1.get(agg_column).and_then(Value::as_f64).unwrap_or(0.0);
                let bv = b.1.get(agg_column).and_then(Value::as_f64).unwrap_or(0.0);
                av.partial_cmp(&bv).unwrap_or(std::cmp::Ordering::Equal)
            }
        };
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });

    Ok(out.into_iter().map(|(_, r)| r).collect())
}

// ============================================================================
// top
// ============================================================================

fn top_key(row: &Row, by: &Option<PathRef>) -> Value {
    match by {
        Some(p) => resolve_pipeline_path(row, p),
        None => row.first_numeric_column().map(|(_, v)| v.clone()).unwrap_or(Value::Null),
    }
}

fn apply_top_n(rows: Vec<Row>, n: usize, by: &Option<PathRef>, ascending: bool, limits: &ResourceLimits) -> Result<Vec<Row>, QueryError> {
    limits.check_retained("top", rows.len())?;
    let mut indexed: Vec<Row> = rows;
    // `sort_by` is stable: ties keep their original relative order both
    // ascending and descending, since `Ordering::Equal.reverse()` is still
    // `Equal`.
    indexed.sort_by(|a, b| {
        let av = top_key(a, by);
        let bv = top_key(b, by);
        let ord = numeric_partial_cmp(&av, &bv).unwrap_or(std::cmp::Ordering::Equal);
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });
    indexed.truncate(n);
    Ok(indexed)
}

// ============================================================================
// select
// ============================================================================

fn apply_select(rows: &[Row], items: &[SelectItem]) -> Vec<Row> {
    rows.iter()
        .map(|row| {
            let mut out = Row::new();
            for item in items {
                let column = item
                    .alias
                    .clone()
                    .unwrap_or_else(|| default_select_column(&item.expr));
                match crate::expr::eval(&item.expr, row) {
                    Ok(v) => out.insert(column, v),
                    Err(e) => {
                        // Row-level computation error: record it as a sibling
                        // warning column rather than aborting the whole
                        // pipeline stage.
                        out.insert(column, Value::Null);
                        out.insert("error", Value::Str(e.to_string()));
                    }
                }
            }
            out
        })
        .collect()
}

/// Column name for a `select()` item with no explicit `as alias`: a bare
/// path keeps its last segment's name; anything else (including a computed
/// expression over an already-projected single column) falls back to the
/// synthetic `value` column.
fn default_select_column(expr: &Expr) -> String {
    if let Expr::Path(p) = expr {
        if let Some(PathStep {
            segment: Segment::Field(name),
            ..
        }) = p.steps.last()
        {
            return name.clone();
        }
    }
    "value".to_string()
}

// ============================================================================
// toMap
// ============================================================================

fn apply_to_map(rows: &[Row], key_field: &str, value_field: &str) -> Vec<Row> {
    let mut map = Row::new();
    for row in rows {
        let key = row.get(key_field).cloned().unwrap_or(Value::Null);
        let value = row.get(value_field).cloned().unwrap_or(Value::Null);
        // Last-wins, insertion-ordered — `Row::insert` already overwrites in
        // place rather than duplicating a key.
        map.insert(key.display_string(), value);
    }
    vec![map]
}

// ============================================================================
// Value transforms
// ============================================================================

fn transform_target_column(row: &Row, path: &Option<PathRef>) -> Option<String> {
    match path {
        Some(p) => p.steps.last().and_then(|s| match &s.segment {
            Segment::Field(name) => Some(name.clone()),
            Segment::Index(_) => None,
        }),
        None => row.iter().next().map(|(k, _)| k.clone()),
    }
}

fn literal_as_str(lit: &Literal) -> Option<&str> {
    match lit {
        Literal::Str(s) => Some(s),
        _ => None,
    }
}

fn numeric_preserving(original: &Value, n: f64) -> Value {
    if matches!(original, Value::Int(_)) {
        Value::Int(n as i64)
    } else {
        Value::Float(n)
    }
}

fn apply_transform_kind(kind: TransformKind, value: &Value, args: &[Literal]) -> Value {
    match kind {
        TransformKind::Len => match value {
            Value::Str(s) => Value::Int(s.chars().count() as i64),
            Value::List(items) => Value::Int(items.len() as i64),
            Value::Row(r) => Value::Int(r.len() as i64),
            _ => Value::Null,
        },
        TransformKind::Upper => value
            .as_str()
            .map(|s| Value::Str(s.to_uppercase()))
            .unwrap_or_else(|| value.clone()),
        TransformKind::Lower => value
            .as_str()
            .map(|s| Value::Str(s.to_lowercase()))
            .unwrap_or_else(|| value.clone()),
        TransformKind::Trim => value
            .as_str()
            .map(|s| Value::Str(s.trim().to_string()))
            .unwrap_or_else(|| value.clone()),
        TransformKind::Abs => match value.as_f64() {
            Some(n) => numeric_preserving(value, n.abs()),
            None => value.clone(),
        },
        TransformKind::Round => match value.as_f64() {
            Some(n) => Value::Int(n.round() as i64),
            None => value.clone(),
        },
        TransformKind::Floor => match value.as_f64() {
            Some(n) => Value::Int(n.floor() as i64),
            None => value.clone(),
        },
        TransformKind::Ceil => match value.as_f64() {
            Some(n) => Value::Int(n.ceil() as i64),
            None => value.clone(),
        },
        TransformKind::Contains => {
            let needle = args.first().and_then(literal_as_str);
            match (value.as_str(), needle) {
                (Some(s), Some(n)) => Value::Bool(s.contains(n)),
                _ => Value::Bool(false),
            }
        }
        TransformKind::Replace => {
            let from = args.first().and_then(literal_as_str);
            let to = args.get(1).and_then(literal_as_str);
            match (value.as_str(), from, to) {
                (Some(s), Some(f), Some(t)) => Value::Str(s.replace(f, t)),
                _ => value.clone(),
            }
        }
    }
}

fn apply_value_transform(rows: &[Row], kind: TransformKind, path: &Option<PathRef>, args: &[Literal]) -> Vec<Row> {
    rows.iter()
        .map(|row| {
            let mut out = row.clone();
            if let Some(col) = transform_target_column(row, path) {
                let current = out.get(&col).cloned().unwrap_or(Value::Null);
                out.insert(col, apply_transform_kind(kind, &current, args));
            }
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Value)]) -> Row {
        let mut r = Row::new();
        for (k, v) in pairs {
            r.insert(*k, v.clone());
        }
        r
    }

    fn guard() -> ExecutionGuard {
        ExecutionGuard::default()
    }

    #[test]
    fn count_over_empty_is_zero() {
        let rows = vec![];
        let out = run(rows, &[PipelineOp::Count], &guard()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("count"), Some(&Value::Int(0)));
    }

    #[test]
    fn stats_over_empty_is_empty_sequence() {
        let out = run(vec![], &[PipelineOp::Stats { path: None }], &guard()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn sum_skips_non_numeric_and_yields_zero_when_none_numeric() {
        let rows = vec![row(&[("value", Value::Str("x".into()))])];
        let out = run(rows, &[PipelineOp::Sum { path: None }], &guard()).unwrap();
        assert_eq!(out[0].get("sum"), Some(&Value::Int(0)));
    }

    #[test]
    fn stats_computes_welford_aggregates() {
        let rows = vec![
            row(&[("bytes", Value::Int(500))]),
            row(&[("bytes", Value::Int(1500))]),
            row(&[("bytes", Value::Int(2500))]),
        ];
        let out = run(
            rows,
            &[PipelineOp::Stats {
                path: Some(PathRef::single("bytes")),
            }],
            &guard(),
        )
        .unwrap();
        assert_eq!(out[0].get("min"), Some(&Value::Float(500.0)));
        assert_eq!(out[0].get("max"), Some(&Value::Float(2500.0)));
        assert_eq!(out[0].get("avg"), Some(&Value::Float(1500.0)));
        assert_eq!(out[0].get("count"), Some(&Value::Int(3)));
    }

    #[test]
    fn group_by_counts_and_sorts_by_value_descending() {
        let rows = vec![
            row(&[("thread", Value::Str("A".into()))]),
            row(&[("thread", Value::Str("A".into()))]),
            row(&[("thread", Value::Str("B".into()))]),
            row(&[("thread", Value::Str("B".into()))]),
            row(&[("thread", Value::Str("B".into()))]),
        ];
        let out = run(
            rows,
            &[PipelineOp::GroupBy {
                key: PathRef::single("thread"),
                agg: AggKind::Count,
                value: None,
                sort_by: SortBy::Value,
                ascending: false,
            }],
            &guard(),
        )
        .unwrap();
        assert_eq!(out[0].get("thread"), Some(&Value::Str("B".to_string())));
        assert_eq!(out[0].get("count"), Some(&Value::Int(3)));
    }

    #[test]
    fn top_n_is_stable_prefix_of_sorted_rows() {
        let rows = vec![
            row(&[("count", Value::Int(1))]),
            row(&[("count", Value::Int(3))]),
            row(&[("count", Value::Int(3))]),
            row(&[("count", Value::Int(2))]),
        ];
        let out = run(rows, &[PipelineOp::TopN { n: 2, by: None, ascending: false }], &guard()).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get("count"), Some(&Value::Int(3)));
        assert_eq!(out[1].get("count"), Some(&Value::Int(3)));
    }

    #[test]
    fn to_map_keeps_last_value_for_duplicate_keys() {
        let rows = vec![
            row(&[("name", Value::Str("a".into())), ("value", Value::Int(1))]),
            row(&[("name", Value::Str("a".into())), ("value", Value::Int(2))]),
        ];
        let out = run(
            rows,
            &[PipelineOp::ToMap {
                key_field: "name".to_string(),
                value_field: "value".to_string(),
            }],
            &guard(),
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("a"), Some(&Value::Int(2)));
    }

    #[test]
    fn value_transform_upper_mutates_implicit_single_column() {
        let rows = vec![row(&[("name", Value::Str("asgct".into()))])];
        let out = run(
            rows,
            &[PipelineOp::ValueTransform {
                kind: TransformKind::Upper,
                path: None,
                args: Vec::new(),
            }],
            &guard(),
        )
        .unwrap();
        assert_eq!(out[0].get("name"), Some(&Value::Str("ASGCT".to_string())));
    }

    #[test]
    fn quantiles_uses_nearest_rank() {
        let rows: Vec<Row> = (1..=10)
            .map(|i| row(&[("value", Value::Int(i))]))
            .collect();
        let out = run(
            rows,
            &[PipelineOp::Quantiles {
                quantiles: vec![0.5],
                path: None,
            }],
            &guard(),
        )
        .unwrap();
        assert_eq!(out[0].get("p50"), Some(&Value::Float(5.0)));
    }
}
