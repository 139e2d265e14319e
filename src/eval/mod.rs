//! # Evaluator
//!
//! Walks a parsed [`Query`] against a [`Recording`], producing an ordered
//! row sequence. Navigation state is a flat `Vec<Value>` — one "current
//! item" per row reaching this point in file order — so list-quantifier
//! predicates and constant-pool indirections compose naturally as the path
//! descends.

use crate::error::QueryError;
use crate::execution::ExecutionGuard;
use crate::recording::{ChunkInfo, Field, Recording, TypeDescriptor, TypeId, TypeKind};
use crate::value::{numeric_partial_cmp, Row, Value};
use jfrpath_ast::*;
use std::collections::HashSet;

/// Evaluate a parsed query against a recording, yielding rows in file
/// order. `default_list_match` is the ambient quantifier used when a
/// predicate carries no explicit `any:`/`all:`/`none:` prefix (C9 threads
/// this in from `QueryOptions`/config).
pub fn evaluate(
    recording: &dyn Recording,
    query: &Query,
    guard: &ExecutionGuard,
    default_list_match: ListMatchMode,
) -> Result<Vec<Row>, QueryError> {
    guard.limits.check_path_depth(query.path.len())?;
    let mut steps = query.path.iter();
    let first_step = steps.next();
    let (mut items, mut type_name) = root_items(recording, query.root, first_step)?;

    if let Some(step0) = first_step {
        for predicate in &step0.predicates {
            items = apply_predicate(recording, items, predicate, default_list_match)?;
        }
    }

    for step in steps {
        guard.cancellation.check().map_err(|_| QueryError::Cancelled)?;
        let (new_items, new_type) = navigate_step(recording, &items, type_name.as_deref(), step)?;
        items = new_items;
        type_name = new_type;
        for predicate in &step.predicates {
            items = apply_predicate(recording, items, predicate, default_list_match)?;
        }
    }

    Ok(finalize(items))
}

// ============================================================================
// Root dispatch
// ============================================================================

fn root_items(
    recording: &dyn Recording,
    root: Root,
    first_step: Option<&PathStep>,
) -> Result<(Vec<Value>, Option<String>), QueryError> {
    match root {
        Root::Events => {
            let type_name = expect_type_name(first_step, "events")?;
            if !recording.catalog().contains(&type_name) {
                return Err(QueryError::UnknownType(type_name));
            }
            let items = recording
                .iterate_events(&type_name)?
                .map(|row| resolve_row_constant_pools(recording, &type_name, row).map(Value::Row))
                .collect::<Result<_, _>>()?;
            Ok((items, Some(type_name)))
        }
        Root::Cp => {
            let type_name = expect_type_name(first_step, "cp")?;
            if !recording.catalog().contains(&type_name) {
                return Err(QueryError::UnknownType(type_name));
            }
            let items = recording
                .iterate_constant_pool(&type_name)?
                .map(|row| resolve_row_constant_pools(recording, &type_name, row).map(Value::Row))
                .collect::<Result<_, _>>()?;
            Ok((items, Some(type_name)))
        }
        Root::Metadata => match first_step {
            Some(step) => {
                let type_name = segment_field_name(step, "metadata")?;
                let desc = recording
                    .catalog()
                    .by_name(&type_name)
                    .ok_or_else(|| QueryError::UnknownType(type_name.clone()))?;
                Ok((vec![Value::Row(type_descriptor_row(desc))], None))
            }
            None => {
                let items = recording
                    .catalog()
                    .iter()
                    .map(|desc| Value::Row(type_descriptor_row(desc)))
                    .collect();
                Ok((items, None))
            }
        },
        Root::Chunks => {
            let items = recording
                .chunks()
                .iter()
                .map(|c| Value::Row(chunk_info_row(c)))
                .collect();
            Ok((items, None))
        }
    }
}

fn expect_type_name(step: Option<&PathStep>, root_name: &str) -> Result<String, QueryError> {
    match step.map(|s| &s.segment) {
        Some(Segment::Field(name)) => Ok(name.clone()),
        _ => Err(QueryError::TypeMismatch(format!(
            "{root_name} root requires a type name as the first path segment"
        ))),
    }
}

fn segment_field_name(step: &PathStep, root_name: &str) -> Result<String, QueryError> {
    match &step.segment {
        Segment::Field(name) => Ok(name.clone()),
        Segment::Index(_) => Err(QueryError::TypeMismatch(format!(
            "{root_name} root does not accept a list index as its first segment"
        ))),
    }
}

fn type_descriptor_row(desc: &TypeDescriptor) -> Row {
    let mut row = Row::new();
    row.insert("name", Value::Str(desc.name.clone()));
    row.insert("kind", Value::Str(type_kind_name(desc.kind).to_string()));
    let fields = desc
        .fields
        .iter()
        .map(|f| {
            let mut fr = Row::new();
            fr.insert("name", Value::Str(f.name.clone()));
            fr.insert("type", Value::Str(f.type_name.clone()));
            fr.insert("dimension", Value::Int(f.dimension as i64));
            Value::Row(fr)
        })
        .collect();
    row.insert("fields", Value::List(fields));
    row.insert(
        "settings",
        Value::List(desc.settings.iter().cloned().map(Value::Str).collect()),
    );
    row
}

fn type_kind_name(kind: TypeKind) -> &'static str {
    match kind {
        TypeKind::Event => "event",
        TypeKind::Struct => "struct",
        TypeKind::Primitive => "primitive",
        TypeKind::ConstantPoolEntry => "constant-pool-entry",
    }
}

fn chunk_info_row(c: &ChunkInfo) -> Row {
    let mut row = Row::new();
    row.insert("index", Value::Int(c.index as i64));
    row.insert("offset", Value::Int(c.offset as i64));
    row.insert("size", Value::Int(c.size as i64));
    row.insert("start_time", Value::Str(c.start_time.to_rfc3339()));
    row.insert("duration_ms", Value::Int(c.duration.num_milliseconds()));
    row.insert("compressed", Value::Bool(c.compressed));
    row
}

// ============================================================================
// Navigation
// ============================================================================

fn navigate_step(
    recording: &dyn Recording,
    items: &[Value],
    type_name: Option<&str>,
    step: &PathStep,
) -> Result<(Vec<Value>, Option<String>), QueryError> {
    match &step.segment {
        Segment::Index(i) => {
            let new_items = items.iter().map(|v| index_value(v, *i)).collect();
            Ok((new_items, type_name.map(str::to_string)))
        }
        Segment::Field(name) => {
            let field = type_name
                .map(|tn| recording.catalog().resolve_field(tn, name))
                .transpose()?;

            let mut new_items: Vec<Value> =
                items.iter().map(|item| get_field_value(item, name)).collect();

            let next_type = field.as_ref().map(|f| f.type_name.clone());
            if let Some(f) = field {
                if is_constant_pool_type(recording, &f.type_name) {
                    new_items = new_items
                        .into_iter()
                        .map(|v| resolve_constant_pool_value(recording, v, &f.type_name, f.is_list()))
                        .collect::<Result<_, _>>()?;
                }
            }

            Ok((new_items, next_type))
        }
    }
}

fn get_field_value(item: &Value, name: &str) -> Value {
    match item {
        Value::Row(r) => r.get(name).cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn index_value(v: &Value, i: i64) -> Value {
    match v {
        Value::List(items) if i >= 0 => items
            .get(i as usize)
            .cloned()
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn is_constant_pool_type(recording: &dyn Recording, type_name: &str) -> bool {
    recording
        .catalog()
        .by_name(type_name)
        .is_some_and(|d| d.kind == TypeKind::ConstantPoolEntry)
}

fn resolve_constant_pool_value(
    recording: &dyn Recording,
    value: Value,
    type_name: &str,
    is_list: bool,
) -> Result<Value, QueryError> {
    if is_list {
        match value {
            Value::List(indices) => {
                let mut out = Vec::with_capacity(indices.len());
                for idx in indices {
                    out.push(resolve_single_constant(recording, &idx, type_name)?);
                }
                Ok(Value::List(out))
            }
            other => Ok(other),
        }
    } else {
        resolve_single_constant(recording, &value, type_name)
    }
}

fn resolve_single_constant(
    recording: &dyn Recording,
    value: &Value,
    type_name: &str,
) -> Result<Value, QueryError> {
    match value {
        Value::Int(idx) => {
            let resolved = recording.resolve_constant(type_name, *idx)?;
            Ok(resolved.map(Value::Row).unwrap_or(Value::Null))
        }
        other => Ok(other.clone()),
    }
}

/// Recursively dereferences every constant-pool-typed field reachable from
/// `row` (including through nested structs and lists), using `type_name`'s
/// catalog entry to know which fields are indirections. Applied once, up
/// front, to every row an event/cp root produces — a query that never
/// explicitly navigates into a constant-pool field (e.g. a bare
/// `groupBy(eventThread/osName)`) still sees the dereferenced value rather
/// than a raw pool index, matching the "no dangling references survive a
/// single row" ownership invariant.
///
/// `visiting` guards against the cyclic schemas the catalog allows (e.g.
/// `Class` <-> `ClassLoader`): once a type is already being resolved further
/// up the call stack, a field that points back to it is left as-is rather
/// than recursed into again.
fn resolve_row_constant_pools(recording: &dyn Recording, type_name: &str, row: Row) -> Result<Row, QueryError> {
    let mut visiting = HashSet::new();
    resolve_row_fields(recording, type_name, row, &mut visiting)
}

fn resolve_row_fields(
    recording: &dyn Recording,
    type_name: &str,
    row: Row,
    visiting: &mut HashSet<TypeId>,
) -> Result<Row, QueryError> {
    let Some(desc) = recording.catalog().by_name(type_name) else {
        return Ok(row);
    };
    if !visiting.insert(desc.id) {
        return Ok(row);
    }
    let mut out = Row::with_capacity(row.len());
    for (name, value) in row {
        let resolved = match desc.field(&name) {
            Some(field) => resolve_field_value_deep(recording, field, value, visiting)?,
            None => value,
        };
        out.insert(name, resolved);
    }
    visiting.remove(&desc.id);
    Ok(out)
}

fn resolve_field_value_deep(
    recording: &dyn Recording,
    field: &Field,
    value: Value,
    visiting: &mut HashSet<TypeId>,
) -> Result<Value, QueryError> {
    let value = if is_constant_pool_type(recording, &field.type_name) {
        resolve_constant_pool_value(recording, value, &field.type_name, field.is_list())?
    } else {
        value
    };

    match value {
        Value::Row(r) => Ok(Value::Row(resolve_row_fields(recording, &field.type_name, r, visiting)?)),
        Value::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(match item {
                    Value::Row(r) => Value::Row(resolve_row_fields(recording, &field.type_name, r, visiting)?),
                    other => other,
                });
            }
            Ok(Value::List(out))
        }
        other => Ok(other),
    }
}

// ============================================================================
// Predicates (top-level: filter whole items)
// ============================================================================

fn apply_predicate(
    recording: &dyn Recording,
    items: Vec<Value>,
    predicate: &Predicate,
    default_mode: ListMatchMode,
) -> Result<Vec<Value>, QueryError> {
    let mode = predicate.mode.unwrap_or(default_mode);
    let mut kept = Vec::with_capacity(items.len());
    for item in items {
        let passes = match &item {
            Value::List(elements) => eval_list_quantifier(recording, elements, &predicate.expr, mode)?,
            other => eval_bool_expr(recording, &predicate.expr, other)?,
        };
        if passes {
            kept.push(item);
        }
    }
    Ok(kept)
}

fn eval_list_quantifier(
    recording: &dyn Recording,
    elements: &[Value],
    expr: &BoolExpr,
    mode: ListMatchMode,
) -> Result<bool, QueryError> {
    match mode {
        ListMatchMode::Any => {
            for e in elements {
                if eval_bool_expr(recording, expr, e)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        ListMatchMode::All => {
            for e in elements {
                if !eval_bool_expr(recording, expr, e)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        ListMatchMode::None => {
            for e in elements {
                if eval_bool_expr(recording, expr, e)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}

// ============================================================================
// Boolean expression tree (predicate bodies)
// ============================================================================

fn eval_bool_expr(recording: &dyn Recording, expr: &BoolExpr, value: &Value) -> Result<bool, QueryError> {
    match expr {
        BoolExpr::Or(a, b) => Ok(eval_bool_expr(recording, a, value)? || eval_bool_expr(recording, b, value)?),
        BoolExpr::And(a, b) => Ok(eval_bool_expr(recording, a, value)? && eval_bool_expr(recording, b, value)?),
        BoolExpr::Not(e) => Ok(!eval_bool_expr(recording, e, value)?),
        BoolExpr::Compare { path, op, rhs } => eval_compare(recording, path, *op, rhs, value),
        BoolExpr::Call(call) => eval_fn_call(recording, call, value),
        BoolExpr::Path(path) => Ok(!resolve_path_ref(recording, path, value)?.is_null()),
    }
}

fn eval_compare(
    recording: &dyn Recording,
    path: &PathRef,
    op: ComparisonOp,
    rhs: &CompareRhs,
    value: &Value,
) -> Result<bool, QueryError> {
    let lhs = resolve_path_ref(recording, path, value)?;
    let rhs_value = match rhs {
        CompareRhs::Literal(lit) => crate::expr::literal_to_value(lit),
        CompareRhs::Path(p) => resolve_path_ref(recording, p, value)?,
    };
    match op {
        ComparisonOp::Eq => Ok(values_loosely_equal(&lhs, &rhs_value)),
        ComparisonOp::Ne => Ok(!values_loosely_equal(&lhs, &rhs_value)),
        ComparisonOp::Gt | ComparisonOp::Ge | ComparisonOp::Lt | ComparisonOp::Le => {
            let ord = numeric_partial_cmp(&lhs, &rhs_value).ok_or_else(|| {
                QueryError::TypeMismatch(format!(
                    "cannot compare {} and {}",
                    lhs.type_name(),
                    rhs_value.type_name()
                ))
            })?;
            Ok(match op {
                ComparisonOp::Gt => ord.is_gt(),
                ComparisonOp::Ge => ord.is_ge(),
                ComparisonOp::Lt => ord.is_lt(),
                ComparisonOp::Le => ord.is_le(),
                _ => unreachable!(),
            })
        }
        ComparisonOp::Match => {
            let haystack = lhs
                .as_str()
                .ok_or_else(|| QueryError::TypeMismatch(format!("cannot regex-match a {}", lhs.type_name())))?;
            let pattern = rhs_value
                .as_str()
                .ok_or_else(|| QueryError::TypeMismatch("regex pattern must be a string".to_string()))?;
            let re = regex::Regex::new(pattern)?;
            Ok(re.is_match(haystack))
        }
    }
}

fn values_loosely_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        x == y
    } else {
        a == b
    }
}

fn eval_fn_call(recording: &dyn Recording, call: &FnCall, value: &Value) -> Result<bool, QueryError> {
    let args = call
        .args
        .iter()
        .map(|a| match a {
            FnArg::Path(p) => resolve_path_ref(recording, p, value),
            FnArg::Literal(lit) => Ok(crate::expr::literal_to_value(lit)),
        })
        .collect::<Result<Vec<_>, _>>()?;

    match call.name {
        BuiltinFn::Contains => {
            let haystack = args.first().ok_or_else(|| arity_error("contains"))?;
            let needle = args.get(1).ok_or_else(|| arity_error("contains"))?;
            Ok(value_contains(haystack, needle))
        }
        BuiltinFn::StartsWith => string_predicate(&args, "starts_with", |s, p| s.starts_with(p)),
        BuiltinFn::EndsWith => string_predicate(&args, "ends_with", |s, p| s.ends_with(p)),
        BuiltinFn::Matches => {
            let haystack = args
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| QueryError::TypeMismatch("matches() requires a string subject".to_string()))?;
            let pattern = args
                .get(1)
                .and_then(Value::as_str)
                .ok_or_else(|| QueryError::TypeMismatch("matches() requires a string pattern".to_string()))?;
            let re = regex::Regex::new(pattern)?;
            Ok(re.is_match(haystack))
        }
        BuiltinFn::Exists => Ok(args.first().map(|v| !v.is_null()).unwrap_or(false)),
        BuiltinFn::Empty => Ok(args.first().map(value_is_empty).unwrap_or(true)),
        BuiltinFn::Len => Ok(args.first().map(|v| !value_is_empty(v)).unwrap_or(false)),
        BuiltinFn::Between => {
            let subject = args.first().ok_or_else(|| arity_error("between"))?;
            let lo = args.get(1).ok_or_else(|| arity_error("between"))?;
            let hi = args.get(2).ok_or_else(|| arity_error("between"))?;
            match (subject.as_f64(), lo.as_f64(), hi.as_f64()) {
                (Some(s), Some(l), Some(h)) => Ok(s >= l && s <= h),
                _ => Err(QueryError::TypeMismatch("between() requires numeric operands".to_string())),
            }
        }
    }
}

fn arity_error(name: &str) -> QueryError {
    QueryError::TypeMismatch(format!("{name}() called with too few arguments"))
}

fn string_predicate(args: &[Value], name: &str, f: impl Fn(&str, &str) -> bool) -> Result<bool, QueryError> {
    let s = args
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| QueryError::TypeMismatch(format!("{name}() requires a string subject")))?;
    let p = args
        .get(1)
        .and_then(Value::as_str)
        .ok_or_else(|| QueryError::TypeMismatch(format!("{name}() requires a string argument")))?;
    Ok(f(s, p))
}

fn value_contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::Str(s) => needle.as_str().map(|n| s.contains(n)).unwrap_or(false),
        Value::List(items) => items.contains(needle),
        _ => false,
    }
}

fn value_is_empty(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Str(s) => s.is_empty(),
        Value::List(items) => items.is_empty(),
        Value::Row(r) => r.is_empty(),
        _ => false,
    }
}

/// Resolves a [`PathRef`] against a single value, honoring any per-step
/// predicates attached within the reference itself (e.g. the `frames[...]`
/// inside `stackTrace/frames[matches(...)]`). Unlike the top-level
/// predicates applied by [`apply_predicate`] (which keep or drop a whole
/// item), a predicate here narrows a traversed list down to the elements
/// that satisfy it, collapsing to `Value::Null` when the quantifier itself
/// is not satisfied.
fn resolve_path_ref(recording: &dyn Recording, path: &PathRef, root: &Value) -> Result<Value, QueryError> {
    let mut current = root.clone();
    for step in &path.steps {
        current = match &step.segment {
            Segment::Field(name) => get_field_value(&current, name),
            Segment::Index(i) => index_value(&current, *i),
        };
        for predicate in &step.predicates {
            current = narrow_by_predicate(recording, current, predicate)?;
        }
    }
    Ok(current)
}

fn narrow_by_predicate(recording: &dyn Recording, current: Value, predicate: &Predicate) -> Result<Value, QueryError> {
    let mode = predicate.mode.unwrap_or(ListMatchMode::Any);
    match current {
        Value::List(elements) => {
            let mut kept = Vec::with_capacity(elements.len());
            for e in &elements {
                if eval_bool_expr(recording, &predicate.expr, e)? {
                    kept.push(e.clone());
                }
            }
            let quantifier_ok = match mode {
                ListMatchMode::Any => !kept.is_empty(),
                ListMatchMode::All => kept.len() == elements.len(),
                ListMatchMode::None => kept.is_empty(),
            };
            if !quantifier_ok {
                return Ok(Value::Null);
            }
            Ok(Value::List(match mode {
                ListMatchMode::Any => kept,
                ListMatchMode::All | ListMatchMode::None => elements,
            }))
        }
        other => {
            if eval_bool_expr(recording, &predicate.expr, &other)? {
                Ok(other)
            } else {
                Ok(Value::Null)
            }
        }
    }
}

// ============================================================================
// Finalization: row vs. scalar-projection mode — a scalar leaf always lands
// in the synthetic "value" column rather than erroring or guessing a name.
// ============================================================================

fn finalize(items: Vec<Value>) -> Vec<Row> {
    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::List(elements) => rows.extend(elements.into_iter().map(wrap_scalar)),
            other => rows.push(wrap_scalar(other)),
        }
    }
    rows
}

fn wrap_scalar(v: Value) -> Row {
    match v {
        Value::Row(r) => r,
        other => {
            let mut r = Row::new();
            r.insert("value", other);
            r
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::catalog::{Catalog, Field, TypeKind};
    use crate::recording::{ChunkInfo, Recording};
    use chrono::Utc;
    use std::sync::Mutex;

    struct FixtureRecording {
        catalog: Catalog,
        events: Mutex<std::collections::HashMap<String, Vec<Row>>>,
        chunks: Vec<ChunkInfo>,
    }

    impl Recording for FixtureRecording {
        fn catalog(&self) -> &Catalog {
            &self.catalog
        }

        fn event_types(&self) -> Vec<String> {
            self.catalog.event_type_names()
        }

        fn constant_pool_types(&self) -> Vec<String> {
            self.catalog.constant_pool_type_names()
        }

        fn iterate_events(
            &self,
            type_name: &str,
        ) -> Result<Box<dyn Iterator<Item = Row> + '_>, crate::error::RecordingError> {
            let rows = self.events.lock().unwrap().get(type_name).cloned().unwrap_or_default();
            Ok(Box::new(rows.into_iter()))
        }

        fn iterate_constant_pool(
            &self,
            _type_name: &str,
        ) -> Result<Box<dyn Iterator<Item = Row> + '_>, crate::error::RecordingError> {
            Ok(Box::new(std::iter::empty()))
        }

        fn resolve_constant(
            &self,
            _type_name: &str,
            _index: i64,
        ) -> Result<Option<Row>, crate::error::RecordingError> {
            Ok(None)
        }

        fn chunks(&self) -> &[ChunkInfo] {
            &self.chunks
        }
    }

    fn file_read_fixture(sizes: &[i64]) -> FixtureRecording {
        let mut catalog = Catalog::new();
        let id = catalog.insert("jdk.FileRead", TypeKind::Event);
        catalog.add_field(id, Field::scalar("bytes", "long"));

        let rows: Vec<Row> = sizes
            .iter()
            .map(|b| {
                let mut row = Row::new();
                row.insert("bytes", Value::Int(*b));
                row
            })
            .collect();

        let mut events = std::collections::HashMap::new();
        events.insert("jdk.FileRead".to_string(), rows);

        FixtureRecording {
            catalog,
            events: Mutex::new(events),
            chunks: Vec::new(),
        }
    }

    #[test]
    fn navigates_events_and_filters_by_predicate() {
        let recording = file_read_fixture(&[500, 1500, 2500]);
        let query = jfrpath_ast::builders::QueryBuilder::new(Root::Events)
            .field("jdk.FileRead")
            .predicate(Predicate {
                mode: None,
                expr: BoolExpr::Compare {
                    path: PathRef::single("bytes"),
                    op: ComparisonOp::Ge,
                    rhs: CompareRhs::Literal(Literal::Int(1000)),
                },
            })
            .build();

        let guard = ExecutionGuard::default();
        let rows = evaluate(&recording, &query, &guard, ListMatchMode::Any).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn scalar_leaf_projects_into_value_column() {
        let recording = file_read_fixture(&[500, 1500]);
        let query = jfrpath_ast::builders::QueryBuilder::new(Root::Events)
            .field("jdk.FileRead")
            .field("bytes")
            .build();

        let guard = ExecutionGuard::default();
        let rows = evaluate(&recording, &query, &guard, ListMatchMode::Any).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("value"), Some(&Value::Int(500)));
    }

    #[test]
    fn unknown_type_errors() {
        let recording = file_read_fixture(&[500]);
        let query = jfrpath_ast::builders::QueryBuilder::new(Root::Events)
            .field("jdk.NoSuchEvent")
            .build();

        let guard = ExecutionGuard::default();
        let err = evaluate(&recording, &query, &guard, ListMatchMode::Any).unwrap_err();
        assert!(matches!(err, QueryError::UnknownType(_)));
    }

    #[test]
    fn path_deeper_than_the_configured_limit_is_rejected() {
        let recording = file_read_fixture(&[500]);
        let mut builder = jfrpath_ast::builders::QueryBuilder::new(Root::Events).field("jdk.FileRead");
        for _ in 0..10 {
            builder = builder.field("bytes");
        }
        let query = builder.build();

        let limits = crate::execution::ResourceLimits {
            max_retained_rows: None,
            max_path_depth: Some(5),
        };
        let guard = ExecutionGuard::new(None, limits);
        let err = evaluate(&recording, &query, &guard, ListMatchMode::Any).unwrap_err();
        assert!(matches!(
            err,
            QueryError::Resource(crate::error::ResourceError::PathTooDeep { limit: 5, actual: 11 })
        ));
    }

    #[test]
    fn list_quantifier_any_matches_laws() {
        let recording = file_read_fixture(&[]);
        let elements = vec![Value::Int(1), Value::Int(2)];
        let always_false = BoolExpr::Compare {
            path: PathRef::single("missing"),
            op: ComparisonOp::Eq,
            rhs: CompareRhs::Literal(Literal::Bool(true)),
        };
        assert!(!eval_list_quantifier(&recording, &elements, &always_false, ListMatchMode::Any).unwrap());
        assert!(eval_list_quantifier(&recording, &[], &always_false, ListMatchMode::All).unwrap());
        assert!(eval_list_quantifier(&recording, &[], &always_false, ListMatchMode::None).unwrap());
    }

    #[test]
    fn metadata_root_projects_type_descriptor() {
        let recording = file_read_fixture(&[]);
        let query = jfrpath_ast::builders::QueryBuilder::new(Root::Metadata)
            .field("jdk.FileRead")
            .build();

        let guard = ExecutionGuard::default();
        let rows = evaluate(&recording, &query, &guard, ListMatchMode::Any).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::Str("jdk.FileRead".to_string())));
    }

    #[test]
    fn chunks_root_projects_chunk_metadata() {
        let mut recording = file_read_fixture(&[]);
        recording.chunks.push(ChunkInfo {
            index: 0,
            offset: 0,
            size: 128,
            start_time: Utc::now(),
            duration: chrono::Duration::milliseconds(50),
            compressed: false,
        });

        let query = Query::new(Root::Chunks);
        let guard = ExecutionGuard::default();
        let rows = evaluate(&recording, &query, &guard, ListMatchMode::Any).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("size"), Some(&Value::Int(128)));
    }
}
