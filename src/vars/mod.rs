//! # Variable Store & Substitutor
//!
//! Two `dashmap::DashMap<String, VarValue>` scopes (session, global) give a
//! single writer/many-reader contract that stays trivially race-free, even
//! though one session issues queries serially. `${...}` substitution is a
//! pure text-rewrite pass that runs before the query string ever reaches the
//! path/expression lexers.

use crate::error::VarError;
use crate::execution::ExecutionGuard;
use crate::recording::Recording;
use crate::value::{Row, Value};
use dashmap::DashMap;
use jfrpath_ast::{PipelineOp, Query};
use parking_lot::Mutex;

/// Which of the two scopes a variable lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Session,
    Global,
}

/// A variable whose value is a parsed query, evaluated at most once between
/// `set` and `invalidate`.
pub struct LazyQuery {
    pub query: Query,
    cache: Mutex<Option<std::sync::Arc<Vec<Row>>>>,
}

impl LazyQuery {
    pub fn new(query: Query) -> Self {
        LazyQuery {
            query,
            cache: Mutex::new(None),
        }
    }

    fn invalidate(&self) {
        *self.cache.lock() = None;
    }
}

impl std::fmt::Debug for LazyQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyQuery").finish_non_exhaustive()
    }
}

/// The three shapes a stored variable can take.
#[derive(Debug)]
pub enum VarValue {
    Scalar(Value),
    Map(Row),
    Lazy(std::sync::Arc<LazyQuery>),
}

impl Clone for VarValue {
    fn clone(&self) -> Self {
        match self {
            // Deep copy for maps, fresh cache for lazy vars: invalidating
            // the source must not invalidate the copy.
            VarValue::Scalar(v) => VarValue::Scalar(v.clone()),
            VarValue::Map(r) => VarValue::Map(r.clone()),
            VarValue::Lazy(l) => VarValue::Lazy(std::sync::Arc::new(LazyQuery::new(l.query.clone()))),
        }
    }
}

/// Classifies a parsed RHS query as eager-scalar, eager-map, or lazy: a
/// pipeline ending in `count`/`sum` is eager scalar, one ending in `toMap`
/// is eager map, everything else lazy.
pub enum Classification {
    EagerScalar,
    EagerMap,
    Lazy,
}

pub fn classify(query: &Query) -> Classification {
    match query.pipeline.last() {
        Some(PipelineOp::Count | PipelineOp::Sum { .. }) => Classification::EagerScalar,
        Some(PipelineOp::ToMap { .. }) => Classification::EagerMap,
        _ => Classification::Lazy,
    }
}

/// Session-scoped and global variable storage.
pub struct VariableStore {
    session: DashMap<String, VarValue>,
    global: DashMap<String, VarValue>,
}

impl VariableStore {
    pub fn new() -> Self {
        VariableStore {
            session: DashMap::new(),
            global: DashMap::new(),
        }
    }

    fn scope_map(&self, scope: Scope) -> &DashMap<String, VarValue> {
        match scope {
            Scope::Session => &self.session,
            Scope::Global => &self.global,
        }
    }

    pub fn set(&self, name: impl Into<String>, value: VarValue, scope: Scope) {
        self.scope_map(scope).insert(name.into(), value);
    }

    /// Session scope is consulted first, then global.
    pub fn get(&self, name: &str) -> Option<VarValue> {
        self.session
            .get(name)
            .map(|e| e.value().clone())
            .or_else(|| self.global.get(name).map(|e| e.value().clone()))
    }

    pub fn remove(&self, name: &str, scope: Scope) {
        self.scope_map(scope).remove(name);
    }

    pub fn names(&self, scope: Scope) -> Vec<String> {
        self.scope_map(scope).iter().map(|e| e.key().clone()).collect()
    }

    /// Clears a lazy variable's cache; a no-op for scalar/map variables.
    pub fn invalidate(&self, name: &str) {
        if let Some(entry) = self.session.get(name) {
            if let VarValue::Lazy(l) = entry.value() {
                l.invalidate();
                return;
            }
        }
        if let Some(entry) = self.global.get(name) {
            if let VarValue::Lazy(l) = entry.value() {
                l.invalidate();
            }
        }
    }

    /// Builds a new map with last-wins semantics from the listed variables,
    /// as in `merge(v1, v2, ...)`.
    pub fn merge(&self, names: &[&str]) -> Result<Row, VarError> {
        let mut out = Row::new();
        for name in names {
            let var = self.get(name).ok_or_else(|| VarError::Undefined((*name).to_string()))?;
            match var {
                VarValue::Map(r) => {
                    for (k, v) in r.iter() {
                        out.insert(k.clone(), v.clone());
                    }
                }
                _ => return Err(VarError::NotAMap((*name).to_string())),
            }
        }
        Ok(out)
    }

    /// Resolves a `Lazy` variable's rows, evaluating at most once between
    /// `set` and `invalidate`.
    pub fn resolve_lazy(
        &self,
        name: &str,
        recording: &dyn Recording,
        guard: &ExecutionGuard,
        list_match_mode: jfrpath_ast::ListMatchMode,
    ) -> Result<std::sync::Arc<Vec<Row>>, VarError> {
        let var = self.get(name).ok_or_else(|| VarError::Undefined(name.to_string()))?;
        let VarValue::Lazy(lazy) = var else {
            return Err(VarError::NotAMap(name.to_string()));
        };
        {
            let cached = lazy.cache.lock();
            if let Some(rows) = cached.as_ref() {
                return Ok(rows.clone());
            }
        }
        let rows = crate::eval::evaluate(recording, &lazy.query, guard, list_match_mode)?;
        let rows = crate::pipeline::run(rows, &lazy.query.pipeline, guard)?;
        let rows = std::sync::Arc::new(rows);
        *lazy.cache.lock() = Some(rows.clone());
        Ok(rows)
    }
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// `${...}` substitution
// ============================================================================

/// An intermediate value a `${...}` path expression can be resolved to
/// while walking `[index]`/`.field` segments.
enum Resolved {
    Scalar(Value),
    Map(Row),
    Rows(std::sync::Arc<Vec<Row>>),
}

impl Resolved {
    fn size(&self) -> i64 {
        match self {
            Resolved::Scalar(_) => 1,
            Resolved::Map(r) => r.len() as i64,
            Resolved::Rows(rows) => rows.len() as i64,
        }
    }

    fn index(&self, i: usize, expr: &str) -> Result<Resolved, VarError> {
        match self {
            Resolved::Rows(rows) => rows
                .get(i)
                .cloned()
                .map(Resolved::Map)
                .ok_or_else(|| VarError::BadLiteral(format!("`{expr}` index {i} out of range"))),
            _ => Err(VarError::NotAMap(expr.to_string())),
        }
    }

    fn field(&self, field: &str, expr: &str) -> Result<Resolved, VarError> {
        match self {
            Resolved::Map(r) => r
                .get(field)
                .cloned()
                .map(Resolved::Scalar)
                .ok_or_else(|| VarError::BadLiteral(format!("`{expr}` has no field `{field}`"))),
            _ => Err(VarError::NotAMap(expr.to_string())),
        }
    }

    fn render(&self, expr: &str) -> Result<String, VarError> {
        match self {
            Resolved::Scalar(v) => Ok(render_literal(v)),
            Resolved::Map(_) | Resolved::Rows(_) => Err(VarError::NotAMap(expr.to_string())),
        }
    }
}

fn render_literal(v: &Value) -> String {
    match v {
        Value::Str(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        Value::Null => "null".to_string(),
        _ => v.display_string(),
    }
}

/// Expands every `${...}` span in `source`, substituting each with its
/// rendered literal value. Does not special-case a leading
/// `${varName} | ...` — that short-circuit, reusing cached lazy rows
/// directly instead of re-parsing a rendered literal, is handled by the
/// facade before this function runs.
pub fn substitute(
    source: &str,
    store: &VariableStore,
    recording: &dyn Recording,
    guard: &ExecutionGuard,
    list_match_mode: jfrpath_ast::ListMatchMode,
) -> Result<String, VarError> {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if c == '$' && chars.peek().map(|(_, c2)| *c2) == Some('{') {
            chars.next();
            let mut expr = String::new();
            let mut depth = 1;
            for (_, c2) in chars.by_ref() {
                match c2 {
                    '{' => {
                        depth += 1;
                        expr.push(c2);
                    }
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                        expr.push(c2);
                    }
                    _ => expr.push(c2),
                }
            }
            out.push_str(&resolve_substitution(&expr, store, recording, guard, list_match_mode)?);
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

fn resolve_substitution(
    expr: &str,
    store: &VariableStore,
    recording: &dyn Recording,
    guard: &ExecutionGuard,
    list_match_mode: jfrpath_ast::ListMatchMode,
) -> Result<String, VarError> {
    let name_end = expr
        .find(|c: char| c == '[' || c == '.')
        .unwrap_or(expr.len());
    let name = &expr[..name_end];
    let mut remaining = &expr[name_end..];

    let var = store.get(name).ok_or_else(|| VarError::Undefined(name.to_string()))?;
    let mut current = match var {
        VarValue::Scalar(v) => Resolved::Scalar(v),
        VarValue::Map(r) => Resolved::Map(r),
        VarValue::Lazy(_) => Resolved::Rows(store.resolve_lazy(name, recording, guard, list_match_mode)?),
    };

    loop {
        if remaining.is_empty() {
            break;
        }
        if let Some(stripped) = remaining.strip_prefix('[') {
            let end = stripped
                .find(']')
                .ok_or_else(|| VarError::BadLiteral(format!("`{expr}` missing closing ]")))?;
            let idx: usize = stripped[..end]
                .trim()
                .parse()
                .map_err(|_| VarError::BadLiteral(format!("`{expr}` has a non-numeric index")))?;
            current = current.index(idx, expr)?;
            remaining = &stripped[end + 1..];
        } else if let Some(stripped) = remaining.strip_prefix('.') {
            let field_end = stripped.find(['.', '[']).unwrap_or(stripped.len());
            let field = &stripped[..field_end];
            if field == "size" {
                return Ok(current.size().to_string());
            }
            current = current.field(field, expr)?;
            remaining = &stripped[field_end..];
        } else {
            return Err(VarError::BadLiteral(expr.to_string()));
        }
    }

    current.render(expr)
}

/// Parses a JSON-like map literal into a [`Row`]. Delegates to
/// `serde_json`, matching the config layer's reach for `serde`-backed
/// parsing over a bespoke literal grammar.
pub fn parse_map_literal(source: &str) -> Result<Row, VarError> {
    let parsed: serde_json::Value =
        serde_json::from_str(source).map_err(|e| VarError::BadLiteral(e.to_string()))?;
    let serde_json::Value::Object(map) = parsed else {
        return Err(VarError::BadLiteral("expected a map literal".to_string()));
    };
    let mut row = Row::new();
    for (k, v) in map {
        row.insert(k, json_to_value(&v));
    }
    Ok(row)
}

fn json_to_value(v: &serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => Value::Str(s.clone()),
        serde_json::Value::Array(items) => Value::List(items.iter().map(json_to_value).collect()),
        serde_json::Value::Object(map) => {
            let mut row = Row::new();
            for (k, v) in map {
                row.insert(k.clone(), json_to_value(v));
            }
            Value::Row(row)
        }
    }
}
