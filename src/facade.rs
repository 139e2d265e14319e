//! # Query Facade
//!
//! Single entry point tying together `${...}` substitution, parsing
//! and evaluation, and the pipeline runtime, wrapped in a
//! `tracing::info_span!` per A4 for top-level request instrumentation.

use crate::config::Config;
use crate::error::EngineError;
use crate::eval;
use crate::execution::{ExecutionGuard, ResourceLimits};
use crate::pipeline;
use crate::recording::Recording;
use crate::value::{Row, Value};
use crate::vars::{self, Classification, LazyQuery, Scope, VarValue, VariableStore};
use jfrpath_ast::ListMatchMode;

/// Per-call overrides for [`Engine::execute`].
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub limit: Option<usize>,
    /// Informational only — rendering lives outside the core.
    pub format: OutputFormat,
    /// Ambient list-quantifier mode for predicates with no explicit
    /// `any:`/`all:`/`none:` prefix. `None` defers to
    /// `config.query.default_list_match`.
    pub list_match_mode: Option<ListMatchMode>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions {
            limit: None,
            format: OutputFormat::Table,
            list_match_mode: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

/// What a single `execute()` call produces: a row sequence, or the rendered
/// text of an `echo ${...}` statement.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    Rows(Vec<Row>),
    Echoed(String),
}

/// The JfrPath engine: a variable store plus the configuration that governs
/// cancellation and resource limits for every query it runs.
pub struct Engine {
    pub vars: VariableStore,
    config: Config,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Engine {
            vars: VariableStore::new(),
            config,
        }
    }

    fn guard(&self) -> ExecutionGuard {
        ExecutionGuard::new(
            self.config.query.cancellation.timeout(),
            ResourceLimits::from(&self.config.query.resource_limits),
        )
    }

    fn list_match_mode(&self, options: &QueryOptions) -> ListMatchMode {
        options.list_match_mode.unwrap_or(self.config.query.default_list_match)
    }

    /// Runs one statement: `set`/`unset`/`invalidate`/`echo`, or a plain
    /// JfrPath query.
    pub fn execute(&self, recording: &dyn Recording, query: &str, options: QueryOptions) -> Result<QueryOutcome, EngineError> {
        let span = tracing::info_span!("jfrpath.query", query = %query);
        let _enter = span.enter();
        let guard = self.guard();
        let trimmed = query.trim();

        if let Some(rest) = trimmed.strip_prefix("set ") {
            self.handle_set(rest, recording, &guard)?;
            return Ok(QueryOutcome::Rows(Vec::new()));
        }
        if let Some(rest) = trimmed.strip_prefix("unset ") {
            self.vars.remove(rest.trim(), Scope::Session);
            return Ok(QueryOutcome::Rows(Vec::new()));
        }
        if let Some(rest) = trimmed.strip_prefix("invalidate ") {
            self.vars.invalidate(rest.trim());
            return Ok(QueryOutcome::Rows(Vec::new()));
        }
        let list_match_mode = self.list_match_mode(&options);

        if let Some(rest) = trimmed.strip_prefix("echo ") {
            let expanded = vars::substitute(rest, &self.vars, recording, &guard, list_match_mode)?;
            return Ok(QueryOutcome::Echoed(expanded));
        }

        // `${varName} | ...` reuses the variable's cached rows directly
        // rather than rendering and re-parsing a literal.
        if let Some((var_name, tail)) = leading_variable_pipe(trimmed) {
            if let Some(VarValue::Lazy(_)) = self.vars.get(var_name) {
                let rows = self.vars.resolve_lazy(var_name, recording, &guard, list_match_mode)?;
                let ops = parse_pipeline_tail(tail)?;
                let rows = pipeline::run((*rows).clone(), &ops, &guard)?;
                return Ok(QueryOutcome::Rows(self.apply_limit(rows, &options)));
            }
        }

        let expanded = vars::substitute(trimmed, &self.vars, recording, &guard, list_match_mode)?;
        let parsed = crate::parser::parse_query(&expanded)?;
        let rows = eval::evaluate(recording, &parsed, &guard, list_match_mode)?;
        let rows = pipeline::run(rows, &parsed.pipeline, &guard)?;
        Ok(QueryOutcome::Rows(self.apply_limit(rows, &options)))
    }

    fn apply_limit(&self, mut rows: Vec<Row>, options: &QueryOptions) -> Vec<Row> {
        let limit = options.limit.unwrap_or(self.config.query.default_limit);
        rows.truncate(limit);
        rows
    }

    /// `set NAME = RHS` covering every assignment form: merge, map literal,
    /// variable copy, and bare scalar literals.
    fn handle_set(&self, rest: &str, recording: &dyn Recording, guard: &ExecutionGuard) -> Result<(), EngineError> {
        let (name, rhs) = rest
            .split_once('=')
            .ok_or_else(|| EngineError::Parse(crate::error::ParseError::new(0, "expected `set name = value`")))?;
        let name = name.trim().to_string();
        let rhs = rhs.trim();

        if let Some(args) = rhs.strip_prefix("merge(").and_then(|s| s.strip_suffix(')')) {
            let names: Vec<&str> = args.split(',').map(str::trim).collect();
            let merged = self.vars.merge(&names)?;
            self.vars.set(name, VarValue::Map(merged), Scope::Session);
            return Ok(());
        }
        if rhs.starts_with('{') {
            let row = vars::parse_map_literal(rhs)?;
            self.vars.set(name, VarValue::Map(row), Scope::Session);
            return Ok(());
        }
        if is_bare_identifier(rhs) {
            if let Some(existing) = self.vars.get(rhs) {
                // Deep copy for maps, fresh cache for lazy — `VarValue::clone`
                // already implements both.
                self.vars.set(name, existing, Scope::Session);
                return Ok(());
            }
        }
        if let Ok(i) = rhs.parse::<i64>() {
            self.vars.set(name, VarValue::Scalar(Value::Int(i)), Scope::Session);
            return Ok(());
        }
        if let Ok(f) = rhs.parse::<f64>() {
            self.vars.set(name, VarValue::Scalar(Value::Float(f)), Scope::Session);
            return Ok(());
        }
        if rhs.len() >= 2 && rhs.starts_with('"') && rhs.ends_with('"') {
            self.vars.set(
                name,
                VarValue::Scalar(Value::Str(rhs[1..rhs.len() - 1].to_string())),
                Scope::Session,
            );
            return Ok(());
        }

        let list_match_mode = self.config.query.default_list_match;
        let expanded = vars::substitute(rhs, &self.vars, recording, guard, list_match_mode)?;
        let parsed = crate::parser::parse_query(&expanded)?;
        let value = match vars::classify(&parsed) {
            Classification::EagerScalar => {
                let rows = eval::evaluate(recording, &parsed, guard, list_match_mode)?;
                let rows = pipeline::run(rows, &parsed.pipeline, guard)?;
                let scalar = rows.first().and_then(Row::single_value).cloned().unwrap_or(Value::Null);
                VarValue::Scalar(scalar)
            }
            Classification::EagerMap => {
                let rows = eval::evaluate(recording, &parsed, guard, list_match_mode)?;
                let rows = pipeline::run(rows, &parsed.pipeline, guard)?;
                VarValue::Map(rows.into_iter().next().unwrap_or_default())
            }
            Classification::Lazy => VarValue::Lazy(std::sync::Arc::new(LazyQuery::new(parsed))),
        };
        self.vars.set(name, value, Scope::Session);
        Ok(())
    }
}

fn is_bare_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_')
        && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn leading_variable_pipe(source: &str) -> Option<(&str, &str)> {
    let rest = source.strip_prefix("${")?;
    let end = rest.find('}')?;
    let name = &rest[..end];
    let tail = rest[end + 1..].trim_start().strip_prefix('|')?;
    Some((name, tail))
}

/// Parses just a pipeline tail by wrapping it behind a throwaway root and
/// discarding everything but the resulting `PipelineOp` list.
fn parse_pipeline_tail(tail: &str) -> Result<Vec<jfrpath_ast::PipelineOp>, EngineError> {
    let stand_in = format!("events/__cached__ | {}", tail.trim());
    let parsed = crate::parser::parse_query(&stand_in)?;
    Ok(parsed.pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{Catalog, ChunkInfo};

    struct FixtureRecording {
        catalog: Catalog,
    }

    impl Recording for FixtureRecording {
        fn catalog(&self) -> &Catalog {
            &self.catalog
        }
        fn event_types(&self) -> Vec<String> {
            Vec::new()
        }
        fn constant_pool_types(&self) -> Vec<String> {
            Vec::new()
        }
        fn iterate_events(&self, _type_name: &str) -> Result<Box<dyn Iterator<Item = Row> + '_>, crate::error::RecordingError> {
            Ok(Box::new(std::iter::empty()))
        }
        fn iterate_constant_pool(
            &self,
            _type_name: &str,
        ) -> Result<Box<dyn Iterator<Item = Row> + '_>, crate::error::RecordingError> {
            Ok(Box::new(std::iter::empty()))
        }
        fn resolve_constant(&self, _type_name: &str, _index: i64) -> Result<Option<Row>, crate::error::RecordingError> {
            Ok(None)
        }
        fn chunks(&self) -> &[ChunkInfo] {
            &[]
        }
    }

    #[test]
    fn set_scalar_literal_and_echo_it() {
        let engine = Engine::new(Config::default());
        let rec = FixtureRecording { catalog: Catalog::new() };
        engine.execute(&rec, "set threshold = 1000", QueryOptions::default()).unwrap();
        let out = engine.execute(&rec, "echo ${threshold}", QueryOptions::default()).unwrap();
        match out {
            QueryOutcome::Echoed(s) => assert_eq!(s, "1000"),
            QueryOutcome::Rows(_) => panic!("expected echoed text"),
        }
    }

    #[test]
    fn set_map_literal_and_read_field() {
        let engine = Engine::new(Config::default());
        let rec = FixtureRecording { catalog: Catalog::new() };
        engine
            .execute(&rec, r#"set cfg = {"cpuEngine": "asgct"}"#, QueryOptions::default())
            .unwrap();
        let out = engine.execute(&rec, "echo ${cfg.cpuEngine}", QueryOptions::default()).unwrap();
        match out {
            QueryOutcome::Echoed(s) => assert_eq!(s, "asgct"),
            QueryOutcome::Rows(_) => panic!("expected echoed text"),
        }
    }

    #[test]
    fn undefined_variable_in_query_is_reported() {
        let engine = Engine::new(Config::default());
        let rec = FixtureRecording { catalog: Catalog::new() };
        let err = engine.execute(&rec, "echo ${missing}", QueryOptions::default()).unwrap_err();
        assert!(matches!(err, EngineError::Var(crate::error::VarError::Undefined(_))));
    }

    #[test]
    fn options_override_takes_precedence_over_configured_default() {
        let mut config = Config::default();
        config.query.default_list_match = ListMatchMode::All;
        let engine = Engine::new(config);
        let options = QueryOptions {
            list_match_mode: Some(ListMatchMode::None),
            ..QueryOptions::default()
        };
        assert_eq!(engine.list_match_mode(&options), ListMatchMode::None);
    }

    #[test]
    fn unset_options_fall_back_to_configured_default() {
        let mut config = Config::default();
        config.query.default_list_match = ListMatchMode::All;
        let engine = Engine::new(config);
        assert_eq!(engine.list_match_mode(&QueryOptions::default()), ListMatchMode::All);
    }
}
