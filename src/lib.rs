//! # JfrPath
//!
//! A read-only query engine for Java Flight Recorder (JFR) recordings. A
//! JfrPath query navigates a recording's event streams, constant pools, and
//! metadata catalog with a small path grammar, filters with predicates that
//! carry explicit list-quantifier semantics (`any:`/`all:`/`none:`), and
//! pipes the resulting rows through aggregation/projection stages
//! (`count`, `stats`, `groupBy`, `select`, ...).
//!
//! ## Pipeline Architecture
//!
//! ```text
//! query string
//!     │
//!     ├─ ${...} substitution (C8 vars)
//!     ▼
//! Parser                → Query AST (jfrpath-ast)
//!     ▼
//! Evaluator               → Row sequence, navigating Recording/Catalog
//!     ▼
//! Pipeline Runtime        → aggregation / projection stages
//!     ▼
//! rows (truncated to `options.limit`)
//! ```
//!
//! `select()` bodies, string templates, and `if`/`elif` conditions are
//! evaluated by a small expression sub-language (C7, [`expr`]) with its own
//! lexer — deliberately not unified with the path grammar's lexer, since `/`
//! means path-separator in one and division in the other.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use jfrpath::facade::{Engine, QueryOptions};
//! use jfrpath::config::Config;
//!
//! let engine = Engine::new(Config::default());
//! let outcome = engine.execute(&recording, "events/jdk.FileRead[bytes>=1000] | count()", QueryOptions::default())?;
//! ```
//!
//! ## Module Organization
//!
//! | Module | Component | Purpose |
//! |--------|-----------|---------|
//! | `recording` | C1, C2 | `Recording` trait, `Catalog`/`TypeDescriptor` |
//! | `value` | C3 | `Value`/`Row` runtime value model |
//! | `parser` | C4 | Query string → `Query` AST |
//! | `eval` | C5 | AST → row sequence over a `Recording` |
//! | `pipeline` | C6 | Row sequence → aggregated/projected rows |
//! | `expr` | C7 | `select()`/template/condition expression language |
//! | `vars` | C8 | Variable store and `${...}` substitutor |
//! | `facade` | C9 | `Engine::execute` entry point |
//! | `config` | A1 | Hierarchical configuration (`figment`) |
//! | `execution` | A2 | Cooperative cancellation, resource limits |
//! | `error` | A3 | Per-component `thiserror` error taxonomy |

pub mod config;
pub mod error;
pub mod eval;
pub mod execution;
pub mod expr;
pub mod facade;
pub mod parser;
pub mod pipeline;
pub mod recording;
pub mod value;
pub mod vars;

pub use config::Config;
pub use error::{EngineError, ExprError, ParseError, QueryError, RecordingError, ResourceError, VarError};
pub use facade::{Engine, OutputFormat, QueryOptions, QueryOutcome};
pub use recording::{Catalog, ChunkInfo, Recording};
pub use value::{Row, Value};

pub use jfrpath_ast::{ListMatchMode, Query};
