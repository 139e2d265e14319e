//! Error Taxonomy
//!
//! One `thiserror` enum per component, aggregated into [`EngineError`] so
//! [`crate::facade::Engine::execute`] has a single return type.

use thiserror::Error;

/// Syntactic problem in a query string, with the character offset it was
/// found at. No partial AST is ever returned alongside this error.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub position: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(position: usize, message: impl Into<String>) -> Self {
        ParseError {
            position,
            message: message.into(),
        }
    }
}

/// Errors raised while evaluating a parsed query against a recording.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unknown type: {0}")]
    UnknownType(String),

    #[error("unknown field `{field}` on type `{type_name}`")]
    UnknownField { type_name: String, field: String },

    #[error("unknown pipeline operator: {0}")]
    UnknownFunction(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("invalid regex: {0}")]
    BadRegex(#[from] regex::Error),

    #[error(transparent)]
    Recording(#[from] RecordingError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("query cancelled")]
    Cancelled,
}

/// Errors raised by the expression sub-language: `select()`, templates,
/// and condition expressions.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExprError {
    #[error("division by zero")]
    DivZero,

    #[error("unknown function: {0}")]
    UnknownFn(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),
}

/// Errors raised by the variable store and `${...}` substitutor.
#[derive(Debug, Error)]
pub enum VarError {
    #[error("undefined variable: {0}")]
    Undefined(String),

    #[error("variable `{0}` is not a map")]
    NotAMap(String),

    #[error("invalid literal: {0}")]
    BadLiteral(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Expr(#[from] ExprError),
}

/// Errors surfaced by the `Recording` trait contract.
#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed recording: {0}")]
    Format(String),

    #[error("recording handle is closed")]
    ClosedHandle,
}

/// Errors from the cooperative resource-limit guard.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResourceError {
    #[error("retained set exceeded limit of {limit} rows at stage '{stage}' ({actual} rows)")]
    RetainedSetExceeded {
        stage: String,
        limit: usize,
        actual: usize,
    },

    #[error("path depth {actual} exceeds configured limit of {limit} segments")]
    PathTooDeep { limit: usize, actual: usize },
}

/// Aggregating error type returned by [`crate::facade::Engine::execute`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Expr(#[from] ExprError),

    #[error(transparent)]
    Var(#[from] VarError),

    #[error(transparent)]
    Recording(#[from] RecordingError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("query cancelled")]
    Cancelled,
}
