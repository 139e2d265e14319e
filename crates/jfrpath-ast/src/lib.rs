//! # JfrPath AST
//!
//! Abstract Syntax Tree types for the JfrPath query language: hierarchical
//! navigation over a JFR recording, predicate filtering with list-quantifier
//! semantics, and a pipeline of aggregation/projection stages.
//!
//! Kept dependency-free (beyond `serde`) so it can be depended on by a parser,
//! an evaluator, and any tooling that wants to construct or inspect queries
//! without pulling in the rest of the engine.
//!
//! ## Builders
//!
//! See the [`builders`] module for a fluent API useful in tests.

pub mod builders;

use serde::{Deserialize, Serialize};

// ============================================================================
// Query
// ============================================================================

/// A fully parsed JfrPath query: a root, a path through it, and a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Which top-level collection the query navigates.
    pub root: Root,
    /// Path steps after the root. The first step is conventionally the
    /// event/type name (e.g. `jdk.FileRead`); later steps descend into
    /// fields or list indices.
    pub path: Vec<PathStep>,
    /// `|`-separated pipeline stages, applied in the order written.
    pub pipeline: Vec<PipelineOp>,
}

impl Query {
    pub fn new(root: Root) -> Self {
        Query {
            root,
            path: Vec::new(),
            pipeline: Vec::new(),
        }
    }

    /// Segment names only (no attached predicates), for quick inspection.
    pub fn segment_names(&self) -> Vec<&Segment> {
        self.path.iter().map(|s| &s.segment).collect()
    }
}

/// The collection a query navigates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Root {
    Events,
    Metadata,
    Cp,
    Chunks,
}

impl Root {
    pub fn as_str(&self) -> &'static str {
        match self {
            Root::Events => "events",
            Root::Metadata => "metadata",
            Root::Cp => "cp",
            Root::Chunks => "chunks",
        }
    }
}

// ============================================================================
// Path / Segments / Predicates
// ============================================================================

/// A single step along a path, with zero or more predicates attached to it.
///
/// Predicates are attached directly to the step they filter so that
/// interleaved filters (`events/T[a>0]/heapSpace[b>0]`) are explicit in the
/// tree rather than re-derived from source offsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathStep {
    pub segment: Segment,
    #[serde(default)]
    pub predicates: Vec<Predicate>,
}

impl PathStep {
    pub fn field(name: impl Into<String>) -> Self {
        PathStep {
            segment: Segment::Field(name.into()),
            predicates: Vec::new(),
        }
    }

    pub fn index(i: i64) -> Self {
        PathStep {
            segment: Segment::Index(i),
            predicates: Vec::new(),
        }
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }
}

/// A path step: either a field name or a literal list index (`frames/0`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Segment {
    Field(String),
    Index(i64),
}

/// A bracketed predicate, e.g. `[bytes>=1000]` or `[any: frames[...]]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    /// Explicit `any:`/`all:`/`none:` prefix, if present. `None` means the
    /// evaluator's ambient default (ANY unless overridden externally) applies.
    pub mode: Option<ListMatchMode>,
    pub expr: BoolExpr,
}

/// How a predicate traversing a list field treats membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListMatchMode {
    Any,
    All,
    None,
}

/// A relative path reference used inside an expression (predicate operand,
/// function argument, or comparison side). Reuses [`PathStep`] so a
/// referenced path can itself carry nested predicates
/// (`stackTrace/frames[matches(...)]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathRef {
    pub steps: Vec<PathStep>,
}

impl PathRef {
    pub fn new(steps: Vec<PathStep>) -> Self {
        PathRef { steps }
    }

    pub fn single(name: impl Into<String>) -> Self {
        PathRef {
            steps: vec![PathStep::field(name)],
        }
    }
}

// ============================================================================
// Boolean expression tree (predicate bodies)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BoolExpr {
    Or(Box<BoolExpr>, Box<BoolExpr>),
    And(Box<BoolExpr>, Box<BoolExpr>),
    Not(Box<BoolExpr>),
    /// `path op (literal | path)`
    Compare {
        path: PathRef,
        op: ComparisonOp,
        rhs: CompareRhs,
    },
    /// A built-in predicate function call: `contains(...)`, `matches(...)`, etc.
    Call(FnCall),
    /// A bare path used as a boolean: true iff navigating it yields at least
    /// one value (respecting any nested predicates and list-quantifier modes
    /// along the way). This is what makes
    /// `stackTrace/frames[matches(method/name/string, "poll")]` a valid
    /// predicate body on its own.
    Path(PathRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    /// `~`, regex match
    Match,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CompareRhs {
    Literal(Literal),
    Path(PathRef),
}

/// A built-in predicate/value function call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FnCall {
    pub name: BuiltinFn,
    pub args: Vec<FnArg>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FnArg {
    Path(PathRef),
    Literal(Literal),
}

/// Built-in functions usable inside predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltinFn {
    Contains,
    StartsWith,
    EndsWith,
    Matches,
    Exists,
    Empty,
    Between,
    Len,
}

impl BuiltinFn {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "contains" => BuiltinFn::Contains,
            "starts_with" => BuiltinFn::StartsWith,
            "ends_with" => BuiltinFn::EndsWith,
            "matches" => BuiltinFn::Matches,
            "exists" => BuiltinFn::Exists,
            "empty" => BuiltinFn::Empty,
            "between" => BuiltinFn::Between,
            "len" => BuiltinFn::Len,
            _ => return None,
        })
    }
}

/// A literal value appearing in a query string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Null,
}

// ============================================================================
// Pipeline
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PipelineOp {
    Count,
    Sum {
        path: Option<PathRef>,
    },
    Stats {
        path: Option<PathRef>,
    },
    Quantiles {
        quantiles: Vec<f64>,
        path: Option<PathRef>,
    },
    Sketch {
        path: Option<PathRef>,
    },
    GroupBy {
        key: PathRef,
        agg: AggKind,
        value: Option<PathRef>,
        sort_by: SortBy,
        ascending: bool,
    },
    TopN {
        n: usize,
        by: Option<PathRef>,
        ascending: bool,
    },
    Select {
        items: Vec<SelectItem>,
    },
    ToMap {
        key_field: String,
        value_field: String,
    },
    ValueTransform {
        kind: TransformKind,
        /// Column the transform applies to (defaults to the implicit single
        /// column when omitted).
        path: Option<PathRef>,
        args: Vec<Literal>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggKind {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggKind {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "count" => AggKind::Count,
            "sum" => AggKind::Sum,
            "avg" => AggKind::Avg,
            "min" => AggKind::Min,
            "max" => AggKind::Max,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortBy {
    Key,
    Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformKind {
    Len,
    Upper,
    Lower,
    Trim,
    Abs,
    Round,
    Floor,
    Ceil,
    Contains,
    Replace,
}

impl TransformKind {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "len" => TransformKind::Len,
            "upper" => TransformKind::Upper,
            "lower" => TransformKind::Lower,
            "trim" => TransformKind::Trim,
            "abs" => TransformKind::Abs,
            "round" => TransformKind::Round,
            "floor" => TransformKind::Floor,
            "ceil" => TransformKind::Ceil,
            "contains" => TransformKind::Contains,
            "replace" => TransformKind::Replace,
            _ => return None,
        })
    }
}

// ============================================================================
// Expression sub-language: select(), templates, if/elif conditions
// ============================================================================

/// A standalone expression grammar, deliberately not merged with the path
/// grammar above: `/` means division here and path-separation there, and
/// conflating the two lexers/parsers is how that class of bug creeps in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),
    /// Reference to a column of the current row.
    Path(PathRef),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Built-in call: `if`, `upper`, `lower`, `substring`, `length`, `coalesce`, ...
    Call {
        name: String,
        args: Vec<Expr>,
    },
    /// `"text ${expr} text"` — alternating literal text and embedded expressions.
    Template(Vec<TemplatePart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TemplatePart {
    Text(String),
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    And,
    Or,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_segment_names() {
        let mut q = Query::new(Root::Events);
        q.path.push(PathStep::field("jdk.FileRead"));
        q.path.push(PathStep::field("bytes"));
        assert_eq!(q.segment_names().len(), 2);
    }

    #[test]
    fn path_ref_single() {
        let p = PathRef::single("bytes");
        assert_eq!(p.steps.len(), 1);
        assert_eq!(p.steps[0].segment, Segment::Field("bytes".to_string()));
    }

    #[test]
    fn builtin_fn_from_name() {
        assert_eq!(BuiltinFn::from_name("matches"), Some(BuiltinFn::Matches));
        assert_eq!(BuiltinFn::from_name("nope"), None);
    }

    #[test]
    fn agg_kind_from_name_roundtrip() {
        for name in ["count", "sum", "avg", "min", "max"] {
            assert!(AggKind::from_name(name).is_some());
        }
        assert_eq!(AggKind::from_name("bogus"), None);
    }
}
