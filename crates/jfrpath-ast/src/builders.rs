//! Builder Patterns for AST Construction
//!
//! Fluent APIs for constructing [`Query`] trees by hand, particularly useful
//! for tests that want to assert on a parsed AST without hand-writing nested
//! struct literals.
//!
//! ## Example
//!
//! ```rust
//! use jfrpath_ast::builders::QueryBuilder;
//! use jfrpath_ast::{PipelineOp, Root};
//!
//! let query = QueryBuilder::new(Root::Events)
//!     .field("jdk.FileRead")
//!     .field("bytes")
//!     .pipe(PipelineOp::Count)
//!     .build();
//!
//! assert_eq!(query.path.len(), 2);
//! assert_eq!(query.pipeline.len(), 1);
//! ```

use crate::{PathStep, Predicate, Query, Root, Segment};

/// Builder for constructing [`Query`] instances.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new(root: Root) -> Self {
        QueryBuilder {
            query: Query::new(root),
        }
    }

    /// Append a field segment.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.query.path.push(PathStep::field(name));
        self
    }

    /// Append an index segment.
    pub fn index(mut self, i: i64) -> Self {
        self.query.path.push(PathStep::index(i));
        self
    }

    /// Attach a predicate to the most recently appended segment.
    pub fn predicate(mut self, predicate: Predicate) -> Self {
        if let Some(step) = self.query.path.last_mut() {
            step.predicates.push(predicate);
        }
        self
    }

    /// Append a pipeline stage.
    pub fn pipe(mut self, op: crate::PipelineOp) -> Self {
        self.query.pipeline.push(op);
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

/// Builder for a single [`PathStep`], useful when constructing nested
/// [`crate::PathRef`]s inside predicate bodies.
#[derive(Debug, Clone)]
pub struct PathStepBuilder {
    step: PathStep,
}

impl PathStepBuilder {
    pub fn field(name: impl Into<String>) -> Self {
        PathStepBuilder {
            step: PathStep {
                segment: Segment::Field(name.into()),
                predicates: Vec::new(),
            },
        }
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.step.predicates.push(predicate);
        self
    }

    pub fn build(self) -> PathStep {
        self.step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PipelineOp;

    #[test]
    fn builds_simple_query() {
        let query = QueryBuilder::new(Root::Events)
            .field("jdk.FileRead")
            .field("bytes")
            .pipe(PipelineOp::Count)
            .build();

        assert_eq!(query.path.len(), 2);
        assert_eq!(query.pipeline.len(), 1);
        assert_eq!(query.root, Root::Events);
    }
}
