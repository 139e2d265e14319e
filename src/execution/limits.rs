//! Resource Limits Module
//!
//! Bounds the retained working set of pipeline stages that must materialize
//! rows (`groupBy`, `top`, `quantiles`, `sketch`): memory stays proportional
//! to the retained set only if there is a ceiling.
//!
//! ## Design
//!
//! Cooperative checking — a stage calls `check_retained` after growing its
//! working set and gets `ResourceError::RetainedSetExceeded` once it crosses
//! the configured limit, rather than growing unbounded.

use crate::error::ResourceError;

/// Resource limits configuration for a single query's pipeline.
#[derive(Debug, Clone, Copy)]
pub struct ResourceLimits {
    /// Maximum number of rows a single pipeline stage may retain in memory
    /// (`None` = unlimited).
    pub max_retained_rows: Option<usize>,

    /// Maximum number of path segments a single query may navigate
    /// (`None` = unlimited). Guards against pathologically deep queries
    /// rather than any recursive structure in the engine itself — the
    /// parser and evaluator are both iterative.
    pub max_path_depth: Option<usize>,
}

impl ResourceLimits {
    pub fn unlimited() -> Self {
        ResourceLimits {
            max_retained_rows: None,
            max_path_depth: None,
        }
    }

    pub fn with_max_retained_rows(max: usize) -> Self {
        ResourceLimits {
            max_retained_rows: Some(max),
            max_path_depth: Some(default_max_path_depth()),
        }
    }

    /// Check a stage's current retained-row count against the configured
    /// ceiling, tagging a violation with the stage name for diagnostics.
    pub fn check_retained(&self, stage: &str, actual: usize) -> Result<(), ResourceError> {
        if let Some(limit) = self.max_retained_rows {
            if actual > limit {
                return Err(ResourceError::RetainedSetExceeded {
                    stage: stage.to_string(),
                    limit,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Check a query's path segment count against the configured ceiling.
    pub fn check_path_depth(&self, actual: usize) -> Result<(), ResourceError> {
        if let Some(limit) = self.max_path_depth {
            if actual > limit {
                return Err(ResourceError::PathTooDeep { limit, actual });
            }
        }
        Ok(())
    }
}

fn default_max_path_depth() -> usize {
    64
}

impl Default for ResourceLimits {
    fn default() -> Self {
        // 1,000,000 rows is large enough for any single JFR recording's
        // per-event-type volume while still bounding worst-case memory.
        ResourceLimits::with_max_retained_rows(1_000_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_never_errors() {
        let limits = ResourceLimits::unlimited();
        assert!(limits.check_retained("groupBy", 10_000_000).is_ok());
    }

    #[test]
    fn exceeding_limit_errors_with_stage_name() {
        let limits = ResourceLimits::with_max_retained_rows(10);
        let err = limits.check_retained("top", 11).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::RetainedSetExceeded { ref stage, limit: 10, actual: 11 }
                if stage == "top"
        ));
    }

    #[test]
    fn default_limit_is_generous() {
        let limits = ResourceLimits::default();
        assert!(limits.check_retained("groupBy", 1000).is_ok());
    }

    #[test]
    fn path_depth_within_default_limit_is_ok() {
        let limits = ResourceLimits::default();
        assert!(limits.check_path_depth(10).is_ok());
    }

    #[test]
    fn path_depth_exceeding_limit_errors() {
        let limits = ResourceLimits::default();
        let err = limits.check_path_depth(65).unwrap_err();
        assert!(matches!(err, ResourceError::PathTooDeep { limit: 64, actual: 65 }));
    }

    #[test]
    fn unlimited_path_depth_never_errors() {
        let limits = ResourceLimits::unlimited();
        assert!(limits.check_path_depth(10_000).is_ok());
    }
}
