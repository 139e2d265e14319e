//! Execution Guard
//!
//! Cooperative cancellation and resource limits shared by the evaluator
//! and pipeline runtime.
//!
//! ## Example
//!
//! ```rust
//! use jfrpath::execution::{ExecutionGuard, ResourceLimits};
//! use std::time::Duration;
//!
//! let guard = ExecutionGuard::new(Some(Duration::from_secs(30)), ResourceLimits::default());
//! assert!(guard.cancellation.check().is_ok());
//! ```

mod limits;
mod timeout;

pub use limits::ResourceLimits;
pub use timeout::{CancelHandle, QueryCancellation, TimeoutError};

use std::time::Duration;

/// Bundles the cancellation token and resource limits a single query runs
/// under, so the facade only has to thread one value through the
/// evaluator and pipeline runtime.
#[derive(Clone)]
pub struct ExecutionGuard {
    pub cancellation: QueryCancellation,
    pub limits: ResourceLimits,
}

impl ExecutionGuard {
    pub fn new(timeout: Option<Duration>, limits: ResourceLimits) -> Self {
        ExecutionGuard {
            cancellation: QueryCancellation::new(timeout),
            limits,
        }
    }
}

impl Default for ExecutionGuard {
    fn default() -> Self {
        ExecutionGuard::new(None, ResourceLimits::default())
    }
}
