//! Cooperative Cancellation Module
//!
//! Provides cooperative cancellation for query execution: the engine
//! respects a cancellation token checked between events and between
//! pipeline stages. No forced termination.
//!
//! ## Design
//!
//! Uses a combination of:
//! - Atomic flag for cooperative cancellation
//! - An optional wall-clock timeout, checked at the same call sites
//!
//! The evaluator calls `.check()` once per event row; the pipeline runtime
//! calls it once per stage boundary (plus every 4096 rows within a stage
//! that retains a working set).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cancellation/timeout error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutError {
    /// The timeout duration that was exceeded (zero if cancelled explicitly
    /// rather than by timeout).
    pub timeout: Duration,
    /// How long the query actually ran.
    pub elapsed: Duration,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "query cancelled: exceeded timeout of {:?} (ran for {:?})",
            self.timeout, self.elapsed
        )
    }
}

impl std::error::Error for TimeoutError {}

/// Cooperative cancellation token shared between the evaluator and the
/// pipeline runtime.
///
/// The controller can be shared across threads and checked periodically.
#[derive(Clone)]
pub struct QueryCancellation {
    /// Cancellation flag (shared across threads)
    cancelled: Arc<AtomicBool>,

    /// When the query started
    start_time: Instant,

    /// Maximum allowed duration
    timeout_duration: Option<Duration>,
}

impl QueryCancellation {
    /// Create a new cancellation token with the specified timeout.
    pub fn new(timeout: Option<Duration>) -> Self {
        QueryCancellation {
            cancelled: Arc::new(AtomicBool::new(false)),
            start_time: Instant::now(),
            timeout_duration: timeout,
        }
    }

    /// A token with no timeout — only explicit `.cancel()` or an external
    /// `CancelHandle` can stop the query.
    pub fn none() -> Self {
        QueryCancellation::new(None)
    }

    /// Check if the query has been cancelled or timed out.
    ///
    /// This should be called periodically during query execution.
    /// Returns `Ok(())` if the query can continue, or `Err(TimeoutError)`
    /// if it should be cancelled.
    pub fn check(&self) -> Result<(), TimeoutError> {
        // Check explicit cancellation
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(TimeoutError {
                timeout: self.timeout_duration.unwrap_or(Duration::ZERO),
                elapsed: self.start_time.elapsed(),
            });
        }

        // Check timeout
        if let Some(timeout) = self.timeout_duration {
            let elapsed = self.start_time.elapsed();
            if elapsed > timeout {
                self.cancelled.store(true, Ordering::Relaxed);
                return Err(TimeoutError { timeout, elapsed });
            }
        }

        Ok(())
    }

    /// Cancel the query explicitly.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Check if the query has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Elapsed time since the query started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Remaining time before timeout, if any.
    pub fn remaining(&self) -> Option<Duration> {
        self.timeout_duration.map(|timeout| {
            let elapsed = self.start_time.elapsed();
            if elapsed >= timeout {
                Duration::ZERO
            } else {
                timeout - elapsed
            }
        })
    }

    /// A handle that can be used to cancel from another thread. There are
    /// no internal suspension points — a running query is interrupted only
    /// by abandoning the caller thread, so this handle is the one external
    /// escape hatch, meant for a host-side watchdog rather than the engine
    /// itself.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: Arc::clone(&self.cancelled),
        }
    }
}

impl Default for QueryCancellation {
    fn default() -> Self {
        QueryCancellation::none()
    }
}

/// Handle for cancelling a query from another thread.
#[derive(Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Cancel the associated query.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
