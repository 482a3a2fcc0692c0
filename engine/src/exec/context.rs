//! Per-query execution state shared by every operator.

use crate::adapter::{AdapterOptions, AdapterRegistry};
use crate::error::{CancelReason, QueryError};
use crate::value::{Row, Value};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Cooperative cancellation flag, clonable across threads.
///
/// # Example
///
/// ```
/// use engine::CancellationHandle;
///
/// let handle = CancellationHandle::new();
/// let remote = handle.clone();
/// remote.cancel();
/// assert!(handle.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle(Arc<AtomicBool>);

impl CancellationHandle {
    /// Creates a handle that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Running queries stop at their next pull.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns true once [`CancellationHandle::cancel`] was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// State owned by one running query.
pub struct ExecContext {
    pub(crate) registry: Arc<AdapterRegistry>,
    pub(crate) adapter_options: AdapterOptions,
    pub(crate) prefetch_rows: usize,
    /// Values captured from the enclosing row while a correlated subquery
    /// runs.
    pub(crate) params: Vec<Value>,
    pub(crate) subquery_cache: HashMap<usize, Arc<Vec<Row>>>,
    /// Evaluation time used by `NOW()`; fixed for the whole query.
    pub(crate) now: DateTime<Utc>,
    warnings: u64,
    max_logged_warnings: u64,
    cancel: CancellationHandle,
    deadline: Option<Instant>,
}

impl ExecContext {
    /// Creates a context reading sources through `registry`.
    #[must_use]
    pub fn new(registry: Arc<AdapterRegistry>, adapter_options: AdapterOptions) -> Self {
        Self {
            registry,
            adapter_options,
            prefetch_rows: 0,
            params: Vec::new(),
            subquery_cache: HashMap::new(),
            now: Utc::now(),
            warnings: 0,
            max_logged_warnings: 10,
            cancel: CancellationHandle::new(),
            deadline: None,
        }
    }

    /// Decodes scans on a worker thread with `rows` records of read-ahead;
    /// zero disables prefetch.
    #[must_use]
    pub fn with_prefetch(mut self, rows: usize) -> Self {
        self.prefetch_rows = rows;
        self
    }

    /// Number of warnings logged individually before only counting.
    #[must_use]
    pub fn with_max_logged_warnings(mut self, max: u64) -> Self {
        self.max_logged_warnings = max;
        self
    }

    /// Observes `handle` for cancellation.
    #[must_use]
    pub fn with_cancellation(mut self, handle: CancellationHandle) -> Self {
        self.cancel = handle;
        self
    }

    /// Fails the query with a timeout once `deadline` passes.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Records a runtime type warning.
    pub fn warn(&mut self, message: impl fmt::Display) {
        self.warnings += 1;
        if self.warnings <= self.max_logged_warnings {
            tracing::debug!(warning = %message, "Runtime type warning");
        }
    }

    /// Warnings recorded so far.
    #[must_use]
    pub fn warnings(&self) -> u64 {
        self.warnings
    }

    /// Warnings counted but not logged.
    #[must_use]
    pub fn suppressed_warnings(&self) -> u64 {
        self.warnings.saturating_sub(self.max_logged_warnings)
    }

    /// Fails if the query was cancelled or ran past its deadline.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Cancelled`].
    pub fn check_cancelled(&self) -> Result<(), QueryError> {
        if self.cancel.is_cancelled() {
            return Err(QueryError::Cancelled(CancelReason::User));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(QueryError::Cancelled(CancelReason::Timeout));
        }
        Ok(())
    }
}

impl fmt::Debug for ExecContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecContext")
            .field("prefetch_rows", &self.prefetch_rows)
            .field("params", &self.params.len())
            .field("warnings", &self.warnings)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn context() -> ExecContext {
        ExecContext::new(Arc::new(AdapterRegistry::with_defaults()), AdapterOptions::default())
    }

    #[test]
    fn test_cancellation() {
        let handle = CancellationHandle::new();
        let ctx = context().with_cancellation(handle.clone());
        assert!(ctx.check_cancelled().is_ok());
        handle.cancel();
        assert!(matches!(
            ctx.check_cancelled(),
            Err(QueryError::Cancelled(CancelReason::User))
        ));
    }

    #[test]
    fn test_deadline() {
        let past = Instant::now().checked_sub(Duration::from_millis(1));
        let ctx = context().with_deadline(past);
        assert!(matches!(
            ctx.check_cancelled(),
            Err(QueryError::Cancelled(CancelReason::Timeout))
        ));
    }

    #[test]
    fn test_warning_counts() {
        let mut ctx = context().with_max_logged_warnings(2);
        for i in 0..5 {
            ctx.warn(format!("warning {i}"));
        }
        assert_eq!(ctx.warnings(), 5);
        assert_eq!(ctx.suppressed_warnings(), 3);
    }
}
