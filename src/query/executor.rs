//! Guarded query execution.
//!
//! Runs a candidate statement through the guard, executes what survives
//! against the shared store under a timeout, and turns every failure into a
//! `SqlGuardError` value.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::db::{DatabaseClient, QueryResult, Schema};
use crate::error::{Result, SqlGuardError};
use crate::safety::{ReadOnlyGuard, Verdict};

/// Default per-statement timeout.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra time a store gets to stop an expired statement before the call is abandoned.
const STORE_CANCEL_GRACE: Duration = Duration::from_millis(250);

/// Query executor that validates statements before they reach the store.
#[derive(Clone)]
pub struct GuardedExecutor {
    db: Arc<dyn DatabaseClient>,
    guard: ReadOnlyGuard,
    timeout: Duration,
}

impl std::fmt::Debug for GuardedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedExecutor")
            .field("guard", &self.guard)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl GuardedExecutor {
    /// Creates a new executor over a shared store.
    pub fn new(db: Arc<dyn DatabaseClient>, guard: ReadOnlyGuard) -> Self {
        Self {
            db,
            guard,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Sets the per-statement timeout.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Returns the guard used by this executor.
    pub fn guard(&self) -> &ReadOnlyGuard {
        &self.guard
    }

    /// Validates and rewrites a statement without executing it.
    pub fn check(&self, candidate: &str) -> Verdict {
        self.guard.check(candidate)
    }

    /// Validates, rewrites, and executes a candidate statement.
    ///
    /// Rejections come back as `SqlGuardError::Policy`; anything the store
    /// reports, including a timeout, comes back as `SqlGuardError::Query`.
    /// The store is asked to stop the statement at the timeout; the call is
    /// abandoned shortly after if it does not. Nothing is retried.
    pub async fn execute(&self, candidate: &str) -> Result<QueryResult> {
        let sql = match self.guard.check(candidate) {
            Verdict::Accepted(sql) => sql,
            Verdict::Rejected(reason) => {
                warn!("Rejected statement ({}): {}", reason.code(), candidate.trim());
                return Err(reason.into());
            }
        };

        let start = Instant::now();
        let result = tokio::time::timeout(
            self.timeout + STORE_CANCEL_GRACE,
            self.db.execute_query(&sql, self.timeout),
        )
        .await
        .map_err(|_| SqlGuardError::query(format!("Query timed out after {:?}", self.timeout)))
        .and_then(|result| result);
        let execution_time = start.elapsed();

        match &result {
            Ok(query_result) => info!(
                "Executed in {:?}, {} rows: {}",
                execution_time,
                query_result.row_count(),
                sql
            ),
            Err(e) => warn!("Execution failed after {:?}: {}", execution_time, e),
        }

        result
    }

    /// Introspects the schema of the underlying store.
    pub async fn schema(&self) -> Result<Schema> {
        self.db.introspect_schema().await
    }

    /// Closes the underlying store.
    pub async fn close(&self) -> Result<()> {
        self.db.close().await
    }
}
