//! Database abstraction layer for sqlguard.
//!
//! Provides a trait-based interface for the store behind the guard, so the
//! executor can run against SQLite or an in-memory mock.

mod mock;
mod schema;
mod sqlite;
mod types;

pub use mock::{FailingDatabaseClient, MockDatabaseClient};
pub use schema::{Column, ForeignKey, Schema, Table};
pub use sqlite::SqliteClient;
pub use types::{QueryResult, Row, Value};

use crate::config::DatabaseConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Opens the shared store described by the configuration.
///
/// The returned handle is meant to be created once at startup, handed to
/// every executor that needs it, and closed explicitly on shutdown.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn DatabaseClient>> {
    let client = SqliteClient::connect(config).await?;
    Ok(Arc::new(client))
}

/// Trait defining the interface for database clients.
///
/// Implementations must be safe to share between concurrent callers; each
/// call checks out whatever per-call resources it needs.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Introspects the visible schema.
    async fn introspect_schema(&self) -> Result<Schema>;

    /// Executes a SQL statement and materializes every row.
    ///
    /// A statement still running after `timeout` is stopped, and its
    /// connection is released before the error is returned.
    async fn execute_query(&self, sql: &str, timeout: Duration) -> Result<QueryResult>;

    /// Closes the underlying connections.
    async fn close(&self) -> Result<()>;
}
