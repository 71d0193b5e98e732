//! Mock database clients for testing.
//!
//! `MockDatabaseClient` records every statement it is asked to run, which
//! lets tests assert on the exact SQL the guard produced.

use super::{DatabaseClient, QueryResult, Schema};
use crate::error::{Result, SqlGuardError};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// A mock database client that returns a predefined result.
#[derive(Debug, Default)]
pub struct MockDatabaseClient {
    schema: Schema,
    result: QueryResult,
    executed: Mutex<Vec<String>>,
}

impl MockDatabaseClient {
    /// Creates a new mock client with an empty schema and empty results.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the schema returned by introspection.
    pub fn with_schema(self, schema: Schema) -> Self {
        Self { schema, ..self }
    }

    /// Sets the result returned for every statement.
    pub fn with_result(self, result: QueryResult) -> Self {
        Self { result, ..self }
    }

    /// Returns every statement executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|statements| statements.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn introspect_schema(&self) -> Result<Schema> {
        Ok(self.schema.clone())
    }

    async fn execute_query(&self, sql: &str, _timeout: Duration) -> Result<QueryResult> {
        self.executed
            .lock()
            .map_err(|_| SqlGuardError::internal("mock statement log poisoned"))?
            .push(sql.to_string());
        Ok(self.result.clone())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// A database client whose every statement fails with the same message.
#[derive(Debug)]
pub struct FailingDatabaseClient {
    message: String,
}

impl FailingDatabaseClient {
    /// Creates a client that fails with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl DatabaseClient for FailingDatabaseClient {
    async fn introspect_schema(&self) -> Result<Schema> {
        Err(SqlGuardError::query(self.message.clone()))
    }

    async fn execute_query(&self, _sql: &str, _timeout: Duration) -> Result<QueryResult> {
        Err(SqlGuardError::query(self.message.clone()))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
