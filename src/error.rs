//! Error types for sqlguard.
//!
//! Every failure that can cross the executor boundary is a value of
//! [`SqlGuardError`]; nothing is allowed to escape as a panic.

use crate::safety::Rejection;
use thiserror::Error;

/// Main error type for sqlguard operations.
#[derive(Error, Debug)]
pub enum SqlGuardError {
    /// Database connection errors (missing file, pool exhaustion, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution errors reported by the store (syntax errors, missing tables, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// The guard refused to run the statement.
    #[error("Policy violation: {0}")]
    Policy(#[from] Rejection),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SqlGuardError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the rejection reason if the guard refused the statement.
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Policy(reason) => Some(*reason),
            _ => None,
        }
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Policy(_) => "Policy Violation",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using SqlGuardError.
pub type Result<T> = std::result::Result<T, SqlGuardError>;
