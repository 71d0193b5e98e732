//! Read-only query guard.
//!
//! Decides whether a candidate SQL string may be executed, and rewrites it
//! with a row cap when it is unbounded. The checks run in a fixed order and
//! the first failing rule is the one reported.

mod parser;
mod textual;

pub use parser::{inspect, Inspection};
pub use textual::{has_aggregate, has_limit, is_select, trim_statement, write_keyword};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Row cap appended to unbounded SELECT statements.
pub const DEFAULT_ROW_CAP: usize = 200;

/// Reason the guard refused a statement.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// The statement contains INSERT/UPDATE/DELETE/DROP/TRUNCATE/ALTER/CREATE/REPLACE.
    #[error("write operations are not allowed")]
    WriteOperationDenied,
    /// The statement contains a terminator before its end.
    #[error("multiple statements are not allowed")]
    MultipleStatementsDenied,
    /// The statement does not start with SELECT.
    #[error("only SELECT statements are allowed")]
    NonSelectDenied,
}

impl Rejection {
    /// Returns the stable reason code for this rejection.
    pub fn code(&self) -> &'static str {
        match self {
            Self::WriteOperationDenied => "WriteOperationDenied",
            Self::MultipleStatementsDenied => "MultipleStatementsDenied",
            Self::NonSelectDenied => "NonSelectDenied",
        }
    }
}

/// Outcome of running a candidate statement through the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The statement may run; holds the normalized (possibly capped) SQL.
    Accepted(String),
    /// The statement was refused.
    Rejected(Rejection),
}

impl Verdict {
    /// Returns true if the statement was accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// Converts the verdict into a `Result`.
    pub fn into_result(self) -> std::result::Result<String, Rejection> {
        match self {
            Self::Accepted(sql) => Ok(sql),
            Self::Rejected(reason) => Err(reason),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted(sql) => write!(f, "Accepted: {sql}"),
            Self::Rejected(reason) => write!(f, "Rejected ({}): {reason}", reason.code()),
        }
    }
}

/// How the guard inspects statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardMode {
    /// Keyword matching over the raw text.
    #[default]
    Textual,
    /// Verdict from the parse tree, falling back to keyword matching for
    /// statements that do not parse.
    Structural,
}

impl GuardMode {
    /// Returns the mode as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Textual => "textual",
            Self::Structural => "structural",
        }
    }
}

impl FromStr for GuardMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "textual" => Ok(Self::Textual),
            "structural" => Ok(Self::Structural),
            _ => Err(format!(
                "Invalid guard mode: {s}. Expected: textual or structural"
            )),
        }
    }
}

/// Validator and rewriter for candidate statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOnlyGuard {
    mode: GuardMode,
    row_cap: usize,
}

impl Default for ReadOnlyGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadOnlyGuard {
    /// Creates a textual guard with the default row cap.
    pub fn new() -> Self {
        Self {
            mode: GuardMode::Textual,
            row_cap: DEFAULT_ROW_CAP,
        }
    }

    /// Sets the inspection mode.
    pub fn with_mode(self, mode: GuardMode) -> Self {
        Self { mode, ..self }
    }

    /// Sets the row cap appended to unbounded statements.
    pub fn with_row_cap(self, row_cap: usize) -> Self {
        Self { row_cap, ..self }
    }

    /// Returns the inspection mode.
    pub fn mode(&self) -> GuardMode {
        self.mode
    }

    /// Returns the row cap.
    pub fn row_cap(&self) -> usize {
        self.row_cap
    }

    /// Runs every check against `candidate` and returns the verdict.
    pub fn check(&self, candidate: &str) -> Verdict {
        let sql = trim_statement(candidate);

        if self.mode == GuardMode::Structural {
            match inspect(sql) {
                Inspection::Read => return Verdict::Accepted(self.apply_row_cap(sql)),
                Inspection::Rejected(reason) => return Verdict::Rejected(reason),
                Inspection::Unparsed => debug!("Falling back to keyword checks"),
            }
        }
        self.check_text(sql)
    }

    fn check_text(&self, sql: &str) -> Verdict {
        if let Some(keyword) = write_keyword(sql) {
            debug!("Rejected statement containing {keyword}");
            return Verdict::Rejected(Rejection::WriteOperationDenied);
        }
        if sql.contains(';') {
            return Verdict::Rejected(Rejection::MultipleStatementsDenied);
        }
        if !is_select(sql) {
            return Verdict::Rejected(Rejection::NonSelectDenied);
        }

        Verdict::Accepted(self.apply_row_cap(sql))
    }

    /// Appends the row cap unless the statement is already bounded or aggregated.
    fn apply_row_cap(&self, sql: &str) -> String {
        if has_limit(sql) || has_aggregate(sql) {
            return sql.to_string();
        }

        debug!("Appending LIMIT {} to unbounded statement", self.row_cap);
        // A trailing line comment would swallow a clause on the same line.
        let last_line = sql.rsplit('\n').next().unwrap_or(sql);
        if last_line.contains("--") {
            format!("{sql}\nLIMIT {}", self.row_cap)
        } else {
            format!("{sql} LIMIT {}", self.row_cap)
        }
    }
}
