//! Command-line argument parsing for sqlguard.

use clap::{Parser, Subcommand};
use sqlguard::config::Config;
use sqlguard::safety::GuardMode;
use std::path::PathBuf;

/// Read-only SQL gatekeeper for LLM agents.
#[derive(Parser, Debug)]
#[command(name = "sqlguard")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// SQLite database URL or path (e.g., sqlite:///shop.db)
    #[arg(short = 'd', long, global = true, value_name = "URL")]
    pub database: Option<String>,

    /// Config file path
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Judge statements by their parse tree instead of keywords
    #[arg(long, global = true)]
    pub structural: bool,

    /// Row cap appended to unbounded statements
    #[arg(long, global = true, value_name = "N")]
    pub row_cap: Option<usize>,

    /// Per-statement timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Write logs to a file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run SQL through the guard and print the result as JSON
    Query {
        /// Candidate SQL statement
        sql: String,
    },
    /// Validate and rewrite SQL without executing it
    Check {
        /// Candidate SQL statement
        sql: String,
    },
    /// Print the introspected schema
    Schema,
    /// Print the assembled system prompt
    Prompt,
    /// Print the execute_sql tool definition as JSON
    Tool,
    /// Dispatch an execute_sql tool call with JSON arguments
    Call {
        /// Tool arguments, e.g. '{"sql": "SELECT 1"}'
        arguments: String,
    },
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Applies command-line overrides on top of file and environment values.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(url) = &self.database {
            config.database.url = Some(url.clone());
        }
        if self.structural {
            config.guard.mode = GuardMode::Structural;
        }
        if let Some(row_cap) = self.row_cap {
            config.guard.row_cap = row_cap;
        }
        if let Some(timeout) = self.timeout {
            config.guard.query_timeout_secs = timeout;
        }
    }
}
