//! Configuration management for sqlguard.
//!
//! Handles loading configuration from TOML files and environment variables:
//! the database location and table allow-list, guard settings, and prompt
//! notes.

use crate::error::{Result, SqlGuardError};
use crate::safety::{GuardMode, ReadOnlyGuard, DEFAULT_ROW_CAP};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Environment variables consulted for the database URL, in order.
pub const DATABASE_URL_ENV_VARS: &[&str] = &["SQLGUARD_DATABASE_URL", "DATABASE_URL"];

/// Main configuration structure for sqlguard.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Database location and visibility.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Guard settings.
    #[serde(default)]
    pub guard: GuardConfig,

    /// System prompt settings.
    #[serde(default)]
    pub prompt: PromptConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// SQLite URL or path (e.g., `sqlite:///mydb.db`).
    pub url: Option<String>,

    /// Tables exposed to the agent; empty means every user table.
    #[serde(default)]
    pub include_tables: Vec<String>,

    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    4
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            include_tables: Vec::new(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// Creates a config pointing at the given URL with default settings.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Resolves the configured URL into a SQLite location.
    pub fn location(&self) -> Result<SqliteLocation> {
        let url = self.url.as_deref().ok_or_else(|| {
            SqlGuardError::config(format!(
                "No database configured. Pass --database, set {}, or add [database] url to the config file",
                DATABASE_URL_ENV_VARS[0]
            ))
        })?;
        SqliteLocation::parse(url)
    }
}

/// Guard configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuardConfig {
    /// Inspection mode: "textual" or "structural".
    #[serde(default)]
    pub mode: GuardMode,

    /// Row cap appended to unbounded statements.
    #[serde(default = "default_row_cap")]
    pub row_cap: usize,

    /// Per-statement execution timeout.
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

fn default_row_cap() -> usize {
    DEFAULT_ROW_CAP
}

fn default_query_timeout_secs() -> u64 {
    30
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            mode: GuardMode::default(),
            row_cap: default_row_cap(),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

/// System prompt configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PromptConfig {
    /// Business rules appended to the prompt (e.g., how revenue is computed).
    pub notes: Option<String>,
}

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteLocation {
    /// Private in-memory database.
    Memory,
    /// Database file on disk.
    File(PathBuf),
}

impl SqliteLocation {
    /// Parses a SQLite URL or bare path.
    ///
    /// URLs follow SQLAlchemy's convention: `sqlite:///relative.db`,
    /// `sqlite:////absolute.db`, `sqlite://` for memory. `sqlite:path`,
    /// `sqlite::memory:`, `:memory:` and plain file paths are accepted too.
    /// Paths are percent-decoded. The only query parameter allowed is
    /// `mode=ro`, since the database is always opened read-only.
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(SqlGuardError::config("Database URL is empty"));
        }
        if url == ":memory:" {
            return Ok(Self::Memory);
        }

        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            // No scheme: a plain filesystem path.
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                return Ok(Self::File(PathBuf::from(url)))
            }
            Err(e) => {
                return Err(SqlGuardError::config(format!(
                    "Invalid database URL '{url}': {e}"
                )))
            }
        };

        if parsed.scheme() != "sqlite" {
            return Err(SqlGuardError::config(format!(
                "Invalid scheme '{}'. Expected 'sqlite'",
                parsed.scheme()
            )));
        }

        for (key, value) in parsed.query_pairs() {
            if !(key == "mode" && value == "ro") {
                return Err(SqlGuardError::config(format!(
                    "Unsupported database URL parameter '{key}={value}'. Databases are always opened read-only"
                )));
            }
        }

        // `sqlite://name.db` puts the file name in the host position.
        let host = parsed.host_str().unwrap_or("");
        let encoded = if !host.is_empty() {
            format!("{host}{}", parsed.path())
        } else if parsed.has_host() {
            // `sqlite:///a.db` is relative, `sqlite:////a.db` absolute.
            parsed.path().strip_prefix('/').unwrap_or(parsed.path()).to_string()
        } else {
            parsed.path().to_string()
        };

        let path = percent_decode_str(&encoded).decode_utf8().map_err(|e| {
            SqlGuardError::config(format!("Database URL '{url}' is not valid UTF-8: {e}"))
        })?;

        match path.as_ref() {
            "" | ":memory:" => Ok(Self::Memory),
            path => Ok(Self::File(PathBuf::from(path))),
        }
    }

    /// Returns a display-safe description for logs.
    pub fn display_string(&self) -> String {
        match self {
            Self::Memory => ":memory:".to_string(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sqlguard")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file; a missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| SqlGuardError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            SqlGuardError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Fills the database URL from the environment when the file left it unset.
    pub fn apply_env_defaults(&mut self) {
        if self.database.url.is_none() {
            self.database.url = DATABASE_URL_ENV_VARS
                .iter()
                .find_map(|name| std::env::var(name).ok())
                .filter(|url| !url.trim().is_empty());
        }
    }

    /// Checks values that serde cannot constrain.
    pub fn validate(&self) -> Result<()> {
        if self.guard.row_cap == 0 {
            return Err(SqlGuardError::config(
                "guard.row_cap must be greater than zero",
            ));
        }
        if self.guard.query_timeout_secs == 0 {
            return Err(SqlGuardError::config(
                "guard.query_timeout_secs must be greater than zero",
            ));
        }
        if self.database.max_connections == 0 {
            return Err(SqlGuardError::config(
                "database.max_connections must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Builds the guard described by this configuration.
    pub fn guard(&self) -> ReadOnlyGuard {
        ReadOnlyGuard::new()
            .with_mode(self.guard.mode)
            .with_row_cap(self.guard.row_cap)
    }

    /// Returns the per-statement timeout.
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.guard.query_timeout_secs)
    }
}
