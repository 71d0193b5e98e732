//! SQLite database client implementation.
//!
//! Provides the `SqliteClient` struct that implements the `DatabaseClient`
//! trait on top of a read-only sqlx connection pool.

use crate::config::{DatabaseConfig, SqliteLocation};
use crate::db::{Column, DatabaseClient, ForeignKey, QueryResult, Row, Schema, Table, Value};
use crate::error::{Result, SqlGuardError};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Column as SqlxColumn, Executor, Row as SqlxRow, Sqlite, TypeInfo, ValueRef};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How long a statement waits on a locked database before failing.
const BUSY_TIMEOUT_SECS: u64 = 5;

/// How long a caller waits to check out a pooled connection.
const ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// Virtual machine instructions between statement deadline checks.
const PROGRESS_CHECK_OPS: i32 = 1_000;

/// SQLite database client.
#[derive(Debug, Clone)]
pub struct SqliteClient {
    pool: SqlitePool,
    include_tables: Vec<String>,
}

impl SqliteClient {
    /// Opens a read-only pool for the configured database.
    ///
    /// File databases are opened with `mode=ro`, so the store refuses
    /// writes even if a statement slips past the guard.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let location = config.location()?;

        let (options, max_connections) = match &location {
            SqliteLocation::Memory => {
                // Every in-memory connection is its own database; keep one.
                let options = SqliteConnectOptions::from_str("sqlite::memory:")
                    .map_err(|e| SqlGuardError::connection(e.to_string()))?;
                (options, 1)
            }
            SqliteLocation::File(path) => {
                let options = SqliteConnectOptions::new()
                    .filename(path)
                    .read_only(true)
                    .create_if_missing(false)
                    .busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS));
                (options, config.max_connections)
            }
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
            .connect_with(options)
            .await
            .map_err(|e| map_connection_error(e, &location))?;

        info!(
            "Opened read-only database {} ({} connections max)",
            location.display_string(),
            max_connections
        );

        Ok(Self::from_pool(pool, config.include_tables.clone()))
    }

    /// Creates a client from an existing pool.
    ///
    /// `include_tables` limits what schema introspection reports; an empty
    /// list exposes every user table.
    pub fn from_pool(pool: SqlitePool, include_tables: Vec<String>) -> Self {
        Self {
            pool,
            include_tables,
        }
    }

    /// Checks out a connection with no statement deadline installed.
    ///
    /// A call abandoned by its caller can leave its deadline behind on the
    /// connection; it is cleared here so it cannot fire on the next user.
    async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            SqlGuardError::connection(format!("Failed to acquire connection: {e}"))
        })?;
        conn.lock_handle()
            .await
            .map_err(|e| SqlGuardError::connection(format!("Failed to lock connection: {e}")))?
            .remove_progress_handler();
        Ok(conn)
    }

    /// Returns the tables visible to callers, sorted by name.
    async fn visible_table_names(&self, conn: &mut SqliteConnection) -> Result<Vec<String>> {
        let all_tables: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT name
            FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#,
        )
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| SqlGuardError::query(format!("Failed to fetch tables: {e}")))?;

        if self.include_tables.is_empty() {
            return Ok(all_tables);
        }

        let mut visible = Vec::with_capacity(self.include_tables.len());
        for wanted in &self.include_tables {
            let found = all_tables
                .iter()
                .find(|name| name.eq_ignore_ascii_case(wanted))
                .ok_or_else(|| {
                    SqlGuardError::config(format!(
                        "Table '{wanted}' in include_tables does not exist in the database"
                    ))
                })?;
            if !visible.contains(found) {
                visible.push(found.clone());
            }
        }
        visible.sort();
        Ok(visible)
    }

    /// Fetches columns and primary key for a specific table.
    async fn fetch_table(&self, conn: &mut SqliteConnection, table_name: &str) -> Result<Table> {
        let rows: Vec<(String, String, i64, Option<String>, i64)> = sqlx::query_as(
            r#"
            SELECT name, type, "notnull", dflt_value, pk
            FROM pragma_table_info(?1)
            ORDER BY cid
            "#,
        )
        .bind(table_name)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| {
            SqlGuardError::query(format!("Failed to fetch columns for {table_name}: {e}"))
        })?;

        let mut primary_key: Vec<(i64, String)> = rows
            .iter()
            .filter(|(_, _, _, _, pk)| *pk > 0)
            .map(|(name, _, _, _, pk)| (*pk, name.clone()))
            .collect();
        primary_key.sort();

        let columns = rows
            .into_iter()
            .map(|(name, data_type, not_null, default, _)| Column {
                name,
                data_type,
                is_nullable: not_null == 0,
                default,
            })
            .collect();

        Ok(Table {
            name: table_name.to_string(),
            columns,
            primary_key: primary_key.into_iter().map(|(_, name)| name).collect(),
        })
    }

    /// Fetches the foreign keys declared on a table.
    async fn fetch_foreign_keys(
        &self,
        conn: &mut SqliteConnection,
        table_name: &str,
    ) -> Result<Vec<ForeignKey>> {
        let rows: Vec<(i64, String, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT id, "table", "from", "to"
            FROM pragma_foreign_key_list(?1)
            ORDER BY id, seq
            "#,
        )
        .bind(table_name)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| {
            SqlGuardError::query(format!("Failed to fetch foreign keys for {table_name}: {e}"))
        })?;

        // Multi-column keys share an id.
        let mut by_id: BTreeMap<i64, ForeignKey> = BTreeMap::new();
        for (id, to_table, from_column, to_column) in rows {
            let fk = by_id
                .entry(id)
                .or_insert_with(|| ForeignKey::new(table_name, Vec::new(), to_table, Vec::new()));
            fk.from_columns.push(from_column);
            fk.to_columns.push(to_column.unwrap_or_default());
        }

        Ok(by_id.into_values().collect())
    }

    /// Returns column names for a statement that produced no rows.
    async fn describe_columns(conn: &mut SqliteConnection, sql: &str) -> Vec<String> {
        match (&mut *conn).describe(sql).await {
            Ok(describe) => describe
                .columns()
                .iter()
                .map(|col| col.name().to_string())
                .collect(),
            Err(e) => {
                debug!("Could not describe empty result: {e}");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    async fn introspect_schema(&self) -> Result<Schema> {
        let mut conn = self.acquire().await?;
        let table_names = self.visible_table_names(&mut conn).await?;

        let mut tables = Vec::with_capacity(table_names.len());
        let mut foreign_keys = Vec::new();
        for table_name in &table_names {
            tables.push(self.fetch_table(&mut conn, table_name).await?);
            foreign_keys.extend(self.fetch_foreign_keys(&mut conn, table_name).await?);
        }

        // Keys into hidden tables would point the agent at tables it cannot use.
        foreign_keys.retain(|fk| {
            table_names
                .iter()
                .any(|name| name.eq_ignore_ascii_case(&fk.to_table))
        });

        // `REFERENCES parent` without columns targets the parent's primary key.
        for fk in &mut foreign_keys {
            if let Some(target) = tables
                .iter()
                .find(|t| t.name.eq_ignore_ascii_case(&fk.to_table))
            {
                for (position, column) in fk.to_columns.iter_mut().enumerate() {
                    if column.is_empty() {
                        if let Some(pk) = target.primary_key.get(position) {
                            *column = pk.clone();
                        }
                    }
                }
            }
        }

        Ok(Schema {
            tables,
            foreign_keys,
        })
    }

    async fn execute_query(&self, sql: &str, timeout: Duration) -> Result<QueryResult> {
        let deadline = Instant::now() + timeout;
        let mut conn = self.acquire().await?;

        // SQLite polls the handler while the statement runs; returning false
        // interrupts it and hands the connection back.
        let expired = Arc::new(AtomicBool::new(false));
        {
            let expired = Arc::clone(&expired);
            conn.lock_handle()
                .await
                .map_err(|e| SqlGuardError::connection(format!("Failed to lock connection: {e}")))?
                .set_progress_handler(PROGRESS_CHECK_OPS, move || {
                    if Instant::now() < deadline {
                        true
                    } else {
                        expired.store(true, Ordering::Relaxed);
                        false
                    }
                });
        }

        let outcome = match sqlx::query(sql).fetch_all(&mut *conn).await {
            Ok(rows) => materialize(&mut conn, sql, &rows).await,
            Err(_) if expired.load(Ordering::Relaxed) => Err(SqlGuardError::query(format!(
                "Query timed out after {timeout:?}"
            ))),
            Err(e) => Err(SqlGuardError::query(format_query_error(e))),
        };

        match conn.lock_handle().await {
            Ok(mut handle) => {
                handle.remove_progress_handler();
            }
            Err(e) => warn!("Could not clear statement deadline: {e}"),
        }

        outcome
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Builds the result for rows a statement produced.
async fn materialize(
    conn: &mut SqliteConnection,
    sql: &str,
    rows: &[SqliteRow],
) -> Result<QueryResult> {
    let columns: Vec<String> = match rows.first() {
        Some(first_row) => first_row
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect(),
        None => SqliteClient::describe_columns(conn, sql).await,
    };

    let rows = rows.iter().map(convert_row).collect::<Result<Vec<Row>>>()?;

    Ok(QueryResult { columns, rows })
}

/// Converts a sqlx SqliteRow to our Row type.
fn convert_row(row: &SqliteRow) -> Result<Row> {
    (0..row.columns().len())
        .map(|index| convert_value(row, index))
        .collect()
}

/// Converts a single cell using its storage class, not the declared column type.
fn convert_value(row: &SqliteRow, index: usize) -> Result<Value> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| decode_error(row, index, e))?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let storage_class = raw.type_info().name().to_uppercase();

    let decoded = match storage_class.as_str() {
        "INTEGER" | "INT" | "BIGINT" | "INT8" | "BOOLEAN" => {
            row.try_get::<i64, _>(index).map(Value::Int)
        }
        "REAL" | "FLOAT" | "DOUBLE" => row.try_get::<f64, _>(index).map(Value::Float),
        "BLOB" => row.try_get::<Vec<u8>, _>(index).map(Value::Blob),
        _ => row.try_get::<String, _>(index).map(Value::Text),
    };

    decoded.map_err(|e| decode_error(row, index, e))
}

fn decode_error(row: &SqliteRow, index: usize, error: sqlx::Error) -> SqlGuardError {
    let column = row.column(index).name();
    warn!("Failed to decode column '{column}': {error}");
    SqlGuardError::query(format!("Failed to decode column '{column}': {error}"))
}

/// Maps sqlx connection errors to messages that name the database.
fn map_connection_error(error: sqlx::Error, location: &SqliteLocation) -> SqlGuardError {
    let error_str = error.to_string().to_lowercase();
    let target = location.display_string();

    if error_str.contains("unable to open database file") {
        SqlGuardError::connection(format!(
            "Cannot open database '{target}'. Check that the file exists and is readable."
        ))
    } else if error_str.contains("file is not a database") {
        SqlGuardError::connection(format!("'{target}' is not a SQLite database."))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        SqlGuardError::connection(format!(
            "Timed out opening '{target}'. Another process may hold a lock on it."
        ))
    } else {
        SqlGuardError::connection(error.to_string())
    }
}

/// Returns the store's diagnostic text for a failed statement.
fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => db_error.message().to_string(),
        None => error.to_string(),
    }
}
