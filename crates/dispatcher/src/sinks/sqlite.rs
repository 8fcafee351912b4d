//! SqliteSink - inserts records into an appearance table
//!
//! Inserts are grouped into one transaction per condenser flush: the
//! transaction opens on the first append and commits on `flush`/`close`.
//! A failed commit rolls the whole transaction back, so every record appended
//! since the previous flush is lost.

use contracts::{AppearanceRecord, AppearanceSink, ContractError};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, instrument, warn};

/// Table created when no `table` parameter is given
pub const DEFAULT_APPEAR_TABLE: &str = "APPEAR_TABLE";

/// Configuration for SqliteSink
#[derive(Debug, Clone)]
pub struct SqliteSinkConfig {
    /// Database file
    pub path: PathBuf,
    /// Target table
    pub table: String,
}

impl SqliteSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let path = params
            .get("path")
            .map(PathBuf::from)
            .ok_or_else(|| "missing 'path' parameter".to_string())?;

        let table = params
            .get("table")
            .map(|t| t.trim().to_uppercase())
            .unwrap_or_else(|| DEFAULT_APPEAR_TABLE.to_string());
        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(format!("invalid table name '{}'", table));
        }

        Ok(Self { path, table })
    }
}

/// Connection plus the open transaction state
///
/// Only touched from blocking threads, behind a std mutex.
struct SqliteWriter {
    conn: Connection,
    insert_sql: String,
    in_transaction: bool,
    pending: usize,
}

impl SqliteWriter {
    fn insert(&mut self, record: &AppearanceRecord) -> rusqlite::Result<()> {
        if !self.in_transaction {
            self.conn.execute_batch("BEGIN")?;
            self.in_transaction = true;
        }
        let mut stmt = self.conn.prepare_cached(&self.insert_sql)?;
        stmt.execute(params![
            record.sequence as i64,
            record.subject.as_str(),
            record.location,
            record.start.to_string(),
            record.end.to_string(),
        ])?;
        self.pending += 1;
        Ok(())
    }

    /// Commit the open transaction; returns how many inserts it held
    fn commit(&mut self) -> rusqlite::Result<usize> {
        if !self.in_transaction {
            return Ok(0);
        }
        self.in_transaction = false;
        let committed = std::mem::take(&mut self.pending);
        if let Err(e) = self.conn.execute_batch("COMMIT") {
            // BUSY leaves the transaction open
            if !self.conn.is_autocommit() {
                let _ = self.conn.execute_batch("ROLLBACK");
            }
            return Err(e);
        }
        Ok(committed)
    }
}

/// Sink that persists records into SQLite
///
/// Every rusqlite call runs on the blocking pool.
pub struct SqliteSink {
    name: String,
    config: SqliteSinkConfig,
    writer: Option<Arc<Mutex<SqliteWriter>>>,
}

impl SqliteSink {
    /// Open (or create) the database file and ensure the table exists
    pub fn new(name: impl Into<String>, config: SqliteSinkConfig) -> rusqlite::Result<Self> {
        let conn = Connection::open(&config.path)?;
        Self::with_connection(name, config, conn)
    }

    /// Use an already opened connection
    pub fn with_connection(
        name: impl Into<String>,
        config: SqliteSinkConfig,
        conn: Connection,
    ) -> rusqlite::Result<Self> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (
                SEQUENCE INTEGER,
                SUBJECT TEXT NOT NULL,
                LOCATION_ID INTEGER NOT NULL,
                START_TS TEXT NOT NULL,
                END_TS TEXT NOT NULL
            )",
            config.table
        ))?;

        let insert_sql = format!(
            "INSERT INTO \"{}\" (SEQUENCE, SUBJECT, LOCATION_ID, START_TS, END_TS) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            config.table
        );
        let name = name.into();
        debug!(sink = %name, path = %config.path.display(), table = %config.table, "SqliteSink opened");

        Ok(Self {
            name,
            config,
            writer: Some(Arc::new(Mutex::new(SqliteWriter {
                conn,
                insert_sql,
                in_transaction: false,
                pending: 0,
            }))),
        })
    }

    /// Create from params (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = SqliteSinkConfig::from_params(params)
            .map_err(|e| ContractError::sink_connection(&name, e))?;
        Self::new(name.clone(), config).map_err(|e| ContractError::sink_connection(&name, e.to_string()))
    }

    /// Target table
    pub fn table(&self) -> &str {
        &self.config.table
    }

    /// Run `op` against the writer on the blocking pool
    async fn blocking<T, F>(&self, op: F) -> Result<T, ContractError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteWriter) -> rusqlite::Result<T> + Send + 'static,
    {
        let writer = self
            .writer
            .clone()
            .ok_or_else(|| ContractError::sink_write(&self.name, "sink is closed"))?;
        let joined = tokio::task::spawn_blocking(move || {
            let mut writer = writer.lock().unwrap_or_else(PoisonError::into_inner);
            op(&mut writer)
        })
        .await
        .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        joined.map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    async fn commit(&self) -> Result<(), ContractError> {
        let committed = self.blocking(SqliteWriter::commit).await.map_err(|e| {
            error!(sink = %self.name, error = %e, "Commit failed, transaction rolled back");
            e
        })?;
        if committed > 0 {
            debug!(sink = %self.name, records = committed, "committed");
        }
        Ok(())
    }
}

impl AppearanceSink for SqliteSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "sqlite_sink_append",
        skip(self, record),
        fields(sink = %self.name, sequence = record.sequence)
    )]
    async fn append(&mut self, record: &AppearanceRecord) -> Result<(), ContractError> {
        let owned = record.clone();
        self.blocking(move |writer| writer.insert(&owned))
            .await
            .map_err(|e| {
                error!(sink = %self.name, sequence = record.sequence, error = %e, "Insert failed");
                e
            })
    }

    #[instrument(name = "sqlite_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        if self.writer.is_none() {
            return Ok(());
        }
        self.commit().await
    }

    #[instrument(name = "sqlite_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if self.writer.is_none() {
            return Ok(());
        }
        self.commit().await?;
        if let Some(writer) = self.writer.take() {
            // the last blocking task has finished, so this is the only handle
            if let Ok(writer) = Arc::try_unwrap(writer) {
                let writer = writer.into_inner().unwrap_or_else(PoisonError::into_inner);
                writer
                    .conn
                    .close()
                    .map_err(|(_, e)| ContractError::sink_write(&self.name, e.to_string()))?;
            }
        }
        debug!(sink = %self.name, "SqliteSink closed");
        Ok(())
    }
}

impl Drop for SqliteSink {
    fn drop(&mut self) {
        let Some(writer) = self.writer.take() else {
            return;
        };
        let mut writer = writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writer.commit() {
            warn!(sink = %self.name, error = %e, "uncommitted records lost on drop");
        }
    }
}
