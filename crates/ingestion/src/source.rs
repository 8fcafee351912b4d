//! ReadingSource - ordered, single-pass readings from a SQLite stream table
//!
//! The cursor runs on a dedicated thread that owns the connection and hands
//! rows over a bounded channel, so only `prefetch` readings are ever buffered
//! regardless of table size.

use std::path::Path;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use async_channel::{bounded, Receiver, Sender};
use contracts::{Reading, StreamSchema};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Row};
use tracing::{debug, info, instrument, warn};

use crate::error::{IngestionError, Result};

/// Default number of rows buffered between the cursor thread and the consumer
pub const DEFAULT_PREFETCH: usize = 256;

/// Tabular origin of readings described by a stream descriptor
pub struct ReadingSource {
    schema: StreamSchema,
    prefetch: usize,
    rows: Option<Receiver<Reading>>,
    worker: Option<JoinHandle<()>>,
}

impl ReadingSource {
    /// Register a source from its descriptor string
    ///
    /// # Errors
    /// Schema error if the descriptor is malformed.
    pub fn register(descriptor: &str) -> Result<Self> {
        let schema = StreamSchema::parse(descriptor)?;
        Ok(Self::from_schema(schema))
    }

    /// Build from an already parsed schema
    pub fn from_schema(schema: StreamSchema) -> Self {
        Self {
            schema,
            prefetch: DEFAULT_PREFETCH,
            rows: None,
            worker: None,
        }
    }

    /// Set the cursor prefetch depth (minimum 1)
    pub fn with_prefetch(mut self, prefetch: usize) -> Self {
        self.prefetch = prefetch.max(1);
        self
    }

    /// Registered schema
    pub fn schema(&self) -> &StreamSchema {
        &self.schema
    }

    /// Whether a cursor is currently open
    pub fn is_open(&self) -> bool {
        self.rows.is_some()
    }

    /// Open the database file read-only and start the cursor
    ///
    /// # Errors
    /// `SourceUnavailable` if the file cannot be opened or queried.
    pub fn open_path(&mut self, path: &Path) -> Result<()> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            IngestionError::source_unavailable(
                self.schema.stream(),
                format!("cannot open {}: {e}", path.display()),
            )
        })?;
        self.open(conn)
    }

    /// Start an ordered cursor over the stream table
    ///
    /// Blocks until the query is prepared so that failures surface here rather
    /// than as an empty sequence.
    ///
    /// # Errors
    /// `SourceUnavailable` if the query cannot be prepared or executed,
    /// `AlreadyOpen` if a cursor is already running.
    #[instrument(name = "reading_source_open", skip(self, conn), fields(stream = %self.schema.stream()))]
    pub fn open(&mut self, conn: Connection) -> Result<()> {
        if self.rows.is_some() {
            return Err(IngestionError::AlreadyOpen {
                stream: self.schema.stream().to_string(),
            });
        }

        let (tx, rx) = bounded(self.prefetch);
        let (ready_tx, ready_rx) = mpsc::channel();
        let schema = self.schema.clone();

        let worker = thread::Builder::new()
            .name(format!("cursor-{}", schema.stream().to_lowercase()))
            .spawn(move || run_cursor(conn, schema, tx, ready_tx))
            .map_err(|e| IngestionError::source_unavailable(self.schema.stream(), e))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = worker.join();
                return Err(e);
            }
            Err(_) => {
                let _ = worker.join();
                return Err(IngestionError::source_unavailable(
                    self.schema.stream(),
                    "cursor thread exited before signaling readiness",
                ));
            }
        }

        info!(prefetch = self.prefetch, "reading source opened");
        self.rows = Some(rx);
        self.worker = Some(worker);
        Ok(())
    }

    /// Next reading in ascending timestamp order, `None` at end of sequence
    pub async fn next(&mut self) -> Option<Reading> {
        let rows = self.rows.as_ref()?;
        rows.recv().await.ok()
    }

    /// Release the cursor; idempotent
    pub fn close(&mut self) {
        if let Some(rows) = self.rows.take() {
            rows.close();
            debug!(stream = %self.schema.stream(), "reading source closed");
        }
        if let Some(worker) = self.worker.take() {
            // the thread stops at its next send once the channel is closed
            if worker.is_finished() {
                let _ = worker.join();
            }
        }
    }
}

impl Drop for ReadingSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Ordered select over every declared attribute
pub fn select_sql(schema: &StreamSchema) -> String {
    let columns = schema
        .attributes()
        .iter()
        .map(|a| format!("\"{}\"", a.name))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT {columns} FROM \"{}\" ORDER BY \"{}\" ASC",
        schema.stream(),
        schema.time_attr()
    )
}

fn run_cursor(
    conn: Connection,
    schema: StreamSchema,
    tx: Sender<Reading>,
    ready_tx: mpsc::Sender<Result<()>>,
) {
    let sql = select_sql(&schema);
    let mut stmt = match conn.prepare(&sql) {
        Ok(stmt) => stmt,
        Err(e) => {
            let _ = ready_tx.send(Err(IngestionError::source_unavailable(schema.stream(), e)));
            return;
        }
    };
    let mut rows = match stmt.query([]) {
        Ok(rows) => rows,
        Err(e) => {
            let _ = ready_tx.send(Err(IngestionError::source_unavailable(schema.stream(), e)));
            return;
        }
    };
    if ready_tx.send(Ok(())).is_err() {
        return;
    }

    let mut streamed: u64 = 0;
    loop {
        match rows.next() {
            Ok(Some(row)) => {
                let reading = row_to_reading(&schema, row);
                if tx.send_blocking(reading).is_err() {
                    debug!(stream = %schema.stream(), streamed, "cursor receiver dropped");
                    return;
                }
                streamed += 1;
            }
            Ok(None) => break,
            Err(e) => {
                warn!(stream = %schema.stream(), streamed, error = %e, "row read failed, ending sequence");
                break;
            }
        }
    }
    debug!(stream = %schema.stream(), streamed, "cursor exhausted");
}

fn row_to_reading(schema: &StreamSchema, row: &Row<'_>) -> Reading {
    let mut reading = Reading::new();
    for (idx, attr) in schema.attributes().iter().enumerate() {
        let value = match row.get_ref(idx) {
            Ok(ValueRef::Null) | Err(_) => continue,
            Ok(ValueRef::Integer(i)) => i.to_string(),
            Ok(ValueRef::Real(f)) => f.to_string(),
            Ok(ValueRef::Text(t)) | Ok(ValueRef::Blob(t)) => String::from_utf8_lossy(t).into_owned(),
        };
        reading.insert(&attr.name, value);
    }
    reading
}
