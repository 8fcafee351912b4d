//! MemorySink - keeps records in memory
//!
//! Clones share the same buffer, so a test can hand one clone to a session and
//! inspect the other.

use contracts::{AppearanceRecord, AppearanceSink, ContractError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Default)]
struct Shared {
    records: Mutex<Vec<AppearanceRecord>>,
    failing: AtomicBool,
    flushes: AtomicUsize,
    closed: AtomicBool,
}

/// In-memory sink
#[derive(Debug, Clone)]
pub struct MemorySink {
    name: String,
    shared: Arc<Shared>,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: Arc::default(),
        }
    }

    /// Make every subsequent append fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.shared.failing.store(failing, Ordering::Relaxed);
    }

    /// Records appended so far, in append order
    pub fn records(&self) -> Vec<AppearanceRecord> {
        self.shared
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.shared
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of flush calls seen
    pub fn flushes(&self) -> usize {
        self.shared.flushes.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Relaxed)
    }
}

impl AppearanceSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn append(&mut self, record: &AppearanceRecord) -> Result<(), ContractError> {
        if self.shared.failing.load(Ordering::Relaxed) {
            return Err(ContractError::sink_write(&self.name, "sink set to fail"));
        }
        self.shared
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        self.shared.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.shared.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}
