//! Session-scoped record numbering

use std::sync::atomic::{AtomicU64, Ordering};

/// Strictly increasing record ids, starting at 1
#[derive(Debug, Default)]
pub struct RecordSequence {
    issued: AtomicU64,
}

impl RecordSequence {
    /// Fresh sequence; the first id is 1
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next id
    pub fn next_id(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Number of ids handed out
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }
}
