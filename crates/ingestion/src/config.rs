//! Ingestion counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Ingestion metrics
///
/// Shared between a source or session and whoever reports on it.
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Readings handed to the condenser
    pub readings_accepted: AtomicU64,

    /// Frames or readings rejected as malformed
    pub readings_rejected: AtomicU64,

    /// Sentinel frames seen (`QUIT` / `END`)
    pub sentinels: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted reading
    pub fn record_accepted(&self) {
        self.readings_accepted.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("condenser_readings_total", "status" => "accepted").increment(1);
    }

    /// Record a rejected frame or reading
    pub fn record_rejected(&self) {
        self.readings_rejected.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("condenser_readings_total", "status" => "rejected").increment(1);
    }

    /// Record a sentinel frame
    pub fn record_sentinel(&self) {
        self.sentinels.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            readings_accepted: self.readings_accepted.load(Ordering::Relaxed),
            readings_rejected: self.readings_rejected.load(Ordering::Relaxed),
            sentinels: self.sentinels.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Readings handed to the condenser
    pub readings_accepted: u64,

    /// Frames or readings rejected as malformed
    pub readings_rejected: u64,

    /// Sentinel frames seen
    pub sentinels: u64,
}
