//! Session lifecycle and run summary

use contracts::FlushReport;
use observability::FlushAggregator;
use serde::Serialize;
use tracing::debug;

use crate::error::{Result, SessionError};

/// Lifecycle of one ingestion session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Accepting readings
    Active,
    /// Input finished; final flush in progress
    Draining,
    /// Terminal
    Closed,
}

impl SessionState {
    /// Whether readings are still accepted
    pub fn accepts_readings(self) -> bool {
        self == Self::Active
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Closed
    }

    /// Move forward to `next`
    ///
    /// # Errors
    /// `InvalidTransition` for anything but Active -> Draining -> Closed.
    pub fn advance(&mut self, next: SessionState) -> Result<()> {
        let allowed = matches!(
            (*self, next),
            (Self::Active, Self::Draining) | (Self::Draining, Self::Closed)
        );
        if !allowed {
            return Err(SessionError::InvalidTransition {
                from: *self,
                to: next,
            });
        }
        debug!(from = ?*self, to = ?next, "session state");
        *self = next;
        Ok(())
    }
}

/// Why a session stopped reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// `QUIT` sentinel
    Quit,
    /// Connection dropped or failed without `QUIT`
    Disconnected,
    /// Process shutdown requested
    Shutdown,
    /// Batch source exhausted
    EndOfSource,
}

/// Counters reported when a session closes
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub readings_accepted: u64,
    pub readings_rejected: u64,
    /// `END` sentinels seen
    pub runs_ended: u64,
    pub flushes: u64,
    pub records_emitted: u64,
    pub records_failed: u64,
    /// Windows evicted by the drain exception
    pub drained: u64,
    pub close_reason: CloseReason,
    /// Per-flush statistics
    #[serde(skip)]
    pub flush_stats: FlushAggregator,
}

impl SessionSummary {
    pub(crate) fn new(close_reason: CloseReason) -> Self {
        Self {
            readings_accepted: 0,
            readings_rejected: 0,
            runs_ended: 0,
            flushes: 0,
            records_emitted: 0,
            records_failed: 0,
            drained: 0,
            close_reason,
            flush_stats: FlushAggregator::new(),
        }
    }

    /// Fold in one flush
    pub fn absorb(&mut self, report: &FlushReport) {
        self.flushes += 1;
        self.records_emitted += report.emitted as u64;
        self.records_failed += report.failed as u64;
        self.drained += report.drained as u64;
        self.flush_stats.update(report);
    }

    /// Fold in flushes aggregated elsewhere (the live flush timer)
    pub fn merge(&mut self, flushes: &FlushAggregator) {
        self.flushes += flushes.flushes;
        self.records_emitted += flushes.totals.emitted as u64;
        self.records_failed += flushes.totals.failed as u64;
        self.drained += flushes.totals.drained as u64;
        self.flush_stats.merge(flushes);
    }
}
