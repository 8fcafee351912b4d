//! Batch session - condenses a stored stream with a bulk threshold

use std::sync::Arc;

use condenser::Condenser;
use contracts::{AppearanceSink, BatchConfig, FlushReport, Reading, WindowKey};
use ingestion::{IngestionMetrics, ReadingSource};
use observability::{record_flush_metrics, FlushTrigger};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::state::{CloseReason, SessionState, SessionSummary};

/// Tunables of a batch session
#[derive(Debug, Clone)]
pub struct BatchSessionConfig {
    /// Table size that triggers a flush
    pub bulk_size: usize,
    /// See [`Condenser::new`]
    pub drain_limit: Option<usize>,
}

impl Default for BatchSessionConfig {
    fn default() -> Self {
        Self::from(&BatchConfig::default())
    }
}

impl From<&BatchConfig> for BatchSessionConfig {
    fn from(config: &BatchConfig) -> Self {
        Self {
            bulk_size: config.bulk_size,
            drain_limit: config.drain_limit(),
        }
    }
}

/// Replays an opened [`ReadingSource`] through a condenser
///
/// Whenever the table holds `bulk_size` windows it is flushed synchronously,
/// protecting the key of the reading just ingested.
pub struct BatchSession<S> {
    source: ReadingSource,
    config: BatchSessionConfig,
    condenser: Condenser<S>,
    metrics: Arc<IngestionMetrics>,
    current: Option<WindowKey>,
    summary: SessionSummary,
    state: SessionState,
}

impl<S: AppearanceSink> BatchSession<S> {
    /// `source` must already be open
    pub fn new(source: ReadingSource, config: BatchSessionConfig, sink: Arc<Mutex<S>>) -> Self {
        let condenser = Condenser::new(sink, config.drain_limit);
        Self {
            source,
            config: BatchSessionConfig {
                bulk_size: config.bulk_size.max(1),
                ..config
            },
            condenser,
            metrics: Arc::new(IngestionMetrics::new()),
            current: None,
            summary: SessionSummary::new(CloseReason::EndOfSource),
            state: SessionState::Active,
        }
    }

    pub fn condenser(&self) -> &Condenser<S> {
        &self.condenser
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Key of the last accepted reading
    pub fn current_key(&self) -> Option<&WindowKey> {
        self.current.as_ref()
    }

    /// Shared ingestion counters
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    /// Condense one reading, flushing if the threshold is reached
    ///
    /// Returns the threshold flush report, if one ran.
    pub async fn ingest(&mut self, reading: Reading) -> Option<FlushReport> {
        let sighting = match self.source.schema().bind(reading) {
            Ok(sighting) => sighting,
            Err(e) => {
                self.metrics.record_rejected();
                warn!(error = %e, "reading rejected");
                return None;
            }
        };
        self.current = Some(sighting.key.clone());
        self.condenser.observe(sighting);
        self.metrics.record_accepted();

        let size = self.condenser.table().len();
        if size < self.config.bulk_size {
            return None;
        }
        let report = self.condenser.flush(self.current.as_ref()).await;
        record_flush_metrics(&report, FlushTrigger::Threshold, self.condenser.table().len());
        self.summary.absorb(&report);
        debug!(table = size, emitted = report.emitted, "bulk threshold flush");
        Some(report)
    }

    /// Consume the whole source, then flush everything and close it
    #[instrument(
        name = "batch_session",
        skip_all,
        fields(stream = %self.source.schema().stream(), bulk_size = self.config.bulk_size)
    )]
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<SessionSummary> {
        info!("batch session started");

        let reason = loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break CloseReason::Shutdown,
                reading = self.source.next() => reading,
            };
            match next {
                Some(reading) => {
                    self.ingest(reading).await;
                }
                None => break CloseReason::EndOfSource,
            }
        };

        self.state.advance(SessionState::Draining)?;
        self.source.close();
        let report = self.condenser.flush(None).await;
        record_flush_metrics(&report, FlushTrigger::Final, self.condenser.table().len());
        self.state.advance(SessionState::Closed)?;

        let mut summary = self.summary.clone();
        summary.absorb(&report);
        let counters = self.metrics.snapshot();
        summary.readings_accepted = counters.readings_accepted;
        summary.readings_rejected = counters.readings_rejected;
        summary.close_reason = reason;

        info!(
            reason = ?reason,
            accepted = summary.readings_accepted,
            rejected = summary.readings_rejected,
            records = summary.records_emitted,
            flushes = summary.flushes,
            "batch session closed"
        );
        Ok(summary)
    }
}
