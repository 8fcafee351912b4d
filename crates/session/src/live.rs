//! Live session - one network connection, condensed on a timer

use std::sync::Arc;
use std::time::Duration;

use condenser::Condenser;
use contracts::{AppearanceSink, LiveConfig, Reading, StreamSchema, WindowKey};
use ingestion::{Frame, FrameReader, IngestionMetrics, DEFAULT_MAX_FRAME_BYTES};
use observability::{record_flush_metrics, FlushAggregator, FlushTrigger};
use tokio::io::AsyncBufRead;
use tokio::sync::{watch, Mutex};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::error::Result;
use crate::state::{CloseReason, SessionState, SessionSummary};

/// Tunables of a live session
#[derive(Debug, Clone)]
pub struct LiveSessionConfig {
    /// Delay before the first scheduled flush
    pub flush_delay: Duration,
    /// Period of scheduled flushes
    pub flush_interval: Duration,
    /// See [`Condenser::new`]
    pub drain_limit: Option<usize>,
    pub max_frame_bytes: usize,
}

impl Default for LiveSessionConfig {
    fn default() -> Self {
        Self::from(&LiveConfig::default())
    }
}

impl From<&LiveConfig> for LiveSessionConfig {
    fn from(config: &LiveConfig) -> Self {
        Self {
            flush_delay: config.flush_delay(),
            flush_interval: config.flush_interval(),
            drain_limit: config.drain_limit(),
            max_frame_bytes: config.max_frame_bytes,
        }
    }
}

/// Ingests frames from one connection into its own condensation table
///
/// A spawned task flushes the table every `flush_interval`, protecting the
/// key of the most recent reading. `END` flushes everything and keeps the
/// session open; `QUIT`, end of stream or shutdown close it after a final
/// unconditional flush.
pub struct LiveSession<S> {
    schema: StreamSchema,
    config: LiveSessionConfig,
    condenser: Condenser<S>,
    metrics: Arc<IngestionMetrics>,
    state: SessionState,
}

impl<S: AppearanceSink + 'static> LiveSession<S> {
    pub fn new(schema: StreamSchema, config: LiveSessionConfig, sink: Arc<Mutex<S>>) -> Self {
        let condenser = Condenser::new(sink, config.drain_limit);
        Self {
            schema,
            config,
            condenser,
            metrics: Arc::new(IngestionMetrics::new()),
            state: SessionState::Active,
        }
    }

    pub fn condenser(&self) -> &Condenser<S> {
        &self.condenser
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Shared ingestion counters
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    /// Run until `QUIT`, end of stream or `shutdown`
    ///
    /// Returns once the session is closed and every window has been handed to
    /// the sink. The sink itself is left open.
    #[instrument(name = "live_session", skip_all, fields(stream = %self.schema.stream()))]
    pub async fn run<R>(mut self, reader: R, shutdown: CancellationToken) -> Result<SessionSummary>
    where
        R: AsyncBufRead + Unpin,
    {
        let max_frame_bytes = if self.config.max_frame_bytes == 0 {
            DEFAULT_MAX_FRAME_BYTES
        } else {
            self.config.max_frame_bytes
        };
        let mut frames = FrameReader::with_max_frame_bytes(reader, max_frame_bytes);
        let (current_tx, current_rx) = watch::channel(None::<WindowKey>);

        let timer_token = shutdown.child_token();
        let timer = tokio::spawn(run_flush_timer(
            self.condenser.clone(),
            current_rx,
            self.config.flush_delay,
            self.config.flush_interval,
            timer_token.clone(),
        ));
        info!(
            delay_ms = self.config.flush_delay.as_millis() as u64,
            interval_ms = self.config.flush_interval.as_millis() as u64,
            "live session started"
        );

        let mut summary = SessionSummary::new(CloseReason::Disconnected);
        let reason = loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break CloseReason::Shutdown,
                frame = frames.next_frame() => frame,
            };

            match next {
                Ok(Some(Frame::Reading(reading))) => self.ingest(reading, &current_tx),
                Ok(Some(Frame::End)) => {
                    self.metrics.record_sentinel();
                    summary.runs_ended += 1;
                    let report = self.condenser.flush(None).await;
                    record_flush_metrics(&report, FlushTrigger::EndOfRun, self.condenser.table().len());
                    summary.absorb(&report);
                    debug!(emitted = report.emitted, "end of run");
                }
                Ok(Some(Frame::Quit)) => {
                    self.metrics.record_sentinel();
                    break CloseReason::Quit;
                }
                Ok(None) => break CloseReason::Disconnected,
                Err(e) if e.is_recoverable() => {
                    self.metrics.record_rejected();
                    warn!(error = %e, "frame rejected");
                }
                Err(e) => {
                    warn!(error = %e, "connection failed");
                    break CloseReason::Disconnected;
                }
            }
        };

        self.state.advance(SessionState::Draining)?;
        timer_token.cancel();
        match timer.await {
            Ok(flushes) => summary.merge(&flushes),
            Err(e) => warn!(error = %e, "flush timer task failed"),
        }

        let report = self.condenser.flush(None).await;
        record_flush_metrics(&report, FlushTrigger::Final, self.condenser.table().len());
        summary.absorb(&report);
        self.state.advance(SessionState::Closed)?;

        let counters = self.metrics.snapshot();
        summary.readings_accepted = counters.readings_accepted;
        summary.readings_rejected = counters.readings_rejected;
        summary.close_reason = reason;

        info!(
            reason = ?reason,
            accepted = summary.readings_accepted,
            rejected = summary.readings_rejected,
            records = summary.records_emitted,
            failed = summary.records_failed,
            "live session closed"
        );
        Ok(summary)
    }

    /// Bind and condense one reading
    ///
    /// The key is published before the window is touched so a concurrent
    /// scheduled flush always protects it.
    fn ingest(&self, reading: Reading, current: &watch::Sender<Option<WindowKey>>) {
        match self.schema.bind(reading) {
            Ok(sighting) => {
                current.send_replace(Some(sighting.key.clone()));
                trace!(key = %sighting.key, ts = %sighting.timestamp, "reading");
                self.condenser.observe(sighting);
                self.metrics.record_accepted();
            }
            Err(e) => {
                self.metrics.record_rejected();
                warn!(error = %e, "reading rejected");
            }
        }
    }
}

/// Periodic flush task; returns what it flushed once cancelled
///
/// Cancellation is only observed between ticks, never during a flush.
async fn run_flush_timer<S: AppearanceSink>(
    condenser: Condenser<S>,
    current: watch::Receiver<Option<WindowKey>>,
    delay: Duration,
    period: Duration,
    token: CancellationToken,
) -> FlushAggregator {
    let mut ticker = interval_at(Instant::now() + delay, period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut flushes = FlushAggregator::new();
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let report = condenser.flush_current(&current).await;
                record_flush_metrics(&report, FlushTrigger::Timer, condenser.table().len());
                flushes.update(&report);
            }
        }
    }
    flushes
}
