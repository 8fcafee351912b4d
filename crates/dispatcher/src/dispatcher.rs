//! Sink construction and fan-out

use std::sync::Arc;

use contracts::{AppearanceRecord, AppearanceSink, ContractError, SinkConfig, SinkType};
use tracing::{info, instrument, warn};

use crate::error::DispatcherError;
use crate::metrics::{MetricsSnapshot, SinkMetrics};
use crate::sinks::{FileSink, LogSink, MemorySink, NetworkSink, SqliteSink};

/// Any concrete sink
///
/// Enum dispatch keeps `SinkSet` free of boxed async trait objects.
pub enum AnySink {
    Log(LogSink),
    File(FileSink),
    Sqlite(SqliteSink),
    Network(NetworkSink),
    Memory(MemorySink),
}

impl AppearanceSink for AnySink {
    fn name(&self) -> &str {
        match self {
            Self::Log(s) => s.name(),
            Self::File(s) => s.name(),
            Self::Sqlite(s) => s.name(),
            Self::Network(s) => s.name(),
            Self::Memory(s) => s.name(),
        }
    }

    async fn append(&mut self, record: &AppearanceRecord) -> Result<(), ContractError> {
        match self {
            Self::Log(s) => s.append(record).await,
            Self::File(s) => s.append(record).await,
            Self::Sqlite(s) => s.append(record).await,
            Self::Network(s) => s.append(record).await,
            Self::Memory(s) => s.append(record).await,
        }
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        match self {
            Self::Log(s) => s.flush().await,
            Self::File(s) => s.flush().await,
            Self::Sqlite(s) => s.flush().await,
            Self::Network(s) => s.flush().await,
            Self::Memory(s) => s.flush().await,
        }
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        match self {
            Self::Log(s) => s.close().await,
            Self::File(s) => s.close().await,
            Self::Sqlite(s) => s.close().await,
            Self::Network(s) => s.close().await,
            Self::Memory(s) => s.close().await,
        }
    }
}

impl From<LogSink> for AnySink {
    fn from(sink: LogSink) -> Self {
        Self::Log(sink)
    }
}

impl From<FileSink> for AnySink {
    fn from(sink: FileSink) -> Self {
        Self::File(sink)
    }
}

impl From<SqliteSink> for AnySink {
    fn from(sink: SqliteSink) -> Self {
        Self::Sqlite(sink)
    }
}

impl From<NetworkSink> for AnySink {
    fn from(sink: NetworkSink) -> Self {
        Self::Network(sink)
    }
}

impl From<MemorySink> for AnySink {
    fn from(sink: MemorySink) -> Self {
        Self::Memory(sink)
    }
}

struct ManagedSink {
    sink: AnySink,
    metrics: Arc<SinkMetrics>,
}

/// Every configured sink behind a single `AppearanceSink`
///
/// An append is attempted on every sink; it fails if any of them failed.
#[derive(Default)]
pub struct SinkSet {
    sinks: Vec<ManagedSink>,
}

impl SinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    pub fn push(&mut self, sink: impl Into<AnySink>) {
        self.sinks.push(ManagedSink {
            sink: sink.into(),
            metrics: Arc::new(SinkMetrics::new()),
        });
    }

    /// Builder-style [`push`](Self::push)
    pub fn with(mut self, sink: impl Into<AnySink>) -> Self {
        self.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Sink names in configuration order
    pub fn names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.sink.name()).collect()
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.sinks
            .iter()
            .map(|s| (s.sink.name().to_string(), s.metrics.snapshot()))
            .collect()
    }
}

impl AppearanceSink for SinkSet {
    fn name(&self) -> &str {
        "sink_set"
    }

    async fn append(&mut self, record: &AppearanceRecord) -> Result<(), ContractError> {
        let mut failed = Vec::new();
        for managed in &mut self.sinks {
            let result = managed.sink.append(record).await;
            observability::record_sink_append(managed.sink.name(), result.is_ok());
            match result {
                Ok(()) => managed.metrics.inc_write_count(),
                Err(e) => {
                    managed.metrics.inc_failure_count();
                    failed.push(format!("{}: {}", managed.sink.name(), e));
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(ContractError::sink_write(self.name(), failed.join("; ")))
        }
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        let mut failed = Vec::new();
        for managed in &mut self.sinks {
            if let Err(e) = managed.sink.flush().await {
                managed.metrics.inc_flush_failures();
                failed.push(format!("{}: {}", managed.sink.name(), e));
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(ContractError::sink_write(self.name(), failed.join("; ")))
        }
    }

    #[instrument(name = "sink_set_close", skip(self), fields(sinks = self.sinks.len()))]
    async fn close(&mut self) -> Result<(), ContractError> {
        let mut failed = Vec::new();
        for managed in &mut self.sinks {
            if let Err(e) = managed.sink.close().await {
                managed.metrics.inc_flush_failures();
                warn!(sink = managed.sink.name(), error = %e, "Sink close failed");
                failed.push(managed.sink.name().to_string());
            }
        }
        for (name, snapshot) in self.metrics() {
            info!(
                sink = %name,
                written = snapshot.write_count,
                failed = snapshot.failure_count,
                "Sink closed"
            );
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(ContractError::sink_write(
                self.name(),
                format!("close failed for {}", failed.join(", ")),
            ))
        }
    }
}

/// Create a sink from configuration
#[instrument(
    name = "dispatcher_create_sink",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
pub async fn create_sink(config: &SinkConfig) -> Result<AnySink, DispatcherError> {
    let sink: AnySink = match config.sink_type {
        SinkType::Log => LogSink::new(&config.name).into(),
        SinkType::File => FileSink::from_params(&config.name, &config.params)
            .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?
            .into(),
        SinkType::Sqlite => SqliteSink::from_params(&config.name, &config.params)
            .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?
            .into(),
        SinkType::Network => NetworkSink::from_params(&config.name, &config.params)
            .await
            .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?
            .into(),
    };
    Ok(sink)
}

/// Build the sink set for a run
///
/// With no configured sinks, records go to a single log sink.
#[instrument(name = "dispatcher_create_sink_set", skip(configs), fields(sink_count = configs.len()))]
pub async fn create_sink_set(configs: &[SinkConfig]) -> Result<SinkSet, DispatcherError> {
    let mut set = SinkSet::new();
    for config in configs {
        set.push(create_sink(config).await?);
    }
    if set.is_empty() {
        info!("No sinks configured, logging records");
        set.push(LogSink::new("log"));
    }
    Ok(set)
}
