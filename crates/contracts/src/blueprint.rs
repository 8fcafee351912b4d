//! CondenserBlueprint - Config Loader output
//!
//! Describes the complete runtime configuration: the stream descriptor, live and
//! batch session tuning, and output routing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::{ContractError, StreamSchema};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete condenser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CondenserBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Stream declaration
    pub stream: StreamConfig,

    /// Live (socket) ingestion settings
    #[serde(default)]
    pub live: LiveConfig,

    /// Batch (cursor) ingestion settings
    #[serde(default)]
    pub batch: BatchConfig,

    /// Output routing
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

impl CondenserBlueprint {
    /// Parse the declared stream descriptor
    pub fn schema(&self) -> Result<StreamSchema, ContractError> {
        StreamSchema::parse(&self.stream.descriptor)
    }

    /// Look up a sink by name
    pub fn sink(&self, name: &str) -> Option<&SinkConfig> {
        self.sinks.iter().find(|s| s.name == name)
    }
}

/// Stream declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// `STREAM name (attr type # ...)` descriptor
    pub descriptor: String,
}

/// Live ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Delay before the first scheduled flush (ms)
    #[serde(default = "default_flush_delay_ms")]
    pub flush_delay_ms: u64,

    /// Period between scheduled flushes (ms), must be > 0
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Drain exception threshold; 0 disables it
    #[serde(default = "default_drain_limit")]
    pub drain_limit: usize,

    /// Longest accepted wire frame in bytes
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl LiveConfig {
    /// Drain exception threshold, `None` when disabled
    pub fn drain_limit(&self) -> Option<usize> {
        (self.drain_limit > 0).then_some(self.drain_limit)
    }

    /// Delay before the first scheduled flush
    pub fn flush_delay(&self) -> Duration {
        Duration::from_millis(self.flush_delay_ms)
    }

    /// Period between scheduled flushes
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            flush_delay_ms: default_flush_delay_ms(),
            flush_interval_ms: default_flush_interval_ms(),
            drain_limit: default_drain_limit(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:5555".to_string()
}

fn default_flush_delay_ms() -> u64 {
    1000
}

fn default_flush_interval_ms() -> u64 {
    5000
}

fn default_drain_limit() -> usize {
    2
}

fn default_max_frame_bytes() -> usize {
    64 * 1024
}

/// Batch ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// SQLite database holding the stream table
    #[serde(default)]
    pub database: Option<PathBuf>,

    /// Table size that forces a synchronous flush, must be >= 1
    #[serde(default = "default_bulk_size")]
    pub bulk_size: usize,

    /// Drain exception threshold; 0 disables it
    #[serde(default = "default_drain_limit")]
    pub drain_limit: usize,

    /// Rows buffered between the cursor thread and the session
    #[serde(default = "default_prefetch")]
    pub prefetch: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            database: None,
            bulk_size: default_bulk_size(),
            drain_limit: default_drain_limit(),
            prefetch: default_prefetch(),
        }
    }
}

impl BatchConfig {
    /// Drain exception threshold, `None` when disabled
    pub fn drain_limit(&self) -> Option<usize> {
        (self.drain_limit > 0).then_some(self.drain_limit)
    }
}

fn default_bulk_size() -> usize {
    1000
}

fn default_prefetch() -> usize {
    256
}

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Tracing output
    Log,
    /// JSON-lines file
    File,
    /// SQLite `APPEAR_TABLE`
    Sqlite,
    /// UDP datagrams
    Network,
}
