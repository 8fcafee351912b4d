//! # Dispatcher
//!
//! Persistence side of the condenser.
//!
//! Responsibilities:
//! - Concrete `AppearanceSink` implementations (log, file, SQLite, UDP, memory)
//! - Building sinks from `[[sinks]]` configuration
//! - Fan-out of every closed record to all configured sinks via `SinkSet`

pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod sinks;

pub use contracts::{AppearanceRecord, AppearanceSink};
pub use dispatcher::{create_sink, create_sink_set, AnySink, SinkSet};
pub use error::DispatcherError;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{FileSink, LogSink, MemorySink, NetworkSink, SqliteSink};
