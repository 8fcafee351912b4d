//! Sink implementations
//!
//! Contains LogSink, FileSink, SqliteSink, NetworkSink and MemorySink.

mod file;
mod log;
mod memory;
mod network;
mod sqlite;

pub use self::file::{FileSink, FileSinkConfig};
pub use self::log::LogSink;
pub use self::memory::MemorySink;
pub use self::network::{NetworkFormat, NetworkSink, NetworkSinkConfig};
pub use self::sqlite::{SqliteSink, SqliteSinkConfig, DEFAULT_APPEAR_TABLE};
