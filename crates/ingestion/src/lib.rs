//! # Ingestion
//!
//! Reading ingestion module.
//!
//! Responsibilities:
//! - Register stream descriptors and open ordered cursors over stored readings
//! - Decode the newline-delimited JSON live wire format, including sentinels
//! - Count accepted and rejected readings
//! - Generate deterministic readings for tests and demos
//!
//! ## Batch source
//!
//! ```ignore
//! use ingestion::ReadingSource;
//!
//! let mut source = ReadingSource::register(descriptor)?;
//! source.open_path(Path::new("readings.db"))?;
//! while let Some(reading) = source.next().await {
//!     // bind and condense
//! }
//! source.close();
//! ```
//!
//! ## Live frames
//!
//! ```ignore
//! use ingestion::{Frame, FrameReader};
//!
//! let mut frames = FrameReader::with_max_frame_bytes(BufReader::new(socket), 64 * 1024);
//! while let Some(frame) = frames.next_frame().await? {
//!     match frame {
//!         Frame::Reading(reading) => { /* ... */ }
//!         Frame::End => { /* flush everything */ }
//!         Frame::Quit => break,
//!     }
//! }
//! ```

mod config;
mod error;
mod mock;
mod source;
mod wire;

pub use config::{IngestionMetrics, MetricsSnapshot};
pub use error::{IngestionError, Result};
pub use mock::{create_stream_table, insert_readings, ReadingGenerator, ReadingGeneratorConfig};
pub use source::{select_sql, ReadingSource, DEFAULT_PREFETCH};
pub use wire::{decode_line, Frame, FrameReader, DEFAULT_MAX_FRAME_BYTES};
