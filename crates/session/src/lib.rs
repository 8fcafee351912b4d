//! # Session
//!
//! Ingestion sessions: the glue between readings and the condenser.
//!
//! - [`LiveSession`]: one connection, newline-delimited JSON frames, periodic
//!   flushes that protect the most recent key
//! - [`BatchSession`]: one stored stream, flushed whenever the table reaches
//!   the bulk threshold
//! - [`LiveServer`]: TCP accept loop running a live session per peer
//!
//! Every session walks Active -> Draining -> Closed and finishes with an
//! unconditional flush.

mod batch;
mod error;
mod live;
mod server;
mod state;

pub use batch::{BatchSession, BatchSessionConfig};
pub use error::{Result, SessionError};
pub use live::{LiveSession, LiveSessionConfig};
pub use server::{LiveServer, ServerSummary};
pub use state::{CloseReason, SessionState, SessionSummary};
