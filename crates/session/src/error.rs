//! Session error types

use ingestion::IngestionError;
use thiserror::Error;

use crate::state::SessionState;

/// Session-level errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// Source or wire failure that ends the session
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    /// Contract error (schema, sink, ...)
    #[error(transparent)]
    Contract(#[from] contracts::ContractError),

    /// Listener could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Lifecycle moved backwards
    #[error("invalid session transition {from:?} -> {to:?}")]
    InvalidTransition { from: SessionState, to: SessionState },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SessionError>;
