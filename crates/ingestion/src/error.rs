//! Ingestion error types

use contracts::ContractError;
use thiserror::Error;

/// Ingestion error
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Schema or reading contract violation
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// Query could not be prepared or executed
    #[error("source '{stream}' unavailable: {message}")]
    SourceUnavailable {
        /// Stream name
        stream: String,
        /// Error message
        message: String,
    },

    /// Source was opened twice
    #[error("source '{stream}' is already open")]
    AlreadyOpen {
        /// Stream name
        stream: String,
    },

    /// Wire frame is not a flat JSON object
    #[error("malformed frame: {message}")]
    MalformedFrame {
        /// Error message
        message: String,
    },

    /// Wire frame exceeds the configured limit
    #[error("frame of {len} bytes exceeds limit of {limit} bytes")]
    FrameTooLong {
        /// Bytes consumed for the frame
        len: usize,
        /// Configured limit
        limit: usize,
    },

    /// Transport failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestionError {
    pub(crate) fn source_unavailable(stream: &str, message: impl ToString) -> Self {
        Self::SourceUnavailable {
            stream: stream.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn malformed_frame(message: impl Into<String>) -> Self {
        Self::MalformedFrame {
            message: message.into(),
        }
    }

    /// Whether the error only affects the current frame or reading
    ///
    /// Recoverable errors are logged and skipped; everything else ends the
    /// session.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::MalformedFrame { .. } | Self::FrameTooLong { .. } => true,
            Self::Contract(e) => e.is_malformed_reading(),
            _ => false,
        }
    }
}

/// Ingestion Result alias
pub type Result<T> = std::result::Result<T, IngestionError>;
