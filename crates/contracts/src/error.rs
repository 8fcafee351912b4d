//! Layered error definitions
//!
//! Categorized by source: config / schema / source / reading / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Schema Errors =====
    /// Stream descriptor could not be parsed
    #[error("schema error in descriptor '{descriptor}': {message}")]
    Schema { descriptor: String, message: String },

    // ===== Source Errors =====
    /// Reading source could not be opened or queried
    #[error("source '{stream}' unavailable: {message}")]
    SourceUnavailable { stream: String, message: String },

    // ===== Reading Errors =====
    /// A reading lacks a mandatory attribute or carries an unusable value
    #[error("malformed reading: {message}")]
    MalformedReading { message: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink connection error
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create schema error
    pub fn schema(descriptor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            descriptor: descriptor.into(),
            message: message.into(),
        }
    }

    /// Create source unavailable error
    pub fn source_unavailable(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Create malformed reading error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedReading {
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create sink connection error
    pub fn sink_connection(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkConnection {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Whether this error only affects a single reading
    pub fn is_malformed_reading(&self) -> bool {
        matches!(self, Self::MalformedReading { .. })
    }
}
