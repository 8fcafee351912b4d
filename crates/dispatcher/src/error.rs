//! Errors raised while building sinks from configuration
//!
//! Failures of an already running sink travel as [`ContractError`] through the
//! `AppearanceSink` methods instead.

use contracts::ContractError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatcherError {
    /// A configured sink could not be opened (bad params, unreachable file or socket)
    #[error("sink '{name}' could not be opened: {message}")]
    SinkCreation { name: String, message: String },

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Name of the sink that failed to open, if known
    pub fn sink_name(&self) -> Option<&str> {
        match self {
            Self::SinkCreation { name, .. } => Some(name),
            Self::Contract(ContractError::SinkConnection { sink_name, .. }) => Some(sink_name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_name_from_either_source() {
        let err = DispatcherError::sink_creation("appear", "missing 'path'");
        assert_eq!(err.sink_name(), Some("appear"));
        assert_eq!(err.to_string(), "sink 'appear' could not be opened: missing 'path'");

        let err = DispatcherError::from(ContractError::sink_connection("udp", "refused"));
        assert_eq!(err.sink_name(), Some("udp"));
    }
}
