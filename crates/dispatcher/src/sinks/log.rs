//! LogSink - logs closed records via tracing

use contracts::{AppearanceRecord, AppearanceSink, ContractError};
use tracing::{info, instrument};

/// Sink that logs every record, mostly for debugging and dry runs
pub struct LogSink {
    name: String,
    appended: u64,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            appended: 0,
        }
    }

    /// Records logged so far
    pub fn appended(&self) -> u64 {
        self.appended
    }
}

impl AppearanceSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_append",
        skip(self, record),
        fields(sink = %self.name, sequence = record.sequence)
    )]
    async fn append(&mut self, record: &AppearanceRecord) -> Result<(), ContractError> {
        info!(
            subject = %record.subject,
            location = record.location,
            start = %record.start,
            end = %record.end,
            "appearance"
        );
        self.appended += 1;
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        // Nothing to flush for log sink
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, appended = self.appended, "LogSink closed");
        Ok(())
    }
}
