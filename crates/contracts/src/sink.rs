//! AppearanceSink trait - Condenser output interface
//!
//! Defines the abstract interface for persistence sinks.

use crate::{AppearanceRecord, ContractError};

/// Persistence trait for closed dwell records
///
/// All sink implementations must implement this trait. The condenser makes no
/// retry guarantee: a failed append is logged and the record is dropped.
#[trait_variant::make(AppearanceSink: Send)]
pub trait LocalAppearanceSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Append one closed record
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn append(&mut self, record: &AppearanceRecord) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
