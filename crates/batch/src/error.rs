//! Batch error types.

use common::StepFailure;
use thiserror::Error;

/// Errors that can occur while configuring or running a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// The fan-out settings cannot produce a finite tree.
    #[error("Invalid batch configuration: {0}")]
    InvalidConfig(String),

    /// A work item failed after its retries.
    #[error("Processing {number} failed: {source}")]
    Item {
        number: u64,
        #[source]
        source: StepFailure,
    },
}

/// Convenience type alias for batch results.
pub type Result<T> = std::result::Result<T, BatchError>;
