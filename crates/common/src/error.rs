//! Failure taxonomy shared by every step operation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether a failure may succeed if the operation is attempted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Transient; the retry policy may try again.
    Retryable,
    /// Permanent; retrying cannot change the result.
    NonRetryable,
}

/// Classified failure returned by a step operation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message")]
pub enum StepError {
    /// The input was rejected before any work happened (e.g. expired card).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The service understood the request and refused it (e.g. card declined).
    #[error("Declined: {0}")]
    Declined(String),

    /// The service could not be reached or timed out.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl StepError {
    /// Returns the retry classification of this failure.
    pub fn kind(&self) -> FailureKind {
        match self {
            StepError::Validation(_) | StepError::Declined(_) => FailureKind::NonRetryable,
            StepError::Unavailable(_) => FailureKind::Retryable,
        }
    }

    /// Returns true if the retry policy may attempt the operation again.
    pub fn is_retryable(&self) -> bool {
        self.kind() == FailureKind::Retryable
    }

    /// Returns the human-readable message without the classification prefix.
    pub fn message(&self) -> &str {
        match self {
            StepError::Validation(msg) | StepError::Declined(msg) | StepError::Unavailable(msg) => {
                msg
            }
        }
    }
}

/// The final failure of a retried operation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{error} (after {attempts} attempt(s))")]
pub struct StepFailure {
    /// The error returned by the last attempt.
    pub error: StepError,
    /// How many attempts were made, including the failing one.
    pub attempts: u32,
}

impl StepFailure {
    /// Returns true if the policy stopped because attempts ran out rather
    /// than because the failure was permanent.
    pub fn exhausted(&self) -> bool {
        self.error.is_retryable()
    }
}
