//! Shared building blocks for the saga workspace.
//!
//! - [`SagaId`] identifies one saga instance
//! - [`StepError`] classifies step failures as retryable or not
//! - [`RetryPolicy`] wraps step operations with bounded exponential backoff

pub mod error;
pub mod retry;
pub mod types;

pub use error::{FailureKind, StepError, StepFailure};
pub use retry::RetryPolicy;
pub use types::SagaId;
