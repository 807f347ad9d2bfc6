//! Work applied to each number of a batch.

use async_trait::async_trait;
use common::StepError;

/// A unit of work run once per number.
#[async_trait]
pub trait BatchWork: Send + Sync {
    async fn process(&self, number: u64) -> Result<u64, StepError>;
}

/// Squares its input.
#[derive(Debug, Clone, Copy, Default)]
pub struct SquareNumber;

#[async_trait]
impl BatchWork for SquareNumber {
    async fn process(&self, number: u64) -> Result<u64, StepError> {
        number
            .checked_mul(number)
            .ok_or_else(|| StepError::Validation(format!("{number} squared overflows u64")))
    }
}
