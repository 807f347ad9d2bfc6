//! Compensation ledger: committed steps and how to undo them.

use async_trait::async_trait;
use common::{RetryPolicy, StepError};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SagaError};
use crate::order_fulfillment::StepKind;

/// A committed step and the token needed to undo it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationRecord {
    pub step: StepKind,
    /// Reservation ID for inventory, transaction ID for payment.
    pub undo_token: String,
}

/// What happened when one committed step was undone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationOutcome {
    pub step: StepKind,
    pub undo_token: String,
    /// Attempts made under the compensation retry policy.
    pub attempts: u32,
    /// The last error if the undo never succeeded.
    pub error: Option<StepError>,
}

impl CompensationOutcome {
    /// Returns true if the undo succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Performs the undo operation for a committed step.
#[async_trait]
pub trait Compensator: Send + Sync {
    async fn undo(&self, record: &CompensationRecord) -> std::result::Result<(), StepError>;
}

/// Ordered log of committed steps for one saga.
#[derive(Debug, Clone, Default)]
pub struct CompensationLedger {
    records: Vec<CompensationRecord>,
}

impl CompensationLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a committed step.
    ///
    /// Must be called as soon as the step's success is observed and before
    /// the next step starts. Recording a step without an undo operation is
    /// an orchestration defect.
    pub fn record(&mut self, step: StepKind, undo_token: impl Into<String>) -> Result<()> {
        if !step.is_compensable() {
            return Err(SagaError::NotCompensable(step));
        }

        let undo_token = undo_token.into();
        tracing::debug!(step = step.as_str(), %undo_token, "step recorded for compensation");
        self.records.push(CompensationRecord { step, undo_token });
        Ok(())
    }

    /// Returns the committed steps in commit order.
    pub fn records(&self) -> &[CompensationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Undoes every committed step, most recent first, and empties the ledger.
    ///
    /// Every record is attempted even if an earlier undo fails; failures
    /// are reported in the returned outcomes.
    pub async fn unwind_all<C>(
        &mut self,
        compensator: &C,
        policy: &RetryPolicy,
    ) -> Vec<CompensationOutcome>
    where
        C: Compensator + ?Sized,
    {
        let mut outcomes = Vec::with_capacity(self.records.len());

        while let Some(record) = self.records.pop() {
            let name = record.step.compensation_name().unwrap_or("undo");
            let mut attempts = 0;
            let result = policy
                .execute(name, || {
                    attempts += 1;
                    compensator.undo(&record)
                })
                .await;

            let error = match result {
                Ok(()) => {
                    metrics::counter!("saga_compensations_total", "outcome" => "completed")
                        .increment(1);
                    tracing::info!(
                        step = record.step.as_str(),
                        undo_token = %record.undo_token,
                        "compensation step completed"
                    );
                    None
                }
                Err(failure) => {
                    metrics::counter!("saga_compensations_total", "outcome" => "failed")
                        .increment(1);
                    tracing::error!(
                        step = record.step.as_str(),
                        undo_token = %record.undo_token,
                        error = %failure,
                        "compensation step failed, manual reconciliation required"
                    );
                    Some(failure.error)
                }
            };

            outcomes.push(CompensationOutcome {
                step: record.step,
                undo_token: record.undo_token,
                attempts,
                error,
            });
        }

        outcomes
    }
}
