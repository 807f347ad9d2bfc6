//! Saga error types.

use common::SagaId;
use thiserror::Error;

use crate::order_fulfillment::StepKind;
use crate::state::SagaState;

/// Errors that end a saga or reject a control request.
///
/// Step failures are not errors at this level: they drive the state
/// machine into `Failed` and are reported in the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SagaError {
    /// The orchestrator attempted a transition the state machine forbids.
    #[error("Invalid saga transition: {from} -> {to}")]
    InvalidTransition { from: SagaState, to: SagaState },

    /// A step without an undo operation was recorded for compensation.
    #[error("Step '{0}' cannot be compensated")]
    NotCompensable(StepKind),

    /// The approval wait returned without a decision.
    #[error("Approval wait ended while still pending")]
    ApprovalUnresolved,

    /// No saga with this ID is known to the coordinator.
    #[error("Saga not found: {0}")]
    SagaNotFound(SagaId),

    /// The saga task ended without publishing an outcome.
    #[error("Saga {0} aborted before producing an outcome")]
    Aborted(SagaId),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
