//! Saga state machine.

use serde::{Deserialize, Serialize};

/// The state of a saga in its lifecycle.
///
/// State transitions:
/// ```text
/// Created ─┬─────────────────────────────────────► ReservingInventory
///          ├──► AwaitingApproval ─┬──► Approved ──► ReservingInventory
///          │                      ├──► Rejected
///          │                      └──► Expired
///          └──► Failed (invalid payment instrument)
///
/// ReservingInventory ──► InventoryReserved ──► ProcessingPayment
///          └──► Failed                              │
/// ProcessingPayment ──► PaymentProcessed ──► ArrangingDelivery ──► Fulfilled
///          └──► Compensating ──► Failed  ◄──────────┘ (on failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaState {
    #[default]
    Created,
    AwaitingApproval,
    Approved,
    /// Terminal: the approver said no.
    Rejected,
    /// Terminal: nobody decided before the deadline.
    Expired,
    ReservingInventory,
    InventoryReserved,
    ProcessingPayment,
    PaymentProcessed,
    ArrangingDelivery,
    /// Terminal: every step committed.
    Fulfilled,
    /// Committed steps are being undone.
    Compensating,
    /// Terminal: a step failed; committed steps have been compensated.
    Failed,
}

impl SagaState {
    /// Returns true if the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: SagaState) -> bool {
        use SagaState::*;

        matches!(
            (*self, next),
            (Created, AwaitingApproval | ReservingInventory | Failed)
                | (AwaitingApproval, Approved | Rejected | Expired)
                | (Approved, ReservingInventory)
                | (ReservingInventory, InventoryReserved | Failed)
                | (InventoryReserved, ProcessingPayment)
                | (ProcessingPayment, PaymentProcessed | Compensating)
                | (PaymentProcessed, ArrangingDelivery)
                | (ArrangingDelivery, Fulfilled | Compensating)
                | (Compensating, Failed)
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaState::Fulfilled | SagaState::Rejected | SagaState::Expired | SagaState::Failed
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Created => "Created",
            SagaState::AwaitingApproval => "AwaitingApproval",
            SagaState::Approved => "Approved",
            SagaState::Rejected => "Rejected",
            SagaState::Expired => "Expired",
            SagaState::ReservingInventory => "ReservingInventory",
            SagaState::InventoryReserved => "InventoryReserved",
            SagaState::ProcessingPayment => "ProcessingPayment",
            SagaState::PaymentProcessed => "PaymentProcessed",
            SagaState::ArrangingDelivery => "ArrangingDelivery",
            SagaState::Fulfilled => "Fulfilled",
            SagaState::Compensating => "Compensating",
            SagaState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
