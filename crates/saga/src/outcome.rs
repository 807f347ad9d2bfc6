//! Terminal result of a saga.

use common::{SagaId, StepError};
use domain::OrderId;
use serde::{Deserialize, Serialize};

use crate::approval::ApprovalDecision;
use crate::ledger::CompensationOutcome;
use crate::services::{DeliveryResult, InventoryResult, PaymentResult};
use crate::state::SagaState;

/// Results of the forward steps that committed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Receipts {
    pub inventory: Option<InventoryResult>,
    pub payment: Option<PaymentResult>,
    pub delivery: Option<DeliveryResult>,
}

impl Receipts {
    /// Returns true once all three steps have committed.
    pub fn is_complete(&self) -> bool {
        self.inventory.is_some() && self.payment.is_some() && self.delivery.is_some()
    }
}

/// What a saga ended with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaOutcome {
    pub saga_id: SagaId,
    pub order_id: OrderId,
    /// Always a terminal state.
    pub status: SagaState,
    pub receipts: Receipts,
    /// Final approval decision; `Pending` if approval was never required.
    pub approval: ApprovalDecision,
    /// Why the saga did not fulfill the order.
    pub error: Option<String>,
    /// Undo results, most recent step first. Empty if nothing was unwound.
    pub compensations: Vec<CompensationOutcome>,
    /// Set when the confirmation notification could not be sent.
    pub notification_error: Option<StepError>,
    /// Human-readable summary.
    pub message: String,
}

impl SagaOutcome {
    /// Returns true if the order was fulfilled.
    pub fn is_fulfilled(&self) -> bool {
        self.status == SagaState::Fulfilled
    }

    /// Returns true if an undo failed and committed work was left behind.
    pub fn requires_reconciliation(&self) -> bool {
        self.compensations.iter().any(|c| !c.is_success())
    }
}
