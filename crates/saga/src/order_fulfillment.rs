//! Order fulfillment saga constants and step kinds.

use serde::{Deserialize, Serialize};

/// The saga type identifier for order fulfillment.
pub const SAGA_TYPE: &str = "OrderFulfillment";

/// Step name: Reserve inventory for the order.
pub const STEP_RESERVE_INVENTORY: &str = "reserve_inventory";

/// Step name: Charge the order total.
pub const STEP_PROCESS_PAYMENT: &str = "process_payment";

/// Step name: Schedule delivery.
pub const STEP_ARRANGE_DELIVERY: &str = "arrange_delivery";

/// Post-fulfillment confirmation; not a saga step and never compensated.
pub const SEND_CONFIRMATION: &str = "send_confirmation";

/// The forward steps of the saga, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepKind {
    Inventory,
    Payment,
    Delivery,
}

impl StepKind {
    /// Steps in the order the saga runs them.
    pub const ORDER: [StepKind; 3] = [StepKind::Inventory, StepKind::Payment, StepKind::Delivery];

    /// Returns the step name used in logs, metrics and events.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Inventory => STEP_RESERVE_INVENTORY,
            StepKind::Payment => STEP_PROCESS_PAYMENT,
            StepKind::Delivery => STEP_ARRANGE_DELIVERY,
        }
    }

    /// Returns true if the step has an undo operation.
    ///
    /// Delivery runs last and only once everything else has committed, so
    /// it never needs one.
    pub fn is_compensable(&self) -> bool {
        !matches!(self, StepKind::Delivery)
    }

    /// Returns the name of the undo operation, if the step has one.
    pub fn compensation_name(&self) -> Option<&'static str> {
        match self {
            StepKind::Inventory => Some("release_inventory"),
            StepKind::Payment => Some("refund_payment"),
            StepKind::Delivery => None,
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
