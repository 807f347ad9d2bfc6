//! Value threshold above which an order needs a human decision.

use serde::{Deserialize, Serialize};

use crate::order::{Money, Order};

/// Amount above which a saga must pause for approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApprovalThreshold(Money);

impl ApprovalThreshold {
    /// Creates a threshold at the given amount.
    pub fn new(amount: Money) -> Self {
        Self(amount)
    }

    /// Returns the threshold amount.
    pub fn amount(&self) -> Money {
        self.0
    }

    /// Returns true if `amount` is strictly above the threshold.
    pub fn exceeded_by(&self, amount: Money) -> bool {
        amount > self.0
    }

    /// Returns true if the order total is strictly above the threshold.
    pub fn requires_approval(&self, order: &Order) -> bool {
        self.exceeded_by(order.total_amount())
    }
}

impl Default for ApprovalThreshold {
    fn default() -> Self {
        Self(Money::from_dollars(1000))
    }
}
