//! Order confirmation notifications.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::StepError;
use domain::{Order, OrderId};

use super::fault::FaultPlan;

/// Trait for customer notifications sent after fulfillment.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Sends the order confirmation to the customer.
    async fn send_confirmation(
        &self,
        order: &Order,
        tracking_number: &str,
    ) -> Result<(), StepError>;
}

/// A confirmation recorded by [`InMemoryNotificationService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentConfirmation {
    pub order_id: OrderId,
    pub recipient: String,
    pub tracking_number: String,
}

#[derive(Debug, Default)]
struct InMemoryNotificationState {
    sent: Vec<SentConfirmation>,
    faults: FaultPlan,
}

/// In-memory notification outbox for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationService {
    state: Arc<RwLock<InMemoryNotificationState>>,
}

impl InMemoryNotificationService {
    /// Creates an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send fail with `error` until cleared.
    pub fn fail_with(&self, error: StepError) {
        self.state
            .write()
            .unwrap()
            .faults
            .set_persistent(Some(error));
    }

    /// Returns every confirmation sent so far.
    pub fn sent(&self) -> Vec<SentConfirmation> {
        self.state.read().unwrap().sent.clone()
    }
}

#[async_trait]
impl NotificationService for InMemoryNotificationService {
    async fn send_confirmation(
        &self,
        order: &Order,
        tracking_number: &str,
    ) -> Result<(), StepError> {
        let mut state = self.state.write().unwrap();

        if let Some(error) = state.faults.next() {
            return Err(error);
        }

        state.sent.push(SentConfirmation {
            order_id: order.id().clone(),
            recipient: order.customer_email().to_string(),
            tracking_number: tracking_number.to_string(),
        });
        Ok(())
    }
}
