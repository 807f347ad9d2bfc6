//! Delivery service trait and in-memory implementation.
//!
//! Delivery is the last step of the saga and has no undo operation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use common::StepError;
use domain::{Order, OrderId};
use serde::{Deserialize, Serialize};

use super::StepReport;
use super::fault::{FaultPlan, simulate_latency};

/// Days between dispatch and the estimated delivery date.
const DELIVERY_LEAD_DAYS: u64 = 3;

/// Result of arranging a delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResult {
    /// False when the carrier refused the shipment.
    pub success: bool,
    /// The carrier's tracking number.
    pub tracking_number: String,
    /// Estimated delivery date.
    pub estimated_delivery: NaiveDate,
    /// Human-readable detail.
    pub message: String,
}

impl StepReport for DeliveryResult {
    fn succeeded(&self) -> bool {
        self.success
    }

    fn message(&self) -> &str {
        &self.message
    }
}

/// Trait for delivery operations.
#[async_trait]
pub trait DeliveryService: Send + Sync {
    /// Schedules delivery of the order.
    async fn arrange(&self, order: &Order) -> Result<DeliveryResult, StepError>;
}

#[derive(Debug, Default)]
struct InMemoryDeliveryState {
    shipments: HashMap<String, OrderId>,
    next_id: u32,
    arrange_calls: u32,
    faults: FaultPlan,
}

/// In-memory delivery service for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDeliveryService {
    state: Arc<RwLock<InMemoryDeliveryState>>,
}

impl InMemoryDeliveryService {
    /// Creates a new in-memory delivery service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every arrange call fail with `error` until cleared.
    pub fn fail_with(&self, error: StepError) {
        self.state
            .write()
            .unwrap()
            .faults
            .set_persistent(Some(error));
    }

    /// Makes the next `times` arrange calls fail with `error`.
    pub fn fail_times(&self, times: usize, error: StepError) {
        self.state.write().unwrap().faults.push(error, times);
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.state.write().unwrap().faults.set_latency(latency);
    }

    /// Removes all injected failures.
    pub fn clear_faults(&self) {
        self.state.write().unwrap().faults.clear();
    }

    /// Returns the number of scheduled shipments.
    pub fn shipment_count(&self) -> usize {
        self.state.read().unwrap().shipments.len()
    }

    /// Returns how many times `arrange` was called.
    pub fn arrange_calls(&self) -> u32 {
        self.state.read().unwrap().arrange_calls
    }
}

#[async_trait]
impl DeliveryService for InMemoryDeliveryService {
    async fn arrange(&self, order: &Order) -> Result<DeliveryResult, StepError> {
        let latency = self.state.read().unwrap().faults.latency();
        simulate_latency(latency).await;

        let mut state = self.state.write().unwrap();
        state.arrange_calls += 1;

        if let Some(error) = state.faults.next() {
            return Err(error);
        }

        state.next_id += 1;
        let tracking_number = format!("TRACK-{:04}", state.next_id);
        state
            .shipments
            .insert(tracking_number.clone(), order.id().clone());

        let today = Utc::now().date_naive();
        let estimated_delivery = today
            .checked_add_days(Days::new(DELIVERY_LEAD_DAYS))
            .unwrap_or(today);

        Ok(DeliveryResult {
            success: true,
            tracking_number,
            estimated_delivery,
            message: format!("Delivery scheduled for {estimated_delivery}"),
        })
    }
}
