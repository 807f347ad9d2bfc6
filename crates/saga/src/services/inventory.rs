//! Inventory service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::StepError;
use domain::{Order, OrderId, OrderItem};
use serde::{Deserialize, Serialize};

use super::StepReport;
use super::fault::{FaultPlan, simulate_latency};

/// Result of an inventory reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryResult {
    /// False when the service refused the reservation (e.g. out of stock).
    pub success: bool,
    /// The reservation ID assigned by the inventory service.
    pub reservation_id: String,
    /// Human-readable detail.
    pub message: String,
}

impl StepReport for InventoryResult {
    fn succeeded(&self) -> bool {
        self.success
    }

    fn message(&self) -> &str {
        &self.message
    }
}

/// Trait for inventory management operations.
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Reserves stock for every line item of the order.
    async fn reserve(&self, order: &Order) -> Result<InventoryResult, StepError>;

    /// Releases a previously made reservation.
    async fn release(&self, reservation_id: &str) -> Result<(), StepError>;
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    reservations: HashMap<String, (OrderId, Vec<OrderItem>)>,
    released: Vec<String>,
    next_id: u32,
    reserve_calls: u32,
    release_calls: u32,
    out_of_stock: Option<String>,
    reserve_faults: FaultPlan,
    release_faults: FaultPlan,
}

/// In-memory inventory service for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryService {
    state: Arc<RwLock<InMemoryInventoryState>>,
}

impl InMemoryInventoryService {
    /// Creates a new in-memory inventory service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every reserve call fail with `error` until cleared.
    pub fn fail_reserve_with(&self, error: StepError) {
        self.state
            .write()
            .unwrap()
            .reserve_faults
            .set_persistent(Some(error));
    }

    /// Makes the next `times` reserve calls fail with `error`.
    pub fn fail_reserve_times(&self, times: usize, error: StepError) {
        self.state.write().unwrap().reserve_faults.push(error, times);
    }

    /// Makes every release call fail with `error` until cleared.
    pub fn fail_release_with(&self, error: StepError) {
        self.state
            .write()
            .unwrap()
            .release_faults
            .set_persistent(Some(error));
    }

    /// Answers reserve calls with an unsuccessful result carrying `message`.
    pub fn set_out_of_stock(&self, message: Option<String>) {
        self.state.write().unwrap().out_of_stock = message;
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let mut state = self.state.write().unwrap();
        state.reserve_faults.set_latency(latency);
        state.release_faults.set_latency(latency);
    }

    /// Removes all injected failures.
    pub fn clear_faults(&self) {
        let mut state = self.state.write().unwrap();
        state.reserve_faults.clear();
        state.release_faults.clear();
        state.out_of_stock = None;
    }

    /// Returns the number of active reservations.
    pub fn reservation_count(&self) -> usize {
        self.state.read().unwrap().reservations.len()
    }

    /// Returns true if a reservation exists with the given ID.
    pub fn has_reservation(&self, reservation_id: &str) -> bool {
        self.state
            .read()
            .unwrap()
            .reservations
            .contains_key(reservation_id)
    }

    /// Returns the IDs of released reservations, in release order.
    pub fn released(&self) -> Vec<String> {
        self.state.read().unwrap().released.clone()
    }

    /// Returns how many times `reserve` was called.
    pub fn reserve_calls(&self) -> u32 {
        self.state.read().unwrap().reserve_calls
    }

    /// Returns how many times `release` was called.
    pub fn release_calls(&self) -> u32 {
        self.state.read().unwrap().release_calls
    }
}

#[async_trait]
impl InventoryService for InMemoryInventoryService {
    async fn reserve(&self, order: &Order) -> Result<InventoryResult, StepError> {
        let latency = self.state.read().unwrap().reserve_faults.latency();
        simulate_latency(latency).await;

        let mut state = self.state.write().unwrap();
        state.reserve_calls += 1;

        if let Some(error) = state.reserve_faults.next() {
            return Err(error);
        }

        if let Some(message) = state.out_of_stock.clone() {
            return Ok(InventoryResult {
                success: false,
                reservation_id: String::new(),
                message,
            });
        }

        state.next_id += 1;
        let reservation_id = format!("RES-{:04}", state.next_id);
        state.reservations.insert(
            reservation_id.clone(),
            (order.id().clone(), order.items().to_vec()),
        );

        Ok(InventoryResult {
            success: true,
            message: format!(
                "Reserved {} item(s) for order {}",
                order.items().len(),
                order.id()
            ),
            reservation_id,
        })
    }

    async fn release(&self, reservation_id: &str) -> Result<(), StepError> {
        let latency = self.state.read().unwrap().release_faults.latency();
        simulate_latency(latency).await;

        let mut state = self.state.write().unwrap();
        state.release_calls += 1;

        if let Some(error) = state.release_faults.next() {
            return Err(error);
        }

        state.reservations.remove(reservation_id);
        state.released.push(reservation_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Money, PaymentDetails};

    fn order() -> Order {
        Order::new(
            "ORD-INV",
            "inv@example.com",
            vec![OrderItem::new("SKU-001", 2, Money::from_cents(1000))],
            PaymentDetails::test_card(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_reserve_and_release() {
        let service = InMemoryInventoryService::new();

        let result = service.reserve(&order()).await.unwrap();
        assert!(result.success);
        assert!(result.reservation_id.starts_with("RES-"));
        assert_eq!(service.reservation_count(), 1);
        assert!(service.has_reservation(&result.reservation_id));

        service.release(&result.reservation_id).await.unwrap();
        assert_eq!(service.reservation_count(), 0);
        assert_eq!(service.released(), vec![result.reservation_id]);
    }

    #[tokio::test]
    async fn test_scripted_failures_then_success() {
        let service = InMemoryInventoryService::new();
        service.fail_reserve_times(1, StepError::Unavailable("db down".into()));

        assert!(service.reserve(&order()).await.is_err());
        assert!(service.reserve(&order()).await.is_ok());
        assert_eq!(service.reserve_calls(), 2);
        assert_eq!(service.reservation_count(), 1);
    }

    #[tokio::test]
    async fn test_out_of_stock_is_unsuccessful_result() {
        let service = InMemoryInventoryService::new();
        service.set_out_of_stock(Some("SKU-001 out of stock".into()));

        let result = service.reserve(&order()).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.message, "SKU-001 out of stock");
        assert_eq!(service.reservation_count(), 0);
    }

    #[tokio::test]
    async fn test_sequential_reservation_ids() {
        let service = InMemoryInventoryService::new();

        let r1 = service.reserve(&order()).await.unwrap();
        let r2 = service.reserve(&order()).await.unwrap();

        assert_eq!(r1.reservation_id, "RES-0001");
        assert_eq!(r2.reservation_id, "RES-0002");
    }
}
