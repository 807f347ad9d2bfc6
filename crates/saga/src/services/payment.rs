//! Payment service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::StepError;
use domain::{Money, Order, OrderId};
use serde::{Deserialize, Serialize};

use super::StepReport;
use super::fault::{FaultPlan, simulate_latency};

/// Result of a payment charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    /// False when the gateway refused the charge.
    pub success: bool,
    /// The transaction ID assigned by the payment service.
    pub transaction_id: String,
    /// Amount charged.
    pub amount: Money,
    /// Human-readable detail.
    pub message: String,
}

impl StepReport for PaymentResult {
    fn succeeded(&self) -> bool {
        self.success
    }

    fn message(&self) -> &str {
        &self.message
    }
}

/// Trait for payment processing operations.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Charges the order total to the order's payment instrument.
    async fn charge(&self, order: &Order) -> Result<PaymentResult, StepError>;

    /// Refunds a previously made charge.
    async fn refund(&self, transaction_id: &str, amount: Money) -> Result<(), StepError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    payments: HashMap<String, (OrderId, Money)>,
    refunds: Vec<(String, Money)>,
    next_id: u32,
    charge_calls: u32,
    refund_calls: u32,
    charge_faults: FaultPlan,
    refund_faults: FaultPlan,
    clock: Option<DateTime<Utc>>,
}

/// In-memory payment service for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentService {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentService {
    /// Creates a new in-memory payment service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every charge call fail with `error` until cleared.
    pub fn fail_charge_with(&self, error: StepError) {
        self.state
            .write()
            .unwrap()
            .charge_faults
            .set_persistent(Some(error));
    }

    /// Makes the next `times` charge calls fail with `error`.
    pub fn fail_charge_times(&self, times: usize, error: StepError) {
        self.state.write().unwrap().charge_faults.push(error, times);
    }

    /// Makes every refund call fail with `error` until cleared.
    pub fn fail_refund_with(&self, error: StepError) {
        self.state
            .write()
            .unwrap()
            .refund_faults
            .set_persistent(Some(error));
    }

    /// Checks card expiry against `now` instead of the wall clock.
    pub fn set_clock(&self, now: Option<DateTime<Utc>>) {
        self.state.write().unwrap().clock = now;
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let mut state = self.state.write().unwrap();
        state.charge_faults.set_latency(latency);
        state.refund_faults.set_latency(latency);
    }

    /// Removes all injected failures.
    pub fn clear_faults(&self) {
        let mut state = self.state.write().unwrap();
        state.charge_faults.clear();
        state.refund_faults.clear();
    }

    /// Returns the number of payments that have not been refunded.
    pub fn payment_count(&self) -> usize {
        self.state.read().unwrap().payments.len()
    }

    /// Returns true if an unrefunded payment exists with the given ID.
    pub fn has_payment(&self, transaction_id: &str) -> bool {
        self.state
            .read()
            .unwrap()
            .payments
            .contains_key(transaction_id)
    }

    /// Returns completed refunds as (transaction ID, amount), in order.
    pub fn refunds(&self) -> Vec<(String, Money)> {
        self.state.read().unwrap().refunds.clone()
    }

    /// Returns how many times `charge` was called.
    pub fn charge_calls(&self) -> u32 {
        self.state.read().unwrap().charge_calls
    }

    /// Returns how many times `refund` was called.
    pub fn refund_calls(&self) -> u32 {
        self.state.read().unwrap().refund_calls
    }
}

#[async_trait]
impl PaymentService for InMemoryPaymentService {
    async fn charge(&self, order: &Order) -> Result<PaymentResult, StepError> {
        let latency = self.state.read().unwrap().charge_faults.latency();
        simulate_latency(latency).await;

        let mut state = self.state.write().unwrap();
        state.charge_calls += 1;

        if let Some(error) = state.charge_faults.next() {
            return Err(error);
        }

        let card = order.payment();
        if card.is_expired_at(state.clock.unwrap_or_else(Utc::now)) {
            return Err(StepError::Validation(format!(
                "Card {} expired {:02}/{}",
                card.masked_number(),
                card.expiry_month(),
                card.expiry_year()
            )));
        }

        let amount = order.total_amount();
        state.next_id += 1;
        let transaction_id = format!("TXN-{:04}", state.next_id);
        state
            .payments
            .insert(transaction_id.clone(), (order.id().clone(), amount));

        Ok(PaymentResult {
            success: true,
            transaction_id,
            amount,
            message: format!(
                "Payment of {} charged to {}",
                amount,
                order.payment().masked_number()
            ),
        })
    }

    async fn refund(&self, transaction_id: &str, amount: Money) -> Result<(), StepError> {
        let latency = self.state.read().unwrap().refund_faults.latency();
        simulate_latency(latency).await;

        let mut state = self.state.write().unwrap();
        state.refund_calls += 1;

        if let Some(error) = state.refund_faults.next() {
            return Err(error);
        }

        state.payments.remove(transaction_id);
        state.refunds.push((transaction_id.to_string(), amount));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{OrderItem, PaymentDetails};

    fn order() -> Order {
        Order::new(
            "ORD-PAY",
            "pay@example.com",
            vec![OrderItem::new("SKU-001", 1, Money::from_cents(5000))],
            PaymentDetails::test_card(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_charge_and_refund() {
        let service = InMemoryPaymentService::new();

        let result = service.charge(&order()).await.unwrap();
        assert!(result.success);
        assert!(result.transaction_id.starts_with("TXN-"));
        assert_eq!(result.amount, Money::from_cents(5000));
        assert!(service.has_payment(&result.transaction_id));

        service
            .refund(&result.transaction_id, result.amount)
            .await
            .unwrap();
        assert_eq!(service.payment_count(), 0);
        assert_eq!(
            service.refunds(),
            vec![(result.transaction_id, Money::from_cents(5000))]
        );
    }

    #[tokio::test]
    async fn test_declined_charge() {
        let service = InMemoryPaymentService::new();
        service.fail_charge_with(StepError::Declined("insufficient funds".into()));

        let result = service.charge(&order()).await;
        assert_eq!(
            result.unwrap_err(),
            StepError::Declined("insufficient funds".into())
        );
        assert_eq!(service.payment_count(), 0);
        assert_eq!(service.charge_calls(), 1);
    }

    #[tokio::test]
    async fn test_transient_charge_failures_are_consumed() {
        let service = InMemoryPaymentService::new();
        service.fail_charge_times(2, StepError::Unavailable("gateway timeout".into()));

        assert!(service.charge(&order()).await.is_err());
        assert!(service.charge(&order()).await.is_err());
        let result = service.charge(&order()).await.unwrap();

        assert_eq!(result.transaction_id, "TXN-0001");
        assert_eq!(service.charge_calls(), 3);
        assert_eq!(service.payment_count(), 1);
    }

    #[tokio::test]
    async fn test_expired_card_is_not_charged() {
        let service = InMemoryPaymentService::new();
        let order = Order::new(
            "ORD-EXP",
            "pay@example.com",
            vec![OrderItem::new("SKU-001", 1, Money::from_cents(5000))],
            PaymentDetails::new("4111111111111111", 1, 2020, "Ada").unwrap(),
        )
        .unwrap();

        let error = service.charge(&order).await.unwrap_err();
        assert!(matches!(error, StepError::Validation(ref msg) if msg.contains("01/2020")));
        assert!(!error.is_retryable());
        assert_eq!(service.payment_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_refund_keeps_payment() {
        let service = InMemoryPaymentService::new();
        let result = service.charge(&order()).await.unwrap();
        service.fail_refund_with(StepError::Unavailable("gateway timeout".into()));

        assert!(
            service
                .refund(&result.transaction_id, result.amount)
                .await
                .is_err()
        );
        assert!(service.has_payment(&result.transaction_id));
        assert_eq!(service.refund_calls(), 1);
    }

    #[tokio::test]
    async fn test_sequential_transaction_ids() {
        let service = InMemoryPaymentService::new();

        let r1 = service.charge(&order()).await.unwrap();
        let r2 = service.charge(&order()).await.unwrap();

        assert_eq!(r1.transaction_id, "TXN-0001");
        assert_eq!(r2.transaction_id, "TXN-0002");
    }
}
