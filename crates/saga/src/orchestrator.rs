//! The order fulfillment state machine for a single saga.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use common::{RetryPolicy, SagaId, StepError, StepFailure};
use domain::{Money, Order};
use tokio::sync::watch;

use crate::approval::{ApprovalGate, ApprovalStatus};
use crate::config::SagaConfig;
use crate::error::{Result, SagaError};
use crate::events::{SagaEvent, SagaJournal};
use crate::ledger::{CompensationLedger, CompensationOutcome, CompensationRecord, Compensator};
use crate::order_fulfillment::{self, StepKind};
use crate::outcome::{Receipts, SagaOutcome};
use crate::services::{
    DeliveryService, InventoryService, NotificationService, PaymentService, SagaServices,
    StepReport,
};
use crate::state::SagaState;

/// Drives one order through approval, the three forward steps and, on
/// failure, compensation.
///
/// The orchestrator exclusively owns the saga state and the compensation
/// ledger. It reads the approval gate but only the gate itself mutates it.
/// Every state change is published on a watch channel and appended to the
/// saga's journal.
pub struct SagaOrchestrator<I, P, D, N> {
    saga_id: SagaId,
    order: Arc<Order>,
    config: Arc<SagaConfig>,
    services: Arc<SagaServices<I, P, D, N>>,
    gate: Arc<ApprovalGate>,
    status: watch::Sender<SagaState>,
    journal: SagaJournal,
    state: SagaState,
    ledger: CompensationLedger,
    receipts: Receipts,
}

impl<I, P, D, N> SagaOrchestrator<I, P, D, N>
where
    I: InventoryService,
    P: PaymentService,
    D: DeliveryService,
    N: NotificationService,
{
    /// Creates an orchestrator in the `Created` state.
    pub fn new(
        saga_id: SagaId,
        order: Order,
        config: Arc<SagaConfig>,
        services: Arc<SagaServices<I, P, D, N>>,
        gate: Arc<ApprovalGate>,
    ) -> Self {
        let (status, _) = watch::channel(SagaState::Created);
        Self {
            saga_id,
            order: Arc::new(order),
            config,
            services,
            gate,
            status,
            journal: SagaJournal::new(),
            state: SagaState::Created,
            ledger: CompensationLedger::new(),
            receipts: Receipts::default(),
        }
    }

    pub fn saga_id(&self) -> SagaId {
        self.saga_id
    }

    pub fn order(&self) -> &Order {
        &self.order
    }

    /// Returns true if the order total is above the approval threshold.
    pub fn requires_approval(&self) -> bool {
        self.config.approval_threshold.requires_approval(&self.order)
    }

    /// Returns a receiver that tracks the saga state.
    pub fn status(&self) -> watch::Receiver<SagaState> {
        self.status.subscribe()
    }

    /// Returns a handle to the saga's event journal.
    pub fn journal(&self) -> SagaJournal {
        self.journal.clone()
    }

    /// Runs the saga to a terminal state.
    ///
    /// Step failures end in `Failed` and are reported in the outcome. An
    /// `Err` means the orchestration itself was defective.
    #[tracing::instrument(
        skip(self),
        fields(
            saga_id = %self.saga_id,
            order_id = %self.order.id(),
            saga_type = order_fulfillment::SAGA_TYPE,
        )
    )]
    pub async fn run(mut self) -> Result<SagaOutcome> {
        metrics::counter!("saga_started_total").increment(1);
        let saga_start = std::time::Instant::now();

        let requires_approval = self.requires_approval();
        self.journal.append(SagaEvent::saga_started(
            self.saga_id,
            self.order.id().clone(),
            order_fulfillment::SAGA_TYPE,
            self.order.total_amount(),
            requires_approval,
        ));
        tracing::info!(
            total = %self.order.total_amount(),
            requires_approval,
            "saga started"
        );

        let result = self.drive(requires_approval).await;
        let duration = saga_start.elapsed().as_secs_f64();
        metrics::histogram!("saga_duration_seconds").record(duration);

        match &result {
            Ok(outcome) => {
                match outcome.status {
                    SagaState::Fulfilled => metrics::counter!("saga_completed_total").increment(1),
                    SagaState::Rejected => metrics::counter!("saga_rejected_total").increment(1),
                    SagaState::Expired => metrics::counter!("saga_expired_total").increment(1),
                    _ => metrics::counter!("saga_failed_total").increment(1),
                }
                tracing::info!(status = %outcome.status, duration, "saga finished");
            }
            Err(error) => {
                metrics::counter!("saga_failed_total").increment(1);
                tracing::error!(%error, state = %self.state, "saga aborted");
            }
        }

        result
    }

    async fn drive(&mut self, requires_approval: bool) -> Result<SagaOutcome> {
        if self.order.payment().is_expired() {
            let error = StepError::Validation(format!(
                "Card {} expired {:02}/{}",
                self.order.payment().masked_number(),
                self.order.payment().expiry_month(),
                self.order.payment().expiry_year()
            ));
            tracing::warn!(%error, "payment instrument rejected before any step");
            self.transition(SagaState::Failed)?;
            return Ok(self.finish(Some(error.to_string()), Vec::new(), None));
        }

        if requires_approval {
            if let Some(outcome) = self.await_approval().await? {
                return Ok(outcome);
            }
        }

        let services = self.services.clone();
        let order = self.order.clone();
        let policy = self.config.step_retry;

        // Reserve inventory
        self.transition(SagaState::ReservingInventory)?;
        let reservation = match run_step(&policy, StepKind::Inventory, || {
            services.inventory.reserve(&order)
        })
        .await
        {
            Ok(reservation) => reservation,
            Err(failure) => return self.fail(StepKind::Inventory, failure).await,
        };
        self.ledger
            .record(StepKind::Inventory, &reservation.reservation_id)?;
        self.journal.append(SagaEvent::StepCompleted {
            step: StepKind::Inventory,
            reference: reservation.reservation_id.clone(),
        });
        self.receipts.inventory = Some(reservation);
        self.transition(SagaState::InventoryReserved)?;

        // Charge payment
        self.transition(SagaState::ProcessingPayment)?;
        let payment = match run_step(&policy, StepKind::Payment, || {
            services.payment.charge(&order)
        })
        .await
        {
            Ok(payment) => payment,
            Err(failure) => return self.fail(StepKind::Payment, failure).await,
        };
        self.ledger
            .record(StepKind::Payment, &payment.transaction_id)?;
        self.journal.append(SagaEvent::StepCompleted {
            step: StepKind::Payment,
            reference: payment.transaction_id.clone(),
        });
        self.receipts.payment = Some(payment);
        self.transition(SagaState::PaymentProcessed)?;

        // Arrange delivery
        self.transition(SagaState::ArrangingDelivery)?;
        let delivery = match run_step(&policy, StepKind::Delivery, || {
            services.delivery.arrange(&order)
        })
        .await
        {
            Ok(delivery) => delivery,
            Err(failure) => return self.fail(StepKind::Delivery, failure).await,
        };
        let tracking_number = delivery.tracking_number.clone();
        self.journal.append(SagaEvent::StepCompleted {
            step: StepKind::Delivery,
            reference: tracking_number.clone(),
        });
        self.receipts.delivery = Some(delivery);
        self.transition(SagaState::Fulfilled)?;

        let notification_error = self.send_confirmation(&tracking_number).await;
        Ok(self.finish(None, Vec::new(), notification_error))
    }

    /// Parks the saga on the approval gate.
    ///
    /// Returns a terminal outcome if the order was rejected or the wait
    /// expired, or `None` once approved.
    async fn await_approval(&mut self) -> Result<Option<SagaOutcome>> {
        self.transition(SagaState::AwaitingApproval)?;
        tracing::info!(
            timeout_secs = self.config.approval_timeout.as_secs(),
            "waiting for approval"
        );

        let decision = self
            .gate
            .await_decision(self.config.approval_timeout)
            .await;
        self.journal
            .append(SagaEvent::ApprovalResolved(decision.clone()));

        match decision.status {
            ApprovalStatus::Approved => {
                self.transition(SagaState::Approved)?;
                Ok(None)
            }
            ApprovalStatus::Rejected => {
                self.transition(SagaState::Rejected)?;
                let reason = match decision.note.as_deref() {
                    Some(note) => format!("Order rejected by approver: {note}"),
                    None => "Order rejected by approver".to_string(),
                };
                Ok(Some(self.finish(Some(reason), Vec::new(), None)))
            }
            ApprovalStatus::Expired => {
                self.transition(SagaState::Expired)?;
                let reason = format!(
                    "No approval decision within {}s",
                    self.config.approval_timeout.as_secs()
                );
                Ok(Some(self.finish(Some(reason), Vec::new(), None)))
            }
            ApprovalStatus::Pending => Err(SagaError::ApprovalUnresolved),
        }
    }

    /// Handles a step that failed for good: unwinds whatever committed and
    /// ends in `Failed`.
    async fn fail(&mut self, step: StepKind, failure: StepFailure) -> Result<SagaOutcome> {
        tracing::warn!(step = step.as_str(), error = %failure, "saga step failed");
        self.journal.append(SagaEvent::StepFailed {
            step,
            error: failure.error.clone(),
            attempts: failure.attempts,
        });

        let reason = format!("Step '{step}' failed: {failure}");
        if self.ledger.is_empty() {
            self.transition(SagaState::Failed)?;
            return Ok(self.finish(Some(reason), Vec::new(), None));
        }

        self.transition(SagaState::Compensating)?;
        self.journal
            .append(SagaEvent::CompensationStarted { failed_step: step });

        let refund_amount = self
            .receipts
            .payment
            .as_ref()
            .map(|p| p.amount)
            .unwrap_or_else(|| self.order.total_amount());
        let compensator = ServiceCompensator {
            inventory: &self.services.inventory,
            payment: &self.services.payment,
            refund_amount,
        };
        let compensations = self
            .ledger
            .unwind_all(&compensator, &self.config.compensation_retry)
            .await;

        for outcome in &compensations {
            self.journal.append(match &outcome.error {
                None => SagaEvent::CompensationStepCompleted {
                    step: outcome.step,
                    undo_token: outcome.undo_token.clone(),
                },
                Some(error) => SagaEvent::CompensationStepFailed {
                    step: outcome.step,
                    undo_token: outcome.undo_token.clone(),
                    error: error.clone(),
                },
            });
        }

        self.transition(SagaState::Failed)?;
        Ok(self.finish(Some(reason), compensations, None))
    }

    /// Sends the order confirmation. Failure is reported, never fatal.
    async fn send_confirmation(&self, tracking_number: &str) -> Option<StepError> {
        let services = self.services.clone();
        let order = self.order.clone();

        let result = self
            .config
            .step_retry
            .execute(order_fulfillment::SEND_CONFIRMATION, || {
                services
                    .notification
                    .send_confirmation(&order, tracking_number)
            })
            .await;

        match result {
            Ok(()) => {
                self.journal.append(SagaEvent::NotificationSent {
                    recipient: order.customer_email().to_string(),
                });
                None
            }
            Err(failure) => {
                tracing::warn!(error = %failure, "order confirmation not sent");
                self.journal.append(SagaEvent::NotificationFailed {
                    error: failure.error.clone(),
                });
                Some(failure.error)
            }
        }
    }

    fn transition(&mut self, next: SagaState) -> Result<()> {
        let from = self.state;
        if !from.can_transition_to(next) {
            return Err(SagaError::InvalidTransition { from, to: next });
        }

        self.state = next;
        self.status.send_replace(next);
        self.journal
            .append(SagaEvent::StateChanged { from, to: next });
        tracing::info!(%from, to = %next, "saga state changed");
        Ok(())
    }

    fn finish(
        &mut self,
        error: Option<String>,
        compensations: Vec<CompensationOutcome>,
        notification_error: Option<StepError>,
    ) -> SagaOutcome {
        self.journal
            .append(SagaEvent::saga_finished(self.state, error.clone()));

        let message = match (self.state, self.receipts.delivery.as_ref()) {
            (SagaState::Fulfilled, Some(delivery)) => format!(
                "Order {} fulfilled, tracking {} arriving {}",
                self.order.id(),
                delivery.tracking_number,
                delivery.estimated_delivery
            ),
            (state, _) => match error.as_deref() {
                Some(reason) => format!("Order {} {}: {}", self.order.id(), state, reason),
                None => format!("Order {} {}", self.order.id(), state),
            },
        };

        SagaOutcome {
            saga_id: self.saga_id,
            order_id: self.order.id().clone(),
            status: self.state,
            receipts: self.receipts.clone(),
            approval: self.gate.current_decision(),
            error,
            compensations,
            notification_error,
            message,
        }
    }
}

/// Runs one forward step under the retry policy.
///
/// A result that reports itself unsuccessful becomes a `Declined` failure so
/// the policy stops at once.
async fn run_step<T, F, Fut>(
    policy: &RetryPolicy,
    step: StepKind,
    mut operation: F,
) -> std::result::Result<T, StepFailure>
where
    T: StepReport,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, StepError>>,
{
    tracing::info!(step = step.as_str(), "saga step started");

    let mut attempts = 0u32;
    let result = policy
        .execute(step.as_str(), || {
            attempts += 1;
            let attempt = operation();
            async move {
                let report = attempt.await?;
                if report.succeeded() {
                    Ok(report)
                } else {
                    Err(StepError::Declined(report.message().to_string()))
                }
            }
        })
        .await;

    if attempts > 1 {
        metrics::counter!("saga_step_retries_total", "step" => step.as_str())
            .increment(u64::from(attempts - 1));
    }
    if result.is_ok() {
        tracing::info!(step = step.as_str(), attempts, "saga step completed");
    }
    result
}

/// Undoes committed steps through the saga's own services.
struct ServiceCompensator<'a, I, P> {
    inventory: &'a I,
    payment: &'a P,
    refund_amount: Money,
}

#[async_trait]
impl<I, P> Compensator for ServiceCompensator<'_, I, P>
where
    I: InventoryService,
    P: PaymentService,
{
    async fn undo(&self, record: &CompensationRecord) -> std::result::Result<(), StepError> {
        match record.step {
            StepKind::Inventory => self.inventory.release(&record.undo_token).await,
            StepKind::Payment => {
                self.payment
                    .refund(&record.undo_token, self.refund_amount)
                    .await
            }
            StepKind::Delivery => Err(StepError::Validation(
                "delivery has no compensation".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemoryServices;
    use domain::{OrderItem, PaymentDetails};
    use std::time::Duration;

    fn order_for(cents: i64) -> Order {
        Order::new(
            "ORD-ORCH",
            "buyer@example.com",
            vec![OrderItem::new("SKU-001", 1, Money::from_cents(cents))],
            PaymentDetails::test_card(),
        )
        .unwrap()
    }

    fn orchestrator(
        order: Order,
        services: &InMemoryServices,
    ) -> (
        SagaOrchestrator<
            crate::services::InMemoryInventoryService,
            crate::services::InMemoryPaymentService,
            crate::services::InMemoryDeliveryService,
            crate::services::InMemoryNotificationService,
        >,
        Arc<ApprovalGate>,
    ) {
        let gate = Arc::new(ApprovalGate::new());
        let config = SagaConfig::default().with_approval_timeout(Duration::from_secs(5));
        let orchestrator = SagaOrchestrator::new(
            SagaId::new(),
            order,
            Arc::new(config),
            Arc::new(services.clone()),
            gate.clone(),
        );
        (orchestrator, gate)
    }

    #[tokio::test]
    async fn test_small_order_is_fulfilled() {
        let services = InMemoryServices::default();
        let (orchestrator, _) = orchestrator(order_for(50_000), &services);
        let journal = orchestrator.journal();

        let outcome = orchestrator.run().await.unwrap();

        assert_eq!(outcome.status, SagaState::Fulfilled);
        assert!(outcome.receipts.is_complete());
        assert!(outcome.approval.is_pending());
        assert!(outcome.compensations.is_empty());
        assert_eq!(services.notification.sent().len(), 1);

        let states: Vec<SagaState> = journal
            .events()
            .into_iter()
            .filter_map(|e| match e {
                SagaEvent::StateChanged { to, .. } => Some(to),
                _ => None,
            })
            .collect();
        assert!(!states.contains(&SagaState::AwaitingApproval));
        assert_eq!(states.last(), Some(&SagaState::Fulfilled));
    }

    #[tokio::test]
    async fn test_status_channel_tracks_terminal_state() {
        let services = InMemoryServices::default();
        let (orchestrator, _) = orchestrator(order_for(100), &services);
        let status = orchestrator.status();

        orchestrator.run().await.unwrap();

        assert_eq!(*status.borrow(), SagaState::Fulfilled);
    }

    #[tokio::test]
    async fn test_payment_decline_releases_inventory() {
        let services = InMemoryServices::default();
        services
            .payment
            .fail_charge_with(StepError::Declined("insufficient funds".into()));
        let (orchestrator, _) = orchestrator(order_for(50_000), &services);

        let outcome = orchestrator.run().await.unwrap();

        assert_eq!(outcome.status, SagaState::Failed);
        assert_eq!(outcome.compensations.len(), 1);
        assert_eq!(outcome.compensations[0].step, StepKind::Inventory);
        assert_eq!(services.inventory.released(), vec!["RES-0001".to_string()]);
        assert_eq!(services.payment.charge_calls(), 1);
        assert!(outcome.error.unwrap().contains("insufficient funds"));
    }

    #[tokio::test]
    async fn test_unsuccessful_result_is_not_retried() {
        let services = InMemoryServices::default();
        services
            .inventory
            .set_out_of_stock(Some("SKU-001 out of stock".into()));
        let (orchestrator, _) = orchestrator(order_for(100), &services);

        let outcome = orchestrator.run().await.unwrap();

        assert_eq!(outcome.status, SagaState::Failed);
        assert_eq!(services.inventory.reserve_calls(), 1);
        assert!(outcome.compensations.is_empty());
        assert_eq!(services.payment.charge_calls(), 0);
    }

    #[tokio::test]
    async fn test_rejection_note_in_outcome() {
        let services = InMemoryServices::default();
        let (orchestrator, gate) = orchestrator(order_for(150_000), &services);
        gate.decide(false, Some("fraud check".into()));

        let outcome = orchestrator.run().await.unwrap();

        assert_eq!(outcome.status, SagaState::Rejected);
        assert_eq!(outcome.approval.note.as_deref(), Some("fraud check"));
        assert!(outcome.error.unwrap().contains("fraud check"));
        assert_eq!(services.inventory.reserve_calls(), 0);
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_fulfilled() {
        let services = InMemoryServices::default();
        services
            .notification
            .fail_with(StepError::Validation("bad address".into()));
        let (orchestrator, _) = orchestrator(order_for(100), &services);

        let outcome = orchestrator.run().await.unwrap();

        assert!(outcome.is_fulfilled());
        assert_eq!(
            outcome.notification_error,
            Some(StepError::Validation("bad address".into()))
        );
    }
}
