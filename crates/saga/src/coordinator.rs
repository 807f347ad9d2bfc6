//! Saga coordinator: starts sagas as tasks and routes signals and queries.

use std::collections::HashMap;
use std::sync::Arc;

use common::SagaId;
use domain::{Order, OrderId};
use tokio::sync::{RwLock, mpsc, oneshot, watch};

use crate::approval::{ApprovalDecision, ApprovalGate};
use crate::config::SagaConfig;
use crate::error::{Result, SagaError};
use crate::events::{SagaEvent, SagaJournal};
use crate::orchestrator::SagaOrchestrator;
use crate::outcome::SagaOutcome;
use crate::services::{
    DeliveryService, InventoryService, NotificationService, PaymentService, SagaServices,
};
use crate::state::SagaState;

/// Signals delivered into a running saga's task.
#[derive(Debug)]
enum SagaSignal {
    Decide {
        approved: bool,
        note: Option<String>,
        reply: oneshot::Sender<bool>,
    },
}

/// Answer to an approval decision request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionAck {
    /// This request set the decision.
    Applied(ApprovalDecision),
    /// A decision (or expiry) already existed; it is returned unchanged.
    AlreadyDecided(ApprovalDecision),
    /// The order is below the approval threshold.
    NotRequired,
}

impl DecisionAck {
    /// Returns true if this request set the decision.
    pub fn is_applied(&self) -> bool {
        matches!(self, DecisionAck::Applied(_))
    }
}

type OutcomeSlot = Option<Result<SagaOutcome>>;

/// What the coordinator keeps for each saga it started.
#[derive(Clone)]
struct SagaHandle {
    order_id: OrderId,
    requires_approval: bool,
    mailbox: mpsc::Sender<SagaSignal>,
    status: watch::Receiver<SagaState>,
    gate: Arc<ApprovalGate>,
    journal: SagaJournal,
    outcome: watch::Receiver<OutcomeSlot>,
}

/// Starts order fulfillment sagas and exposes their control boundary.
///
/// Each saga runs on its own tokio task and shares nothing mutable with the
/// others. Decisions travel through the saga's bounded mailbox; queries read
/// the state it publishes and never block it.
pub struct SagaCoordinator<I, P, D, N> {
    config: Arc<SagaConfig>,
    services: Arc<SagaServices<I, P, D, N>>,
    sagas: Arc<RwLock<HashMap<SagaId, SagaHandle>>>,
}

impl<I, P, D, N> Clone for SagaCoordinator<I, P, D, N> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            services: self.services.clone(),
            sagas: self.sagas.clone(),
        }
    }
}

impl<I, P, D, N> SagaCoordinator<I, P, D, N>
where
    I: InventoryService + 'static,
    P: PaymentService + 'static,
    D: DeliveryService + 'static,
    N: NotificationService + 'static,
{
    /// Creates a new saga coordinator.
    pub fn new(config: SagaConfig, services: SagaServices<I, P, D, N>) -> Self {
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
            sagas: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &SagaConfig {
        &self.config
    }

    /// Starts a saga for the order and returns its ID without waiting.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id()))]
    pub async fn start(&self, order: Order) -> SagaId {
        let saga_id = SagaId::new();
        let gate = Arc::new(ApprovalGate::new());
        let orchestrator = SagaOrchestrator::new(
            saga_id,
            order,
            self.config.clone(),
            self.services.clone(),
            gate.clone(),
        );

        let (mailbox_tx, mailbox_rx) = mpsc::channel(self.config.mailbox_capacity.max(1));
        let (outcome_tx, outcome_rx) = watch::channel(None);

        let handle = SagaHandle {
            order_id: orchestrator.order().id().clone(),
            requires_approval: orchestrator.requires_approval(),
            mailbox: mailbox_tx,
            status: orchestrator.status(),
            gate: gate.clone(),
            journal: orchestrator.journal(),
            outcome: outcome_rx,
        };
        self.sagas.write().await.insert(saga_id, handle);

        tokio::spawn(drive_saga(orchestrator, gate, mailbox_rx, outcome_tx));
        tracing::info!(%saga_id, "saga spawned");
        saga_id
    }

    /// Delivers an approval decision to a saga.
    ///
    /// Only the first decision counts. Later ones, and any decision after
    /// the approval wait expired, are acknowledged as `AlreadyDecided`.
    pub async fn decide(
        &self,
        saga_id: SagaId,
        approved: bool,
        note: Option<String>,
    ) -> Result<DecisionAck> {
        let handle = self.handle(saga_id).await?;
        if !handle.requires_approval {
            tracing::debug!(%saga_id, "decision ignored, saga does not require approval");
            return Ok(DecisionAck::NotRequired);
        }

        let (reply, applied) = oneshot::channel();
        let signal = SagaSignal::Decide {
            approved,
            note,
            reply,
        };
        if handle.mailbox.send(signal).await.is_err() {
            // The saga task has finished; its decision is final.
            return Ok(DecisionAck::AlreadyDecided(handle.gate.current_decision()));
        }

        let applied = applied.await.unwrap_or(false);
        let decision = handle.gate.current_decision();
        if applied {
            Ok(DecisionAck::Applied(decision))
        } else {
            Ok(DecisionAck::AlreadyDecided(decision))
        }
    }

    /// Returns the saga's current state.
    pub async fn query_status(&self, saga_id: SagaId) -> Result<SagaState> {
        let handle = self.handle(saga_id).await?;
        let state = *handle.status.borrow();
        Ok(state)
    }

    /// Returns the approver's note, if a decision with a note was made.
    pub async fn query_approval_note(&self, saga_id: SagaId) -> Result<Option<String>> {
        Ok(self.query_approval(saga_id).await?.note)
    }

    /// Returns the full approval decision.
    pub async fn query_approval(&self, saga_id: SagaId) -> Result<ApprovalDecision> {
        let handle = self.handle(saga_id).await?;
        Ok(handle.gate.current_decision())
    }

    /// Returns true if the saga's order is above the approval threshold.
    pub async fn requires_approval(&self, saga_id: SagaId) -> Result<bool> {
        Ok(self.handle(saga_id).await?.requires_approval)
    }

    /// Returns the order the saga is fulfilling.
    pub async fn order_id(&self, saga_id: SagaId) -> Result<OrderId> {
        Ok(self.handle(saga_id).await?.order_id)
    }

    /// Returns the saga's events recorded so far.
    pub async fn history(&self, saga_id: SagaId) -> Result<Vec<SagaEvent>> {
        Ok(self.handle(saga_id).await?.journal.events())
    }

    /// Waits for the saga to reach a terminal state and returns its outcome.
    pub async fn await_result(&self, saga_id: SagaId) -> Result<SagaOutcome> {
        let mut outcome = self.handle(saga_id).await?.outcome;
        let published = outcome
            .wait_for(Option::is_some)
            .await
            .map_err(|_| SagaError::Aborted(saga_id))?;

        match &*published {
            Some(result) => result.clone(),
            None => Err(SagaError::Aborted(saga_id)),
        }
    }

    /// Returns the IDs of every saga this coordinator knows about.
    pub async fn saga_ids(&self) -> Vec<SagaId> {
        self.sagas.read().await.keys().copied().collect()
    }

    /// Drops a finished saga's handle. Running sagas are kept.
    pub async fn forget(&self, saga_id: SagaId) -> bool {
        let mut sagas = self.sagas.write().await;
        let finished = sagas
            .get(&saga_id)
            .is_some_and(|handle| handle.outcome.borrow().is_some());
        if finished {
            sagas.remove(&saga_id);
        }
        finished
    }

    async fn handle(&self, saga_id: SagaId) -> Result<SagaHandle> {
        self.sagas
            .read()
            .await
            .get(&saga_id)
            .cloned()
            .ok_or(SagaError::SagaNotFound(saga_id))
    }
}

/// Body of a saga task: runs the orchestrator while draining its mailbox.
async fn drive_saga<I, P, D, N>(
    orchestrator: SagaOrchestrator<I, P, D, N>,
    gate: Arc<ApprovalGate>,
    mut mailbox: mpsc::Receiver<SagaSignal>,
    outcome: watch::Sender<OutcomeSlot>,
) where
    I: InventoryService,
    P: PaymentService,
    D: DeliveryService,
    N: NotificationService,
{
    let saga_id = orchestrator.saga_id();
    let run = orchestrator.run();
    tokio::pin!(run);

    let mut mailbox_open = true;
    let result = loop {
        tokio::select! {
            result = &mut run => break result,
            signal = mailbox.recv(), if mailbox_open => match signal {
                Some(SagaSignal::Decide { approved, note, reply }) => {
                    let applied = gate.decide(approved, note);
                    let _ = reply.send(applied);
                }
                None => mailbox_open = false,
            },
        }
    };

    // Signals still queued are dropped; their senders see `AlreadyDecided`.
    mailbox.close();
    if let Err(error) = &result {
        tracing::error!(%saga_id, %error, "saga task ended with an error");
    }
    outcome.send_replace(Some(result));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        InMemoryDeliveryService, InMemoryInventoryService, InMemoryNotificationService,
        InMemoryPaymentService, InMemoryServices,
    };
    use domain::{Money, OrderItem, PaymentDetails};

    type TestCoordinator = SagaCoordinator<
        InMemoryInventoryService,
        InMemoryPaymentService,
        InMemoryDeliveryService,
        InMemoryNotificationService,
    >;

    fn order_for(cents: i64) -> Order {
        Order::new(
            OrderId::generate(),
            "buyer@example.com",
            vec![OrderItem::new("SKU-001", 1, Money::from_cents(cents))],
            PaymentDetails::test_card(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_unknown_saga_is_an_error() {
        let coordinator = TestCoordinator::new(SagaConfig::default(), InMemoryServices::default());
        let missing = SagaId::new();

        assert_eq!(
            coordinator.query_status(missing).await,
            Err(SagaError::SagaNotFound(missing))
        );
        assert!(matches!(
            coordinator.decide(missing, true, None).await,
            Err(SagaError::SagaNotFound(_))
        ));
        assert!(coordinator.await_result(missing).await.is_err());
    }

    #[tokio::test]
    async fn test_decide_on_small_order_is_not_required() {
        let coordinator = TestCoordinator::new(SagaConfig::default(), InMemoryServices::default());
        let saga_id = coordinator.start(order_for(500)).await;

        assert!(!coordinator.requires_approval(saga_id).await.unwrap());
        assert_eq!(
            coordinator.decide(saga_id, true, None).await.unwrap(),
            DecisionAck::NotRequired
        );
        assert!(coordinator.await_result(saga_id).await.unwrap().is_fulfilled());
    }

    #[tokio::test]
    async fn test_forget_only_finished_sagas() {
        let coordinator = TestCoordinator::new(SagaConfig::default(), InMemoryServices::default());
        let saga_id = coordinator.start(order_for(500)).await;

        coordinator.await_result(saga_id).await.unwrap();
        assert!(coordinator.forget(saga_id).await);
        assert!(coordinator.saga_ids().await.is_empty());
        assert!(!coordinator.forget(saga_id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forget_keeps_running_saga() {
        let coordinator = TestCoordinator::new(SagaConfig::default(), InMemoryServices::default());
        let saga_id = coordinator.start(order_for(200_000)).await;

        assert!(!coordinator.forget(saga_id).await);
        assert_eq!(coordinator.saga_ids().await, vec![saga_id]);
    }
}
