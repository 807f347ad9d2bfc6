//! Saga audit events and the per-saga journal.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use common::{SagaId, StepError};
use domain::{Money, OrderId};
use serde::{Deserialize, Serialize};

use crate::approval::ApprovalDecision;
use crate::order_fulfillment::StepKind;
use crate::state::SagaState;

/// Events that can occur during saga execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SagaEvent {
    /// Saga execution started.
    SagaStarted(SagaStartedData),

    /// The state machine moved.
    StateChanged { from: SagaState, to: SagaState },

    /// The approval gate left `Pending`.
    ApprovalResolved(ApprovalDecision),

    /// A forward step committed.
    StepCompleted { step: StepKind, reference: String },

    /// A forward step failed for good.
    StepFailed {
        step: StepKind,
        error: StepError,
        attempts: u32,
    },

    /// Compensation started after a step failure.
    CompensationStarted { failed_step: StepKind },

    /// A committed step was undone.
    CompensationStepCompleted { step: StepKind, undo_token: String },

    /// An undo failed; the remaining undos still run.
    CompensationStepFailed {
        step: StepKind,
        undo_token: String,
        error: StepError,
    },

    /// The order confirmation went out.
    NotificationSent { recipient: String },

    /// The order confirmation could not be sent.
    NotificationFailed { error: StepError },

    /// The saga reached a terminal state.
    SagaFinished(SagaFinishedData),
}

impl SagaEvent {
    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            SagaEvent::SagaStarted(_) => "SagaStarted",
            SagaEvent::StateChanged { .. } => "StateChanged",
            SagaEvent::ApprovalResolved(_) => "ApprovalResolved",
            SagaEvent::StepCompleted { .. } => "StepCompleted",
            SagaEvent::StepFailed { .. } => "StepFailed",
            SagaEvent::CompensationStarted { .. } => "CompensationStarted",
            SagaEvent::CompensationStepCompleted { .. } => "CompensationStepCompleted",
            SagaEvent::CompensationStepFailed { .. } => "CompensationStepFailed",
            SagaEvent::NotificationSent { .. } => "NotificationSent",
            SagaEvent::NotificationFailed { .. } => "NotificationFailed",
            SagaEvent::SagaFinished(_) => "SagaFinished",
        }
    }

    /// Creates a SagaStarted event.
    pub fn saga_started(
        saga_id: SagaId,
        order_id: OrderId,
        saga_type: impl Into<String>,
        total_amount: Money,
        requires_approval: bool,
    ) -> Self {
        SagaEvent::SagaStarted(SagaStartedData {
            saga_id,
            order_id,
            saga_type: saga_type.into(),
            total_amount,
            requires_approval,
            started_at: Utc::now(),
        })
    }

    /// Creates a SagaFinished event.
    pub fn saga_finished(state: SagaState, error: Option<String>) -> Self {
        SagaEvent::SagaFinished(SagaFinishedData {
            state,
            error,
            finished_at: Utc::now(),
        })
    }
}

/// Data for SagaStarted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaStartedData {
    pub saga_id: SagaId,
    pub order_id: OrderId,
    /// The type of saga (e.g., "OrderFulfillment").
    pub saga_type: String,
    pub total_amount: Money,
    pub requires_approval: bool,
    pub started_at: DateTime<Utc>,
}

/// Data for SagaFinished event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaFinishedData {
    /// The terminal state reached.
    pub state: SagaState,
    /// Reason, for every terminal state except `Fulfilled`.
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

/// A journaled event with its position and time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// 1-based position in the saga's journal.
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
    pub event: SagaEvent,
}

/// Append-only event log for one saga.
///
/// The orchestrator appends; anyone holding a clone may read.
#[derive(Debug, Clone, Default)]
pub struct SagaJournal {
    entries: Arc<RwLock<Vec<JournalEntry>>>,
}

impl SagaJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event and returns its sequence number.
    pub fn append(&self, event: SagaEvent) -> u64 {
        let mut entries = self.write();
        let sequence = entries.len() as u64 + 1;
        entries.push(JournalEntry {
            sequence,
            recorded_at: Utc::now(),
            event,
        });
        sequence
    }

    /// Returns every entry recorded so far.
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.read().clone()
    }

    /// Returns the events recorded so far, in order.
    pub fn events(&self) -> Vec<SagaEvent> {
        self.read()
            .iter()
            .map(|entry| entry.event.clone())
            .collect()
    }

    // Entries are pushed whole, so a poisoned lock still guards a valid log.
    fn read(&self) -> RwLockReadGuard<'_, Vec<JournalEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<JournalEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
