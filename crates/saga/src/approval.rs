//! Human approval gate with a deadline.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Where a human approval stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    /// Nobody decided before the deadline.
    Expired,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "Pending",
            ApprovalStatus::Approved => "Approved",
            ApprovalStatus::Rejected => "Rejected",
            ApprovalStatus::Expired => "Expired",
        }
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The approval decision for one saga, set at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ApprovalDecision {
    pub status: ApprovalStatus,
    /// Note supplied by the approver.
    pub note: Option<String>,
    /// When the decision left `Pending`.
    pub decided_at: Option<DateTime<Utc>>,
}

impl ApprovalDecision {
    /// Returns true while no decision has been made.
    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    fn resolved(status: ApprovalStatus, note: Option<String>) -> Self {
        Self {
            status,
            note,
            decided_at: Some(Utc::now()),
        }
    }
}

/// A latch holding one saga's approval decision.
///
/// The first decision wins. `decide` and the timeout path in
/// `await_decision` both check for `Pending` and write inside the same
/// `send_if_modified` call, so a decision racing the deadline can never
/// overwrite an expiry or the other way round.
#[derive(Debug)]
pub struct ApprovalGate {
    decision: watch::Sender<ApprovalDecision>,
}

impl Default for ApprovalGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ApprovalGate {
    /// Creates a gate in the `Pending` state.
    pub fn new() -> Self {
        let (decision, _) = watch::channel(ApprovalDecision::default());
        Self { decision }
    }

    /// Records an approval or rejection if nothing has been decided yet.
    ///
    /// Returns true if this call set the decision; false if it was ignored
    /// because a decision already exists.
    pub fn decide(&self, approved: bool, note: Option<String>) -> bool {
        let status = if approved {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Rejected
        };

        let applied = self.resolve(status, note);
        if applied {
            tracing::info!(%status, "approval decision recorded");
        } else {
            tracing::debug!(%status, "approval decision ignored, already decided");
        }
        applied
    }

    /// Waits until a decision exists or `timeout` elapses.
    ///
    /// On timeout a still-pending decision becomes `Expired`. A decision
    /// made before this call returns immediately.
    pub async fn await_decision(&self, timeout: Duration) -> ApprovalDecision {
        let mut rx = self.decision.subscribe();
        let waited = tokio::time::timeout(timeout, rx.wait_for(|d| !d.is_pending()))
            .await
            .map(|result| result.map(|decision| decision.clone()));

        match waited {
            Ok(Ok(decision)) => decision,
            // The sender lives in `self`, so the channel cannot close while
            // we wait; fall back to the current value regardless.
            Ok(Err(_)) => self.current_decision(),
            Err(_) => {
                if self.resolve(ApprovalStatus::Expired, None) {
                    tracing::warn!(timeout_ms = timeout.as_millis() as u64, "approval expired");
                }
                self.current_decision()
            }
        }
    }

    /// Returns the current decision without waiting.
    pub fn current_decision(&self) -> ApprovalDecision {
        self.decision.borrow().clone()
    }

    /// Returns a receiver that observes every change to the decision.
    pub fn subscribe(&self) -> watch::Receiver<ApprovalDecision> {
        self.decision.subscribe()
    }

    fn resolve(&self, status: ApprovalStatus, note: Option<String>) -> bool {
        self.decision.send_if_modified(|current| {
            if !current.is_pending() {
                return false;
            }
            *current = ApprovalDecision::resolved(status, note);
            true
        })
    }
}
