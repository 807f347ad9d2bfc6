//! Scripted failure injection shared by the in-memory services.

use std::collections::VecDeque;
use std::time::Duration;

use common::StepError;

/// Failures an in-memory service should return instead of doing its work.
///
/// Scripted failures are consumed one per call, in order; once they run out
/// the persistent failure (if any) is returned on every call.
#[derive(Debug, Default)]
pub(crate) struct FaultPlan {
    scripted: VecDeque<StepError>,
    persistent: Option<StepError>,
    latency: Duration,
}

impl FaultPlan {
    pub(crate) fn push(&mut self, error: StepError, times: usize) {
        self.scripted.extend(std::iter::repeat_n(error, times));
    }

    pub(crate) fn set_persistent(&mut self, error: Option<StepError>) {
        self.persistent = error;
    }

    pub(crate) fn set_latency(&mut self, latency: Duration) {
        self.latency = latency;
    }

    pub(crate) fn latency(&self) -> Duration {
        self.latency
    }

    pub(crate) fn clear(&mut self) {
        self.scripted.clear();
        self.persistent = None;
    }

    /// Returns the failure for the current call, if one is planned.
    pub(crate) fn next(&mut self) -> Option<StepError> {
        self.scripted.pop_front().or_else(|| self.persistent.clone())
    }
}

/// Sleeps for the simulated service latency, if any.
pub(crate) async fn simulate_latency(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}
