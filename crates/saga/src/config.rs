//! Saga configuration loaded from environment variables.

use std::time::Duration;

use common::RetryPolicy;
use domain::{ApprovalThreshold, Money};

/// Orchestration settings shared by every saga a coordinator starts.
///
/// Reads from environment variables:
/// - `SAGA_APPROVAL_THRESHOLD_CENTS` (default: `100000`)
/// - `SAGA_APPROVAL_TIMEOUT_SECS` (default: `300`)
/// - `SAGA_STEP_MAX_ATTEMPTS` (default: `3`)
/// - `SAGA_STEP_INITIAL_INTERVAL_MS` (default: `1000`)
/// - `SAGA_STEP_BACKOFF_COEFFICIENT` (default: `2.0`)
/// - `SAGA_STEP_MAX_INTERVAL_MS` (default: `100000`)
/// - `SAGA_COMPENSATION_MAX_ATTEMPTS` (default: `1`)
/// - `SAGA_MAILBOX_CAPACITY` (default: `16`)
#[derive(Debug, Clone, PartialEq)]
pub struct SagaConfig {
    /// Orders above this amount wait for a human decision.
    pub approval_threshold: ApprovalThreshold,
    /// How long to wait for that decision before expiring the saga.
    pub approval_timeout: Duration,
    /// Policy for forward steps and the confirmation notification.
    pub step_retry: RetryPolicy,
    /// Policy for each undo during compensation.
    pub compensation_retry: RetryPolicy,
    /// Capacity of each saga's signal mailbox.
    pub mailbox_capacity: usize,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            approval_threshold: ApprovalThreshold::default(),
            approval_timeout: Duration::from_secs(300),
            step_retry: RetryPolicy::default(),
            compensation_retry: RetryPolicy::once(),
            mailbox_capacity: 16,
        }
    }
}

impl SagaConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    ///
    /// Missing or unparsable values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parse = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let step_retry = RetryPolicy {
            maximum_attempts: parse("SAGA_STEP_MAX_ATTEMPTS")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.step_retry.maximum_attempts),
            initial_interval: parse("SAGA_STEP_INITIAL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.step_retry.initial_interval),
            backoff_coefficient: lookup("SAGA_STEP_BACKOFF_COEFFICIENT")
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|c| c.is_finite() && *c >= 1.0)
                .unwrap_or(defaults.step_retry.backoff_coefficient),
            maximum_interval: parse("SAGA_STEP_MAX_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.step_retry.maximum_interval),
        };

        let compensation_retry = parse("SAGA_COMPENSATION_MAX_ATTEMPTS")
            .and_then(|v| u32::try_from(v).ok())
            .map(|v| step_retry.with_max_attempts(v))
            .unwrap_or(defaults.compensation_retry);

        Self {
            approval_threshold: parse("SAGA_APPROVAL_THRESHOLD_CENTS")
                .and_then(|cents| i64::try_from(cents).ok())
                .map(|cents| ApprovalThreshold::new(Money::from_cents(cents)))
                .unwrap_or(defaults.approval_threshold),
            approval_timeout: parse("SAGA_APPROVAL_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.approval_timeout),
            step_retry,
            compensation_retry,
            mailbox_capacity: parse("SAGA_MAILBOX_CAPACITY")
                .and_then(|v| usize::try_from(v).ok())
                .map(|v| v.max(1))
                .unwrap_or(defaults.mailbox_capacity),
        }
    }

    pub fn with_approval_threshold(mut self, threshold: Money) -> Self {
        self.approval_threshold = ApprovalThreshold::new(threshold);
        self
    }

    pub fn with_approval_timeout(mut self, timeout: Duration) -> Self {
        self.approval_timeout = timeout;
        self
    }

    pub fn with_step_retry(mut self, policy: RetryPolicy) -> Self {
        self.step_retry = policy;
        self
    }

    pub fn with_compensation_retry(mut self, policy: RetryPolicy) -> Self {
        self.compensation_retry = policy;
        self
    }

    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity.max(1);
        self
    }
}
