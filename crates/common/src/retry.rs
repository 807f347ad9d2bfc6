//! Bounded exponential backoff around a step operation.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StepError, StepFailure};

/// Retry policy applied to a single step operation.
///
/// The delay before attempt `n + 1` is
/// `min(initial_interval * backoff_coefficient^(n - 1), maximum_interval)`.
/// Non-retryable failures end the loop immediately.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first one.
    pub maximum_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_interval: Duration,
    /// Growth factor applied per additional attempt.
    pub backoff_coefficient: f64,
    /// Upper bound for any single delay.
    pub maximum_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            maximum_attempts: 3,
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_secs(100),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn once() -> Self {
        Self {
            maximum_attempts: 1,
            ..Self::default()
        }
    }

    /// Returns a copy of this policy with a different attempt budget.
    pub fn with_max_attempts(mut self, maximum_attempts: u32) -> Self {
        self.maximum_attempts = maximum_attempts;
        self
    }

    /// Returns a copy of this policy with a different initial interval.
    pub fn with_initial_interval(mut self, initial_interval: Duration) -> Self {
        self.initial_interval = initial_interval;
        self
    }

    /// Attempts actually allowed; a configured budget of 0 still runs once.
    pub fn attempts(&self) -> u32 {
        self.maximum_attempts.max(1)
    }

    /// Returns the delay to wait after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);

        if !secs.is_finite() || secs >= self.maximum_interval.as_secs_f64() {
            self.maximum_interval
        } else {
            Duration::from_secs_f64(secs.max(0.0))
        }
    }

    /// Runs `operation` until it succeeds, fails permanently, or the attempt
    /// budget is spent. The last error is returned together with the number
    /// of attempts made.
    pub async fn execute<T, F, Fut>(&self, step: &str, mut operation: F) -> Result<T, StepFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StepError>>,
    {
        let max_attempts = self.attempts();
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(step, attempt, "step succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        step,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "retryable step failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    tracing::warn!(step, attempt, %error, "step failed");
                    return Err(StepFailure {
                        error,
                        attempts: attempt,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.maximum_attempts, 3);
        assert_eq!(policy.initial_interval, Duration::from_secs(1));
        assert_eq!(policy.backoff_coefficient, 2.0);
        assert_eq!(policy.maximum_interval, Duration::from_secs(100));
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(7), Duration::from_secs(64));
        assert_eq!(policy.delay_for(8), Duration::from_secs(100));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(100));
    }

    #[test]
    fn test_zero_attempts_runs_once() {
        assert_eq!(RetryPolicy::default().with_max_attempts(0).attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = policy
            .execute("flaky", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(StepError::Unavailable("try later".into()))
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s after the first failure, 2s after the second.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_millis(3010));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_initial_interval() {
        let policy = RetryPolicy::default().with_initial_interval(Duration::from_millis(10));
        assert_eq!(policy.delay_for(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for(2), Duration::from_millis(20));

        let started = tokio::time::Instant::now();
        let result: Result<(), _> = policy
            .execute("down", || async { Err(StepError::Unavailable("down".into())) })
            .await;

        assert_eq!(result.unwrap_err().attempts, 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(30));
        assert!(elapsed < Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_attempts_return_last_error() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .execute("down", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StepError::Unavailable("still down".into()))
            })
            .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.error, StepError::Unavailable("still down".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_aborts_immediately() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result: Result<(), _> = policy
            .execute("validate", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StepError::Validation("credit card expired".into()))
            })
            .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.attempts, 1);
        assert!(!failure.exhausted());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_policy() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::once()
            .execute("undo", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StepError::Unavailable("down".into()))
            })
            .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
