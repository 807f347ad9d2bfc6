//! Batch configuration loaded from environment variables.

use common::RetryPolicy;

use crate::error::{BatchError, Result};

/// Fan-out settings.
///
/// Reads from environment variables:
/// - `BATCH_MAX_CHILDREN` (default: `10`)
/// - `BATCH_SIZE` (default: `10`)
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// Upper bound on child ranges per split. Must be at least 2.
    pub max_children: usize,
    /// Largest range processed as a single leaf batch. Must be at least 1.
    pub batch_size: usize,
    /// Policy applied to every work item.
    pub retry: RetryPolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_children: 10,
            batch_size: 10,
            retry: RetryPolicy::default(),
        }
    }
}

impl BatchConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parse = |key: &str| lookup(key).and_then(|v| v.trim().parse::<usize>().ok());

        Self {
            max_children: parse("BATCH_MAX_CHILDREN").unwrap_or(defaults.max_children),
            batch_size: parse("BATCH_SIZE").unwrap_or(defaults.batch_size),
            retry: defaults.retry,
        }
    }

    /// Rejects settings that would never shrink a range.
    pub fn validate(&self) -> Result<()> {
        if self.max_children < 2 {
            return Err(BatchError::InvalidConfig(format!(
                "max_children must be at least 2, got {}",
                self.max_children
            )));
        }
        if self.batch_size < 1 {
            return Err(BatchError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
