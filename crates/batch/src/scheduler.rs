//! Recursive fan-out scheduler.

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, try_join_all};
use serde::{Deserialize, Serialize};

use crate::config::BatchConfig;
use crate::error::{BatchError, Result};
use crate::work::BatchWork;

/// A half-open range of numbers `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberRange {
    pub start: u64,
    pub end: u64,
}

impl NumberRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Splits into `parts` contiguous ranges whose lengths differ by at most
    /// one. Earlier ranges take the remainder.
    pub fn split(&self, parts: u64) -> Vec<NumberRange> {
        let parts = parts.clamp(1, self.len().max(1));
        let base = self.len() / parts;
        let remainder = self.len() % parts;

        let mut start = self.start;
        (0..parts)
            .map(|i| {
                let len = base + u64::from(i < remainder);
                let range = NumberRange::new(start, start + len);
                start += len;
                range
            })
            .collect()
    }
}

/// Aggregated result of a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Per-number results in input order.
    pub results: Vec<u64>,
    pub sum: u128,
    pub total_processed: usize,
    /// Number of leaf batches that ran.
    pub leaf_batches: usize,
    /// Levels in the fan-out tree; a single leaf batch has depth 1.
    pub depth: u32,
}

impl BatchSummary {
    fn leaf(results: Vec<u64>) -> Self {
        Self {
            sum: results.iter().map(|&r| u128::from(r)).sum(),
            total_processed: results.len(),
            results,
            leaf_batches: 1,
            depth: 1,
        }
    }

    fn merge(children: Vec<BatchSummary>) -> Self {
        let mut merged = BatchSummary::default();
        for child in children {
            merged.results.extend(child.results);
            merged.sum += child.sum;
            merged.total_processed += child.total_processed;
            merged.leaf_batches += child.leaf_batches;
            merged.depth = merged.depth.max(child.depth);
        }
        merged.depth += 1;
        merged
    }
}

/// Splits a range into bounded child ranges and runs the work on each leaf.
pub struct FanOutScheduler<W> {
    config: BatchConfig,
    work: Arc<W>,
}

impl<W: BatchWork + 'static> FanOutScheduler<W> {
    /// Creates a scheduler after validating the configuration.
    pub fn new(config: BatchConfig, work: W) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            work: Arc::new(work),
        })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Processes the numbers `1..=total_numbers`.
    pub async fn run(&self, total_numbers: u64) -> Result<BatchSummary> {
        self.run_range(NumberRange::new(1, total_numbers.saturating_add(1)))
            .await
    }

    /// Processes every number in `range`.
    #[tracing::instrument(skip(self), fields(len = range.len()))]
    pub async fn run_range(&self, range: NumberRange) -> Result<BatchSummary> {
        if range.is_empty() {
            return Ok(BatchSummary::default());
        }

        tracing::info!(
            max_children = self.config.max_children,
            batch_size = self.config.batch_size,
            "batch processing started"
        );
        let summary = self.process(range).await?;
        tracing::info!(
            total_processed = summary.total_processed,
            leaf_batches = summary.leaf_batches,
            depth = summary.depth,
            "batch processing complete"
        );
        Ok(summary)
    }

    fn process(&self, range: NumberRange) -> BoxFuture<'_, Result<BatchSummary>> {
        async move {
            let batch_size = self.config.batch_size as u64;
            if range.len() <= batch_size {
                return self.process_leaf(range).await;
            }

            let parts = range
                .len()
                .div_ceil(batch_size)
                .min(self.config.max_children as u64);
            let children = range.split(parts).into_iter().map(|child| self.process(child));
            let children = try_join_all(children).await?;
            Ok(BatchSummary::merge(children))
        }
        .boxed()
    }

    async fn process_leaf(&self, range: NumberRange) -> Result<BatchSummary> {
        tracing::debug!(start = range.start, end = range.end, "leaf batch started");

        let items = (range.start..range.end).map(|number| self.process_item(number));
        let results = try_join_all(items).await?;

        metrics::counter!("batch_items_processed_total").increment(results.len() as u64);
        Ok(BatchSummary::leaf(results))
    }

    async fn process_item(&self, number: u64) -> Result<u64> {
        let work = &self.work;
        self.config
            .retry
            .execute("process_item", || work.process(number))
            .await
            .map_err(|source| BatchError::Item { number, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work::SquareNumber;

    #[test]
    fn test_split_is_near_equal_and_contiguous() {
        let parts = NumberRange::new(1, 24).split(5);
        let lens: Vec<u64> = parts.iter().map(NumberRange::len).collect();
        assert_eq!(lens, vec![5, 5, 5, 4, 4]);
        assert_eq!(parts.first().unwrap().start, 1);
        assert_eq!(parts.last().unwrap().end, 24);
        for pair in parts.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_split_never_yields_empty_ranges() {
        let parts = NumberRange::new(0, 3).split(10);
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.len() == 1));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = BatchConfig {
            max_children: 1,
            ..Default::default()
        };
        assert!(FanOutScheduler::new(config, SquareNumber).is_err());
    }

    #[tokio::test]
    async fn test_single_leaf() {
        let scheduler = FanOutScheduler::new(BatchConfig::default(), SquareNumber).unwrap();
        let summary = scheduler.run(5).await.unwrap();

        assert_eq!(summary.results, vec![1, 4, 9, 16, 25]);
        assert_eq!(summary.sum, 55);
        assert_eq!(summary.leaf_batches, 1);
        assert_eq!(summary.depth, 1);
    }

    #[tokio::test]
    async fn test_empty_run() {
        let scheduler = FanOutScheduler::new(BatchConfig::default(), SquareNumber).unwrap();
        let summary = scheduler.run(0).await.unwrap();
        assert_eq!(summary, BatchSummary::default());
    }
}
