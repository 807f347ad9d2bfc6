//! Recursive bounded fan-out batch processing.
//!
//! A range of numbers is split into at most `max_children` child ranges,
//! recursively, until each range fits in one batch. Every number in a leaf
//! batch is processed concurrently under the shared retry policy, and the
//! results are aggregated on the way back up.

pub mod config;
pub mod error;
pub mod scheduler;
pub mod work;

pub use config::BatchConfig;
pub use error::{BatchError, Result};
pub use scheduler::{BatchSummary, FanOutScheduler, NumberRange};
pub use work::{BatchWork, SquareNumber};
