//! Domain layer for order sagas.
//!
//! This crate provides the immutable order handed to a saga, the value
//! objects it is built from, and the approval threshold policy.

pub mod approval;
pub mod order;

pub use approval::ApprovalThreshold;
pub use order::{Money, Order, OrderError, OrderId, OrderItem, PaymentDetails, ProductId};
