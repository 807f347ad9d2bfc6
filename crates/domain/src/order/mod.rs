//! Order model and related value objects.

mod model;
mod payment;
mod value_objects;

pub use model::Order;
pub use payment::PaymentDetails;
pub use value_objects::{Money, OrderId, OrderItem, ProductId};

use thiserror::Error;

/// Errors raised while building an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// Invalid quantity.
    #[error("Invalid quantity for {product_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity { product_id: String, quantity: u32 },

    /// Invalid price.
    #[error("Invalid price for {product_id}: {price} (must be greater than 0)")]
    InvalidPrice { product_id: String, price: i64 },

    /// Line item subtotals do not fit in a `Money`.
    #[error("Order total exceeds the representable amount")]
    TotalOverflow,

    /// Card expiry month outside 1-12.
    #[error("Invalid card expiry {month:02}/{year}")]
    InvalidExpiry { month: u32, year: i32 },
}
