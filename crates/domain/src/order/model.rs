//! The order handed to a saga.

use serde::Serialize;

use super::{Money, OrderError, OrderId, OrderItem, PaymentDetails};

/// A customer order.
///
/// The total is computed once from the line items at construction and the
/// order exposes no mutators, so it cannot drift after a saga starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    id: OrderId,
    customer_email: String,
    items: Vec<OrderItem>,
    total_amount: Money,
    payment: PaymentDetails,
}

impl Order {
    /// Creates a validated order.
    pub fn new(
        id: impl Into<OrderId>,
        customer_email: impl Into<String>,
        items: Vec<OrderItem>,
        payment: PaymentDetails,
    ) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }

        for item in &items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id: item.product_id.to_string(),
                    quantity: item.quantity,
                });
            }
            if !item.unit_price.is_positive() {
                return Err(OrderError::InvalidPrice {
                    product_id: item.product_id.to_string(),
                    price: item.unit_price.cents(),
                });
            }
        }

        let total_amount = items
            .iter()
            .try_fold(Money::zero(), |total, item| {
                item.subtotal().and_then(|subtotal| total.checked_add(subtotal))
            })
            .ok_or(OrderError::TotalOverflow)?;

        Ok(Self {
            id: id.into(),
            customer_email: customer_email.into(),
            items,
            total_amount,
            payment,
        })
    }

    /// Returns the order ID.
    pub fn id(&self) -> &OrderId {
        &self.id
    }

    /// Returns the email used for confirmations.
    pub fn customer_email(&self) -> &str {
        &self.customer_email
    }

    /// Returns the line items in the order they were placed.
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Returns the total quantity across all items.
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Returns the sum of all item subtotals.
    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    /// Returns the payment instrument.
    pub fn payment(&self) -> &PaymentDetails {
        &self.payment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<OrderItem> {
        vec![
            OrderItem::new("SKU-001", 2, Money::from_cents(1000)),
            OrderItem::new("SKU-002", 1, Money::from_cents(2500)),
        ]
    }

    #[test]
    fn test_total_is_sum_of_subtotals() {
        let order = Order::new("ORD-1", "a@b.c", items(), PaymentDetails::test_card()).unwrap();
        assert_eq!(order.total_amount(), Money::from_cents(4500));
        assert_eq!(order.total_quantity(), 3);
        assert_eq!(order.items()[0].product_id.as_str(), "SKU-001");
    }

    #[test]
    fn test_empty_order_rejected() {
        let result = Order::new("ORD-1", "a@b.c", vec![], PaymentDetails::test_card());
        assert!(matches!(result, Err(OrderError::NoItems)));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let result = Order::new(
            "ORD-1",
            "a@b.c",
            vec![OrderItem::new("SKU-001", 0, Money::from_cents(1000))],
            PaymentDetails::test_card(),
        );
        assert!(matches!(
            result,
            Err(OrderError::InvalidQuantity { quantity: 0, .. })
        ));
    }

    #[test]
    fn test_non_positive_price_rejected() {
        let result = Order::new(
            "ORD-1",
            "a@b.c",
            vec![OrderItem::new("SKU-001", 1, Money::zero())],
            PaymentDetails::test_card(),
        );
        assert!(matches!(result, Err(OrderError::InvalidPrice { price: 0, .. })));
    }

    #[test]
    fn test_serialization_shape() {
        let order = Order::new("ORD-1", "a@b.c", items(), PaymentDetails::test_card()).unwrap();
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["id"], "ORD-1");
        assert_eq!(json["total_amount"]["cents"], 4500);
    }
}
