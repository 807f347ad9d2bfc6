//! Integration tests for order construction and the approval policy.

use chrono::{TimeZone, Utc};
use domain::{
    ApprovalThreshold, Money, Order, OrderError, OrderId, OrderItem, PaymentDetails, ProductId,
};

fn item(sku: &str, quantity: u32, cents: i64) -> OrderItem {
    OrderItem::new(sku, quantity, Money::from_cents(cents))
}

fn order_with(items: Vec<OrderItem>) -> Result<Order, OrderError> {
    Order::new(
        OrderId::generate(),
        "customer@example.com",
        items,
        PaymentDetails::test_card(),
    )
}

mod order_construction {
    use super::*;

    #[test]
    fn total_is_sum_of_subtotals() {
        let order = order_with(vec![
            item("SKU-001", 2, 1000),
            item("SKU-002", 1, 2500),
            item("SKU-003", 4, 125),
        ])
        .unwrap();

        assert_eq!(order.total_amount(), Money::from_cents(5000));
        assert_eq!(order.total_quantity(), 7);
        assert_eq!(order.items().len(), 3);
        assert_eq!(order.items()[1].product_id, ProductId::new("SKU-002"));
    }

    #[test]
    fn rejects_empty_order() {
        assert_eq!(order_with(vec![]), Err(OrderError::NoItems));
    }

    #[test]
    fn rejects_zero_quantity_and_free_items() {
        assert!(matches!(
            order_with(vec![item("SKU-001", 1, 100), item("SKU-002", 0, 100)]),
            Err(OrderError::InvalidQuantity { quantity: 0, .. })
        ));
        assert!(matches!(
            order_with(vec![item("SKU-001", 1, 0)]),
            Err(OrderError::InvalidPrice { price: 0, .. })
        ));
        assert!(matches!(
            order_with(vec![item("SKU-001", 1, -50)]),
            Err(OrderError::InvalidPrice { .. })
        ));
    }

    #[test]
    fn rejects_subtotal_overflow() {
        let result = order_with(vec![item("SKU-001", 3, i64::MAX / 2)]);
        assert_eq!(result, Err(OrderError::TotalOverflow));
    }

    #[test]
    fn rejects_total_overflow_across_items() {
        let result = order_with(vec![
            item("SKU-001", 1, i64::MAX - 10),
            item("SKU-002", 1, 11),
        ]);
        assert_eq!(result, Err(OrderError::TotalOverflow));
    }

    #[test]
    fn total_quantity_does_not_wrap() {
        let order = order_with(vec![
            item("SKU-001", u32::MAX, 1),
            item("SKU-002", u32::MAX, 1),
        ])
        .unwrap();
        assert_eq!(order.total_quantity(), 2 * u64::from(u32::MAX));
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = order_with(vec![item("SKU-001", 1, 100)]).unwrap();
        let b = order_with(vec![item("SKU-001", 1, 100)]).unwrap();
        assert_ne!(a.id(), b.id());
        assert!(a.id().as_str().starts_with("ORD-"));
    }

    #[test]
    fn serializes_customer_and_total() {
        let order = order_with(vec![item("SKU-001", 1, 100)]).unwrap();
        let json = serde_json::to_value(&order).unwrap();

        assert_eq!(json["customer_email"], "customer@example.com");
        assert_eq!(json["total_amount"]["cents"], 100);
        assert!(json["payment"].is_object());
    }
}

mod payment_instrument {
    use super::*;

    #[test]
    fn expiry_month_is_validated() {
        assert_eq!(
            PaymentDetails::new("4111111111111111", 13, 2030, "Ada").unwrap_err(),
            OrderError::InvalidExpiry {
                month: 13,
                year: 2030
            }
        );
        assert!(PaymentDetails::new("4111111111111111", 0, 2030, "Ada").is_err());
    }

    #[test]
    fn expired_card_is_detected() {
        let card = PaymentDetails::new("4111111111111111", 2, 2024, "Ada").unwrap();
        let march = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let february = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap();

        assert!(card.is_expired_at(march));
        assert!(!card.is_expired_at(february));
        assert!(!PaymentDetails::test_card().is_expired());
    }

    #[test]
    fn debug_output_masks_card_number() {
        let card = PaymentDetails::new("4111111111111111", 2, 2030, "Ada").unwrap();
        let debug = format!("{card:?}");
        assert!(!debug.contains("4111111111111111"));
        assert!(debug.contains("**** 1111"));
    }
}

mod approval_policy {
    use super::*;

    #[test]
    fn default_threshold_is_one_thousand_dollars() {
        assert_eq!(
            ApprovalThreshold::default().amount(),
            Money::from_dollars(1000)
        );
    }

    #[test]
    fn approval_required_only_strictly_above_threshold() {
        let threshold = ApprovalThreshold::default();

        let at = order_with(vec![item("SKU-001", 1, 100_000)]).unwrap();
        let above = order_with(vec![item("SKU-001", 1, 100_001)]).unwrap();
        let split_above = order_with(vec![item("SKU-001", 2, 50_000), item("SKU-002", 1, 1)]).unwrap();

        assert!(!threshold.requires_approval(&at));
        assert!(threshold.requires_approval(&above));
        assert!(threshold.requires_approval(&split_above));
    }

    #[test]
    fn custom_threshold() {
        let threshold = ApprovalThreshold::new(Money::from_dollars(50));
        let order = order_with(vec![item("SKU-001", 3, 2000)]).unwrap();
        assert!(threshold.requires_approval(&order));
    }
}
