//! Integration tests for the order lifecycle model.
//!
//! These tests walk full order lifecycles by repeatedly planning a
//! transition and applying it to a local copy, the same way the stores
//! execute plans, and verify the invariants that hold across a whole
//! lifecycle rather than a single step.

use common::OrderNumber;
use domain::{
    CustomerId, DomainError, Money, Order, OrderDraft, OrderItem, OrderStatus, PaymentMethod,
    PaymentStatus, ProductId, ShippingAddress, TransitionPlan, plan_cancellation, plan_transition,
};

fn address(city: &str) -> ShippingAddress {
    ShippingAddress {
        name: "Asha Rahman".to_string(),
        phone: "01712345678".to_string(),
        email: Some("asha@example.com".to_string()),
        address: "House 7, Road 2, Dhanmondi".to_string(),
        area: Some("Dhanmondi".to_string()),
        city: city.to_string(),
    }
}

fn new_order(method: PaymentMethod) -> Order {
    Order::new(
        OrderNumber::generate(),
        CustomerId::new(),
        method,
        vec![
            OrderItem::new(ProductId::new(), "Ceramic Mug", 2, Money::from_cents(45_000)),
            OrderItem::new(ProductId::new(), "Tea Sampler", 1, Money::from_cents(80_000)),
        ],
        address("Dhaka"),
        Money::zero(),
        None,
    )
    .unwrap()
}

/// Applies a plan the way a store would: status, payment, entry log.
fn apply(order: &mut Order, plan: TransitionPlan, log: &mut Vec<String>) {
    order.status = plan.status;
    if let Some(payment) = plan.payment_status {
        order.payment_status = payment;
    }
    log.push(plan.entry.label.clone());
}

mod lifecycle {
    use super::*;

    #[test]
    fn prepaid_order_walks_the_full_chain() {
        let mut order = new_order(PaymentMethod::MobileWallet);
        let mut log = Vec::new();
        assert_eq!(order.status, OrderStatus::Pending);

        for (target, note) in [
            (OrderStatus::Confirmed, "Payment received"),
            (OrderStatus::Processing, "Packing started"),
            (OrderStatus::Shipped, "Handed over to pathao"),
            (OrderStatus::Delivered, "Update from pathao: delivered"),
        ] {
            let plan = plan_transition(&order, target, note).unwrap().unwrap();
            apply(&mut order, plan, &mut log);
        }

        assert_eq!(order.status, OrderStatus::Delivered);
        // Payment settled at confirmation, not at delivery, for prepaid orders
        assert_eq!(order.payment_status, PaymentStatus::Completed);
        assert_eq!(log, vec!["Confirmed", "Processing", "Shipped", "Delivered"]);
    }

    #[test]
    fn cod_order_settles_payment_on_delivery() {
        let mut order = new_order(PaymentMethod::CashOnDelivery);
        let mut log = Vec::new();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.payment_status, PaymentStatus::Pending);

        let plan = plan_transition(&order, OrderStatus::Shipped, "Handed over to steadfast")
            .unwrap()
            .unwrap();
        apply(&mut order, plan, &mut log);
        assert_eq!(order.payment_status, PaymentStatus::Pending);

        let plan = plan_transition(&order, OrderStatus::Delivered, "Update from steadfast: delivered")
            .unwrap()
            .unwrap();
        apply(&mut order, plan, &mut log);

        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(order.payment_status, PaymentStatus::Completed);
    }

    #[test]
    fn status_never_moves_backwards() {
        let mut order = new_order(PaymentMethod::Card);
        let mut log = Vec::new();

        let plan = plan_transition(&order, OrderStatus::Shipped, "skipped ahead")
            .unwrap()
            .unwrap();
        apply(&mut order, plan, &mut log);

        for target in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
        ] {
            let err = plan_transition(&order, target, "late webhook").unwrap_err();
            assert!(matches!(err, DomainError::InvalidTransition { .. }));
        }
        assert_eq!(order.status, OrderStatus::Shipped);
    }

    #[test]
    fn replayed_transition_is_inert() {
        let mut order = new_order(PaymentMethod::CashOnDelivery);
        let mut log = Vec::new();

        let plan = plan_transition(&order, OrderStatus::Shipped, "first webhook")
            .unwrap()
            .unwrap();
        apply(&mut order, plan, &mut log);

        // Same webhook again: no plan, so no log entry and no field writes
        let replay = plan_transition(&order, OrderStatus::Shipped, "first webhook").unwrap();
        assert!(replay.is_none());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn terminal_orders_are_frozen() {
        let mut order = new_order(PaymentMethod::CashOnDelivery);
        let mut log = Vec::new();
        let plan = plan_transition(&order, OrderStatus::Delivered, "delivered")
            .unwrap()
            .unwrap();
        apply(&mut order, plan, &mut log);

        for target in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Cancelled,
        ] {
            assert!(plan_transition(&order, target, "anything").is_err());
        }
        assert!(plan_cancellation(&order, "anything").is_err());
    }
}

mod cancellation {
    use super::*;

    #[test]
    fn customer_cancel_restocks_and_is_final() {
        let mut order = new_order(PaymentMethod::MobileWallet);
        let mut log = Vec::new();

        let plan = plan_cancellation(&order, "Order has been cancelled").unwrap();
        assert!(plan.restock);
        apply(&mut order, plan, &mut log);

        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(plan_transition(&order, OrderStatus::Confirmed, "payment arrived late").is_err());
    }

    #[test]
    fn courier_cancel_after_shipping_skips_restock() {
        let mut order = new_order(PaymentMethod::CashOnDelivery);
        let mut log = Vec::new();
        let plan = plan_transition(&order, OrderStatus::Shipped, "handed over")
            .unwrap()
            .unwrap();
        apply(&mut order, plan, &mut log);

        // Customer path is closed once shipped
        assert!(plan_cancellation(&order, "changed my mind").is_err());

        // Courier failure report still cancels, without restocking
        let plan = plan_transition(&order, OrderStatus::Cancelled, "Update from pathao: returned")
            .unwrap()
            .unwrap();
        assert!(!plan.restock);
    }
}

mod intake {
    use super::*;

    #[test]
    fn draft_validation_catches_structural_problems() {
        let draft = OrderDraft {
            customer_id: CustomerId::new(),
            items: vec![],
            payment_method: PaymentMethod::Card,
            shipping: address("Dhaka"),
            discount: Money::zero(),
            notes: None,
        };
        assert!(matches!(draft.validate(), Err(DomainError::EmptyOrder)));
    }

    #[test]
    fn totals_add_up_across_fee_tiers() {
        // Below free-shipping threshold, outside Dhaka: flat outer fee
        let order = Order::new(
            OrderNumber::generate(),
            CustomerId::new(),
            PaymentMethod::Card,
            vec![OrderItem::new(
                ProductId::new(),
                "Notebook",
                1,
                Money::from_cents(30_000),
            )],
            address("Rajshahi"),
            Money::zero(),
            None,
        )
        .unwrap();
        assert_eq!(order.total.cents(), 30_000 + 12_000);

        // Above threshold: free shipping regardless of city
        let order = Order::new(
            OrderNumber::generate(),
            CustomerId::new(),
            PaymentMethod::Card,
            vec![OrderItem::new(
                ProductId::new(),
                "Standing Desk",
                1,
                Money::from_cents(900_000),
            )],
            address("Rajshahi"),
            Money::zero(),
            None,
        )
        .unwrap();
        assert!(order.shipping_cost.is_zero());
        assert_eq!(order.total.cents(), 900_000);
    }

    #[test]
    fn order_numbers_are_unique_across_orders() {
        let a = new_order(PaymentMethod::Card);
        let b = new_order(PaymentMethod::Card);
        assert_ne!(a.order_number, b.order_number);
        assert_ne!(a.id, b.id);
    }
}
