//! Transition planner.
//!
//! Every status change in the system, whether it comes from an admin, a
//! payment callback, a courier webhook, or a reconciliation job, is first
//! expressed as a [`TransitionPlan`] produced here. Stores execute plans
//! atomically; nothing else writes `status` or `payment_status`.

use crate::error::DomainError;

use super::{Order, OrderStatus, PaymentStatus, TrackingEntry};

/// The concrete set of writes a status change requires.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    /// Status the order moves to.
    pub status: OrderStatus,

    /// New payment state, if the move settles payment.
    pub payment_status: Option<PaymentStatus>,

    /// Whether item quantities go back into stock.
    pub restock: bool,

    /// Tracking history entry to append.
    pub entry: TrackingEntry,
}

/// Plans a move to `target`, or `None` when the order is already there.
///
/// A same-status request is a no-op, not an error, so webhook replays and
/// overlapping poll results stay idempotent. Illegal moves (backwards,
/// or out of a terminal status) are rejected.
///
/// Payment coupling: confirming a prepaid order records the payment as
/// completed, and delivering a COD order records the courier's cash
/// collection. Stock: only orders cancelled before processing restock,
/// since later cancellations mean the goods are already with a courier.
pub fn plan_transition(
    order: &Order,
    target: OrderStatus,
    note: &str,
) -> Result<Option<TransitionPlan>, DomainError> {
    if target == order.status {
        return Ok(None);
    }
    if !order.status.can_transition_to(target) {
        return Err(DomainError::InvalidTransition {
            from: order.status,
            to: target,
        });
    }

    let payment_status = match target {
        OrderStatus::Confirmed
            if order.status == OrderStatus::Pending
                && order.payment_method.requires_prepayment() =>
        {
            Some(PaymentStatus::Completed)
        }
        OrderStatus::Delivered if order.is_cod() => Some(PaymentStatus::Completed),
        _ => None,
    };

    let restock = target == OrderStatus::Cancelled
        && matches!(order.status, OrderStatus::Pending | OrderStatus::Confirmed);

    Ok(Some(TransitionPlan {
        status: target,
        payment_status,
        restock,
        entry: TrackingEntry::new(target.label(), note),
    }))
}

/// Plans an explicit cancellation requested by a customer or admin.
///
/// Only allowed while the order has not entered processing; always
/// restocks, because the goods never left the warehouse.
pub fn plan_cancellation(order: &Order, detail: &str) -> Result<TransitionPlan, DomainError> {
    if !order.status.can_cancel() {
        return Err(DomainError::NotCancellable {
            status: order.status,
        });
    }

    Ok(TransitionPlan {
        status: OrderStatus::Cancelled,
        payment_status: None,
        restock: true,
        entry: TrackingEntry::new(OrderStatus::Cancelled.label(), detail),
    })
}

#[cfg(test)]
mod tests {
    use common::OrderNumber;

    use crate::order::{
        CustomerId, Money, OrderItem, PaymentMethod, ProductId, ShippingAddress,
    };

    use super::*;

    fn order_with(method: PaymentMethod, status: OrderStatus) -> Order {
        let mut order = Order::new(
            OrderNumber::generate(),
            CustomerId::new(),
            method,
            vec![OrderItem::new(
                ProductId::new(),
                "Widget",
                2,
                Money::from_cents(10_000),
            )],
            ShippingAddress {
                name: "Asha Rahman".to_string(),
                phone: "01712345678".to_string(),
                email: None,
                address: "House 7, Road 2".to_string(),
                area: None,
                city: "Dhaka".to_string(),
            },
            Money::zero(),
            None,
        )
        .unwrap();
        order.status = status;
        order
    }

    #[test]
    fn test_same_status_is_a_no_op() {
        let order = order_with(PaymentMethod::CashOnDelivery, OrderStatus::Shipped);
        let plan = plan_transition(&order, OrderStatus::Shipped, "duplicate webhook").unwrap();
        assert!(plan.is_none());
    }

    #[test]
    fn test_backward_move_rejected() {
        let order = order_with(PaymentMethod::Card, OrderStatus::Shipped);
        let err = plan_transition(&order, OrderStatus::Processing, "").unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidTransition {
                from: OrderStatus::Shipped,
                to: OrderStatus::Processing,
            }
        ));
    }

    #[test]
    fn test_terminal_status_rejects_all_moves() {
        let delivered = order_with(PaymentMethod::Card, OrderStatus::Delivered);
        assert!(plan_transition(&delivered, OrderStatus::Cancelled, "").is_err());

        let cancelled = order_with(PaymentMethod::Card, OrderStatus::Cancelled);
        assert!(plan_transition(&cancelled, OrderStatus::Confirmed, "").is_err());
    }

    #[test]
    fn test_confirming_prepaid_order_completes_payment() {
        let order = order_with(PaymentMethod::MobileWallet, OrderStatus::Pending);
        let plan = plan_transition(&order, OrderStatus::Confirmed, "Payment received")
            .unwrap()
            .unwrap();

        assert_eq!(plan.status, OrderStatus::Confirmed);
        assert_eq!(plan.payment_status, Some(PaymentStatus::Completed));
        assert!(!plan.restock);
        assert_eq!(plan.entry.label, "Confirmed");
        assert_eq!(plan.entry.detail, "Payment received");
    }

    #[test]
    fn test_delivering_cod_order_completes_payment() {
        let order = order_with(PaymentMethod::CashOnDelivery, OrderStatus::Shipped);
        let plan = plan_transition(&order, OrderStatus::Delivered, "Update from pathao: delivered")
            .unwrap()
            .unwrap();

        assert_eq!(plan.payment_status, Some(PaymentStatus::Completed));
    }

    #[test]
    fn test_delivering_prepaid_order_leaves_payment_alone() {
        let order = order_with(PaymentMethod::Card, OrderStatus::Shipped);
        let plan = plan_transition(&order, OrderStatus::Delivered, "delivered")
            .unwrap()
            .unwrap();

        assert_eq!(plan.payment_status, None);
    }

    #[test]
    fn test_cancel_before_processing_restocks() {
        let pending = order_with(PaymentMethod::Card, OrderStatus::Pending);
        let plan = plan_transition(&pending, OrderStatus::Cancelled, "changed my mind")
            .unwrap()
            .unwrap();
        assert!(plan.restock);

        let confirmed = order_with(PaymentMethod::CashOnDelivery, OrderStatus::Confirmed);
        let plan = plan_transition(&confirmed, OrderStatus::Cancelled, "out of stock")
            .unwrap()
            .unwrap();
        assert!(plan.restock);
    }

    #[test]
    fn test_cancel_after_handover_does_not_restock() {
        let shipped = order_with(PaymentMethod::CashOnDelivery, OrderStatus::Shipped);
        let plan = plan_transition(&shipped, OrderStatus::Cancelled, "delivery_failed")
            .unwrap()
            .unwrap();
        assert!(!plan.restock);

        let processing = order_with(PaymentMethod::Card, OrderStatus::Processing);
        let plan = plan_transition(&processing, OrderStatus::Cancelled, "returned")
            .unwrap()
            .unwrap();
        assert!(!plan.restock);
    }

    #[test]
    fn test_entry_carries_target_label_and_note() {
        let order = order_with(PaymentMethod::Card, OrderStatus::Confirmed);
        let plan = plan_transition(&order, OrderStatus::Processing, "picked up by warehouse")
            .unwrap()
            .unwrap();

        assert_eq!(plan.entry.label, "Processing");
        assert_eq!(plan.entry.detail, "picked up by warehouse");
    }

    #[test]
    fn test_plan_cancellation_allowed_early() {
        let order = order_with(PaymentMethod::MobileWallet, OrderStatus::Pending);
        let plan = plan_cancellation(&order, "Order has been cancelled").unwrap();

        assert_eq!(plan.status, OrderStatus::Cancelled);
        assert!(plan.restock);
        assert_eq!(plan.payment_status, None);
        assert_eq!(plan.entry.label, "Cancelled");
        assert_eq!(plan.entry.detail, "Order has been cancelled");
    }

    #[test]
    fn test_plan_cancellation_rejected_after_processing_starts() {
        for status in [
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            let order = order_with(PaymentMethod::Card, status);
            let err = plan_cancellation(&order, "too late").unwrap_err();
            assert!(matches!(err, DomainError::NotCancellable { status: s } if s == status));
        }
    }

    #[test]
    fn test_forward_skip_gets_planned() {
        let order = order_with(PaymentMethod::CashOnDelivery, OrderStatus::Confirmed);
        let plan = plan_transition(&order, OrderStatus::Delivered, "courier closed early")
            .unwrap()
            .unwrap();

        assert_eq!(plan.status, OrderStatus::Delivered);
        // COD delivery settles payment even when intermediate states were skipped
        assert_eq!(plan.payment_status, Some(PaymentStatus::Completed));
    }
}
