//! Order status and payment state machines.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The status of an order in its fulfillment lifecycle.
///
/// Status transitions:
/// ```text
/// Pending ──► Confirmed ──► Processing ──► Shipped ──► Delivered
///    │            │             │             │
///    └────────────┴─────────────┴─────────────┴──► Cancelled
/// ```
///
/// Moves along the chain may skip stages (a courier can report
/// `delivered` before we ever saw `in_transit`) but never go backwards.
/// Cancellation from `Processing` or `Shipped` is reserved for courier
/// failure reports; customers can only cancel while `can_cancel` holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Order placed, awaiting payment confirmation.
    #[default]
    Pending,

    /// Payment confirmed (or COD accepted), ready for fulfillment.
    Confirmed,

    /// Order is being picked and packed.
    Processing,

    /// Handed over to a courier, on its way to the customer.
    Shipped,

    /// Delivered to the customer (terminal state).
    Delivered,

    /// Order was cancelled (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns the status name as stored in the database and API payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Returns the human-readable label used in tracking history entries.
    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// Position along the forward chain, `None` for `Cancelled`.
    fn chain_position(&self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Processing => Some(2),
            OrderStatus::Shipped => Some(3),
            OrderStatus::Delivered => Some(4),
            OrderStatus::Cancelled => None,
        }
    }

    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Returns true if the lifecycle table allows moving to `target`.
    ///
    /// Forward moves along the chain are allowed (including skips);
    /// any non-terminal status may move to `Cancelled`.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if target == OrderStatus::Cancelled {
            return true;
        }
        match (self.chain_position(), target.chain_position()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }

    /// Returns true if a customer or admin may still cancel explicitly.
    ///
    /// Once the order is being picked or is with a courier, only a courier
    /// failure report can cancel it.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// Payment state of an order, tracked independently of fulfillment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Payment has not been received yet.
    #[default]
    Pending,

    /// Payment has been received (or collected on delivery).
    Completed,

    /// The payment attempt failed.
    Failed,

    /// A completed payment was refunded.
    Refunded,
}

impl PaymentStatus {
    /// Returns the payment status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// How the customer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Cash collected by the courier on delivery.
    #[serde(rename = "cod")]
    CashOnDelivery,

    /// bKash mobile wallet, paid up front.
    #[serde(rename = "bkash")]
    MobileWallet,

    /// Card payment, paid up front.
    #[serde(rename = "card")]
    Card,
}

impl PaymentMethod {
    /// Returns the method name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "cod",
            PaymentMethod::MobileWallet => "bkash",
            PaymentMethod::Card => "card",
        }
    }

    /// Returns true if payment must arrive before fulfillment starts.
    pub fn requires_prepayment(&self) -> bool {
        !matches!(self, PaymentMethod::CashOnDelivery)
    }

    /// Status a freshly placed order starts in for this method.
    ///
    /// COD orders skip the payment gate and start out confirmed; prepaid
    /// orders wait in `Pending` until the payment callback arrives.
    pub fn initial_order_status(&self) -> OrderStatus {
        match self {
            PaymentMethod::CashOnDelivery => OrderStatus::Confirmed,
            PaymentMethod::MobileWallet | PaymentMethod::Card => OrderStatus::Pending,
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cod" => Ok(PaymentMethod::CashOnDelivery),
            "bkash" => Ok(PaymentMethod::MobileWallet),
            "card" => Ok(PaymentMethod::Card),
            other => Err(DomainError::UnknownPaymentMethod(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn test_forward_transitions_allowed() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_forward_skips_allowed() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_backward_transitions_rejected() {
        assert!(!OrderStatus::Confirmed.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Processing));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Confirmed));
    }

    #[test]
    fn test_terminal_statuses_allow_nothing() {
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_cancel_reachable_from_any_non_terminal() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn test_explicit_cancel_only_before_processing() {
        assert!(OrderStatus::Pending.can_cancel());
        assert!(OrderStatus::Confirmed.can_cancel());
        assert!(!OrderStatus::Processing.can_cancel());
        assert!(!OrderStatus::Shipped.can_cancel());
        assert!(!OrderStatus::Delivered.can_cancel());
        assert!(!OrderStatus::Cancelled.can_cancel());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Confirmed.is_terminal());
        assert!(!OrderStatus::Processing.is_terminal());
        assert!(!OrderStatus::Shipped.is_terminal());
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&OrderStatus::Shipped).unwrap();
        assert_eq!(json, "\"shipped\"");
    }

    #[test]
    fn test_unknown_status_rejected() {
        let err = "in_transit".parse::<OrderStatus>().unwrap_err();
        assert!(matches!(err, DomainError::UnknownStatus(s) if s == "in_transit"));
    }

    #[test]
    fn test_labels_are_title_cased() {
        assert_eq!(OrderStatus::Pending.label(), "Pending");
        assert_eq!(OrderStatus::Shipped.label(), "Shipped");
        assert_eq!(OrderStatus::Cancelled.label(), "Cancelled");
    }

    #[test]
    fn test_payment_status_round_trips_through_str() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Completed,
            PaymentStatus::Failed,
            PaymentStatus::Refunded,
        ] {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_cod_starts_confirmed() {
        assert_eq!(
            PaymentMethod::CashOnDelivery.initial_order_status(),
            OrderStatus::Confirmed
        );
        assert!(!PaymentMethod::CashOnDelivery.requires_prepayment());
    }

    #[test]
    fn test_prepaid_methods_start_pending() {
        assert_eq!(
            PaymentMethod::MobileWallet.initial_order_status(),
            OrderStatus::Pending
        );
        assert_eq!(
            PaymentMethod::Card.initial_order_status(),
            OrderStatus::Pending
        );
        assert!(PaymentMethod::MobileWallet.requires_prepayment());
        assert!(PaymentMethod::Card.requires_prepayment());
    }

    #[test]
    fn test_payment_method_wire_names() {
        assert_eq!(PaymentMethod::CashOnDelivery.as_str(), "cod");
        assert_eq!(PaymentMethod::MobileWallet.as_str(), "bkash");
        assert_eq!(PaymentMethod::Card.as_str(), "card");
        assert_eq!("cod".parse::<PaymentMethod>().unwrap(), PaymentMethod::CashOnDelivery);
    }

    #[test]
    fn test_unknown_payment_method_rejected() {
        let err = "paypal".parse::<PaymentMethod>().unwrap_err();
        assert!(matches!(err, DomainError::UnknownPaymentMethod(s) if s == "paypal"));
    }

    #[test]
    fn test_payment_method_serializes_wire_names() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::MobileWallet).unwrap(),
            "\"bkash\""
        );
        let method: PaymentMethod = serde_json::from_str("\"cod\"").unwrap();
        assert_eq!(method, PaymentMethod::CashOnDelivery);
    }
}
