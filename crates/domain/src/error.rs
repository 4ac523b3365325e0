//! Domain error types.

use thiserror::Error;

use common::OrderNumber;

use crate::order::{OrderStatus, ProductId};

/// Errors that can occur while validating or transitioning orders.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The requested status change is not allowed by the lifecycle table.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The order has progressed past the point where it can be cancelled.
    #[error("Order cannot be cancelled in status {status}")]
    NotCancellable { status: OrderStatus },

    /// The order already carries a courier binding.
    #[error("Order {order_number} is already assigned to a courier")]
    CourierAlreadyAssigned { order_number: OrderNumber },

    /// The order is not in a status that allows courier handover.
    #[error("Order cannot be handed to a courier in status {status}")]
    NotReadyForCourier { status: OrderStatus },

    /// An order draft was submitted without any items.
    #[error("Order must contain at least one item")]
    EmptyOrder,

    /// An item was requested with a zero quantity.
    #[error("Invalid quantity for product {product_id}")]
    InvalidQuantity { product_id: ProductId },

    /// A money field came out negative.
    #[error("Amount for {field} must not be negative")]
    NegativeAmount { field: &'static str },

    /// Requested quantity exceeds what is in stock.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: i64,
    },

    /// The payment method string is not one we recognise.
    #[error("Unknown payment method: {0}")]
    UnknownPaymentMethod(String),

    /// The status string is not one we recognise.
    #[error("Unknown status: {0}")]
    UnknownStatus(String),
}
