//! Order lifecycle model for the fulfillment system.
//!
//! This crate provides the pure domain layer:
//! - Order aggregate, line items, and money arithmetic
//! - Status and payment state machines with their transition rules
//! - The transition planner that turns a requested status change into
//!   a concrete set of writes (status, payment, restock, tracking entry)
//!
//! Everything here is synchronous and side-effect free. Persistence and
//! courier integration live in the `ledger` and `courier` crates.

pub mod error;
pub mod order;

pub use error::DomainError;
pub use order::{
    CourierBinding, CustomerId, DraftItem, Money, Order, OrderDraft, OrderItem, OrderStatus,
    PaymentMethod, PaymentStatus, Product, ProductId, ShippingAddress, TrackingEntry,
    TransitionPlan, plan_cancellation, plan_transition, shipping_fee,
};
