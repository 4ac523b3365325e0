//! Order aggregate and related types.

mod aggregate;
mod state;
mod transition;
mod value_objects;

pub use aggregate::{DraftItem, Order, OrderDraft, Product, shipping_fee};
pub use state::{OrderStatus, PaymentMethod, PaymentStatus};
pub use transition::{TransitionPlan, plan_cancellation, plan_transition};
pub use value_objects::{
    CourierBinding, CustomerId, Money, OrderItem, ProductId, ShippingAddress, TrackingEntry,
};
