//! Order aggregate and intake draft.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{OrderId, OrderNumber};

use crate::error::DomainError;

use super::{
    CourierBinding, CustomerId, Money, OrderItem, OrderStatus, PaymentMethod, PaymentStatus,
    ProductId, ShippingAddress, TrackingEntry,
};

/// Subtotal at or above which shipping is free, in minor units.
pub const FREE_SHIPPING_THRESHOLD_CENTS: i64 = 500_000;

/// Flat fee for deliveries within Dhaka, in minor units.
pub const DHAKA_SHIPPING_FEE_CENTS: i64 = 6_000;

/// Flat fee for deliveries outside Dhaka, in minor units.
pub const OUTSIDE_DHAKA_SHIPPING_FEE_CENTS: i64 = 12_000;

/// Computes the shipping fee for an order subtotal and destination city.
///
/// Free at or above the threshold; otherwise a flat fee that depends on
/// whether the city is within Dhaka. The city match is a case-insensitive
/// containment check so "North Dhaka" and "dhaka" both get the inner rate.
pub fn shipping_fee(subtotal: Money, city: &str) -> Money {
    if subtotal.cents() >= FREE_SHIPPING_THRESHOLD_CENTS {
        return Money::zero();
    }
    if city.to_lowercase().contains("dhaka") {
        Money::from_cents(DHAKA_SHIPPING_FEE_CENTS)
    } else {
        Money::from_cents(OUTSIDE_DHAKA_SHIPPING_FEE_CENTS)
    }
}

/// A catalog product carrying the stock counter orders draw from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product identifier.
    pub id: ProductId,

    /// Product name shown on order lines.
    pub name: String,

    /// Current price per unit.
    pub unit_price: Money,

    /// Units available; never allowed to go negative.
    pub stock: i64,

    /// Inactive products cannot be ordered.
    pub active: bool,
}

impl Product {
    /// Creates a new active product with a random ID.
    pub fn new(name: impl Into<String>, unit_price: Money, stock: i64) -> Self {
        Self {
            id: ProductId::new(),
            name: name.into(),
            unit_price,
            stock,
            active: true,
        }
    }
}

/// One requested line in an order draft, before pricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftItem {
    /// The product being ordered.
    pub product_id: ProductId,

    /// Requested quantity.
    pub quantity: u32,
}

/// Customer intake for a new order, before products are priced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    /// Customer placing the order.
    pub customer_id: CustomerId,

    /// Requested lines.
    pub items: Vec<DraftItem>,

    /// Chosen payment method.
    pub payment_method: PaymentMethod,

    /// Destination address.
    pub shipping: ShippingAddress,

    /// Discount applied to the order, zero when absent.
    pub discount: Money,

    /// Free-text notes from the customer.
    pub notes: Option<String>,
}

impl OrderDraft {
    /// Checks the draft for structural problems before any pricing happens.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.items.is_empty() {
            return Err(DomainError::EmptyOrder);
        }
        for item in &self.items {
            if item.quantity == 0 {
                return Err(DomainError::InvalidQuantity {
                    product_id: item.product_id,
                });
            }
        }
        if self.discount.is_negative() {
            return Err(DomainError::NegativeAmount { field: "discount" });
        }
        Ok(())
    }
}

/// An order as the ledger stores it.
///
/// Plain record with public fields; all lifecycle changes go through the
/// transition planner and the order store, never by mutating a copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier.
    pub id: OrderId,

    /// Human-readable order number shown to customers and couriers.
    pub order_number: OrderNumber,

    /// Customer who placed the order.
    pub customer_id: CustomerId,

    /// Current fulfillment status.
    pub status: OrderStatus,

    /// Current payment state.
    pub payment_status: PaymentStatus,

    /// How the customer pays.
    pub payment_method: PaymentMethod,

    /// Sum of line totals.
    pub subtotal: Money,

    /// Shipping fee charged.
    pub shipping_cost: Money,

    /// Discount applied.
    pub discount: Money,

    /// Amount the customer owes: subtotal + shipping - discount.
    pub total: Money,

    /// Priced line items.
    pub items: Vec<OrderItem>,

    /// Courier binding, set exactly once when the order ships.
    pub courier: Option<CourierBinding>,

    /// Destination address.
    pub shipping: ShippingAddress,

    /// Free-text notes from the customer.
    pub notes: Option<String>,

    /// When the order was placed.
    pub created_at: DateTime<Utc>,

    /// When the order was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds a new order from priced items, computing the money breakdown.
    ///
    /// The caller prices the items from the catalog; this computes subtotal,
    /// shipping fee, and total, and picks the initial status from the payment
    /// method. Payment always starts pending, even for COD.
    pub fn new(
        order_number: OrderNumber,
        customer_id: CustomerId,
        payment_method: PaymentMethod,
        items: Vec<OrderItem>,
        shipping: ShippingAddress,
        discount: Money,
        notes: Option<String>,
    ) -> Result<Self, DomainError> {
        if items.is_empty() {
            return Err(DomainError::EmptyOrder);
        }
        if discount.is_negative() {
            return Err(DomainError::NegativeAmount { field: "discount" });
        }

        let mut subtotal = Money::zero();
        for item in &items {
            subtotal += item.line_total;
        }
        let shipping_cost = shipping_fee(subtotal, &shipping.city);
        let total = subtotal + shipping_cost - discount;
        if total.is_negative() {
            return Err(DomainError::NegativeAmount { field: "total" });
        }

        let now = Utc::now();
        Ok(Self {
            id: OrderId::new(),
            order_number,
            customer_id,
            status: payment_method.initial_order_status(),
            payment_status: PaymentStatus::Pending,
            payment_method,
            subtotal,
            shipping_cost,
            discount,
            total,
            items,
            courier: None,
            shipping,
            notes,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns true if the courier collects payment on delivery.
    pub fn is_cod(&self) -> bool {
        self.payment_method == PaymentMethod::CashOnDelivery
    }

    /// Checks that the order can be handed to a courier right now.
    ///
    /// An order takes exactly one courier binding, and only while it is
    /// confirmed or being processed.
    pub fn ensure_courier_assignable(&self) -> Result<(), DomainError> {
        if self.courier.is_some() {
            return Err(DomainError::CourierAlreadyAssigned {
                order_number: self.order_number.clone(),
            });
        }
        match self.status {
            OrderStatus::Confirmed | OrderStatus::Processing => Ok(()),
            status => Err(DomainError::NotReadyForCourier { status }),
        }
    }

    /// Tracking entries recorded at placement time.
    ///
    /// Every order starts with a placement entry; COD orders get a second
    /// entry for the automatic confirmation.
    pub fn placement_entries(&self) -> Vec<TrackingEntry> {
        let mut entries = vec![TrackingEntry::new(
            "Order Placed",
            "Your order has been placed successfully",
        )];
        if self.is_cod() {
            entries.push(TrackingEntry::new(
                OrderStatus::Confirmed.label(),
                "Order auto-confirmed (Cash on Delivery)",
            ));
        }
        entries
    }
}
