//! Order store abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use common::{OrderId, OrderNumber};
use domain::{
    CourierBinding, Order, OrderStatus, PaymentMethod, PaymentStatus, Product, ProductId,
    TrackingEntry,
};

use crate::Result;

/// Builder for selecting orders from the ledger.
///
/// Used by the HTTP listing endpoint and by the reconciliation jobs to
/// pick their working sets.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    /// Keep orders in any of these statuses.
    pub statuses: Option<Vec<OrderStatus>>,

    /// Keep orders in this payment state.
    pub payment_status: Option<PaymentStatus>,

    /// Drop orders paid with this method.
    pub exclude_payment_method: Option<PaymentMethod>,

    /// `true` keeps only courier-bound orders, `false` only unbound ones.
    pub courier_bound: Option<bool>,

    /// Keep orders placed strictly before this instant.
    pub created_before: Option<DateTime<Utc>>,

    /// Maximum number of orders to return.
    pub limit: Option<usize>,

    /// Number of orders to skip.
    pub offset: Option<usize>,
}

impl OrderFilter {
    /// Creates a new empty filter matching every order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps only orders in the given status.
    pub fn status(mut self, status: OrderStatus) -> Self {
        self.statuses = Some(vec![status]);
        self
    }

    /// Keeps orders in any of the given statuses.
    pub fn statuses(mut self, statuses: Vec<OrderStatus>) -> Self {
        self.statuses = Some(statuses);
        self
    }

    /// Keeps only orders in the given payment state.
    pub fn payment_status(mut self, payment_status: PaymentStatus) -> Self {
        self.payment_status = Some(payment_status);
        self
    }

    /// Drops orders paid with the given method.
    pub fn exclude_payment_method(mut self, method: PaymentMethod) -> Self {
        self.exclude_payment_method = Some(method);
        self
    }

    /// Keeps only courier-bound (`true`) or unbound (`false`) orders.
    pub fn courier_bound(mut self, bound: bool) -> Self {
        self.courier_bound = Some(bound);
        self
    }

    /// Keeps orders placed strictly before the given instant.
    pub fn created_before(mut self, cutoff: DateTime<Utc>) -> Self {
        self.created_before = Some(cutoff);
        self
    }

    /// Limits the number of orders returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips this many orders before returning results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Result of asking a store to move an order to a target status.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// The plan was executed and the order changed.
    Applied(Order),

    /// The order was already in the requested status; nothing was written.
    Unchanged(Order),
}

impl TransitionOutcome {
    /// Consumes the outcome and returns the order either way.
    pub fn into_order(self) -> Order {
        match self {
            TransitionOutcome::Applied(order) | TransitionOutcome::Unchanged(order) => order,
        }
    }

    /// Returns true if the store actually wrote a change.
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied(_))
    }
}

/// Persistence boundary for products, orders, and tracking history.
///
/// Implementations execute transition plans atomically: the status write,
/// the payment write, the restock, and the tracking entry all land
/// together or not at all.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts or replaces a product.
    async fn upsert_product(&self, product: Product) -> Result<()>;

    /// Fetches a product by ID.
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>>;

    /// Persists a freshly assembled order with its initial tracking entries.
    ///
    /// Stock for each line is re-checked and decremented in the same
    /// transaction, so a concurrent order for the last unit loses cleanly.
    /// Fails with `DuplicateOrderNumber` when the number is already taken.
    async fn create_order(&self, order: Order, entries: Vec<TrackingEntry>) -> Result<Order>;

    /// Fetches an order by ID.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Fetches an order by its public order number.
    async fn get_order_by_number(&self, order_number: &OrderNumber) -> Result<Option<Order>>;

    /// Fetches the order bound to the given courier tracking ID.
    async fn get_order_by_tracking_id(&self, tracking_id: &str) -> Result<Option<Order>>;

    /// Lists orders matching the filter, newest first.
    async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>>;

    /// Plans and executes a move to `target`, recording `note` in history.
    ///
    /// Returns `Unchanged` when the order is already in `target`; rejected
    /// moves surface the domain error.
    async fn transition_order(
        &self,
        order_id: OrderId,
        target: OrderStatus,
        note: &str,
    ) -> Result<TransitionOutcome>;

    /// Executes an explicit cancellation, restoring stock.
    async fn cancel_order(&self, order_id: OrderId, detail: &str) -> Result<Order>;

    /// Binds a courier to the order and marks it shipped.
    ///
    /// Fails if the order already carries a binding or is not in a
    /// status that allows handover.
    async fn bind_courier(
        &self,
        order_id: OrderId,
        binding: CourierBinding,
        entry: TrackingEntry,
    ) -> Result<Order>;

    /// Returns the order's tracking history, oldest first.
    async fn tracking_history(&self, order_id: OrderId) -> Result<Vec<TrackingEntry>>;
}
