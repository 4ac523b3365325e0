use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use common::{OrderId, OrderNumber};
use domain::{
    CourierBinding, DomainError, Order, OrderStatus, Product, ProductId, TrackingEntry,
    TransitionPlan, plan_cancellation, plan_transition,
};

use crate::{
    LedgerError, Result,
    store::{OrderFilter, OrderStore, TransitionOutcome},
};

#[derive(Debug, Default)]
struct LedgerState {
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
    tracking: HashMap<OrderId, Vec<TrackingEntry>>,
}

/// In-memory order store for tests and databaseless deployments.
///
/// A single write lock per operation stands in for the transaction the
/// PostgreSQL implementation uses, so plans still apply atomically.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Clears all products, orders, and tracking history.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.products.clear();
        state.orders.clear();
        state.tracking.clear();
    }

    fn apply_plan(state: &mut LedgerState, mut order: Order, plan: TransitionPlan) -> Order {
        order.status = plan.status;
        if let Some(payment) = plan.payment_status {
            order.payment_status = payment;
        }
        if plan.restock {
            for item in &order.items {
                if let Some(product) = state.products.get_mut(&item.product_id) {
                    product.stock += item.quantity as i64;
                }
            }
        }
        order.updated_at = Utc::now();
        state.tracking.entry(order.id).or_default().push(plan.entry);
        state.orders.insert(order.id, order.clone());
        order
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn upsert_product(&self, product: Product) -> Result<()> {
        let mut state = self.state.write().await;
        state.products.insert(product.id, product);
        Ok(())
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let state = self.state.read().await;
        Ok(state.products.get(&product_id).cloned())
    }

    async fn create_order(&self, order: Order, entries: Vec<TrackingEntry>) -> Result<Order> {
        let mut state = self.state.write().await;

        if state
            .orders
            .values()
            .any(|existing| existing.order_number == order.order_number)
        {
            return Err(LedgerError::DuplicateOrderNumber(order.order_number.clone()));
        }

        // Validate every line before touching stock so a failure
        // leaves no partial decrement behind.
        for item in &order.items {
            let product = state
                .products
                .get(&item.product_id)
                .filter(|product| product.active)
                .ok_or(LedgerError::ProductNotFound(item.product_id))?;
            if product.stock < item.quantity as i64 {
                return Err(LedgerError::Domain(DomainError::InsufficientStock {
                    product_id: item.product_id,
                    requested: item.quantity,
                    available: product.stock,
                }));
            }
        }
        for item in &order.items {
            if let Some(product) = state.products.get_mut(&item.product_id) {
                product.stock -= item.quantity as i64;
            }
        }

        state.tracking.insert(order.id, entries);
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.get(&order_id).cloned())
    }

    async fn get_order_by_number(&self, order_number: &OrderNumber) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .find(|order| &order.order_number == order_number)
            .cloned())
    }

    async fn get_order_by_tracking_id(&self, tracking_id: &str) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .find(|order| {
                order
                    .courier
                    .as_ref()
                    .is_some_and(|binding| binding.tracking_id == tracking_id)
            })
            .cloned())
    }

    async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|order| {
                if let Some(ref statuses) = filter.statuses
                    && !statuses.contains(&order.status)
                {
                    return false;
                }
                if let Some(payment) = filter.payment_status
                    && order.payment_status != payment
                {
                    return false;
                }
                if let Some(method) = filter.exclude_payment_method
                    && order.payment_method == method
                {
                    return false;
                }
                if let Some(bound) = filter.courier_bound
                    && order.courier.is_some() != bound
                {
                    return false;
                }
                if let Some(cutoff) = filter.created_before
                    && order.created_at >= cutoff
                {
                    return false;
                }
                true
            })
            .cloned()
            .collect();

        // Newest first, matching the SQL implementation
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = filter.offset.unwrap_or(0);
        let orders: Vec<_> = orders.into_iter().skip(offset).collect();

        let orders = if let Some(limit) = filter.limit {
            orders.into_iter().take(limit).collect()
        } else {
            orders
        };

        Ok(orders)
    }

    async fn transition_order(
        &self,
        order_id: OrderId,
        target: OrderStatus,
        note: &str,
    ) -> Result<TransitionOutcome> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| LedgerError::OrderNotFound(order_id.to_string()))?;

        match plan_transition(&order, target, note)? {
            None => Ok(TransitionOutcome::Unchanged(order)),
            Some(plan) => {
                let updated = Self::apply_plan(&mut state, order, plan);
                Ok(TransitionOutcome::Applied(updated))
            }
        }
    }

    async fn cancel_order(&self, order_id: OrderId, detail: &str) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| LedgerError::OrderNotFound(order_id.to_string()))?;

        let plan = plan_cancellation(&order, detail)?;
        Ok(Self::apply_plan(&mut state, order, plan))
    }

    async fn bind_courier(
        &self,
        order_id: OrderId,
        binding: CourierBinding,
        entry: TrackingEntry,
    ) -> Result<Order> {
        let mut state = self.state.write().await;
        let mut order = state
            .orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| LedgerError::OrderNotFound(order_id.to_string()))?;

        order.ensure_courier_assignable()?;
        order.courier = Some(binding);
        order.status = OrderStatus::Shipped;
        order.updated_at = Utc::now();

        state.tracking.entry(order.id).or_default().push(entry);
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn tracking_history(&self, order_id: OrderId) -> Result<Vec<TrackingEntry>> {
        let state = self.state.read().await;
        Ok(state.tracking.get(&order_id).cloned().unwrap_or_default())
    }
}
