//! Order ledger service providing the API the handlers and jobs talk to.

use common::{OrderId, OrderNumber};
use domain::{CourierBinding, Order, OrderDraft, OrderItem, OrderStatus, TrackingEntry};

use crate::{
    LedgerError, Result,
    store::{OrderFilter, OrderStore, TransitionOutcome},
};

/// How many order numbers placement tries before giving up on a collision.
const ORDER_NUMBER_ATTEMPTS: usize = 3;

/// Service for managing orders.
///
/// Owns intake pricing, order-number generation, and the notes written into
/// tracking history. Every lifecycle change goes through the store's
/// transition methods, never around them.
#[derive(Clone)]
pub struct OrderLedger<S: OrderStore> {
    store: S,
}

impl<S: OrderStore> OrderLedger<S> {
    /// Creates a new ledger over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Places a new order from a customer draft.
    ///
    /// Validates the draft, prices every line from the product table, and
    /// hands the assembled order to the store, which re-checks stock under
    /// lock. Order numbers are regenerated a bounded number of times if one
    /// collides.
    #[tracing::instrument(skip(self))]
    pub async fn place_order(&self, draft: OrderDraft) -> Result<Order> {
        draft.validate()?;

        let mut items = Vec::with_capacity(draft.items.len());
        for line in &draft.items {
            let product = self
                .store
                .get_product(line.product_id)
                .await?
                .filter(|product| product.active)
                .ok_or(LedgerError::ProductNotFound(line.product_id))?;
            items.push(OrderItem::new(
                product.id,
                product.name,
                line.quantity,
                product.unit_price,
            ));
        }

        let mut attempts = 0;
        loop {
            let order = Order::new(
                OrderNumber::generate(),
                draft.customer_id,
                draft.payment_method,
                items.clone(),
                draft.shipping.clone(),
                draft.discount,
                draft.notes.clone(),
            )?;
            let entries = order.placement_entries();

            match self.store.create_order(order, entries).await {
                Ok(order) => {
                    metrics::counter!("orders_created_total").increment(1);
                    tracing::info!(order_number = %order.order_number, "order placed");
                    return Ok(order);
                }
                Err(LedgerError::DuplicateOrderNumber(number))
                    if attempts + 1 < ORDER_NUMBER_ATTEMPTS =>
                {
                    attempts += 1;
                    tracing::warn!(order_number = %number, "order number collision, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Loads an order by id.
    #[tracing::instrument(skip(self))]
    pub async fn order(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| LedgerError::OrderNotFound(order_id.to_string()))
    }

    /// Loads an order by its human-readable order number.
    #[tracing::instrument(skip(self))]
    pub async fn order_by_number(&self, order_number: &OrderNumber) -> Result<Order> {
        self.store
            .get_order_by_number(order_number)
            .await?
            .ok_or_else(|| LedgerError::OrderNotFound(order_number.to_string()))
    }

    /// Looks up an order by courier tracking id.
    ///
    /// Returns `None` for unknown ids; webhook ingress treats those as
    /// ignorable rather than as errors.
    #[tracing::instrument(skip(self))]
    pub async fn order_by_tracking_id(&self, tracking_id: &str) -> Result<Option<Order>> {
        self.store.get_order_by_tracking_id(tracking_id).await
    }

    /// Lists orders matching a filter.
    #[tracing::instrument(skip(self))]
    pub async fn orders(&self, filter: OrderFilter) -> Result<Vec<Order>> {
        self.store.list_orders(filter).await
    }

    /// Applies a status transition to an order by id.
    #[tracing::instrument(skip(self))]
    pub async fn transition(
        &self,
        order_id: OrderId,
        target: OrderStatus,
        note: &str,
    ) -> Result<TransitionOutcome> {
        let outcome = self.store.transition_order(order_id, target, note).await?;
        if outcome.is_applied() {
            metrics::counter!("order_transitions_total").increment(1);
        }
        Ok(outcome)
    }

    /// Records a successful payment for an order.
    ///
    /// Runs Pending -> Confirmed through the planner, which completes the
    /// payment for prepaid methods. Calling it again on an already confirmed
    /// order changes nothing.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_payment(&self, order_number: &OrderNumber) -> Result<Order> {
        let order = self.order_by_number(order_number).await?;
        let outcome = self
            .transition(order.id, OrderStatus::Confirmed, "Payment received")
            .await?;
        Ok(outcome.into_order())
    }

    /// Cancels an order explicitly, restoring stock.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, order_number: &OrderNumber, detail: &str) -> Result<Order> {
        let order = self.order_by_number(order_number).await?;
        let cancelled = self.store.cancel_order(order.id, detail).await?;
        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(order_number = %cancelled.order_number, "order cancelled");
        Ok(cancelled)
    }

    /// Operator override: moves an order to `target` with a note.
    ///
    /// Still runs through the planner, so an illegal move surfaces
    /// `InvalidTransition` instead of writing anything.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_number: &OrderNumber,
        target: OrderStatus,
        note: &str,
    ) -> Result<Order> {
        let order = self.order_by_number(order_number).await?;
        let outcome = self.transition(order.id, target, note).await?;
        Ok(outcome.into_order())
    }

    /// Binds a courier to an order and marks it shipped.
    #[tracing::instrument(skip(self))]
    pub async fn assign_courier(
        &self,
        order_id: OrderId,
        binding: CourierBinding,
        detail: &str,
    ) -> Result<Order> {
        let courier = binding.courier.clone();
        let entry = TrackingEntry::new(OrderStatus::Shipped.label(), detail);
        let order = self.store.bind_courier(order_id, binding, entry).await?;
        metrics::counter!("courier_assignments_total").increment(1);
        tracing::info!(order_number = %order.order_number, courier, "courier assigned");
        Ok(order)
    }

    /// Returns the tracking history for an order, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn tracking(&self, order_id: OrderId) -> Result<Vec<TrackingEntry>> {
        self.store.tracking_history(order_id).await
    }
}

#[cfg(test)]
mod tests {
    use domain::{
        CustomerId, DomainError, DraftItem, Money, PaymentMethod, PaymentStatus, Product,
        ShippingAddress,
    };

    use crate::memory::InMemoryOrderStore;

    use super::*;

    fn test_address() -> ShippingAddress {
        ShippingAddress {
            name: "Asha Rahman".to_string(),
            phone: "01712345678".to_string(),
            email: Some("asha@example.com".to_string()),
            address: "House 7, Road 2".to_string(),
            area: Some("Dhanmondi".to_string()),
            city: "Dhaka".to_string(),
        }
    }

    fn draft_for(product: &Product, quantity: u32, method: PaymentMethod) -> OrderDraft {
        OrderDraft {
            customer_id: CustomerId::new(),
            items: vec![DraftItem {
                product_id: product.id,
                quantity,
            }],
            payment_method: method,
            shipping: test_address(),
            discount: Money::zero(),
            notes: None,
        }
    }

    async fn ledger_with_product(
        price_cents: i64,
        stock: i64,
    ) -> (OrderLedger<InMemoryOrderStore>, Product) {
        let ledger = OrderLedger::new(InMemoryOrderStore::new());
        let product = Product::new("Test Product", Money::from_cents(price_cents), stock);
        ledger.store().upsert_product(product.clone()).await.unwrap();
        (ledger, product)
    }

    #[tokio::test]
    async fn test_place_order_prices_from_catalog() {
        let (ledger, product) = ledger_with_product(12_500, 10).await;
        let order = ledger
            .place_order(draft_for(&product, 2, PaymentMethod::CashOnDelivery))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.subtotal.cents(), 25_000);
        assert_eq!(order.items[0].product_name, "Test Product");
        assert!(order.order_number.as_str().starts_with("ORD-"));

        let history = ledger.tracking(order.id).await.unwrap();
        assert_eq!(history[0].label, "Order Placed");
    }

    #[tokio::test]
    async fn test_place_order_rejects_unknown_product() {
        let ledger = OrderLedger::new(InMemoryOrderStore::new());
        let ghost = Product::new("Ghost", Money::from_cents(1_000), 5);
        let err = ledger
            .place_order(draft_for(&ghost, 1, PaymentMethod::Card))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ProductNotFound(_)));
    }

    #[tokio::test]
    async fn test_place_order_rejects_empty_draft() {
        let ledger = OrderLedger::new(InMemoryOrderStore::new());
        let draft = OrderDraft {
            customer_id: CustomerId::new(),
            items: vec![],
            payment_method: PaymentMethod::Card,
            shipping: test_address(),
            discount: Money::zero(),
            notes: None,
        };
        let err = ledger.place_order(draft).await.unwrap_err();
        assert!(matches!(err, LedgerError::Domain(DomainError::EmptyOrder)));
    }

    #[tokio::test]
    async fn test_confirm_payment_is_idempotent() {
        let (ledger, product) = ledger_with_product(10_000, 10).await;
        let order = ledger
            .place_order(draft_for(&product, 1, PaymentMethod::MobileWallet))
            .await
            .unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Pending);

        let confirmed = ledger.confirm_payment(&order.order_number).await.unwrap();
        assert_eq!(confirmed.status, OrderStatus::Confirmed);
        assert_eq!(confirmed.payment_status, PaymentStatus::Completed);

        let entries = ledger.tracking(order.id).await.unwrap().len();
        let again = ledger.confirm_payment(&order.order_number).await.unwrap();
        assert_eq!(again.status, OrderStatus::Confirmed);
        assert_eq!(ledger.tracking(order.id).await.unwrap().len(), entries);
    }

    #[tokio::test]
    async fn test_cancel_by_number_restores_stock() {
        let (ledger, product) = ledger_with_product(10_000, 10).await;
        let order = ledger
            .place_order(draft_for(&product, 4, PaymentMethod::CashOnDelivery))
            .await
            .unwrap();

        let cancelled = ledger
            .cancel(&order.order_number, "Order has been cancelled")
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        let product = ledger.store().get_product(product.id).await.unwrap().unwrap();
        assert_eq!(product.stock, 10);
    }

    #[tokio::test]
    async fn test_update_status_rejects_backward_move() {
        let (ledger, product) = ledger_with_product(10_000, 10).await;
        let order = ledger
            .place_order(draft_for(&product, 1, PaymentMethod::CashOnDelivery))
            .await
            .unwrap();

        ledger
            .update_status(&order.order_number, OrderStatus::Shipped, "handed over")
            .await
            .unwrap();

        let err = ledger
            .update_status(&order.order_number, OrderStatus::Processing, "oops")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Domain(DomainError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_assign_courier_marks_shipped() {
        let (ledger, product) = ledger_with_product(10_000, 10).await;
        let order = ledger
            .place_order(draft_for(&product, 1, PaymentMethod::CashOnDelivery))
            .await
            .unwrap();

        let shipped = ledger
            .assign_courier(
                order.id,
                CourierBinding {
                    courier: "pathao".to_string(),
                    tracking_id: "DX-99".to_string(),
                },
                "Handed over to pathao. Tracking ID: DX-99",
            )
            .await
            .unwrap();

        assert_eq!(shipped.status, OrderStatus::Shipped);
        let history = ledger.tracking(order.id).await.unwrap();
        let last = history.last().unwrap();
        assert_eq!(last.label, "Shipped");
        assert_eq!(last.detail, "Handed over to pathao. Tracking ID: DX-99");
    }

    #[tokio::test]
    async fn test_order_by_number_not_found() {
        let ledger = OrderLedger::new(InMemoryOrderStore::new());
        let err = ledger
            .order_by_number(&OrderNumber::new("ORD-20250101-ZZZZZZ"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::OrderNotFound(_)));
    }
}
