use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use common::{OrderId, OrderNumber};
use domain::{
    CourierBinding, DomainError, Money, Order, OrderItem, OrderStatus, Product, ProductId,
    ShippingAddress, TrackingEntry, TransitionPlan, plan_cancellation, plan_transition,
};

use crate::{
    LedgerError, Result,
    store::{OrderFilter, OrderStore, TransitionOutcome},
};

const ORDER_COLUMNS: &str = "id, order_number, customer_id, status, payment_status, \
     payment_method, subtotal_cents, shipping_cost_cents, discount_cents, total_cents, \
     courier_name, courier_tracking_id, shipping_name, shipping_phone, shipping_email, \
     shipping_address, shipping_area, shipping_city, notes, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "product_id, product_name, quantity, unit_price_cents, line_total_cents";

/// PostgreSQL-backed order store implementation.
///
/// Every mutation runs in a transaction: the order row is locked with
/// `FOR UPDATE` before a transition plan is computed, so concurrent
/// writers serialize on the order and stock arithmetic stays exact.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            stock: row.try_get("stock")?,
            active: row.try_get("active")?,
        })
    }

    fn row_to_item(row: PgRow) -> Result<OrderItem> {
        Ok(OrderItem {
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            product_name: row.try_get("product_name")?,
            quantity: row.try_get::<i32, _>("quantity")? as u32,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            line_total: Money::from_cents(row.try_get("line_total_cents")?),
        })
    }

    fn row_to_order(row: PgRow, items: Vec<OrderItem>) -> Result<Order> {
        let courier_name: Option<String> = row.try_get("courier_name")?;
        let courier_tracking_id: Option<String> = row.try_get("courier_tracking_id")?;
        let courier = match (courier_name, courier_tracking_id) {
            (Some(courier), Some(tracking_id)) => Some(CourierBinding {
                courier,
                tracking_id,
            }),
            _ => None,
        };

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_number: OrderNumber::new(row.try_get::<String, _>("order_number")?),
            customer_id: row.try_get::<Uuid, _>("customer_id")?.into(),
            status: row.try_get::<String, _>("status")?.parse()?,
            payment_status: row.try_get::<String, _>("payment_status")?.parse()?,
            payment_method: row.try_get::<String, _>("payment_method")?.parse()?,
            subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
            shipping_cost: Money::from_cents(row.try_get("shipping_cost_cents")?),
            discount: Money::from_cents(row.try_get("discount_cents")?),
            total: Money::from_cents(row.try_get("total_cents")?),
            items,
            courier,
            shipping: ShippingAddress {
                name: row.try_get("shipping_name")?,
                phone: row.try_get("shipping_phone")?,
                email: row.try_get("shipping_email")?,
                address: row.try_get("shipping_address")?,
                area: row.try_get("shipping_area")?,
                city: row.try_get("shipping_city")?,
            },
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_entry(row: PgRow) -> Result<TrackingEntry> {
        Ok(TrackingEntry {
            label: row.try_get("label")?,
            detail: row.try_get("detail")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }

    async fn items_for(&self, order_id: Uuid) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id ASC"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_item).collect()
    }

    async fn fetch_order(&self, row: Option<PgRow>) -> Result<Option<Order>> {
        match row {
            Some(row) => {
                let items = self.items_for(row.try_get("id")?).await?;
                Ok(Some(Self::row_to_order(row, items)?))
            }
            None => Ok(None),
        }
    }

    /// Loads an order inside a transaction, locking its row against
    /// concurrent writers.
    async fn load_order_for_update(
        tx: &mut Transaction<'_, Postgres>,
        order_id: OrderId,
    ) -> Result<Order> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(order_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| LedgerError::OrderNotFound(order_id.to_string()))?;

        let item_rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id ASC"
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&mut **tx)
        .await?;
        let items = item_rows
            .into_iter()
            .map(Self::row_to_item)
            .collect::<Result<Vec<_>>>()?;

        Self::row_to_order(row, items)
    }

    async fn insert_tracking_entry(
        tx: &mut Transaction<'_, Postgres>,
        order_id: OrderId,
        entry: &TrackingEntry,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_tracking (order_id, label, detail, recorded_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(&entry.label)
        .bind(&entry.detail)
        .bind(entry.recorded_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn apply_plan(
        tx: &mut Transaction<'_, Postgres>,
        order: &mut Order,
        plan: TransitionPlan,
    ) -> Result<()> {
        order.status = plan.status;
        if let Some(payment) = plan.payment_status {
            order.payment_status = payment;
        }
        order.updated_at = Utc::now();

        sqlx::query(
            "UPDATE orders SET status = $1, payment_status = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.updated_at)
        .bind(order.id.as_uuid())
        .execute(&mut **tx)
        .await?;

        if plan.restock {
            for item in &order.items {
                sqlx::query(
                    "UPDATE products SET stock = stock + $1, updated_at = NOW() WHERE id = $2",
                )
                .bind(item.quantity as i64)
                .bind(item.product_id.as_uuid())
                .execute(&mut **tx)
                .await?;
            }
        }

        Self::insert_tracking_entry(tx, order.id, &plan.entry).await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn upsert_product(&self, product: Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, unit_price_cents, stock, active, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                unit_price_cents = EXCLUDED.unit_price_cents,
                stock = EXCLUDED.stock,
                active = EXCLUDED.active,
                updated_at = NOW()
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.unit_price.cents())
        .bind(product.stock)
        .bind(product.active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            "SELECT id, name, unit_price_cents, stock, active FROM products WHERE id = $1",
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_product(row)?)),
            None => Ok(None),
        }
    }

    async fn create_order(&self, order: Order, entries: Vec<TrackingEntry>) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            r#"
            INSERT INTO orders ({ORDER_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21)
            "#
        ))
        .bind(order.id.as_uuid())
        .bind(order.order_number.as_str())
        .bind(order.customer_id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.payment_method.as_str())
        .bind(order.subtotal.cents())
        .bind(order.shipping_cost.cents())
        .bind(order.discount.cents())
        .bind(order.total.cents())
        .bind(order.courier.as_ref().map(|c| c.courier.as_str()))
        .bind(order.courier.as_ref().map(|c| c.tracking_id.as_str()))
        .bind(&order.shipping.name)
        .bind(&order.shipping.phone)
        .bind(order.shipping.email.as_deref())
        .bind(&order.shipping.address)
        .bind(order.shipping.area.as_deref())
        .bind(&order.shipping.city)
        .bind(order.notes.as_deref())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_order_number")
            {
                return LedgerError::DuplicateOrderNumber(order.order_number.clone());
            }
            LedgerError::Database(e)
        })?;

        // Lock each product row, check stock, then decrement. An error here
        // rolls the whole order back, items and tracking included.
        for item in &order.items {
            let row = sqlx::query("SELECT stock, active FROM products WHERE id = $1 FOR UPDATE")
                .bind(item.product_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(LedgerError::ProductNotFound(item.product_id))?;

            if !row.try_get::<bool, _>("active")? {
                return Err(LedgerError::ProductNotFound(item.product_id));
            }
            let available: i64 = row.try_get("stock")?;
            if available < item.quantity as i64 {
                return Err(LedgerError::Domain(DomainError::InsufficientStock {
                    product_id: item.product_id,
                    requested: item.quantity,
                    available,
                }));
            }

            sqlx::query("UPDATE products SET stock = stock - $1, updated_at = NOW() WHERE id = $2")
                .bind(item.quantity as i64)
                .bind(item.product_id.as_uuid())
                .execute(&mut *tx)
                .await?;
        }

        for item in &order.items {
            sqlx::query(&format!(
                "INSERT INTO order_items (order_id, {ITEM_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
            ))
            .bind(order.id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(&item.product_name)
            .bind(item.quantity as i32)
            .bind(item.unit_price.cents())
            .bind(item.line_total.cents())
            .execute(&mut *tx)
            .await?;
        }

        for entry in &entries {
            Self::insert_tracking_entry(&mut tx, order.id, entry).await?;
        }

        tx.commit().await?;
        Ok(order)
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        self.fetch_order(row).await
    }

    async fn get_order_by_number(&self, order_number: &OrderNumber) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1"
        ))
        .bind(order_number.as_str())
        .fetch_optional(&self.pool)
        .await?;

        self.fetch_order(row).await
    }

    async fn get_order_by_tracking_id(&self, tracking_id: &str) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE courier_tracking_id = $1"
        ))
        .bind(tracking_id)
        .fetch_optional(&self.pool)
        .await?;

        self.fetch_order(row).await
    }

    async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>> {
        let mut sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if filter.statuses.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ANY(${param_count})"));
        }
        if filter.payment_status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND payment_status = ${param_count}"));
        }
        if filter.exclude_payment_method.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND payment_method <> ${param_count}"));
        }
        if let Some(bound) = filter.courier_bound {
            if bound {
                sql.push_str(" AND courier_tracking_id IS NOT NULL");
            } else {
                sql.push_str(" AND courier_tracking_id IS NULL");
            }
        }
        if filter.created_before.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at < ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at DESC");

        if filter.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if filter.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        // Build and execute query with parameters
        let mut sqlx_query = sqlx::query(&sql);

        if let Some(ref statuses) = filter.statuses {
            let values: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
            sqlx_query = sqlx_query.bind(values);
        }
        if let Some(payment) = filter.payment_status {
            sqlx_query = sqlx_query.bind(payment.as_str());
        }
        if let Some(method) = filter.exclude_payment_method {
            sqlx_query = sqlx_query.bind(method.as_str());
        }
        if let Some(cutoff) = filter.created_before {
            sqlx_query = sqlx_query.bind(cutoff);
        }
        if let Some(limit) = filter.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = filter.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        // One items query for the whole page, grouped by order
        let mut order_ids = Vec::with_capacity(rows.len());
        for row in &rows {
            order_ids.push(row.try_get::<Uuid, _>("id")?);
        }

        let item_rows = sqlx::query(&format!(
            "SELECT order_id, {ITEM_COLUMNS} FROM order_items \
             WHERE order_id = ANY($1) ORDER BY id ASC"
        ))
        .bind(&order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items_by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            let order_id: Uuid = row.try_get("order_id")?;
            items_by_order
                .entry(order_id)
                .or_default()
                .push(Self::row_to_item(row)?);
        }

        rows.into_iter()
            .map(|row| {
                let id: Uuid = row.try_get("id")?;
                let items = items_by_order.remove(&id).unwrap_or_default();
                Self::row_to_order(row, items)
            })
            .collect()
    }

    async fn transition_order(
        &self,
        order_id: OrderId,
        target: OrderStatus,
        note: &str,
    ) -> Result<TransitionOutcome> {
        let mut tx = self.pool.begin().await?;
        let mut order = Self::load_order_for_update(&mut tx, order_id).await?;

        let Some(plan) = plan_transition(&order, target, note)? else {
            return Ok(TransitionOutcome::Unchanged(order));
        };

        Self::apply_plan(&mut tx, &mut order, plan).await?;
        tx.commit().await?;
        Ok(TransitionOutcome::Applied(order))
    }

    async fn cancel_order(&self, order_id: OrderId, detail: &str) -> Result<Order> {
        let mut tx = self.pool.begin().await?;
        let mut order = Self::load_order_for_update(&mut tx, order_id).await?;

        let plan = plan_cancellation(&order, detail)?;
        Self::apply_plan(&mut tx, &mut order, plan).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn bind_courier(
        &self,
        order_id: OrderId,
        binding: CourierBinding,
        entry: TrackingEntry,
    ) -> Result<Order> {
        let mut tx = self.pool.begin().await?;
        let mut order = Self::load_order_for_update(&mut tx, order_id).await?;

        order.ensure_courier_assignable()?;
        order.courier = Some(binding);
        order.status = OrderStatus::Shipped;
        order.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE orders
            SET courier_name = $1, courier_tracking_id = $2, status = $3, updated_at = $4
            WHERE id = $5
            "#,
        )
        .bind(order.courier.as_ref().map(|c| c.courier.as_str()))
        .bind(order.courier.as_ref().map(|c| c.tracking_id.as_str()))
        .bind(order.status.as_str())
        .bind(order.updated_at)
        .bind(order.id.as_uuid())
        .execute(&mut *tx)
        .await?;

        Self::insert_tracking_entry(&mut tx, order.id, &entry).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn tracking_history(&self, order_id: OrderId) -> Result<Vec<TrackingEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT label, detail, recorded_at
            FROM order_tracking
            WHERE order_id = $1
            ORDER BY recorded_at ASC, id ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_entry).collect()
    }
}
