//! Order intake and lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use common::OrderNumber;
use domain::{
    CustomerId, DraftItem, Money, Order, OrderDraft, OrderStatus, ProductId, ShippingAddress,
};
use ledger::{OrderFilter, OrderStore};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub customer_id: Option<String>,
    pub items: Vec<OrderLineRequest>,
    pub payment_method: String,
    pub shipping: ShippingAddressRequest,
    #[serde(default)]
    pub discount_cents: i64,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct OrderLineRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct ShippingAddressRequest {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: String,
    pub area: Option<String>,
    pub city: String,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub note: Option<String>,
}

impl PlaceOrderRequest {
    /// Turns the raw request into a validated order draft.
    ///
    /// Identifier and payment-method strings are parsed here so a bad
    /// request surfaces as a 400 with a JSON error body rather than an
    /// extractor rejection.
    fn into_draft(self) -> Result<OrderDraft, ApiError> {
        let customer_id = match &self.customer_id {
            Some(raw) => {
                let uuid = uuid::Uuid::parse_str(raw)
                    .map_err(|e| ApiError::BadRequest(format!("Invalid customer_id: {e}")))?;
                CustomerId::from_uuid(uuid)
            }
            None => CustomerId::new(),
        };

        let payment_method = self.payment_method.parse()?;

        let mut items = Vec::with_capacity(self.items.len());
        for line in &self.items {
            let uuid = uuid::Uuid::parse_str(&line.product_id)
                .map_err(|e| ApiError::BadRequest(format!("Invalid product_id: {e}")))?;
            items.push(DraftItem {
                product_id: ProductId::from_uuid(uuid),
                quantity: line.quantity,
            });
        }

        Ok(OrderDraft {
            customer_id,
            items,
            payment_method,
            shipping: ShippingAddress {
                name: self.shipping.name,
                phone: self.shipping.phone,
                email: self.shipping.email,
                address: self.shipping.address,
                area: self.shipping.area,
                city: self.shipping.city,
            },
            discount: Money::from_cents(self.discount_cents),
            notes: self.notes,
        })
    }
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub order_number: String,
    pub customer_id: String,
    pub status: String,
    pub payment_status: String,
    pub payment_method: String,
    pub subtotal_cents: i64,
    pub shipping_cost_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub items: Vec<OrderItemResponse>,
    pub courier: Option<CourierBindingResponse>,
    pub shipping: ShippingAddressResponse,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

#[derive(Serialize)]
pub struct CourierBindingResponse {
    pub courier: String,
    pub tracking_id: String,
}

#[derive(Serialize)]
pub struct ShippingAddressResponse {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: String,
    pub area: Option<String>,
    pub city: String,
}

impl OrderResponse {
    pub fn from_order(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            order_number: order.order_number.to_string(),
            customer_id: order.customer_id.to_string(),
            status: order.status.as_str().to_string(),
            payment_status: order.payment_status.as_str().to_string(),
            payment_method: order.payment_method.as_str().to_string(),
            subtotal_cents: order.subtotal.cents(),
            shipping_cost_cents: order.shipping_cost.cents(),
            discount_cents: order.discount.cents(),
            total_cents: order.total.cents(),
            items: order
                .items
                .iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id.to_string(),
                    product_name: item.product_name.clone(),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price.cents(),
                    line_total_cents: item.line_total.cents(),
                })
                .collect(),
            courier: order.courier.as_ref().map(|binding| CourierBindingResponse {
                courier: binding.courier.clone(),
                tracking_id: binding.tracking_id.clone(),
            }),
            shipping: ShippingAddressResponse {
                name: order.shipping.name.clone(),
                phone: order.shipping.phone.clone(),
                email: order.shipping.email.clone(),
                address: order.shipping.address.clone(),
                area: order.shipping.area.clone(),
                city: order.shipping.city.clone(),
            },
            notes: order.notes.clone(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

// -- Handlers --

/// POST /orders — place a new order from a customer draft.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(axum::http::StatusCode, Json<OrderResponse>), ApiError> {
    let draft = req.into_draft()?;
    let order = state.ledger.place_order(draft).await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(OrderResponse::from_order(&order)),
    ))
}

/// GET /orders — list orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let mut filter = OrderFilter::new();
    if let Some(raw) = &query.status {
        let status: OrderStatus = raw.parse()?;
        filter = filter.status(status);
    }
    if let Some(limit) = query.limit {
        filter = filter.limit(limit);
    }
    if let Some(offset) = query.offset {
        filter = filter.offset(offset);
    }

    let orders = state.ledger.orders(filter).await?;
    Ok(Json(orders.iter().map(OrderResponse::from_order).collect()))
}

/// GET /orders/{order_number} — fetch an order by its public number.
#[tracing::instrument(skip(state))]
pub async fn get<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_number): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .ledger
        .order_by_number(&OrderNumber::new(order_number))
        .await?;
    Ok(Json(OrderResponse::from_order(&order)))
}

/// POST /orders/{order_number}/cancel — explicit customer/admin cancel.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_number): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .ledger
        .cancel(&OrderNumber::new(order_number), "Order has been cancelled")
        .await?;
    Ok(Json(OrderResponse::from_order(&order)))
}

/// POST /orders/{order_number}/confirm-payment — gateway success report.
#[tracing::instrument(skip(state))]
pub async fn confirm_payment<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_number): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .ledger
        .confirm_payment(&OrderNumber::new(order_number))
        .await?;
    Ok(Json(OrderResponse::from_order(&order)))
}

/// PUT /orders/{order_number}/status — operator status override.
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_number): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let target: OrderStatus = req.status.parse()?;
    let note = req
        .note
        .unwrap_or_else(|| "Status updated manually".to_string());

    let order = state
        .ledger
        .update_status(&OrderNumber::new(order_number), target, &note)
        .await?;
    Ok(Json(OrderResponse::from_order(&order)))
}
