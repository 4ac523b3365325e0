//! Courier assignment, tracking, and webhook ingress endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use common::OrderNumber;
use courier::DeliveryRequest;
use domain::CourierBinding;
use ledger::{LedgerError, OrderStore};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;
use crate::routes::orders::{CourierBindingResponse, OrderResponse};

// -- Request types --

#[derive(Deserialize)]
pub struct AssignCourierRequest {
    pub courier: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct TrackingResponse {
    pub order_number: String,
    pub status: String,
    pub payment_status: String,
    pub courier: Option<CourierBindingResponse>,
    /// Raw status as the provider last reported it; `null` when the order
    /// is unbound or the provider could not be reached.
    pub live_status: Option<String>,
    pub history: Vec<TrackingEntryResponse>,
}

#[derive(Serialize)]
pub struct TrackingEntryResponse {
    pub label: String,
    pub detail: String,
    pub recorded_at: DateTime<Utc>,
}

// -- Handlers --

/// POST /delivery/{order_number}/assign-courier — hand an order to a
/// provider and mark it shipped.
///
/// The body is optional; without one the default provider is used.
#[tracing::instrument(skip(state, req))]
pub async fn assign_courier<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_number): Path<String>,
    req: Option<Json<AssignCourierRequest>>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .ledger
        .order_by_number(&OrderNumber::new(order_number))
        .await?;

    // Eligibility is checked before the provider sees anything, so a
    // rejected order never creates a dangling consignment.
    order.ensure_courier_assignable()?;

    let adapter = match req.and_then(|Json(body)| body.courier) {
        Some(name) => state.registry.get(&name)?,
        None => state.registry.default_adapter()?,
    };

    let delivery = DeliveryRequest::for_order(&order);
    let receipt = adapter.create_delivery(&delivery).await?;

    let binding = CourierBinding {
        courier: adapter.name().to_string(),
        tracking_id: receipt.tracking_id.clone(),
    };
    let detail = format!(
        "Handed over to {}. Tracking ID: {}",
        adapter.name(),
        receipt.tracking_id
    );
    let order = state.ledger.assign_courier(order.id, binding, &detail).await?;
    Ok(Json(OrderResponse::from_order(&order)))
}

/// GET /delivery/{order_number}/track — persisted status plus history,
/// with a best-effort live status from the provider.
#[tracing::instrument(skip(state))]
pub async fn track<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_number): Path<String>,
) -> Result<Json<TrackingResponse>, ApiError> {
    let order = state
        .ledger
        .order_by_number(&OrderNumber::new(order_number))
        .await?;
    let history = state.ledger.tracking(order.id).await?;

    let mut live_status = None;
    if let Some(binding) = &order.courier
        && let Ok(adapter) = state.registry.get(&binding.courier)
    {
        match adapter.status(&binding.tracking_id).await {
            Ok(report) => live_status = Some(report.raw_status),
            Err(e) => {
                tracing::warn!(
                    order_number = %order.order_number,
                    error = %e,
                    "live status lookup failed"
                );
            }
        }
    }

    Ok(Json(TrackingResponse {
        order_number: order.order_number.to_string(),
        status: order.status.as_str().to_string(),
        payment_status: order.payment_status.as_str().to_string(),
        courier: order.courier.as_ref().map(|binding| CourierBindingResponse {
            courier: binding.courier.clone(),
            tracking_id: binding.tracking_id.clone(),
        }),
        live_status,
        history: history
            .into_iter()
            .map(|entry| TrackingEntryResponse {
                label: entry.label,
                detail: entry.detail,
                recorded_at: entry.recorded_at,
            })
            .collect(),
    }))
}

/// POST /delivery/webhook/{provider} — courier status callback ingress.
///
/// The signature is verified over the exact raw bytes before any JSON
/// parsing. Callbacks for consignments we do not know are acknowledged
/// as ignored so the provider stops retrying them.
#[tracing::instrument(skip(state, headers, body))]
pub async fn webhook<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let adapter = state.registry.get(&provider)?;

    let signature = adapter
        .signature_headers()
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok());
    if !adapter.verify_webhook(&body, signature) {
        return Err(ApiError::SignatureRejected);
    }
    metrics::counter!("courier_webhooks_total").increment(1);

    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Malformed webhook payload: {e}")))?;
    let event = adapter.parse_webhook(&payload)?;

    let mut order = None;
    if let Some(tracking_id) = &event.tracking_id {
        order = state.ledger.order_by_tracking_id(tracking_id).await?;
    }
    if order.is_none()
        && let Some(number) = &event.order_number
    {
        order = match state
            .ledger
            .order_by_number(&OrderNumber::new(number.clone()))
            .await
        {
            Ok(found) => Some(found),
            Err(LedgerError::OrderNotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };
    }
    let Some(order) = order else {
        tracing::info!(
            provider = %adapter.name(),
            tracking_id = ?event.tracking_id,
            order_number = ?event.order_number,
            "webhook for unknown consignment ignored"
        );
        return Ok(Json(serde_json::json!({ "status": "ignored" })));
    };

    let target = adapter.map_status(&event.raw_status);
    let note = format!("Update from {}: {}", adapter.name(), event.raw_status);
    let result = match state.ledger.transition(order.id, target, &note).await {
        Ok(outcome) if outcome.is_applied() => "success",
        Ok(_) => "ignored",
        // A report that maps backwards (or an unknown vocabulary word
        // mapping to pending) is rejected by the planner; the provider
        // still gets a 200 so it does not retry.
        Err(LedgerError::Domain(e)) => {
            tracing::info!(
                order_number = %order.order_number,
                raw_status = %event.raw_status,
                error = %e,
                "webhook status does not move the order"
            );
            "ignored"
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Json(serde_json::json!({ "status": result })))
}
