//! HTTP surface for the order fulfillment service.
//!
//! Provides REST endpoints for order intake and lifecycle, courier
//! assignment, tracking, and webhook ingress, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use courier::CourierRegistry;
use ledger::{OrderLedger, OrderStore};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore> {
    pub ledger: OrderLedger<S>,
    pub registry: Arc<CourierRegistry>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: OrderStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{order_number}", get(routes::orders::get::<S>))
        .route(
            "/orders/{order_number}/cancel",
            post(routes::orders::cancel::<S>),
        )
        .route(
            "/orders/{order_number}/confirm-payment",
            post(routes::orders::confirm_payment::<S>),
        )
        .route(
            "/orders/{order_number}/status",
            put(routes::orders::update_status::<S>),
        )
        .route(
            "/delivery/{order_number}/assign-courier",
            post(routes::delivery::assign_courier::<S>),
        )
        .route(
            "/delivery/{order_number}/track",
            get(routes::delivery::track::<S>),
        )
        .route(
            "/delivery/webhook/{provider}",
            post(routes::delivery::webhook::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
