//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use courier::CourierError;
use domain::DomainError;
use ledger::LedgerError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Lifecycle rule violation.
    Domain(DomainError),
    /// Webhook signature verification failed.
    SignatureRejected,
    /// A courier provider call failed during assignment.
    ProviderFailure(String),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            // Deliberately detail-free so callers learn nothing about the
            // secret or how the check failed.
            ApiError::SignatureRejected => {
                (StatusCode::UNAUTHORIZED, "invalid signature".to_string())
            }
            ApiError::ProviderFailure(detail) => {
                tracing::error!(error = %detail, "courier provider request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "courier provider request failed".to_string(),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::InvalidTransition { .. } => (StatusCode::CONFLICT, err.to_string()),
        DomainError::NotCancellable { .. }
        | DomainError::CourierAlreadyAssigned { .. }
        | DomainError::NotReadyForCourier { .. }
        | DomainError::EmptyOrder
        | DomainError::InvalidQuantity { .. }
        | DomainError::NegativeAmount { .. }
        | DomainError::InsufficientStock { .. }
        | DomainError::UnknownPaymentMethod(_)
        | DomainError::UnknownStatus(_) => (StatusCode::BAD_REQUEST, err.to_string()),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::OrderNotFound(_) => ApiError::NotFound(err.to_string()),
            LedgerError::ProductNotFound(_) => ApiError::BadRequest(err.to_string()),
            LedgerError::Domain(domain_err) => ApiError::Domain(domain_err),
            LedgerError::DuplicateOrderNumber(_)
            | LedgerError::Database(_)
            | LedgerError::Migration(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<CourierError> for ApiError {
    fn from(err: CourierError) -> Self {
        match &err {
            CourierError::UnknownProvider(_)
            | CourierError::MalformedPayload(_)
            | CourierError::MissingTrackingId => ApiError::BadRequest(err.to_string()),
            CourierError::Auth(_)
            | CourierError::Rejected { .. }
            | CourierError::Http(_)
            | CourierError::Config(_) => ApiError::ProviderFailure(err.to_string()),
        }
    }
}
