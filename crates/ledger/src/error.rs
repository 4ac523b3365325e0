use thiserror::Error;

use common::OrderNumber;
use domain::{DomainError, ProductId};

/// Errors that can occur when operating on the order ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// The product does not exist or is inactive.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The generated order number collided with an existing one.
    #[error("Duplicate order number: {0}")]
    DuplicateOrderNumber(OrderNumber),

    /// A lifecycle rule rejected the operation.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
