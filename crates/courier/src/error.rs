use thiserror::Error;

/// Errors from courier providers and webhook processing.
#[derive(Error, Debug)]
pub enum CourierError {
    /// No adapter is registered under the requested name.
    #[error("Unknown courier provider: {0}")]
    UnknownProvider(String),

    /// Authentication against the provider failed.
    #[error("Courier authentication failed: {0}")]
    Auth(String),

    /// The provider answered but refused the request.
    #[error("Courier {provider} rejected the request: {detail}")]
    Rejected { provider: String, detail: String },

    /// Transport-level HTTP failure.
    #[error("Courier HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A webhook payload did not have the expected shape.
    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),

    /// A webhook carried neither a tracking id nor an order number.
    #[error("Webhook payload carries no tracking id or order number")]
    MissingTrackingId,

    /// Invalid courier configuration.
    #[error("Courier configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CourierError>;
