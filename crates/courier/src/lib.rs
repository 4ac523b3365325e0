//! Courier provider integrations for delivery handoff and tracking.
//!
//! This crate provides:
//! - [`CourierAdapter`]: the provider-neutral trait, with Pathao and
//!   Steadfast implementations
//! - [`CourierRegistry`]: name-based adapter lookup built from config
//! - [`WebhookVerifier`]: HMAC-SHA256 authentication of callbacks
//! - [`StubCourier`]: a scriptable adapter for tests
//!
//! Adapters translate between the order lifecycle and each provider's
//! API; they never touch the ledger themselves.

pub mod adapter;
pub mod error;
pub mod providers;
pub mod registry;
pub mod stub;
pub mod webhook;

pub use adapter::{
    CourierAdapter, DeliveryReceipt, DeliveryRequest, StatusReport, WebhookEvent,
    map_provider_status,
};
pub use error::{CourierError, Result};
pub use providers::{PathaoCourier, SteadfastCourier};
pub use registry::{CourierConfig, CourierRegistry, ProviderConfig};
pub use stub::StubCourier;
pub use webhook::{WebhookVerifier, sign};
