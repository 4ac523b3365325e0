//! HTTP route handlers.

pub mod delivery;
pub mod health;
pub mod metrics;
pub mod orders;
