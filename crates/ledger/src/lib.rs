//! Order ledger: the persistent source of truth for orders and stock.
//!
//! This crate provides:
//! - [`OrderStore`] trait with in-memory and PostgreSQL implementations
//! - [`OrderLedger`] service owning order intake, cancellation, courier
//!   binding, and status transitions
//! - [`OrderFilter`] for the queries shared by handlers and background jobs

pub mod error;
pub mod memory;
pub mod postgres;
pub mod service;
pub mod store;

pub use error::{LedgerError, Result};
pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;
pub use service::OrderLedger;
pub use store::{OrderFilter, OrderStore, TransitionOutcome};
