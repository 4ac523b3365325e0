//! Background reconciliation for the order ledger.
//!
//! Three periodic sweeps keep orders honest between webhooks:
//! - [`StatusPollJob`]: pulls consignment statuses from couriers and
//!   applies the resulting transitions
//! - [`StaleUnpaidCancelJob`]: cancels prepaid orders whose payment
//!   never arrived within the timeout
//! - [`AutoAssignJob`]: hands confirmed orders to the default courier
//!
//! The [`Scheduler`] runs each job on its own interval with a shared
//! shutdown signal. Every sweep is idempotent: replaying one against an
//! already-reconciled ledger changes nothing.

pub mod error;
pub mod jobs;
pub mod scheduler;

pub use error::{ReconcilerError, Result};
pub use jobs::{AutoAssignJob, JobReport, ReconcileJob, StaleUnpaidCancelJob, StatusPollJob};
pub use scheduler::Scheduler;
