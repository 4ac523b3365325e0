use courier::CourierError;
use ledger::LedgerError;
use thiserror::Error;

/// Errors a reconciliation sweep can fail with.
///
/// Per-order failures inside a sweep are counted and logged, not
/// returned; these variants surface only when the sweep itself cannot
/// proceed, such as a failed ledger query or a missing default courier.
#[derive(Error, Debug)]
pub enum ReconcilerError {
    /// The ledger query or write behind the sweep failed.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The courier registry or a provider call failed.
    #[error("Courier error: {0}")]
    Courier(#[from] CourierError),
}

pub type Result<T> = std::result::Result<T, ReconcilerError>;
