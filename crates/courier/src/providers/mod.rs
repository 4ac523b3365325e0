//! Provider-specific adapter implementations.

mod pathao;
mod steadfast;

pub use pathao::PathaoCourier;
pub use steadfast::SteadfastCourier;

use crate::error::CourierError;

/// Turns a non-success provider response into a [`CourierError::Rejected`],
/// keeping the response body for the error detail.
pub(crate) async fn rejected(
    provider: &str,
    context: &str,
    response: reqwest::Response,
) -> CourierError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    CourierError::Rejected {
        provider: provider.to_string(),
        detail: format!("{context} returned {status}: {body}"),
    }
}
