//! Cancels prepaid orders whose payment never arrived.

use async_trait::async_trait;
use chrono::{Duration, Utc};

use domain::{OrderStatus, PaymentMethod, PaymentStatus};
use ledger::{OrderFilter, OrderLedger, OrderStore};

use crate::error::Result;
use crate::jobs::{JobReport, ReconcileJob};

/// Cancels pending prepaid orders older than the payment timeout.
///
/// Cash-on-delivery orders are exempt: they owe nothing up front, so
/// age alone never cancels them. Cancellation goes through the ledger
/// and restocks every line.
pub struct StaleUnpaidCancelJob<S: OrderStore> {
    ledger: OrderLedger<S>,
    timeout: Duration,
}

impl<S: OrderStore> StaleUnpaidCancelJob<S> {
    pub fn new(ledger: OrderLedger<S>, timeout_hours: i64) -> Self {
        Self {
            ledger,
            timeout: Duration::hours(timeout_hours),
        }
    }
}

#[async_trait]
impl<S: OrderStore> ReconcileJob for StaleUnpaidCancelJob<S> {
    fn name(&self) -> &'static str {
        "stale_unpaid_cancel"
    }

    #[tracing::instrument(skip(self))]
    async fn run_once(&self) -> Result<JobReport> {
        let cutoff = Utc::now() - self.timeout;
        let stale = self
            .ledger
            .orders(
                OrderFilter::new()
                    .status(OrderStatus::Pending)
                    .payment_status(PaymentStatus::Pending)
                    .exclude_payment_method(PaymentMethod::CashOnDelivery)
                    .created_before(cutoff),
            )
            .await?;

        let mut report = JobReport {
            examined: stale.len(),
            ..JobReport::default()
        };
        let detail = format!(
            "Auto-cancelled: Payment not received within {} hours",
            self.timeout.num_hours()
        );

        for order in stale {
            match self.ledger.cancel(&order.order_number, &detail).await {
                Ok(_) => report.applied += 1,
                Err(e) => {
                    tracing::warn!(
                        order_number = %order.order_number,
                        error = %e,
                        "stale order cancellation failed"
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}
