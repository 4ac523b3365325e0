//! Polls courier providers for the state of shipped consignments.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use courier::CourierRegistry;
use domain::{Order, OrderStatus};
use ledger::{LedgerError, OrderFilter, OrderLedger, OrderStore};

use crate::error::Result;
use crate::jobs::{JobReport, ReconcileJob};

/// Reconciles shipped orders against what their providers report.
///
/// Webhooks are the primary signal; this sweep is the backstop for
/// callbacks that were lost or never configured. Each run selects every
/// shipped, courier-bound order, fetches provider statuses one bulk
/// call per provider, and applies the mapped transitions.
pub struct StatusPollJob<S: OrderStore> {
    ledger: OrderLedger<S>,
    registry: Arc<CourierRegistry>,
}

impl<S: OrderStore> StatusPollJob<S> {
    pub fn new(ledger: OrderLedger<S>, registry: Arc<CourierRegistry>) -> Self {
        Self { ledger, registry }
    }
}

#[async_trait]
impl<S: OrderStore> ReconcileJob for StatusPollJob<S> {
    fn name(&self) -> &'static str {
        "status_poll"
    }

    #[tracing::instrument(skip(self))]
    async fn run_once(&self) -> Result<JobReport> {
        let shipped = self
            .ledger
            .orders(
                OrderFilter::new()
                    .status(OrderStatus::Shipped)
                    .courier_bound(true),
            )
            .await?;

        let mut report = JobReport {
            examined: shipped.len(),
            ..JobReport::default()
        };

        // One bulk lookup per provider, not one call per order.
        let mut consignments: HashMap<String, Vec<String>> = HashMap::new();
        let mut orders_by_tracking: HashMap<String, Order> = HashMap::new();
        for order in shipped {
            let Some(binding) = order.courier.clone() else {
                report.skipped += 1;
                continue;
            };
            consignments
                .entry(binding.courier)
                .or_default()
                .push(binding.tracking_id.clone());
            orders_by_tracking.insert(binding.tracking_id, order);
        }

        for (provider, tracking_ids) in consignments {
            let adapter = match self.registry.get(&provider) {
                Ok(adapter) => adapter,
                Err(e) => {
                    tracing::warn!(
                        provider = %provider,
                        count = tracking_ids.len(),
                        error = %e,
                        "orders are bound to an unregistered provider"
                    );
                    report.failed += tracking_ids.len();
                    continue;
                }
            };

            // A provider outage costs this provider's batch, not the sweep.
            let status_reports = match adapter.bulk_status(&tracking_ids).await {
                Ok(status_reports) => status_reports,
                Err(e) => {
                    tracing::warn!(
                        provider = %provider,
                        count = tracking_ids.len(),
                        error = %e,
                        "bulk status lookup failed"
                    );
                    report.failed += tracking_ids.len();
                    continue;
                }
            };

            for status_report in status_reports {
                let Some(order) = orders_by_tracking.get(&status_report.tracking_id) else {
                    continue;
                };
                if status_report.status == order.status {
                    report.skipped += 1;
                    continue;
                }

                let note = format!(
                    "Auto-updated from {}: {}",
                    provider, status_report.raw_status
                );
                match self.ledger.transition(order.id, status_report.status, &note).await {
                    Ok(outcome) if outcome.is_applied() => report.applied += 1,
                    Ok(_) => report.skipped += 1,
                    Err(LedgerError::Domain(e)) => {
                        tracing::debug!(
                            order_number = %order.order_number,
                            raw_status = %status_report.raw_status,
                            error = %e,
                            "provider status does not move the order"
                        );
                        report.skipped += 1;
                    }
                    Err(e) => {
                        tracing::warn!(
                            order_number = %order.order_number,
                            error = %e,
                            "failed to apply provider status"
                        );
                        report.failed += 1;
                    }
                }
            }
        }

        Ok(report)
    }
}
