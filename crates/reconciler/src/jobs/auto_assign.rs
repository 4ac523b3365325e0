//! Hands confirmed orders to the default courier.

use std::sync::Arc;

use async_trait::async_trait;

use courier::{CourierRegistry, DeliveryRequest};
use domain::{CourierBinding, OrderStatus};
use ledger::{OrderFilter, OrderLedger, OrderStore};

use crate::error::Result;
use crate::jobs::{JobReport, ReconcileJob};

/// Assigns every confirmed, unbound order to the default provider.
///
/// Runs only when auto-assignment is enabled in configuration; shops
/// that dispatch manually never construct this job. A failed handoff
/// leaves the order confirmed and unbound for the next sweep.
pub struct AutoAssignJob<S: OrderStore> {
    ledger: OrderLedger<S>,
    registry: Arc<CourierRegistry>,
}

impl<S: OrderStore> AutoAssignJob<S> {
    pub fn new(ledger: OrderLedger<S>, registry: Arc<CourierRegistry>) -> Self {
        Self { ledger, registry }
    }
}

#[async_trait]
impl<S: OrderStore> ReconcileJob for AutoAssignJob<S> {
    fn name(&self) -> &'static str {
        "auto_assign"
    }

    #[tracing::instrument(skip(self))]
    async fn run_once(&self) -> Result<JobReport> {
        let adapter = self.registry.default_adapter()?;

        let ready = self
            .ledger
            .orders(
                OrderFilter::new()
                    .status(OrderStatus::Confirmed)
                    .courier_bound(false),
            )
            .await?;

        let mut report = JobReport {
            examined: ready.len(),
            ..JobReport::default()
        };

        for order in ready {
            let request = DeliveryRequest::for_order(&order);
            let receipt = match adapter.create_delivery(&request).await {
                Ok(receipt) => receipt,
                Err(e) => {
                    tracing::warn!(
                        order_number = %order.order_number,
                        provider = adapter.name(),
                        error = %e,
                        "auto-assign handoff failed"
                    );
                    report.failed += 1;
                    continue;
                }
            };

            let binding = CourierBinding {
                courier: adapter.name().to_string(),
                tracking_id: receipt.tracking_id.clone(),
            };
            let detail = format!(
                "Auto-assigned to {}. Tracking ID: {}",
                adapter.name(),
                receipt.tracking_id
            );
            match self.ledger.assign_courier(order.id, binding, &detail).await {
                Ok(_) => report.applied += 1,
                Err(e) => {
                    // The consignment exists at the provider but the order
                    // never recorded it; this needs a human.
                    tracing::error!(
                        order_number = %order.order_number,
                        tracking_id = %receipt.tracking_id,
                        error = %e,
                        "delivery created but courier binding failed"
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}
