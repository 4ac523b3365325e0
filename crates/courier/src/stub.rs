//! A scriptable in-memory courier for tests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::adapter::{
    CourierAdapter, DeliveryReceipt, DeliveryRequest, StatusReport, WebhookEvent,
    map_provider_status, webhook_event_from,
};
use crate::error::{CourierError, Result};
use crate::webhook::WebhookVerifier;

#[derive(Debug, Default)]
struct StubState {
    /// tracking id -> order number, per created delivery.
    deliveries: HashMap<String, String>,
    /// tracking id -> raw status served by status lookups.
    reports: HashMap<String, String>,
    next_id: u32,
    create_calls: u32,
    status_calls: u32,
    bulk_calls: u32,
    fail_on_create: bool,
    fail_on_status: bool,
}

/// In-memory [`CourierAdapter`] with scriptable behavior.
///
/// Tests register it under any provider name, script consignment
/// statuses with [`set_report`](Self::set_report), and flip the failure
/// toggles to exercise error paths. Tracking ids are issued
/// sequentially as `NAME-0001`, `NAME-0002`, ...
#[derive(Debug, Clone)]
pub struct StubCourier {
    name: &'static str,
    verifier: Option<WebhookVerifier>,
    state: Arc<RwLock<StubState>>,
}

impl Default for StubCourier {
    fn default() -> Self {
        Self::new()
    }
}

impl StubCourier {
    pub fn new() -> Self {
        Self::named("stub")
    }

    /// A stub that answers to `name` in registry lookups.
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            verifier: None,
            state: Arc::new(RwLock::new(StubState::default())),
        }
    }

    /// A stub that requires webhooks signed against `secret`.
    pub fn with_secret(name: &'static str, secret: &str) -> Self {
        Self {
            name,
            verifier: Some(WebhookVerifier::with_secret(secret)),
            state: Arc::new(RwLock::new(StubState::default())),
        }
    }

    /// Scripts the raw status served for a tracking id.
    pub fn set_report(&self, tracking_id: &str, raw_status: &str) {
        let mut state = self.state.write().unwrap();
        state
            .reports
            .insert(tracking_id.to_string(), raw_status.to_string());
    }

    /// Makes `create_delivery` fail until reset.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    /// Makes `status` and `bulk_status` fail until reset.
    pub fn set_fail_on_status(&self, fail: bool) {
        self.state.write().unwrap().fail_on_status = fail;
    }

    /// Number of deliveries created so far.
    pub fn delivery_count(&self) -> usize {
        self.state.read().unwrap().deliveries.len()
    }

    /// Whether a delivery was created for the given order number.
    pub fn has_delivery_for(&self, order_number: &str) -> bool {
        self.state
            .read()
            .unwrap()
            .deliveries
            .values()
            .any(|number| number == order_number)
    }

    pub fn create_call_count(&self) -> u32 {
        self.state.read().unwrap().create_calls
    }

    pub fn status_call_count(&self) -> u32 {
        self.state.read().unwrap().status_calls
    }

    pub fn bulk_call_count(&self) -> u32 {
        self.state.read().unwrap().bulk_calls
    }
}

#[async_trait]
impl CourierAdapter for StubCourier {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn create_delivery(&self, request: &DeliveryRequest) -> Result<DeliveryReceipt> {
        let mut state = self.state.write().unwrap();
        state.create_calls += 1;

        if state.fail_on_create {
            return Err(CourierError::Rejected {
                provider: self.name.to_string(),
                detail: "provider unavailable".to_string(),
            });
        }

        state.next_id += 1;
        let tracking_id = format!("{}-{:04}", self.name.to_uppercase(), state.next_id);
        state
            .deliveries
            .insert(tracking_id.clone(), request.order_number.to_string());
        Ok(DeliveryReceipt {
            tracking_id,
            tracking_url: None,
        })
    }

    async fn status(&self, tracking_id: &str) -> Result<StatusReport> {
        let mut state = self.state.write().unwrap();
        state.status_calls += 1;

        if state.fail_on_status {
            return Err(CourierError::Rejected {
                provider: self.name.to_string(),
                detail: "status lookup unavailable".to_string(),
            });
        }

        let raw_status = state.reports.get(tracking_id).cloned().ok_or_else(|| {
            CourierError::Rejected {
                provider: self.name.to_string(),
                detail: format!("unknown consignment {tracking_id}"),
            }
        })?;
        Ok(StatusReport {
            tracking_id: tracking_id.to_string(),
            status: map_provider_status(&raw_status),
            raw_status,
        })
    }

    /// Serves scripted reports, skipping unscripted ids the way real
    /// bulk endpoints omit unknown consignments.
    async fn bulk_status(&self, tracking_ids: &[String]) -> Result<Vec<StatusReport>> {
        let mut state = self.state.write().unwrap();
        state.bulk_calls += 1;

        if state.fail_on_status {
            return Err(CourierError::Rejected {
                provider: self.name.to_string(),
                detail: "bulk status unavailable".to_string(),
            });
        }

        Ok(tracking_ids
            .iter()
            .filter_map(|tracking_id| {
                state.reports.get(tracking_id).map(|raw_status| StatusReport {
                    tracking_id: tracking_id.clone(),
                    status: map_provider_status(raw_status),
                    raw_status: raw_status.clone(),
                })
            })
            .collect())
    }

    fn signature_headers(&self) -> &'static [&'static str] {
        &["x-webhook-signature"]
    }

    fn verify_webhook(&self, raw_body: &[u8], signature: Option<&str>) -> bool {
        match &self.verifier {
            Some(verifier) => verifier.verify(raw_body, signature),
            None => true,
        }
    }

    fn parse_webhook(&self, payload: &serde_json::Value) -> Result<WebhookEvent> {
        webhook_event_from(
            payload,
            &["tracking_id", "consignment_id"],
            &["order_number"],
            &["status"],
        )
    }
}
