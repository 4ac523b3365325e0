//! Steadfast Courier adapter.
//!
//! Steadfast authenticates every call with static `Api-Key` and
//! `Secret-Key` headers. There is no bulk status endpoint, so batch
//! lookups fall back to the sequential default.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::adapter::{
    CourierAdapter, DeliveryReceipt, DeliveryRequest, StatusReport, WebhookEvent,
    webhook_event_from,
};
use crate::error::Result;
use crate::providers::rejected;
use crate::registry::ProviderConfig;
use crate::webhook::WebhookVerifier;

/// Steadfast delivery API adapter.
#[derive(Debug)]
pub struct SteadfastCourier {
    config: ProviderConfig,
    client: reqwest::Client,
    verifier: WebhookVerifier,
}

impl SteadfastCourier {
    pub fn new(config: ProviderConfig, timeout: Duration) -> Result<Self> {
        let verifier = WebhookVerifier::new(config.webhook_secret.clone(), config.allow_unsigned)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            config,
            client,
            verifier,
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("Api-Key", &self.config.api_key)
            .header("Secret-Key", &self.config.api_secret)
    }
}

#[async_trait]
impl CourierAdapter for SteadfastCourier {
    fn name(&self) -> &'static str {
        "steadfast"
    }

    async fn create_delivery(&self, request: &DeliveryRequest) -> Result<DeliveryReceipt> {
        #[derive(Deserialize)]
        struct CreateResponse {
            consignment: Consignment,
        }
        #[derive(Deserialize)]
        struct Consignment {
            tracking_code: String,
        }

        let body = serde_json::json!({
            "invoice": request.order_number,
            "recipient_name": request.recipient_name,
            "recipient_phone": request.recipient_phone,
            "recipient_address": format!(
                "{}, {}",
                request.recipient_address, request.recipient_city
            ),
            "cod_amount": request.cod_amount.taka(),
            "note": request.note,
        });

        let response = self
            .authorized(
                self.client
                    .post(format!("{}/create_order", self.config.base_url)),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejected(self.name(), "create delivery", response).await);
        }

        let created: CreateResponse = response.json().await?;
        tracing::info!(
            order_number = %request.order_number,
            tracking_id = %created.consignment.tracking_code,
            "steadfast accepted delivery"
        );
        Ok(DeliveryReceipt {
            tracking_id: created.consignment.tracking_code,
            tracking_url: None,
        })
    }

    async fn status(&self, tracking_id: &str) -> Result<StatusReport> {
        #[derive(Deserialize)]
        struct StatusResponse {
            delivery_status: String,
        }

        let response = self
            .authorized(self.client.get(format!(
                "{}/status_by_trackingcode/{}",
                self.config.base_url, tracking_id
            )))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejected(self.name(), "status lookup", response).await);
        }

        let parsed: StatusResponse = response.json().await?;
        let status = self.map_status(&parsed.delivery_status);
        Ok(StatusReport {
            tracking_id: tracking_id.to_string(),
            raw_status: parsed.delivery_status,
            status,
        })
    }

    fn signature_headers(&self) -> &'static [&'static str] {
        &["x-steadfast-signature", "x-webhook-signature"]
    }

    fn verify_webhook(&self, raw_body: &[u8], signature: Option<&str>) -> bool {
        self.verifier.verify(raw_body, signature)
    }

    fn parse_webhook(&self, payload: &serde_json::Value) -> Result<WebhookEvent> {
        webhook_event_from(
            payload,
            &["consignment_id", "tracking_code", "tracking_id"],
            &["invoice"],
            &["delivery_status", "status"],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CourierError;
    use serde_json::json;

    fn adapter() -> SteadfastCourier {
        let config = ProviderConfig {
            base_url: "http://localhost:9".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            webhook_secret: Some("shhh".to_string()),
            ..ProviderConfig::default()
        };
        SteadfastCourier::new(config, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_parse_webhook_reads_steadfast_fields() {
        let adapter = adapter();
        let event = adapter
            .parse_webhook(&json!({
                "consignment_id": 1424107,
                "invoice": "ORD-20260815-0042",
                "delivery_status": "delivered"
            }))
            .unwrap();

        assert_eq!(event.tracking_id.as_deref(), Some("1424107"));
        assert_eq!(event.order_number.as_deref(), Some("ORD-20260815-0042"));
        assert_eq!(
            adapter.map_status(&event.raw_status),
            domain::OrderStatus::Delivered
        );
    }

    #[test]
    fn test_parse_webhook_accepts_tracking_code_alias() {
        let adapter = adapter();
        let event = adapter
            .parse_webhook(&json!({
                "tracking_code": "15BAEB8A",
                "delivery_status": "cancelled"
            }))
            .unwrap();

        assert_eq!(event.tracking_id.as_deref(), Some("15BAEB8A"));
    }

    #[test]
    fn test_parse_webhook_without_status_is_malformed() {
        let adapter = adapter();
        let err = adapter
            .parse_webhook(&json!({ "tracking_code": "15BAEB8A" }))
            .unwrap_err();
        assert!(matches!(err, CourierError::MalformedPayload(_)));
    }
}
