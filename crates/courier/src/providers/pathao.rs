//! Pathao Courier adapter.
//!
//! Pathao's merchant API authenticates with short-lived OAuth tokens
//! issued against client credentials plus a merchant login. The adapter
//! caches the token and reissues it a margin before expiry, or
//! immediately when the API answers 401.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::adapter::{
    CourierAdapter, DeliveryReceipt, DeliveryRequest, StatusReport, WebhookEvent,
    webhook_event_from,
};
use crate::error::{CourierError, Result};
use crate::providers::rejected;
use crate::registry::ProviderConfig;
use crate::webhook::WebhookVerifier;

/// Tokens are treated as expired this long before they actually are.
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 60;

/// Pathao sends parcels as regular (48h) deliveries of item type parcel.
const DELIVERY_TYPE_NORMAL: u32 = 48;
const ITEM_TYPE_PARCEL: u32 = 2;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Pathao merchant API adapter.
#[derive(Debug)]
pub struct PathaoCourier {
    config: ProviderConfig,
    client: reqwest::Client,
    verifier: WebhookVerifier,
    token: RwLock<Option<CachedToken>>,
}

impl PathaoCourier {
    pub fn new(config: ProviderConfig, timeout: Duration) -> Result<Self> {
        let verifier = WebhookVerifier::new(config.webhook_secret.clone(), config.allow_unsigned)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            config,
            client,
            verifier,
            token: RwLock::new(None),
        })
    }

    /// Returns a usable access token, issuing a fresh one when the cache
    /// is empty or inside the expiry margin.
    async fn access_token(&self) -> Result<String> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref()
                && token.expires_at > Instant::now()
            {
                return Ok(token.access_token.clone());
            }
        }
        self.issue_token().await
    }

    async fn issue_token(&self) -> Result<String> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: u64,
        }

        let response = self
            .client
            .post(format!("{}/aladdin/api/v1/issue-token", self.config.base_url))
            .json(&serde_json::json!({
                "client_id": self.config.api_key,
                "client_secret": self.config.api_secret,
                "username": self.config.username,
                "password": self.config.password,
                "grant_type": "password",
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CourierError::Auth(format!(
                "pathao token request failed with status {}",
                response.status()
            )));
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(
            token.expires_in.saturating_sub(TOKEN_EXPIRY_MARGIN_SECS),
        );
        *self.token.write().await = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        tracing::debug!("issued fresh pathao access token");
        Ok(token.access_token)
    }

    /// Sends a bearer-authorized request, reissuing the token and
    /// retrying exactly once when the API answers 401.
    async fn send_authorized(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let retry = request
            .try_clone()
            .ok_or_else(|| CourierError::Config("request body is not replayable".to_string()))?;

        let token = self.access_token().await?;
        let response = request.bearer_auth(token).send().await?;
        if response.status() != reqwest::StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::warn!("pathao rejected the cached access token, reissuing");
        *self.token.write().await = None;
        let token = self.access_token().await?;
        Ok(retry.bearer_auth(token).send().await?)
    }
}

#[async_trait]
impl CourierAdapter for PathaoCourier {
    fn name(&self) -> &'static str {
        "pathao"
    }

    async fn create_delivery(&self, request: &DeliveryRequest) -> Result<DeliveryReceipt> {
        #[derive(Deserialize)]
        struct CreateResponse {
            data: ConsignmentData,
        }
        #[derive(Deserialize)]
        struct ConsignmentData {
            consignment_id: String,
        }

        let body = serde_json::json!({
            "merchant_order_id": request.order_number,
            "recipient_name": request.recipient_name,
            "recipient_phone": request.recipient_phone,
            "recipient_address": request.recipient_address,
            "recipient_city": request.recipient_city,
            "amount_to_collect": request.cod_amount.taka(),
            "item_quantity": request.item_count,
            "special_instruction": request.note,
            "delivery_type": DELIVERY_TYPE_NORMAL,
            "item_type": ITEM_TYPE_PARCEL,
        });

        let response = self
            .send_authorized(
                self.client
                    .post(format!("{}/aladdin/api/v1/orders", self.config.base_url))
                    .json(&body),
            )
            .await?;

        if !response.status().is_success() {
            return Err(rejected(self.name(), "create delivery", response).await);
        }

        let created: CreateResponse = response.json().await?;
        tracing::info!(
            order_number = %request.order_number,
            tracking_id = %created.data.consignment_id,
            "pathao accepted delivery"
        );
        Ok(DeliveryReceipt {
            tracking_id: created.data.consignment_id,
            tracking_url: None,
        })
    }

    async fn status(&self, tracking_id: &str) -> Result<StatusReport> {
        #[derive(Deserialize)]
        struct InfoResponse {
            data: InfoData,
        }
        #[derive(Deserialize)]
        struct InfoData {
            order_status: String,
        }

        let response = self
            .send_authorized(self.client.get(format!(
                "{}/aladdin/api/v1/orders/{}/info",
                self.config.base_url, tracking_id
            )))
            .await?;

        if !response.status().is_success() {
            return Err(rejected(self.name(), "consignment info", response).await);
        }

        let info: InfoResponse = response.json().await?;
        let status = self.map_status(&info.data.order_status);
        Ok(StatusReport {
            tracking_id: tracking_id.to_string(),
            raw_status: info.data.order_status,
            status,
        })
    }

    /// Uses Pathao's native bulk endpoint instead of sequential lookups.
    async fn bulk_status(&self, tracking_ids: &[String]) -> Result<Vec<StatusReport>> {
        if tracking_ids.is_empty() {
            return Ok(Vec::new());
        }

        #[derive(Deserialize)]
        struct BulkResponse {
            data: Vec<BulkEntry>,
        }
        #[derive(Deserialize)]
        struct BulkEntry {
            consignment_id: String,
            order_status: String,
        }

        let response = self
            .send_authorized(
                self.client
                    .post(format!(
                        "{}/aladdin/api/v1/orders/bulk-status",
                        self.config.base_url
                    ))
                    .json(&serde_json::json!({ "consignment_ids": tracking_ids })),
            )
            .await?;

        if !response.status().is_success() {
            return Err(rejected(self.name(), "bulk status", response).await);
        }

        let bulk: BulkResponse = response.json().await?;
        Ok(bulk
            .data
            .into_iter()
            .map(|entry| {
                let status = self.map_status(&entry.order_status);
                StatusReport {
                    tracking_id: entry.consignment_id,
                    raw_status: entry.order_status,
                    status,
                }
            })
            .collect())
    }

    fn signature_headers(&self) -> &'static [&'static str] {
        &["x-pathao-signature", "x-webhook-signature"]
    }

    fn verify_webhook(&self, raw_body: &[u8], signature: Option<&str>) -> bool {
        self.verifier.verify(raw_body, signature)
    }

    fn parse_webhook(&self, payload: &serde_json::Value) -> Result<WebhookEvent> {
        webhook_event_from(
            payload,
            &["consignment_id", "tracking_id"],
            &["merchant_order_id"],
            &["order_status", "status"],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn adapter() -> PathaoCourier {
        let config = ProviderConfig {
            base_url: "http://localhost:9".to_string(),
            api_key: "client-id".to_string(),
            api_secret: "client-secret".to_string(),
            username: "merchant".to_string(),
            password: "pw".to_string(),
            webhook_secret: Some("shhh".to_string()),
            allow_unsigned: false,
        };
        PathaoCourier::new(config, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_construction_requires_webhook_policy() {
        let config = ProviderConfig {
            base_url: "http://localhost:9".to_string(),
            ..ProviderConfig::default()
        };
        let err = PathaoCourier::new(config, Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, CourierError::Config(_)));
    }

    #[test]
    fn test_parse_webhook_reads_pathao_fields() {
        let adapter = adapter();
        let event = adapter
            .parse_webhook(&json!({
                "consignment_id": "DL1212XEB",
                "merchant_order_id": "ORD-20260815-1234",
                "order_status": "Picked_Up"
            }))
            .unwrap();

        assert_eq!(event.tracking_id.as_deref(), Some("DL1212XEB"));
        assert_eq!(event.order_number.as_deref(), Some("ORD-20260815-1234"));
        assert_eq!(event.raw_status, "Picked_Up");
        assert_eq!(
            adapter.map_status(&event.raw_status),
            domain::OrderStatus::Shipped
        );
    }

    #[test]
    fn test_parse_webhook_without_identity_is_rejected() {
        let adapter = adapter();
        let err = adapter
            .parse_webhook(&json!({ "order_status": "delivered" }))
            .unwrap_err();
        assert!(matches!(err, CourierError::MissingTrackingId));
    }

    #[test]
    fn test_webhook_signature_round_trip() {
        let adapter = adapter();
        let body = br#"{"consignment_id":"DL1","order_status":"delivered"}"#;
        let signature = crate::webhook::sign("shhh", body).unwrap();

        assert!(adapter.verify_webhook(body, Some(&signature)));
        assert!(!adapter.verify_webhook(body, Some("deadbeef")));
        assert!(!adapter.verify_webhook(body, None));
    }
}
