//! The provider-neutral courier surface.
//!
//! Everything the rest of the system knows about couriers goes through
//! [`CourierAdapter`]: handing a parcel over, polling consignment status,
//! and authenticating inbound webhooks. Provider quirks (auth schemes,
//! endpoint shapes, field names) stay behind the trait.

use async_trait::async_trait;

use common::OrderNumber;
use domain::{Money, Order, OrderStatus};

use crate::error::{CourierError, Result};

/// What a provider needs to pick up and deliver one order.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryRequest {
    pub order_number: OrderNumber,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub recipient_address: String,
    pub recipient_city: String,
    /// Amount to collect on delivery. Zero for prepaid orders.
    pub cod_amount: Money,
    /// Total units across all lines.
    pub item_count: u32,
    pub note: Option<String>,
}

impl DeliveryRequest {
    /// Builds a delivery request from an order.
    ///
    /// Cash-on-delivery orders carry the full total as the collection
    /// amount; prepaid orders collect nothing at the door.
    pub fn for_order(order: &Order) -> Self {
        let cod_amount = if order.is_cod() {
            order.total
        } else {
            Money::zero()
        };
        let recipient_address = match &order.shipping.area {
            Some(area) => format!("{}, {}", order.shipping.address, area),
            None => order.shipping.address.clone(),
        };
        Self {
            order_number: order.order_number.clone(),
            recipient_name: order.shipping.name.clone(),
            recipient_phone: order.shipping.phone.clone(),
            recipient_address,
            recipient_city: order.shipping.city.clone(),
            cod_amount,
            item_count: order.items.iter().map(|item| item.quantity).sum(),
            note: order.notes.clone(),
        }
    }
}

/// A provider's answer to a successful delivery handoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Consignment or tracking identifier issued by the provider.
    pub tracking_id: String,

    /// Public tracking page, when the provider offers one.
    pub tracking_url: Option<String>,
}

/// One consignment's state as reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub tracking_id: String,

    /// The provider's own status string, kept for tracking history.
    pub raw_status: String,

    /// The provider status mapped into the order lifecycle.
    pub status: OrderStatus,
}

/// A webhook callback reduced to the fields the system acts on.
///
/// Providers identify the consignment inconsistently; at least one of
/// `tracking_id` and `order_number` is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub tracking_id: Option<String>,
    pub order_number: Option<String>,
    pub raw_status: String,
}

/// Maps a provider status string onto the order lifecycle.
///
/// Matching is case-insensitive. Strings outside the known vocabulary
/// map to [`OrderStatus::Pending`]; the lifecycle allows no move back
/// to pending, so such reports never advance an order.
pub fn map_provider_status(raw: &str) -> OrderStatus {
    match raw.to_lowercase().as_str() {
        "delivered" | "success" => OrderStatus::Delivered,
        "cancelled" | "returned" | "delivery_failed" => OrderStatus::Cancelled,
        "picked_up" | "picked" | "in_transit" | "on_the_way" => OrderStatus::Shipped,
        _ => OrderStatus::Pending,
    }
}

/// A delivery provider integration.
///
/// Implementations are cheap to share behind an `Arc` and must be safe
/// to call concurrently.
#[async_trait]
pub trait CourierAdapter: Send + Sync + std::fmt::Debug {
    /// Lowercase provider name used for registry lookup and order binding.
    fn name(&self) -> &'static str;

    /// Hands one order over to the provider for delivery.
    async fn create_delivery(&self, request: &DeliveryRequest) -> Result<DeliveryReceipt>;

    /// Fetches the current status of one consignment.
    async fn status(&self, tracking_id: &str) -> Result<StatusReport>;

    /// Fetches statuses for a batch of consignments.
    ///
    /// The default implementation issues sequential single lookups and
    /// skips consignments that fail, so one bad tracking id cannot sink
    /// a reconciliation sweep. Providers with a native bulk endpoint
    /// override this.
    async fn bulk_status(&self, tracking_ids: &[String]) -> Result<Vec<StatusReport>> {
        let mut reports = Vec::with_capacity(tracking_ids.len());
        for tracking_id in tracking_ids {
            match self.status(tracking_id).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::warn!(
                        provider = self.name(),
                        tracking_id = %tracking_id,
                        error = %e,
                        "status lookup failed, skipping consignment"
                    );
                }
            }
        }
        Ok(reports)
    }

    /// Maps this provider's status vocabulary onto the order lifecycle.
    fn map_status(&self, raw_status: &str) -> OrderStatus {
        map_provider_status(raw_status)
    }

    /// Header names this provider sends its webhook signature under,
    /// in lookup order.
    fn signature_headers(&self) -> &'static [&'static str];

    /// Checks a webhook signature against the raw request body.
    fn verify_webhook(&self, raw_body: &[u8], signature: Option<&str>) -> bool;

    /// Extracts the consignment identity and status from a webhook body.
    fn parse_webhook(&self, payload: &serde_json::Value) -> Result<WebhookEvent>;
}

/// Pulls a [`WebhookEvent`] out of a payload given each provider's field
/// names, tried left to right. Numeric identifiers are rendered as text.
pub(crate) fn webhook_event_from(
    payload: &serde_json::Value,
    tracking_fields: &[&str],
    order_fields: &[&str],
    status_fields: &[&str],
) -> Result<WebhookEvent> {
    let lookup = |fields: &[&str]| -> Option<String> {
        fields.iter().find_map(|field| {
            payload.get(*field).and_then(|value| match value {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
        })
    };

    let raw_status = lookup(status_fields)
        .ok_or_else(|| CourierError::MalformedPayload("missing status field".to_string()))?;
    let tracking_id = lookup(tracking_fields);
    let order_number = lookup(order_fields);

    if tracking_id.is_none() && order_number.is_none() {
        return Err(CourierError::MissingTrackingId);
    }

    Ok(WebhookEvent {
        tracking_id,
        order_number,
        raw_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{CustomerId, OrderItem, PaymentMethod, ProductId, ShippingAddress};
    use serde_json::json;

    fn order_with(method: PaymentMethod, area: Option<&str>) -> Order {
        let address = ShippingAddress {
            name: "Asha Rahman".to_string(),
            phone: "01712345678".to_string(),
            email: None,
            address: "House 7, Road 2".to_string(),
            area: area.map(str::to_string),
            city: "Dhaka".to_string(),
        };
        let items = vec![
            OrderItem::new(ProductId::new(), "Wireless Mouse", 2, Money::from_cents(150_000)),
            OrderItem::new(ProductId::new(), "Keyboard", 1, Money::from_cents(250_000)),
        ];
        Order::new(
            OrderNumber::generate(),
            CustomerId::new(),
            method,
            items,
            address,
            Money::zero(),
            Some("call before delivery".to_string()),
        )
        .unwrap()
    }

    #[test]
    fn test_for_order_collects_total_on_cod() {
        let order = order_with(PaymentMethod::CashOnDelivery, None);
        let request = DeliveryRequest::for_order(&order);

        assert_eq!(request.cod_amount, order.total);
        assert_eq!(request.item_count, 3);
        assert_eq!(request.recipient_address, "House 7, Road 2");
        assert_eq!(request.note.as_deref(), Some("call before delivery"));
    }

    #[test]
    fn test_for_order_collects_nothing_when_prepaid() {
        let order = order_with(PaymentMethod::MobileWallet, Some("Banani"));
        let request = DeliveryRequest::for_order(&order);

        assert_eq!(request.cod_amount, Money::zero());
        assert_eq!(request.recipient_address, "House 7, Road 2, Banani");
    }

    #[test]
    fn test_map_provider_status_vocabulary() {
        assert_eq!(map_provider_status("delivered"), OrderStatus::Delivered);
        assert_eq!(map_provider_status("Success"), OrderStatus::Delivered);
        assert_eq!(map_provider_status("cancelled"), OrderStatus::Cancelled);
        assert_eq!(map_provider_status("returned"), OrderStatus::Cancelled);
        assert_eq!(map_provider_status("delivery_failed"), OrderStatus::Cancelled);
        assert_eq!(map_provider_status("picked_up"), OrderStatus::Shipped);
        assert_eq!(map_provider_status("IN_TRANSIT"), OrderStatus::Shipped);
        assert_eq!(map_provider_status("on_the_way"), OrderStatus::Shipped);
        assert_eq!(map_provider_status("hold_at_hub"), OrderStatus::Pending);
    }

    #[test]
    fn test_webhook_event_prefers_earlier_fields() {
        let payload = json!({
            "consignment_id": 424242,
            "tracking_id": "shadowed",
            "merchant_order_id": "ORD-1001",
            "order_status": "Delivered"
        });

        let event = webhook_event_from(
            &payload,
            &["consignment_id", "tracking_id"],
            &["merchant_order_id"],
            &["order_status", "status"],
        )
        .unwrap();

        assert_eq!(event.tracking_id.as_deref(), Some("424242"));
        assert_eq!(event.order_number.as_deref(), Some("ORD-1001"));
        assert_eq!(event.raw_status, "Delivered");
    }

    #[test]
    fn test_webhook_event_requires_a_status() {
        let payload = json!({ "consignment_id": "DX-1" });
        let err = webhook_event_from(&payload, &["consignment_id"], &[], &["status"]).unwrap_err();
        assert!(matches!(err, CourierError::MalformedPayload(_)));
    }

    #[test]
    fn test_webhook_event_requires_some_identity() {
        let payload = json!({ "status": "delivered" });
        let err = webhook_event_from(&payload, &["consignment_id"], &["invoice"], &["status"])
            .unwrap_err();
        assert!(matches!(err, CourierError::MissingTrackingId));
    }
}
