//! Sale order records and the Purchase event sent when a website order is confirmed.

use crate::client::EventDispatcher;
use crate::prelude::{ConfigProvider, ConversionEvent, EventName, UserData};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    #[default]
    Draft,
    Sent,
    Sale,
    Done,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    No,
    ToInvoice,
    Invoiced,
    Upselling,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
}

impl Partner {
    /// Mobile number first, landline otherwise. Blank numbers count as missing.
    pub fn contact_phone(&self) -> Option<&str> {
        [self.mobile.as_deref(), self.phone.as_deref()]
            .into_iter()
            .flatten()
            .find(|p| !p.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    #[serde(default)]
    pub product_id: Option<u64>,
    #[serde(default)]
    pub product_name: String,
    pub quantity: f64,
    #[serde(default)]
    pub price_unit: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaleOrder {
    pub id: u64,
    pub name: String,
    /// Placed through the web shop rather than entered in the back office.
    #[serde(default)]
    pub website_order: bool,
    #[serde(default)]
    pub state: OrderState,
    #[serde(default)]
    pub invoice_status: InvoiceStatus,
    pub partner: Partner,
    pub currency: String,
    pub amount_total: f64,
    #[serde(default)]
    pub lines: Vec<OrderLine>,
    #[serde(default)]
    pub date_order: Option<DateTime<Utc>>,
    #[serde(default)]
    pub portal_url: Option<String>,
    #[serde(default)]
    pub whatsapp_msg_sent: bool,
}

/// Event id shared with the browser pixel: `purchase_<order id>_<order date in millis>`.
pub fn purchase_correlation_id(order: &SaleOrder) -> String {
    let millis = order
        .date_order
        .map(|d| d.timestamp_millis().to_string())
        .unwrap_or_default();
    format!("purchase_{}_{}", order.id, millis)
}

/// Builds the Purchase event for `order`, or `None` when the order must not be reported:
/// back-office orders, and orders whose customer has no usable email or phone.
pub fn purchase_event(order: &SaleOrder) -> Option<ConversionEvent> {
    if !order.website_order {
        debug!("Meta CAPI: order {} is not a website order; skipping", order.id);
        return None;
    }

    let user_data = UserData::new()
        .hashed("em", order.partner.email.as_deref())
        .hashed("ph", order.partner.contact_phone());
    if user_data.is_empty() {
        info!(
            "Meta CAPI: skipping order {} because no usable customer identifiers were found",
            order.id
        );
        return None;
    }

    let content_ids: Vec<u64> = order.lines.iter().filter_map(|l| l.product_id).collect();
    let num_items: f64 = order.lines.iter().map(|l| l.quantity).sum();

    let mut custom_data = Map::new();
    custom_data.insert("currency".to_string(), json!(order.currency));
    custom_data.insert("value".to_string(), json!(order.amount_total));
    custom_data.insert("content_ids".to_string(), json!(content_ids));
    custom_data.insert("content_type".to_string(), json!("product"));
    custom_data.insert("num_items".to_string(), json!(num_items));

    Some(
        ConversionEvent::new(EventName::Purchase)
            .with_event_id(purchase_correlation_id(order))
            .with_user_data(user_data)
            .with_custom_data(custom_data),
    )
}

/// Reports confirmed orders without ever holding up, or failing, the confirmation itself.
pub struct PurchaseTracker<P> {
    dispatcher: EventDispatcher<P>,
}

impl<P> PurchaseTracker<P>
where
    P: ConfigProvider + 'static,
{
    pub fn new(dispatcher: EventDispatcher<P>) -> Self {
        Self { dispatcher }
    }

    /// Call after the confirmation has been committed. Each reportable order gets its own
    /// detached dispatch; callers may await the handles or drop them.
    pub fn track_confirmed(&self, orders: &[SaleOrder]) -> Vec<JoinHandle<bool>> {
        orders
            .iter()
            .filter_map(purchase_event)
            .map(|event| self.dispatcher.dispatch_detached(event))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::{CapiConfig, DispatcherSettings};
    use chrono::TimeZone;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn website_order() -> SaleOrder {
        SaleOrder {
            id: 42,
            name: "S00042".to_string(),
            website_order: true,
            state: OrderState::Sent,
            invoice_status: InvoiceStatus::No,
            partner: Partner {
                name: "Jane Doe".to_string(),
                email: Some(" Jane@Example.com ".to_string()),
                phone: Some("+1 555 0100".to_string()),
                mobile: None,
            },
            currency: "USD".to_string(),
            amount_total: 59.5,
            lines: vec![
                OrderLine {
                    product_id: Some(7),
                    product_name: "Mug".to_string(),
                    quantity: 2.0,
                    price_unit: 12.5,
                },
                OrderLine {
                    product_id: None,
                    product_name: "Shipping".to_string(),
                    quantity: 1.0,
                    price_unit: 34.5,
                },
            ],
            date_order: Some(Utc.timestamp_millis_opt(1_700_000_000_123).unwrap()),
            portal_url: Some("/my/orders/42".to_string()),
            whatsapp_msg_sent: false,
        }
    }

    #[test]
    fn test_correlation_id_format() {
        let mut order = website_order();
        assert_eq!(purchase_correlation_id(&order), "purchase_42_1700000000123");

        order.date_order = None;
        assert_eq!(purchase_correlation_id(&order), "purchase_42_");
    }

    #[test]
    fn test_purchase_event_contents() {
        let event = purchase_event(&website_order()).unwrap();

        assert_eq!(event.name, EventName::Purchase);
        assert_eq!(event.event_id.as_deref(), Some("purchase_42_1700000000123"));
        assert_eq!(
            event.user_data.get("em").unwrap(),
            "8c87b489ce35cf2e2f39f80e282cb2e804932a56a213983eeeb428407d43b52d"
        );
        assert!(event.user_data.get("ph").is_some());
        assert_eq!(event.custom_data["currency"], "USD");
        assert_eq!(event.custom_data["value"], 59.5);
        assert_eq!(event.custom_data["content_ids"], json!([7]));
        assert_eq!(event.custom_data["content_type"], "product");
        assert_eq!(event.custom_data["num_items"], 3.0);
    }

    #[test]
    fn test_mobile_preferred_over_phone() {
        let mut order = website_order();
        order.partner.mobile = Some("+15551234567".to_string());
        let event = purchase_event(&order).unwrap();
        assert_eq!(
            event.user_data.get("ph").unwrap(),
            "8a59780bb8cd2ba022bfa5ba2ea3b6e07af17a7d8b30c1f9b3390e36f69019e4"
        );
    }

    #[test]
    fn test_blank_mobile_falls_back_to_phone() {
        let partner = Partner {
            mobile: Some("   ".to_string()),
            phone: Some("+15550000000".to_string()),
            ..Partner::default()
        };
        assert_eq!(partner.contact_phone(), Some("+15550000000"));

        let partner = Partner {
            mobile: Some("\t".to_string()),
            ..Partner::default()
        };
        assert_eq!(partner.contact_phone(), None);
    }

    #[test]
    fn test_backend_order_is_skipped() {
        let mut order = website_order();
        order.website_order = false;
        assert!(purchase_event(&order).is_none());
    }

    #[test]
    fn test_order_without_identifiers_is_skipped() {
        let mut order = website_order();
        order.partner.email = Some("   ".to_string());
        order.partner.phone = None;
        assert!(purchase_event(&order).is_none());
    }

    #[test]
    fn test_order_deserializes_with_defaults() {
        let order: SaleOrder = serde_json::from_str(
            r#"{
                "id": 1,
                "name": "S00001",
                "partner": {"name": "Jo"},
                "currency": "EUR",
                "amount_total": 10.0
            }"#,
        )
        .unwrap();

        assert_eq!(order.state, OrderState::Draft);
        assert_eq!(order.invoice_status, InvoiceStatus::No);
        assert!(!order.website_order);
        assert!(order.lines.is_empty());
    }

    #[tokio::test]
    async fn test_tracker_dispatches_reportable_orders_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher = EventDispatcher::with_settings(
            CapiConfig::new("123", "token"),
            DispatcherSettings::default().with_base_url(server.uri()),
        );
        let tracker = PurchaseTracker::new(dispatcher);

        let mut backend = website_order();
        backend.website_order = false;

        let handles = tracker.track_confirmed(&[website_order(), backend]);
        assert_eq!(handles.len(), 1);
        for handle in handles {
            assert!(handle.await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_tracker_failure_stays_in_the_task() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dispatcher = EventDispatcher::with_settings(
            CapiConfig::new("123", "token"),
            DispatcherSettings::default().with_base_url(server.uri()),
        );
        let tracker = PurchaseTracker::new(dispatcher);

        for handle in tracker.track_confirmed(&[website_order()]) {
            assert!(!handle.await.unwrap());
        }
    }
}
