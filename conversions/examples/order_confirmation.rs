use async_trait::async_trait;
use chrono::Utc;
use conversions::orders::{OrderLine, OrderState, Partner, PurchaseTracker, SaleOrder};
use conversions::prelude::{EnvConfigProvider, Error};
use conversions::whatsapp::{
    placeholder_value, MessageTransport, OrderNotifier, Template, TemplateStatus,
};
use conversions::EventDispatcher;
use tracing::info;

// Stands in for the shop's WhatsApp composer
struct LoggingTransport;

#[async_trait]
impl MessageTransport for LoggingTransport {
    async fn send_template(
        &self,
        template: &Template,
        phone: &str,
        order: &SaleOrder,
    ) -> Result<(), Error> {
        info!(
            "Template '{}' to {}:\n{}",
            template.name,
            phone,
            placeholder_value(order, "order_summary").unwrap_or_default()
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let mut order = SaleOrder {
        id: 1001,
        name: "S01001".to_string(),
        website_order: true,
        state: OrderState::Sent,
        partner: Partner {
            name: "Jane Doe".to_string(),
            email: Some("jane@example.com".to_string()),
            mobile: Some("+1 555 0100".to_string()),
            ..Default::default()
        },
        currency: "USD".to_string(),
        amount_total: 42.0,
        lines: vec![OrderLine {
            product_id: Some(17),
            product_name: "Espresso beans 1kg".to_string(),
            quantity: 2.0,
            price_unit: 21.0,
        }],
        date_order: Some(Utc::now()),
        ..Default::default()
    };

    // The order confirmation has been committed at this point
    order.state = OrderState::Sale;

    let tracker = PurchaseTracker::new(EventDispatcher::new(EnvConfigProvider));
    let handles = tracker.track_confirmed(std::slice::from_ref(&order));

    let notifier = OrderNotifier::new(
        LoggingTransport,
        vec![Template {
            id: 1,
            name: "order_confirmation".to_string(),
            auto_send_on_order: true,
            status: TemplateStatus::Approved,
        }],
    );
    notifier.send_confirmation(&mut order).await;

    for handle in handles {
        let delivered = handle.await.unwrap_or(false);
        info!("Purchase event delivered: {}", delivered);
    }
}
