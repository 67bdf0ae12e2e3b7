//! WhatsApp order confirmation.
//!
//! Decides when a customer gets the order confirmation template, renders the
//! order-specific placeholders and turns a tap on a confirm button into an order
//! confirmation. Delivery itself goes through a [`MessageTransport`].

use crate::orders::{InvoiceStatus, OrderState, SaleOrder};
use crate::prelude::Error;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Payment provider code for pay-on-site orders.
pub const PAY_ON_SITE_PROVIDER: &str = "manual";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: u64,
    pub name: String,
    pub auto_send_on_order: bool,
    pub status: TemplateStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateButton {
    pub name: String,
    /// A tap on this button confirms the linked order.
    pub confirms_order: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub reference: String,
    pub provider_code: String,
}

/// The first approved template flagged for automatic sending.
pub fn confirmation_template(templates: &[Template]) -> Option<&Template> {
    templates
        .iter()
        .find(|t| t.auto_send_on_order && t.status == TemplateStatus::Approved)
}

/// Renders a float the way the shop's message templates always have: whole values keep
/// one decimal (`25.0`), everything else uses the shortest representation (`12.5`).
fn display_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Value for an order-specific template placeholder; `None` leaves the path to the
/// template engine's generic field lookup.
pub fn placeholder_value(order: &SaleOrder, field_path: &str) -> Option<String> {
    match field_path {
        "amount" => Some(format!("{} {}", display_float(order.amount_total), order.currency)),
        "link" => order.portal_url.clone(),
        "order_summary" => Some(
            order
                .lines
                .iter()
                .map(|line| {
                    format!(
                        "- {}: {} x {} {}",
                        line.product_name,
                        display_float(line.quantity),
                        display_float(line.price_unit),
                        order.currency
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        _ => None,
    }
}

/// Sends an approved template to a phone number on behalf of an order.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send_template(
        &self,
        template: &Template,
        phone: &str,
        order: &SaleOrder,
    ) -> Result<(), Error>;
}

pub struct OrderNotifier<T> {
    transport: T,
    templates: Vec<Template>,
}

impl<T> OrderNotifier<T>
where
    T: MessageTransport,
{
    pub fn new(transport: T, templates: Vec<Template>) -> Self {
        Self {
            transport,
            templates,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends the confirmation and marks the order as notified. Failures are logged and
    /// reported as `false` so the surrounding order workflow carries on.
    pub async fn send_confirmation(&self, order: &mut SaleOrder) -> bool {
        info!("Starting WhatsApp send for order {}", order.name);

        match self.deliver(order).await {
            Ok(()) => {
                info!("WhatsApp confirmation successfully sent for order {}", order.name);
                true
            }
            Err(e @ (Error::NoTemplate | Error::MissingPhone(_))) => {
                warn!("WhatsApp confirmation for order {} not sent: {}", order.name, e);
                false
            }
            Err(e) => {
                error!("WhatsApp send failed for order {}: {}", order.name, e);
                false
            }
        }
    }

    /// Manually triggered send; every failure is returned to the operator.
    pub async fn send_manual(&self, order: &mut SaleOrder) -> Result<(), Error> {
        info!("Manual WhatsApp send triggered for order {}", order.name);
        self.deliver(order).await.inspect_err(|e| {
            warn!("Manual WhatsApp send failed for order {}: {}", order.name, e);
        })
    }

    /// Quotation e-mailed: website orders not yet notified also get the WhatsApp message.
    pub async fn on_quotation_sent(&self, orders: &mut [SaleOrder]) {
        for order in orders.iter_mut() {
            if order.website_order && !order.whatsapp_msg_sent {
                info!("Auto-sending WhatsApp for website order {}", order.name);
                self.send_confirmation(order).await;
            }
        }
    }

    /// Payment marked done: pay-on-site orders still waiting for confirmation are notified.
    pub async fn on_payment_done(&self, tx: &PaymentTransaction, orders: &mut [SaleOrder]) {
        info!("Transaction {} done (provider: {})", tx.reference, tx.provider_code);
        if tx.provider_code != PAY_ON_SITE_PROVIDER {
            return;
        }

        for order in orders.iter_mut() {
            if !awaits_pay_on_site_confirmation(order) {
                debug!("Order {} not eligible for a pay-on-site WhatsApp message", order.name);
                continue;
            }
            info!("Sending pay-on-site WhatsApp reminder for order {}", order.name);
            self.send_confirmation(order).await;
        }
    }

    async fn deliver(&self, order: &mut SaleOrder) -> Result<(), Error> {
        let template = confirmation_template(&self.templates).ok_or(Error::NoTemplate)?;
        let phone = order
            .partner
            .contact_phone()
            .ok_or_else(|| Error::MissingPhone(order.partner.name.clone()))?
            .to_string();

        self.transport.send_template(template, &phone, order).await?;
        order.whatsapp_msg_sent = true;
        Ok(())
    }
}

fn awaits_pay_on_site_confirmation(order: &SaleOrder) -> bool {
    order.website_order
        && order.state == OrderState::Sent
        && order.invoice_status == InvoiceStatus::No
        && !order.whatsapp_msg_sent
}

/// Who wrote a message in a WhatsApp conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    /// Written by the customer.
    Inbound,
    /// Written by an operator or by the shop itself.
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Outbound,
    EmptyMessage,
    NotConfirmButton,
    NoLinkedOrder,
    AlreadyProcessed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonTap {
    Confirm(u64),
    Ignored(IgnoreReason),
}

/// Resolves a button reply. Only customer messages count. `order` is the order the
/// confirmation template was sent for, if the conversation is linked to one.
pub fn resolve_button_tap(
    direction: MessageDirection,
    text: &str,
    buttons: &[TemplateButton],
    order: Option<&SaleOrder>,
) -> ButtonTap {
    if direction != MessageDirection::Inbound {
        return ButtonTap::Ignored(IgnoreReason::Outbound);
    }
    let text = text.trim();
    if text.is_empty() {
        return ButtonTap::Ignored(IgnoreReason::EmptyMessage);
    }
    if !buttons.iter().any(|b| b.confirms_order && b.name == text) {
        return ButtonTap::Ignored(IgnoreReason::NotConfirmButton);
    }
    let Some(order) = order else {
        debug!("WhatsApp button tap '{}' not applied: conversation not linked to an order", text);
        return ButtonTap::Ignored(IgnoreReason::NoLinkedOrder);
    };
    if !matches!(order.state, OrderState::Draft | OrderState::Sent) {
        info!(
            "WhatsApp confirm button tap for order {} ignored: state is {:?}",
            order.name, order.state
        );
        return ButtonTap::Ignored(IgnoreReason::AlreadyProcessed);
    }
    ButtonTap::Confirm(order.id)
}
