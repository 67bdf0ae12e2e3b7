use crate::prelude::hashing::UserData;
use chrono::Utc;
use derive_more::Display;
use serde::Serialize;
use serde_json::{Map, Value};
use std::str::FromStr;

pub const ACTION_SOURCE_WEBSITE: &str = "website";

/// Standard Meta event names. Anything else travels as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum EventName {
    PageView,
    ViewContent,
    AddToCart,
    InitiateCheckout,
    AddPaymentInfo,
    Purchase,
    Lead,
    CompleteRegistration,
    Contact,
    Search,
    Custom(String),
}

impl FromStr for EventName {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "PageView" => EventName::PageView,
            "ViewContent" => EventName::ViewContent,
            "AddToCart" => EventName::AddToCart,
            "InitiateCheckout" => EventName::InitiateCheckout,
            "AddPaymentInfo" => EventName::AddPaymentInfo,
            "Purchase" => EventName::Purchase,
            "Lead" => EventName::Lead,
            "CompleteRegistration" => EventName::CompleteRegistration,
            "Contact" => EventName::Contact,
            "Search" => EventName::Search,
            other => EventName::Custom(other.to_string()),
        })
    }
}

impl From<&str> for EventName {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(name) => name,
            Err(never) => match never {},
        }
    }
}

/// A single server-side conversion event, built by the caller and discarded once sent.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionEvent {
    pub name: EventName,
    /// Seconds since the epoch. Absent or non-positive means "now" at send time.
    pub event_time: Option<i64>,
    /// Deduplication id shared with the browser pixel event for the same action.
    pub event_id: Option<String>,
    pub user_data: UserData,
    pub custom_data: Map<String, Value>,
}

impl ConversionEvent {
    pub fn new(name: impl Into<EventName>) -> Self {
        Self {
            name: name.into(),
            event_time: None,
            event_id: None,
            user_data: UserData::default(),
            custom_data: Map::new(),
        }
    }

    pub fn with_event_time(mut self, event_time: i64) -> Self {
        self.event_time = Some(event_time);
        self
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    pub fn with_user_data(mut self, user_data: UserData) -> Self {
        self.user_data = user_data;
        self
    }

    pub fn with_custom_data(mut self, custom_data: Map<String, Value>) -> Self {
        self.custom_data = custom_data;
        self
    }

    /// Wraps the event into the single-element batch the API expects.
    pub(crate) fn to_batch(&self) -> EventBatch<'_> {
        let event_time = self
            .event_time
            .filter(|t| *t > 0)
            .unwrap_or_else(|| Utc::now().timestamp());

        EventBatch {
            data: [ServerEvent {
                event_name: self.name.to_string(),
                event_time,
                event_id: self.event_id.as_deref().filter(|id| !id.is_empty()),
                action_source: ACTION_SOURCE_WEBSITE,
                user_data: &self.user_data,
                custom_data: &self.custom_data,
            }],
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct EventBatch<'a> {
    pub data: [ServerEvent<'a>; 1],
}

#[derive(Debug, Serialize)]
pub(crate) struct ServerEvent<'a> {
    pub event_name: String,
    pub event_time: i64,
    // The API rejects empty or null ids, so the key is left out entirely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<&'a str>,
    pub action_source: &'static str,
    pub user_data: &'a UserData,
    pub custom_data: &'a Map<String, Value>,
}

/// What happened to an event that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The integration is switched off; nothing was sent.
    Skipped,
    Delivered { status: u16, body: String },
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_name_round_trip() {
        assert_eq!(EventName::from("Purchase"), EventName::Purchase);
        assert_eq!(EventName::Purchase.to_string(), "Purchase");
        assert_eq!(
            EventName::from("SubscribeNewsletter"),
            EventName::Custom("SubscribeNewsletter".to_string())
        );
        assert_eq!(
            EventName::Custom("SubscribeNewsletter".to_string()).to_string(),
            "SubscribeNewsletter"
        );
    }

    #[test]
    fn test_batch_omits_missing_event_id() {
        let event = ConversionEvent::new(EventName::PageView).with_event_time(1_700_000_000);
        let json = serde_json::to_value(event.to_batch()).unwrap();

        let data = json["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert!(data[0].get("event_id").is_none());
        assert_eq!(data[0]["event_time"], 1_700_000_000);
        assert_eq!(data[0]["action_source"], "website");
        assert_eq!(data[0]["user_data"], json!({}));
        assert_eq!(data[0]["custom_data"], json!({}));
    }

    #[test]
    fn test_batch_omits_empty_event_id() {
        let event = ConversionEvent::new(EventName::Lead).with_event_id("");
        let json = serde_json::to_value(event.to_batch()).unwrap();
        assert!(json["data"][0].get("event_id").is_none());
    }

    #[test]
    fn test_batch_keeps_event_id() {
        let event = ConversionEvent::new(EventName::Purchase).with_event_id("purchase_7_1000");
        let json = serde_json::to_value(event.to_batch()).unwrap();
        assert_eq!(json["data"][0]["event_id"], "purchase_7_1000");
    }

    #[test]
    fn test_missing_or_non_positive_time_defaults_to_now() {
        let implicit = ConversionEvent::new(EventName::PageView);
        let zero = ConversionEvent::new(EventName::PageView).with_event_time(0);

        let before = Utc::now().timestamp();
        let batches = [implicit.to_batch(), zero.to_batch()];
        let after = Utc::now().timestamp();

        for batch in batches {
            let t = batch.data[0].event_time;
            assert!(t >= before && t <= after);
        }
    }

    #[test]
    fn test_dispatch_outcome() {
        assert!(!DispatchOutcome::Skipped.is_delivered());
        assert!(DispatchOutcome::Delivered {
            status: 200,
            body: String::new()
        }
        .is_delivered());
    }
}
