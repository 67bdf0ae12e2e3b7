mod publisher;

use crate::prelude::{
    CapiConfig, ConfigProvider, ConversionEvent, DispatchOutcome, DispatcherSettings, Error,
};
use reqwest::Client;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Sends single conversion events to the Meta Conversions API.
///
/// Every call reads configuration from the provider, performs at most one POST and
/// never retries. Sending the same event twice produces two remote events unless the
/// platform deduplicates them by `event_id`.
pub struct EventDispatcher<P> {
    provider: Arc<P>,
    settings: DispatcherSettings,
    client: Arc<Client>,
}

impl<P> Clone for EventDispatcher<P> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            settings: self.settings.clone(),
            client: self.client.clone(),
        }
    }
}

impl<P> EventDispatcher<P>
where
    P: ConfigProvider,
{
    pub fn new(provider: P) -> Self {
        Self::with_settings(provider, DispatcherSettings::default())
    }

    pub fn with_settings(provider: P, settings: DispatcherSettings) -> Self {
        Self {
            provider: Arc::new(provider),
            settings,
            client: Arc::new(Client::new()),
        }
    }

    pub fn settings(&self) -> &DispatcherSettings {
        &self.settings
    }

    /// Sends `event`, surfacing every failure to the caller.
    ///
    /// Returns `Ok(DispatchOutcome::Skipped)` without touching the network when the
    /// integration is disabled. `test_event_code` overrides the configured one.
    pub async fn send_event(
        &self,
        event: &ConversionEvent,
        test_event_code: Option<&str>,
    ) -> Result<DispatchOutcome, Error> {
        let config = self.provider.current();
        if !config.enabled {
            info!("Meta Conversions API disabled in configuration; skipping {} event", event.name);
            return Ok(DispatchOutcome::Skipped);
        }

        let (pixel_id, access_token) = credentials(&config)?;

        let event_name = event.name.to_string();
        if event_name.trim().is_empty() {
            return Err(Error::InvalidEvent("event name must not be empty".to_string()));
        }

        let url = self.settings.events_url(pixel_id);
        let mut params = vec![("access_token", access_token)];
        if let Some(code) = config.resolve_test_event_code(test_event_code) {
            params.push(("test_event_code", code));
        }

        let outcome = publisher::post_batch(&self.client, &url, &params, &event.to_batch()).await?;
        if let DispatchOutcome::Delivered { body, .. } = &outcome {
            info!("Meta Conversions API {} event sent successfully: {}", event_name, body);
        }

        Ok(outcome)
    }

    /// Fire-and-forget flavour of [`send_event`](Self::send_event): failures are logged and
    /// reported as `false`, never returned.
    pub async fn send_event_or_log(
        &self,
        event: &ConversionEvent,
        test_event_code: Option<&str>,
    ) -> bool {
        match self.send_event(event, test_event_code).await {
            Ok(outcome) => outcome.is_delivered(),
            Err(e @ Error::Config(_)) => {
                warn!("{}", e);
                false
            }
            Err(e) => {
                error!("Failed to send {} event to Meta Conversions API: {}", event.name, e);
                false
            }
        }
    }
}

impl<P> EventDispatcher<P>
where
    P: ConfigProvider + 'static,
{
    /// Runs the send as its own task so the caller's transaction neither waits on it nor
    /// fails because of it. The handle resolves to the same value as `send_event_or_log`.
    pub fn dispatch_detached(&self, event: ConversionEvent) -> JoinHandle<bool> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.send_event_or_log(&event, None).await })
    }
}

fn credentials(config: &CapiConfig) -> Result<(&str, &str), Error> {
    config.credentials().ok_or_else(|| {
        Error::Config(
            "Meta Conversions API is not fully configured; set the pixel id and access token"
                .to_string(),
        )
    })
}
