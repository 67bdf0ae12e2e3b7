use std::fmt;
use std::time::Duration;
use tokio::sync::watch;

pub const ENV_ENABLED: &str = "META_CAPI_ENABLED";
pub const ENV_PIXEL_ID: &str = "META_CAPI_PIXEL_ID";
pub const ENV_ACCESS_TOKEN: &str = "META_CAPI_ACCESS_TOKEN";
pub const ENV_TEST_EVENT_CODE: &str = "META_CAPI_TEST_EVENT_CODE";

/// Upper bound for a single round trip to the Conversions API. Not a retry budget.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Conversions API settings as maintained by the settings collaborator.
#[derive(Clone, Default, PartialEq)]
pub struct CapiConfig {
    pub enabled: bool,
    pub pixel_id: Option<String>,
    pub access_token: Option<String>,
    pub test_event_code: Option<String>,
}

impl CapiConfig {
    pub fn new(pixel_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            enabled: true,
            pixel_id: Some(pixel_id.into()),
            access_token: Some(access_token.into()),
            test_event_code: None,
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_test_event_code(mut self, code: impl Into<String>) -> Self {
        self.test_event_code = Some(code.into());
        self
    }

    /// Pixel id and access token, if both are present and non-blank.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let pixel_id = non_blank(self.pixel_id.as_deref())?;
        let access_token = non_blank(self.access_token.as_deref())?;
        Some((pixel_id, access_token))
    }

    /// The call-time code wins over the configured default; blank codes count as unset.
    pub fn resolve_test_event_code<'a>(&'a self, call_time: Option<&'a str>) -> Option<&'a str> {
        non_blank(call_time).or_else(|| non_blank(self.test_event_code.as_deref()))
    }
}

impl fmt::Debug for CapiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapiConfig")
            .field("enabled", &self.enabled)
            .field("pixel_id", &self.pixel_id)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("test_event_code", &self.test_event_code)
            .finish()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Parses the enable flag the way the settings store writes it.
pub fn parse_enabled(value: &str) -> bool {
    matches!(value.trim(), "True" | "true" | "1")
}

/// Source of [`CapiConfig`]. The dispatcher asks for a fresh copy on every send and never
/// caches it, so changes made by the settings collaborator apply to the next event.
pub trait ConfigProvider: Send + Sync {
    fn current(&self) -> CapiConfig;
}

impl ConfigProvider for CapiConfig {
    fn current(&self) -> CapiConfig {
        self.clone()
    }
}

/// Lets a settings collaborator publish updates through a `watch` channel.
impl ConfigProvider for watch::Receiver<CapiConfig> {
    fn current(&self) -> CapiConfig {
        self.borrow().clone()
    }
}

/// Reads the `META_CAPI_*` variables from the process environment on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvConfigProvider;

impl ConfigProvider for EnvConfigProvider {
    fn current(&self) -> CapiConfig {
        CapiConfig {
            enabled: std::env::var(ENV_ENABLED)
                .map(|v| parse_enabled(&v))
                .unwrap_or(false),
            pixel_id: std::env::var(ENV_PIXEL_ID).ok(),
            access_token: std::env::var(ENV_ACCESS_TOKEN).ok(),
            test_event_code: std::env::var(ENV_TEST_EVENT_CODE).ok(),
        }
    }
}

/// Where events are posted. Only tests and staging setups should need to override it.
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub base_url: String,
    pub api_version: String,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            base_url: "https://graph.facebook.com".to_string(),
            api_version: "v17.0".to_string(),
        }
    }
}

impl DispatcherSettings {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn events_url(&self, pixel_id: &str) -> String {
        format!(
            "{}/{}/{}/events",
            self.base_url.trim_end_matches('/'),
            self.api_version,
            pixel_id
        )
    }
}
