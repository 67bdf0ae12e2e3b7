#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")] Config(String),

    #[error("delivery error{}: {message}", status_suffix(.status))]
    Delivery {
        status: Option<u16>,
        message: String,
    },

    #[error("unexpected error: {0}")] Unexpected(String),

    #[error("invalid event: {0}")] InvalidEvent(String),

    #[error("no WhatsApp template is configured for auto-send")]
    NoTemplate,

    #[error("customer {0} has no phone number")] MissingPhone(String),

    #[error("transport error: {0}")] Transport(String),

    #[error("serialization error: {0}")] Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")] Io(#[from] std::io::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" [{s}]")).unwrap_or_default()
}

impl Error {
    /// Classifies a failed request the same way for every call site: anything that never
    /// produced a usable response from the remote side is a delivery failure.
    pub(crate) fn from_request(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_status() {
            Error::Delivery {
                status: err.status().map(|s| s.as_u16()),
                message: err.to_string(),
            }
        } else {
            Error::Unexpected(err.to_string())
        }
    }
}
