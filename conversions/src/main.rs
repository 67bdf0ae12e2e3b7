use clap::{Parser, Subcommand};
use conversions::orders::{purchase_event, SaleOrder};
use conversions::prelude::config::ENV_ENABLED;
use conversions::prelude::{
    ConversionEvent, DispatchOutcome, DispatcherSettings, EnvConfigProvider, Error, UserData,
};
use conversions::EventDispatcher;
use dotenv::dotenv;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Sends conversion events to the Meta Conversions API using the META_CAPI_* settings.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Graph API base url
    #[arg(long, env = "META_CAPI_BASE_URL", default_value = "https://graph.facebook.com")]
    base_url: String,

    /// Graph API version
    #[arg(long, env = "META_CAPI_API_VERSION", default_value = "v17.0")]
    api_version: String,

    /// Test event code from Events Manager, overrides META_CAPI_TEST_EVENT_CODE
    #[arg(long, global = true)]
    test_event_code: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a single event
    Send {
        /// Event name, e.g. PageView, Purchase, AddToCart
        event_name: String,

        /// Deduplication id shared with the browser pixel event
        #[arg(long)]
        event_id: Option<String>,

        /// Unix timestamp in seconds, defaults to now
        #[arg(long)]
        event_time: Option<i64>,

        /// Customer email, normalized and hashed before sending
        #[arg(long)]
        email: Option<String>,

        /// Customer phone, normalized and hashed before sending
        #[arg(long)]
        phone: Option<String>,

        /// Extra user data as a JSON object, sent as given
        #[arg(long)]
        user_data: Option<String>,

        /// Custom data as a JSON object
        #[arg(long)]
        custom_data: Option<String>,
    },
    /// Send the Purchase event for an order read from a JSON file
    Purchase { order: PathBuf },
}

fn json_object(raw: Option<&str>) -> Result<Map<String, Value>, Error> {
    match raw {
        None => Ok(Map::new()),
        Some(raw) => match serde_json::from_str(raw)? {
            Value::Object(map) => Ok(map),
            _ => Err(Error::InvalidEvent(format!("expected a JSON object, got {}", raw))),
        },
    }
}

fn build_event(command: Command) -> Result<Option<ConversionEvent>, Error> {
    match command {
        Command::Send {
            event_name,
            event_id,
            event_time,
            email,
            phone,
            user_data,
            custom_data,
        } => {
            let user_data = UserData::from(json_object(user_data.as_deref())?)
                .hashed("em", email.as_deref())
                .hashed("ph", phone.as_deref());

            let mut event = ConversionEvent::new(event_name.as_str())
                .with_user_data(user_data)
                .with_custom_data(json_object(custom_data.as_deref())?);
            event.event_id = event_id;
            event.event_time = event_time;
            Ok(Some(event))
        }
        Command::Purchase { order } => {
            let order: SaleOrder = serde_json::from_str(&std::fs::read_to_string(order)?)?;
            Ok(purchase_event(&order))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = DispatcherSettings::default()
        .with_base_url(cli.base_url)
        .with_api_version(cli.api_version);
    let dispatcher = EventDispatcher::with_settings(EnvConfigProvider, settings);

    let Some(event) = build_event(cli.command)? else {
        info!("Order is not reportable; nothing sent");
        return Ok(());
    };

    match dispatcher.send_event(&event, cli.test_event_code.as_deref()).await? {
        DispatchOutcome::Skipped => info!("Conversions API disabled; set {}=true", ENV_ENABLED),
        DispatchOutcome::Delivered { status, body } => info!("Delivered [{}]: {}", status, body),
    }

    Ok(())
}
