pub mod config;
pub mod error;
pub mod hashing;
pub mod models;

pub use config::{CapiConfig, ConfigProvider, DispatcherSettings, EnvConfigProvider};
pub use error::Error;
pub use hashing::{normalize_and_hash, UserData};
pub use models::{ConversionEvent, DispatchOutcome, EventName};

pub type Result<T> = std::result::Result<T, Error>;
