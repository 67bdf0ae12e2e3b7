pub mod client;
pub mod orders;
pub mod prelude;
pub mod whatsapp;

pub use client::EventDispatcher;
pub use prelude::{
    CapiConfig, ConfigProvider, ConversionEvent, DispatchOutcome, DispatcherSettings,
    EnvConfigProvider, Error, EventName, Result, UserData,
};
