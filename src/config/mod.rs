//! Configuration loading

pub mod settings;

pub use settings::{
    AccountSettings, BackfillSettings, DatabaseSettings, ExchangeSettings, Settings,
};
