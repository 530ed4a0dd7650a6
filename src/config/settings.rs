//! Application settings and configuration

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::backfill::BackfillConfig;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Database configuration
    pub database: DatabaseSettings,
    /// Exchange REST API configuration
    #[serde(default)]
    pub exchange: ExchangeSettings,
    /// Accounts to backfill, in processing order
    pub accounts: Vec<AccountSettings>,
    /// Pacing and retry policy
    #[serde(default)]
    pub backfill: BackfillSettings,
}

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    2
}

/// Exchange REST API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeSettings {
    /// REST base URL
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
    /// Signed-request validity window in milliseconds
    #[serde(default = "default_recv_window")]
    pub recv_window_ms: u64,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_rest_url() -> String {
    "https://fapi.binance.com".to_string()
}

fn default_recv_window() -> u64 {
    5000
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            rest_url: default_rest_url(),
            recv_window_ms: default_recv_window(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// One exchange account's credentials.
///
/// `name` labels every persisted row and scopes resume cursors, so renaming
/// an account restarts its backfill from zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSettings {
    pub name: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Pacing and retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillSettings {
    /// Records requested per page
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    /// Delay between page fetches for one symbol, milliseconds
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    /// Cool-down after a failed symbol, milliseconds
    #[serde(default = "default_error_cooldown_ms")]
    pub error_cooldown_ms: u64,
    /// Delay between empty-universe discovery retries, milliseconds
    #[serde(default = "default_discovery_retry_delay_ms")]
    pub discovery_retry_delay_ms: u64,
    /// Store readiness probe attempts at startup
    #[serde(default = "default_readiness_attempts")]
    pub readiness_attempts: u32,
}

fn default_page_limit() -> u32 {
    1000
}

fn default_page_delay_ms() -> u64 {
    1000
}

fn default_error_cooldown_ms() -> u64 {
    1000
}

fn default_discovery_retry_delay_ms() -> u64 {
    1000
}

fn default_readiness_attempts() -> u32 {
    5
}

impl Default for BackfillSettings {
    fn default() -> Self {
        Self {
            page_limit: default_page_limit(),
            page_delay_ms: default_page_delay_ms(),
            error_cooldown_ms: default_error_cooldown_ms(),
            discovery_retry_delay_ms: default_discovery_retry_delay_ms(),
            readiness_attempts: default_readiness_attempts(),
        }
    }
}

impl From<&BackfillSettings> for BackfillConfig {
    fn from(settings: &BackfillSettings) -> Self {
        BackfillConfig {
            page_limit: settings.page_limit,
            page_delay: Duration::from_millis(settings.page_delay_ms),
            error_cooldown: Duration::from_millis(settings.error_cooldown_ms),
            discovery_retry_delay: Duration::from_millis(settings.discovery_retry_delay_ms),
            readiness_attempts: settings.readiness_attempts,
            ..BackfillConfig::default()
        }
    }
}

impl Settings {
    /// Load settings from configuration files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_prefix("TRADE_ARCHIVER")
    }

    /// Load settings with a custom environment variable prefix
    pub fn load_with_prefix(env_prefix: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config_dir = Self::config_dir();

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            // Add environment-specific configuration
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Add local overrides (not checked into git)
            .add_source(File::with_name(&format!("{}/local", config_dir)).required(false))
            // Add environment variables (e.g., TRADE_ARCHIVER__DATABASE__URL)
            .add_source(
                Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn config_dir() -> String {
        std::env::var("TRADE_ARCHIVER_CONFIG_DIR").unwrap_or_else(|_| "config".into())
    }

    /// Reject settings that would silently misbehave at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.accounts.is_empty() {
            return Err(ConfigError::Message(
                "at least one account must be configured".to_string(),
            ));
        }

        let mut names: Vec<&str> = self.accounts.iter().map(|a| a.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.accounts.len() {
            return Err(ConfigError::Message(
                "account names must be unique".to_string(),
            ));
        }

        for account in &self.accounts {
            if account.name.is_empty() {
                return Err(ConfigError::Message(
                    "account name must not be empty".to_string(),
                ));
            }
        }

        if self.backfill.page_limit == 0 {
            return Err(ConfigError::Message(
                "backfill.page_limit must be positive".to_string(),
            ));
        }

        if self.backfill.readiness_attempts == 0 {
            return Err(ConfigError::Message(
                "backfill.readiness_attempts must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
