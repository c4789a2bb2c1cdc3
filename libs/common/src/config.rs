//! Process-wide configuration
//!
//! Values come from built-in defaults overridden by `AEROBOOK_*` environment
//! variables, e.g. `AEROBOOK_DATABASE_URL` or `AEROBOOK_POLL_INTERVAL_SECS`.
//! The loaded [`AppConfig`] is split into per-component settings that are
//! passed explicitly to the pieces that need them.

use serde::Deserialize;
use std::time::Duration;

use crate::database::DatabaseConfig;

/// Environment variable prefix for every setting
pub const ENV_PREFIX: &str = "AEROBOOK";

/// Flat view of every setting the API and the relay read
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// SQLite connection URL
    pub database_url: String,
    /// Maximum number of pooled connections
    pub database_max_connections: u32,
    /// How long a writer waits for the SQLite write lock, in seconds
    pub database_busy_timeout_secs: u64,
    /// Bind address of the booking API
    pub api_host: String,
    /// Bind port of the booking API
    pub api_port: u16,
    /// Telegram bot token, required by the relay only
    #[serde(default)]
    pub bot_token: Option<String>,
    /// Base URL of the Telegram Bot API
    pub telegram_api_url: String,
    /// Relay polling interval in seconds
    pub poll_interval_secs: u64,
    /// Maximum rows handled per entity class per tick
    pub poll_batch_size: i64,
    /// Lifetime of a verification request in seconds (0 disables expiry)
    pub code_ttl_secs: u64,
    /// Failed sends after which a notification is given up
    pub max_delivery_attempts: i64,
    /// Timeout applied to every outbound channel call, in seconds
    pub send_timeout_secs: u64,
    /// Reject code requests for subjects that never started the bot
    pub require_binding_on_create: bool,
    /// Failed code confirmations allowed per subject inside the window
    pub confirm_max_attempts: u32,
    /// Window in which failed confirmations are counted, in seconds
    pub confirm_window_secs: u64,
    /// Lockout after too many failed confirmations, in seconds
    pub confirm_ban_secs: u64,
}

impl AppConfig {
    /// Load the configuration from defaults and the environment
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .set_default("database_url", "sqlite://aerobook.db")?
            .set_default("database_max_connections", 5)?
            .set_default("database_busy_timeout_secs", 30)?
            .set_default("api_host", "0.0.0.0")?
            .set_default("api_port", 1488)?
            .set_default("telegram_api_url", "https://api.telegram.org")?
            .set_default("poll_interval_secs", 2)?
            .set_default("poll_batch_size", 20)?
            .set_default("code_ttl_secs", 600)?
            .set_default("max_delivery_attempts", 10)?
            .set_default("send_timeout_secs", 10)?
            .set_default("require_binding_on_create", false)?
            .set_default("confirm_max_attempts", 5)?
            .set_default("confirm_window_secs", 300)?
            .set_default("confirm_ban_secs", 900)?
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Database settings
    pub fn database(&self) -> DatabaseConfig {
        DatabaseConfig {
            database_url: self.database_url.clone(),
            max_connections: self.database_max_connections,
            busy_timeout: Duration::from_secs(self.database_busy_timeout_secs),
        }
    }

    /// Verification-code lifetime, `None` when expiry is disabled
    pub fn code_ttl(&self) -> Option<Duration> {
        (self.code_ttl_secs > 0).then(|| Duration::from_secs(self.code_ttl_secs))
    }

    /// Address the API listens on
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}
