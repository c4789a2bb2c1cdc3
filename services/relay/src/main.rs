use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod bot;
mod channel;
mod messages;
mod relay;
mod telegram;

use common::{
    bindings::BindingStore,
    config::AppConfig,
    database::{health_check, init_pool, run_migrations},
};

use crate::relay::{Relay, RelaySettings};
use crate::telegram::TelegramClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Telegram relay");

    let config = AppConfig::load()?;
    let token = config
        .bot_token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .context("AEROBOOK_BOT_TOKEN is not set")?;

    // Initialize database connection pool
    let pool = init_pool(&config.database()).await?;
    run_migrations(&pool).await?;

    if !health_check(&pool).await {
        anyhow::bail!("Failed to connect to database");
    }

    let client = Arc::new(TelegramClient::new(
        &config.telegram_api_url,
        token,
        Duration::from_secs(config.send_timeout_secs.max(1)),
    )?);

    // Start the polling scheduler
    let relay = Relay::new(pool.clone(), client.clone(), RelaySettings::from(&config));
    let mut scheduler = relay.start_polling().await?;

    let listener = tokio::spawn(bot::run_update_listener(client, BindingStore::new(pool)));

    info!("Telegram relay started successfully");

    // Keep the service running
    tokio::signal::ctrl_c().await?;
    info!("Shutting down Telegram relay");

    listener.abort();
    scheduler.shutdown().await?;

    Ok(())
}
