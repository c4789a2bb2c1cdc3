use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod error;
mod models;
mod rate_limiter;
mod repositories;
mod routes;
mod seats;
mod state;
mod validation;

use common::{
    config::AppConfig,
    database::{health_check, init_pool, run_migrations},
};
use tokio::net::TcpListener;

use crate::state::{ApiSettings, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting API service");

    let config = AppConfig::load()?;

    // Initialize database connection pool
    let pool = init_pool(&config.database()).await?;
    run_migrations(&pool).await?;

    // Check database connectivity
    if health_check(&pool).await {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let app_state = AppState::new(pool, ApiSettings::from(&config));

    // Start the web server
    let app = routes::create_router(app_state);

    let addr = config.api_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("API service listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
