//! Application state shared across handlers

use common::{config::AppConfig, verification::VerificationStore};
use sqlx::SqlitePool;
use std::time::Duration;

use crate::{
    rate_limiter::{RateLimiter, RateLimiterConfig},
    repositories::{PassengerRepository, flight::FlightRepository, ticket::TicketRepository},
};

/// Settings the handlers read
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Lifetime of a verification code, `None` disables expiry
    pub code_ttl: Option<Duration>,
    /// Refuse to issue codes to subjects that never started the bot
    pub require_binding_on_create: bool,
    /// Limits on failed code confirmations
    pub rate_limiter: RateLimiterConfig,
}

impl From<&AppConfig> for ApiSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            code_ttl: config.code_ttl(),
            require_binding_on_create: config.require_binding_on_create,
            rate_limiter: RateLimiterConfig {
                max_attempts: config.confirm_max_attempts.max(1),
                window_seconds: config.confirm_window_secs,
                ban_duration_seconds: config.confirm_ban_secs,
            },
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub passenger_repository: PassengerRepository,
    pub flight_repository: FlightRepository,
    pub ticket_repository: TicketRepository,
    pub verification_store: VerificationStore,
    pub rate_limiter: RateLimiter,
    pub settings: ApiSettings,
}

impl AppState {
    pub fn new(pool: SqlitePool, settings: ApiSettings) -> Self {
        Self {
            passenger_repository: PassengerRepository::new(pool.clone()),
            flight_repository: FlightRepository::new(pool.clone()),
            ticket_repository: TicketRepository::new(pool.clone()),
            verification_store: VerificationStore::new(pool.clone()),
            rate_limiter: RateLimiter::new(settings.rate_limiter.clone()),
            db_pool: pool,
            settings,
        }
    }
}
