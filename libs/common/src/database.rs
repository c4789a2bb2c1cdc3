//! Database module for handling SQLite connections and operations
//!
//! This module provides connection pooling, configuration, the embedded
//! schema migrations and health checks for the shared SQLite database.

use crate::error::{DatabaseError, DatabaseResult};
use sqlx::SqlitePool;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info};

/// Schema shared by the API and the relay
static MIGRATOR: Migrator = sqlx::migrate!();

/// Database configuration struct
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// How long a connection waits on a locked database before failing
    pub busy_timeout: Duration,
}

/// Initialize a SQLite connection pool
///
/// The database file is created when missing. Connections run in WAL mode
/// with foreign keys enforced.
pub async fn init_pool(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    info!("Initializing database connection pool");

    let options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(|e| DatabaseError::Configuration(format!("Invalid database URL: {}", e)))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(config.busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.busy_timeout)
        .connect_with(options)
        .await
        .map_err(DatabaseError::Connection)?;

    info!("Database connection pool initialized successfully");
    Ok(pool)
}

/// Apply the embedded migrations
pub async fn run_migrations(pool: &SqlitePool) -> DatabaseResult<()> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;

    info!("Database schema is up to date");
    Ok(())
}

/// Check database connectivity
///
/// Returns `false` instead of an error so callers can report the state.
pub async fn health_check(pool: &SqlitePool) -> bool {
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => true,
        Err(e) => {
            error!("Database health check failed: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    fn temp_config() -> DatabaseConfig {
        let path = std::env::temp_dir().join(format!("aerobook-db-{}.db", uuid::Uuid::new_v4()));
        DatabaseConfig {
            database_url: format!("sqlite://{}", path.display()),
            max_connections: 2,
            busy_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_init_pool_and_migrate() -> Result<(), Box<dyn std::error::Error>> {
        let pool = init_pool(&temp_config()).await?;
        run_migrations(&pool).await?;
        assert!(health_check(&pool).await);

        // Reference data is seeded by the migrations
        let row = sqlx::query("SELECT COUNT(*) AS planes FROM planes")
            .fetch_one(&pool)
            .await?;
        let planes: i64 = row.get("planes");
        assert_eq!(planes, 3);

        // Running twice is a no-op
        run_migrations(&pool).await?;
        Ok(())
    }
}
