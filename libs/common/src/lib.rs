//! Common library for the Aerobook services
//!
//! This crate holds everything the booking API and the Telegram relay share:
//! configuration, the SQLite pool and schema, and the stores for verification
//! requests, notifications and channel bindings. The two processes never talk
//! to each other directly, the tables below are their only interface.
//!
//! ```rust,no_run
//! use common::config::AppConfig;
//! use common::database::{health_check, init_pool, run_migrations};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let pool = init_pool(&config.database()).await?;
//!     run_migrations(&pool).await?;
//!     println!("Database health check: {}", health_check(&pool).await);
//!     Ok(())
//! }
//! ```

pub mod bindings;
pub mod config;
pub mod database;
pub mod error;
pub mod format;
pub mod models;
pub mod notifications;
pub mod verification;
