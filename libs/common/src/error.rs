//! Custom error types for the common library
//!
//! This module defines the store-level error type shared by the API and the
//! relay.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),

    /// A stored value could not be mapped back into its domain type
    #[error("Database decode error: {0}")]
    Decode(String),
}

impl DatabaseError {
    /// True when the query failed on a UNIQUE constraint (e.g. a seat that is
    /// already occupied on a flight)
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DatabaseError::Query(e) => e
                .as_database_error()
                .map(|db| db.is_unique_violation())
                .unwrap_or(false),
            _ => false,
        }
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;
