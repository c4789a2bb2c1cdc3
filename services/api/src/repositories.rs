//! Repositories for database operations
//!
//! Reads go through the pool. Writes take the caller's connection so they
//! join the transaction that also consumes the verification code.

use chrono::Utc;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{Row, SqliteConnection, SqlitePool, sqlite::SqliteRow};

use crate::models::{Passenger, auth::NewPassenger};

pub mod flight;
pub mod ticket;

const PASSENGER_COLUMNS: &str = "subject, last_name, first_name, middle_name, passport_no, phone, email, created_at, updated_at";

/// Passenger repository for database operations
#[derive(Clone)]
pub struct PassengerRepository {
    pool: SqlitePool,
}

impl PassengerRepository {
    /// Create a new passenger repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find a passenger by subject
    pub async fn find(&self, subject: &str) -> DatabaseResult<Option<Passenger>> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::Connection)?;
        Self::find_in(&mut conn, subject).await
    }

    /// Find a passenger by subject on the caller's connection
    pub async fn find_in(
        conn: &mut SqliteConnection,
        subject: &str,
    ) -> DatabaseResult<Option<Passenger>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM passengers WHERE subject = ?1",
            PASSENGER_COLUMNS
        ))
        .bind(subject)
        .fetch_optional(&mut *conn)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(row.as_ref().map(passenger_from_row))
    }

    /// Create the passenger or overwrite the details of an existing one
    pub async fn upsert(
        conn: &mut SqliteConnection,
        subject: &str,
        passenger: &NewPassenger,
    ) -> DatabaseResult<Passenger> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO passengers (subject, last_name, first_name, middle_name, passport_no, phone, email, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            ON CONFLICT (subject) DO UPDATE SET
                last_name = excluded.last_name,
                first_name = excluded.first_name,
                middle_name = excluded.middle_name,
                passport_no = excluded.passport_no,
                phone = excluded.phone,
                email = excluded.email,
                updated_at = excluded.updated_at
            RETURNING {}
            "#,
            PASSENGER_COLUMNS
        ))
        .bind(subject)
        .bind(&passenger.last_name)
        .bind(&passenger.first_name)
        .bind(&passenger.middle_name)
        .bind(&passenger.passport_no)
        .bind(&passenger.phone)
        .bind(&passenger.email)
        .bind(now)
        .fetch_one(&mut *conn)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(passenger_from_row(&row))
    }
}

fn passenger_from_row(row: &SqliteRow) -> Passenger {
    Passenger {
        subject: row.get("subject"),
        last_name: row.get("last_name"),
        first_name: row.get("first_name"),
        middle_name: row.get("middle_name"),
        passport_no: row.get("passport_no"),
        phone: row.get("phone"),
        email: row.get("email"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
