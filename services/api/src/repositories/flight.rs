//! Flight repository

use common::error::{DatabaseError, DatabaseResult};
use sqlx::{Row, SqliteConnection, SqlitePool, sqlite::SqliteRow};

use crate::models::{booking::TicketStatus, flight::Flight};

const FLIGHT_SELECT: &str = r#"
    SELECT f.flight_id, f.flight_number, f.departure_city, f.arrival_city,
           f.flight_date, f.flight_time, f.base_price_usd, p.seat_capacity
    FROM flights f
    JOIN planes p ON p.plane_id = f.plane_id
"#;

/// Flight repository for database operations
#[derive(Clone)]
pub struct FlightRepository {
    pool: SqlitePool,
}

impl FlightRepository {
    /// Create a new flight repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Flights on a route and date, ordered by departure time
    pub async fn search(&self, from: &str, to: &str, date: &str) -> DatabaseResult<Vec<Flight>> {
        let rows = sqlx::query(&format!(
            "{} WHERE f.departure_city = ?1 AND f.arrival_city = ?2 AND f.flight_date = ?3 ORDER BY f.flight_time, f.flight_id",
            FLIGHT_SELECT
        ))
        .bind(from)
        .bind(to)
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(rows.iter().map(flight_from_row).collect())
    }

    /// Find a flight by ID
    pub async fn find(&self, flight_id: i64) -> DatabaseResult<Option<Flight>> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::Connection)?;
        Self::find_in(&mut conn, flight_id).await
    }

    /// Find a flight by ID on the caller's connection
    pub async fn find_in(
        conn: &mut SqliteConnection,
        flight_id: i64,
    ) -> DatabaseResult<Option<Flight>> {
        let row = sqlx::query(&format!("{} WHERE f.flight_id = ?1", FLIGHT_SELECT))
            .bind(flight_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(DatabaseError::Query)?;

        Ok(row.as_ref().map(flight_from_row))
    }

    /// Seats held by live tickets on a flight, with their ticket status
    pub async fn occupied_seats(&self, flight_id: i64) -> DatabaseResult<Vec<(String, TicketStatus)>> {
        let rows = sqlx::query(
            r#"
            SELECT seat_no, status
            FROM tickets
            WHERE flight_id = ?1 AND status <> 'cancelled'
            "#,
        )
        .bind(flight_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        rows.iter()
            .map(|row| {
                let status: String = row.get("status");
                Ok((row.get("seat_no"), status.parse()?))
            })
            .collect()
    }
}

fn flight_from_row(row: &SqliteRow) -> Flight {
    Flight {
        flight_id: row.get("flight_id"),
        flight_number: row.get("flight_number"),
        departure_city: row.get("departure_city"),
        arrival_city: row.get("arrival_city"),
        flight_date: row.get("flight_date"),
        flight_time: row.get("flight_time"),
        seat_capacity: row.get("seat_capacity"),
        base_price_usd: row.get("base_price_usd"),
    }
}
