//! Ticket repository

use chrono::Utc;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{Row, SqliteConnection, SqlitePool, sqlite::SqliteRow};

use crate::models::booking::Ticket;

const TICKET_SELECT: &str = r#"
    SELECT t.ticket_id, t.flight_id, f.flight_number, f.departure_city, f.arrival_city,
           f.flight_date, f.flight_time, t.seat_no, t.price_usd, t.status, t.created_at
    FROM tickets t
    JOIN flights f ON f.flight_id = t.flight_id
"#;

/// Ticket repository for database operations
#[derive(Clone)]
pub struct TicketRepository {
    pool: SqlitePool,
}

impl TicketRepository {
    /// Create a new ticket repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Tickets of a subject, ordered by departure
    pub async fn list_for_subject(&self, subject: &str) -> DatabaseResult<Vec<Ticket>> {
        let rows = sqlx::query(&format!(
            "{} WHERE t.subject = ?1 ORDER BY f.flight_date, f.flight_time, t.ticket_id",
            TICKET_SELECT
        ))
        .bind(subject)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        rows.iter().map(ticket_from_row).collect()
    }

    /// Whether a live ticket holds the seat
    pub async fn is_seat_taken(
        conn: &mut SqliteConnection,
        flight_id: i64,
        seat_no: &str,
    ) -> DatabaseResult<bool> {
        let taken: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT ticket_id FROM tickets
            WHERE flight_id = ?1 AND seat_no = ?2 AND status <> 'cancelled'
            "#,
        )
        .bind(flight_id)
        .bind(seat_no)
        .fetch_optional(&mut *conn)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(taken.is_some())
    }

    /// Insert a booked ticket and return its ID
    ///
    /// A seat that is already held fails with a unique violation, see
    /// [`DatabaseError::is_unique_violation`].
    pub async fn insert(
        conn: &mut SqliteConnection,
        subject: &str,
        flight_id: i64,
        seat_no: &str,
        price_usd: f64,
    ) -> DatabaseResult<i64> {
        sqlx::query_scalar(
            r#"
            INSERT INTO tickets (flight_id, subject, seat_no, price_usd, status, created_at)
            VALUES (?1, ?2, ?3, ?4, 'booked', ?5)
            RETURNING ticket_id
            "#,
        )
        .bind(flight_id)
        .bind(subject)
        .bind(seat_no)
        .bind(price_usd)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await
        .map_err(DatabaseError::Query)
    }

    /// Find a ticket of a subject on the caller's connection
    pub async fn find_in(
        conn: &mut SqliteConnection,
        ticket_id: i64,
        subject: &str,
    ) -> DatabaseResult<Option<Ticket>> {
        let row = sqlx::query(&format!(
            "{} WHERE t.ticket_id = ?1 AND t.subject = ?2",
            TICKET_SELECT
        ))
        .bind(ticket_id)
        .bind(subject)
        .fetch_optional(&mut *conn)
        .await
        .map_err(DatabaseError::Query)?;

        row.as_ref().map(ticket_from_row).transpose()
    }

    /// Cancel a live ticket of a subject
    ///
    /// Returns `false` when there was nothing to cancel: the ticket is
    /// unknown, belongs to someone else or is already cancelled.
    pub async fn cancel(
        conn: &mut SqliteConnection,
        ticket_id: i64,
        subject: &str,
    ) -> DatabaseResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET status = 'cancelled'
            WHERE ticket_id = ?1 AND subject = ?2 AND status <> 'cancelled'
            "#,
        )
        .bind(ticket_id)
        .bind(subject)
        .execute(&mut *conn)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(result.rows_affected() == 1)
    }
}

fn ticket_from_row(row: &SqliteRow) -> DatabaseResult<Ticket> {
    let status: String = row.get("status");

    Ok(Ticket {
        ticket_id: row.get("ticket_id"),
        flight_id: row.get("flight_id"),
        flight_number: row.get("flight_number"),
        departure_city: row.get("departure_city"),
        arrival_city: row.get("arrival_city"),
        flight_date: row.get("flight_date"),
        flight_time: row.get("flight_time"),
        seat_no: row.get("seat_no"),
        price_usd: row.get("price_usd"),
        status: status.parse()?,
        created_at: row.get("created_at"),
    })
}
