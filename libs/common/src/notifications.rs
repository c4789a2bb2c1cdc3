//! Outbound notification queue
//!
//! The API enqueues inside its business transactions, the relay drains the
//! queue. A notification is sent at most once: the pending to sent move is a
//! compare-and-set, and repeatedly failing sends end in `failed`.

use chrono::Utc;
use sqlx::{Row, SqliteConnection, SqlitePool, sqlite::SqliteRow};
use tracing::{info, warn};

use crate::error::{DatabaseError, DatabaseResult};
use crate::models::{Notification, NotificationKind, NotificationStatus, parse_payload};

/// Notification store
#[derive(Clone)]
pub struct NotificationStore {
    pool: SqlitePool,
}

impl NotificationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Queue a notification on the caller's connection
    ///
    /// Takes a connection so the notification commits with the change it
    /// reports.
    pub async fn enqueue(
        conn: &mut SqliteConnection,
        subject: &str,
        kind: NotificationKind,
        message: Option<&str>,
        payload: Option<&serde_json::Value>,
    ) -> DatabaseResult<i64> {
        let notification_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO notifications (subject, kind, message, payload, status, attempts, created_at)
            VALUES (?1, ?2, ?3, ?4, 'pending', 0, ?5)
            RETURNING notification_id
            "#,
        )
        .bind(subject)
        .bind(kind.as_str())
        .bind(message)
        .bind(payload.map(|p| p.to_string()))
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await
        .map_err(DatabaseError::Query)?;

        info!(
            "Queued {} notification {} for {}",
            kind.as_str(),
            notification_id,
            subject
        );
        Ok(notification_id)
    }

    /// Oldest pending notifications that can be delivered, with the chat
    /// bound to their subject, at most `limit`
    ///
    /// Notifications of unbound subjects are left out so they never hold up
    /// the rest of the queue.
    pub async fn deliverable_batch(&self, limit: i64) -> DatabaseResult<Vec<(Notification, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT n.notification_id, n.subject, n.kind, n.message, n.payload, n.status,
                   n.attempts, n.created_at, n.sent_at, b.chat_id
            FROM notifications n
            JOIN channel_bindings b ON b.subject = n.subject
            WHERE n.status = 'pending'
            ORDER BY n.created_at, n.notification_id
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        rows.iter()
            .map(|row| Ok((notification_from_row(row)?, row.get("chat_id"))))
            .collect()
    }

    /// Move a delivered notification from pending to sent
    ///
    /// Returns `false` when it was no longer pending.
    pub async fn mark_sent(&self, notification_id: i64) -> DatabaseResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET status = 'sent', sent_at = ?1
            WHERE notification_id = ?2 AND status = 'pending'
            "#,
        )
        .bind(Utc::now())
        .bind(notification_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(result.rows_affected() == 1)
    }

    /// Count a failed send attempt
    ///
    /// Once `max_attempts` is reached the notification moves to `failed` and
    /// is no longer picked up. Returns the resulting status.
    pub async fn record_failure(
        &self,
        notification_id: i64,
        max_attempts: i64,
    ) -> DatabaseResult<Option<NotificationStatus>> {
        let row = sqlx::query(
            r#"
            UPDATE notifications
            SET attempts = attempts + 1,
                status = CASE WHEN attempts + 1 >= ?1 THEN 'failed' ELSE 'pending' END
            WHERE notification_id = ?2 AND status = 'pending'
            RETURNING status, attempts
            "#,
        )
        .bind(max_attempts)
        .bind(notification_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status: String = row.get("status");
        let status: NotificationStatus = status.parse()?;
        if status == NotificationStatus::Failed {
            let attempts: i64 = row.get("attempts");
            warn!(
                "Giving up on notification {} after {} attempts",
                notification_id, attempts
            );
        }
        Ok(Some(status))
    }
}

fn notification_from_row(row: &SqliteRow) -> DatabaseResult<Notification> {
    let kind: String = row.get("kind");
    let status: String = row.get("status");

    Ok(Notification {
        notification_id: row.get("notification_id"),
        subject: row.get("subject"),
        kind: NotificationKind::parse_lenient(&kind),
        message: row.get("message"),
        payload: parse_payload(row.get("payload")),
        status: status.parse()?,
        attempts: row.get("attempts"),
        created_at: row.get("created_at"),
        sent_at: row.get("sent_at"),
    })
}
