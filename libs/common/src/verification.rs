//! Verification request lifecycle
//!
//! The API creates requests and confirms codes, the relay delivers them and
//! sweeps expired ones. Every status change is a single compare-and-set
//! statement guarded by the current status, so two callers racing on the same
//! row can never both win.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Row, Sqlite, SqliteConnection, SqlitePool, sqlite::SqliteRow};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DatabaseError, DatabaseResult};
use crate::models::{Purpose, RequestStatus, VerificationRequest, parse_payload};

const REQUEST_COLUMNS: &str =
    "request_id, subject, purpose, code, status, payload, created_at, sent_at, used_at";

/// Why a code could not be issued or confirmed
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Open the bot and send /start first, otherwise it cannot deliver your code")]
    NotLinked,

    #[error("No sent code found")]
    NoCode,

    #[error("Code expired, request a new one")]
    Expired,

    #[error("Wrong code")]
    WrongCode,

    #[error("Code already used")]
    AlreadyUsed,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Which request a confirmation refers to
#[derive(Debug, Clone, Copy)]
pub enum CodeTarget<'a> {
    /// The most recent sent request for the subject and purpose
    Latest,
    /// A specific request, which must still belong to the subject and purpose
    ById(&'a str),
}

/// Verification request store
#[derive(Clone)]
pub struct VerificationStore {
    pool: SqlitePool,
}

impl VerificationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a pending request and return its identifier
    ///
    /// Earlier pending or sent requests for the same subject and purpose are
    /// cancelled. With `require_binding` set, subjects that never started the
    /// bot are rejected with [`VerificationError::NotLinked`].
    pub async fn create(
        &self,
        subject: &str,
        purpose: Purpose,
        payload: Option<&serde_json::Value>,
        require_binding: bool,
    ) -> Result<String, VerificationError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Query)?;

        // Write first so concurrent creators queue on the SQLite write lock
        let superseded = sqlx::query(
            r#"
            UPDATE code_requests
            SET status = 'cancelled'
            WHERE subject = ?1 AND purpose = ?2 AND status IN ('pending', 'sent')
            "#,
        )
        .bind(subject)
        .bind(purpose.as_str())
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?
        .rows_affected();

        if require_binding {
            let bound: Option<i64> =
                sqlx::query_scalar("SELECT chat_id FROM channel_bindings WHERE subject = ?1")
                    .bind(subject)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(DatabaseError::Query)?;
            if bound.is_none() {
                return Err(VerificationError::NotLinked);
            }
        }

        let request_id = Uuid::new_v4().simple().to_string();
        let payload = payload.map(|p| p.to_string());

        sqlx::query(
            r#"
            INSERT INTO code_requests (request_id, subject, purpose, status, payload, created_at)
            VALUES (?1, ?2, ?3, 'pending', ?4, ?5)
            "#,
        )
        .bind(&request_id)
        .bind(subject)
        .bind(purpose.as_str())
        .bind(payload)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        tx.commit().await.map_err(DatabaseError::Query)?;

        info!(
            "Created {} code request {} for {} ({} superseded)",
            purpose, request_id, subject, superseded
        );
        Ok(request_id)
    }

    /// Get a request by identifier
    pub async fn find(&self, request_id: &str) -> DatabaseResult<Option<VerificationRequest>> {
        fetch_by_id(&self.pool, request_id).await
    }

    /// Oldest pending requests that can be delivered, with the chat bound
    /// to their subject, at most `limit`
    ///
    /// Requests of unbound subjects are left out so they never hold up the
    /// rest of the queue.
    pub async fn deliverable_batch(
        &self,
        limit: i64,
    ) -> DatabaseResult<Vec<(VerificationRequest, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT r.request_id, r.subject, r.purpose, r.code, r.status, r.payload,
                   r.created_at, r.sent_at, r.used_at, b.chat_id
            FROM code_requests r
            JOIN channel_bindings b ON b.subject = r.subject
            WHERE r.status = 'pending'
            ORDER BY r.created_at, r.rowid
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        rows.iter()
            .map(|row| Ok((request_from_row(row)?, row.get("chat_id"))))
            .collect()
    }

    /// Record a delivered code, moving the request from pending to sent
    ///
    /// Returns `false` when the request was no longer pending.
    pub async fn mark_sent(&self, request_id: &str, code: &str) -> DatabaseResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE code_requests
            SET code = ?1, status = 'sent', sent_at = ?2
            WHERE request_id = ?3 AND status = 'pending'
            "#,
        )
        .bind(code)
        .bind(Utc::now())
        .bind(request_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(result.rows_affected() == 1)
    }

    /// Move pending and sent requests older than `ttl` to expired
    pub async fn expire_stale(&self, ttl: Duration) -> DatabaseResult<u64> {
        let cutoff = cutoff(Utc::now(), ttl);

        let result = sqlx::query(
            r#"
            UPDATE code_requests
            SET status = 'expired'
            WHERE status IN ('pending', 'sent') AND created_at < ?1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(result.rows_affected())
    }

    /// Consume a code, moving its request from sent to used
    ///
    /// Runs on the caller's connection so the side effect the code unlocks
    /// commits or rolls back together with the used transition. This is the
    /// first statement of the transaction and a write, which makes SQLite
    /// serialise competing confirmations on its write lock.
    pub async fn confirm(
        conn: &mut SqliteConnection,
        subject: &str,
        purpose: Purpose,
        target: CodeTarget<'_>,
        code: &str,
        ttl: Option<Duration>,
    ) -> Result<VerificationRequest, VerificationError> {
        let now = Utc::now();
        let not_before = ttl.map(|ttl| cutoff(now, ttl));
        let request_id = match target {
            CodeTarget::Latest => None,
            CodeTarget::ById(id) => Some(id),
        };

        let row = sqlx::query(&format!(
            r#"
            UPDATE code_requests
            SET status = 'used', used_at = ?1
            WHERE request_id = COALESCE(?6, (
                    SELECT request_id FROM code_requests
                    WHERE subject = ?2 AND purpose = ?3 AND status = 'sent'
                    ORDER BY created_at DESC, rowid DESC
                    LIMIT 1
                ))
              AND subject = ?2
              AND purpose = ?3
              AND status = 'sent'
              AND code = ?4
              AND (?5 IS NULL OR created_at >= ?5)
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        ))
        .bind(now)
        .bind(subject)
        .bind(purpose.as_str())
        .bind(code)
        .bind(not_before)
        .bind(request_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(DatabaseError::Query)?;

        if let Some(row) = row {
            let request = request_from_row(&row)?;
            info!("Confirmed {} code request {}", purpose, request.request_id);
            return Ok(request);
        }

        let candidate = match target {
            CodeTarget::ById(id) => fetch_by_id(&mut *conn, id)
                .await?
                .filter(|r| r.subject == subject && r.purpose == purpose),
            CodeTarget::Latest => fetch_latest(&mut *conn, subject, purpose).await?,
        };

        let err = diagnose(candidate.as_ref(), not_before);
        debug!("Rejected {} code for {}: {}", purpose, subject, err);
        Err(err)
    }
}

/// Explain why the compare-and-set in [`VerificationStore::confirm`] matched nothing
fn diagnose(
    candidate: Option<&VerificationRequest>,
    not_before: Option<DateTime<Utc>>,
) -> VerificationError {
    let Some(request) = candidate else {
        return VerificationError::NoCode;
    };

    match request.status {
        RequestStatus::Pending => VerificationError::NoCode,
        RequestStatus::Used => VerificationError::AlreadyUsed,
        RequestStatus::Cancelled | RequestStatus::Expired => VerificationError::Expired,
        RequestStatus::Sent => match not_before {
            Some(not_before) if request.created_at < not_before => VerificationError::Expired,
            _ => VerificationError::WrongCode,
        },
    }
}

fn cutoff(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_sub_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

async fn fetch_by_id<'e, E>(executor: E, request_id: &str) -> DatabaseResult<Option<VerificationRequest>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "SELECT {} FROM code_requests WHERE request_id = ?1",
        REQUEST_COLUMNS
    ))
    .bind(request_id)
    .fetch_optional(executor)
    .await
    .map_err(DatabaseError::Query)?;

    row.as_ref().map(request_from_row).transpose()
}

async fn fetch_latest<'e, E>(
    executor: E,
    subject: &str,
    purpose: Purpose,
) -> DatabaseResult<Option<VerificationRequest>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        r#"
        SELECT {} FROM code_requests
        WHERE subject = ?1 AND purpose = ?2
        ORDER BY created_at DESC, rowid DESC
        LIMIT 1
        "#,
        REQUEST_COLUMNS
    ))
    .bind(subject)
    .bind(purpose.as_str())
    .fetch_optional(executor)
    .await
    .map_err(DatabaseError::Query)?;

    row.as_ref().map(request_from_row).transpose()
}

fn request_from_row(row: &SqliteRow) -> DatabaseResult<VerificationRequest> {
    let purpose: String = row.get("purpose");
    let status: String = row.get("status");

    Ok(VerificationRequest {
        request_id: row.get("request_id"),
        subject: row.get("subject"),
        purpose: purpose.parse()?,
        code: row.get("code"),
        status: status.parse()?,
        payload: parse_payload(row.get("payload")),
        created_at: row.get("created_at"),
        sent_at: row.get("sent_at"),
        used_at: row.get("used_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(status: RequestStatus, created_at: DateTime<Utc>) -> VerificationRequest {
        VerificationRequest {
            request_id: "r1".to_string(),
            subject: "@alice".to_string(),
            purpose: Purpose::Register,
            code: Some("123456".to_string()),
            status,
            payload: None,
            created_at,
            sent_at: None,
            used_at: None,
        }
    }

    #[test]
    fn test_diagnose() {
        let now = Utc::now();
        let old = now - chrono::Duration::minutes(30);
        let not_before = Some(now - chrono::Duration::minutes(10));

        assert!(matches!(diagnose(None, None), VerificationError::NoCode));
        assert!(matches!(
            diagnose(Some(&request(RequestStatus::Pending, now)), None),
            VerificationError::NoCode
        ));
        assert!(matches!(
            diagnose(Some(&request(RequestStatus::Used, now)), None),
            VerificationError::AlreadyUsed
        ));
        assert!(matches!(
            diagnose(Some(&request(RequestStatus::Cancelled, now)), None),
            VerificationError::Expired
        ));
        assert!(matches!(
            diagnose(Some(&request(RequestStatus::Sent, old)), not_before),
            VerificationError::Expired
        ));
        assert!(matches!(
            diagnose(Some(&request(RequestStatus::Sent, old)), None),
            VerificationError::WrongCode
        ));
        assert!(matches!(
            diagnose(Some(&request(RequestStatus::Sent, now)), not_before),
            VerificationError::WrongCode
        ));
    }

    #[test]
    fn test_cutoff_saturates() {
        let now = Utc::now();
        assert_eq!(cutoff(now, Duration::from_secs(60)), now - chrono::Duration::seconds(60));
        assert_eq!(cutoff(now, Duration::MAX), DateTime::<Utc>::MIN_UTC);
    }
}
