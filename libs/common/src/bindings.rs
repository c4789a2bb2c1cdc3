//! Channel bindings: which Telegram chat a subject can be reached in

use chrono::Utc;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::info;

use crate::error::{DatabaseError, DatabaseResult};
use crate::models::ChannelBinding;

/// Binding store
#[derive(Clone)]
pub struct BindingStore {
    pool: SqlitePool,
}

impl BindingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create or refresh the binding for a subject
    ///
    /// A subject that starts the bot from another chat moves its binding there.
    pub async fn upsert(
        &self,
        subject: &str,
        chat_id: i64,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> DatabaseResult<ChannelBinding> {
        info!("Binding {} to chat {}", subject, chat_id);

        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO channel_bindings (subject, chat_id, first_name, last_name, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT (subject) DO UPDATE SET
                chat_id = excluded.chat_id,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                updated_at = excluded.updated_at
            RETURNING subject, chat_id, first_name, last_name, created_at, updated_at
            "#,
        )
        .bind(subject)
        .bind(chat_id)
        .bind(first_name)
        .bind(last_name)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(binding_from_row(&row))
    }

    /// Look up the binding of a subject
    pub async fn find(&self, subject: &str) -> DatabaseResult<Option<ChannelBinding>> {
        let row = sqlx::query(
            r#"
            SELECT subject, chat_id, first_name, last_name, created_at, updated_at
            FROM channel_bindings
            WHERE subject = ?1
            "#,
        )
        .bind(subject)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(row.as_ref().map(binding_from_row))
    }
}

fn binding_from_row(row: &SqliteRow) -> ChannelBinding {
    ChannelBinding {
        subject: row.get("subject"),
        chat_id: row.get("chat_id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
