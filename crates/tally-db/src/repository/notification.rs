//! # Notification Outbox Repository
//!
//! Outbound chat messages waiting for the dispatcher.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BUSINESS OPERATION (order create, shift close, admin request)          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                   SINGLE TRANSACTION                            │    │
//! │  │  1. the business writes (orders, stock, settlements, ...)       │    │
//! │  │  2. INSERT INTO notifications (kind, chat_id, payload)          │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← the alert exists if and only if the change does               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DISPATCHER (tally-notify, background task)                             │
//! │  1. get_pending(batch, max_attempts)                                    │
//! │  2. render payload, send to the chat API                                │
//! │  3. mark_sent / mark_failed (attempts += 1, last_error)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tally_core::{Notification, NotificationPayload};

/// Repository for the notification outbox.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: SqlitePool,
}

impl NotificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        NotificationRepository { pool }
    }

    /// Queues a message outside any business transaction, such as a chat
    /// reply.
    ///
    /// `chat_id = None` addresses the operations chat.
    pub async fn queue(
        &self,
        chat_id: Option<i64>,
        payload: &NotificationPayload,
    ) -> DbResult<Notification> {
        let mut conn = self.pool.acquire().await?;
        queue_in(&mut conn, chat_id, payload, Utc::now()).await
    }

    /// Undelivered entries below the retry limit, oldest first.
    pub async fn get_pending(&self, limit: u32, max_attempts: u32) -> DbResult<Vec<Notification>> {
        self.get_pending_for(limit, max_attempts, true).await
    }

    /// Like [`get_pending`](Self::get_pending), but with `include_ops =
    /// false` entries addressed to the ops chat are left out, so a backlog
    /// of them cannot fill every batch while direct messages wait behind.
    pub async fn get_pending_for(
        &self,
        limit: u32,
        max_attempts: u32,
        include_ops: bool,
    ) -> DbResult<Vec<Notification>> {
        let entries = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, kind, chat_id, payload, attempts, last_error,
                   created_at, attempted_at, sent_at
            FROM notifications
            WHERE sent_at IS NULL
              AND attempts < ?2
              AND (?3 OR chat_id IS NOT NULL)
            ORDER BY created_at ASC, rowid ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .bind(max_attempts)
        .bind(include_ops)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Notification>> {
        let entry = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, kind, chat_id, payload, attempts, last_error,
                   created_at, attempted_at, sent_at
            FROM notifications
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Marks an entry as delivered.
    pub async fn mark_sent(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE notifications SET
                sent_at = ?2,
                attempted_at = ?2,
                attempts = attempts + 1
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Notification", id));
        }
        Ok(())
    }

    /// Records a failed delivery attempt.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE notifications SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Notification", id));
        }
        Ok(())
    }

    /// Counts undelivered entries (including those past the retry limit).
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE sent_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Deletes entries delivered more than `days_old` days ago.
    ///
    /// ## Returns
    /// Number of deleted entries.
    pub async fn cleanup_sent(&self, days_old: u32) -> DbResult<u64> {
        let cutoff = Utc::now() - Duration::days(i64::from(days_old));

        let result = sqlx::query(
            r#"
            DELETE FROM notifications
            WHERE sent_at IS NOT NULL
            AND sent_at < ?1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Inserts an outbox entry on the caller's connection or transaction.
pub(crate) async fn queue_in(
    conn: &mut SqliteConnection,
    chat_id: Option<i64>,
    payload: &NotificationPayload,
    at: DateTime<Utc>,
) -> DbResult<Notification> {
    let body = serde_json::to_string(payload).map_err(|e| DbError::Internal(e.to_string()))?;

    let entry = Notification {
        id: Uuid::new_v4().to_string(),
        kind: payload.kind(),
        chat_id,
        payload: body,
        attempts: 0,
        last_error: None,
        created_at: at,
        attempted_at: None,
        sent_at: None,
    };

    debug!(id = %entry.id, kind = ?entry.kind, ?chat_id, "Queueing notification");

    sqlx::query(
        r#"
        INSERT INTO notifications (id, kind, chat_id, payload, attempts, created_at)
        VALUES (?1, ?2, ?3, ?4, 0, ?5)
        "#,
    )
    .bind(&entry.id)
    .bind(entry.kind)
    .bind(entry.chat_id)
    .bind(&entry.payload)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_db;
    use tally_core::NotificationKind;

    fn reply(text: &str) -> NotificationPayload {
        NotificationPayload::Reply {
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_queue_and_deliver() {
        let db = memory_db().await;
        let repo = db.notifications();

        let first = repo.queue(Some(42), &reply("hello")).await.unwrap();
        repo.queue(None, &reply("ops")).await.unwrap();
        assert_eq!(first.kind, NotificationKind::Reply);

        let pending = repo.get_pending(10, 5).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, first.id);
        assert_eq!(pending[0].chat_id, Some(42));
        assert_eq!(pending[1].chat_id, None);
        assert_eq!(pending[0].payload().unwrap(), reply("hello"));

        repo.mark_sent(&first.id).await.unwrap();
        assert_eq!(repo.count_pending().await.unwrap(), 1);

        let sent = repo.get_by_id(&first.id).await.unwrap().unwrap();
        assert!(sent.sent_at.is_some());
        assert_eq!(sent.attempts, 1);
    }

    #[tokio::test]
    async fn test_pending_without_ops_entries() {
        let db = memory_db().await;
        let repo = db.notifications();
        for i in 0..3 {
            repo.queue(None, &reply(&format!("ops {i}"))).await.unwrap();
        }
        let direct = repo.queue(Some(42), &reply("to user")).await.unwrap();

        let with_ops = repo.get_pending_for(3, 5, true).await.unwrap();
        assert!(with_ops.iter().all(|n| n.chat_id.is_none()));

        let direct_only = repo.get_pending_for(3, 5, false).await.unwrap();
        assert_eq!(direct_only.len(), 1);
        assert_eq!(direct_only[0].id, direct.id);
    }

    #[tokio::test]
    async fn test_failures_respect_retry_limit() {
        let db = memory_db().await;
        let repo = db.notifications();
        let entry = repo.queue(Some(7), &reply("retry me")).await.unwrap();

        repo.mark_failed(&entry.id, "timeout").await.unwrap();
        repo.mark_failed(&entry.id, "502").await.unwrap();

        assert_eq!(repo.get_pending(10, 3).await.unwrap().len(), 1);
        assert!(repo.get_pending(10, 2).await.unwrap().is_empty());

        let failed = repo.get_by_id(&entry.id).await.unwrap().unwrap();
        assert_eq!(failed.attempts, 2);
        assert_eq!(failed.last_error.as_deref(), Some("502"));

        assert!(repo.mark_failed("missing", "x").await.is_err());
    }

    #[tokio::test]
    async fn test_cleanup_only_removes_old_sent() {
        let db = memory_db().await;
        let repo = db.notifications();
        let old = repo.queue(Some(1), &reply("old")).await.unwrap();
        let fresh = repo.queue(Some(1), &reply("fresh")).await.unwrap();
        repo.queue(Some(1), &reply("unsent")).await.unwrap();

        repo.mark_sent(&fresh.id).await.unwrap();
        sqlx::query("UPDATE notifications SET sent_at = ?2 WHERE id = ?1")
            .bind(&old.id)
            .bind(Utc::now() - Duration::days(40))
            .execute(db.pool())
            .await
            .unwrap();

        assert_eq!(repo.cleanup_sent(30).await.unwrap(), 1);
        assert!(repo.get_by_id(&old.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&fresh.id).await.unwrap().is_some());
        assert_eq!(repo.count_pending().await.unwrap(), 1);
    }
}
