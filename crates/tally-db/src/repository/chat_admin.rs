//! # Chat Admin Repository
//!
//! Chat users allowed to issue bot commands.
//!
//! ```text
//!   /start ──► request() ──► pending ──┬── approve() ──► approved
//!              │                       └── reject()  ──► rejected
//!              └── AdminRequest queued for the ops chat
//!
//!   every decision queues an AdminDecision for the requester
//!
//!   bootstrap() ──► approved   (ids from configuration, at startup)
//! ```
//!
//! A rejected user stays rejected when they send /start again; only an
//! approved admin (or the bootstrap list) can change that.
//!
//! The `*_replying` variants also queue the bot's answer to the sender in
//! the same transaction, so a roster change and its reply commit together.
//! The answer is a `(chat_id, text)` pair built from the stored record.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::begin_write;
use crate::repository::notification::queue_in;
use tally_core::{AdminStatus, ChatAdmin, NotificationPayload};

#[derive(Debug, Clone)]
pub struct ChatAdminRepository {
    pool: SqlitePool,
}

impl ChatAdminRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ChatAdminRepository { pool }
    }

    /// Files an access request and, for a new request, queues the
    /// admin-request message for the ops chat in the same transaction.
    ///
    /// ## Returns
    /// The stored record and `true` when this call created it. Repeated
    /// requests return the existing record untouched.
    pub async fn request(
        &self,
        chat_user_id: i64,
        username: Option<&str>,
    ) -> DbResult<(ChatAdmin, bool)> {
        self.request_replying(chat_user_id, username, |_, _| None)
            .await
    }

    /// [`request`](Self::request) plus a reply queued in the same
    /// transaction. `reply` also learns whether this call created the record.
    pub async fn request_replying<F>(
        &self,
        chat_user_id: i64,
        username: Option<&str>,
        reply: F,
    ) -> DbResult<(ChatAdmin, bool)>
    where
        F: FnOnce(&ChatAdmin, bool) -> Option<(i64, String)> + Send,
    {
        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO chat_admins (id, chat_user_id, username, status, requested_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (chat_user_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(chat_user_id)
        .bind(username)
        .bind(AdminStatus::Pending)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let created = result.rows_affected() == 1;
        if created {
            let payload = NotificationPayload::AdminRequest {
                chat_user_id,
                username: username.map(str::to_string),
            };
            queue_in(&mut tx, None, &payload, now).await?;
        }

        let admin = fetch_admin(&mut tx, chat_user_id).await?;
        if let Some((chat_id, text)) = reply(&admin, created) {
            queue_in(&mut tx, Some(chat_id), &NotificationPayload::Reply { text }, now).await?;
        }
        tx.commit().await?;

        if created {
            info!(chat_user_id, username = ?username, "Admin access requested");
        } else {
            debug!(chat_user_id, status = %admin.status, "Repeated admin request");
        }
        Ok((admin, created))
    }

    /// Grants access. Approving an approved user is a no-op.
    pub async fn approve(&self, chat_user_id: i64, decided_by: i64) -> DbResult<ChatAdmin> {
        self.decide(chat_user_id, decided_by, AdminStatus::Approved, |_| None)
            .await
    }

    /// Refuses a pending request, or revokes an approved admin.
    pub async fn reject(&self, chat_user_id: i64, decided_by: i64) -> DbResult<ChatAdmin> {
        self.decide(chat_user_id, decided_by, AdminStatus::Rejected, |_| None)
            .await
    }

    /// Approves or rejects, queuing `reply` for the deciding admin in the
    /// same transaction.
    pub async fn decide_replying<F>(
        &self,
        chat_user_id: i64,
        decided_by: i64,
        approve: bool,
        reply: F,
    ) -> DbResult<ChatAdmin>
    where
        F: FnOnce(&ChatAdmin) -> Option<(i64, String)> + Send,
    {
        let status = if approve {
            AdminStatus::Approved
        } else {
            AdminStatus::Rejected
        };
        self.decide(chat_user_id, decided_by, status, reply)
            .await
    }

    /// Records a decision and tells the requester about it.
    async fn decide<F>(
        &self,
        chat_user_id: i64,
        decided_by: i64,
        status: AdminStatus,
        reply: F,
    ) -> DbResult<ChatAdmin>
    where
        F: FnOnce(&ChatAdmin) -> Option<(i64, String)> + Send,
    {
        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        let result = sqlx::query(
            r#"
            UPDATE chat_admins SET
                status = ?2,
                decided_by = ?3,
                decided_at = ?4
            WHERE chat_user_id = ?1 AND status != ?2
            "#,
        )
        .bind(chat_user_id)
        .bind(status)
        .bind(decided_by)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let admin = fetch_admin(&mut tx, chat_user_id).await?;

        let changed = result.rows_affected() > 0;
        if changed {
            let payload = NotificationPayload::AdminDecision {
                chat_user_id,
                approved: status == AdminStatus::Approved,
            };
            // Private chats share the user's id.
            queue_in(&mut tx, Some(chat_user_id), &payload, now).await?;
        }
        if let Some((chat_id, text)) = reply(&admin) {
            queue_in(&mut tx, Some(chat_id), &NotificationPayload::Reply { text }, now).await?;
        }
        tx.commit().await?;

        if changed {
            info!(chat_user_id, decided_by, status = %status, "Admin request decided");
        }
        Ok(admin)
    }

    /// Approves a configured admin, creating the record if needed.
    pub async fn bootstrap(&self, chat_user_id: i64) -> DbResult<ChatAdmin> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO chat_admins (id, chat_user_id, status, requested_at, decided_at)
            VALUES (?1, ?2, 'approved', ?3, ?3)
            ON CONFLICT (chat_user_id) DO UPDATE SET
                status = 'approved',
                decided_at = COALESCE(chat_admins.decided_at, excluded.decided_at)
            WHERE chat_admins.status != 'approved'
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(chat_user_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(chat_user_id, "Bootstrap admin ensured");
        self.require(chat_user_id).await
    }

    pub async fn get_by_chat_user(&self, chat_user_id: i64) -> DbResult<Option<ChatAdmin>> {
        let admin = sqlx::query_as::<_, ChatAdmin>(
            r#"
            SELECT id, chat_user_id, username, status, decided_by, requested_at, decided_at
            FROM chat_admins
            WHERE chat_user_id = ?1
            "#,
        )
        .bind(chat_user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(admin)
    }

    pub async fn is_approved(&self, chat_user_id: i64) -> DbResult<bool> {
        Ok(self
            .get_by_chat_user(chat_user_id)
            .await?
            .is_some_and(|a| a.is_approved()))
    }

    /// Oldest request first.
    pub async fn list_by_status(&self, status: AdminStatus) -> DbResult<Vec<ChatAdmin>> {
        let admins = sqlx::query_as::<_, ChatAdmin>(
            r#"
            SELECT id, chat_user_id, username, status, decided_by, requested_at, decided_at
            FROM chat_admins
            WHERE status = ?1
            ORDER BY requested_at ASC, rowid ASC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(admins)
    }

    async fn require(&self, chat_user_id: i64) -> DbResult<ChatAdmin> {
        let mut conn = self.pool.acquire().await?;
        fetch_admin(&mut conn, chat_user_id).await
    }
}

async fn fetch_admin(conn: &mut SqliteConnection, chat_user_id: i64) -> DbResult<ChatAdmin> {
    sqlx::query_as::<_, ChatAdmin>(
        r#"
        SELECT id, chat_user_id, username, status, decided_by, requested_at, decided_at
        FROM chat_admins
        WHERE chat_user_id = ?1
        "#,
    )
    .bind(chat_user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Chat admin", chat_user_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_db;
    use tally_core::NotificationKind;

    #[tokio::test]
    async fn test_request_is_idempotent() {
        let db = memory_db().await;
        let repo = db.chat_admins();

        let (first, created) = repo.request(100, Some("dana")).await.unwrap();
        assert!(created);
        assert_eq!(first.status, AdminStatus::Pending);
        assert_eq!(first.username.as_deref(), Some("dana"));

        let (again, created) = repo.request(100, Some("dana")).await.unwrap();
        assert!(!created);
        assert_eq!(again.id, first.id);

        assert_eq!(repo.list_by_status(AdminStatus::Pending).await.unwrap().len(), 1);
        assert!(!repo.is_approved(100).await.unwrap());

        // One ops message, not one per /start
        let queued = db.notifications().get_pending(10, 5).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].chat_id, None);
        assert_eq!(
            queued[0].payload().unwrap(),
            NotificationPayload::AdminRequest {
                chat_user_id: 100,
                username: Some("dana".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_approve_and_reject() {
        let db = memory_db().await;
        let repo = db.chat_admins();
        repo.bootstrap(1).await.unwrap();
        repo.request(100, None).await.unwrap();
        repo.request(200, Some("sam")).await.unwrap();

        let approved = repo.approve(100, 1).await.unwrap();
        assert!(approved.is_approved());
        assert_eq!(approved.decided_by, Some(1));
        assert!(approved.decided_at.is_some());

        let rejected = repo.reject(200, 1).await.unwrap();
        assert_eq!(rejected.status, AdminStatus::Rejected);

        // A new /start does not reopen a rejected request.
        let (still, created) = repo.request(200, Some("sam")).await.unwrap();
        assert!(!created);
        assert_eq!(still.status, AdminStatus::Rejected);

        assert!(repo.is_approved(100).await.unwrap());
        assert!(!repo.is_approved(200).await.unwrap());
        assert!(!repo.is_approved(300).await.unwrap());
        assert_eq!(repo.list_by_status(AdminStatus::Approved).await.unwrap().len(), 2);

        // Approving again changes nothing and tells nobody.
        repo.approve(100, 1).await.unwrap();
        let decisions: Vec<_> = db
            .notifications()
            .get_pending(10, 5)
            .await
            .unwrap()
            .into_iter()
            .filter(|n| n.kind == NotificationKind::AdminDecision)
            .collect();
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0].chat_id, Some(100));
        assert_eq!(
            decisions[1].payload().unwrap(),
            NotificationPayload::AdminDecision {
                chat_user_id: 200,
                approved: false,
            }
        );
    }

    #[tokio::test]
    async fn test_replies_commit_with_roster_change() {
        let db = memory_db().await;
        let repo = db.chat_admins();
        repo.bootstrap(1).await.unwrap();

        repo.request_replying(100, None, |admin, created| {
            assert!(created);
            Some((100, format!("status {}", admin.status)))
        })
        .await
        .unwrap();
        repo.decide_replying(100, 1, true, |admin| {
            Some((1, format!("User 100 is now {}.", admin.status)))
        })
        .await
        .unwrap();

        let queued = db.notifications().get_pending(10, 5).await.unwrap();
        let kinds: Vec<_> = queued.iter().map(|n| (n.kind, n.chat_id)).collect();
        assert_eq!(
            kinds,
            vec![
                (NotificationKind::AdminRequest, None),
                (NotificationKind::Reply, Some(100)),
                (NotificationKind::AdminDecision, Some(100)),
                (NotificationKind::Reply, Some(1)),
            ]
        );
        assert_eq!(
            queued[3].payload().unwrap(),
            NotificationPayload::Reply {
                text: "User 100 is now approved.".to_string()
            }
        );

        // No roster change for an unknown user, and no reply either.
        let err = repo
            .decide_replying(999, 1, false, |_| Some((1, "never".to_string())))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        assert_eq!(db.notifications().count_pending().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_decide_unknown_user() {
        let db = memory_db().await;
        let err = db.chat_admins().approve(999, 1).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_bootstrap_promotes_existing_request() {
        let db = memory_db().await;
        let repo = db.chat_admins();

        let (pending, _) = repo.request(5, Some("owner")).await.unwrap();
        let admin = repo.bootstrap(5).await.unwrap();
        assert_eq!(admin.id, pending.id);
        assert!(admin.is_approved());
        assert_eq!(admin.username.as_deref(), Some("owner"));

        // Running it again at the next startup changes nothing.
        let again = repo.bootstrap(5).await.unwrap();
        assert_eq!(again.decided_at, admin.decided_at);
    }
}
