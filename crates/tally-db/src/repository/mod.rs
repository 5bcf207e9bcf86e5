//! # Repository Module
//!
//! Database repository implementations for Tally POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Caller (webhook handler, dispatcher, terminal API)                     │
//! │       │                                                                 │
//! │       │  db.orders().create(new_order)                                  │
//! │       ▼                                                                 │
//! │  OrderRepository                                                        │
//! │  ├── price with tally-core                                              │
//! │  ├── write rows in ONE transaction                                      │
//! │  └── queue outbox entries in the same transaction                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Menu items
//! - [`MaterialRepository`](material::MaterialRepository) - Stock, recipes, movements
//! - [`DiscountRepository`](discount::DiscountRepository) - Discount rules
//! - [`ShiftRepository`](shift::ShiftRepository) - Opening and reading shifts
//! - [`OrderRepository`](order::OrderRepository) - Order create, replay, void
//! - [`SettlementRepository`](settlement::SettlementRepository) - Shift close
//! - [`ReportRepository`](report::ReportRepository) - Sales aggregates
//! - [`NotificationRepository`](notification::NotificationRepository) - Chat outbox
//! - [`ChatAdminRepository`](chat_admin::ChatAdminRepository) - Admin roster

pub mod chat_admin;
pub mod discount;
pub mod material;
pub mod notification;
pub mod order;
pub mod product;
pub mod report;
pub mod settlement;
pub mod shift;

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::DbResult;

/// Starts a `BEGIN IMMEDIATE` transaction, which holds SQLite's write lock
/// from the start.
///
/// A deferred transaction that reads and later writes fails with
/// `SQLITE_BUSY` if another writer committed in between; taking the lock
/// up front makes concurrent writers wait on `busy_timeout` instead.
pub(crate) async fn begin_write(pool: &SqlitePool) -> DbResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_db;

    #[tokio::test]
    async fn test_begin_write_commits_and_rolls_back() {
        let db = memory_db().await;

        let mut tx = begin_write(db.pool()).await.unwrap();
        sqlx::query("INSERT INTO chat_admins (id, chat_user_id, status, requested_at) VALUES ('a', 1, 'pending', '2026-01-01T00:00:00Z')")
            .execute(&mut *tx)
            .await
            .unwrap();
        tx.rollback().await.unwrap();
        assert!(db.chat_admins().get_by_chat_user(1).await.unwrap().is_none());

        let mut tx = begin_write(db.pool()).await.unwrap();
        sqlx::query("INSERT INTO chat_admins (id, chat_user_id, status, requested_at) VALUES ('b', 2, 'pending', '2026-01-01T00:00:00Z')")
            .execute(&mut *tx)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert!(db.chat_admins().get_by_chat_user(2).await.unwrap().is_some());
    }
}
