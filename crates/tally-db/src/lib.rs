//! # tally-db: Database Layer for Tally POS
//!
//! SQLite persistence for the back office: catalogue, inventory, shifts,
//! orders, settlements and the chat notification outbox.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Data Flow                              │
//! │                                                                         │
//! │  Terminal order / webhook command / dispatcher tick                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                     tally-db (THIS CRATE)                       │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐   │    │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │   │    │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │   │    │
//! │  │   │               │    │ OrderRepo      │    │ 001_initial  │   │    │
//! │  │   │ SqlitePool    │◄───│ SettlementRepo │    │ 002_chat     │   │    │
//! │  │   │ WAL, FK on    │    │ Notification.. │    │              │   │    │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘   │    │
//! │  │                                                                 │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (path from backoffice.toml)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("tally.db")).await?;
//!
//! let shift = db.shifts().open("Dana", 10_000).await?;
//! let receipt = db.orders().create(new_order).await?;
//! let settlement = db.settlements().close_shift(close).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(test)]
pub(crate) mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::chat_admin::ChatAdminRepository;
pub use repository::discount::DiscountRepository;
pub use repository::material::MaterialRepository;
pub use repository::notification::NotificationRepository;
pub use repository::order::{NewOrder, NewOrderLine, OrderReceipt, OrderRepository};
pub use repository::product::ProductRepository;
pub use repository::report::{
    DailySales, DiscountUsage, PaymentBreakdown, ProductSales, ReportRepository,
};
pub use repository::settlement::{
    CloseShift, MaterialCount, SettlementRecord, SettlementRepository,
};
pub use repository::shift::ShiftRepository;
