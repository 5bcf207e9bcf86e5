//! # tally-core: Pure Business Logic for Tally POS
//!
//! This crate holds every bookkeeping rule of the shop as pure functions with
//! zero I/O dependencies. The database layer calls into it inside its
//! transactions; nothing here knows that a database exists.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │        POS terminal / admin dashboard / chat webhook            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌────────┐  │   │
//! │  │   │  types  │ │  money  │ │ pricing │ │  shift   │ │settle- │  │   │
//! │  │   │ Order   │ │  Money  │ │discounts│ │  totals  │ │ ment   │  │   │
//! │  │   │ Shift   │ │         │ │  gifts  │ │  drift   │ │variance│  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └──────────┘ └────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-db (Database Layer)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Product, Material, Shift, Order, Settlement, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - Discount and gift accounting for a single order
//! - [`shift`] - Running shift totals and drift detection
//! - [`settlement`] - End-of-shift cash and inventory reconciliation
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::money::Money;
//!
//! let price = Money::from_cents(450);
//! let ten_percent = price.percentage(1000);
//! assert_eq!(ten_percent.cents(), 45);
//! ```

pub mod error;
pub mod money;
pub mod pricing;
pub mod settlement;
pub mod shift;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

/// Maximum quantity of a single line on an order.
///
/// ## Business Reason
/// Catches fat-finger entries (1000 instead of 10) at the till.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum number of lines on one order.
pub const MAX_ORDER_LINES: usize = 100;

/// Largest unit price or fixed discount, 1,000,000.00.
///
/// Together with [`MAX_ITEM_QUANTITY`] and [`MAX_ORDER_LINES`] this keeps
/// every order and shift total far inside `i64`.
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

/// Basis points in 100%.
pub const BPS_SCALE: i64 = 10_000;
