//! # Domain Types
//!
//! Core domain records used throughout Tally POS.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────┐  recipe   ┌──────────────┐                           │
//! │  │   Product    │──────────►│   Material   │◄── StockMovement          │
//! │  └──────┬───────┘           └──────┬───────┘                           │
//! │         │ snapshot                 │ counted at close                  │
//! │  ┌──────▼───────┐           ┌──────▼───────┐                           │
//! │  │  OrderItem   │           │SettlementCnt │                           │
//! │  └──────┬───────┘           └──────┬───────┘                           │
//! │  ┌──────▼───────┐  totals   ┌──────▼───────┐                           │
//! │  │    Order     │──────────►│    Shift     │──────► Settlement         │
//! │  └──────────────┘           └──────────────┘                           │
//! │        ▲                                                                │
//! │     Discount                Notification, ChatAdmin (chat integration) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every record carries a UUID v4 `id`. Terminals mint `client_order_id`
//! values themselves, so orders created offline keep their identity when
//! replayed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Catalogue
// =============================================================================

/// A sellable menu item.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    /// Business identifier printed on the menu board.
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub price_cents: i64,
    /// Soft-delete flag; historical orders keep referencing inactive products.
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Inventory
// =============================================================================

/// An ingredient or consumable tracked in base units (grams, millilitres, pieces).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Material {
    pub id: String,
    pub name: String,
    /// Display unit for the base quantity ("g", "ml", "pcs").
    pub unit: String,
    /// May go negative: sales are never blocked on a stock miscount.
    pub stock_quantity: i64,
    pub low_stock_threshold: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Material {
    /// True when stock is at or below the alert threshold.
    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.low_stock_threshold
    }
}

/// How much of one material a single unit of a product consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RecipeLine {
    pub product_id: String,
    pub material_id: String,
    pub quantity_per_unit: i64,
}

/// Why a material's stock changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum MovementReason {
    /// Consumed by a completed order.
    Sale,
    /// Returned by voiding an order.
    Void,
    /// Corrected to the physical count at settlement.
    Count,
    /// Delivery or manual top-up.
    Restock,
}

/// Ledger row for every stock change.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub material_id: String,
    pub delta: i64,
    pub reason: MovementReason,
    /// Order or settlement that caused the movement.
    pub reference_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Discounts
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum DiscountKind {
    /// `value` is basis points (1000 = 10%).
    Percentage,
    /// `value` is cents off the order.
    FixedAmount,
}

/// A configured discount the cashier can apply to an order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Discount {
    pub id: String,
    pub name: String,
    pub kind: DiscountKind,
    pub value: i64,
    pub is_active: bool,
    #[ts(as = "Option<String>")]
    pub valid_from: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub valid_until: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Shifts
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ShiftStatus {
    Open,
    Closed,
}

impl fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShiftStatus::Open => write!(f, "open"),
            ShiftStatus::Closed => write!(f, "closed"),
        }
    }
}

/// A POS operating session with its running totals.
///
/// The totals columns are maintained incrementally by order creation and
/// voiding; settlement recomputes them from the orders and corrects drift.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Shift {
    pub id: String,
    pub cashier_name: String,
    pub status: ShiftStatus,
    pub opening_cash_cents: i64,
    pub order_count: i64,
    pub gross_cents: i64,
    pub discount_cents: i64,
    pub gift_cents: i64,
    pub net_cents: i64,
    pub cash_cents: i64,
    pub card_cents: i64,
    pub transfer_cents: i64,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl Shift {
    pub fn is_open(&self) -> bool {
        self.status == ShiftStatus::Open
    }
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum OrderStatus {
    Completed,
    Voided,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Completed => write!(f, "completed"),
            OrderStatus::Voided => write!(f, "voided"),
        }
    }
}

/// Where an order entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum OrderSource {
    /// Submitted live by a connected terminal.
    Terminal,
    /// Queued on a disconnected terminal and replayed later.
    OfflineReplay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
}

/// A completed (or later voided) sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub shift_id: String,
    /// Idempotency key minted by the terminal; unique across all orders.
    pub client_order_id: String,
    pub status: OrderStatus,
    pub source: OrderSource,
    pub payment_method: PaymentMethod,
    pub discount_id: Option<String>,
    /// Sum of charged (non-gift) line totals before discount.
    pub gross_cents: i64,
    pub discount_cents: i64,
    /// Full value of gift lines; never part of gross or discount.
    pub gift_cents: i64,
    pub total_cents: i64,
    pub void_reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub voided_at: Option<DateTime<Utc>>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line on an order. Product data is frozen at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub sku_snapshot: String,
    pub name_snapshot: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    /// Charged amount before discount; zero for gift lines.
    pub line_total_cents: i64,
    /// This line's share of the order discount.
    pub discount_cents: i64,
    pub is_gift: bool,
    pub gift_value_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Settlement
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SettlementStatus {
    /// Counted cash within tolerance of expected.
    Balanced,
    /// More cash in the drawer than expected.
    Over,
    /// Less cash in the drawer than expected.
    Short,
}

impl fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettlementStatus::Balanced => write!(f, "balanced"),
            SettlementStatus::Over => write!(f, "over"),
            SettlementStatus::Short => write!(f, "short"),
        }
    }
}

/// End-of-shift reconciliation record.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Settlement {
    pub id: String,
    pub shift_id: String,
    pub opening_cash_cents: i64,
    pub expected_cash_cents: i64,
    pub counted_cash_cents: i64,
    pub cash_variance_cents: i64,
    pub status: SettlementStatus,
    pub order_count: i64,
    pub gross_cents: i64,
    pub discount_cents: i64,
    pub gift_cents: i64,
    pub net_cents: i64,
    pub card_cents: i64,
    pub transfer_cents: i64,
    /// True when the running shift totals disagreed with the orders and
    /// were replaced by the recomputed figures.
    pub drift_corrected: bool,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// One counted material in a settlement.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SettlementCount {
    pub id: String,
    pub settlement_id: String,
    pub material_id: String,
    pub expected_quantity: i64,
    pub counted_quantity: i64,
    pub variance: i64,
}

// =============================================================================
// Chat Integration
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum NotificationKind {
    ShiftClosed,
    LowStock,
    AdminRequest,
    AdminDecision,
    /// Direct answer to a chat command.
    Reply,
}

/// What an outbox entry is about. Stored as JSON in `notifications.payload`
/// and rendered into chat text only when it is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum NotificationPayload {
    ShiftClosed {
        shift_id: String,
        cashier_name: String,
        order_count: i64,
        net_cents: i64,
        expected_cash_cents: i64,
        counted_cash_cents: i64,
        cash_variance_cents: i64,
        status: SettlementStatus,
        /// Materials whose count differed from the system figure.
        discrepancies: usize,
        drift_corrected: bool,
    },
    LowStock {
        material_id: String,
        name: String,
        unit: String,
        stock_quantity: i64,
        threshold: i64,
    },
    AdminRequest {
        chat_user_id: i64,
        username: Option<String>,
    },
    AdminDecision {
        chat_user_id: i64,
        approved: bool,
    },
    Reply {
        text: String,
    },
}

impl NotificationPayload {
    pub fn kind(&self) -> NotificationKind {
        match self {
            NotificationPayload::ShiftClosed { .. } => NotificationKind::ShiftClosed,
            NotificationPayload::LowStock { .. } => NotificationKind::LowStock,
            NotificationPayload::AdminRequest { .. } => NotificationKind::AdminRequest,
            NotificationPayload::AdminDecision { .. } => NotificationKind::AdminDecision,
            NotificationPayload::Reply { .. } => NotificationKind::Reply,
        }
    }
}

/// An outbound chat message waiting in (or delivered from) the outbox.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    /// Recipient chat; `None` addresses the configured operations chat.
    pub chat_id: Option<i64>,
    /// JSON-encoded [`NotificationPayload`].
    pub payload: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub attempted_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub sent_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// Decodes the stored payload.
    pub fn payload(&self) -> serde_json::Result<NotificationPayload> {
        serde_json::from_str(&self.payload)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum AdminStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for AdminStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminStatus::Pending => write!(f, "pending"),
            AdminStatus::Approved => write!(f, "approved"),
            AdminStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// A chat user who asked for (or was granted) access to operational messages.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ChatAdmin {
    pub id: String,
    pub chat_user_id: i64,
    pub username: Option<String>,
    pub status: AdminStatus,
    pub decided_by: Option<i64>,
    #[ts(as = "String")]
    pub requested_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub decided_at: Option<DateTime<Utc>>,
}

impl ChatAdmin {
    pub fn is_approved(&self) -> bool {
        self.status == AdminStatus::Approved
    }
}
