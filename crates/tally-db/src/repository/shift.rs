//! # Shift Repository
//!
//! Opening and reading shifts. Closing a shift is a settlement, see
//! [`SettlementRepository::close_shift`](super::settlement::SettlementRepository::close_shift).
//!
//! ## Single Open Shift
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CREATE UNIQUE INDEX idx_shifts_single_open                             │
//! │      ON shifts (status) WHERE status = 'open';                          │
//! │                                                                         │
//! │  open() checks for an open shift first (friendly error), and the        │
//! │  partial index rejects a second open shift even if two opens race.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::begin_write;
use tally_core::shift::OrderContribution;
use tally_core::validation::{validate_name, validate_non_negative};
use tally_core::{CoreError, Shift, ShiftStatus};

#[derive(Debug, Clone)]
pub struct ShiftRepository {
    pool: SqlitePool,
}

impl ShiftRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ShiftRepository { pool }
    }

    /// Opens a new shift with the cash float counted into the drawer.
    ///
    /// ## Returns
    /// * `Err(CoreError::ShiftAlreadyOpen)` - another shift is still open
    pub async fn open(&self, cashier_name: &str, opening_cash_cents: i64) -> DbResult<Shift> {
        validate_name("cashier name", cashier_name)?;
        validate_non_negative("opening cash", opening_cash_cents)?;

        let mut tx = begin_write(&self.pool).await?;

        if let Some(existing) = fetch_open(&mut tx).await? {
            return Err(CoreError::ShiftAlreadyOpen {
                shift_id: existing.id,
            }
            .into());
        }

        let shift = Shift {
            id: Uuid::new_v4().to_string(),
            cashier_name: cashier_name.trim().to_string(),
            status: ShiftStatus::Open,
            opening_cash_cents,
            order_count: 0,
            gross_cents: 0,
            discount_cents: 0,
            gift_cents: 0,
            net_cents: 0,
            cash_cents: 0,
            card_cents: 0,
            transfer_cents: 0,
            opened_at: Utc::now(),
            closed_at: None,
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO shifts (id, cashier_name, status, opening_cash_cents, opened_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&shift.id)
        .bind(&shift.cashier_name)
        .bind(shift.status)
        .bind(shift.opening_cash_cents)
        .bind(shift.opened_at)
        .execute(&mut *tx)
        .await;

        match inserted.map_err(DbError::from) {
            Ok(_) => {}
            Err(e) if e.is_unique_violation_on("shifts.status") => {
                return Err(CoreError::ShiftAlreadyOpen {
                    shift_id: "unknown".to_string(),
                }
                .into());
            }
            Err(e) => return Err(e),
        }

        tx.commit().await?;

        info!(
            shift_id = %shift.id,
            cashier = %shift.cashier_name,
            opening_cash_cents,
            "Shift opened"
        );
        Ok(shift)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Shift>> {
        let shift = sqlx::query_as::<_, Shift>(
            r#"
            SELECT id, cashier_name, status, opening_cash_cents, order_count,
                   gross_cents, discount_cents, gift_cents, net_cents,
                   cash_cents, card_cents, transfer_cents, opened_at, closed_at
            FROM shifts
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(shift)
    }

    /// The currently open shift, if any.
    pub async fn current_open(&self) -> DbResult<Option<Shift>> {
        let mut conn = self.pool.acquire().await?;
        fetch_open(&mut conn).await
    }

    /// Most recently opened shifts first.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Shift>> {
        let shifts = sqlx::query_as::<_, Shift>(
            r#"
            SELECT id, cashier_name, status, opening_cash_cents, order_count,
                   gross_cents, discount_cents, gift_cents, net_cents,
                   cash_cents, card_cents, transfer_cents, opened_at, closed_at
            FROM shifts
            ORDER BY opened_at DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(shifts)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

pub(crate) async fn fetch_shift(conn: &mut SqliteConnection, id: &str) -> DbResult<Shift> {
    sqlx::query_as::<_, Shift>(
        r#"
        SELECT id, cashier_name, status, opening_cash_cents, order_count,
               gross_cents, discount_cents, gift_cents, net_cents,
               cash_cents, card_cents, transfer_cents, opened_at, closed_at
        FROM shifts
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Shift", id))
}

pub(crate) async fn fetch_open(conn: &mut SqliteConnection) -> DbResult<Option<Shift>> {
    let shift = sqlx::query_as::<_, Shift>(
        r#"
        SELECT id, cashier_name, status, opening_cash_cents, order_count,
               gross_cents, discount_cents, gift_cents, net_cents,
               cash_cents, card_cents, transfer_cents, opened_at, closed_at
        FROM shifts
        WHERE status = 'open'
        "#,
    )
    .fetch_optional(&mut *conn)
    .await?;

    Ok(shift)
}

/// Fetches a shift and fails unless it is open.
pub(crate) async fn require_open(conn: &mut SqliteConnection, id: &str) -> DbResult<Shift> {
    let shift = fetch_shift(conn, id).await?;
    if !shift.is_open() {
        return Err(CoreError::InvalidShiftStatus {
            shift_id: shift.id,
            status: shift.status.to_string(),
        }
        .into());
    }
    Ok(shift)
}

/// Adds (`count_delta = 1`) or removes (`count_delta = -1`, negated
/// contribution) one order's amounts on the shift row.
///
/// Always a delta update: two orders committed back to back never lose
/// each other's amounts.
pub(crate) async fn apply_contribution(
    conn: &mut SqliteConnection,
    shift_id: &str,
    c: &OrderContribution,
    count_delta: i64,
) -> DbResult<()> {
    debug!(shift_id = %shift_id, net_cents = c.net_cents, count_delta, "Updating shift totals");

    let result = sqlx::query(
        r#"
        UPDATE shifts SET
            order_count    = order_count + ?2,
            gross_cents    = gross_cents + ?3,
            discount_cents = discount_cents + ?4,
            gift_cents     = gift_cents + ?5,
            net_cents      = net_cents + ?6,
            cash_cents     = cash_cents + ?7,
            card_cents     = card_cents + ?8,
            transfer_cents = transfer_cents + ?9
        WHERE id = ?1 AND status = 'open'
        "#,
    )
    .bind(shift_id)
    .bind(count_delta)
    .bind(c.gross_cents)
    .bind(c.discount_cents)
    .bind(c.gift_cents)
    .bind(c.net_cents)
    .bind(c.cash_cents)
    .bind(c.card_cents)
    .bind(c.transfer_cents)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Open shift", shift_id));
    }

    Ok(())
}
