//! # Settlement Repository
//!
//! Closing a shift: reconcile cash and inventory, persist the settlement,
//! close the shift and tell the operations chat, all in one transaction.
//!
//! ## Close Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  close_shift(CloseShift)                                                │
//! │                                                                         │
//! │  BEGIN (write lock taken up front)                                      │
//! │   1. shift must be open                                                 │
//! │   2. recompute totals from completed orders ── authoritative            │
//! │      running totals differ? warn + correct, drift_corrected = true      │
//! │   3. expected stock = current materials.stock_quantity                  │
//! │   4. reconcile() ── cash variance, status, per-material variance        │
//! │   5. INSERT settlement + settlement_counts                              │
//! │   6. count movements bring stock to the counted figure                  │
//! │   7. UPDATE shifts SET status = 'closed', totals = recomputed           │
//! │   8. queue ShiftClosed notification                                     │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::begin_write;
use crate::repository::material::{apply_movement, fetch_material};
use crate::repository::notification::queue_in;
use crate::repository::order::fetch_for_shift;
use crate::repository::shift::require_open;
use tally_core::settlement::{reconcile, CountInput, SettlementInput};
use tally_core::shift::{drift, ShiftTotals};
use tally_core::validation::validate_non_negative;
use tally_core::{MovementReason, NotificationPayload, Settlement, SettlementCount};

// =============================================================================
// Inputs and Outputs
// =============================================================================

/// A physical count of one material at close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MaterialCount {
    pub material_id: String,
    pub counted_quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CloseShift {
    pub shift_id: String,
    pub counted_cash_cents: i64,
    /// Materials that were counted; uncounted materials keep their figure.
    pub counts: Vec<MaterialCount>,
    pub notes: Option<String>,
    /// Allowed cash variance before the drawer is called over or short.
    pub tolerance_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SettlementRecord {
    pub settlement: Settlement,
    pub counts: Vec<SettlementCount>,
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct SettlementRepository {
    pool: SqlitePool,
}

impl SettlementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SettlementRepository { pool }
    }

    /// Closes an open shift with its settlement.
    ///
    /// ## Returns
    /// * `Err(CoreError::InvalidShiftStatus)` - shift already closed
    /// * `Err(CoreError::DuplicateCount)` - a material counted twice
    /// * `Err(DbError::NotFound)` - unknown shift or material
    pub async fn close_shift(&self, close: CloseShift) -> DbResult<SettlementRecord> {
        validate_non_negative("counted cash", close.counted_cash_cents)?;
        validate_non_negative("cash tolerance", close.tolerance_cents)?;

        let mut tx = begin_write(&self.pool).await?;

        let shift = require_open(&mut tx, &close.shift_id).await?;

        let orders = fetch_for_shift(&mut tx, &shift.id).await?;
        let recomputed = ShiftTotals::from_orders(&orders);
        let running = ShiftTotals::of_shift(&shift);
        let drift_corrected = match drift(&running, &recomputed) {
            Some(d) => {
                warn!(
                    shift_id = %shift.id,
                    running_net = d.running.net_cents,
                    recomputed_net = d.recomputed.net_cents,
                    running_count = d.running.order_count,
                    recomputed_count = d.recomputed.order_count,
                    "Shift running totals drifted from orders, using recomputed totals"
                );
                true
            }
            None => false,
        };

        let mut count_inputs = Vec::with_capacity(close.counts.len());
        for count in &close.counts {
            let material = fetch_material(&mut tx, &count.material_id).await?;
            count_inputs.push(CountInput {
                material_id: material.id,
                expected_quantity: material.stock_quantity,
                counted_quantity: count.counted_quantity,
            });
        }

        let report = reconcile(&SettlementInput {
            opening_cash_cents: shift.opening_cash_cents,
            counted_cash_cents: close.counted_cash_cents,
            tolerance_cents: close.tolerance_cents,
            totals: recomputed,
            counts: count_inputs,
        })?;

        let now = Utc::now();
        let settlement = Settlement {
            id: Uuid::new_v4().to_string(),
            shift_id: shift.id.clone(),
            opening_cash_cents: report.opening_cash_cents,
            expected_cash_cents: report.expected_cash_cents,
            counted_cash_cents: report.counted_cash_cents,
            cash_variance_cents: report.cash_variance_cents,
            status: report.status,
            order_count: recomputed.order_count,
            gross_cents: recomputed.gross_cents,
            discount_cents: recomputed.discount_cents,
            gift_cents: recomputed.gift_cents,
            net_cents: recomputed.net_cents,
            card_cents: recomputed.card_cents,
            transfer_cents: recomputed.transfer_cents,
            drift_corrected,
            notes: close.notes.as_ref().map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            created_at: now,
        };
        insert_settlement(&mut tx, &settlement).await?;

        let mut counts = Vec::with_capacity(report.counts.len());
        for line in &report.counts {
            let count = SettlementCount {
                id: Uuid::new_v4().to_string(),
                settlement_id: settlement.id.clone(),
                material_id: line.material_id.clone(),
                expected_quantity: line.expected_quantity,
                counted_quantity: line.counted_quantity,
                variance: line.variance,
            };
            sqlx::query(
                r#"
                INSERT INTO settlement_counts (
                    id, settlement_id, material_id,
                    expected_quantity, counted_quantity, variance
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&count.id)
            .bind(&count.settlement_id)
            .bind(&count.material_id)
            .bind(count.expected_quantity)
            .bind(count.counted_quantity)
            .bind(count.variance)
            .execute(&mut *tx)
            .await?;

            if count.variance != 0 {
                apply_movement(
                    &mut tx,
                    &count.material_id,
                    count.variance,
                    MovementReason::Count,
                    Some(&settlement.id),
                    now,
                )
                .await?;
            }
            counts.push(count);
        }

        close_with_totals(&mut tx, &shift.id, &recomputed, now).await?;

        let payload = NotificationPayload::ShiftClosed {
            shift_id: shift.id.clone(),
            cashier_name: shift.cashier_name.clone(),
            order_count: recomputed.order_count,
            net_cents: recomputed.net_cents,
            expected_cash_cents: settlement.expected_cash_cents,
            counted_cash_cents: settlement.counted_cash_cents,
            cash_variance_cents: settlement.cash_variance_cents,
            status: settlement.status,
            discrepancies: report.discrepancies().count(),
            drift_corrected,
        };
        queue_in(&mut tx, None, &payload, now).await?;

        tx.commit().await?;

        info!(
            shift_id = %shift.id,
            settlement_id = %settlement.id,
            status = %settlement.status,
            cash_variance_cents = settlement.cash_variance_cents,
            net_cents = settlement.net_cents,
            "Shift closed"
        );

        Ok(SettlementRecord { settlement, counts })
    }

    pub async fn get_by_shift(&self, shift_id: &str) -> DbResult<Option<Settlement>> {
        let settlement = sqlx::query_as::<_, Settlement>(
            r#"
            SELECT id, shift_id, opening_cash_cents, expected_cash_cents, counted_cash_cents,
                   cash_variance_cents, status, order_count, gross_cents, discount_cents,
                   gift_cents, net_cents, card_cents, transfer_cents, drift_corrected,
                   notes, created_at
            FROM settlements
            WHERE shift_id = ?1
            "#,
        )
        .bind(shift_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(settlement)
    }

    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Settlement>> {
        let settlements = sqlx::query_as::<_, Settlement>(
            r#"
            SELECT id, shift_id, opening_cash_cents, expected_cash_cents, counted_cash_cents,
                   cash_variance_cents, status, order_count, gross_cents, discount_cents,
                   gift_cents, net_cents, card_cents, transfer_cents, drift_corrected,
                   notes, created_at
            FROM settlements
            ORDER BY created_at DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(settlements)
    }

    /// Inventory count lines of a settlement.
    pub async fn counts(&self, settlement_id: &str) -> DbResult<Vec<SettlementCount>> {
        let counts = sqlx::query_as::<_, SettlementCount>(
            r#"
            SELECT id, settlement_id, material_id, expected_quantity, counted_quantity, variance
            FROM settlement_counts
            WHERE settlement_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(settlement_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }
}

async fn insert_settlement(conn: &mut SqliteConnection, s: &Settlement) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO settlements (
            id, shift_id, opening_cash_cents, expected_cash_cents, counted_cash_cents,
            cash_variance_cents, status, order_count, gross_cents, discount_cents,
            gift_cents, net_cents, card_cents, transfer_cents, drift_corrected,
            notes, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
        "#,
    )
    .bind(&s.id)
    .bind(&s.shift_id)
    .bind(s.opening_cash_cents)
    .bind(s.expected_cash_cents)
    .bind(s.counted_cash_cents)
    .bind(s.cash_variance_cents)
    .bind(s.status)
    .bind(s.order_count)
    .bind(s.gross_cents)
    .bind(s.discount_cents)
    .bind(s.gift_cents)
    .bind(s.net_cents)
    .bind(s.card_cents)
    .bind(s.transfer_cents)
    .bind(s.drift_corrected)
    .bind(&s.notes)
    .bind(s.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Closes the shift and stores the authoritative totals on it.
async fn close_with_totals(
    conn: &mut SqliteConnection,
    shift_id: &str,
    totals: &ShiftTotals,
    at: chrono::DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE shifts SET
            status         = 'closed',
            closed_at      = ?2,
            order_count    = ?3,
            gross_cents    = ?4,
            discount_cents = ?5,
            gift_cents     = ?6,
            net_cents      = ?7,
            cash_cents     = ?8,
            card_cents     = ?9,
            transfer_cents = ?10
        WHERE id = ?1 AND status = 'open'
        "#,
    )
    .bind(shift_id)
    .bind(at)
    .bind(totals.order_count)
    .bind(totals.gross_cents)
    .bind(totals.discount_cents)
    .bind(totals.gift_cents)
    .bind(totals.net_cents)
    .bind(totals.cash_cents)
    .bind(totals.card_cents)
    .bind(totals.transfer_cents)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
