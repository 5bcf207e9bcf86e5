//! # Report Repository
//!
//! Read-only sales aggregates for the admin dashboard.
//!
//! Every report covers `[from, to)` on the order's `created_at` and
//! excludes voided orders. Days are UTC calendar days.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;
use ts_rs::TS;

use crate::error::DbResult;
use tally_core::PaymentMethod;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, sqlx::FromRow)]
#[ts(export)]
pub struct DailySales {
    /// `YYYY-MM-DD`
    pub day: String,
    pub order_count: i64,
    pub gross_cents: i64,
    pub discount_cents: i64,
    pub gift_cents: i64,
    pub net_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, sqlx::FromRow)]
#[ts(export)]
pub struct ProductSales {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    /// Units sold (gifts excluded).
    pub quantity: i64,
    pub gift_quantity: i64,
    /// Charged amount after each line's discount share.
    pub revenue_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, sqlx::FromRow)]
#[ts(export)]
pub struct DiscountUsage {
    pub discount_id: String,
    pub name: String,
    pub order_count: i64,
    pub discount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, sqlx::FromRow)]
#[ts(export)]
pub struct PaymentBreakdown {
    pub payment_method: PaymentMethod,
    pub order_count: i64,
    pub total_cents: i64,
}

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// One row per day that had sales, oldest first.
    pub async fn daily_sales(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<DailySales>> {
        debug!(%from, %to, "Daily sales report");

        let rows = sqlx::query_as::<_, DailySales>(
            r#"
            SELECT substr(created_at, 1, 10) AS day,
                   COUNT(*)            AS order_count,
                   SUM(gross_cents)    AS gross_cents,
                   SUM(discount_cents) AS discount_cents,
                   SUM(gift_cents)     AS gift_cents,
                   SUM(total_cents)    AS net_cents
            FROM orders
            WHERE status = 'completed' AND created_at >= ?1 AND created_at < ?2
            GROUP BY day
            ORDER BY day
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Best sellers by revenue, then by units.
    pub async fn top_products(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: u32,
    ) -> DbResult<Vec<ProductSales>> {
        let rows = sqlx::query_as::<_, ProductSales>(
            r#"
            SELECT i.product_id,
                   MAX(i.sku_snapshot)  AS sku,
                   MAX(i.name_snapshot) AS name,
                   SUM(CASE WHEN i.is_gift = 0 THEN i.quantity ELSE 0 END) AS quantity,
                   SUM(CASE WHEN i.is_gift = 1 THEN i.quantity ELSE 0 END) AS gift_quantity,
                   SUM(i.line_total_cents - i.discount_cents)              AS revenue_cents
            FROM order_items i
            JOIN orders o ON o.id = i.order_id
            WHERE o.status = 'completed' AND o.created_at >= ?1 AND o.created_at < ?2
            GROUP BY i.product_id
            ORDER BY revenue_cents DESC, quantity DESC, sku
            LIMIT ?3
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// How much each discount gave away.
    pub async fn discount_usage(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<DiscountUsage>> {
        let rows = sqlx::query_as::<_, DiscountUsage>(
            r#"
            SELECT o.discount_id         AS discount_id,
                   MAX(d.name)           AS name,
                   COUNT(*)              AS order_count,
                   SUM(o.discount_cents) AS discount_cents
            FROM orders o
            JOIN discounts d ON d.id = o.discount_id
            WHERE o.status = 'completed' AND o.created_at >= ?1 AND o.created_at < ?2
            GROUP BY o.discount_id
            ORDER BY discount_cents DESC, name
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Takings per payment method.
    pub async fn payment_breakdown(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<PaymentBreakdown>> {
        let rows = sqlx::query_as::<_, PaymentBreakdown>(
            r#"
            SELECT payment_method,
                   COUNT(*)         AS order_count,
                   SUM(total_cents) AS total_cents
            FROM orders
            WHERE status = 'completed' AND created_at >= ?1 AND created_at < ?2
            GROUP BY payment_method
            ORDER BY payment_method
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
