//! # Discount Repository
//!
//! Stored discount rules. Whether a discount may be used for a given order
//! is decided by `tally_core::pricing::DiscountRule::from_discount`.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use tally_core::validation::{validate_name, validate_percentage_bps, validate_price_cents};
use tally_core::{Discount, DiscountKind, ValidationError};

#[derive(Debug, Clone)]
pub struct DiscountRepository {
    pool: SqlitePool,
}

impl DiscountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DiscountRepository { pool }
    }

    /// Inserts a discount after checking its value against its kind.
    pub async fn insert(&self, discount: &Discount) -> DbResult<Discount> {
        validate_name("name", &discount.name)?;
        match discount.kind {
            DiscountKind::Percentage => {
                let bps = u32::try_from(discount.value).map_err(|_| {
                    ValidationError::MustNotBeNegative {
                        field: "discount value".to_string(),
                    }
                })?;
                validate_percentage_bps(bps)?;
            }
            DiscountKind::FixedAmount => validate_price_cents(discount.value)?,
        }
        if let (Some(from), Some(until)) = (discount.valid_from, discount.valid_until) {
            if until < from {
                return Err(ValidationError::InvalidFormat {
                    field: "valid_until".to_string(),
                    reason: "must not be before valid_from".to_string(),
                }
                .into());
            }
        }

        debug!(name = %discount.name, kind = ?discount.kind, "Inserting discount");

        sqlx::query(
            r#"
            INSERT INTO discounts (
                id, name, kind, value, is_active, valid_from, valid_until, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&discount.id)
        .bind(&discount.name)
        .bind(discount.kind)
        .bind(discount.value)
        .bind(discount.is_active)
        .bind(discount.valid_from)
        .bind(discount.valid_until)
        .bind(discount.created_at)
        .execute(&self.pool)
        .await?;

        Ok(discount.clone())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Discount>> {
        let discount = sqlx::query_as::<_, Discount>(
            r#"
            SELECT id, name, kind, value, is_active, valid_from, valid_until, created_at
            FROM discounts
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(discount)
    }

    /// Lists discounts usable at `now` (active and inside their window).
    pub async fn list_active(&self, now: DateTime<Utc>) -> DbResult<Vec<Discount>> {
        let discounts = sqlx::query_as::<_, Discount>(
            r#"
            SELECT id, name, kind, value, is_active, valid_from, valid_until, created_at
            FROM discounts
            WHERE is_active = 1
              AND (valid_from IS NULL OR valid_from <= ?1)
              AND (valid_until IS NULL OR valid_until >= ?1)
            ORDER BY name
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(discounts)
    }

    /// Retires a discount. Orders that already used it keep their amounts.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE discounts SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Discount", id));
        }

        debug!(id = %id, "Discount deactivated");
        Ok(())
    }
}
