//! # Material Repository
//!
//! Ingredient stock, product recipes and the stock movement ledger.
//!
//! ## Stock Ledger
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every stock change is a delta plus a movement row:                     │
//! │                                                                         │
//! │    UPDATE materials SET stock_quantity = stock_quantity + ?             │
//! │    INSERT INTO stock_movements (material_id, delta, reason, ...)        │
//! │                                                                         │
//! │  reason    written by                                                   │
//! │  ───────   ──────────────────────────────                               │
//! │  sale      order create (recipe × quantity, negative)                   │
//! │  void      order void (positive, mirrors the sale)                      │
//! │  count     settlement (counted − system figure)                         │
//! │  restock   back office deliveries                                       │
//! │                                                                         │
//! │  SUM(delta) over a material's movements equals its stock.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tally_core::validation::{validate_name, validate_non_negative, validate_recipe_quantity};
use tally_core::{Material, MovementReason, RecipeLine, StockMovement, ValidationError};

/// Repository for materials, recipes and stock movements.
#[derive(Debug, Clone)]
pub struct MaterialRepository {
    pool: SqlitePool,
}

impl MaterialRepository {
    /// Creates a new MaterialRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MaterialRepository { pool }
    }

    /// Inserts a new material.
    ///
    /// A non-zero opening stock is recorded as a restock movement so the
    /// ledger always sums to the stock figure.
    pub async fn insert(&self, material: &Material) -> DbResult<Material> {
        validate_name("name", &material.name)?;
        validate_name("unit", &material.unit)?;
        validate_non_negative("low stock threshold", material.low_stock_threshold)?;

        debug!(name = %material.name, "Inserting material");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO materials (
                id, name, unit, stock_quantity, low_stock_threshold,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&material.id)
        .bind(&material.name)
        .bind(&material.unit)
        .bind(material.low_stock_threshold)
        .bind(material.is_active)
        .bind(material.created_at)
        .bind(material.updated_at)
        .execute(&mut *tx)
        .await?;

        if material.stock_quantity != 0 {
            apply_movement(
                &mut tx,
                &material.id,
                material.stock_quantity,
                MovementReason::Restock,
                None,
                material.created_at,
            )
            .await?;
        }

        let stored = fetch_material(&mut tx, &material.id).await?;
        tx.commit().await?;

        Ok(stored)
    }

    /// Gets a material by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Material>> {
        let material = sqlx::query_as::<_, Material>(
            r#"
            SELECT id, name, unit, stock_quantity, low_stock_threshold,
                   is_active, created_at, updated_at
            FROM materials
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(material)
    }

    /// Lists active materials sorted by name.
    pub async fn list_active(&self) -> DbResult<Vec<Material>> {
        let materials = sqlx::query_as::<_, Material>(
            r#"
            SELECT id, name, unit, stock_quantity, low_stock_threshold,
                   is_active, created_at, updated_at
            FROM materials
            WHERE is_active = 1
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(materials)
    }

    /// Lists active materials at or below their alert threshold.
    pub async fn low_stock(&self) -> DbResult<Vec<Material>> {
        let materials = sqlx::query_as::<_, Material>(
            r#"
            SELECT id, name, unit, stock_quantity, low_stock_threshold,
                   is_active, created_at, updated_at
            FROM materials
            WHERE is_active = 1 AND stock_quantity <= low_stock_threshold
            ORDER BY stock_quantity - low_stock_threshold, name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(materials)
    }

    /// Adds a delivery to stock.
    ///
    /// ## Returns
    /// The material with its new stock figure.
    pub async fn restock(
        &self,
        material_id: &str,
        quantity: i64,
        reference_id: Option<&str>,
    ) -> DbResult<Material> {
        if quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "restock quantity".to_string(),
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;
        let material = apply_movement(
            &mut tx,
            material_id,
            quantity,
            MovementReason::Restock,
            reference_id,
            Utc::now(),
        )
        .await?;
        tx.commit().await?;

        info!(
            material_id = %material_id,
            quantity,
            stock = material.stock_quantity,
            "Material restocked"
        );
        Ok(material)
    }

    /// Replaces a product's recipe atomically.
    ///
    /// An empty slice clears the recipe (the product consumes nothing).
    pub async fn set_recipe(
        &self,
        product_id: &str,
        components: &[(String, i64)],
    ) -> DbResult<Vec<RecipeLine>> {
        let mut seen = HashSet::new();
        for (material_id, qty) in components {
            validate_recipe_quantity(*qty)?;
            if !seen.insert(material_id.as_str()) {
                return Err(DbError::duplicate("recipe_lines.material_id", material_id));
            }
        }

        debug!(product_id = %product_id, lines = components.len(), "Replacing recipe");

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM recipe_lines WHERE product_id = ?1")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        for (material_id, qty) in components {
            sqlx::query(
                r#"
                INSERT INTO recipe_lines (product_id, material_id, quantity_per_unit)
                VALUES (?1, ?2, ?3)
                "#,
            )
            .bind(product_id)
            .bind(material_id)
            .bind(qty)
            .execute(&mut *tx)
            .await?;
        }

        let lines = fetch_recipe(&mut tx, product_id).await?;
        tx.commit().await?;

        Ok(lines)
    }

    /// Gets a product's recipe.
    pub async fn get_recipe(&self, product_id: &str) -> DbResult<Vec<RecipeLine>> {
        let mut conn = self.pool.acquire().await?;
        fetch_recipe(&mut conn, product_id).await
    }

    /// Lists a material's movements, newest first.
    pub async fn movements_for(&self, material_id: &str, limit: u32) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, material_id, delta, reason, reference_id, created_at
            FROM stock_movements
            WHERE material_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(material_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================
// Shared by the order and settlement repositories so stock changes always
// land in the caller's transaction.

/// Applies a stock delta and records the movement; returns the updated row.
pub(crate) async fn apply_movement(
    conn: &mut SqliteConnection,
    material_id: &str,
    delta: i64,
    reason: MovementReason,
    reference_id: Option<&str>,
    at: DateTime<Utc>,
) -> DbResult<Material> {
    debug!(material_id = %material_id, delta, ?reason, "Applying stock movement");

    let result = sqlx::query(
        r#"
        UPDATE materials
        SET stock_quantity = stock_quantity + ?2,
            updated_at = ?3
        WHERE id = ?1
        "#,
    )
    .bind(material_id)
    .bind(delta)
    .bind(at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Material", material_id));
    }

    sqlx::query(
        r#"
        INSERT INTO stock_movements (id, material_id, delta, reason, reference_id, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(material_id)
    .bind(delta)
    .bind(reason)
    .bind(reference_id)
    .bind(at)
    .execute(&mut *conn)
    .await?;

    fetch_material(conn, material_id).await
}

pub(crate) async fn fetch_material(conn: &mut SqliteConnection, id: &str) -> DbResult<Material> {
    sqlx::query_as::<_, Material>(
        r#"
        SELECT id, name, unit, stock_quantity, low_stock_threshold,
               is_active, created_at, updated_at
        FROM materials
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Material", id))
}

pub(crate) async fn fetch_recipe(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> DbResult<Vec<RecipeLine>> {
    let lines = sqlx::query_as::<_, RecipeLine>(
        r#"
        SELECT product_id, material_id, quantity_per_unit
        FROM recipe_lines
        WHERE product_id = ?1
        ORDER BY material_id
        "#,
    )
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(lines)
}

/// True when a change of `delta` took the material from above its
/// threshold to at-or-below it.
pub(crate) fn crossed_low_stock(after: &Material, delta: i64) -> bool {
    let before = after.stock_quantity - delta;
    before > after.low_stock_threshold && after.is_low_stock()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{material, memory_db, product};

    #[tokio::test]
    async fn test_insert_records_opening_stock() {
        let db = memory_db().await;
        let repo = db.materials();

        let milk = repo.insert(&material("Milk", "ml", 5_000, 1_000)).await.unwrap();
        assert_eq!(milk.stock_quantity, 5_000);

        let movements = repo.movements_for(&milk.id, 10).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].delta, 5_000);
        assert_eq!(movements[0].reason, MovementReason::Restock);
    }

    #[tokio::test]
    async fn test_restock_and_low_stock() {
        let db = memory_db().await;
        let repo = db.materials();

        let milk = repo.insert(&material("Milk", "ml", 500, 1_000)).await.unwrap();
        repo.insert(&material("Beans", "g", 2_000, 250)).await.unwrap();

        let low = repo.low_stock().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].id, milk.id);

        let milk = repo.restock(&milk.id, 1_000, Some("delivery-7")).await.unwrap();
        assert_eq!(milk.stock_quantity, 1_500);
        assert!(repo.low_stock().await.unwrap().is_empty());

        assert!(repo.restock(&milk.id, 0, None).await.is_err());
        assert!(matches!(
            repo.restock("missing", 10, None).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_set_recipe_replaces_lines() {
        let db = memory_db().await;
        let latte = db.products().insert(&product("LATTE-M", "Latte", 450)).await.unwrap();
        let milk = db.materials().insert(&material("Milk", "ml", 0, 0)).await.unwrap();
        let beans = db.materials().insert(&material("Beans", "g", 0, 0)).await.unwrap();
        let repo = db.materials();

        repo.set_recipe(&latte.id, &[(milk.id.clone(), 200), (beans.id.clone(), 18)])
            .await
            .unwrap();
        assert_eq!(repo.get_recipe(&latte.id).await.unwrap().len(), 2);

        let lines = repo.set_recipe(&latte.id, &[(milk.id.clone(), 250)]).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity_per_unit, 250);

        assert!(repo
            .set_recipe(&latte.id, &[(milk.id.clone(), 1), (milk.id.clone(), 2)])
            .await
            .is_err());
        assert!(repo.set_recipe(&latte.id, &[(milk.id.clone(), 0)]).await.is_err());
        // failed replacements leave the stored recipe alone
        assert_eq!(repo.get_recipe(&latte.id).await.unwrap().len(), 1);
    }

    #[test]
    fn test_crossed_low_stock() {
        let mut m = material("Milk", "ml", 900, 1_000);
        assert!(crossed_low_stock(&m, -200));
        assert!(!crossed_low_stock(&m, -50));

        m.stock_quantity = 1_000;
        assert!(crossed_low_stock(&m, -1));
        m.stock_quantity = 1_001;
        assert!(!crossed_low_stock(&m, -1));
    }
}
