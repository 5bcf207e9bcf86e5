//! # Order Repository
//!
//! Order creation, offline replay and voiding.
//!
//! ## Order Create (one transaction)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create(NewOrder)                                                       │
//! │                                                                         │
//! │  BEGIN (write lock taken up front)                                      │
//! │   1. client_order_id already stored? ──► return it, replayed = true     │
//! │   2. shift must be open                                                 │
//! │   3. resolve products (snapshot sku, name, price) and the discount      │
//! │   4. price_order() ── gifts at full value, discount split per line      │
//! │   5. INSERT order + items                                               │
//! │   6. UPDATE shifts SET x = x + ?            (running totals)            │
//! │   7. UPDATE materials SET stock = stock - ? (recipe × quantity)         │
//! │      + stock_movements rows, low-stock alerts queued in the outbox      │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  A duplicate that loses the UNIQUE(client_order_id) race rolls back     │
//! │  and returns the winner as a replay.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Void (one transaction)
//! Only completed orders of an open shift. The shift contribution is
//! reversed and every sale movement of the order is mirrored by a void
//! movement, so stock comes back exactly even if the recipe changed since.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::begin_write;
use crate::repository::material::{apply_movement, crossed_low_stock, fetch_recipe};
use crate::repository::notification::queue_in;
use crate::repository::shift::{apply_contribution, require_open};
use tally_core::pricing::{price_order, DiscountRule, LineInput, PricedOrder};
use tally_core::shift::OrderContribution;
use tally_core::validation::{validate_client_order_id, validate_name};
use tally_core::{
    CoreError, MovementReason, NotificationPayload, Order, OrderItem, OrderSource, OrderStatus,
    PaymentMethod, Product,
};

// =============================================================================
// Inputs and Outputs
// =============================================================================

/// One line as rung up at the terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewOrderLine {
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub is_gift: bool,
}

/// An order submitted by a terminal, live or replayed from its offline queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewOrder {
    /// Idempotency key minted by the terminal.
    pub client_order_id: String,
    pub shift_id: String,
    pub source: OrderSource,
    pub payment_method: PaymentMethod,
    pub discount_id: Option<String>,
    pub lines: Vec<NewOrderLine>,
    /// When the order was rung up; defaults to now. Offline replays carry
    /// the original time so discount windows are judged against it.
    #[ts(as = "Option<String>")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderReceipt {
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// True when the order had already been recorded and nothing changed.
    pub replayed: bool,
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Records an order exactly once per `client_order_id`.
    ///
    /// ## Returns
    /// * `Ok(receipt)` with `replayed = false` - order recorded now
    /// * `Ok(receipt)` with `replayed = true` - already recorded earlier
    /// * `Err(CoreError::InvalidShiftStatus)` - shift is closed
    /// * `Err(CoreError::DiscountNotApplicable)` - discount inactive or out of window
    /// * `Err(DbError::NotFound)` - unknown shift, product or discount
    pub async fn create(&self, new_order: NewOrder) -> DbResult<OrderReceipt> {
        validate_client_order_id(&new_order.client_order_id)?;

        let mut tx = begin_write(&self.pool).await?;

        if let Some(existing) = fetch_by_client_id(&mut tx, &new_order.client_order_id).await? {
            let items = fetch_items(&mut tx, &existing.id).await?;
            tx.rollback().await?;
            debug!(
                client_order_id = %new_order.client_order_id,
                order_id = %existing.id,
                "Order already recorded, returning stored copy"
            );
            return Ok(OrderReceipt {
                order: existing,
                items,
                replayed: true,
            });
        }

        let created_at = new_order.created_at.unwrap_or_else(Utc::now);
        let shift = require_open(&mut tx, &new_order.shift_id).await?;

        let mut inputs = Vec::with_capacity(new_order.lines.len());
        for line in &new_order.lines {
            let product = fetch_product(&mut tx, &line.product_id).await?;
            if !product.is_active && new_order.source == OrderSource::Terminal {
                return Err(DbError::not_found("Active product", &product.id));
            }
            inputs.push(LineInput {
                product_id: product.id,
                sku: product.sku,
                name: product.name,
                unit_price_cents: product.price_cents,
                quantity: line.quantity,
                is_gift: line.is_gift,
            });
        }

        let rule = match &new_order.discount_id {
            Some(discount_id) => {
                let discount = fetch_discount(&mut tx, discount_id).await?;
                Some(DiscountRule::from_discount(&discount, created_at)?)
            }
            None => None,
        };

        let priced = price_order(&inputs, rule)?;

        let order = Order {
            id: Uuid::new_v4().to_string(),
            shift_id: shift.id.clone(),
            client_order_id: new_order.client_order_id.clone(),
            status: OrderStatus::Completed,
            source: new_order.source,
            payment_method: new_order.payment_method,
            discount_id: new_order.discount_id.clone(),
            gross_cents: priced.gross_cents,
            discount_cents: priced.discount_cents,
            gift_cents: priced.gift_cents,
            total_cents: priced.total_cents,
            void_reason: None,
            created_at,
            voided_at: None,
        };

        match insert_order(&mut tx, &order).await {
            Ok(()) => {}
            Err(e) if e.is_unique_violation_on("orders.client_order_id") => {
                tx.rollback().await?;
                warn!(
                    client_order_id = %order.client_order_id,
                    "Concurrent duplicate order, returning the recorded one"
                );
                return self.replayed(&order.client_order_id).await;
            }
            Err(e) => return Err(e),
        }

        let items = insert_items(&mut tx, &order, &priced).await?;

        apply_contribution(&mut tx, &shift.id, &OrderContribution::of(&order), 1).await?;

        // Gifts leave the shelf too, so every line consumes its recipe.
        let mut consumption: BTreeMap<String, i64> = BTreeMap::new();
        for line in &priced.lines {
            for recipe in fetch_recipe(&mut tx, &line.product_id).await? {
                *consumption.entry(recipe.material_id).or_default() +=
                    recipe.quantity_per_unit * line.quantity;
            }
        }

        for (material_id, quantity) in &consumption {
            let delta = -quantity;
            let material = apply_movement(
                &mut tx,
                material_id,
                delta,
                MovementReason::Sale,
                Some(&order.id),
                created_at,
            )
            .await?;

            if crossed_low_stock(&material, delta) {
                warn!(
                    material_id = %material.id,
                    stock = material.stock_quantity,
                    threshold = material.low_stock_threshold,
                    "Material fell below its low-stock threshold"
                );
                let payload = NotificationPayload::LowStock {
                    material_id: material.id.clone(),
                    name: material.name.clone(),
                    unit: material.unit.clone(),
                    stock_quantity: material.stock_quantity,
                    threshold: material.low_stock_threshold,
                };
                queue_in(&mut tx, None, &payload, created_at).await?;
            }
        }

        tx.commit().await?;

        info!(
            order_id = %order.id,
            client_order_id = %order.client_order_id,
            shift_id = %order.shift_id,
            source = ?order.source,
            total_cents = order.total_cents,
            "Order recorded"
        );

        Ok(OrderReceipt {
            order,
            items,
            replayed: false,
        })
    }

    async fn replayed(&self, client_order_id: &str) -> DbResult<OrderReceipt> {
        let order = self
            .get_by_client_id(client_order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", client_order_id))?;
        let items = self.items(&order.id).await?;
        Ok(OrderReceipt {
            order,
            items,
            replayed: true,
        })
    }

    /// Voids a completed order of the open shift.
    pub async fn void(&self, order_id: &str, reason: &str) -> DbResult<Order> {
        validate_name("void reason", reason)?;

        let mut tx = begin_write(&self.pool).await?;

        let order = fetch_order(&mut tx, order_id).await?;
        if order.status != OrderStatus::Completed {
            return Err(CoreError::InvalidOrderStatus {
                order_id: order.id,
                status: order.status.to_string(),
            }
            .into());
        }
        require_open(&mut tx, &order.shift_id).await?;

        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE orders
            SET status = 'voided', void_reason = ?2, voided_at = ?3
            WHERE id = ?1 AND status = 'completed'
            "#,
        )
        .bind(&order.id)
        .bind(reason.trim())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        apply_contribution(
            &mut tx,
            &order.shift_id,
            &OrderContribution::of(&order).negated(),
            -1,
        )
        .await?;

        let sales: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT material_id, SUM(delta)
            FROM stock_movements
            WHERE reference_id = ?1 AND reason = 'sale'
            GROUP BY material_id
            ORDER BY material_id
            "#,
        )
        .bind(&order.id)
        .fetch_all(&mut *tx)
        .await?;

        for (material_id, sold) in sales {
            apply_movement(
                &mut tx,
                &material_id,
                -sold,
                MovementReason::Void,
                Some(&order.id),
                now,
            )
            .await?;
        }

        let voided = fetch_order(&mut tx, &order.id).await?;
        tx.commit().await?;

        info!(
            order_id = %voided.id,
            shift_id = %voided.shift_id,
            total_cents = voided.total_cents,
            reason = %reason.trim(),
            "Order voided"
        );
        Ok(voided)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, shift_id, client_order_id, status, source, payment_method,
                   discount_id, gross_cents, discount_cents, gift_cents, total_cents,
                   void_reason, created_at, voided_at
            FROM orders
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    pub async fn get_by_client_id(&self, client_order_id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_client_id(&mut conn, client_order_id).await
    }

    /// Items of an order in the order they were rung up.
    pub async fn items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let mut conn = self.pool.acquire().await?;
        fetch_items(&mut conn, order_id).await
    }

    /// All orders of a shift, voided ones included, oldest first.
    pub async fn list_for_shift(&self, shift_id: &str) -> DbResult<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        fetch_for_shift(&mut conn, shift_id).await
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

async fn fetch_order(conn: &mut SqliteConnection, id: &str) -> DbResult<Order> {
    sqlx::query_as::<_, Order>(
        r#"
        SELECT id, shift_id, client_order_id, status, source, payment_method,
               discount_id, gross_cents, discount_cents, gift_cents, total_cents,
               void_reason, created_at, voided_at
        FROM orders
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Order", id))
}

async fn fetch_by_client_id(
    conn: &mut SqliteConnection,
    client_order_id: &str,
) -> DbResult<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(
        r#"
        SELECT id, shift_id, client_order_id, status, source, payment_method,
               discount_id, gross_cents, discount_cents, gift_cents, total_cents,
               void_reason, created_at, voided_at
        FROM orders
        WHERE client_order_id = ?1
        "#,
    )
    .bind(client_order_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(order)
}

pub(crate) async fn fetch_for_shift(
    conn: &mut SqliteConnection,
    shift_id: &str,
) -> DbResult<Vec<Order>> {
    let orders = sqlx::query_as::<_, Order>(
        r#"
        SELECT id, shift_id, client_order_id, status, source, payment_method,
               discount_id, gross_cents, discount_cents, gift_cents, total_cents,
               void_reason, created_at, voided_at
        FROM orders
        WHERE shift_id = ?1
        ORDER BY created_at, rowid
        "#,
    )
    .bind(shift_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(orders)
}

async fn fetch_items(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT id, order_id, product_id, sku_snapshot, name_snapshot, unit_price_cents,
               quantity, line_total_cents, discount_cents, is_gift, gift_value_cents,
               created_at
        FROM order_items
        WHERE order_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

async fn fetch_product(conn: &mut SqliteConnection, id: &str) -> DbResult<Product> {
    sqlx::query_as::<_, Product>(
        r#"
        SELECT id, sku, name, category, price_cents, is_active, created_at, updated_at
        FROM products
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Product", id))
}

async fn fetch_discount(conn: &mut SqliteConnection, id: &str) -> DbResult<tally_core::Discount> {
    sqlx::query_as::<_, tally_core::Discount>(
        r#"
        SELECT id, name, kind, value, is_active, valid_from, valid_until, created_at
        FROM discounts
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Discount", id))
}

async fn insert_order(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (
            id, shift_id, client_order_id, status, source, payment_method,
            discount_id, gross_cents, discount_cents, gift_cents, total_cents,
            void_reason, created_at, voided_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
    )
    .bind(&order.id)
    .bind(&order.shift_id)
    .bind(&order.client_order_id)
    .bind(order.status)
    .bind(order.source)
    .bind(order.payment_method)
    .bind(&order.discount_id)
    .bind(order.gross_cents)
    .bind(order.discount_cents)
    .bind(order.gift_cents)
    .bind(order.total_cents)
    .bind(&order.void_reason)
    .bind(order.created_at)
    .bind(order.voided_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn insert_items(
    conn: &mut SqliteConnection,
    order: &Order,
    priced: &PricedOrder,
) -> DbResult<Vec<OrderItem>> {
    let mut items = Vec::with_capacity(priced.lines.len());

    for line in &priced.lines {
        let item = OrderItem {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            product_id: line.product_id.clone(),
            sku_snapshot: line.sku.clone(),
            name_snapshot: line.name.clone(),
            unit_price_cents: line.unit_price_cents,
            quantity: line.quantity,
            line_total_cents: line.line_total_cents,
            discount_cents: line.discount_cents,
            is_gift: line.is_gift,
            gift_value_cents: line.gift_value_cents,
            created_at: order.created_at,
        };

        sqlx::query(
            r#"
            INSERT INTO order_items (
                id, order_id, product_id, sku_snapshot, name_snapshot, unit_price_cents,
                quantity, line_total_cents, discount_cents, is_gift, gift_value_cents,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&item.id)
        .bind(&item.order_id)
        .bind(&item.product_id)
        .bind(&item.sku_snapshot)
        .bind(&item.name_snapshot)
        .bind(item.unit_price_cents)
        .bind(item.quantity)
        .bind(item.line_total_cents)
        .bind(item.discount_cents)
        .bind(item.is_gift)
        .bind(item.gift_value_cents)
        .bind(item.created_at)
        .execute(&mut *conn)
        .await?;

        items.push(item);
    }

    Ok(items)
}
