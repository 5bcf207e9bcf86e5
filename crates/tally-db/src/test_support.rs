//! Fixtures shared by the repository unit tests.

use chrono::Utc;
use uuid::Uuid;

use crate::{Database, DbConfig};
use tally_core::{Discount, DiscountKind, Material, Product};

pub(crate) async fn memory_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

pub(crate) fn product(sku: &str, name: &str, price_cents: i64) -> Product {
    let now = Utc::now();
    Product {
        id: Uuid::new_v4().to_string(),
        sku: sku.to_string(),
        name: name.to_string(),
        category: Some("Coffee".to_string()),
        price_cents,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn material(name: &str, unit: &str, stock: i64, threshold: i64) -> Material {
    let now = Utc::now();
    Material {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        unit: unit.to_string(),
        stock_quantity: stock,
        low_stock_threshold: threshold,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn discount(name: &str, kind: DiscountKind, value: i64) -> Discount {
    Discount {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        kind,
        value,
        is_active: true,
        valid_from: None,
        valid_until: None,
        created_at: Utc::now(),
    }
}

/// A latte (milk 200 ml + beans 18 g) and a cookie with no recipe.
pub(crate) struct Menu {
    pub latte: Product,
    pub cookie: Product,
    pub milk: Material,
    pub beans: Material,
}

pub(crate) async fn menu(db: &Database, milk_stock: i64, milk_threshold: i64) -> Menu {
    let latte = db.products().insert(&product("LATTE-M", "Latte", 450)).await.unwrap();
    let cookie = db.products().insert(&product("COOKIE", "Cookie", 200)).await.unwrap();
    let milk = db
        .materials()
        .insert(&material("Milk", "ml", milk_stock, milk_threshold))
        .await
        .unwrap();
    let beans = db
        .materials()
        .insert(&material("Beans", "g", 1_000, 100))
        .await
        .unwrap();
    db.materials()
        .set_recipe(&latte.id, &[(milk.id.clone(), 200), (beans.id.clone(), 18)])
        .await
        .unwrap();

    Menu {
        latte,
        cookie,
        milk,
        beans,
    }
}
