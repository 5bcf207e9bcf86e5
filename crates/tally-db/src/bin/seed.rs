//! # Seed Data Generator
//!
//! Populates a database with a demo café menu for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./tally_dev.db
//! cargo run -p tally-db --bin seed
//!
//! # Specify database path
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db
//! ```
//!
//! ## Generated Data
//! - Materials with opening stock (milk, beans, syrup, flour, ...)
//! - Products in three categories, most with a recipe
//! - Two discounts: a 10% staff discount and a fixed loyalty voucher

use chrono::Utc;
use std::env;
use tally_core::{Discount, DiscountKind, Material, Product};
use tally_db::{Database, DbConfig};
use uuid::Uuid;

/// (name, unit, opening stock, low-stock threshold)
const MATERIALS: &[(&str, &str, i64, i64)] = &[
    ("Whole Milk", "ml", 20_000, 4_000),
    ("Oat Milk", "ml", 8_000, 2_000),
    ("Espresso Beans", "g", 5_000, 1_000),
    ("Vanilla Syrup", "ml", 1_500, 300),
    ("Cocoa Powder", "g", 1_000, 200),
    ("Croissant Dough", "pcs", 40, 10),
    ("Cookie Dough", "g", 3_000, 600),
];

/// (sku, name, category, price cents, recipe as (material name, quantity))
const PRODUCTS: &[(&str, &str, &str, i64, &[(&str, i64)])] = &[
    ("ESP-S", "Espresso", "Coffee", 250, &[("Espresso Beans", 18)]),
    (
        "LAT-M",
        "Latte",
        "Coffee",
        450,
        &[("Whole Milk", 200), ("Espresso Beans", 18)],
    ),
    (
        "LAT-O",
        "Oat Latte",
        "Coffee",
        500,
        &[("Oat Milk", 200), ("Espresso Beans", 18)],
    ),
    (
        "VAN-L",
        "Vanilla Latte",
        "Coffee",
        520,
        &[("Whole Milk", 200), ("Espresso Beans", 18), ("Vanilla Syrup", 20)],
    ),
    (
        "CHO-H",
        "Hot Chocolate",
        "Coffee",
        420,
        &[("Whole Milk", 250), ("Cocoa Powder", 25)],
    ),
    ("CRO-B", "Butter Croissant", "Bakery", 320, &[("Croissant Dough", 1)]),
    ("COO-C", "Chocolate Cookie", "Bakery", 200, &[("Cookie Dough", 60)]),
    ("WAT-S", "Still Water", "Drinks", 150, &[]),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./tally_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./tally_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tally POS Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Creating materials...");
    let mut materials = Vec::with_capacity(MATERIALS.len());
    for (name, unit, stock, threshold) in MATERIALS {
        let material = db
            .materials()
            .insert(&new_material(name, unit, *stock, *threshold))
            .await?;
        println!("  {} ({} {})", material.name, material.stock_quantity, material.unit);
        materials.push(material);
    }

    println!();
    println!("Creating products...");
    for (sku, name, category, price_cents, recipe) in PRODUCTS {
        let product = db
            .products()
            .insert(&new_product(sku, name, category, *price_cents))
            .await?;

        let lines: Vec<(String, i64)> = recipe
            .iter()
            .filter_map(|(material_name, qty)| {
                materials
                    .iter()
                    .find(|m| m.name == *material_name)
                    .map(|m| (m.id.clone(), *qty))
            })
            .collect();

        if !lines.is_empty() {
            db.materials().set_recipe(&product.id, &lines).await?;
        }
        println!(
            "  {} {} @ {} ({} recipe lines)",
            product.sku,
            product.name,
            product.price_cents,
            lines.len()
        );
    }

    println!();
    println!("Creating discounts...");
    for discount in [
        new_discount("Staff 10%", DiscountKind::Percentage, 1_000),
        new_discount("Loyalty Voucher", DiscountKind::FixedAmount, 300),
    ] {
        let discount = db.discounts().insert(&discount).await?;
        println!("  {} ({:?} {})", discount.name, discount.kind, discount.value);
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

fn new_material(name: &str, unit: &str, stock: i64, threshold: i64) -> Material {
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

fn new_product(sku: &str, name: &str, category: &str, price_cents: i64) -> Product {
    let now = Utc::now();
    Product {
        id: Uuid::new_v4().to_string(),
        sku: sku.to_string(),
        name: name.to_string(),
        category: Some(category.to_string()),
        price_cents,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn new_discount(name: &str, kind: DiscountKind, value: i64) -> Discount {
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
