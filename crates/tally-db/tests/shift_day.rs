//! A full trading day through the repositories: open, sell, replay, void,
//! close. Plus concurrent terminals against a file-backed database.

use chrono::{Duration, Utc};
use tally_core::shift::ShiftTotals;
use tally_core::{
    Discount, DiscountKind, Material, NotificationPayload, OrderSource, PaymentMethod, Product,
    SettlementStatus,
};
use tally_db::{
    CloseShift, Database, DbConfig, MaterialCount, NewOrder, NewOrderLine,
};
use uuid::Uuid;

fn product(sku: &str, name: &str, price_cents: i64) -> Product {
    let now = Utc::now();
    Product {
        id: Uuid::new_v4().to_string(),
        sku: sku.to_string(),
        name: name.to_string(),
        category: None,
        price_cents,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn material(name: &str, unit: &str, stock: i64, threshold: i64) -> Material {
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

struct Setup {
    latte: Product,
    cookie: Product,
    milk: Material,
    beans: Material,
}

async fn setup(db: &Database, milk_stock: i64) -> Setup {
    let latte = db.products().insert(&product("LATTE", "Latte", 450)).await.unwrap();
    let cookie = db.products().insert(&product("COOKIE", "Cookie", 200)).await.unwrap();
    let milk = db
        .materials()
        .insert(&material("Milk", "ml", milk_stock, 500))
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
    Setup {
        latte,
        cookie,
        milk,
        beans,
    }
}

fn line(product: &Product, quantity: i64, is_gift: bool) -> NewOrderLine {
    NewOrderLine {
        product_id: product.id.clone(),
        quantity,
        is_gift,
    }
}

fn order(shift_id: &str, client_id: &str, method: PaymentMethod, lines: Vec<NewOrderLine>) -> NewOrder {
    NewOrder {
        client_order_id: client_id.to_string(),
        shift_id: shift_id.to_string(),
        source: OrderSource::Terminal,
        payment_method: method,
        discount_id: None,
        lines,
        created_at: None,
    }
}

#[tokio::test]
async fn test_full_trading_day() {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let s = setup(&db, 2_000).await;
    let staff = db
        .discounts()
        .insert(&Discount {
            id: Uuid::new_v4().to_string(),
            name: "Staff 10%".to_string(),
            kind: DiscountKind::Percentage,
            value: 1_000,
            is_active: true,
            valid_from: None,
            valid_until: None,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    let shift = db.shifts().open("Dana", 5_000).await.unwrap();

    // 2 lattes with the staff discount: 900 - 90
    let mut discounted = order(&shift.id, "t1-0001", PaymentMethod::Cash, vec![line(&s.latte, 2, false)]);
    discounted.discount_id = Some(staff.id.clone());
    let r1 = db.orders().create(discounted).await.unwrap();
    assert_eq!(r1.order.total_cents, 810);

    // Latte plus a gifted cookie
    let r2 = db
        .orders()
        .create(order(
            &shift.id,
            "t1-0002",
            PaymentMethod::Card,
            vec![line(&s.latte, 1, false), line(&s.cookie, 1, true)],
        ))
        .await
        .unwrap();
    assert_eq!(r2.order.gift_cents, 200);
    assert_eq!(r2.order.discount_cents, 0);

    // Offline order, replayed twice by the terminal
    let mut offline = order(&shift.id, "t2-0001", PaymentMethod::Cash, vec![line(&s.cookie, 1, false)]);
    offline.source = OrderSource::OfflineReplay;
    offline.created_at = Some(Utc::now() - Duration::minutes(10));
    let first = db.orders().create(offline.clone()).await.unwrap();
    let second = db.orders().create(offline).await.unwrap();
    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(second.order.id, first.order.id);

    // Rung up by mistake
    let mistake = db
        .orders()
        .create(order(&shift.id, "t1-0003", PaymentMethod::Transfer, vec![line(&s.latte, 1, false)]))
        .await
        .unwrap();
    db.orders().void(&mistake.order.id, "wrong item").await.unwrap();

    let running = db.shifts().get_by_id(&shift.id).await.unwrap().unwrap();
    assert_eq!(running.order_count, 3);
    assert_eq!(running.gross_cents, 1_550);
    assert_eq!(running.discount_cents, 90);
    assert_eq!(running.gift_cents, 200);
    assert_eq!(running.net_cents, 1_460);
    assert_eq!(running.cash_cents, 1_010);
    assert_eq!(running.card_cents, 450);
    assert_eq!(running.transfer_cents, 0);
    assert!(ShiftTotals::of_shift(&running).is_consistent());

    // 400 + 200 sold, the voided 200 came back
    let milk = db.materials().get_by_id(&s.milk.id).await.unwrap().unwrap();
    assert_eq!(milk.stock_quantity, 1_400);

    let record = db
        .settlements()
        .close_shift(CloseShift {
            shift_id: shift.id.clone(),
            counted_cash_cents: 6_000,
            counts: vec![MaterialCount {
                material_id: s.milk.id.clone(),
                counted_quantity: 1_350,
            }],
            notes: Some("quiet day".to_string()),
            tolerance_cents: 0,
        })
        .await
        .unwrap();

    let settlement = &record.settlement;
    assert_eq!(settlement.expected_cash_cents, 6_010);
    assert_eq!(settlement.cash_variance_cents, -10);
    assert_eq!(settlement.status, SettlementStatus::Short);
    assert_eq!(settlement.net_cents, 1_460);
    assert_eq!(settlement.order_count, 3);
    assert!(!settlement.drift_corrected);
    assert_eq!(record.counts.len(), 1);
    assert_eq!(record.counts[0].variance, -50);

    let milk = db.materials().get_by_id(&s.milk.id).await.unwrap().unwrap();
    assert_eq!(milk.stock_quantity, 1_350);
    let beans = db.materials().get_by_id(&s.beans.id).await.unwrap().unwrap();
    assert_eq!(beans.stock_quantity, 1_000 - 54);

    let closed = db.shifts().get_by_id(&shift.id).await.unwrap().unwrap();
    assert!(!closed.is_open());
    assert!(db.shifts().current_open().await.unwrap().is_none());

    // No more sales into the closed shift, replays included
    let late = db
        .orders()
        .create(order(&shift.id, "t1-0004", PaymentMethod::Cash, vec![line(&s.cookie, 1, false)]))
        .await;
    assert!(late.is_err());

    let pending = db.notifications().get_pending(50, 5).await.unwrap();
    let closed_alert = pending
        .iter()
        .filter_map(|n| n.payload().ok())
        .find(|p| matches!(p, NotificationPayload::ShiftClosed { .. }))
        .unwrap();
    match closed_alert {
        NotificationPayload::ShiftClosed {
            shift_id,
            net_cents,
            cash_variance_cents,
            ..
        } => {
            assert_eq!(shift_id, shift.id);
            assert_eq!(net_cents, 1_460);
            assert_eq!(cash_variance_cents, -10);
        }
        other => panic!("unexpected payload: {other:?}"),
    }

    // Next shift can open now
    db.shifts().open("Sam", 5_000).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_terminals_keep_totals_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(DbConfig::new(dir.path().join("tally.db")).max_connections(5))
        .await
        .unwrap();
    let s = setup(&db, 10_000).await;
    let shift = db.shifts().open("Dana", 0).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..20 {
        let db = db.clone();
        let o = order(
            &shift.id,
            &format!("t{}-{i:04}", i % 3),
            PaymentMethod::Cash,
            vec![line(&s.latte, 1, false)],
        );
        handles.push(tokio::spawn(async move { db.orders().create(o).await }));
    }
    // Five terminals racing the same offline order
    for _ in 0..5 {
        let db = db.clone();
        let mut o = order(&shift.id, "dup-1", PaymentMethod::Card, vec![line(&s.cookie, 1, false)]);
        o.source = OrderSource::OfflineReplay;
        handles.push(tokio::spawn(async move { db.orders().create(o).await }));
    }

    let mut fresh = 0;
    for handle in handles {
        let receipt = handle.await.unwrap().unwrap();
        if !receipt.replayed {
            fresh += 1;
        }
    }
    assert_eq!(fresh, 21);

    let running = db.shifts().get_by_id(&shift.id).await.unwrap().unwrap();
    let orders = db.orders().list_for_shift(&shift.id).await.unwrap();
    let recomputed = ShiftTotals::from_orders(&orders);
    assert_eq!(ShiftTotals::of_shift(&running), recomputed);
    assert_eq!(running.order_count, 21);
    assert_eq!(running.cash_cents, 20 * 450);
    assert_eq!(running.card_cents, 200);

    let milk = db.materials().get_by_id(&s.milk.id).await.unwrap().unwrap();
    assert_eq!(milk.stock_quantity, 10_000 - 20 * 200);

    db.close().await;
}
