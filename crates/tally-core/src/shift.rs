//! # Shift Totals
//!
//! Running totals kept on the shift row while orders come in.
//!
//! ## Delta Bookkeeping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Order completed ──► OrderContribution ──► totals.record(c)             │
//! │  Order voided    ──► same contribution ──► totals.reverse(c)            │
//! │                                                                         │
//! │  The database applies the same contribution as                          │
//! │      UPDATE shifts SET gross_cents = gross_cents + ?, ...               │
//! │  so concurrent orders never overwrite each other's totals.              │
//! │                                                                         │
//! │  At settlement the totals are recomputed from the completed orders      │
//! │  (from_orders) and compared with the running figures (drift).           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - `net == gross - discount`
//! - `cash + card + transfer == net`

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{Order, OrderStatus, PaymentMethod, Shift};

/// The amounts a single order adds to its shift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderContribution {
    pub gross_cents: i64,
    pub discount_cents: i64,
    pub gift_cents: i64,
    pub net_cents: i64,
    pub cash_cents: i64,
    pub card_cents: i64,
    pub transfer_cents: i64,
}

impl OrderContribution {
    /// Builds the contribution from priced amounts and the tender used.
    pub fn new(
        gross_cents: i64,
        discount_cents: i64,
        gift_cents: i64,
        total_cents: i64,
        method: PaymentMethod,
    ) -> Self {
        let mut c = OrderContribution {
            gross_cents,
            discount_cents,
            gift_cents,
            net_cents: total_cents,
            ..Default::default()
        };
        match method {
            PaymentMethod::Cash => c.cash_cents = total_cents,
            PaymentMethod::Card => c.card_cents = total_cents,
            PaymentMethod::Transfer => c.transfer_cents = total_cents,
        }
        c
    }

    pub fn of(order: &Order) -> Self {
        Self::new(
            order.gross_cents,
            order.discount_cents,
            order.gift_cents,
            order.total_cents,
            order.payment_method,
        )
    }

    /// The contribution with every amount negated (used when voiding).
    pub fn negated(&self) -> Self {
        OrderContribution {
            gross_cents: -self.gross_cents,
            discount_cents: -self.discount_cents,
            gift_cents: -self.gift_cents,
            net_cents: -self.net_cents,
            cash_cents: -self.cash_cents,
            card_cents: -self.card_cents,
            transfer_cents: -self.transfer_cents,
        }
    }
}

/// Aggregated figures for a shift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShiftTotals {
    pub order_count: i64,
    pub gross_cents: i64,
    pub discount_cents: i64,
    pub gift_cents: i64,
    pub net_cents: i64,
    pub cash_cents: i64,
    pub card_cents: i64,
    pub transfer_cents: i64,
}

impl ShiftTotals {
    /// Reads the running totals stored on a shift.
    pub fn of_shift(shift: &Shift) -> Self {
        ShiftTotals {
            order_count: shift.order_count,
            gross_cents: shift.gross_cents,
            discount_cents: shift.discount_cents,
            gift_cents: shift.gift_cents,
            net_cents: shift.net_cents,
            cash_cents: shift.cash_cents,
            card_cents: shift.card_cents,
            transfer_cents: shift.transfer_cents,
        }
    }

    /// Recomputes totals from scratch; voided orders are ignored.
    pub fn from_orders<'a>(orders: impl IntoIterator<Item = &'a Order>) -> Self {
        let mut totals = ShiftTotals::default();
        for order in orders {
            if order.status == OrderStatus::Completed {
                totals.record(&OrderContribution::of(order));
            }
        }
        totals
    }

    pub fn record(&mut self, c: &OrderContribution) {
        self.order_count += 1;
        self.add(c);
    }

    pub fn reverse(&mut self, c: &OrderContribution) {
        self.order_count -= 1;
        self.add(&c.negated());
    }

    fn add(&mut self, c: &OrderContribution) {
        self.gross_cents += c.gross_cents;
        self.discount_cents += c.discount_cents;
        self.gift_cents += c.gift_cents;
        self.net_cents += c.net_cents;
        self.cash_cents += c.cash_cents;
        self.card_cents += c.card_cents;
        self.transfer_cents += c.transfer_cents;
    }

    /// Checks the two bookkeeping invariants.
    pub fn is_consistent(&self) -> bool {
        self.net_cents == self.gross_cents - self.discount_cents
            && self.cash_cents + self.card_cents + self.transfer_cents == self.net_cents
    }
}

/// Difference between the running totals and the recomputed ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TotalsDrift {
    pub running: ShiftTotals,
    pub recomputed: ShiftTotals,
}

/// Returns the drift when the running totals disagree with the orders.
pub fn drift(running: &ShiftTotals, recomputed: &ShiftTotals) -> Option<TotalsDrift> {
    if running == recomputed {
        None
    } else {
        Some(TotalsDrift {
            running: *running,
            recomputed: *recomputed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrderSource;
    use chrono::Utc;

    fn order(gross: i64, discount: i64, gift: i64, method: PaymentMethod, status: OrderStatus) -> Order {
        Order {
            id: uuid::Uuid::new_v4().to_string(),
            shift_id: "s-1".to_string(),
            client_order_id: uuid::Uuid::new_v4().to_string(),
            status,
            source: OrderSource::Terminal,
            payment_method: method,
            discount_id: None,
            gross_cents: gross,
            discount_cents: discount,
            gift_cents: gift,
            total_cents: gross - discount,
            void_reason: None,
            created_at: Utc::now(),
            voided_at: None,
        }
    }

    #[test]
    fn test_record_and_reverse_round_trip() {
        let a = order(1000, 100, 0, PaymentMethod::Cash, OrderStatus::Completed);
        let b = order(500, 0, 200, PaymentMethod::Card, OrderStatus::Completed);

        let mut totals = ShiftTotals::default();
        totals.record(&OrderContribution::of(&a));
        totals.record(&OrderContribution::of(&b));

        assert_eq!(totals.order_count, 2);
        assert_eq!(totals.gross_cents, 1500);
        assert_eq!(totals.discount_cents, 100);
        assert_eq!(totals.gift_cents, 200);
        assert_eq!(totals.net_cents, 1400);
        assert_eq!(totals.cash_cents, 900);
        assert_eq!(totals.card_cents, 500);
        assert!(totals.is_consistent());

        totals.reverse(&OrderContribution::of(&a));
        assert_eq!(totals.order_count, 1);
        assert_eq!(totals.net_cents, 500);
        assert_eq!(totals.cash_cents, 0);
        assert!(totals.is_consistent());
    }

    #[test]
    fn test_from_orders_skips_voided() {
        let orders = vec![
            order(1000, 0, 0, PaymentMethod::Cash, OrderStatus::Completed),
            order(700, 0, 0, PaymentMethod::Transfer, OrderStatus::Voided),
            order(300, 50, 0, PaymentMethod::Transfer, OrderStatus::Completed),
        ];
        let totals = ShiftTotals::from_orders(&orders);
        assert_eq!(totals.order_count, 2);
        assert_eq!(totals.net_cents, 1250);
        assert_eq!(totals.transfer_cents, 250);
    }

    #[test]
    fn test_drift_detection() {
        let orders = vec![order(1000, 0, 0, PaymentMethod::Cash, OrderStatus::Completed)];
        let recomputed = ShiftTotals::from_orders(&orders);

        assert!(drift(&recomputed, &recomputed).is_none());

        let mut running = recomputed;
        running.record(&OrderContribution::of(&orders[0]));
        let d = drift(&running, &recomputed).unwrap();
        assert_eq!(d.running.order_count, 2);
        assert_eq!(d.recomputed.order_count, 1);
    }
}
