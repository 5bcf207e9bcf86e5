//! # Order Pricing
//!
//! Discount and gift accounting for a single order.
//!
//! ## Accounting Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     How an Order is Priced                              │
//! │                                                                         │
//! │  Lines ──┬── gift lines ──────► charged 0, full value → gift_cents      │
//! │          │                                                              │
//! │          └── charged lines ───► Σ line totals = gross_cents             │
//! │                                     │                                   │
//! │                                     ▼                                   │
//! │                              discount rule                              │
//! │                    percentage: half-up(gross × bps / 10000)             │
//! │                    fixed:      min(value, gross)                        │
//! │                                     │                                   │
//! │                                     ▼                                   │
//! │                  allocate across charged lines (Σ == discount)          │
//! │                                     │                                   │
//! │                                     ▼                                   │
//! │                        total = gross − discount ≥ 0                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A gift is never also a discount: gift value is reported separately so the
//! shift's discount figure only reflects price reductions on charged goods.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Discount, DiscountKind};
use crate::validation::{validate_percentage_bps, validate_price_cents, validate_quantity};
use crate::{BPS_SCALE, MAX_ORDER_LINES};

// =============================================================================
// Inputs
// =============================================================================

/// One line as entered at the till, with the product already resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineInput {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub is_gift: bool,
}

impl LineInput {
    fn full_value(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

/// A discount reduced to the arithmetic that applies to one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum DiscountRule {
    Percentage { bps: u32 },
    FixedAmount { cents: i64 },
}

impl DiscountRule {
    /// Resolves a stored discount into a rule, checking it may be used at `now`.
    pub fn from_discount(discount: &Discount, now: DateTime<Utc>) -> CoreResult<Self> {
        let not_applicable = |reason: &str| CoreError::DiscountNotApplicable {
            discount_id: discount.id.clone(),
            reason: reason.to_string(),
        };

        if !discount.is_active {
            return Err(not_applicable("inactive"));
        }
        if matches!(discount.valid_from, Some(from) if now < from) {
            return Err(not_applicable("not yet valid"));
        }
        if matches!(discount.valid_until, Some(until) if now > until) {
            return Err(not_applicable("expired"));
        }

        let rule = match discount.kind {
            DiscountKind::Percentage => {
                let bps = u32::try_from(discount.value).map_err(|_| ValidationError::OutOfRange {
                    field: "discount percentage".to_string(),
                    min: 0,
                    max: BPS_SCALE,
                })?;
                DiscountRule::Percentage { bps }
            }
            DiscountKind::FixedAmount => DiscountRule::FixedAmount {
                cents: discount.value,
            },
        };
        rule.validate()?;
        Ok(rule)
    }

    fn validate(&self) -> CoreResult<()> {
        match *self {
            DiscountRule::Percentage { bps } => validate_percentage_bps(bps)?,
            DiscountRule::FixedAmount { cents } => validate_price_cents(cents)?,
        }
        Ok(())
    }

    /// The discount this rule grants on `gross`, never exceeding it.
    pub fn amount_for(&self, gross: Money) -> Money {
        if !gross.is_positive() {
            return Money::zero();
        }
        match *self {
            DiscountRule::Percentage { bps } => gross.percentage(bps).min(gross),
            DiscountRule::FixedAmount { cents } => Money::from_cents(cents).min(gross),
        }
    }
}

// =============================================================================
// Outputs
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricedLine {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub is_gift: bool,
    /// Charged amount before discount (zero for gifts).
    pub line_total_cents: i64,
    pub discount_cents: i64,
    pub gift_value_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricedOrder {
    pub lines: Vec<PricedLine>,
    pub gross_cents: i64,
    pub discount_cents: i64,
    pub gift_cents: i64,
    pub total_cents: i64,
}

// =============================================================================
// Pricing
// =============================================================================

/// Prices an order according to the gift and discount rules above.
///
/// ## Example
/// ```rust
/// use tally_core::pricing::{price_order, DiscountRule, LineInput};
///
/// let lines = vec![
///     LineInput {
///         product_id: "p1".into(), sku: "LATTE".into(), name: "Latte".into(),
///         unit_price_cents: 450, quantity: 2, is_gift: false,
///     },
///     LineInput {
///         product_id: "p2".into(), sku: "COOKIE".into(), name: "Cookie".into(),
///         unit_price_cents: 200, quantity: 1, is_gift: true,
///     },
/// ];
/// let priced = price_order(&lines, Some(DiscountRule::Percentage { bps: 1000 })).unwrap();
/// assert_eq!(priced.gross_cents, 900);
/// assert_eq!(priced.discount_cents, 90);
/// assert_eq!(priced.gift_cents, 200);
/// assert_eq!(priced.total_cents, 810);
/// ```
pub fn price_order(lines: &[LineInput], rule: Option<DiscountRule>) -> CoreResult<PricedOrder> {
    if lines.is_empty() {
        return Err(CoreError::EmptyOrder);
    }
    if lines.len() > MAX_ORDER_LINES {
        return Err(CoreError::TooManyLines {
            max: MAX_ORDER_LINES,
        });
    }
    for line in lines {
        validate_quantity(line.quantity)?;
        validate_price_cents(line.unit_price_cents)?;
    }
    if let Some(rule) = rule {
        rule.validate()?;
    }

    let charged: Vec<i64> = lines
        .iter()
        .map(|l| if l.is_gift { 0 } else { l.full_value().cents() })
        .collect();
    let gross: Money = charged.iter().map(|c| Money::from_cents(*c)).sum();
    let gift: Money = lines
        .iter()
        .filter(|l| l.is_gift)
        .map(LineInput::full_value)
        .sum();

    let discount = rule.map(|r| r.amount_for(gross)).unwrap_or_default();
    let shares = allocate(discount.cents(), &charged);

    let priced_lines = lines
        .iter()
        .zip(charged.iter().zip(shares))
        .map(|(line, (&line_total, share))| PricedLine {
            product_id: line.product_id.clone(),
            sku: line.sku.clone(),
            name: line.name.clone(),
            unit_price_cents: line.unit_price_cents,
            quantity: line.quantity,
            is_gift: line.is_gift,
            line_total_cents: line_total,
            discount_cents: share,
            gift_value_cents: if line.is_gift {
                line.full_value().cents()
            } else {
                0
            },
        })
        .collect();

    Ok(PricedOrder {
        lines: priced_lines,
        gross_cents: gross.cents(),
        discount_cents: discount.cents(),
        gift_cents: gift.cents(),
        total_cents: gross.saturating_sub_floor(discount).cents(),
    })
}

/// Splits `amount` across `weights` proportionally.
///
/// Each share is floored; leftover cents go one at a time to the heaviest
/// weights (earlier position wins ties). Zero weights never receive a share.
/// The shares always sum to `amount` when at least one weight is positive.
pub fn allocate(amount: i64, weights: &[i64]) -> Vec<i64> {
    let total: i128 = weights.iter().filter(|w| **w > 0).map(|w| *w as i128).sum();
    if total == 0 || amount == 0 {
        return vec![0; weights.len()];
    }

    let mut shares: Vec<i64> = weights
        .iter()
        .map(|&w| {
            if w > 0 {
                (amount as i128 * w as i128 / total) as i64
            } else {
                0
            }
        })
        .collect();

    let mut remainder = amount - shares.iter().sum::<i64>();

    let mut order: Vec<usize> = (0..weights.len()).filter(|&i| weights[i] > 0).collect();
    order.sort_by(|&a, &b| weights[b].cmp(&weights[a]).then(a.cmp(&b)));

    for idx in order.iter().cycle() {
        if remainder == 0 {
            break;
        }
        shares[*idx] += 1;
        remainder -= 1;
    }

    shares
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MAX_ITEM_QUANTITY, MAX_PRICE_CENTS};
    use chrono::Duration;

    fn line(sku: &str, price: i64, qty: i64, gift: bool) -> LineInput {
        LineInput {
            product_id: format!("p-{sku}"),
            sku: sku.to_string(),
            name: sku.to_string(),
            unit_price_cents: price,
            quantity: qty,
            is_gift: gift,
        }
    }

    fn discount(kind: DiscountKind, value: i64) -> Discount {
        Discount {
            id: "d-1".to_string(),
            name: "Promo".to_string(),
            kind,
            value,
            is_active: true,
            valid_from: None,
            valid_until: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_no_discount() {
        let priced = price_order(&[line("A", 300, 2, false), line("B", 150, 1, false)], None).unwrap();
        assert_eq!(priced.gross_cents, 750);
        assert_eq!(priced.discount_cents, 0);
        assert_eq!(priced.gift_cents, 0);
        assert_eq!(priced.total_cents, 750);
        assert!(priced.lines.iter().all(|l| l.discount_cents == 0));
    }

    #[test]
    fn test_gift_is_not_discount() {
        let priced = price_order(
            &[line("A", 500, 1, false), line("B", 250, 2, true)],
            Some(DiscountRule::FixedAmount { cents: 100 }),
        )
        .unwrap();

        assert_eq!(priced.gross_cents, 500);
        assert_eq!(priced.gift_cents, 500);
        assert_eq!(priced.discount_cents, 100);
        assert_eq!(priced.total_cents, 400);

        let gift_line = &priced.lines[1];
        assert_eq!(gift_line.line_total_cents, 0);
        assert_eq!(gift_line.discount_cents, 0);
        assert_eq!(gift_line.gift_value_cents, 500);
    }

    #[test]
    fn test_fixed_discount_capped_at_gross() {
        let priced = price_order(
            &[line("A", 300, 1, false)],
            Some(DiscountRule::FixedAmount { cents: 1000 }),
        )
        .unwrap();
        assert_eq!(priced.discount_cents, 300);
        assert_eq!(priced.total_cents, 0);
    }

    #[test]
    fn test_all_gift_order_has_no_discount() {
        let priced = price_order(
            &[line("A", 300, 1, true)],
            Some(DiscountRule::Percentage { bps: 5000 }),
        )
        .unwrap();
        assert_eq!(priced.gross_cents, 0);
        assert_eq!(priced.discount_cents, 0);
        assert_eq!(priced.gift_cents, 300);
        assert_eq!(priced.total_cents, 0);
    }

    #[test]
    fn test_line_discounts_sum_to_order_discount() {
        let lines = [
            line("A", 333, 1, false),
            line("B", 333, 1, false),
            line("C", 334, 1, false),
        ];
        let priced = price_order(&lines, Some(DiscountRule::FixedAmount { cents: 100 })).unwrap();
        let allocated: i64 = priced.lines.iter().map(|l| l.discount_cents).sum();
        assert_eq!(allocated, priced.discount_cents);
        // Heaviest line takes the leftover cent
        assert_eq!(priced.lines[2].discount_cents, 34);
        assert_eq!(priced.lines[0].discount_cents, 33);
        assert_eq!(priced.lines[1].discount_cents, 33);
    }

    #[test]
    fn test_allocate_ties_prefer_earlier_lines() {
        assert_eq!(allocate(2, &[100, 100, 100]), vec![1, 1, 0]);
        assert_eq!(allocate(5, &[0, 10]), vec![0, 5]);
        assert_eq!(allocate(0, &[10, 20]), vec![0, 0]);
        assert_eq!(allocate(7, &[0, 0]), vec![0, 0]);
    }

    #[test]
    fn test_empty_order_rejected() {
        assert!(matches!(price_order(&[], None), Err(CoreError::EmptyOrder)));
    }

    #[test]
    fn test_invalid_lines_rejected() {
        assert!(price_order(&[line("A", 100, 0, false)], None).is_err());
        assert!(price_order(&[line("A", -1, 1, false)], None).is_err());
        assert!(price_order(
            &[line("A", 100, 1, false)],
            Some(DiscountRule::Percentage { bps: 10_001 })
        )
        .is_err());
    }

    #[test]
    fn test_huge_prices_rejected_before_arithmetic() {
        let err = price_order(&[line("A", i64::MAX / 2 + 1, 2, false)], None).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OutOfRange { max: MAX_PRICE_CENTS, .. })
        ));

        assert!(price_order(
            &[line("A", 100, 1, false)],
            Some(DiscountRule::FixedAmount { cents: i64::MAX })
        )
        .is_err());
    }

    #[test]
    fn test_largest_order_stays_exact() {
        let lines: Vec<LineInput> = (0..MAX_ORDER_LINES)
            .map(|i| line(&format!("P{i}"), MAX_PRICE_CENTS, MAX_ITEM_QUANTITY, false))
            .collect();
        let priced = price_order(&lines, Some(DiscountRule::Percentage { bps: 3333 })).unwrap();

        let gross = MAX_PRICE_CENTS * MAX_ITEM_QUANTITY * MAX_ORDER_LINES as i64;
        assert_eq!(priced.gross_cents, gross);
        assert!(priced.total_cents > 0);
        let allocated: i64 = priced.lines.iter().map(|l| l.discount_cents).sum();
        assert_eq!(allocated, priced.discount_cents);
    }

    #[test]
    fn test_rule_from_discount() {
        let now = Utc::now();

        let rule = DiscountRule::from_discount(&discount(DiscountKind::Percentage, 1500), now).unwrap();
        assert_eq!(rule, DiscountRule::Percentage { bps: 1500 });

        let mut inactive = discount(DiscountKind::FixedAmount, 100);
        inactive.is_active = false;
        assert!(matches!(
            DiscountRule::from_discount(&inactive, now),
            Err(CoreError::DiscountNotApplicable { .. })
        ));

        let mut expired = discount(DiscountKind::FixedAmount, 100);
        expired.valid_until = Some(now - Duration::hours(1));
        assert!(DiscountRule::from_discount(&expired, now).is_err());

        let mut future = discount(DiscountKind::FixedAmount, 100);
        future.valid_from = Some(now + Duration::hours(1));
        assert!(DiscountRule::from_discount(&future, now).is_err());

        assert!(DiscountRule::from_discount(&discount(DiscountKind::Percentage, -5), now).is_err());
    }
}
