//! # Settlement Reconciliation
//!
//! Compares what the drawer and the shelves should hold at the end of a
//! shift with what was physically counted.
//!
//! ```text
//!   expected_cash = opening_cash + cash sales
//!   variance      = counted_cash - expected_cash
//!
//!   |variance| <= tolerance  → Balanced
//!   variance   >  tolerance  → Over
//!   variance   < -tolerance  → Short
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::shift::ShiftTotals;
use crate::types::SettlementStatus;
use crate::validation::validate_non_negative;

/// A physical count of one material, paired with the system's figure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CountInput {
    pub material_id: String,
    pub expected_quantity: i64,
    pub counted_quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SettlementInput {
    pub opening_cash_cents: i64,
    pub counted_cash_cents: i64,
    pub tolerance_cents: i64,
    /// Authoritative totals for the shift.
    pub totals: ShiftTotals,
    pub counts: Vec<CountInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CountLine {
    pub material_id: String,
    pub expected_quantity: i64,
    pub counted_quantity: i64,
    pub variance: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SettlementReport {
    pub opening_cash_cents: i64,
    pub expected_cash_cents: i64,
    pub counted_cash_cents: i64,
    pub cash_variance_cents: i64,
    pub status: SettlementStatus,
    pub totals: ShiftTotals,
    pub counts: Vec<CountLine>,
}

impl SettlementReport {
    /// Count lines whose physical quantity differs from the system figure.
    pub fn discrepancies(&self) -> impl Iterator<Item = &CountLine> {
        self.counts.iter().filter(|c| c.variance != 0)
    }
}

/// Classifies a cash variance against the tolerance.
pub fn classify(variance_cents: i64, tolerance_cents: i64) -> SettlementStatus {
    if variance_cents.abs() <= tolerance_cents {
        SettlementStatus::Balanced
    } else if variance_cents > 0 {
        SettlementStatus::Over
    } else {
        SettlementStatus::Short
    }
}

/// Reconciles counted cash and inventory against the shift's figures.
pub fn reconcile(input: &SettlementInput) -> CoreResult<SettlementReport> {
    validate_non_negative("counted cash", input.counted_cash_cents)?;
    validate_non_negative("opening cash", input.opening_cash_cents)?;
    validate_non_negative("cash tolerance", input.tolerance_cents)?;

    let mut seen = HashSet::new();
    let mut counts = Vec::with_capacity(input.counts.len());
    for count in &input.counts {
        if !seen.insert(count.material_id.as_str()) {
            return Err(CoreError::DuplicateCount {
                material_id: count.material_id.clone(),
            });
        }
        validate_non_negative("counted quantity", count.counted_quantity)?;
        counts.push(CountLine {
            material_id: count.material_id.clone(),
            expected_quantity: count.expected_quantity,
            counted_quantity: count.counted_quantity,
            variance: count.counted_quantity - count.expected_quantity,
        });
    }

    let expected_cash = input.opening_cash_cents + input.totals.cash_cents;
    let variance = input.counted_cash_cents - expected_cash;

    Ok(SettlementReport {
        opening_cash_cents: input.opening_cash_cents,
        expected_cash_cents: expected_cash,
        counted_cash_cents: input.counted_cash_cents,
        cash_variance_cents: variance,
        status: classify(variance, input.tolerance_cents),
        totals: input.totals,
        counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(counted_cash: i64, tolerance: i64) -> SettlementInput {
        SettlementInput {
            opening_cash_cents: 10_000,
            counted_cash_cents: counted_cash,
            tolerance_cents: tolerance,
            totals: ShiftTotals {
                order_count: 3,
                gross_cents: 5_000,
                discount_cents: 500,
                gift_cents: 300,
                net_cents: 4_500,
                cash_cents: 2_500,
                card_cents: 2_000,
                transfer_cents: 0,
            },
            counts: vec![],
        }
    }

    #[test]
    fn test_balanced() {
        let report = reconcile(&input(12_500, 0)).unwrap();
        assert_eq!(report.expected_cash_cents, 12_500);
        assert_eq!(report.cash_variance_cents, 0);
        assert_eq!(report.status, SettlementStatus::Balanced);
    }

    #[test]
    fn test_over_and_short() {
        let over = reconcile(&input(12_600, 50)).unwrap();
        assert_eq!(over.cash_variance_cents, 100);
        assert_eq!(over.status, SettlementStatus::Over);

        let short = reconcile(&input(12_400, 50)).unwrap();
        assert_eq!(short.cash_variance_cents, -100);
        assert_eq!(short.status, SettlementStatus::Short);

        let within = reconcile(&input(12_450, 50)).unwrap();
        assert_eq!(within.status, SettlementStatus::Balanced);
    }

    #[test]
    fn test_inventory_variances() {
        let mut i = input(12_500, 0);
        i.counts = vec![
            CountInput {
                material_id: "milk".to_string(),
                expected_quantity: 2_000,
                counted_quantity: 1_800,
            },
            CountInput {
                material_id: "beans".to_string(),
                expected_quantity: 500,
                counted_quantity: 500,
            },
        ];
        let report = reconcile(&i).unwrap();
        assert_eq!(report.counts[0].variance, -200);
        assert_eq!(report.counts[1].variance, 0);
        assert_eq!(report.discrepancies().count(), 1);
    }

    #[test]
    fn test_rejects_bad_counts() {
        assert!(reconcile(&input(-1, 0)).is_err());
        assert!(reconcile(&input(100, -1)).is_err());

        let mut dup = input(12_500, 0);
        let count = CountInput {
            material_id: "milk".to_string(),
            expected_quantity: 1,
            counted_quantity: 1,
        };
        dup.counts = vec![count.clone(), count];
        assert!(matches!(
            reconcile(&dup),
            Err(CoreError::DuplicateCount { .. })
        ));

        let mut negative = input(12_500, 0);
        negative.counts = vec![CountInput {
            material_id: "milk".to_string(),
            expected_quantity: 10,
            counted_quantity: -1,
        }];
        assert!(reconcile(&negative).is_err());
    }
}
