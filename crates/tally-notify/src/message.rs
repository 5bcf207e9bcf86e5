//! Chat message texts.
//!
//! Outbox entries store a [`NotificationPayload`]; the text is produced
//! here when the entry is delivered. Plain text only, no markup, so
//! product and cashier names never need escaping.

use tally_core::{Money, NotificationPayload, SettlementStatus, Shift};

pub const HELP: &str = "Tally POS bot\n\
/start - request admin access\n\
/status - current shift summary\n\
/approve <user id> - grant access to a pending user\n\
/reject <user id> - refuse a pending user\n\
/help - this message";

pub const ACCESS_DENIED: &str =
    "You are not an approved admin. Send /start to request access.";

/// Renders an outbox payload into the message text.
pub fn render(payload: &NotificationPayload) -> String {
    match payload {
        NotificationPayload::ShiftClosed {
            shift_id,
            cashier_name,
            order_count,
            net_cents,
            expected_cash_cents,
            counted_cash_cents,
            cash_variance_cents,
            status,
            discrepancies,
            drift_corrected,
        } => {
            let verdict = match status {
                SettlementStatus::Balanced => "balanced",
                SettlementStatus::Over => "OVER",
                SettlementStatus::Short => "SHORT",
            };
            let mut text = format!(
                "Shift closed by {cashier_name}\n\
                 Orders: {order_count}\n\
                 Net sales: {}\n\
                 Cash expected: {}\n\
                 Cash counted: {}\n\
                 Variance: {} ({verdict})",
                Money::from_cents(*net_cents),
                Money::from_cents(*expected_cash_cents),
                Money::from_cents(*counted_cash_cents),
                signed(*cash_variance_cents),
            );
            if *discrepancies > 0 {
                text.push_str(&format!("\nStock count differences: {discrepancies}"));
            }
            if *drift_corrected {
                text.push_str("\nRunning totals were corrected from the order records");
            }
            text.push_str(&format!("\nShift {}", short_id(shift_id)));
            text
        }
        NotificationPayload::LowStock {
            name,
            unit,
            stock_quantity,
            threshold,
            ..
        } => format!(
            "Low stock: {name} is at {stock_quantity} {unit} (threshold {threshold} {unit})"
        ),
        NotificationPayload::AdminRequest {
            chat_user_id,
            username,
        } => {
            let who = match username {
                Some(name) => format!("@{name} ({chat_user_id})"),
                None => chat_user_id.to_string(),
            };
            format!(
                "Admin access requested by {who}\n\
                 /approve {chat_user_id} or /reject {chat_user_id}"
            )
        }
        NotificationPayload::AdminDecision { approved, .. } => {
            if *approved {
                "Your admin access was approved. Send /help for the commands.".to_string()
            } else {
                "Your admin access request was rejected.".to_string()
            }
        }
        NotificationPayload::Reply { text } => text.clone(),
    }
}

/// Answer to `/status`.
pub fn shift_status(shift: Option<&Shift>) -> String {
    let Some(shift) = shift else {
        return "No shift is open.".to_string();
    };

    format!(
        "Shift open since {} ({})\n\
         Orders: {}\n\
         Gross: {}\n\
         Discounts: {}\n\
         Gifts: {}\n\
         Net: {}\n\
         Cash {} / Card {} / Transfer {}",
        shift.opened_at.format("%H:%M UTC"),
        shift.cashier_name,
        shift.order_count,
        Money::from_cents(shift.gross_cents),
        Money::from_cents(shift.discount_cents),
        Money::from_cents(shift.gift_cents),
        Money::from_cents(shift.net_cents),
        Money::from_cents(shift.cash_cents),
        Money::from_cents(shift.card_cents),
        Money::from_cents(shift.transfer_cents),
    )
}

fn signed(cents: i64) -> String {
    if cents > 0 {
        format!("+{}", Money::from_cents(cents))
    } else {
        Money::from_cents(cents).to_string()
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tally_core::ShiftStatus;

    fn closed(status: SettlementStatus, variance: i64) -> NotificationPayload {
        NotificationPayload::ShiftClosed {
            shift_id: "0f8e7d6c-1111-2222-3333-444455556666".into(),
            cashier_name: "Dana".into(),
            order_count: 42,
            net_cents: 123_450,
            expected_cash_cents: 60_000,
            counted_cash_cents: 60_000 + variance,
            cash_variance_cents: variance,
            status,
            discrepancies: 0,
            drift_corrected: false,
        }
    }

    #[test]
    fn test_shift_closed_text() {
        let text = render(&closed(SettlementStatus::Short, -250));
        assert!(text.contains("Shift closed by Dana"));
        assert!(text.contains("Net sales: 1234.50"));
        assert!(text.contains("Variance: -2.50 (SHORT)"));
        assert!(text.ends_with("Shift 0f8e7d6c"));
        assert!(!text.contains("Stock count"));

        let text = render(&closed(SettlementStatus::Over, 100));
        assert!(text.contains("Variance: +1.00 (OVER)"));
    }

    #[test]
    fn test_shift_closed_mentions_corrections() {
        let mut payload = closed(SettlementStatus::Balanced, 0);
        if let NotificationPayload::ShiftClosed {
            discrepancies,
            drift_corrected,
            ..
        } = &mut payload
        {
            *discrepancies = 2;
            *drift_corrected = true;
        }
        let text = render(&payload);
        assert!(text.contains("Stock count differences: 2"));
        assert!(text.contains("corrected"));
    }

    #[test]
    fn test_low_stock_and_admin_texts() {
        let low = render(&NotificationPayload::LowStock {
            material_id: "m".into(),
            name: "Milk".into(),
            unit: "ml".into(),
            stock_quantity: 400,
            threshold: 500,
        });
        assert_eq!(low, "Low stock: Milk is at 400 ml (threshold 500 ml)");

        let request = render(&NotificationPayload::AdminRequest {
            chat_user_id: 77,
            username: Some("sam".into()),
        });
        assert!(request.starts_with("Admin access requested by @sam (77)"));
        assert!(request.contains("/approve 77"));

        let denied = render(&NotificationPayload::AdminDecision {
            chat_user_id: 77,
            approved: false,
        });
        assert!(denied.contains("rejected"));
    }

    #[test]
    fn test_shift_status() {
        assert_eq!(shift_status(None), "No shift is open.");

        let shift = Shift {
            id: "s".into(),
            cashier_name: "Dana".into(),
            status: ShiftStatus::Open,
            opening_cash_cents: 10_000,
            order_count: 3,
            gross_cents: 1_550,
            discount_cents: 90,
            gift_cents: 200,
            net_cents: 1_460,
            cash_cents: 1_010,
            card_cents: 450,
            transfer_cents: 0,
            opened_at: Utc.with_ymd_and_hms(2026, 3, 2, 7, 30, 0).unwrap(),
            closed_at: None,
        };
        let text = shift_status(Some(&shift));
        assert!(text.starts_with("Shift open since 07:30 UTC (Dana)"));
        assert!(text.contains("Net: 14.60"));
        assert!(text.contains("Cash 10.10 / Card 4.50 / Transfer 0.00"));
    }
}
