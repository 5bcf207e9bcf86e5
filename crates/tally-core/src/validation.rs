//! # Validation Module
//!
//! Input validation utilities for Tally POS.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: Terminal / dashboard - basic format checks, user feedback     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - business rule validation                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite - NOT NULL, UNIQUE, CHECK, foreign keys                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::validation::{validate_sku, validate_quantity};
//!
//! validate_sku("LATTE-M").unwrap();
//! validate_quantity(2).unwrap();
//! ```

use crate::error::ValidationError;
use crate::{BPS_SCALE, MAX_ITEM_QUANTITY, MAX_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU: 1-50 characters of letters, digits, `-` and `_`.
///
/// ```rust
/// use tally_core::validation::validate_sku;
///
/// assert!(validate_sku("ESPRESSO-2").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::required("sku"));
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (product, material, discount, cashier).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required(field));
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an order line quantity (1..=999).
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price or fixed amount in cents (0..=`MAX_PRICE_CENTS`).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a percentage in basis points (0..=10000).
pub fn validate_percentage_bps(bps: u32) -> ValidationResult<()> {
    if bps as i64 > BPS_SCALE {
        return Err(ValidationError::OutOfRange {
            field: "discount percentage".to_string(),
            min: 0,
            max: BPS_SCALE,
        });
    }

    Ok(())
}

/// Validates that an amount or quantity is not negative.
pub fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a recipe consumption (strictly positive).
pub fn validate_recipe_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "recipe quantity".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a UUID string.
///
/// ```rust
/// use tally_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required("id"));
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

/// Validates the idempotency key a terminal attaches to an order.
///
/// Any non-empty token up to 64 characters of letters, digits, `-` and `_`;
/// terminals normally send a UUID.
pub fn validate_client_order_id(id: &str) -> ValidationResult<()> {
    if id.is_empty() {
        return Err(ValidationError::required("client_order_id"));
    }

    if id.len() > 64 {
        return Err(ValidationError::TooLong {
            field: "client_order_id".to_string(),
            max: 64,
        });
    }

    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(ValidationError::InvalidFormat {
            field: "client_order_id".to_string(),
            reason: "must contain only ASCII letters, numbers, hyphens, and underscores"
                .to_string(),
        });
    }

    Ok(())
}

/// Parses the numeric chat user id given to `/approve` and `/reject`.
///
/// ```rust
/// use tally_core::validation::validate_chat_user_id;
///
/// assert_eq!(validate_chat_user_id(" 4242 ").unwrap(), 4242);
/// assert!(validate_chat_user_id("@dana").is_err());
/// ```
pub fn validate_chat_user_id(raw: &str) -> ValidationResult<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::required("chat user id"));
    }

    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        Ok(_) => Err(ValidationError::MustBePositive {
            field: "chat user id".to_string(),
        }),
        Err(_) => Err(ValidationError::InvalidFormat {
            field: "chat user id".to_string(),
            reason: "must be a number".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("LATTE-M").is_ok());
        assert!(validate_sku("bun_2").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "Flat White").is_ok());
        assert!(validate_name("name", " ").is_err());
        assert!(validate_name("name", &"x".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_amounts() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(-1).is_err());
        assert!(validate_price_cents(MAX_PRICE_CENTS).is_ok());
        assert!(validate_price_cents(MAX_PRICE_CENTS + 1).is_err());
        assert!(validate_price_cents(i64::MAX).is_err());
        assert!(validate_percentage_bps(10_000).is_ok());
        assert!(validate_percentage_bps(10_001).is_err());
        assert!(validate_non_negative("cash", 0).is_ok());
        assert!(validate_non_negative("cash", -1).is_err());
        assert!(validate_recipe_quantity(0).is_err());
    }

    #[test]
    fn test_validate_ids() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("123").is_err());
        assert_eq!(validate_chat_user_id("17").unwrap(), 17);
        assert!(validate_chat_user_id("").is_err());
        assert!(validate_chat_user_id("0").is_err());
        assert!(validate_chat_user_id("abc").is_err());

        assert!(validate_client_order_id("t1-000042").is_ok());
        assert!(validate_client_order_id("").is_err());
        assert!(validate_client_order_id("a b").is_err());
        assert!(validate_client_order_id(&"a".repeat(65)).is_err());
    }
}
