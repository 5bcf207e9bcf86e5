//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tally-db errors                                                       │
//! │  └── DbError          - Database failures (wraps CoreError)            │
//! │                                                                         │
//! │  tally-notify errors                                                   │
//! │  └── NotifyError      - Chat API, webhook, dispatcher failures         │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → NotifyError / HTTP      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by pricing, shift and settlement logic.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An order was submitted without any lines.
    #[error("Order has no items")]
    EmptyOrder,

    /// Order has more lines than allowed.
    #[error("Order cannot have more than {max} lines")]
    TooManyLines { max: usize },

    /// A discount exists but cannot be used right now.
    ///
    /// ## When This Occurs
    /// - Discount was deactivated in the back office
    /// - Order time is outside `valid_from..valid_until`
    #[error("Discount {discount_id} is not applicable: {reason}")]
    DiscountNotApplicable { discount_id: String, reason: String },

    /// The shift is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Recording an order against a closed shift
    /// - Closing a shift twice
    #[error("Shift {shift_id} is {status}, cannot perform operation")]
    InvalidShiftStatus { shift_id: String, status: String },

    /// Only one shift may be open at a time.
    #[error("Shift {shift_id} is already open")]
    ShiftAlreadyOpen { shift_id: String },

    /// The order is not in a state that allows the requested operation.
    #[error("Order {order_id} is {status}, cannot perform operation")]
    InvalidOrderStatus { order_id: String, status: String },

    /// The same material appears twice in an inventory count.
    #[error("Material {material_id} counted more than once")]
    DuplicateCount { material_id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    pub(crate) fn required(field: &str) -> Self {
        ValidationError::Required {
            field: field.to_string(),
        }
    }
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidShiftStatus {
            shift_id: "s-1".to_string(),
            status: "closed".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Shift s-1 is closed, cannot perform operation"
        );

        let err = ValidationError::MustNotBeNegative {
            field: "counted cash".to_string(),
        };
        assert_eq!(err.to_string(), "counted cash must not be negative");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("sku").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
