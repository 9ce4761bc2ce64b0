//! # Error Types
//!
//! Domain-specific error types for caravel-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                  │
//! │                                                                      │
//! │  caravel-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                     │
//! │  └── ValidationError  - Input validation failures                    │
//! │                                                                      │
//! │  caravel-db errors (separate crate)                                  │
//! │  └── DbError          - Database operation failures, wraps both      │
//! │                                                                      │
//! │  Flow: ValidationError → CoreError → DbError → caller                │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock/fund insufficiency, duplicate names, overpayment and empty carts
//! are user-facing and recoverable: the operation aborts cleanly with state
//! unchanged. A missing transfer match is a soft signal (logged, not fatal).
//! Anything else (negative quantity, unbalanced ledger) is made unreachable
//! by the transactional guarantees in caravel-db rather than caught here.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by the inventory and ledger protocols.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An item with this name already exists in the catalog.
    #[error("Item '{name}' already exists")]
    DuplicateItem { name: String },

    /// Requested more stock than the location holds.
    ///
    /// ## When This Occurs
    /// - Dispatching more than the source warehouse/shop has on hand
    /// - Checking out a cart line against depleted shop stock
    #[error("Insufficient stock for {item}: available {available}, requested {requested}")]
    InsufficientStock {
        item: String,
        available: i64,
        requested: i64,
    },

    /// The source account balance does not cover the transfer/charge.
    #[error("Insufficient funds in {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: String,
        balance: i64,
        requested: i64,
    },

    /// A debtor payment exceeds the outstanding balance.
    #[error("Overpayment for debtor {debtor}: unpaid {unpaid}, offered {offered}")]
    Overpayment {
        debtor: String,
        unpaid: i64,
        offered: i64,
    },

    /// No unreceived transfer matches the receive request.
    ///
    /// Surfaced as a warning by the receive workflow rather than aborting
    /// it; receiving is best-effort against the sent ledger.
    #[error("No unreceived transfer matches {item} x{quantity} for destination {destination}")]
    NoMatchingTransfer {
        item: String,
        quantity: i64,
        destination: String,
    },

    /// A transfer request that can never be valid (e.g. source == destination).
    #[error("Invalid transfer: {reason}")]
    InvalidTransfer { reason: String },

    /// Checkout was requested with no unassigned cart lines for the shop.
    #[error("Cart for shop {shop} is empty")]
    EmptyCart { shop: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, raised before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g. bad phone number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            item: "Rice".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Rice: available 3, requested 5"
        );

        let err = CoreError::DuplicateItem {
            name: "Oil".to_string(),
        };
        assert_eq!(err.to_string(), "Item 'Oil' already exists");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "name".to_string(),
        };
        assert_eq!(err.to_string(), "name is required");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
