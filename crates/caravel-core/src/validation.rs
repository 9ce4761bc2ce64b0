//! # Validation Module
//!
//! Input validation utilities, applied before business logic runs.
//!
//! Database constraints (NOT NULL, UNIQUE, CHECK) remain the last line of
//! defense; these validators give callers a typed, recoverable error first.

use crate::error::ValidationError;
use crate::money::Money;
use crate::MAX_LINE_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an item, location or account name.
///
/// ## Rules
/// - Must not be empty after trimming
/// - Must be at most 100 characters
///
/// ## Example
/// ```rust
/// use caravel_core::validation::validate_name;
///
/// assert!(validate_name("name", "Basmati Rice 5kg").is_ok());
/// assert!(validate_name("name", "   ").is_err());
/// ```
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.len() > 100 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 100,
        });
    }

    Ok(())
}

/// Validates a debtor phone number.
///
/// ## Rules
/// - Must not be empty
/// - At most 20 characters
/// - Digits, spaces, `+` and `-` only
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let phone = phone.trim();

    if phone.is_empty() {
        return Err(ValidationError::Required {
            field: "phone".to_string(),
        });
    }

    if phone.len() > 20 {
        return Err(ValidationError::TooLong {
            field: "phone".to_string(),
            max: 20,
        });
    }

    if !phone
        .chars()
        .all(|c| c.is_ascii_digit() || c == '+' || c == '-' || c == ' ')
    {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must contain only digits, spaces, '+' and '-'".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a stock or sale quantity.
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if quantity > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a monetary amount that must be strictly positive.
pub fn validate_positive_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.cents() <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a per-unit discount against the selling price.
///
/// A discount larger than the price would produce negative line values.
pub fn validate_discount(discount: Money, selling_price: Money) -> ValidationResult<()> {
    if discount.is_negative() {
        return Err(ValidationError::MustBePositive {
            field: "discount".to_string(),
        });
    }

    if discount > selling_price {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: selling_price.cents(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "Basmati Rice").is_ok());
        assert!(validate_name("name", "").is_err());
        assert!(validate_name("name", "   ").is_err());
        assert!(validate_name("name", &"x".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("555-1").is_ok());
        assert!(validate_phone("+254 712 345678").is_ok());
        assert!(validate_phone("").is_err());
        assert!(validate_phone("call-me-maybe").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-5).is_err());
        assert!(validate_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_discount() {
        let price = Money::from_cents(500);
        assert!(validate_discount(Money::from_cents(100), price).is_ok());
        assert!(validate_discount(Money::from_cents(500), price).is_ok());
        assert!(validate_discount(Money::from_cents(501), price).is_err());
        assert!(validate_discount(Money::from_cents(-1), price).is_err());
    }
}
