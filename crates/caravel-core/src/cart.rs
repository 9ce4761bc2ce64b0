//! # Cart Math
//!
//! Pure pricing functions for the sale engine.
//!
//! ## Cart Lifecycle
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                       Cart → Sale Flow                               │
//! │                                                                      │
//! │  add line ──► CartLine { sale_id: None }   (no stock deducted)       │
//! │       │                                                              │
//! │       ▼                                                              │
//! │  line_value(qty, selling, discount)        (frozen into the line)    │
//! │       │                                                              │
//! │       ▼                                                              │
//! │  checkout ──► sales_value(Σ lines, aggregate discount)               │
//! │       │                                                              │
//! │       ▼                                                              │
//! │  Sale created, lines assigned, stock deducted - one transaction      │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Deduction is deferred to checkout by contract: a cart is provisional
//! and abandoning it must leave inventory untouched.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::CartLine;

// =============================================================================
// Pricing Functions
// =============================================================================

/// Value of one cart line: quantity × (selling price − per-unit discount).
///
/// ## Example
/// ```rust
/// use caravel_core::cart::line_value;
/// use caravel_core::money::Money;
///
/// // 4 units at 5.00 with 1.00 off each = 16.00
/// let value = line_value(4, Money::from_cents(500), Money::from_cents(100));
/// assert_eq!(value.cents(), 1600);
/// ```
#[inline]
pub fn line_value(quantity: i64, selling_price: Money, discount: Money) -> Money {
    (selling_price - discount).multiply_quantity(quantity)
}

/// Sales value of a checkout: Σ line values − aggregate discount.
pub fn sales_value(lines: &[CartLine], aggregate_discount: Money) -> Money {
    let subtotal: i64 = lines.iter().map(|l| l.value_cents).sum();
    Money::from_cents(subtotal) - aggregate_discount
}

// =============================================================================
// Cart Totals
// =============================================================================

/// Summary of the pending (unassigned) lines for a shop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartTotals {
    pub line_count: usize,
    pub total_quantity: i64,
    pub subtotal_cents: i64,
}

impl CartTotals {
    /// Computes totals over a set of cart lines.
    pub fn of(lines: &[CartLine]) -> Self {
        CartTotals {
            line_count: lines.len(),
            total_quantity: lines.iter().map(|l| l.quantity).sum(),
            subtotal_cents: lines.iter().map(|l| l.value_cents).sum(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_line(quantity: i64, selling_cents: i64, discount_cents: i64) -> CartLine {
        let value =
            line_value(quantity, Money::from_cents(selling_cents), Money::from_cents(discount_cents));
        CartLine {
            id: "line".to_string(),
            shop_id: "shop".to_string(),
            item_id: "item".to_string(),
            quantity,
            discount_cents,
            cost_cents: 300,
            selling_cents,
            value_cents: value.cents(),
            sale_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_line_value() {
        // 4 × (5.00 − 1.00) = 16.00
        let value = line_value(4, Money::from_cents(500), Money::from_cents(100));
        assert_eq!(value.cents(), 1600);
    }

    #[test]
    fn test_line_value_without_discount() {
        let value = line_value(3, Money::from_cents(250), Money::zero());
        assert_eq!(value.cents(), 750);
    }

    #[test]
    fn test_sales_value_with_aggregate_discount() {
        let lines = vec![test_line(4, 500, 100), test_line(2, 250, 0)];
        // 1600 + 500 − 100 = 2000
        assert_eq!(sales_value(&lines, Money::from_cents(100)).cents(), 2000);
    }

    #[test]
    fn test_cart_totals() {
        let lines = vec![test_line(4, 500, 100), test_line(2, 250, 0)];
        let totals = CartTotals::of(&lines);
        assert_eq!(totals.line_count, 2);
        assert_eq!(totals.total_quantity, 6);
        assert_eq!(totals.subtotal_cents, 2100);
    }
}
