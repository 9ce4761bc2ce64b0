//! # Money Module
//!
//! Monetary values as integer cents, plus the one place average-cost
//! accounting is computed.
//!
//! ## Why Integer Money?
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                          │
//! │                                                                      │
//! │  In floating point:                                                  │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                        │
//! │                                                                      │
//! │  OUR SOLUTION: Integer Cents                                         │
//! │    1000 cents / 3 = 333 cents (×3 = 999 cents)                       │
//! │    We KNOW we lost 1 cent, and handle it explicitly                  │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every balance, price, valuation and line total in the system flows
//! through [`Money`]. Only display layers convert to major units.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// i64 (signed) allows negative values for refunds and signed deltas.
/// Single-field tuple struct: zero-cost abstraction over i64.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use caravel_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // 10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit should be negative:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use caravel_core::money::Money;
    ///
    /// let unit_cost = Money::from_cents(299);
    /// assert_eq!(unit_cost.multiply_quantity(3).cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Converts this amount through an exchange rate, rounding half away
    /// from zero. Uses i128 intermediates so large balances cannot overflow.
    pub fn convert(&self, rate: ExchangeRate) -> Money {
        let scaled = self.0 as i128 * rate.micros() as i128;
        let half = ExchangeRate::SCALE as i128 / 2;
        let rounded = if scaled >= 0 {
            (scaled + half) / ExchangeRate::SCALE as i128
        } else {
            (scaled - half) / ExchangeRate::SCALE as i128
        };
        Money(rounded as i64)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

// =============================================================================
// Exchange Rate
// =============================================================================

/// A currency conversion factor in micro-units (1_000_000 = 1.0).
///
/// Fixed-point like a tax rate in basis points, but with enough precision
/// for real FX quotes (278.5432 becomes 278_543_200 micros).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate(i64);

impl ExchangeRate {
    /// Micro-units per 1.0.
    pub const SCALE: i64 = 1_000_000;

    /// Creates a rate from micro-units.
    #[inline]
    pub const fn from_micros(micros: i64) -> Self {
        ExchangeRate(micros)
    }

    /// The identity rate (1.0): amounts pass through unchanged.
    #[inline]
    pub const fn identity() -> Self {
        ExchangeRate(Self::SCALE)
    }

    /// Returns the rate in micro-units.
    #[inline]
    pub const fn micros(&self) -> i64 {
        self.0
    }

    /// Checks whether this is the identity rate.
    #[inline]
    pub const fn is_identity(&self) -> bool {
        self.0 == Self::SCALE
    }
}

impl Default for ExchangeRate {
    fn default() -> Self {
        ExchangeRate::identity()
    }
}

// =============================================================================
// Average-Cost Accounting
// =============================================================================

/// Recomputes an item's unit cost as a quantity-weighted moving average
/// when a new batch arrives.
///
/// ```text
/// new_cost = (old_cost × old_total_qty + unit_cost × received_qty)
///            ─────────────────────────────────────────────────────
///                      old_total_qty + received_qty
/// ```
///
/// `old_total_qty` must count every unit of the item currently held
/// anywhere: all locations PLUS outstanding unreceived transfers. Stock in
/// transit carries the old cost, so leaving it out would over-weight the
/// incoming batch and silently mis-value goods the moment they land.
///
/// Receiving at the current cost (the transfer-completion path) leaves the
/// average unchanged. Division rounds half away from zero; with a zero
/// prior quantity the received batch's cost wins outright.
///
/// ## Example
/// ```rust
/// use caravel_core::money::{weighted_average_cost, Money};
///
/// // 100 units on hand at 3.00, 50 more arrive at 4.50:
/// let new_cost = weighted_average_cost(
///     Money::from_cents(300),
///     100,
///     Money::from_cents(450),
///     50,
/// );
/// assert_eq!(new_cost.cents(), 350); // (300×100 + 450×50) / 150
/// ```
pub fn weighted_average_cost(
    old_cost: Money,
    old_total_qty: i64,
    unit_cost: Money,
    received_qty: i64,
) -> Money {
    debug_assert!(received_qty > 0, "received quantity must be positive");

    let denominator = old_total_qty + received_qty;
    if denominator <= 0 || old_total_qty <= 0 {
        return unit_cost;
    }

    let numerator = old_cost.cents() as i128 * old_total_qty as i128
        + unit_cost.cents() as i128 * received_qty as i128;
    let half = denominator as i128 / 2;
    let averaged = (numerator + half) / denominator as i128;
    Money::from_cents(averaged as i64)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
    }

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);
        assert_eq!((-a).cents(), -1000);
    }

    #[test]
    fn test_multiply_quantity() {
        let unit_price = Money::from_cents(299);
        assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    }

    #[test]
    fn test_exchange_rate_identity() {
        let amount = Money::from_cents(123_456);
        assert_eq!(amount.convert(ExchangeRate::identity()), amount);
    }

    #[test]
    fn test_exchange_rate_conversion() {
        // 100.00 at rate 278.5 = 27_850.00
        let amount = Money::from_cents(10_000);
        let rate = ExchangeRate::from_micros(278_500_000);
        assert_eq!(amount.convert(rate).cents(), 2_785_000);
    }

    #[test]
    fn test_exchange_rate_rounding() {
        // 1 cent at 0.5 rounds half away from zero
        let amount = Money::from_cents(1);
        let rate = ExchangeRate::from_micros(500_000);
        assert_eq!(amount.convert(rate).cents(), 1);
    }

    /// Regression pin for the moving-average formula: the weighting MUST
    /// include quantity held everywhere plus unreceived transfers, and a
    /// receipt at any new cost revalues all historical on-hand stock.
    #[test]
    fn test_weighted_average_cost_formula() {
        // 100 @ 3.00 on hand everywhere (incl. in transit), +50 @ 4.50
        let new_cost = weighted_average_cost(
            Money::from_cents(300),
            100,
            Money::from_cents(450),
            50,
        );
        assert_eq!(new_cost.cents(), 350);

        // Uneven split rounds to nearest cent: (100×3 + 200×1) / 4 = 125
        let new_cost = weighted_average_cost(
            Money::from_cents(100),
            3,
            Money::from_cents(200),
            1,
        );
        assert_eq!(new_cost.cents(), 125);
    }

    #[test]
    fn test_weighted_average_receipt_at_current_cost_is_neutral() {
        // The transfer-receive path feeds the item's own cost back in;
        // the average must not drift.
        let cost = Money::from_cents(777);
        assert_eq!(weighted_average_cost(cost, 340, cost, 60), cost);
    }

    #[test]
    fn test_weighted_average_with_no_prior_stock() {
        // First receipt anywhere: incoming batch sets the cost.
        let new_cost = weighted_average_cost(
            Money::from_cents(9999),
            0,
            Money::from_cents(450),
            25,
        );
        assert_eq!(new_cost.cents(), 450);
    }
}
