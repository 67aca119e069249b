//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Summing many line items in binary floating point:                      │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A day-end close sums hundreds of sales and payment allocations.        │
//! │  Every stray fraction compounds into the reported net profit.           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units (fils / cents)                       │
//! │    26250 fils = AED 262.50, exactly, forever                            │
//! │    Rounding happens once, at the point a rate is applied                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use expo_core::money::Money;
//!
//! let price = Money::from_cents(10000); // AED 100.00
//! let line = price * 2;                 // AED 200.00
//! let tendered: Money = "262.50".parse().unwrap();
//! assert_eq!(tendered.cents(), 26250);
//! assert_eq!(line.cents(), 20000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;
use thiserror::Error;
use ts_rs::TS;

use crate::types::Currency;

/// Basis points in one whole (100%).
pub const BPS_PER_UNIT: i64 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (fils for AED).
///
/// ## Where Money is Used
/// ```text
/// StockSnapshot.unit_price ──► CartLine.line_total ──► Cart subtotal
///                                                          │
///                                      tax (5%) ◄──────────┤
///                                                          ▼
/// Payment.tendered ──► settlement ──► Sale.total_amount ──► ClosureReport
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ```rust
    /// use expo_core::money::Money;
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
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Returns the value, or zero when it is negative.
    ///
    /// Used for change due: a customer is never owed negative change.
    #[inline]
    pub const fn clamp_non_negative(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }

    /// Multiplies money by a quantity.
    ///
    /// ```rust
    /// use expo_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(15000); // Oud Royal Attar
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 45000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Multiplies by a quantity, `None` on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Adds, `None` on overflow.
    ///
    /// ```rust
    /// use expo_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1).checked_add(Money::from_cents(2)), Some(Money::from_cents(3)));
    /// assert_eq!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)), None);
    /// ```
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Sums amounts, `None` if any partial sum overflows.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Self> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }

    /// Applies a rate expressed in basis points, rounding half away from zero
    /// to the nearest minor unit.
    ///
    /// This is the single rounding point for tax and COGS estimates.
    ///
    /// ```rust
    /// use expo_core::money::Money;
    ///
    /// let subtotal = Money::from_cents(25000); // 250.00
    /// assert_eq!(subtotal.apply_rate(500).cents(), 1250); // 5% = 12.50
    /// ```
    pub fn apply_rate(&self, bps: u32) -> Money {
        let scaled = round_div(self.0 as i128 * bps as i128, BPS_PER_UNIT as i128);
        Money(scaled as i64)
    }

    /// Divides evenly into `parts`, rounding half away from zero.
    ///
    /// Dividing by zero yields zero; averages over empty sets are zero.
    ///
    /// ```rust
    /// use expo_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1000).div_round(3).cents(), 333);
    /// assert_eq!(Money::from_cents(1000).div_round(0).cents(), 0);
    /// ```
    pub fn div_round(&self, parts: i64) -> Money {
        if parts == 0 {
            return Money::zero();
        }
        Money(round_div(self.0 as i128, parts as i128) as i64)
    }

    /// Formats with a currency code prefix: `AED 262.50`.
    pub fn format(&self, currency: &Currency) -> String {
        format!("{} {}", currency.code, self)
    }
}

/// Integer division rounding half away from zero.
pub(crate) fn round_div(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if remainder.abs() * 2 >= denominator.abs() {
        if (numerator < 0) != (denominator < 0) {
            quotient - 1
        } else {
            quotient + 1
        }
    } else {
        quotient
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Failure to read a decimal amount typed by the cashier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyParseError {
    #[error("amount is empty")]
    Empty,

    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error("'{0}' has more than two decimal places")]
    TooPrecise(String),

    #[error("'{0}' is too large")]
    Overflow(String),
}

/// Parses decimal text exactly, without passing through `f64`.
///
/// ```rust
/// use expo_core::money::Money;
///
/// assert_eq!("300".parse::<Money>().unwrap().cents(), 30000);
/// assert_eq!("262.5".parse::<Money>().unwrap().cents(), 26250);
/// assert!("12.345".parse::<Money>().is_err());
/// assert!("abc".parse::<Money>().is_err());
/// ```
impl FromStr for Money {
    type Err = MoneyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.is_empty() {
            return Err(MoneyParseError::Empty);
        }

        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };

        let (whole, fraction) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        let is_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction) {
            return Err(MoneyParseError::NotANumber(text.to_string()));
        }
        if fraction.len() > 2 {
            return Err(MoneyParseError::TooPrecise(text.to_string()));
        }

        let overflow = || MoneyParseError::Overflow(text.to_string());
        let major: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        let minor: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| overflow())? * 10,
            _ => fraction.parse().map_err(|_| overflow())?,
        };

        let cents = major
            .checked_mul(100)
            .and_then(|c| c.checked_add(minor))
            .ok_or_else(overflow)?;

        Ok(Money(if negative { -cents } else { cents }))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain two-decimal rendering for logs: `262.50`, `-5.50`.
///
/// Currency-aware display belongs to [`Money::format`] or the UI.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
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

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Percentage
// =============================================================================

/// A signed percentage in basis points (1234 = 12.34%).
///
/// Profit margins go negative when expenses exceed gross profit, so this is
/// signed unlike [`crate::types::TaxRate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Percentage(i64);

impl Percentage {
    #[inline]
    pub const fn from_bps(bps: i64) -> Self {
        Percentage(bps)
    }

    #[inline]
    pub const fn bps(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Percentage(0)
    }

    /// `part / whole × 100%`, rounded to a basis point.
    ///
    /// Returns zero when `whole` is zero, so a day with no revenue reports a
    /// 0% margin instead of dividing by zero.
    ///
    /// ```rust
    /// use expo_core::money::{Money, Percentage};
    ///
    /// let margin = Percentage::of(Money::from_cents(2500), Money::from_cents(10000));
    /// assert_eq!(margin.bps(), 2500); // 25.00%
    /// assert_eq!(Percentage::of(Money::from_cents(5), Money::zero()), Percentage::zero());
    /// ```
    pub fn of(part: Money, whole: Money) -> Self {
        Self::of_counts(part.cents(), whole.cents())
    }

    /// Same as [`Percentage::of`] for plain counts (units sold vs. opening stock).
    pub fn of_counts(part: i64, whole: i64) -> Self {
        if whole == 0 {
            return Percentage::zero();
        }
        Percentage(round_div(part as i128 * BPS_PER_UNIT as i128, whole as i128) as i64)
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{}{}.{:02}%", sign, abs / 100, abs % 100)
    }
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
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor(), 99);
    }

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(262, 50).cents(), 26250);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(26250).to_string(), "262.50");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_format_with_currency() {
        let money = Money::from_cents(3750);
        assert_eq!(money.format(&Currency::aed()), "AED 37.50");
        assert_eq!(money.format(&Currency::qar()), "QAR 37.50");
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
    fn test_sum() {
        let values = [Money::from_cents(31500), Money::from_cents(24675)];
        let total: Money = values.iter().sum();
        assert_eq!(total.cents(), 56175);
    }

    #[test]
    fn test_checked_arithmetic() {
        let big = Money::from_cents(5_000_000_000_000_000_000);
        assert_eq!(Money::checked_sum([big, big]), None);
        assert_eq!(
            Money::checked_sum([Money::from_cents(31500), Money::from_cents(24675)]),
            Some(Money::from_cents(56175))
        );
        assert_eq!(big.checked_multiply_quantity(2), None);
        assert_eq!(
            Money::from_cents(15000).checked_multiply_quantity(3),
            Some(Money::from_cents(45000))
        );
    }

    #[test]
    fn test_apply_rate_five_percent() {
        assert_eq!(Money::from_cents(25000).apply_rate(500).cents(), 1250);
    }

    #[test]
    fn test_apply_rate_rounds_half_up() {
        // 10.01 × 5% = 0.5005 → 0.50
        assert_eq!(Money::from_cents(1001).apply_rate(500).cents(), 50);
        // 0.10 × 5% = 0.005 → 0.01
        assert_eq!(Money::from_cents(10).apply_rate(500).cents(), 1);
        // 0.09 × 5% = 0.0045 → 0.00
        assert_eq!(Money::from_cents(9).apply_rate(500).cents(), 0);
    }

    #[test]
    fn test_apply_rate_negative_is_symmetric() {
        assert_eq!(Money::from_cents(-10).apply_rate(500).cents(), -1);
    }

    #[test]
    fn test_div_round() {
        assert_eq!(Money::from_cents(74125).div_round(3).cents(), 24708);
        assert_eq!(Money::from_cents(1000).div_round(0), Money::zero());
    }

    #[test]
    fn test_clamp_non_negative() {
        assert_eq!(Money::from_cents(-6250).clamp_non_negative(), Money::zero());
        assert_eq!(Money::from_cents(3750).clamp_non_negative().cents(), 3750);
    }

    #[test]
    fn test_parse_accepts_cashier_input() {
        assert_eq!("300".parse::<Money>().unwrap().cents(), 30000);
        assert_eq!("262.50".parse::<Money>().unwrap().cents(), 26250);
        assert_eq!("262.5".parse::<Money>().unwrap().cents(), 26250);
        assert_eq!(" 0.05 ".parse::<Money>().unwrap().cents(), 5);
        assert_eq!(".75".parse::<Money>().unwrap().cents(), 75);
        assert_eq!("12.".parse::<Money>().unwrap().cents(), 1200);
        assert_eq!("-1.00".parse::<Money>().unwrap().cents(), -100);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!("".parse::<Money>(), Err(MoneyParseError::Empty));
        assert!(matches!("abc".parse::<Money>(), Err(MoneyParseError::NotANumber(_))));
        assert!(matches!("1.2.3".parse::<Money>(), Err(MoneyParseError::NotANumber(_))));
        assert!(matches!(".".parse::<Money>(), Err(MoneyParseError::NotANumber(_))));
        assert!(matches!("1e3".parse::<Money>(), Err(MoneyParseError::NotANumber(_))));
        assert!(matches!("12.345".parse::<Money>(), Err(MoneyParseError::TooPrecise(_))));
        assert!(matches!(
            "99999999999999999999".parse::<Money>(),
            Err(MoneyParseError::Overflow(_))
        ));
    }

    #[test]
    fn test_percentage_of() {
        assert_eq!(Percentage::of(Money::from_cents(1), Money::from_cents(3)).bps(), 3333);
        assert_eq!(Percentage::of(Money::from_cents(-2500), Money::from_cents(10000)).bps(), -2500);
        assert_eq!(Percentage::of(Money::from_cents(100), Money::zero()), Percentage::zero());
    }

    #[test]
    fn test_percentage_display() {
        assert_eq!(Percentage::from_bps(1234).to_string(), "12.34%");
        assert_eq!(Percentage::from_bps(-505).to_string(), "-5.05%");
        assert_eq!(Percentage::zero().to_string(), "0.00%");
    }
}
