//! # Money Module
//!
//! Provides the `Money` type and the `round2` helper.
//!
//! ## Where Floats Are Allowed
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  0.1 + 0.2 = 0.30000000000000004  ❌                                    │
//! │                                                                         │
//! │  Amounts INSIDE the system are integer cents:                           │
//! │    CartItem.price, Cart prices, Order prices, captured amounts          │
//! │                                                                         │
//! │  Amounts ENTERING the system may be floats or decimal strings:          │
//! │    "25.00" from a form, 25.5 from JSON, 0.15 tax rate from config       │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  round2: round half away from zero at 2 decimals, after nudging the    │
//! │  value by f64::EPSILON so 1.005 (stored as 1.00499999...) becomes 1.01 │
//! │                                                                         │
//! │  KNOWN COMPROMISE: round2 is not decimal arithmetic. It is applied     │
//! │  once, at the edge, and never on running totals.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! Money serializes as a 2-decimal string (`"143.75"`). It deserializes from
//! either a decimal string or a JSON number.
//!
//! ## Usage
//! ```rust
//! use storefront_core::money::Money;
//!
//! let price: Money = "25.00".parse().unwrap();
//! let line = price.multiply_quantity(5);
//! assert_eq!(line.to_decimal_string(), "125.00");
//! assert_eq!(line.to_string(), "$125.00");
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::str::FromStr;

use crate::error::ValidationError;
use crate::types::TaxRate;

// =============================================================================
// round2
// =============================================================================

/// Rounds to 2 decimals, half away from zero, after an epsilon nudge.
///
/// ## Example
/// ```rust
/// use storefront_core::money::round2;
///
/// assert_eq!(round2(1.005), 1.01);
/// assert_eq!(round2(0.125), 0.13);
/// assert_eq!(round2(2.0), 2.0);
/// ```
pub fn round2(value: f64) -> f64 {
    ((value + f64::EPSILON) * 100.0).round() / 100.0
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in cents.
///
/// ## Design Decisions
/// - **i64 (signed)**: refunds and differences can go negative
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **String on the wire**: matches the 2-decimal price strings the UI uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from a float amount in major units via `round2`.
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::money::Money;
    ///
    /// assert_eq!(Money::from_f64(1.005).cents(), 101);
    /// assert_eq!(Money::from_f64(0.1 + 0.2).cents(), 30);
    /// ```
    pub fn from_f64(amount: f64) -> Self {
        Money((round2(amount) * 100.0).round() as i64)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Formats as a plain 2-decimal string without currency symbol.
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(14375).to_decimal_string(), "143.75");
    /// assert_eq!(Money::from_cents(-550).to_decimal_string(), "-5.50");
    /// assert_eq!(Money::zero().to_decimal_string(), "0.00");
    /// ```
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}{}.{:02}", sign, self.dollars().abs(), self.cents_part())
    }

    /// Calculates tax, rounding half away from zero.
    ///
    /// ## Implementation
    /// Integer math in basis points: `(amount * bps ± 5000) / 10000`.
    /// Rust integer division truncates toward zero, so adding 5000 for
    /// positive products and subtracting it for negative ones rounds
    /// half away from zero in both directions.
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::money::Money;
    /// use storefront_core::types::TaxRate;
    ///
    /// let items = Money::from_cents(12500); // 125.00
    /// let tax = items.calculate_tax(TaxRate::from_bps(1500)); // 15%
    /// assert_eq!(tax.cents(), 1875);
    ///
    /// // 0.05 × 15% = 0.0075 → rounds up to 0.01
    /// assert_eq!(Money::from_cents(5).calculate_tax(TaxRate::from_bps(1500)).cents(), 1);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        let product = self.0 as i128 * rate.bps() as i128;
        let tax_cents = if product >= 0 {
            (product + 5000) / 10000
        } else {
            (product - 5000) / 10000
        };
        Money::from_cents(tax_cents as i64)
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(2500);
    /// assert_eq!(unit_price.multiply_quantity(5).cents(), 12500);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Parses a decimal amount such as `"25"`, `"25.5"` or `"25.00"`.
///
/// Digits past the second decimal are rounded half away from zero on the
/// exact decimal text, so `"1.005"` parses to 1.01 without float error.
impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "price".to_string(),
            reason: reason.to_string(),
        };

        let text = s.trim();
        if text.is_empty() {
            return Err(ValidationError::Required {
                field: "price".to_string(),
            });
        }

        let (negative, body) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };

        let (whole, frac) = body.split_once('.').unwrap_or((body, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid("expected a decimal number"));
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid("expected a decimal number"));
        }

        let whole_value: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("amount too large"))?
        };

        let mut digits = frac.bytes().map(|b| i64::from(b - b'0'));
        let tenths = digits.next().unwrap_or(0);
        let hundredths = digits.next().unwrap_or(0);
        let round_up = digits.next().is_some_and(|d| d >= 5);

        let mut cents = whole_value
            .checked_mul(100)
            .and_then(|c| c.checked_add(tenths * 10 + hundredths))
            .ok_or_else(|| invalid("amount too large"))?;
        if round_up {
            cents += 1;
        }

        Ok(Money(if negative { -cents } else { cents }))
    }
}

// =============================================================================
// Serde
// =============================================================================

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_decimal_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MoneyRepr {
    Text(String),
    Number(f64),
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match MoneyRepr::deserialize(deserializer)? {
            MoneyRepr::Text(text) => text.parse().map_err(serde::de::Error::custom),
            MoneyRepr::Number(amount) => Ok(Money::from_f64(amount)),
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Human-readable form, used in log lines and messages.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
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

// =============================================================================
// Unit Tests
// =============================================================================
