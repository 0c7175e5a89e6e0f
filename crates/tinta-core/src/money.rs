//! # Money Module
//!
//! Provides the `Money` and `Percentage` types plus the pure total
//! calculators used by carts, orders, and invoices.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    All monetary columns store cents (i64). The currency's 2-decimal    │
//! │    fixed-point contract falls out for free: a cent IS the minor unit.  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tinta_core::money::{invoice_total, Money, Percentage};
//!
//! let subtotal = Money::from_cents(10_000);       // $100.00
//! let tax = subtotal.percentage_of(Percentage::from_bps(1500)); // 15%
//! let total = invoice_total(subtotal, tax, Money::from_cents(1_000));
//! assert_eq!(total.cents(), 10_500);              // $105.00
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for discounts and corrections
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: Full serde support for JSON serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use tinta_core::money::Money;
    ///
    /// let price = Money::from_cents(2500); // $25.00
    /// assert_eq!(price.cents(), 2500);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
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

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity. This is the line-subtotal rule:
    /// `subtotal = unit_price × quantity`, exact at the cent since both
    /// operands already live at minor-unit precision.
    ///
    /// ## Example
    /// ```rust
    /// use tinta_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(2500); // $25.00
    /// let subtotal = unit_price.multiply_quantity(3);
    /// assert_eq!(subtotal.cents(), 7500); // $75.00
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Computes `self × pct / 100`, rounded half-up at the cent.
    ///
    /// This is the single rule behind invoice tax amounts and percentage
    /// discounts: `taxAmount = subtotal * taxPercentage / 100`.
    ///
    /// ## Implementation
    /// Integer math in i128 to prevent overflow on large amounts:
    /// `(cents * bps + 5000) / 10000` (the +5000 provides rounding).
    ///
    /// ## Example
    /// ```rust
    /// use tinta_core::money::{Money, Percentage};
    ///
    /// let subtotal = Money::from_cents(10_000);        // $100.00
    /// let tax = subtotal.percentage_of(Percentage::from_bps(1500)); // 15.00%
    /// assert_eq!(tax.cents(), 1500);                   // $15.00
    /// ```
    pub fn percentage_of(&self, pct: Percentage) -> Money {
        let cents = (self.0 as i128 * pct.bps() as i128 + 5000) / 10000;
        Money::from_cents(cents as i64)
    }
}

// =============================================================================
// Percentage Type
// =============================================================================

/// A percentage with 2 fractional digits, stored in basis points.
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000. Storing `1500` for 15.00% keeps the
/// 0–100 range with 2 decimals exact in an integer: valid values are
/// 0..=10000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Percentage(u32);

impl Percentage {
    /// Creates a percentage from basis points (1500 = 15.00%).
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Percentage(bps)
    }

    /// Returns the percentage in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the value as a display percentage (15.0 for 1500 bps).
    #[inline]
    pub fn as_percent(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero percent.
    #[inline]
    pub const fn zero() -> Self {
        Percentage(0)
    }

    /// Checks if the percentage is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Percentage {
    fn default() -> Self {
        Percentage::zero()
    }
}

// =============================================================================
// Total Calculators
// =============================================================================
// Pure functions, no persistence layer required. The repositories call
// these; tests call them directly.

/// Sums line subtotals into a cart total. Empty input yields zero.
pub fn cart_total<I>(subtotals: I) -> Money
where
    I: IntoIterator<Item = Money>,
{
    subtotals
        .into_iter()
        .fold(Money::zero(), |acc, subtotal| acc + subtotal)
}

/// Invoice tax amount: `subtotal × taxPercentage / 100`.
#[inline]
pub fn invoice_tax_amount(subtotal: Money, tax_percentage: Percentage) -> Money {
    subtotal.percentage_of(tax_percentage)
}

/// Invoice total: `subtotal + taxAmount − discountAmount`.
///
/// Never clamps negative. A negative total is a caller input error caught
/// by validation upstream, not silently corrected here.
#[inline]
pub fn invoice_total(subtotal: Money, tax_amount: Money, discount_amount: Money) -> Money {
    subtotal + tax_amount - discount_amount
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
/// For debugging and log messages; UI formatting is out of scope.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.major().abs(), self.minor())
    }
}

/// Default money is zero.
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

/// Multiplication by integer (for quantity calculations).
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
