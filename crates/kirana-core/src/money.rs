//! # Money Module
//!
//! The `Money` type: every amount in the system is an `i64` count of the
//! smallest currency unit.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Where Money Flows                                   │
//! │                                                                         │
//! │  Product.selling_price_cents ──► SaleItem.price_at_sale_cents          │
//! │        │                              │ × quantity                      │
//! │        ▼                              ▼                                 │
//! │  catalog display              Sale.sub_total ─ discount ─► total       │
//! │                                       │                                 │
//! │                                       ▼                                 │
//! │                        Customer.outstanding_balance (signed)           │
//! │                                                                         │
//! │  Floats never appear on this path. Rs 10.99 is the integer 1099;       │
//! │  rendering to decimal happens at the display edge only.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use kirana_core::money::Money;
//!
//! let unit = Money::from_cents(1099);          // Rs 10.99
//! let line = unit.times(3);                    // Rs 32.97
//! assert_eq!((line - Money::from_cents(97)).cents(), 3200);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use ts_rs::TS;

/// An amount of money in the smallest currency unit.
///
/// Signed: ledger deltas and reversals go below zero. A plain newtype
/// over `i64`, so copies are free and arithmetic is ordinary integer
/// arithmetic.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Wraps a raw cent amount.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// The zero amount.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Unwraps to raw cents.
    #[inline]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Line-total helper: this amount taken `quantity` times.
    #[inline]
    pub const fn times(self, quantity: i64) -> Self {
        Money(self.0 * quantity)
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Magnitude, for rendering reversals and refund-style deltas.
    #[inline]
    pub const fn abs(self) -> Self {
        Money(self.0.abs())
    }
}

/// Debug/log rendering: `Rs 10.99`, `-Rs 5.50`. Locale-aware formatting
/// belongs to the display edge, not here.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            write!(f, "-")?;
        }
        let magnitude = self.0.abs();
        write!(f, "Rs {}.{:02}", magnitude / 100, magnitude % 100)
    }
}

impl Add for Money {
    type Output = Money;

    #[inline]
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    #[inline]
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

/// Negation, for turning an adjustment into its exact reversal.
impl Neg for Money {
    type Output = Money;

    #[inline]
    fn neg(self) -> Money {
        Money(-self.0)
    }
}

/// Summing line totals into a subtotal.
impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        Money(iter.map(|m| m.0).sum())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
