//! # Domain Types
//!
//! Core domain types used throughout Kirana POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │    Customer     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  sku (business) │   │  customer_id?   │   │  outstanding_   │       │
//! │  │  stock          │   │  total_amount   │   │    balance      │       │
//! │  └─────────────────┘   └────────┬────────┘   └────────┬────────┘       │
//! │                                 │ owns                │ ledger          │
//! │                        ┌────────┴────────┐   ┌────────┴────────┐       │
//! │                        │    SaleItem     │   │  BalanceEntry   │       │
//! │                        │  price snapshot │   │  signed delta   │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reference Strength
//! A sale exclusively owns its items (deleting the sale deletes them).
//! `SaleItem.product_id`, `Sale.customer_id` and the payment/ledger
//! references are WEAK: the referent may have been deleted, and readers
//! must tolerate the dangling id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier, unique per catalog.
    /// Generated from a timestamp + random suffix when not supplied.
    pub sku: String,

    /// Display name shown to the cashier and on receipts.
    pub name: String,

    /// Current selling price in cents.
    pub selling_price_cents: i64,

    /// Purchase (cost) price in cents, for margin reporting.
    pub purchase_price_cents: i64,

    /// Floor price in cents. Informational; not enforced here.
    pub minimum_price_cents: i64,

    /// Units on hand. Never negative.
    /// Mutated exclusively by sale creation/update/deletion.
    pub stock: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the current selling price as a Money type.
    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }

    /// Checks whether the requested quantity is on hand.
    #[inline]
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.stock >= quantity
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer with a running credit ledger.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub contact: Option<String>,
    pub address: Option<String>,

    /// Informational credit ceiling in cents. Not enforced as a hard cap.
    pub credit_limit_cents: i64,

    /// Amount currently owed in cents (signed).
    /// Invariant: equals the sum of this customer's balance entries.
    pub outstanding_balance_cents: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Returns the outstanding balance as Money.
    #[inline]
    pub fn outstanding_balance(&self) -> Money {
        Money::from_cents(self.outstanding_balance_cents)
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Card payment on an external terminal.
    Card,
    /// On account: the amount goes to the customer's outstanding balance.
    Credit,
}

// =============================================================================
// Payment Status
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Fully settled at the counter.
    Paid,
    /// Nothing collected yet.
    Pending,
    /// Partially collected.
    Partial,
}

// =============================================================================
// Sale
// =============================================================================

/// A completed sale transaction.
///
/// `customer_id` is nullable: walk-in sales have no customer on record.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub customer_id: Option<String>,
    #[ts(as = "String")]
    pub sale_date: DateTime<Utc>,
    /// Sum of line totals at time of sale, in cents.
    pub sub_total_cents: i64,
    /// Flat discount in cents, never negative.
    pub discount_cents: i64,
    /// sub_total - discount, in cents.
    pub total_amount_cents: i64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    /// Optional attachment path for a scanned receipt.
    pub receipt_image: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    /// Returns the total as Money.
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }

    /// A credit sale that is not fully paid adds to the customer's
    /// outstanding balance at creation time.
    #[inline]
    pub fn adds_to_balance(&self) -> bool {
        self.payment_method == PaymentMethod::Credit && self.payment_status != PaymentStatus::Paid
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
/// Uses the snapshot pattern to freeze the billed price at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    /// Weak reference: the product may have been deleted since.
    pub product_id: String,
    /// Quantity sold. Always positive.
    pub quantity: i64,
    /// Unit price in cents at time of sale (frozen, never recomputed
    /// from the live product price).
    pub price_at_sale_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    /// Returns the frozen unit price as Money.
    #[inline]
    pub fn price_at_sale(&self) -> Money {
        Money::from_cents(self.price_at_sale_cents)
    }

    /// Returns the line total (frozen price × quantity).
    #[inline]
    pub fn line_total(&self) -> Money {
        self.price_at_sale().times(self.quantity)
    }
}

// =============================================================================
// Payment
// =============================================================================

/// A payment recorded against a customer's outstanding balance,
/// optionally tied to a specific sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub customer_id: String,
    pub sale_id: Option<String>,
    /// Amount paid in cents. Always positive.
    pub amount_cents: i64,
    pub payment_method: PaymentMethod,
    #[ts(as = "String")]
    pub payment_date: DateTime<Utc>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Returns the payment amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Balance Ledger
// =============================================================================

/// Why a balance entry was written.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BalanceReason {
    /// A credit sale with an unpaid status raised the balance.
    CreditSale,
    /// A deleted sale's net balance effect was undone.
    CreditSaleReversal,
    /// A recorded payment lowered the balance.
    Payment,
}

/// One signed adjustment to a customer's outstanding balance.
///
/// Every mutation of `Customer.outstanding_balance_cents` writes exactly
/// one entry in the same transaction, so the stored balance is always the
/// sum of the customer's entries and any adjustment can be undone exactly.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct BalanceEntry {
    pub id: String,
    pub customer_id: String,
    pub sale_id: Option<String>,
    pub payment_id: Option<String>,
    /// Signed change in cents: positive for credit sales,
    /// negative for payments and reversals.
    pub delta_cents: i64,
    pub reason: BalanceReason,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
