//! # Error Types
//!
//! Domain-specific error types for kirana-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  kirana-core errors (this file)                                        │
//! │  ├── CoreError        - sale/ledger/catalog operation failures         │
//! │  └── ValidationError  - request payload failures                       │
//! │                                                                         │
//! │  kirana-db errors (separate crate)                                     │
//! │  └── DbError          - database failures → CoreError::Persistence     │
//! │                                                                         │
//! │  Nothing is retried; the REST layer surfaces these as-is, and any      │
//! │  failure inside a transactional flow rolls the whole operation back    │
//! │  before the error is returned.                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// The failure taxonomy of the sale, payment and catalog operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The referenced customer does not exist.
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// A referenced product does not exist. One unknown id aborts the
    /// whole operation; the payload names the first id that failed to
    /// resolve from the batch lookup, in request order.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// The referenced sale does not exist.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Requested quantity exceeds available stock.
    ///
    /// Raised for the first failing line before any mutation, and again
    /// by the guarded decrement if a concurrent sale drains the stock
    /// mid-transaction; either way every staged change is rolled back.
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// The request payload failed a business rule.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Underlying store failure, including constraint violations.
    #[error("Persistence failure: {0}")]
    Persistence(String),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Request payload failures, checked before any row is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Missing { field: &'static str },

    /// A text field is over its limit.
    #[error("{field} exceeds {max} characters")]
    TooLong { field: &'static str, max: usize },

    /// A count or amount that must be strictly positive is not.
    #[error("{field} must be positive")]
    NotPositive { field: &'static str },

    /// An amount that must not be negative is.
    #[error("{field} must not be negative")]
    Negative { field: &'static str },

    /// A bounded value is outside its range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
    },

    /// The value's shape is wrong (bad id, bad characters).
    #[error("{field} has invalid format: {reason}")]
    BadFormat {
        field: &'static str,
        reason: &'static str,
    },

    /// A discount larger than the subtotal would bill a negative total.
    #[error("discount {discount_cents} exceeds subtotal {sub_total_cents}")]
    DiscountExceedsSubtotal {
        discount_cents: i64,
        sub_total_cents: i64,
    },

    /// A credit sale with an unpaid status has no customer to owe it.
    #[error("credit sale with unpaid status requires a customer")]
    CreditSaleRequiresCustomer,
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
