//! # Validation Module
//!
//! Business rule validation for request payloads.
//!
//! Three layers catch bad input: the REST controller rejects malformed
//! shapes at deserialization, this module rejects rule violations
//! before any row is touched, and the schema's NOT NULL / CHECK /
//! UNIQUE constraints are the last line. Everything here is pure and
//! synchronous.

use crate::error::ValidationError;
use crate::{MAX_LINE_QUANTITY, MAX_SALE_LINES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU: non-empty, at most 50 characters, limited to
/// alphanumerics plus `-` and `_`.
///
/// ```rust
/// use kirana_core::validation::validate_sku;
///
/// assert!(validate_sku("RICE-5KG").is_ok());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Missing { field: "sku" });
    }
    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku",
            max: 50,
        });
    }

    let valid = sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(ValidationError::BadFormat {
            field: "sku",
            reason: "only letters, numbers, hyphens and underscores",
        });
    }

    Ok(())
}

/// Validates a display name (product or customer): non-empty, at most
/// 200 characters.
pub fn validate_name(field: &'static str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Missing { field });
    }
    if name.len() > 200 {
        return Err(ValidationError::TooLong { field, max: 200 });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity: strictly positive, capped at
/// [`MAX_LINE_QUANTITY`].
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::NotPositive { field: "quantity" });
    }
    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity",
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates an amount that may be zero but never negative (prices,
/// credit limits, initial stock).
pub fn validate_non_negative(field: &'static str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::Negative { field });
    }

    Ok(())
}

/// Validates a flat discount against the computed subtotal: never
/// negative, never more than the subtotal (which would bill a negative
/// total).
pub fn validate_discount(discount_cents: i64, sub_total_cents: i64) -> ValidationResult<()> {
    validate_non_negative("discount", discount_cents)?;

    if discount_cents > sub_total_cents {
        return Err(ValidationError::DiscountExceedsSubtotal {
            discount_cents,
            sub_total_cents,
        });
    }

    Ok(())
}

/// Validates a payment amount: strictly positive.
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::NotPositive {
            field: "payment amount",
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates a sale's line list size: non-empty, capped at
/// [`MAX_SALE_LINES`].
pub fn validate_line_count(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::Missing { field: "items" });
    }
    if count > MAX_SALE_LINES {
        return Err(ValidationError::OutOfRange {
            field: "items",
            min: 1,
            max: MAX_SALE_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a UUID string shape.
///
/// ```rust
/// use kirana_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Missing { field: "id" });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::BadFormat {
        field: "id",
        reason: "not a valid UUID",
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
