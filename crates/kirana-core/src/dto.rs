//! # Boundary Shapes
//!
//! Request and response structures exchanged with the REST layer.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Request/Response Flow                             │
//! │                                                                         │
//! │  REST controller (excluded layer)                                      │
//! │       │  NewSale / SaleUpdate / NewPayment (camelCase JSON)            │
//! │       ▼                                                                 │
//! │  kirana-db repositories                                                │
//! │       │  SaleAggregate (header + customer + items w/ product           │
//! │       │  summaries, tolerating deleted products)                       │
//! │       ▼                                                                 │
//! │  REST controller serializes back to the SPA                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Requests use camelCase field names on the wire; the persisted entity
//! types in [`crate::types`] keep their snake_case column names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{Customer, PaymentMethod, PaymentStatus, Product, Sale, SaleItem};

// =============================================================================
// Sale Requests
// =============================================================================

/// One requested line of a proposed sale: which product, how many.
/// The billed price is never part of the request; it is snapshotted
/// from the product at transaction time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleLineRequest {
    pub product_id: String,
    pub quantity: i64,
}

/// A proposed sale, as accepted at the creation boundary.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewSale {
    /// Absent for walk-in sales. When present, must resolve.
    pub customer_id: Option<String>,
    /// Ordered, non-empty.
    pub items: Vec<SaleLineRequest>,
    /// Flat discount in cents. Defaults to 0; must not exceed the subtotal.
    #[serde(default)]
    pub discount_cents: i64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
    pub receipt_image: Option<String>,
    /// Defaults to now when absent.
    #[ts(as = "Option<String>")]
    pub sale_date: Option<DateTime<Utc>>,
}

/// A partial header update for an existing sale, optionally carrying a
/// full replacement list of line items.
///
/// Totals are NOT recomputed from a replacement list; the caller is
/// responsible for supplying a consistent header alongside it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleUpdate {
    pub customer_id: Option<String>,
    #[ts(as = "Option<String>")]
    pub sale_date: Option<DateTime<Utc>>,
    pub sub_total_cents: Option<i64>,
    pub discount_cents: Option<i64>,
    pub total_amount_cents: Option<i64>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: Option<PaymentStatus>,
    pub notes: Option<String>,
    pub receipt_image: Option<String>,
    /// When present, wholesale-replaces the sale's items.
    pub items: Option<Vec<SaleLineRequest>>,
}

// =============================================================================
// Payment Request
// =============================================================================

/// A payment to record against a customer's outstanding balance.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewPayment {
    pub customer_id: String,
    pub sale_id: Option<String>,
    pub amount_cents: i64,
    pub payment_method: PaymentMethod,
    /// Defaults to now when absent.
    #[ts(as = "Option<String>")]
    pub payment_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

// =============================================================================
// Catalog Requests
// =============================================================================

/// A product to add to the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewProduct {
    /// Generated (timestamp + random suffix) when absent.
    pub sku: Option<String>,
    pub name: String,
    pub selling_price_cents: i64,
    #[serde(default)]
    pub purchase_price_cents: i64,
    #[serde(default)]
    pub minimum_price_cents: i64,
    /// Initial units on hand. After creation, stock only moves
    /// through sale operations.
    #[serde(default)]
    pub stock: i64,
}

/// Partial product update. Stock is deliberately absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductUpdate {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub selling_price_cents: Option<i64>,
    pub purchase_price_cents: Option<i64>,
    pub minimum_price_cents: Option<i64>,
}

/// A customer to add to the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewCustomer {
    pub name: String,
    pub contact: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub credit_limit_cents: i64,
}

/// Partial customer update. The outstanding balance is deliberately
/// absent; it only moves through sale and payment operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CustomerUpdate {
    pub name: Option<String>,
    pub contact: Option<String>,
    pub address: Option<String>,
    pub credit_limit_cents: Option<i64>,
}

// =============================================================================
// Sale Aggregate (response shape)
// =============================================================================

/// The slice of a product a sale response carries.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductSummary {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub selling_price_cents: i64,
}

impl From<&Product> for ProductSummary {
    fn from(p: &Product) -> Self {
        ProductSummary {
            id: p.id.clone(),
            sku: p.sku.clone(),
            name: p.name.clone(),
            selling_price_cents: p.selling_price_cents,
        }
    }
}

/// The slice of a customer a sale response carries.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CustomerSummary {
    pub id: String,
    pub name: String,
    pub contact: Option<String>,
    pub outstanding_balance_cents: i64,
}

impl From<&Customer> for CustomerSummary {
    fn from(c: &Customer) -> Self {
        CustomerSummary {
            id: c.id.clone(),
            name: c.name.clone(),
            contact: c.contact.clone(),
            outstanding_balance_cents: c.outstanding_balance_cents,
        }
    }
}

/// One line of a sale aggregate.
///
/// `product` is `None` when the product was deleted after the sale;
/// consumers render a "product removed" placeholder in that case. The
/// frozen `price_at_sale_cents` on the item keeps the line billable
/// either way.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleItemDetail {
    pub item: SaleItem,
    pub product: Option<ProductSummary>,
}

/// The persisted sale with its customer and items attached, reflecting
/// post-mutation state.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleAggregate {
    pub sale: Sale,
    pub customer: Option<CustomerSummary>,
    pub items: Vec<SaleItemDetail>,
}

// =============================================================================
// Unit Tests
// =============================================================================
