//! # Sale Repository
//!
//! The transactional sale flows: creation, item replacement, deletion,
//! and aggregate reads.
//!
//! ## Transaction Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     create_sale (one transaction)                       │
//! │                                                                         │
//! │  1. VALIDATE SHAPE      non-empty lines, positive quantities           │
//! │  2. RESOLVE CUSTOMER    missing id → CustomerNotFound                  │
//! │  3. RESOLVE PRODUCTS    one batch query; any miss → ProductNotFound    │
//! │  4. CHECK STOCK         per line, first failure → InsufficientStock    │
//! │  5. SNAPSHOT PRICES     subtotal = Σ selling_price × qty               │
//! │  6. INSERT sale + items                                                │
//! │  7. DECREMENT STOCK     guarded: WHERE stock >= qty (never oversell)   │
//! │  8. LEDGER              credit & unpaid → balance += total + entry     │
//! │  9. COMMIT              any error on 1-8 rolls everything back         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Deletion is the exact inverse: restore stock per item, reverse the
//! sale's net ledger effect, delete the header (items cascade). Item
//! replacement on update restores the old quantities before consuming
//! the new ones, in the same transaction as the header update.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use kirana_core::dto::{
    CustomerSummary, NewSale, ProductSummary, SaleAggregate, SaleItemDetail, SaleLineRequest,
    SaleUpdate,
};
use kirana_core::error::{CoreError, CoreResult, ValidationError};
use kirana_core::types::{Customer, Product, Sale, SaleItem};
use kirana_core::{validation, BalanceReason, PaymentMethod, PaymentStatus};

/// Repository for sale database operations.
///
/// All multi-row mutations run inside a single transaction; the caller
/// never observes a partial sale.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a sale header by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        fetch_sale(&mut conn, id).await
    }

    /// Gets all items for a sale, in insertion order.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let mut conn = self.pool.acquire().await?;
        fetch_items(&mut conn, sale_id).await
    }

    /// Lists sale headers, newest first.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT id, customer_id, sale_date,
                   sub_total_cents, discount_cents, total_amount_cents,
                   payment_method, payment_status,
                   notes, receipt_image, created_at, updated_at
            FROM sales
            ORDER BY sale_date DESC, created_at DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Lists a customer's sale headers, newest first.
    pub async fn list_for_customer(&self, customer_id: &str, limit: u32) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT id, customer_id, sale_date,
                   sub_total_cents, discount_cents, total_amount_cents,
                   payment_method, payment_status,
                   notes, receipt_image, created_at, updated_at
            FROM sales
            WHERE customer_id = ?1
            ORDER BY sale_date DESC, created_at DESC
            LIMIT ?2
            "#,
        )
        .bind(customer_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Gets the full sale aggregate: header, customer summary, items
    /// with product summaries.
    ///
    /// Deleted referents degrade instead of failing: a missing product
    /// yields `product: None` on the line, a missing customer yields
    /// `customer: None`.
    pub async fn get_aggregate(&self, id: &str) -> CoreResult<SaleAggregate> {
        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;

        let sale = fetch_sale(&mut conn, id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(id.to_string()))?;

        build_aggregate(&mut conn, sale).await
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Creates a sale: header, items with frozen prices, stock
    /// decrements and the credit-sale ledger adjustment, atomically.
    ///
    /// ## Failure Semantics
    /// Any validation or persistence failure rolls back every staged
    /// mutation; the caller observes no partial effect.
    pub async fn create_sale(&self, req: &NewSale) -> CoreResult<SaleAggregate> {
        debug!(lines = req.items.len(), "Creating sale");

        // Shape validation before any row is touched.
        validation::validate_line_count(req.items.len())?;
        for line in &req.items {
            validation::validate_quantity(line.quantity)?;
        }

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        // (a) Resolve the customer.
        let customer = match &req.customer_id {
            Some(id) => Some(fetch_customer_strict(&mut tx, id).await?),
            None => None,
        };

        let adds_to_balance = req.payment_method == PaymentMethod::Credit
            && req.payment_status != PaymentStatus::Paid;
        if adds_to_balance && customer.is_none() {
            return Err(ValidationError::CreditSaleRequiresCustomer.into());
        }

        // (b) Resolve all referenced products in one batch lookup.
        let ids: Vec<String> = req.items.iter().map(|l| l.product_id.clone()).collect();
        let products = resolve_products_strict(&mut tx, &ids).await?;

        // (c) Stock pre-check, per line, in input order. The guarded
        // decrement below re-checks inside the write itself.
        for line in &req.items {
            let product = product_for_line(&products, line)?;
            if !product.can_sell(line.quantity) {
                return Err(CoreError::InsufficientStock {
                    sku: product.sku.clone(),
                    available: product.stock,
                    requested: line.quantity,
                });
            }
        }

        // Totals from the prices snapshotted at this moment.
        let mut sub_total_cents: i64 = 0;
        for line in &req.items {
            let product = product_for_line(&products, line)?;
            sub_total_cents += product.selling_price_cents * line.quantity;
        }
        validation::validate_discount(req.discount_cents, sub_total_cents)?;
        let total_amount_cents = sub_total_cents - req.discount_cents;

        let now = Utc::now();
        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            customer_id: req.customer_id.clone(),
            sale_date: req.sale_date.unwrap_or(now),
            sub_total_cents,
            discount_cents: req.discount_cents,
            total_amount_cents,
            payment_method: req.payment_method,
            payment_status: req.payment_status,
            notes: req.notes.clone(),
            receipt_image: req.receipt_image.clone(),
            created_at: now,
            updated_at: now,
        };

        insert_sale(&mut tx, &sale).await?;

        let mut items = Vec::with_capacity(req.items.len());
        for line in &req.items {
            let product = product_for_line(&products, line)?;
            let item = SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                product_id: product.id.clone(),
                quantity: line.quantity,
                price_at_sale_cents: product.selling_price_cents,
                created_at: now,
            };
            insert_item(&mut tx, &item).await?;
            decrement_stock(&mut tx, product, line.quantity, now).await?;
            items.push(SaleItemDetail {
                item,
                product: Some(ProductSummary::from(product)),
            });
        }

        let mut customer_summary = customer.as_ref().map(CustomerSummary::from);
        if adds_to_balance {
            if let Some(customer) = &customer {
                apply_balance_delta(&mut tx, &customer.id, total_amount_cents, now).await?;
                insert_balance_entry(
                    &mut tx,
                    &customer.id,
                    Some(&sale.id),
                    None,
                    total_amount_cents,
                    BalanceReason::CreditSale,
                    now,
                )
                .await?;
                // The aggregate reflects post-mutation state.
                if let Some(summary) = customer_summary.as_mut() {
                    summary.outstanding_balance_cents += total_amount_cents;
                }
            }
        }

        tx.commit().await.map_err(DbError::from)?;

        info!(
            sale_id = %sale.id,
            total = %sale.total_amount(),
            items = items.len(),
            "Sale created"
        );

        Ok(SaleAggregate {
            sale,
            customer: customer_summary,
            items,
        })
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Updates a sale header in place and, when a replacement item list
    /// is supplied, wholesale-replaces the items.
    ///
    /// ## Item Replacement
    /// Stock consumed by the old quantities is restored before the new
    /// quantities are consumed; replacement prices are snapshotted from
    /// the live products at this moment. Totals are NOT recomputed from
    /// the new list; the caller supplies a consistent header.
    pub async fn update_sale(&self, id: &str, update: &SaleUpdate) -> CoreResult<SaleAggregate> {
        debug!(sale_id = %id, "Updating sale");

        if let Some(lines) = &update.items {
            validation::validate_line_count(lines.len())?;
            for line in lines {
                validation::validate_quantity(line.quantity)?;
            }
        }

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let mut sale = fetch_sale(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(id.to_string()))?;

        let now = Utc::now();

        // Header fields, in place.
        if let Some(customer_id) = &update.customer_id {
            fetch_customer_strict(&mut tx, customer_id).await?;
            sale.customer_id = Some(customer_id.clone());
        }
        if let Some(sale_date) = update.sale_date {
            sale.sale_date = sale_date;
        }
        if let Some(sub_total) = update.sub_total_cents {
            validation::validate_non_negative("subtotal", sub_total)?;
            sale.sub_total_cents = sub_total;
        }
        if let Some(discount) = update.discount_cents {
            sale.discount_cents = discount;
        }
        if let Some(total) = update.total_amount_cents {
            sale.total_amount_cents = total;
        }
        if let Some(method) = update.payment_method {
            sale.payment_method = method;
        }
        if let Some(status) = update.payment_status {
            sale.payment_status = status;
        }
        if let Some(notes) = &update.notes {
            sale.notes = Some(notes.clone());
        }
        if let Some(receipt_image) = &update.receipt_image {
            sale.receipt_image = Some(receipt_image.clone());
        }
        validation::validate_discount(sale.discount_cents, sale.sub_total_cents)?;
        sale.updated_at = now;

        // Item replacement, if requested.
        if let Some(lines) = &update.items {
            let old_items = fetch_items(&mut tx, &sale.id).await?;

            // Give back what the old quantities consumed before taking
            // what the new ones need. A product deleted since the sale
            // has no stock row left to restore.
            for item in &old_items {
                restore_stock(&mut tx, &item.product_id, item.quantity, now).await?;
            }
            delete_items(&mut tx, &sale.id).await?;

            let ids: Vec<String> = lines.iter().map(|l| l.product_id.clone()).collect();
            let products = resolve_products_strict(&mut tx, &ids).await?;

            for line in lines {
                let product = product_for_line(&products, line)?;
                let item = SaleItem {
                    id: Uuid::new_v4().to_string(),
                    sale_id: sale.id.clone(),
                    product_id: product.id.clone(),
                    quantity: line.quantity,
                    price_at_sale_cents: product.selling_price_cents,
                    created_at: now,
                };
                insert_item(&mut tx, &item).await?;
                decrement_stock(&mut tx, product, line.quantity, now).await?;
            }
        }

        update_sale_header(&mut tx, &sale).await?;

        let aggregate = build_aggregate(&mut tx, sale).await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(sale_id = %id, replaced_items = update.items.is_some(), "Sale updated");

        Ok(aggregate)
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Deletes a sale, restoring stock for every item and reversing the
    /// sale's net balance effect, atomically.
    ///
    /// The reversal amount is the sum of the sale's own ledger entries,
    /// so a header edited after creation cannot skew it.
    pub async fn delete_sale(&self, id: &str) -> CoreResult<()> {
        debug!(sale_id = %id, "Deleting sale");

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let sale = fetch_sale(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(id.to_string()))?;

        let items = fetch_items(&mut tx, id).await?;
        let now = Utc::now();

        for item in &items {
            restore_stock(&mut tx, &item.product_id, item.quantity, now).await?;
        }

        if let Some(customer_id) = &sale.customer_id {
            let net: i64 = sqlx::query_scalar(
                "SELECT COALESCE(SUM(delta_cents), 0) FROM balance_entries WHERE sale_id = ?1",
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(DbError::from)?;

            if net != 0 {
                // The customer may be gone; the reversal entry is still
                // written so the ledger stays a complete record.
                apply_balance_delta(&mut tx, customer_id, -net, now).await?;
                insert_balance_entry(
                    &mut tx,
                    customer_id,
                    Some(id),
                    None,
                    -net,
                    BalanceReason::CreditSaleReversal,
                    now,
                )
                .await?;
            }
        }

        // Items cascade with the header.
        sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from)?;

        tx.commit().await.map_err(DbError::from)?;

        info!(sale_id = %id, items = items.len(), "Sale deleted");

        Ok(())
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

async fn fetch_sale(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
    let sale = sqlx::query_as::<_, Sale>(
        r#"
        SELECT id, customer_id, sale_date,
               sub_total_cents, discount_cents, total_amount_cents,
               payment_method, payment_status,
               notes, receipt_image, created_at, updated_at
        FROM sales
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(sale)
}

async fn fetch_items(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleItem>> {
    let items = sqlx::query_as::<_, SaleItem>(
        r#"
        SELECT id, sale_id, product_id, quantity, price_at_sale_cents, created_at
        FROM sale_items
        WHERE sale_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

/// Resolves a customer that an operation requires to exist.
async fn fetch_customer_strict(conn: &mut SqliteConnection, id: &str) -> CoreResult<Customer> {
    let customer = sqlx::query_as::<_, Customer>(
        r#"
        SELECT id, name, contact, address,
               credit_limit_cents, outstanding_balance_cents,
               created_at, updated_at
        FROM customers
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(DbError::from)?;

    customer.ok_or_else(|| CoreError::CustomerNotFound(id.to_string()))
}

/// Resolves every referenced product in one batch query.
///
/// Any id that fails to resolve aborts the whole operation: the
/// returned error names the first missing id in request order.
async fn resolve_products_strict(
    conn: &mut SqliteConnection,
    ids: &[String],
) -> CoreResult<HashMap<String, Product>> {
    let mut distinct: Vec<&String> = Vec::new();
    for id in ids {
        if !distinct.contains(&id) {
            distinct.push(id);
        }
    }

    let placeholders = (1..=distinct.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        r#"
        SELECT id, sku, name,
               selling_price_cents, purchase_price_cents, minimum_price_cents,
               stock, created_at, updated_at
        FROM products
        WHERE id IN ({placeholders})
        "#
    );

    let mut query = sqlx::query_as::<_, Product>(&sql);
    for id in &distinct {
        query = query.bind(id.as_str());
    }
    let rows = query.fetch_all(&mut *conn).await.map_err(DbError::from)?;

    let products: HashMap<String, Product> =
        rows.into_iter().map(|p| (p.id.clone(), p)).collect();

    if products.len() != distinct.len() {
        for id in &distinct {
            if !products.contains_key(id.as_str()) {
                return Err(CoreError::ProductNotFound((*id).clone()));
            }
        }
    }

    Ok(products)
}

fn product_for_line<'a>(
    products: &'a HashMap<String, Product>,
    line: &SaleLineRequest,
) -> CoreResult<&'a Product> {
    products
        .get(&line.product_id)
        .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))
}

async fn insert_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sales (
            id, customer_id, sale_date,
            sub_total_cents, discount_cents, total_amount_cents,
            payment_method, payment_status,
            notes, receipt_image, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.customer_id)
    .bind(sale.sale_date)
    .bind(sale.sub_total_cents)
    .bind(sale.discount_cents)
    .bind(sale.total_amount_cents)
    .bind(sale.payment_method)
    .bind(sale.payment_status)
    .bind(&sale.notes)
    .bind(&sale.receipt_image)
    .bind(sale.created_at)
    .bind(sale.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn update_sale_header(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE sales SET
            customer_id = ?2,
            sale_date = ?3,
            sub_total_cents = ?4,
            discount_cents = ?5,
            total_amount_cents = ?6,
            payment_method = ?7,
            payment_status = ?8,
            notes = ?9,
            receipt_image = ?10,
            updated_at = ?11
        WHERE id = ?1
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.customer_id)
    .bind(sale.sale_date)
    .bind(sale.sub_total_cents)
    .bind(sale.discount_cents)
    .bind(sale.total_amount_cents)
    .bind(sale.payment_method)
    .bind(sale.payment_status)
    .bind(&sale.notes)
    .bind(&sale.receipt_image)
    .bind(sale.updated_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Sale", &sale.id));
    }

    Ok(())
}

async fn insert_item(conn: &mut SqliteConnection, item: &SaleItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sale_items (
            id, sale_id, product_id, quantity, price_at_sale_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&item.id)
    .bind(&item.sale_id)
    .bind(&item.product_id)
    .bind(item.quantity)
    .bind(item.price_at_sale_cents)
    .bind(item.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn delete_items(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM sale_items WHERE sale_id = ?1")
        .bind(sale_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Guarded stock decrement.
///
/// The `stock >= qty` predicate makes the check and the write one
/// statement: a concurrent sale that drained the stock between our
/// pre-check read and this write affects zero rows, and the operation
/// fails with `InsufficientStock` against the freshly-read level.
async fn decrement_stock(
    conn: &mut SqliteConnection,
    product: &Product,
    quantity: i64,
    now: DateTime<Utc>,
) -> CoreResult<()> {
    let result = sqlx::query(
        "UPDATE products SET stock = stock - ?1, updated_at = ?2 WHERE id = ?3 AND stock >= ?1",
    )
    .bind(quantity)
    .bind(now)
    .bind(&product.id)
    .execute(&mut *conn)
    .await
    .map_err(DbError::from)?;

    if result.rows_affected() == 0 {
        let available: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1")
            .bind(&product.id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(DbError::from)?;

        return Err(match available {
            Some(stock) => CoreError::InsufficientStock {
                sku: product.sku.clone(),
                available: stock,
                requested: quantity,
            },
            None => CoreError::ProductNotFound(product.id.clone()),
        });
    }

    Ok(())
}

/// Returns stock consumed by a sale line. A product deleted since the
/// sale has no row to restore; that is not an error.
async fn restore_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query("UPDATE products SET stock = stock + ?1, updated_at = ?2 WHERE id = ?3")
        .bind(quantity)
        .bind(now)
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Applies a signed delta to a customer's stored balance. A deleted
/// customer has no row; the ledger entry is still the record of truth.
async fn apply_balance_delta(
    conn: &mut SqliteConnection,
    customer_id: &str,
    delta_cents: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE customers SET
            outstanding_balance_cents = outstanding_balance_cents + ?1,
            updated_at = ?2
        WHERE id = ?3
        "#,
    )
    .bind(delta_cents)
    .bind(now)
    .bind(customer_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn insert_balance_entry(
    conn: &mut SqliteConnection,
    customer_id: &str,
    sale_id: Option<&str>,
    payment_id: Option<&str>,
    delta_cents: i64,
    reason: BalanceReason,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO balance_entries (
            id, customer_id, sale_id, payment_id, delta_cents, reason, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(customer_id)
    .bind(sale_id)
    .bind(payment_id)
    .bind(delta_cents)
    .bind(reason)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Shapes the sale aggregate from current rows, degrading gracefully
/// around deleted products and customers.
async fn build_aggregate(conn: &mut SqliteConnection, sale: Sale) -> CoreResult<SaleAggregate> {
    let items = fetch_items(&mut *conn, &sale.id).await?;

    let mut summaries: HashMap<String, ProductSummary> = HashMap::new();
    for item in &items {
        if summaries.contains_key(&item.product_id) {
            continue;
        }
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name,
                   selling_price_cents, purchase_price_cents, minimum_price_cents,
                   stock, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(&item.product_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(DbError::from)?;

        if let Some(product) = &product {
            summaries.insert(product.id.clone(), ProductSummary::from(product));
        }
    }

    let customer = match &sale.customer_id {
        Some(customer_id) => sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, contact, address,
                   credit_limit_cents, outstanding_balance_cents,
                   created_at, updated_at
            FROM customers
            WHERE id = ?1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(DbError::from)?
        .map(|c| CustomerSummary::from(&c)),
        None => None,
    };

    let items = items
        .into_iter()
        .map(|item| {
            let product = summaries.get(&item.product_id).cloned();
            SaleItemDetail { item, product }
        })
        .collect();

    Ok(SaleAggregate {
        sale,
        customer,
        items,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use kirana_core::dto::{NewCustomer, NewProduct};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_product(db: &Database, name: &str, price_cents: i64, stock: i64) -> Product {
        db.products()
            .create(&NewProduct {
                sku: None,
                name: name.to_string(),
                selling_price_cents: price_cents,
                purchase_price_cents: 0,
                minimum_price_cents: 0,
                stock,
            })
            .await
            .unwrap()
    }

    async fn seed_customer(db: &Database, name: &str) -> Customer {
        db.customers()
            .create(&NewCustomer {
                name: name.to_string(),
                contact: None,
                address: None,
                credit_limit_cents: 0,
            })
            .await
            .unwrap()
    }

    fn cash_sale(lines: Vec<SaleLineRequest>) -> NewSale {
        NewSale {
            customer_id: None,
            items: lines,
            discount_cents: 0,
            payment_method: PaymentMethod::Cash,
            payment_status: PaymentStatus::Paid,
            notes: None,
            receipt_image: None,
            sale_date: None,
        }
    }

    fn line(product: &Product, quantity: i64) -> SaleLineRequest {
        SaleLineRequest {
            product_id: product.id.clone(),
            quantity,
        }
    }

    async fn stock_of(db: &Database, product: &Product) -> i64 {
        db.products()
            .get_by_id(&product.id)
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    async fn balance_of(db: &Database, customer: &Customer) -> i64 {
        db.customers()
            .get_by_id(&customer.id)
            .await
            .unwrap()
            .unwrap()
            .outstanding_balance_cents
    }

    // -------------------------------------------------------------------------
    // End-to-end scenarios
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_cash_sale_end_to_end() {
        let db = test_db().await;
        let product = seed_product(&db, "Basmati Rice 5kg", 10000, 10).await;

        let aggregate = db
            .sales()
            .create_sale(&cash_sale(vec![line(&product, 3)]))
            .await
            .unwrap();

        assert_eq!(aggregate.sale.sub_total_cents, 30000);
        assert_eq!(aggregate.sale.total_amount_cents, 30000);
        assert_eq!(aggregate.items.len(), 1);
        assert_eq!(aggregate.items[0].item.quantity, 3);
        assert_eq!(aggregate.items[0].item.price_at_sale_cents, 10000);
        assert!(aggregate.customer.is_none());

        assert_eq!(stock_of(&db, &product).await, 7);
    }

    #[tokio::test]
    async fn test_credit_sale_raises_balance() {
        let db = test_db().await;
        let product = seed_product(&db, "Basmati Rice 5kg", 10000, 7).await;
        let customer = seed_customer(&db, "Ali Traders").await;

        let mut req = cash_sale(vec![line(&product, 2)]);
        req.customer_id = Some(customer.id.clone());
        req.payment_method = PaymentMethod::Credit;
        req.payment_status = PaymentStatus::Pending;

        let aggregate = db.sales().create_sale(&req).await.unwrap();

        assert_eq!(aggregate.sale.total_amount_cents, 20000);
        assert_eq!(stock_of(&db, &product).await, 5);
        assert_eq!(balance_of(&db, &customer).await, 20000);

        // The aggregate's customer summary reflects the post-mutation balance.
        assert_eq!(
            aggregate.customer.unwrap().outstanding_balance_cents,
            20000
        );

        // Counter and ledger agree.
        assert_eq!(
            db.customers().ledger_balance(&customer.id).await.unwrap(),
            20000
        );
        let history = db.customers().balance_history(&customer.id, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].delta_cents, 20000);
        assert_eq!(history[0].reason, BalanceReason::CreditSale);
        assert_eq!(history[0].sale_id.as_deref(), Some(aggregate.sale.id.as_str()));
    }

    #[tokio::test]
    async fn test_paid_credit_sale_leaves_balance_unchanged() {
        let db = test_db().await;
        let product = seed_product(&db, "Sugar 1kg", 500, 10).await;
        let customer = seed_customer(&db, "Ali Traders").await;

        let mut req = cash_sale(vec![line(&product, 2)]);
        req.customer_id = Some(customer.id.clone());
        req.payment_method = PaymentMethod::Credit;
        req.payment_status = PaymentStatus::Paid;

        db.sales().create_sale(&req).await.unwrap();

        assert_eq!(balance_of(&db, &customer).await, 0);
        assert_eq!(db.customers().ledger_balance(&customer.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rejects_whole_request() {
        let db = test_db().await;
        let product = seed_product(&db, "Basmati Rice 5kg", 10000, 5).await;

        let err = db
            .sales()
            .create_sale(&cash_sale(vec![line(&product, 100)]))
            .await
            .unwrap_err();

        match err {
            CoreError::InsufficientStock {
                sku,
                available,
                requested,
            } => {
                assert_eq!(sku, product.sku);
                assert_eq!(available, 5);
                assert_eq!(requested, 100);
            }
            other => panic!("expected InsufficientStock, got {other}"),
        }

        assert_eq!(stock_of(&db, &product).await, 5);
        assert!(db.sales().list(10).await.unwrap().is_empty());
    }

    // -------------------------------------------------------------------------
    // Atomicity
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_failing_line_leaves_other_lines_untouched() {
        let db = test_db().await;
        let plenty = seed_product(&db, "Sugar 1kg", 500, 50).await;
        let scarce = seed_product(&db, "Tea 250g", 2000, 2).await;

        let err = db
            .sales()
            .create_sale(&cash_sale(vec![line(&plenty, 10), line(&scarce, 5)]))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::InsufficientStock { .. }));

        // The first line's pre-checked stock is untouched after rollback.
        assert_eq!(stock_of(&db, &plenty).await, 50);
        assert_eq!(stock_of(&db, &scarce).await, 2);
        assert!(db.sales().list(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_customer_aborts_everything() {
        let db = test_db().await;
        let product = seed_product(&db, "Sugar 1kg", 500, 10).await;

        let mut req = cash_sale(vec![line(&product, 2)]);
        req.customer_id = Some("no-such-customer".to_string());

        let err = db.sales().create_sale(&req).await.unwrap_err();
        assert!(matches!(err, CoreError::CustomerNotFound(_)));

        assert_eq!(stock_of(&db, &product).await, 10);
        assert!(db.sales().list(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_product_aborts_everything() {
        let db = test_db().await;
        let product = seed_product(&db, "Sugar 1kg", 500, 10).await;

        let req = cash_sale(vec![
            line(&product, 2),
            SaleLineRequest {
                product_id: "no-such-product".to_string(),
                quantity: 1,
            },
        ]);

        let err = db.sales().create_sale(&req).await.unwrap_err();
        match err {
            CoreError::ProductNotFound(id) => assert_eq!(id, "no-such-product"),
            other => panic!("expected ProductNotFound, got {other}"),
        }

        assert_eq!(stock_of(&db, &product).await, 10);
        assert!(db.sales().list(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_or_malformed_lines_rejected() {
        let db = test_db().await;
        let product = seed_product(&db, "Sugar 1kg", 500, 10).await;

        let err = db.sales().create_sale(&cash_sale(vec![])).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let err = db
            .sales()
            .create_sale(&cash_sale(vec![line(&product, 0)]))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        assert_eq!(stock_of(&db, &product).await, 10);
    }

    // -------------------------------------------------------------------------
    // Discounts
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_discount_reduces_total() {
        let db = test_db().await;
        let product = seed_product(&db, "Sugar 1kg", 500, 10).await;

        let mut req = cash_sale(vec![line(&product, 4)]);
        req.discount_cents = 300;

        let aggregate = db.sales().create_sale(&req).await.unwrap();
        assert_eq!(aggregate.sale.sub_total_cents, 2000);
        assert_eq!(aggregate.sale.total_amount_cents, 1700);
    }

    #[tokio::test]
    async fn test_discount_exceeding_subtotal_rejected() {
        let db = test_db().await;
        let product = seed_product(&db, "Sugar 1kg", 500, 10).await;

        let mut req = cash_sale(vec![line(&product, 1)]);
        req.discount_cents = 501;

        let err = db.sales().create_sale(&req).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::DiscountExceedsSubtotal { .. })
        ));
        assert_eq!(stock_of(&db, &product).await, 10);
    }

    #[tokio::test]
    async fn test_walk_in_credit_sale_rejected() {
        let db = test_db().await;
        let product = seed_product(&db, "Sugar 1kg", 500, 10).await;

        let mut req = cash_sale(vec![line(&product, 1)]);
        req.payment_method = PaymentMethod::Credit;
        req.payment_status = PaymentStatus::Pending;

        let err = db.sales().create_sale(&req).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::CreditSaleRequiresCustomer)
        ));
    }

    // -------------------------------------------------------------------------
    // Price snapshots
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_price_snapshot_survives_price_change() {
        let db = test_db().await;
        let product = seed_product(&db, "Sugar 1kg", 500, 10).await;

        let aggregate = db
            .sales()
            .create_sale(&cash_sale(vec![line(&product, 2)]))
            .await
            .unwrap();

        let update = kirana_core::dto::ProductUpdate {
            selling_price_cents: Some(999),
            ..Default::default()
        };
        db.products().update(&product.id, &update).await.unwrap();

        let reread = db.sales().get_aggregate(&aggregate.sale.id).await.unwrap();
        assert_eq!(reread.items[0].item.price_at_sale_cents, 500);
        // The live product summary shows the new price alongside.
        assert_eq!(
            reread.items[0].product.as_ref().unwrap().selling_price_cents,
            999
        );
    }

    #[tokio::test]
    async fn test_aggregate_tolerates_deleted_product() {
        let db = test_db().await;
        let product = seed_product(&db, "Sugar 1kg", 500, 10).await;

        let aggregate = db
            .sales()
            .create_sale(&cash_sale(vec![line(&product, 2)]))
            .await
            .unwrap();

        db.products().delete(&product.id).await.unwrap();

        let reread = db.sales().get_aggregate(&aggregate.sale.id).await.unwrap();
        assert_eq!(reread.items.len(), 1);
        assert!(reread.items[0].product.is_none());
        assert_eq!(reread.items[0].item.price_at_sale_cents, 500);
    }

    // -------------------------------------------------------------------------
    // Update
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_header_only_update() {
        let db = test_db().await;
        let product = seed_product(&db, "Sugar 1kg", 500, 10).await;

        let aggregate = db
            .sales()
            .create_sale(&cash_sale(vec![line(&product, 2)]))
            .await
            .unwrap();

        let update = SaleUpdate {
            notes: Some("adjusted at close".to_string()),
            payment_status: Some(PaymentStatus::Partial),
            ..Default::default()
        };
        let updated = db.sales().update_sale(&aggregate.sale.id, &update).await.unwrap();

        assert_eq!(updated.sale.notes.as_deref(), Some("adjusted at close"));
        assert_eq!(updated.sale.payment_status, PaymentStatus::Partial);
        assert_eq!(updated.sale.total_amount_cents, 1000);
        // Items and stock untouched.
        assert_eq!(updated.items.len(), 1);
        assert_eq!(stock_of(&db, &product).await, 8);
    }

    #[tokio::test]
    async fn test_update_missing_sale() {
        let db = test_db().await;
        let err = db
            .sales()
            .update_sale("no-such-sale", &SaleUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::SaleNotFound(_)));
    }

    #[tokio::test]
    async fn test_item_replacement_restores_before_consuming() {
        let db = test_db().await;
        let product = seed_product(&db, "Basmati Rice 5kg", 10000, 10).await;

        let aggregate = db
            .sales()
            .create_sale(&cash_sale(vec![line(&product, 4)]))
            .await
            .unwrap();
        assert_eq!(stock_of(&db, &product).await, 6);

        let update = SaleUpdate {
            items: Some(vec![line(&product, 2)]),
            sub_total_cents: Some(20000),
            total_amount_cents: Some(20000),
            ..Default::default()
        };
        let updated = db.sales().update_sale(&aggregate.sale.id, &update).await.unwrap();

        // 10 - 2, not 10 - 4 - 2: the old consumption came back first.
        assert_eq!(stock_of(&db, &product).await, 8);
        assert_eq!(updated.items.len(), 1);
        assert_eq!(updated.items[0].item.quantity, 2);
    }

    #[tokio::test]
    async fn test_item_replacement_snapshots_current_price() {
        let db = test_db().await;
        let product = seed_product(&db, "Sugar 1kg", 500, 10).await;

        let aggregate = db
            .sales()
            .create_sale(&cash_sale(vec![line(&product, 2)]))
            .await
            .unwrap();

        let price_update = kirana_core::dto::ProductUpdate {
            selling_price_cents: Some(600),
            ..Default::default()
        };
        db.products().update(&product.id, &price_update).await.unwrap();

        let update = SaleUpdate {
            items: Some(vec![line(&product, 2)]),
            ..Default::default()
        };
        let updated = db.sales().update_sale(&aggregate.sale.id, &update).await.unwrap();

        assert_eq!(updated.items[0].item.price_at_sale_cents, 600);
    }

    #[tokio::test]
    async fn test_item_replacement_fails_atomically_on_stock() {
        let db = test_db().await;
        let product = seed_product(&db, "Sugar 1kg", 500, 10).await;

        let aggregate = db
            .sales()
            .create_sale(&cash_sale(vec![line(&product, 4)]))
            .await
            .unwrap();
        assert_eq!(stock_of(&db, &product).await, 6);

        // 6 on hand + 4 restored = 10; asking for 11 must fail and
        // leave the original consumption in place.
        let update = SaleUpdate {
            items: Some(vec![line(&product, 11)]),
            ..Default::default()
        };
        let err = db
            .sales()
            .update_sale(&aggregate.sale.id, &update)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { .. }));

        assert_eq!(stock_of(&db, &product).await, 6);
        let items = db.sales().get_items(&aggregate.sale.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 4);
    }

    // -------------------------------------------------------------------------
    // Delete
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_delete_restores_stock_exactly() {
        let db = test_db().await;
        let product = seed_product(&db, "Basmati Rice 5kg", 10000, 10).await;

        let aggregate = db
            .sales()
            .create_sale(&cash_sale(vec![line(&product, 3)]))
            .await
            .unwrap();
        assert_eq!(stock_of(&db, &product).await, 7);

        db.sales().delete_sale(&aggregate.sale.id).await.unwrap();

        assert_eq!(stock_of(&db, &product).await, 10);
        let err = db.sales().get_aggregate(&aggregate.sale.id).await.unwrap_err();
        assert!(matches!(err, CoreError::SaleNotFound(_)));
        assert!(db.sales().get_items(&aggregate.sale.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_reverses_credit_balance() {
        let db = test_db().await;
        let product = seed_product(&db, "Basmati Rice 5kg", 10000, 10).await;
        let customer = seed_customer(&db, "Ali Traders").await;

        let mut req = cash_sale(vec![line(&product, 2)]);
        req.customer_id = Some(customer.id.clone());
        req.payment_method = PaymentMethod::Credit;
        req.payment_status = PaymentStatus::Pending;

        let aggregate = db.sales().create_sale(&req).await.unwrap();
        assert_eq!(balance_of(&db, &customer).await, 20000);

        db.sales().delete_sale(&aggregate.sale.id).await.unwrap();

        assert_eq!(balance_of(&db, &customer).await, 0);
        assert_eq!(db.customers().ledger_balance(&customer.id).await.unwrap(), 0);

        // Both the adjustment and its reversal stay on the ledger.
        let history = db.customers().balance_history(&customer.id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history
            .iter()
            .any(|e| e.reason == BalanceReason::CreditSaleReversal && e.delta_cents == -20000));
    }

    #[tokio::test]
    async fn test_delete_cash_sale_writes_no_reversal() {
        let db = test_db().await;
        let product = seed_product(&db, "Sugar 1kg", 500, 10).await;
        let customer = seed_customer(&db, "Ali Traders").await;

        let mut req = cash_sale(vec![line(&product, 2)]);
        req.customer_id = Some(customer.id.clone());

        let aggregate = db.sales().create_sale(&req).await.unwrap();
        db.sales().delete_sale(&aggregate.sale.id).await.unwrap();

        assert_eq!(balance_of(&db, &customer).await, 0);
        assert!(db
            .customers()
            .balance_history(&customer.id, 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_sale() {
        let db = test_db().await;
        let err = db.sales().delete_sale("no-such-sale").await.unwrap_err();
        assert!(matches!(err, CoreError::SaleNotFound(_)));
    }

    // -------------------------------------------------------------------------
    // Listings
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_list_for_customer() {
        let db = test_db().await;
        let product = seed_product(&db, "Sugar 1kg", 500, 50).await;
        let customer = seed_customer(&db, "Ali Traders").await;

        let mut req = cash_sale(vec![line(&product, 1)]);
        req.customer_id = Some(customer.id.clone());
        db.sales().create_sale(&req).await.unwrap();
        db.sales()
            .create_sale(&cash_sale(vec![line(&product, 1)]))
            .await
            .unwrap();

        assert_eq!(db.sales().list(10).await.unwrap().len(), 2);
        assert_eq!(
            db.sales().list_for_customer(&customer.id, 10).await.unwrap().len(),
            1
        );
    }
}
