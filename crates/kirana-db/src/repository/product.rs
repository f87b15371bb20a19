//! # Product Repository
//!
//! Database operations for the product catalog.
//!
//! ## Stock Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Who May Touch `stock`                              │
//! │                                                                         │
//! │  Product creation      → sets the initial level                        │
//! │  Sale creation         → guarded decrement per line                    │
//! │  Sale item replacement → restore old quantities, decrement new         │
//! │  Sale deletion         → restore per line                              │
//! │                                                                         │
//! │  ProductRepository::update deliberately has no stock parameter;        │
//! │  every other mutation lives in the sale transaction manager.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use kirana_core::dto::{NewProduct, ProductUpdate};
use kirana_core::error::{CoreError, CoreResult};
use kirana_core::types::Product;
use kirana_core::validation;

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Adds a product to the catalog.
    ///
    /// ## SKU Handling
    /// A supplied SKU is validated and must be unique. When absent, one
    /// is generated from a timestamp plus a random suffix.
    pub async fn create(&self, req: &NewProduct) -> CoreResult<Product> {
        validation::validate_name("name", &req.name)?;
        validation::validate_non_negative("price", req.selling_price_cents)?;
        validation::validate_non_negative("price", req.purchase_price_cents)?;
        validation::validate_non_negative("price", req.minimum_price_cents)?;
        validation::validate_non_negative("stock", req.stock)?;

        let sku = match &req.sku {
            Some(sku) => {
                validation::validate_sku(sku)?;
                sku.trim().to_string()
            }
            None => generate_sku(),
        };

        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            sku,
            name: req.name.trim().to_string(),
            selling_price_cents: req.selling_price_cents,
            purchase_price_cents: req.purchase_price_cents,
            minimum_price_cents: req.minimum_price_cents,
            stock: req.stock,
            created_at: now,
            updated_at: now,
        };

        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name,
                selling_price_cents, purchase_price_cents, minimum_price_cents,
                stock, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.selling_price_cents)
        .bind(product.purchase_price_cents)
        .bind(product.minimum_price_cents)
        .bind(product.stock)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(product)
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name,
                   selling_price_cents, purchase_price_cents, minimum_price_cents,
                   stock, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name,
                   selling_price_cents, purchase_price_cents, minimum_price_cents,
                   stock, created_at, updated_at
            FROM products
            WHERE sku = ?1
            "#,
        )
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists products sorted by name.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name,
                   selling_price_cents, purchase_price_cents, minimum_price_cents,
                   stock, created_at, updated_at
            FROM products
            ORDER BY name
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Searches products by name or SKU substring.
    ///
    /// An empty query falls back to [`list`](Self::list).
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = query.trim();

        debug!(query = %query, limit = %limit, "Searching products");

        if query.is_empty() {
            return self.list(limit).await;
        }

        let pattern = format!("%{}%", query);

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name,
                   selling_price_cents, purchase_price_cents, minimum_price_cents,
                   stock, created_at, updated_at
            FROM products
            WHERE name LIKE ?1 OR sku LIKE ?1
            ORDER BY name
            LIMIT ?2
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Updates catalog fields of an existing product.
    ///
    /// `stock` is not updatable here; it belongs to the sale flows.
    pub async fn update(&self, id: &str, req: &ProductUpdate) -> CoreResult<Product> {
        let mut product = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()))?;

        if let Some(sku) = &req.sku {
            validation::validate_sku(sku)?;
            product.sku = sku.trim().to_string();
        }
        if let Some(name) = &req.name {
            validation::validate_name("name", name)?;
            product.name = name.trim().to_string();
        }
        if let Some(price) = req.selling_price_cents {
            validation::validate_non_negative("price", price)?;
            product.selling_price_cents = price;
        }
        if let Some(price) = req.purchase_price_cents {
            validation::validate_non_negative("price", price)?;
            product.purchase_price_cents = price;
        }
        if let Some(price) = req.minimum_price_cents {
            validation::validate_non_negative("price", price)?;
            product.minimum_price_cents = price;
        }
        product.updated_at = Utc::now();

        debug!(id = %product.id, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                sku = ?2,
                name = ?3,
                selling_price_cents = ?4,
                purchase_price_cents = ?5,
                minimum_price_cents = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.selling_price_cents)
        .bind(product.purchase_price_cents)
        .bind(product.minimum_price_cents)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(product.id.clone()));
        }

        Ok(product)
    }

    /// Deletes a product from the catalog.
    ///
    /// Hard delete: historical sale items keep their dangling
    /// `product_id` and their frozen sale-time price; aggregate reads
    /// degrade to a missing product summary.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts catalog products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Generates a SKU in format: KP-YYMMDDHHMMSS-NNNN
///
/// ## Format
/// - YYMMDDHHMMSS: creation timestamp
/// - NNNN: random suffix (padded to 4 digits)
///
/// ## Example
/// `KP-260806143015-0831`
pub fn generate_sku() -> String {
    let now = Utc::now();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let random: u16 = (nanos % 10000) as u16;
    format!("KP-{}-{:04}", now.format("%y%m%d%H%M%S"), random)
}

/// Generates a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
