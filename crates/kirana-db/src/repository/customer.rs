//! # Customer Repository
//!
//! Database operations for customers and the balance ledger.
//!
//! ## Balance Bookkeeping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Outstanding Balance = Σ ledger deltas                  │
//! │                                                                         │
//! │  credit sale (unpaid)    → +total     balance_entries: credit_sale     │
//! │  sale deleted            → -net       balance_entries: reversal        │
//! │  payment recorded        → -amount    balance_entries: payment         │
//! │                                                                         │
//! │  The counter on the customer row is a cache of the ledger: both are    │
//! │  written in the same transaction, and ledger_balance() recomputes      │
//! │  the sum on demand for audit.                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use kirana_core::dto::{CustomerUpdate, NewCustomer};
use kirana_core::error::{CoreError, CoreResult};
use kirana_core::types::{BalanceEntry, Customer};
use kirana_core::validation;

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Adds a customer. The outstanding balance starts at zero.
    pub async fn create(&self, req: &NewCustomer) -> CoreResult<Customer> {
        validation::validate_name("name", &req.name)?;
        validation::validate_non_negative("credit limit", req.credit_limit_cents)?;

        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            name: req.name.trim().to_string(),
            contact: req.contact.clone(),
            address: req.address.clone(),
            credit_limit_cents: req.credit_limit_cents,
            outstanding_balance_cents: 0,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %customer.id, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, name, contact, address,
                credit_limit_cents, outstanding_balance_cents,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.contact)
        .bind(&customer.address)
        .bind(customer.credit_limit_cents)
        .bind(customer.outstanding_balance_cents)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(customer)
    }

    /// Gets a customer by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
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
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Lists customers sorted by name.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, contact, address,
                   credit_limit_cents, outstanding_balance_cents,
                   created_at, updated_at
            FROM customers
            ORDER BY name
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    /// Updates contact details of an existing customer.
    ///
    /// The outstanding balance is not updatable here; it only moves
    /// through the sale and payment flows.
    pub async fn update(&self, id: &str, req: &CustomerUpdate) -> CoreResult<Customer> {
        let mut customer = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::CustomerNotFound(id.to_string()))?;

        if let Some(name) = &req.name {
            validation::validate_name("name", name)?;
            customer.name = name.trim().to_string();
        }
        if let Some(contact) = &req.contact {
            customer.contact = Some(contact.clone());
        }
        if let Some(address) = &req.address {
            customer.address = Some(address.clone());
        }
        if let Some(limit) = req.credit_limit_cents {
            validation::validate_non_negative("credit limit", limit)?;
            customer.credit_limit_cents = limit;
        }
        customer.updated_at = Utc::now();

        debug!(id = %customer.id, "Updating customer");

        sqlx::query(
            r#"
            UPDATE customers SET
                name = ?2,
                contact = ?3,
                address = ?4,
                credit_limit_cents = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.contact)
        .bind(&customer.address)
        .bind(customer.credit_limit_cents)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(customer)
    }

    /// Deletes a customer.
    ///
    /// Hard delete: historic sales, payments and ledger entries keep
    /// their dangling `customer_id` and readers degrade gracefully.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting customer");

        let result = sqlx::query("DELETE FROM customers WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        Ok(())
    }

    /// Recomputes the outstanding balance from the ledger.
    ///
    /// Must always equal `outstanding_balance_cents` on the customer
    /// row; a difference means an adjustment bypassed the ledger.
    pub async fn ledger_balance(&self, customer_id: &str) -> DbResult<i64> {
        let balance: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(delta_cents), 0) FROM balance_entries WHERE customer_id = ?1",
        )
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(balance)
    }

    /// Returns the customer's ledger entries, newest first.
    pub async fn balance_history(&self, customer_id: &str, limit: u32) -> DbResult<Vec<BalanceEntry>> {
        let entries = sqlx::query_as::<_, BalanceEntry>(
            r#"
            SELECT id, customer_id, sale_id, payment_id,
                   delta_cents, reason, created_at
            FROM balance_entries
            WHERE customer_id = ?1
            ORDER BY rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(customer_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn new_customer(name: &str) -> NewCustomer {
        NewCustomer {
            name: name.to_string(),
            contact: Some("0300-1234567".to_string()),
            address: None,
            credit_limit_cents: 50_000,
        }
    }

    #[tokio::test]
    async fn test_create_starts_with_zero_balance() {
        let db = test_db().await;
        let customer = db.customers().create(&new_customer("Ali Traders")).await.unwrap();

        assert_eq!(customer.outstanding_balance_cents, 0);
        assert_eq!(db.customers().ledger_balance(&customer.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_name() {
        let db = test_db().await;
        let err = db.customers().create(&new_customer("  ")).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_keeps_balance() {
        let db = test_db().await;
        let customer = db.customers().create(&new_customer("Ali Traders")).await.unwrap();

        let update = CustomerUpdate {
            name: Some("Ali & Sons".to_string()),
            credit_limit_cents: Some(100_000),
            ..Default::default()
        };
        let updated = db.customers().update(&customer.id, &update).await.unwrap();

        assert_eq!(updated.name, "Ali & Sons");
        assert_eq!(updated.credit_limit_cents, 100_000);
        assert_eq!(updated.outstanding_balance_cents, 0);
    }

    #[tokio::test]
    async fn test_update_missing_customer() {
        let db = test_db().await;
        let err = db
            .customers()
            .update("no-such-id", &CustomerUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::CustomerNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let db = test_db().await;
        let a = db.customers().create(&new_customer("Ali Traders")).await.unwrap();
        db.customers().create(&new_customer("Bismillah Store")).await.unwrap();

        db.customers().delete(&a.id).await.unwrap();

        let remaining = db.customers().list(10).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "Bismillah Store");
    }
}
