//! # Payment Repository
//!
//! The payment-recording flow.
//!
//! ## Recording Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 record_payment (one transaction)                        │
//! │                                                                         │
//! │  1. VALIDATE AMOUNT     must be positive                               │
//! │  2. RESOLVE CUSTOMER    missing id → CustomerNotFound                  │
//! │  3. RESOLVE SALE        when referenced; missing → SaleNotFound        │
//! │  4. INSERT payment                                                     │
//! │  5. LEDGER              balance -= amount, plus a payment entry        │
//! │  6. COMMIT              any error rolls everything back                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use kirana_core::dto::NewPayment;
use kirana_core::error::{CoreError, CoreResult};
use kirana_core::types::{BalanceReason, Payment};
use kirana_core::validation;

/// Repository for payment database operations.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    /// Creates a new PaymentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    /// Records a payment and decrements the customer's outstanding
    /// balance, atomically, pairing the adjustment with a ledger entry.
    pub async fn record_payment(&self, req: &NewPayment) -> CoreResult<Payment> {
        validation::validate_payment_amount(req.amount_cents)?;

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let customer_exists: Option<String> =
            sqlx::query_scalar("SELECT id FROM customers WHERE id = ?1")
                .bind(&req.customer_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(DbError::from)?;
        if customer_exists.is_none() {
            return Err(CoreError::CustomerNotFound(req.customer_id.clone()));
        }

        if let Some(sale_id) = &req.sale_id {
            let sale_exists: Option<String> =
                sqlx::query_scalar("SELECT id FROM sales WHERE id = ?1")
                    .bind(sale_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(DbError::from)?;
            if sale_exists.is_none() {
                return Err(CoreError::SaleNotFound(sale_id.clone()));
            }
        }

        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            customer_id: req.customer_id.clone(),
            sale_id: req.sale_id.clone(),
            amount_cents: req.amount_cents,
            payment_method: req.payment_method,
            payment_date: req.payment_date.unwrap_or(now),
            notes: req.notes.clone(),
            created_at: now,
        };

        debug!(customer_id = %payment.customer_id, amount = %payment.amount(), "Recording payment");

        insert_payment(&mut tx, &payment).await?;

        sqlx::query(
            r#"
            UPDATE customers SET
                outstanding_balance_cents = outstanding_balance_cents - ?1,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(payment.amount_cents)
        .bind(now)
        .bind(&payment.customer_id)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        sqlx::query(
            r#"
            INSERT INTO balance_entries (
                id, customer_id, sale_id, payment_id, delta_cents, reason, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&payment.customer_id)
        .bind(&payment.sale_id)
        .bind(&payment.id)
        .bind(-payment.amount_cents)
        .bind(BalanceReason::Payment)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        tx.commit().await.map_err(DbError::from)?;

        info!(
            payment_id = %payment.id,
            customer_id = %payment.customer_id,
            amount = %payment.amount(),
            "Payment recorded"
        );

        Ok(payment)
    }

    /// Gets a payment by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, customer_id, sale_id, amount_cents,
                   payment_method, payment_date, notes, created_at
            FROM payments
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Lists a customer's payments, newest first.
    pub async fn list_for_customer(&self, customer_id: &str, limit: u32) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, customer_id, sale_id, amount_cents,
                   payment_method, payment_date, notes, created_at
            FROM payments
            WHERE customer_id = ?1
            ORDER BY payment_date DESC, created_at DESC
            LIMIT ?2
            "#,
        )
        .bind(customer_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }
}

async fn insert_payment(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO payments (
            id, customer_id, sale_id, amount_cents,
            payment_method, payment_date, notes, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.customer_id)
    .bind(&payment.sale_id)
    .bind(payment.amount_cents)
    .bind(payment.payment_method)
    .bind(payment.payment_date)
    .bind(&payment.notes)
    .bind(payment.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
