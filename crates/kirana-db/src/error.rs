//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! sqlite error (sqlx::Error)
//!      │
//!      ▼
//! DbError (this module)        categorized via the driver's ErrorKind
//!      │
//!      ▼
//! CoreError::Persistence       what the transactional flows hand the
//!                              REST layer
//! ```
//!
//! The typed not-found paths of the sale/payment flows never pass
//! through here; those are raised as `CoreError` variants directly from
//! `fetch_optional` results.

use kirana_core::CoreError;
use sqlx::error::ErrorKind;
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// A row the caller named does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// UNIQUE index rejected a write (duplicate product SKU, reused id).
    #[error("Unique constraint violation: {message}")]
    UniqueViolation { message: String },

    /// Foreign key rejected a write (an item without its sale row).
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A schema CHECK rejected a write (negative stock, zero quantity).
    #[error("Check constraint violation: {message}")]
    CheckViolation { message: String },

    /// Could not open or keep the database connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A migration did not apply.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// The statement itself failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// All pooled connections are in use.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Anything the driver reports that fits no category above.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.kind() {
                    ErrorKind::UniqueViolation => DbError::UniqueViolation { message },
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation { message },
                    ErrorKind::CheckViolation | ErrorKind::NotNullViolation => {
                        DbError::CheckViolation { message }
                    }
                    _ => DbError::QueryFailed(message),
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Store failures surface as `Persistence` in the domain taxonomy. The
/// typed not-found and insufficient-stock cases are raised explicitly
/// before this conversion can apply.
impl From<DbError> for CoreError {
    fn from(err: DbError) -> Self {
        CoreError::Persistence(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = DbError::not_found("Product", "p-1");
        assert_eq!(err.to_string(), "Product not found: p-1");
    }

    #[test]
    fn test_db_error_becomes_persistence_failure() {
        let err: CoreError = DbError::PoolExhausted.into();
        assert!(matches!(err, CoreError::Persistence(_)));
        assert_eq!(
            err.to_string(),
            "Persistence failure: Connection pool exhausted"
        );
    }
}
