//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Connection Lifecycle                             │
//! │                                                                         │
//! │  DbConfig::new("kirana.db")                                            │
//! │       │        pool sizing, timeouts, migrate-on-connect               │
//! │       ▼                                                                 │
//! │  Database::new(config).await                                           │
//! │       │        opens the pool, applies pending migrations              │
//! │       ▼                                                                 │
//! │  db.products() / db.customers() / db.sales() / db.payments()           │
//! │       │        repositories share the pool by cheap clone              │
//! │       ▼                                                                 │
//! │  each transactional flow takes one connection for its whole            │
//! │  begin..commit window; plain reads borrow and return immediately       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! SQLite is opened in WAL mode with foreign keys enabled. WAL keeps
//! readers and the single writer out of each other's way; the foreign
//! keys carry the sale_items ON DELETE CASCADE.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::customer::CustomerRepository;
use crate::repository::payment::PaymentRepository;
use crate::repository::product::ProductRepository;
use crate::repository::sale::SaleRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Pool and connection settings.
///
/// The defaults suit a single shop's traffic; tests use
/// [`DbConfig::in_memory`] for an isolated throwaway database.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file. Created on first open.
    pub database_path: PathBuf,

    /// Pool ceiling. Default 5.
    pub max_connections: u32,

    /// Connections kept warm. Default 1.
    pub min_connections: u32,

    /// How long an acquire may wait for a free connection. Default 30s.
    pub acquire_timeout: Duration,

    /// How long a locked database is retried before erroring. Default 5s.
    pub busy_timeout: Duration,

    /// Apply pending migrations when the pool opens. Default true.
    pub run_migrations: bool,
}

impl DbConfig {
    /// Configuration for a file-backed database at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Configuration for an in-memory database (tests).
    ///
    /// A single connection, because every pooled connection would
    /// otherwise get its own empty in-memory database.
    pub fn in_memory() -> Self {
        let mut config = DbConfig::new(":memory:");
        config.max_connections = 1;
        config.acquire_timeout = Duration::from_secs(5);
        config
    }

    /// Sets the pool ceiling.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the number of connections kept warm.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets whether migrations run when the pool opens.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// The per-connection SQLite options this config describes.
    fn connect_options(&self) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .filename(&self.database_path)
            .create_if_missing(true)
            // WAL: readers and the writer stop blocking each other
            .journal_mode(SqliteJournalMode::Wal)
            // NORMAL is durable against corruption; a power cut may
            // drop the very last commit
            .synchronous(SqliteSynchronous::Normal)
            // off by default in SQLite; the item cascade needs it
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout)
    }
}

// =============================================================================
// Database
// =============================================================================

/// Shared handle over the connection pool; the entry point to every
/// repository.
///
/// Cloning is cheap (the pool is internally reference-counted), so
/// each caller can own a `Database` value.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool described by `config` and, unless disabled,
    /// brings the schema up to date.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening database");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(config.connect_options())
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let db = Database { pool };

        if config.run_migrations {
            migrations::run_migrations(&db.pool).await?;
        }

        info!(max_connections = config.max_connections, "Database ready");
        Ok(db)
    }

    /// Applies pending migrations. Already done by [`Database::new`]
    /// unless the config disabled it.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// The raw pool, for queries the repositories don't cover.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Product catalog operations.
    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    /// Customer and balance-ledger operations.
    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.pool.clone())
    }

    /// The transactional sale flows.
    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
    }

    /// The payment-recording flow.
    pub fn payments(&self) -> PaymentRepository {
        PaymentRepository::new(self.pool.clone())
    }

    /// Closes the pool. Every repository operation fails afterwards.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// True when the database answers a trivial query.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database_migrates_and_answers() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert!(db.health_check().await);

        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert!(total > 0);
        assert_eq!(total, applied);
    }

    #[tokio::test]
    async fn test_builder_overrides() {
        let config = DbConfig::new("/tmp/kirana-test.db")
            .max_connections(8)
            .min_connections(2)
            .run_migrations(false);

        assert_eq!(config.max_connections, 8);
        assert_eq!(config.min_connections, 2);
        assert!(!config.run_migrations);
    }

    #[tokio::test]
    async fn test_health_check_fails_after_close() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;
        assert!(!db.health_check().await);
    }
}
