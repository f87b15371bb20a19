//! # Database Migrations
//!
//! Schema migrations, embedded at compile time from
//! `migrations/sqlite/` at the workspace root.
//!
//! ```text
//! pool opens
//!      │
//!      ▼
//! compare embedded files against the _sqlx_migrations table
//!      │
//!      ├── 001_initial_schema.sql   already applied
//!      └── 002_add_indexes.sql      pending → runs now, in order
//! ```
//!
//! Rules for new migrations: next `NNN_description.sql` number, SQL kept
//! idempotent (`IF NOT EXISTS`), applied files never edited afterwards.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// All migration files, baked into the binary by `sqlx::migrate!`.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Brings the schema up to date. Idempotent; each migration runs in
/// its own transaction, in filename order.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;
    info!(
        migrations = MIGRATOR.migrations.len(),
        "Schema is up to date"
    );
    Ok(())
}

/// (embedded, applied) migration counts, for diagnostics.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok((MIGRATOR.migrations.len(), applied as usize))
}
