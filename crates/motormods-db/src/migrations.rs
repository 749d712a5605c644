//! # Schema Migrations
//!
//! The schema ships inside the binary; a shop PC never needs SQL files on
//! disk.
//!
//! ```text
//!   migrations/0001_initial.sql
//!     items ─┬─ stock_ledger   (append-only: UPDATE/DELETE triggers abort)
//!            ├─ invoice_lines ── invoices
//!            └─ return_lines  ── sales_returns ── invoices
//!     settings
//! ```
//!
//! New changes go in a new `NNNN_description.sql`; applied files are never
//! edited, and the ledger triggers must survive every later migration.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Migrations embedded at compile time from `migrations/`.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Applies whatever is pending, each file in its own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;
    info!(known = MIGRATOR.migrations.len(), "Schema up to date");
    Ok(())
}

/// `(embedded, applied)`.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await?;

    Ok((total, applied as usize))
}
