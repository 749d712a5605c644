//! # Inventory Store
//!
//! One storage abstraction, two backends, selected at startup.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SalesRecorder   InventoryProjection   AnalyticsEngine   Settings      │
//! │        │                  │                   │              │          │
//! │        └──────────────────┴─────────┬─────────┴──────────────┘          │
//! │                                     ▼                                   │
//! │                      Arc<dyn InventoryStore>                            │
//! │                          │                 │                            │
//! │                          ▼                 ▼                            │
//! │                 ┌───────────────┐  ┌───────────────┐                    │
//! │                 │  SqliteStore  │  │  MemoryStore  │                    │
//! │                 │ sqlx + WAL    │  │ tokio Mutex   │                    │
//! │                 └───────────────┘  └───────────────┘                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Write Contract
//! Every method that writes is one indivisible unit. The `commit_*`
//! methods re-check their preconditions (stock on hand, returnable
//! quantity, return status) inside that unit and write nothing when a
//! check fails. A ledger append and its quantity change are never split.
//!
//! Documents come back with their lines, lines in position order.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use tracing::info;

use motormods_core::billing::{ReturnPlan, SalePlan};
use motormods_core::inventory::SaleHistory;
use motormods_core::ledger::{LedgerFilter, ProjectedState};
use motormods_core::{
    AdjustmentType, DateRange, FsnClass, Invoice, Item, ItemUpdate, LedgerEntry, SalesReturn,
};

use crate::error::{DbError, DbResult};
use crate::pool::{Database, DbConfig};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Environment variable selecting the backend (`sqlite` or `memory`).
pub const STORE_ENV: &str = "MOTORMODS_STORE";
/// Environment variable overriding the database file.
pub const DB_PATH_ENV: &str = "MOTORMODS_DB_PATH";
/// File name of the database inside the app data folder.
pub const DB_FILE_NAME: &str = "motormods.db";

/// Which backend a store is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

// =============================================================================
// Trait
// =============================================================================

#[async_trait]
pub trait InventoryStore: Send + Sync + std::fmt::Debug {
    fn backend(&self) -> StoreBackend;

    // -------------------------------------------------------------------------
    // Items
    // -------------------------------------------------------------------------

    /// Inserts an item. When `opening` is given it is appended in the same
    /// unit and `item.quantity` must equal its delta.
    async fn insert_item(&self, item: &Item, opening: Option<&LedgerEntry>) -> DbResult<()>;

    async fn get_item(&self, id: &str) -> DbResult<Option<Item>>;

    /// Every item, active or not, ordered by name.
    async fn list_items(&self) -> DbResult<Vec<Item>>;

    /// Applies master-data edits. Cached fields are untouched.
    async fn update_item(&self, id: &str, update: &ItemUpdate, at: DateTime<Utc>) -> DbResult<Item>;

    async fn set_item_active(&self, id: &str, active: bool, at: DateTime<Utc>) -> DbResult<()>;

    // -------------------------------------------------------------------------
    // Ledger
    // -------------------------------------------------------------------------

    /// Appends one entry and applies its delta to the item's quantity.
    ///
    /// Never rejects on sign or magnitude. `NotFound` for an unknown item.
    async fn append_entry(&self, entry: &LedgerEntry) -> DbResult<()>;

    /// Entries matching the filter, newest first.
    async fn list_entries(&self, filter: &LedgerFilter) -> DbResult<Vec<LedgerEntry>>;

    /// The whole ledger, oldest first.
    async fn all_entries(&self) -> DbResult<Vec<LedgerEntry>>;

    /// Signed sum of deltas per adjustment type for one item.
    async fn sum_by_type(&self, item_id: &str) -> DbResult<BTreeMap<AdjustmentType, i64>>;

    /// Sale history per item that has ever been sold.
    async fn sale_histories(&self) -> DbResult<HashMap<String, SaleHistory>>;

    // -------------------------------------------------------------------------
    // Projection
    // -------------------------------------------------------------------------

    /// Moves `last_sale_at` forward to `at`; earlier timestamps are ignored.
    async fn mark_sold(&self, item_id: &str, at: DateTime<Utc>) -> DbResult<()>;

    /// Writes cached FSN classes. Unknown ids are skipped.
    async fn set_fsn_classes(&self, classes: &[(String, FsnClass)]) -> DbResult<()>;

    /// Overwrites cached quantity and last sale for every item. Items
    /// missing from `states` get zero and no last sale.
    ///
    /// ## Returns
    /// Number of items whose cached values changed.
    async fn replace_projection(&self, states: &BTreeMap<String, ProjectedState>, at: DateTime<Utc>) -> DbResult<usize>;

    // -------------------------------------------------------------------------
    // Documents
    // -------------------------------------------------------------------------

    /// Writes a planned sale: number, header, lines, `sale` entries,
    /// quantity decrements and last-sale updates.
    async fn commit_sale(&self, plan: SalePlan) -> DbResult<Invoice>;

    /// Writes a planned return: number, header, lines, `return` entries and
    /// quantity increments.
    async fn commit_return(&self, plan: ReturnPlan) -> DbResult<SalesReturn>;

    /// Cancels a completed return: status flip plus one `manual_deduction`
    /// entry per line. `false` when the return is unknown or already
    /// cancelled.
    async fn commit_cancellation(&self, return_id: &str, actor: &str, at: DateTime<Utc>) -> DbResult<bool>;

    async fn get_invoice(&self, id: &str) -> DbResult<Option<Invoice>>;

    /// Invoices created in the range, oldest first.
    async fn list_invoices(&self, range: &DateRange) -> DbResult<Vec<Invoice>>;

    async fn get_return(&self, id: &str) -> DbResult<Option<SalesReturn>>;

    /// Every return (any status) against an invoice, oldest first.
    async fn returns_for_invoice(&self, invoice_id: &str) -> DbResult<Vec<SalesReturn>>;

    /// Returns (any status) created in the range, oldest first.
    async fn list_returns(&self, range: &DateRange) -> DbResult<Vec<SalesReturn>>;

    // -------------------------------------------------------------------------
    // Settings
    // -------------------------------------------------------------------------

    async fn get_setting(&self, key: &str) -> DbResult<Option<String>>;

    async fn put_setting(&self, key: &str, value: &str, at: DateTime<Utc>) -> DbResult<()>;

    /// All persisted overrides, ordered by key.
    async fn list_settings(&self) -> DbResult<Vec<(String, String)>>;
}

// =============================================================================
// Configuration
// =============================================================================

/// Which store to open at startup.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    Sqlite(DbConfig),
    Memory,
}

impl StoreConfig {
    /// Reads `MOTORMODS_STORE` and `MOTORMODS_DB_PATH`.
    ///
    /// ## Resolution
    /// 1. `MOTORMODS_STORE=memory` → in-memory store
    /// 2. `MOTORMODS_DB_PATH` set → SQLite at that path
    /// 3. otherwise → SQLite in the platform app data folder
    pub fn from_env() -> DbResult<Self> {
        let backend = std::env::var(STORE_ENV).unwrap_or_default();
        match backend.trim().to_ascii_lowercase().as_str() {
            "memory" => return Ok(StoreConfig::Memory),
            "" | "sqlite" => {}
            other => {
                return Err(DbError::Internal(format!(
                    "{STORE_ENV} must be 'sqlite' or 'memory', got '{other}'"
                )))
            }
        }

        let path = match std::env::var(DB_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => default_db_path()?,
        };
        Ok(StoreConfig::Sqlite(DbConfig::new(path)))
    }
}

/// `<app data>/motormods.db` for the current platform.
///
/// - Linux: `~/.local/share/motormods/motormods.db`
/// - macOS: `~/Library/Application Support/com.motormods.motormods/motormods.db`
/// - Windows: `%APPDATA%\motormods\motormods\data\motormods.db`
pub fn default_db_path() -> DbResult<PathBuf> {
    let dirs = ProjectDirs::from("com", "motormods", "motormods")
        .ok_or_else(|| DbError::StorageUnavailable("Could not determine app data directory".to_string()))?;
    Ok(dirs.data_dir().join(DB_FILE_NAME))
}

/// Opens the configured backend.
pub async fn open_store(config: StoreConfig) -> DbResult<Arc<dyn InventoryStore>> {
    match config {
        StoreConfig::Memory => {
            info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreConfig::Sqlite(db_config) => {
            let db = Database::new(db_config).await?;
            info!(path = %db.path().display(), "Using SQLite store");
            Ok(Arc::new(SqliteStore::new(db)))
        }
    }
}
