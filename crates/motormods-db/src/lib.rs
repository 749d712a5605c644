//! # motormods-db: Storage and Services for MotorMods
//!
//! Owns every read and write against the store, and the services the UI
//! commands call.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        MotorMods Data Flow                              │
//! │                                                                         │
//! │  UI command (record_sale, current_stock, backup_database, ...)         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  motormods-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │  SalesRecorder  StockLedger  InventoryProjection                │   │
//! │  │  AnalyticsEngine  SettingsService          BackupManager        │   │
//! │  │          │                                      │               │   │
//! │  │          ▼                                      │               │   │
//! │  │   Arc<dyn InventoryStore> ──► SqliteStore ──► Database (pool)   │   │
//! │  │                          └──► MemoryStore                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  SQLite file: <app data>/motormods.db  (+ backups/)             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`store`] - `InventoryStore` trait, SQLite and in-memory backends
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded schema migrations
//! - [`ledger`], [`projection`], [`recorder`], [`analytics`], [`settings`] - services
//! - [`backup`] - Database file backups
//! - [`clock`] - Time source
//! - [`error`] - Storage error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use motormods_db::{open_store, AnalyticsEngine, SalesRecorder, StoreConfig, SystemClock};
//!
//! let store = open_store(StoreConfig::from_env()?).await?;
//! let clock = Arc::new(SystemClock);
//!
//! let recorder = SalesRecorder::new(store.clone(), clock.clone());
//! let invoice = recorder.record_sale(request).await?;
//!
//! let analytics = AnalyticsEngine::new(store, clock);
//! let low = analytics.current_stock(None, true).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod analytics;
pub mod backup;
pub mod clock;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod projection;
pub mod recorder;
pub mod settings;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use analytics::AnalyticsEngine;
pub use backup::{BackupError, BackupInfo, BackupManager, RestoreOutcome};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{DbError, DbResult};
pub use ledger::StockLedger;
pub use pool::{Database, DbConfig};
pub use projection::InventoryProjection;
pub use recorder::SalesRecorder;
pub use settings::SettingsService;
pub use store::{open_store, InventoryStore, MemoryStore, SqliteStore, StoreBackend, StoreConfig};
