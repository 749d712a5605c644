//! # SQLite File and Pool
//!
//! Opens `motormods.db` (or a private in-memory database for tests) and
//! hands out the pool every `SqliteStore` call runs on.
//!
//! ```text
//!   StoreConfig::Sqlite(DbConfig)
//!            │
//!            ▼
//!   Database::new ── mkdir parent ── WAL + NORMAL + FK ── migrate
//!            │
//!            ├──► SqliteStore       (sales, returns, reports)
//!            └──► BackupManager     (checkpoint, close before restore)
//! ```
//!
//! WAL lets report queries run while a sale commits. The backup manager
//! checkpoints before copying so the main file alone is a complete copy.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;

const MEMORY_PATH: &str = ":memory:";

/// How long a writer waits on another connection's write lock.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Configuration
// =============================================================================

/// Where the store lives and how many connections it may hold.
///
/// ```rust,ignore
/// let config = DbConfig::new(default_db_path()?).max_connections(3);
/// let db = Database::new(config).await?;
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_path: PathBuf,

    /// 5 by default; one counter rarely needs more.
    pub max_connections: u32,
    pub min_connections: u32,

    /// How long a caller waits for a free connection (30 s).
    pub connect_timeout: Duration,

    /// `None` keeps idle connections forever (10 min by default).
    pub idle_timeout: Option<Duration>,

    /// Apply embedded migrations on open (default true).
    pub run_migrations: bool,
}

impl DbConfig {
    /// File-backed store at `path`, created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Skip migrations when opening a file someone else already migrated.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// A single connection that is never recycled: an in-memory SQLite
    /// database lives exactly as long as its connection.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(MEMORY_PATH),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: None,
            run_migrations: true,
        }
    }

    /// Whether this config points at an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.database_path == Path::new(MEMORY_PATH)
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle: the pool plus the file it points at.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    path: PathBuf,
}

impl Database {
    /// Opens (or creates) the store and migrates it.
    ///
    /// File stores get their parent folder created, WAL journaling and
    /// NORMAL sync. Writers that find the file locked wait up to
    /// [`BUSY_TIMEOUT`] before failing. Foreign keys are always on.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening store database");

        if !config.is_in_memory() {
            if let Some(parent) = config.database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| DbError::StorageUnavailable(e.to_string()))?;
            }
        }

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let mut connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::StorageUnavailable(e.to_string()))?
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT)
            // off by default in SQLite
            .foreign_keys(true)
            .create_if_missing(true);

        // WAL needs a real file
        if !config.is_in_memory() {
            connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
        }

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout);
        if config.is_in_memory() {
            pool_options = pool_options.max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::StorageUnavailable(e.to_string()))?;

        debug!(max_connections = config.max_connections, in_memory = config.is_in_memory(), "Pool ready");

        let db = Database {
            pool,
            path: config.database_path,
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies pending migrations. Safe to call again.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Path of the database file (`:memory:` for in-memory databases).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes the WAL into the main database file.
    ///
    /// Called before copying the file for a backup.
    pub async fn checkpoint(&self) -> DbResult<()> {
        debug!(path = %self.path.display(), "Checkpointing WAL");
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Closes every connection. Later store calls fail with
    /// `StorageUnavailable`.
    pub async fn close(&self) {
        info!(path = %self.path.display(), "Closing store database");
        self.pool.close().await;
    }

    /// `false` once the pool is closed or the file is gone.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
