//! # Database Backups
//!
//! File-level copies of the SQLite database kept in a `backups` folder next
//! to it.
//!
//! ## Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  create_backup ──► checkpoint WAL ──► copy db ──► backups/             │
//! │                                      motormods_backup_<ts>.db          │
//! │                                                                         │
//! │  restore_backup(name) ──► close pool ──► safety copy of current db     │
//! │  import_backup(path)      (pre_restore_safety_<ts>.db /                │
//! │                            pre_import_safety_<ts>.db)                  │
//! │                       ──► copy over db ──► drop -wal / -shm            │
//! │                                                                         │
//! │  list / export / delete: plain file operations on backups/*.db         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Copies made by the async operations go through `tokio::fs`; list, export
//! and delete stay synchronous. After a restore or import the pool is
//! closed; the caller opens a new store on the same path. `<ts>` is `YYYY-MM-DD_HH-MM-SS` (UTC).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::DbError;
use crate::pool::Database;

/// Folder, next to the database file, that holds backups.
pub const BACKUPS_DIR_NAME: &str = "backups";

const BACKUP_PREFIX: &str = "motormods_backup_";
const RESTORE_SAFETY_PREFIX: &str = "pre_restore_safety_";
const IMPORT_SAFETY_PREFIX: &str = "pre_import_safety_";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum BackupError {
    /// The database or backup file does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Wrong extension, or a name that tries to leave the backups folder.
    #[error("Invalid backup file: {0}")]
    InvalidFile(String),

    #[error("Backup I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Db(#[from] DbError),
}

pub type BackupResult<T> = Result<T, BackupError>;

// =============================================================================
// Types
// =============================================================================

/// One file in the backups folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupInfo {
    pub filename: String,
    pub path: PathBuf,
    pub file_size: u64,
    pub modified_at: DateTime<Utc>,
}

/// Outcome of a restore or import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreOutcome {
    /// Backup name or source path that was copied in.
    pub restored_from: String,
    /// Copy of the database as it was before, if there was one.
    pub safety_backup: Option<String>,
}

// =============================================================================
// Manager
// =============================================================================

#[derive(Debug, Clone)]
pub struct BackupManager {
    db_path: PathBuf,
    backups_dir: PathBuf,
    clock: Arc<dyn Clock>,
    /// Open pool on `db_path`, checkpointed before copies and closed
    /// before the file is replaced.
    db: Option<Database>,
}

impl BackupManager {
    /// Manager for the database at `db_path`, keeping backups in
    /// `<db dir>/backups`.
    pub fn new(db_path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        let db_path = db_path.into();
        let backups_dir = db_path
            .parent()
            .map(|p| p.join(BACKUPS_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(BACKUPS_DIR_NAME));
        BackupManager {
            db_path,
            backups_dir,
            clock,
            db: None,
        }
    }

    /// Manager bound to an open database.
    pub fn for_database(db: Database, clock: Arc<dyn Clock>) -> Self {
        let mut manager = BackupManager::new(db.path().to_path_buf(), clock);
        manager.db = Some(db);
        manager
    }

    /// Keeps backups somewhere other than next to the database.
    pub fn with_backups_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backups_dir = dir.into();
        self
    }

    /// The backups folder, created on first use.
    pub fn backups_dir(&self) -> BackupResult<PathBuf> {
        if !self.backups_dir.exists() {
            fs::create_dir_all(&self.backups_dir)?;
        }
        Ok(self.backups_dir.clone())
    }

    fn timestamp(&self) -> String {
        self.clock.now().format(TIMESTAMP_FORMAT).to_string()
    }

    /// Copies the current database into the backups folder.
    pub async fn create_backup(&self) -> BackupResult<BackupInfo> {
        if !tokio::fs::try_exists(&self.db_path).await? {
            return Err(BackupError::NotFound("Database file".to_string()));
        }
        if let Some(db) = &self.db {
            db.checkpoint().await?;
        }

        let dir = self.backups_dir()?;
        let path = unique_path(&dir, &format!("{BACKUP_PREFIX}{}", self.timestamp()));
        tokio::fs::copy(&self.db_path, &path).await?;

        let info = backup_info(&path)?;
        info!(filename = %info.filename, bytes = info.file_size, "Backup created");
        Ok(info)
    }

    /// Backups (`.db` files), newest first.
    pub fn list_backups(&self) -> BackupResult<Vec<BackupInfo>> {
        let dir = self.backups_dir()?;
        let mut backups = Vec::new();

        for entry in fs::read_dir(&dir)?.flatten() {
            let path = entry.path();
            if !has_db_extension(&path) || !path.is_file() {
                continue;
            }
            match backup_info(&path) {
                Ok(info) => backups.push(info),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable backup"),
            }
        }

        backups.sort_by(|a, b| {
            b.modified_at
                .cmp(&a.modified_at)
                .then_with(|| b.filename.cmp(&a.filename))
        });
        Ok(backups)
    }

    /// Replaces the database with a backup from the folder.
    ///
    /// The current database is first copied to `pre_restore_safety_<ts>.db`.
    pub async fn restore_backup(&self, name: &str) -> BackupResult<RestoreOutcome> {
        let source = self.backup_path(name)?;
        if !tokio::fs::try_exists(&source).await? {
            return Err(BackupError::NotFound(format!("Backup {name}")));
        }

        let safety_backup = self.replace_database(&source, RESTORE_SAFETY_PREFIX).await?;
        info!(backup = %name, safety = ?safety_backup, "Database restored");
        Ok(RestoreOutcome {
            restored_from: name.to_string(),
            safety_backup,
        })
    }

    /// Replaces the database with an external `.db` file.
    ///
    /// The current database is first copied to `pre_import_safety_<ts>.db`.
    pub async fn import_backup(&self, source: impl AsRef<Path>) -> BackupResult<RestoreOutcome> {
        let source = source.as_ref();
        if !tokio::fs::try_exists(source).await? {
            return Err(BackupError::NotFound(format!("Source file {}", source.display())));
        }
        if !has_db_extension(source) {
            return Err(BackupError::InvalidFile("expected a .db file".to_string()));
        }

        let safety_backup = self.replace_database(source, IMPORT_SAFETY_PREFIX).await?;
        info!(source = %source.display(), safety = ?safety_backup, "Database imported");
        Ok(RestoreOutcome {
            restored_from: source.display().to_string(),
            safety_backup,
        })
    }

    /// Copies a backup out of the folder.
    pub fn export_backup(&self, name: &str, destination: impl AsRef<Path>) -> BackupResult<PathBuf> {
        let source = self.backup_path(name)?;
        if !source.exists() {
            return Err(BackupError::NotFound(format!("Backup {name}")));
        }

        let destination = destination.as_ref().to_path_buf();
        fs::copy(&source, &destination)?;
        info!(backup = %name, destination = %destination.display(), "Backup exported");
        Ok(destination)
    }

    /// Deletes a `.db` backup from the folder.
    pub fn delete_backup(&self, name: &str) -> BackupResult<()> {
        let path = self.backup_path(name)?;
        if !path.exists() {
            return Err(BackupError::NotFound(format!("Backup {name}")));
        }
        if !has_db_extension(&path) {
            return Err(BackupError::InvalidFile("only .db backups can be deleted".to_string()));
        }

        fs::remove_file(&path)?;
        info!(backup = %name, "Backup deleted");
        Ok(())
    }

    /// Resolves a bare file name inside the backups folder.
    fn backup_path(&self, name: &str) -> BackupResult<PathBuf> {
        let is_bare = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && Path::new(name).file_name().is_some_and(|f| f == name);
        if !is_bare {
            return Err(BackupError::InvalidFile(format!("'{name}' is not a backup file name")));
        }
        Ok(self.backups_dir()?.join(name))
    }

    /// Safety copy, then overwrite the database file with `source`.
    async fn replace_database(&self, source: &Path, safety_prefix: &str) -> BackupResult<Option<String>> {
        if let Some(db) = &self.db {
            db.checkpoint().await?;
            db.close().await;
        }

        let safety_backup = if tokio::fs::try_exists(&self.db_path).await? {
            let dir = self.backups_dir()?;
            let path = unique_path(&dir, &format!("{safety_prefix}{}", self.timestamp()));
            tokio::fs::copy(&self.db_path, &path).await?;
            file_name(&path)
        } else {
            None
        };

        tokio::fs::copy(source, &self.db_path).await?;
        for suffix in ["-wal", "-shm"] {
            let sidecar = sidecar_path(&self.db_path, suffix);
            if tokio::fs::try_exists(&sidecar).await? {
                debug!(path = %sidecar.display(), "Removing stale sidecar");
                tokio::fs::remove_file(&sidecar).await?;
            }
        }
        Ok(safety_backup)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn has_db_extension(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "db")
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// `<db>-wal` / `<db>-shm`.
fn sidecar_path(db_path: &Path, suffix: &str) -> PathBuf {
    let mut name = db_path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// `<dir>/<stem>.db`, or `<stem>_2.db`, `<stem>_3.db`, ... when taken.
fn unique_path(dir: &Path, stem: &str) -> PathBuf {
    let mut path = dir.join(format!("{stem}.db"));
    let mut n = 2;
    while path.exists() {
        path = dir.join(format!("{stem}_{n}.db"));
        n += 1;
    }
    path
}

fn backup_info(path: &Path) -> BackupResult<BackupInfo> {
    let metadata = fs::metadata(path)?;
    let modified_at: DateTime<Utc> = metadata.modified()?.into();
    Ok(BackupInfo {
        filename: file_name(path).unwrap_or_default(),
        path: path.to_path_buf(),
        file_size: metadata.len(),
        modified_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::TimeZone;

    fn manager(dir: &Path) -> BackupManager {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 6, 1, 18, 5, 9).unwrap()));
        let db_path = dir.join("motormods.db");
        fs::write(&db_path, b"live").unwrap();
        BackupManager::new(db_path, clock)
    }

    #[test]
    fn test_rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        for name in ["../motormods.db", "a/b.db", "a\\b.db", "..", ""] {
            assert!(matches!(manager.delete_backup(name), Err(BackupError::InvalidFile(_))), "{name}");
        }
    }

    #[tokio::test]
    async fn test_backup_name_and_collision_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());

        let first = manager.create_backup().await.unwrap();
        assert_eq!(first.filename, "motormods_backup_2026-06-01_18-05-09.db");
        let second = manager.create_backup().await.unwrap();
        assert_eq!(second.filename, "motormods_backup_2026-06-01_18-05-09_2.db");
        assert_eq!(manager.list_backups().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_listing_serializes_for_the_ui() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        manager.create_backup().await.unwrap();

        let json = serde_json::to_value(manager.list_backups().unwrap()).unwrap();
        assert_eq!(json[0]["filename"], "motormods_backup_2026-06-01_18-05-09.db");
        assert_eq!(json[0]["file_size"], 4);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_restore_on_single_thread_runtime_drops_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let backup = manager.create_backup().await.unwrap();

        let db_path = dir.path().join("motormods.db");
        fs::write(&db_path, b"changed").unwrap();
        fs::write(sidecar_path(&db_path, "-wal"), b"wal").unwrap();
        fs::write(sidecar_path(&db_path, "-shm"), b"shm").unwrap();

        let outcome = manager.restore_backup(&backup.filename).await.unwrap();
        assert_eq!(fs::read(&db_path).unwrap(), b"live");
        assert!(!sidecar_path(&db_path, "-wal").exists());
        assert!(!sidecar_path(&db_path, "-shm").exists());

        let safety = dir.path().join("backups").join(outcome.safety_backup.unwrap());
        assert_eq!(fs::read(safety).unwrap(), b"changed");
    }

    #[test]
    fn test_sidecar_path() {
        let p = sidecar_path(Path::new("/data/motormods.db"), "-wal");
        assert_eq!(p, PathBuf::from("/data/motormods.db-wal"));
    }
}
