//! # Storage Error Types
//!
//! Error types for store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  sqlx::Error / CoreError (InsufficientStock, ...)                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UI command layer ← Shows the message, nothing retried                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use motormods_core::CoreError;
use thiserror::Error;

/// Store operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found.
    ///
    /// ## When This Occurs
    /// - Unknown item, invoice or return id
    /// - Ledger append against an item that does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Creating or renaming an item to an existing SKU
    /// - Two documents issued the same number
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// The underlying store cannot be reached.
    ///
    /// ## When This Occurs
    /// - Database file can't be opened or created
    /// - File permissions issue, disk full
    /// - Pool already closed
    ///
    /// Fatal: surfaced to the caller, never retried.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A business rule rejected the operation (nothing was written).
    #[error(transparent)]
    Domain(CoreError),

    /// Internal storage error.
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

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether the store itself is gone (as opposed to a rejected request).
    pub fn is_fatal(&self) -> bool {
        matches!(self, DbError::StorageUnavailable(_) | DbError::PoolExhausted)
    }

    /// The business rule violation, if that is what this is.
    pub fn as_domain(&self) -> Option<&CoreError> {
        match self {
            DbError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

/// Unknown catalogue ids surface as `NotFound`; every other rule
/// violation stays a `Domain` error.
impl From<CoreError> for DbError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnknownItem { id } => DbError::not_found("Item", id),
            other => DbError::Domain(other),
        }
    }
}

impl From<motormods_core::ValidationError> for DbError {
    fn from(err: motormods_core::ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::PoolClosed/Io  → DbError::StorageUnavailable
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if let Some(field) = msg.split("UNIQUE constraint failed: ").nth(1) {
                    DbError::UniqueViolation {
                        field: field.to_string(),
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::StorageUnavailable("Pool is closed".to_string()),

            sqlx::Error::Io(e) => DbError::StorageUnavailable(e.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for store operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(DbError::StorageUnavailable("disk".into()).is_fatal());
        assert!(DbError::PoolExhausted.is_fatal());
        assert!(!DbError::not_found("Item", "x").is_fatal());
    }

    #[test]
    fn test_domain_errors_display_unchanged() {
        let err: DbError = CoreError::InsufficientStock {
            item: "Brake Pad".into(),
            sku: "BP-01".into(),
            available: 3,
            requested: 9,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Brake Pad (BP-01): available 3, requested 9"
        );
        assert!(err.as_domain().is_some());
    }

    #[test]
    fn test_unknown_item_maps_to_not_found() {
        let err: DbError = CoreError::UnknownItem { id: "ghost".into() }.into();
        assert!(matches!(err, DbError::NotFound { ref entity, .. } if entity == "Item"));
    }

    #[test]
    fn test_pool_closed_is_unavailable() {
        let err: DbError = sqlx::Error::PoolClosed.into();
        assert!(err.is_fatal());
    }
}
