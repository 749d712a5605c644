//! # Error Types
//!
//! Domain-specific error types for motormods-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  motormods-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  motormods-db errors (separate crate)                                  │
//! │  └── DbError          - Storage failures, wraps CoreError              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller / UI             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant carries enough context (item name, requested vs available)
//! to be shown to the cashier without another lookup.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Insufficient stock to complete a sale.
    ///
    /// ## User Workflow
    /// ```text
    /// Bill: Brake Pad × 9
    ///      │
    ///      ▼
    /// Check stock: available = 3
    ///      │
    ///      ▼
    /// InsufficientStock { item: "Brake Pad", available: 3, requested: 9 }
    ///      │
    ///      ▼
    /// UI shows: "Insufficient stock for Brake Pad (BP-01): available 3, requested 9"
    /// ```
    #[error("Insufficient stock for {item} ({sku}): available {available}, requested {requested}")]
    InsufficientStock {
        item: String,
        sku: String,
        available: i64,
        requested: i64,
    },

    /// A return asks for more units than remain returnable on the invoice.
    ///
    /// `returnable` is the invoice line quantity minus what completed
    /// returns already took back.
    #[error("Cannot return {requested} of {item} ({sku}): only {returnable} returnable")]
    ExcessReturnQuantity {
        item: String,
        sku: String,
        returnable: i64,
        requested: i64,
    },

    /// A line references an item id that is not in the catalogue.
    #[error("Unknown item: {id}")]
    UnknownItem { id: String },

    /// The item exists but was deactivated and cannot be sold.
    #[error("Item {item} ({sku}) is inactive")]
    InactiveItem { item: String, sku: String },

    /// An invoice or return was submitted without lines.
    #[error("{document} must contain at least one line")]
    EmptyDocument { document: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business logic or storage call runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Unknown settings key.
    #[error("Unknown setting: {key}")]
    UnknownSetting { key: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
