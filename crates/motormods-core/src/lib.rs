//! # motormods-core: Pure Business Logic for MotorMods
//!
//! Domain types and rules for the store's billing, stock ledger, returns
//! and reports. Nothing in this crate performs I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        MotorMods Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │           Frontend (billing, returns, reports, settings)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │     motormods-db services (SalesRecorder, AnalyticsEngine, ...) │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ plain data in, rows out                │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ motormods-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   types  money  ledger  billing  inventory  thresholds  reports │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Items, ledger entries, invoices, returns
//! - [`money`] - Integer money
//! - [`error`] - Domain error types
//! - [`validation`] - Request shape validation
//! - [`range`] - Inclusive report date ranges
//! - [`thresholds`] - Low-stock / non-moving settings with defaults
//! - [`ledger`] - Ledger folding, filters, document numbering
//! - [`billing`] - Sale and return plans with stock / returnable checks
//! - [`inventory`] - FSN classification, stock status, days of supply
//! - [`reports`] - Report rows and aggregation
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use motormods_core::inventory::classify_fsn;
//! use motormods_core::FsnClass;
//!
//! let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
//! let last_sale = now - Duration::days(60);
//!
//! assert_eq!(classify_fsn(Some(last_sale), now, 120), FsnClass::Slow);
//! assert_eq!(classify_fsn(None, now, 120), FsnClass::NonMoving);
//! ```

/// Implements `ALL`, `as_str`, `Display` and `FromStr` for a storage enum.
///
/// The string forms match the serde/sqlx `snake_case` representation so the
/// same value round-trips through JSON, SQLite and the settings table.
macro_rules! string_enum {
    ($ty:ident, $field:literal, { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            /// All variants, in declaration order.
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            /// Returns the storage representation.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $s),+
                }
            }
        }

        impl ::std::fmt::Display for $ty {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $ty {
            type Err = $crate::error::ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($s => Ok($ty::$variant),)+
                    _ => Err($crate::error::ValidationError::NotAllowed {
                        field: $field.to_string(),
                        allowed: vec![$($s.to_string()),+],
                    }),
                }
            }
        }
    };
}

// =============================================================================
// Module Declarations
// =============================================================================

pub mod billing;
pub mod error;
pub mod inventory;
pub mod ledger;
pub mod money;
pub mod range;
pub mod reports;
pub mod thresholds;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use range::DateRange;
pub use thresholds::{LowStockMethod, ThresholdConfig};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Reorder level applied to items that have none set.
pub const DEFAULT_REORDER_LEVEL: i64 = 5;

/// Max stock applied to items that have none set (percentage method).
pub const DEFAULT_MAX_STOCK: i64 = 100;

/// Items sold within this many days are Fast moving.
pub const FAST_MOVING_DAYS: i64 = 30;

/// Maximum quantity on a single invoice or return line.
///
/// Catches typos like 1000 instead of 10 at the counter.
pub const MAX_LINE_QUANTITY: i64 = 9_999;

/// Actor recorded for changes made by the system itself (rebuilds, seeding).
pub const SYSTEM_ACTOR: &str = "system";
