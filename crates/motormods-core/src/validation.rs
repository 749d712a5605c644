//! # Validation Module
//!
//! Input validation for item master, billing and returns.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Frontend forms (format, empty fields)                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE, shape of the request                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SalesRecorder, stock availability / returnable quantity      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: SQLite constraints (UNIQUE sku, FOREIGN KEY, CHECK qty > 0)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use motormods_core::validation::{validate_sku, validate_quantity};
//!
//! assert!(validate_sku("BP-01").is_ok());
//! assert!(validate_quantity(5).is_ok());
//! ```

use chrono::NaiveDate;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{ItemUpdate, NewInvoice, NewItem, NewReturn};
use crate::MAX_LINE_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU / part number.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, digits, hyphens, underscores, dots and slashes only
///   (part numbers like `CB-125/F` are common)
///
/// ```rust
/// use motormods_core::validation::validate_sku;
///
/// assert!(validate_sku("CB-125/F").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("BAD SKU").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, '-', '_', '.', '/'".to_string(),
        });
    }

    Ok(())
}

/// Validates an item name: non-empty, at most 200 characters.
pub fn validate_item_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a report search box value.
///
/// ## Returns
/// The trimmed, lowercased needle (empty means "no filter").
pub fn normalize_search(query: Option<&str>) -> ValidationResult<String> {
    let query = query.unwrap_or("").trim();

    if query.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "search".to_string(),
            max: 100,
        });
    }

    Ok(query.to_lowercase())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity: positive and at most [`MAX_LINE_QUANTITY`].
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if quantity > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates that an amount in minor units is not negative.
pub fn validate_amount(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates an optional stock level field (reorder level, max stock).
fn validate_optional_level(field: &str, level: Option<i64>) -> ValidationResult<()> {
    match level {
        Some(v) if v < 0 => Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Parses a `YYYY-MM-DD` date coming from the reports UI.
pub fn parse_date(field: &str, value: &str) -> ValidationResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| {
        ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: format!("expected YYYY-MM-DD ({e})"),
        }
    })
}

// =============================================================================
// Document Validators
// =============================================================================

/// Validates a new item before it reaches storage.
pub fn validate_new_item(item: &NewItem) -> ValidationResult<()> {
    validate_item_name(&item.name)?;
    validate_sku(&item.sku)?;
    validate_amount("unit_price", item.unit_price_cents)?;
    validate_amount("purchase_cost", item.purchase_cost_cents)?;
    validate_optional_level("reorder_level", item.reorder_level)?;
    validate_optional_level("max_stock", item.max_stock)?;
    if item.opening_stock < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "opening_stock".to_string(),
        });
    }
    Ok(())
}

/// Validates an item master edit.
pub fn validate_item_update(update: &ItemUpdate) -> ValidationResult<()> {
    validate_item_name(&update.name)?;
    validate_sku(&update.sku)?;
    validate_amount("unit_price", update.unit_price_cents)?;
    validate_amount("purchase_cost", update.purchase_cost_cents)?;
    validate_optional_level("reorder_level", update.reorder_level)?;
    validate_optional_level("max_stock", update.max_stock)?;
    Ok(())
}

/// Validates the shape of a sale request (stock is checked later).
pub fn validate_new_invoice(invoice: &NewInvoice) -> CoreResult<()> {
    if invoice.lines.is_empty() {
        return Err(CoreError::EmptyDocument {
            document: "Invoice".to_string(),
        });
    }
    validate_amount("discount", invoice.discount_cents)?;
    for line in &invoice.lines {
        validate_quantity(line.quantity)?;
        if let Some(price) = line.unit_price_cents {
            validate_amount("unit_price", price)?;
        }
    }
    Ok(())
}

/// Validates the shape of a return request (returnable quantity is checked later).
pub fn validate_new_return(ret: &NewReturn) -> CoreResult<()> {
    if ret.lines.is_empty() {
        return Err(CoreError::EmptyDocument {
            document: "Return".to_string(),
        });
    }
    for line in &ret.lines {
        validate_quantity(line.quantity)?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
