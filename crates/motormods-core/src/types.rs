//! # Domain Types
//!
//! Core domain types used throughout MotorMods.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Item       │   │   LedgerEntry   │   │    Invoice      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  item_id        │   │  invoice_number │       │
//! │  │  sku (business) │   │  adjustment_type│   │  lines[]        │       │
//! │  │  quantity*      │   │  delta (signed) │   │  grand_total    │       │
//! │  │  last_sale_at*  │   │  actor, note    │   └─────────────────┘       │
//! │  │  fsn_class*     │   └─────────────────┘   ┌─────────────────┐       │
//! │  └─────────────────┘                         │  SalesReturn    │       │
//! │   * derived from the ledger (cached)         │  return_number  │       │
//! │                                              │  status, lines[]│       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4, immutable, used for relations
//! - Business ID: (sku, invoice_number, return_number), human-readable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::{DEFAULT_MAX_STOCK, DEFAULT_REORDER_LEVEL};

/// Generates a new entity id (UUID v4, hyphenated).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// =============================================================================
// FSN Classification
// =============================================================================

/// Fast / Slow / Non-moving classification by recency of the last sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum FsnClass {
    /// Sold within the last 30 days.
    Fast,
    /// Sold within the non-moving threshold.
    Slow,
    /// Not sold within the threshold, or never sold.
    NonMoving,
}

string_enum!(FsnClass, "fsn_class", {
    Fast => "fast",
    Slow => "slow",
    NonMoving => "non_moving",
});

impl FsnClass {
    /// Sort rank for the non-moving report: Non-moving first, Fast last.
    pub const fn report_rank(&self) -> u8 {
        match self {
            FsnClass::NonMoving => 0,
            FsnClass::Slow => 1,
            FsnClass::Fast => 2,
        }
    }
}

impl Default for FsnClass {
    fn default() -> Self {
        FsnClass::NonMoving
    }
}

// =============================================================================
// Item
// =============================================================================

/// An item in the store's catalogue.
///
/// `quantity`, `last_sale_at` and `fsn_class` are a cache over the stock
/// ledger. They are written only by ledger appends and FSN recomputes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Item {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown on the bill.
    pub name: String,

    /// Part number / stock keeping unit.
    pub sku: String,

    /// Optional grouping (Brakes, Lubricants, ...).
    pub category: Option<String>,

    /// Selling price in minor units.
    pub unit_price_cents: i64,

    /// Purchase cost in minor units.
    pub purchase_cost_cents: i64,

    /// Current quantity on hand (derived).
    pub quantity: i64,

    /// Reorder level. `None` means the store default.
    pub reorder_level: Option<i64>,

    /// Maximum stock used by the percentage low-stock method.
    pub max_stock: Option<i64>,

    /// Timestamp of the most recent sale (derived).
    #[ts(as = "Option<String>")]
    pub last_sale_at: Option<DateTime<Utc>>,

    /// Cached FSN classification (derived).
    pub fsn_class: FsnClass,

    /// Soft-delete flag. Items referenced by the ledger are never removed.
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Returns the selling price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the purchase cost as Money.
    #[inline]
    pub fn purchase_cost(&self) -> Money {
        Money::from_cents(self.purchase_cost_cents)
    }

    /// Stock value at selling price (price × quantity).
    #[inline]
    pub fn stock_value(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }

    /// Reorder level with the store default applied.
    #[inline]
    pub fn effective_reorder_level(&self) -> i64 {
        self.reorder_level.unwrap_or(DEFAULT_REORDER_LEVEL)
    }

    /// Max stock with the store default applied.
    #[inline]
    pub fn effective_max_stock(&self) -> i64 {
        self.max_stock.unwrap_or(DEFAULT_MAX_STOCK)
    }

    /// Case-insensitive substring match on name or SKU.
    ///
    /// `needle` must already be lowercase; an empty needle matches everything.
    pub fn matches_search(&self, needle: &str) -> bool {
        needle.is_empty()
            || self.name.to_lowercase().contains(needle)
            || self.sku.to_lowercase().contains(needle)
    }
}

/// Input for creating an item.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewItem {
    pub name: String,
    pub sku: String,
    pub category: Option<String>,
    pub unit_price_cents: i64,
    pub purchase_cost_cents: i64,
    pub reorder_level: Option<i64>,
    pub max_stock: Option<i64>,
    /// Recorded as an `opening_stock` ledger entry when positive.
    pub opening_stock: i64,
    pub actor: String,
}

/// Editable item master fields. Quantity is deliberately absent.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItemUpdate {
    pub name: String,
    pub sku: String,
    pub category: Option<String>,
    pub unit_price_cents: i64,
    pub purchase_cost_cents: i64,
    pub reorder_level: Option<i64>,
    pub max_stock: Option<i64>,
}

// =============================================================================
// Stock Ledger
// =============================================================================

/// Cause of a stock quantity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    OpeningStock,
    ManualAdd,
    ManualDeduction,
    SupplierReturn,
    DamageWriteOff,
    Sale,
    Return,
    Other,
}

string_enum!(AdjustmentType, "adjustment_type", {
    OpeningStock => "opening_stock",
    ManualAdd => "manual_add",
    ManualDeduction => "manual_deduction",
    SupplierReturn => "supplier_return",
    DamageWriteOff => "damage_write_off",
    Sale => "sale",
    Return => "return",
    Other => "other",
});

/// One immutable stock ledger record.
///
/// Corrections are new offsetting entries, never edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LedgerEntry {
    pub id: String,
    pub item_id: String,
    pub adjustment_type: AdjustmentType,
    /// Signed quantity change (negative for sales and deductions).
    pub delta: i64,
    pub note: String,
    /// Who made the change (cashier name, "system", ...).
    pub actor: String,
    /// Invoice or return that caused the entry, if any.
    pub reference_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Invoices
// =============================================================================

/// How an invoice was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    Cash,
    Card,
    Upi,
    Credit,
}

string_enum!(PaymentMode, "payment_mode", {
    Cash => "cash",
    Card => "card",
    Upi => "upi",
    Credit => "credit",
});

impl Default for PaymentMode {
    fn default() -> Self {
        PaymentMode::Cash
    }
}

/// A recorded sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    /// `INV-YYYYMMDD-NNN`.
    pub invoice_number: String,
    /// `None` for a walking customer.
    pub customer_name: Option<String>,
    pub payment_mode: PaymentMode,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub grand_total_cents: i64,
    pub actor: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub lines: Vec<InvoiceLine>,
}

impl Invoice {
    /// Total units across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

/// A line of an invoice.
///
/// Uses the snapshot pattern: sku, name, price and cost are frozen at the
/// time of sale so later catalogue edits never rewrite history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceLine {
    pub id: String,
    pub invoice_id: String,
    /// Line order within the invoice, starting at 1.
    pub position: i64,
    pub item_id: String,
    pub sku_snapshot: String,
    pub name_snapshot: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// Purchase cost at time of sale.
    pub unit_cost_cents: i64,
    pub line_total_cents: i64,
}

impl InvoiceLine {
    /// Revenue of the line (qty × price).
    #[inline]
    pub fn revenue(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }

    /// Cost of the line using the snapshotted unit cost.
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents).multiply_quantity(self.quantity)
    }
}

/// Input for recording a sale.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewInvoice {
    pub customer_name: Option<String>,
    pub payment_mode: PaymentMode,
    pub discount_cents: i64,
    pub actor: String,
    pub lines: Vec<NewInvoiceLine>,
}

/// One requested invoice line.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewInvoiceLine {
    pub item_id: String,
    pub quantity: i64,
    /// Overrides the catalogue price (negotiated price). `None` uses the item price.
    pub unit_price_cents: Option<i64>,
}

// =============================================================================
// Sales Returns
// =============================================================================

/// Why goods came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReturnReason {
    Damage,
    WrongPart,
    CustomerRequest,
    Defective,
    Other,
}

string_enum!(ReturnReason, "reason", {
    Damage => "damage",
    WrongPart => "wrong_part",
    CustomerRequest => "customer_request",
    Defective => "defective",
    Other => "other",
});

impl ReturnReason {
    /// Label used on return slips.
    pub const fn label(&self) -> &'static str {
        match self {
            ReturnReason::Damage => "Damage",
            ReturnReason::WrongPart => "Wrong Part",
            ReturnReason::CustomerRequest => "Customer Request",
            ReturnReason::Defective => "Defective",
            ReturnReason::Other => "Other",
        }
    }
}

/// Lifecycle of a return. Cancelled returns stay in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    Completed,
    Cancelled,
}

string_enum!(ReturnStatus, "status", {
    Completed => "completed",
    Cancelled => "cancelled",
});

/// A sales return against one invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesReturn {
    pub id: String,
    /// `RET-YYYYMMDD-NNN`, sequence restarts every calendar day.
    pub return_number: String,
    pub invoice_id: String,
    pub reason: ReturnReason,
    pub notes: Option<String>,
    pub total_cents: i64,
    pub status: ReturnStatus,
    pub actor: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub lines: Vec<ReturnLine>,
}

impl SalesReturn {
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.status == ReturnStatus::Completed
    }
}

/// A line of a sales return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ReturnLine {
    pub id: String,
    pub return_id: String,
    pub position: i64,
    pub item_id: String,
    pub quantity: i64,
    /// Unit price refunded (the original invoice price).
    pub rate_cents: i64,
    pub line_total_cents: i64,
}

/// Input for recording a return.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewReturn {
    pub invoice_id: String,
    pub reason: ReturnReason,
    pub notes: Option<String>,
    pub actor: String,
    pub lines: Vec<NewReturnLine>,
}

/// One requested return line.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewReturnLine {
    pub item_id: String,
    pub quantity: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: i64) -> Item {
        let now = Utc::now();
        Item {
            id: "item-1".to_string(),
            name: "Brake Pad".to_string(),
            sku: "BP-01".to_string(),
            category: None,
            unit_price_cents: 1500,
            purchase_cost_cents: 900,
            quantity,
            reorder_level: None,
            max_stock: None,
            last_sale_at: None,
            fsn_class: FsnClass::default(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_adjustment_type_round_trips_through_str() {
        for t in AdjustmentType::ALL {
            assert_eq!(t.as_str().parse::<AdjustmentType>().unwrap(), *t);
        }
        assert!("refund".parse::<AdjustmentType>().is_err());
    }

    #[test]
    fn test_serde_matches_as_str() {
        let json = serde_json::to_string(&AdjustmentType::DamageWriteOff).unwrap();
        assert_eq!(json, "\"damage_write_off\"");
        let json = serde_json::to_string(&FsnClass::NonMoving).unwrap();
        assert_eq!(json, "\"non_moving\"");
    }

    #[test]
    fn test_item_defaults() {
        let it = item(4);
        assert_eq!(it.effective_reorder_level(), DEFAULT_REORDER_LEVEL);
        assert_eq!(it.effective_max_stock(), DEFAULT_MAX_STOCK);
        assert_eq!(it.stock_value().cents(), 6000);
        assert_eq!(it.fsn_class, FsnClass::NonMoving);
    }

    #[test]
    fn test_item_search_matches_name_or_sku() {
        let it = item(1);
        assert!(it.matches_search(""));
        assert!(it.matches_search("brake"));
        assert!(it.matches_search("bp-0"));
        assert!(!it.matches_search("lube"));
    }

    #[test]
    fn test_return_reason_label() {
        assert_eq!(ReturnReason::WrongPart.label(), "Wrong Part");
        assert_eq!("customer_request".parse::<ReturnReason>().unwrap(), ReturnReason::CustomerRequest);
    }

    #[test]
    fn test_new_id_is_uuid() {
        let id = new_id();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
        assert_ne!(id, new_id());
    }

    #[test]
    fn test_fsn_report_rank() {
        let mut classes = vec![FsnClass::Fast, FsnClass::NonMoving, FsnClass::Slow];
        classes.sort_by_key(|c| c.report_rank());
        assert_eq!(classes, vec![FsnClass::NonMoving, FsnClass::Slow, FsnClass::Fast]);
    }
}
