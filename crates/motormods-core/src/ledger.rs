//! # Stock Ledger Rules
//!
//! The ledger is the source of truth; cached item fields are a fold of it.
//!
//! ```text
//!   entries (append-only) ──► fold_ledger ──► { item_id: quantity, last_sale_at }
//!                                                   │
//!                          item.quantity ◄──────────┘ must match (reconcile)
//! ```
//!
//! Also owns the ledger query filter and the `PREFIX-YYYYMMDD-NNN` document
//! numbering shared by invoices and returns.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::range::DateRange;
use crate::types::{AdjustmentType, Item, LedgerEntry};

/// Default page size for ledger listings.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

// =============================================================================
// Fold
// =============================================================================

/// Cached item state recomputed from the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectedState {
    pub quantity: i64,
    pub last_sale_at: Option<DateTime<Utc>>,
}

/// Replays entries into per-item quantity and last-sale date.
pub fn fold_ledger<'a, I>(entries: I) -> BTreeMap<String, ProjectedState>
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    let mut state: BTreeMap<String, ProjectedState> = BTreeMap::new();
    for entry in entries {
        let s = state.entry(entry.item_id.clone()).or_default();
        s.quantity += entry.delta;
        if entry.adjustment_type == AdjustmentType::Sale {
            s.last_sale_at = Some(s.last_sale_at.map_or(entry.created_at, |l| l.max(entry.created_at)));
        }
    }
    state
}

/// Signed sum of deltas per adjustment type.
pub fn sum_by_type<'a, I>(entries: I) -> BTreeMap<AdjustmentType, i64>
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    let mut sums = BTreeMap::new();
    for entry in entries {
        *sums.entry(entry.adjustment_type).or_insert(0) += entry.delta;
    }
    sums
}

/// An item whose cached quantity disagrees with its ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReconciliationIssue {
    pub item_id: String,
    pub sku: String,
    pub cached_quantity: i64,
    pub ledger_quantity: i64,
}

/// Compares cached quantities against the fold of the ledger.
pub fn reconcile(items: &[Item], folded: &BTreeMap<String, ProjectedState>) -> Vec<ReconciliationIssue> {
    items
        .iter()
        .filter_map(|item| {
            let ledger_quantity = folded.get(&item.id).map_or(0, |s| s.quantity);
            (ledger_quantity != item.quantity).then(|| ReconciliationIssue {
                item_id: item.id.clone(),
                sku: item.sku.clone(),
                cached_quantity: item.quantity,
                ledger_quantity,
            })
        })
        .collect()
}

// =============================================================================
// Filter
// =============================================================================

/// Ledger listing filter. Results are newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerFilter {
    pub item_id: Option<String>,
    pub adjustment_type: Option<AdjustmentType>,
    #[serde(default)]
    pub range: DateRange,
    /// Page size, [`DEFAULT_PAGE_SIZE`] when unset.
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: u32,
}

impl LedgerFilter {
    /// Filter for one item's history.
    pub fn for_item(item_id: impl Into<String>) -> Self {
        LedgerFilter {
            item_id: Some(item_id.into()),
            ..LedgerFilter::default()
        }
    }

    pub fn with_type(mut self, adjustment_type: AdjustmentType) -> Self {
        self.adjustment_type = Some(adjustment_type);
        self
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }

    pub fn page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Whether an entry passes the item/type/date conditions.
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.item_id.as_deref().map_or(true, |id| entry.item_id == id)
            && self.adjustment_type.map_or(true, |t| entry.adjustment_type == t)
            && self.range.contains_timestamp(entry.created_at)
    }

    /// Filters, orders newest first and paginates an in-memory ledger.
    ///
    /// Ties on `created_at` keep reverse insertion order.
    pub fn apply<'a, I>(&self, entries: I) -> Vec<LedgerEntry>
    where
        I: IntoIterator<Item = &'a LedgerEntry>,
        I::IntoIter: DoubleEndedIterator,
    {
        let mut selected: Vec<&LedgerEntry> = entries.into_iter().rev().filter(|e| self.matches(e)).collect();
        selected.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        selected
            .into_iter()
            .skip(self.offset as usize)
            .take(self.effective_limit() as usize)
            .cloned()
            .collect()
    }
}

// =============================================================================
// Document Numbering
// =============================================================================

/// Prefix of invoice numbers.
pub const INVOICE_PREFIX: &str = "INV";
/// Prefix of return numbers.
pub const RETURN_PREFIX: &str = "RET";

/// The part shared by every number issued on `day`, e.g. `INV-20260601-`.
pub fn day_prefix(prefix: &str, day: NaiveDate) -> String {
    format!("{prefix}-{}-", day.format("%Y%m%d"))
}

/// Formats `PREFIX-YYYYMMDD-NNN`. Sequences above 999 widen naturally.
///
/// ```rust
/// use chrono::NaiveDate;
/// use motormods_core::ledger::document_number;
///
/// let day = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
/// assert_eq!(document_number("RET", day, 7), "RET-20260601-007");
/// ```
pub fn document_number(prefix: &str, day: NaiveDate, sequence: u32) -> String {
    format!("{}{sequence:03}", day_prefix(prefix, day))
}

/// Next per-day sequence given the numbers already issued that day.
///
/// Numbers that do not carry `day_prefix` are ignored, so the sequence
/// restarts at 1 every calendar day.
pub fn next_sequence<'a, I>(day_prefix: &str, existing: I) -> u32
where
    I: IntoIterator<Item = &'a str>,
{
    existing
        .into_iter()
        .filter_map(|n| n.strip_prefix(day_prefix))
        .filter_map(|suffix| suffix.parse::<u32>().ok())
        .max()
        .map_or(1, |max| max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, day, 10, 0, 0).unwrap()
    }

    fn entry(id: &str, item: &str, t: AdjustmentType, delta: i64, created_at: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry {
            id: id.to_string(),
            item_id: item.to_string(),
            adjustment_type: t,
            delta,
            note: String::new(),
            actor: "system".to_string(),
            reference_id: None,
            created_at,
        }
    }

    fn sample() -> Vec<LedgerEntry> {
        vec![
            entry("1", "bp", AdjustmentType::OpeningStock, 10, at(1)),
            entry("2", "bp", AdjustmentType::Sale, -7, at(2)),
            entry("3", "lube", AdjustmentType::OpeningStock, 20, at(2)),
            entry("4", "lube", AdjustmentType::Sale, -5, at(3)),
            entry("5", "lube", AdjustmentType::Return, 2, at(4)),
            entry("6", "lube", AdjustmentType::ManualDeduction, -2, at(5)),
        ]
    }

    #[test]
    fn test_fold_quantity_and_last_sale() {
        let folded = fold_ledger(&sample());
        assert_eq!(folded["bp"].quantity, 3);
        assert_eq!(folded["bp"].last_sale_at, Some(at(2)));
        assert_eq!(folded["lube"].quantity, 15);
        assert_eq!(folded["lube"].last_sale_at, Some(at(3)));
    }

    #[test]
    fn test_sum_by_type() {
        let entries = sample();
        let sums = sum_by_type(entries.iter().filter(|e| e.item_id == "lube"));
        assert_eq!(sums[&AdjustmentType::Sale], -5);
        assert_eq!(sums[&AdjustmentType::Return], 2);
        assert!(!sums.contains_key(&AdjustmentType::DamageWriteOff));
    }

    #[test]
    fn test_filter_newest_first_with_paging() {
        let entries = sample();
        let page = LedgerFilter::for_item("lube").page(2, 0).apply(&entries);
        assert_eq!(page.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["6", "5"]);

        let page = LedgerFilter::for_item("lube").page(2, 2).apply(&entries);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "3");
    }

    #[test]
    fn test_filter_by_type_and_range() {
        let entries = sample();
        let sales = LedgerFilter::default().with_type(AdjustmentType::Sale).apply(&entries);
        assert_eq!(sales.len(), 2);

        let day = (at(2) - Duration::hours(1)).date_naive();
        let ranged = LedgerFilter::default()
            .with_range(DateRange::between(day, day))
            .apply(&entries);
        assert_eq!(ranged.len(), 2);
    }

    #[test]
    fn test_document_sequence_restarts_daily() {
        let today = NaiveDate::from_ymd_opt(2026, 6, 2).unwrap();
        let prefix = day_prefix(RETURN_PREFIX, today);
        let issued = ["RET-20260601-004", "RET-20260602-001", "RET-20260602-002"];
        assert_eq!(next_sequence(&prefix, issued), 3);

        let tomorrow = day_prefix(RETURN_PREFIX, NaiveDate::from_ymd_opt(2026, 6, 3).unwrap());
        assert_eq!(next_sequence(&tomorrow, issued), 1);
        assert_eq!(document_number(INVOICE_PREFIX, today, 12), "INV-20260602-012");
    }
}
