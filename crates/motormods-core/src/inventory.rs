//! # Inventory Classification
//!
//! Pure rules over an item's cached state and its sale history:
//!
//! ```text
//!   last_sale_at ──► days_since ──► classify_fsn ──► Fast | Slow | NonMoving
//!
//!   sale entries ──► SaleHistory ──► daily_rate ──► days_of_supply
//!                                        │
//!   ThresholdConfig + Item ──────────────┴──► stock_threshold ──► StockStatus
//! ```
//!
//! ## FSN bands (days since last sale, by UTC calendar day)
//! ```text
//!   0 ─────── 30 ─────────── threshold ──────────────►
//!   │  Fast   │     Slow      │       NonMoving
//! ```
//! A threshold of 30 or less leaves the Slow band empty. Never sold is
//! always NonMoving.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::thresholds::{LowStockMethod, ThresholdConfig};
use crate::types::{AdjustmentType, FsnClass, Item, LedgerEntry};
use crate::FAST_MOVING_DAYS;

// =============================================================================
// FSN
// =============================================================================

/// Whole calendar days between `then` and `now` (never negative).
pub fn days_since(then: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now.date_naive() - then.date_naive()).num_days().max(0)
}

/// Classifies an item by the recency of its last sale.
pub fn classify_fsn(
    last_sale_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    threshold_days: u32,
) -> FsnClass {
    let Some(last) = last_sale_at else {
        return FsnClass::NonMoving;
    };

    let days = days_since(last, now);
    if days <= FAST_MOVING_DAYS {
        FsnClass::Fast
    } else if days <= i64::from(threshold_days) {
        FsnClass::Slow
    } else {
        FsnClass::NonMoving
    }
}

// =============================================================================
// Stock Status
// =============================================================================

/// Stock level band shown on the current-stock report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Critical,
    Low,
    Adequate,
}

string_enum!(StockStatus, "status", {
    Critical => "critical",
    Low => "low",
    Adequate => "adequate",
});

/// Classifies a quantity against the active method's threshold.
///
/// `qty ≤ 0` is always critical; otherwise half the threshold is the
/// critical line and the threshold itself is the low line.
pub fn stock_status(quantity: i64, threshold: f64) -> StockStatus {
    let qty = quantity as f64;
    if quantity <= 0 || qty <= threshold / 2.0 {
        StockStatus::Critical
    } else if qty <= threshold {
        StockStatus::Low
    } else {
        StockStatus::Adequate
    }
}

// =============================================================================
// Sale History / Days of Supply
// =============================================================================

/// Aggregate of an item's `sale` ledger entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaleHistory {
    /// Units sold (positive).
    pub total_sold: i64,
    pub first_sale: Option<DateTime<Utc>>,
    pub last_sale: Option<DateTime<Utc>>,
}

impl SaleHistory {
    /// Builds the history for one item from its ledger entries.
    ///
    /// Entries of other items and other adjustment types are ignored.
    pub fn from_entries<'a, I>(item_id: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = &'a LedgerEntry>,
    {
        let mut history = SaleHistory::default();
        for entry in entries {
            if entry.item_id == item_id && entry.adjustment_type == AdjustmentType::Sale {
                history.record(-entry.delta, entry.created_at);
            }
        }
        history
    }

    /// Adds one sale of `quantity` units at `at`.
    pub fn record(&mut self, quantity: i64, at: DateTime<Utc>) {
        self.total_sold += quantity;
        self.first_sale = Some(self.first_sale.map_or(at, |f| f.min(at)));
        self.last_sale = Some(self.last_sale.map_or(at, |l| l.max(at)));
    }

    /// Average units sold per day between the first and last sale.
    ///
    /// The span is at least one day. `None` when nothing was sold.
    pub fn daily_rate(&self) -> Option<f64> {
        let (Some(first), Some(last)) = (self.first_sale, self.last_sale) else {
            return None;
        };
        if self.total_sold <= 0 {
            return None;
        }
        let span = days_since(first, last).max(1);
        Some(self.total_sold as f64 / span as f64)
    }

    /// Days until `quantity` runs out at the historical rate.
    pub fn days_of_supply(&self, quantity: i64) -> Option<f64> {
        self.daily_rate().map(|rate| quantity.max(0) as f64 / rate)
    }
}

// =============================================================================
// Low Stock Threshold
// =============================================================================

/// Quantity at or below which the item counts as low under the active method.
///
/// For `days_supply` the threshold is `rate × days`, which makes
/// `qty ≤ threshold` equivalent to `days_of_supply ≤ days`. Items with no
/// sale history get a zero threshold and are never low (only critical once
/// empty).
pub fn stock_threshold(item: &Item, config: &ThresholdConfig, history: &SaleHistory) -> f64 {
    match config.low_stock_method {
        LowStockMethod::ReorderLevel => item.effective_reorder_level() as f64,
        LowStockMethod::Percentage => {
            item.effective_max_stock() as f64 * f64::from(config.low_stock_percentage) / 100.0
        }
        LowStockMethod::DaysSupply => history
            .daily_rate()
            .map_or(0.0, |rate| rate * f64::from(config.low_stock_days_supply)),
    }
}

/// Whether the item belongs in a low-stock listing under the active method.
///
/// Separate from [`stock_status`]: an empty item with no sales is critical
/// but never low under `days_supply`, since its rate is unknown.
pub fn is_low_stock(item: &Item, config: &ThresholdConfig, history: &SaleHistory) -> bool {
    match config.low_stock_method {
        LowStockMethod::DaysSupply => history
            .days_of_supply(item.quantity)
            .is_some_and(|days| days <= f64::from(config.low_stock_days_supply)),
        LowStockMethod::ReorderLevel | LowStockMethod::Percentage => {
            item.quantity as f64 <= stock_threshold(item, config, history)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 9, 30, 0).unwrap()
    }

    fn item(quantity: i64) -> Item {
        Item {
            id: "bp".to_string(),
            name: "Brake Pad".to_string(),
            sku: "BP-01".to_string(),
            category: None,
            unit_price_cents: 45_000,
            purchase_cost_cents: 30_000,
            quantity,
            reorder_level: Some(5),
            max_stock: None,
            last_sale_at: None,
            fsn_class: FsnClass::NonMoving,
            is_active: true,
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn test_fsn_bands() {
        let n = now();
        assert_eq!(classify_fsn(Some(n - Duration::days(10)), n, 120), FsnClass::Fast);
        assert_eq!(classify_fsn(Some(n - Duration::days(30)), n, 120), FsnClass::Fast);
        assert_eq!(classify_fsn(Some(n - Duration::days(60)), n, 120), FsnClass::Slow);
        assert_eq!(classify_fsn(Some(n - Duration::days(120)), n, 120), FsnClass::Slow);
        assert_eq!(classify_fsn(Some(n - Duration::days(200)), n, 120), FsnClass::NonMoving);
        assert_eq!(classify_fsn(None, n, 365), FsnClass::NonMoving);
    }

    #[test]
    fn test_threshold_at_or_below_30_empties_slow_band() {
        let n = now();
        assert_eq!(classify_fsn(Some(n - Duration::days(31)), n, 30), FsnClass::NonMoving);
        assert_eq!(classify_fsn(Some(n - Duration::days(20)), n, 30), FsnClass::Fast);
    }

    #[test]
    fn test_days_since_uses_calendar_days() {
        let late = Utc.with_ymd_and_hms(2026, 5, 31, 23, 59, 0).unwrap();
        assert_eq!(days_since(late, now()), 1);
        assert_eq!(days_since(now() + Duration::days(2), now()), 0);
    }

    #[test]
    fn test_brake_pad_status() {
        // 3 ≤ 5 but not ≤ 2.5
        assert_eq!(stock_status(3, 5.0), StockStatus::Low);
        assert_eq!(stock_status(2, 5.0), StockStatus::Critical);
        assert_eq!(stock_status(6, 5.0), StockStatus::Adequate);
        assert_eq!(stock_status(0, 0.0), StockStatus::Critical);
        assert_eq!(stock_status(-1, 5.0), StockStatus::Critical);
    }

    #[test]
    fn test_threshold_per_method() {
        let it = item(3);
        let history = SaleHistory::default();

        let config = ThresholdConfig::default();
        assert_eq!(stock_threshold(&it, &config, &history), 5.0);

        let config = ThresholdConfig {
            low_stock_method: LowStockMethod::Percentage,
            ..ThresholdConfig::default()
        };
        assert_eq!(stock_threshold(&it, &config, &history), 20.0);
    }

    #[test]
    fn test_days_supply_never_low_without_sales() {
        let it = item(1);
        let config = ThresholdConfig {
            low_stock_method: LowStockMethod::DaysSupply,
            ..ThresholdConfig::default()
        };
        let threshold = stock_threshold(&it, &config, &SaleHistory::default());
        assert_eq!(threshold, 0.0);
        assert_eq!(stock_status(1, threshold), StockStatus::Adequate);
    }

    #[test]
    fn test_days_supply_empty_unsold_item_is_not_low() {
        let config = ThresholdConfig {
            low_stock_method: LowStockMethod::DaysSupply,
            ..ThresholdConfig::default()
        };
        let empty = item(0);
        let none = SaleHistory::default();
        assert_eq!(stock_status(0, stock_threshold(&empty, &config, &none)), StockStatus::Critical);
        assert!(!is_low_stock(&empty, &config, &none));

        let mut sold = SaleHistory::default();
        sold.record(3, now());
        assert!(is_low_stock(&empty, &config, &sold));
    }

    #[test]
    fn test_reorder_level_low_matches_threshold() {
        let config = ThresholdConfig::default();
        let none = SaleHistory::default();
        assert!(is_low_stock(&item(0), &config, &none));
        assert!(is_low_stock(&item(5), &config, &none));
        assert!(!is_low_stock(&item(6), &config, &none));
    }

    #[test]
    fn test_daily_rate_minimum_span() {
        let mut history = SaleHistory::default();
        history.record(4, now());
        assert_eq!(history.daily_rate(), Some(4.0));
        assert_eq!(history.days_of_supply(8), Some(2.0));

        history.record(6, now() - Duration::days(10));
        assert_eq!(history.daily_rate(), Some(1.0));
    }

    #[test]
    fn test_history_from_entries_ignores_other_types() {
        let entry = |t: AdjustmentType, delta: i64| LedgerEntry {
            id: format!("{t}-{delta}"),
            item_id: "bp".to_string(),
            adjustment_type: t,
            delta,
            note: String::new(),
            actor: "cashier".to_string(),
            reference_id: None,
            created_at: now(),
        };
        let entries = vec![
            entry(AdjustmentType::OpeningStock, 10),
            entry(AdjustmentType::Sale, -3),
            entry(AdjustmentType::Return, 1),
            entry(AdjustmentType::Sale, -2),
        ];
        let history = SaleHistory::from_entries("bp", &entries);
        assert_eq!(history.total_sold, 5);
    }
}
