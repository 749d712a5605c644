//! # Reports
//!
//! Row types and the aggregation behind the reports screen. Functions here
//! take already-fetched documents and a [`ThresholdConfig`] snapshot; the
//! `AnalyticsEngine` in motormods-db does the fetching.
//!
//! ```text
//! ┌────────────────────┬─────────────────────────────┬──────────────────────────┐
//! │ report             │ grouped by                  │ order                    │
//! ├────────────────────┼─────────────────────────────┼──────────────────────────┤
//! │ daily_sales        │ UTC day                     │ newest first (default)   │
//! │ product_sales      │ item                        │ revenue desc             │
//! │ current_stock      │ item (active)               │ name                     │
//! │ non_moving_items   │ item (active)               │ class, stock value desc  │
//! │ profit_summary     │ UTC day                     │ newest first             │
//! │ sales_stats        │ whole range                 │ -                        │
//! └────────────────────┴─────────────────────────────┴──────────────────────────┘
//! ```
//!
//! Completed returns are netted at each report's own granularity
//! (`daily_sales` per day, `sales_stats` per range). `profit_summary` is
//! gross line profit on the cost snapshot taken at sale time.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::inventory::{days_since, is_low_stock, stock_status, stock_threshold, SaleHistory, StockStatus};
use crate::money::Money;
use crate::range::DateRange;
use crate::thresholds::ThresholdConfig;
use crate::types::{FsnClass, Invoice, Item, SalesReturn};

// =============================================================================
// Row Types
// =============================================================================

/// Row order for day-grouped reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailySalesRow {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub invoice_count: i64,
    pub items_sold: i64,
    /// Σ invoice grand totals.
    pub gross_cents: i64,
    pub discount_cents: i64,
    /// Σ completed returns created that day.
    pub returns_cents: i64,
    pub net_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductSalesRow {
    pub item_id: String,
    pub name: String,
    pub sku: String,
    pub quantity_sold: i64,
    pub revenue_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockRow {
    pub item_id: String,
    pub name: String,
    pub sku: String,
    pub category: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub stock_value_cents: i64,
    /// Low line of the active method, in units.
    pub threshold: f64,
    pub status: StockStatus,
    /// `None` when the item has no sale history.
    pub days_of_supply: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NonMovingRow {
    pub item_id: String,
    pub name: String,
    pub sku: String,
    pub quantity: i64,
    #[ts(as = "Option<String>")]
    pub last_sale_at: Option<DateTime<Utc>>,
    /// `None` if never sold.
    pub days_since_last_sale: Option<i64>,
    pub stock_value_cents: i64,
    pub fsn_class: FsnClass,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProfitRow {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub revenue_cents: i64,
    pub cost_cents: i64,
    pub profit_cents: i64,
}

/// Totals over a date range (the dashboard cards).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesStats {
    pub invoice_count: i64,
    pub items_sold: i64,
    pub gross_cents: i64,
    pub discount_cents: i64,
    pub return_count: i64,
    pub returns_cents: i64,
    pub net_cents: i64,
    /// Gross line profit (revenue − snapshotted cost).
    pub profit_cents: i64,
}

// =============================================================================
// Aggregation
// =============================================================================

fn invoices_in<'a>(invoices: &'a [Invoice], range: &'a DateRange) -> impl Iterator<Item = &'a Invoice> {
    invoices.iter().filter(move |i| range.contains_timestamp(i.created_at))
}

fn completed_returns_in<'a>(
    returns: &'a [SalesReturn],
    range: &'a DateRange,
) -> impl Iterator<Item = &'a SalesReturn> {
    returns
        .iter()
        .filter(move |r| r.is_completed() && range.contains_timestamp(r.created_at))
}

fn order_days<T>(rows: BTreeMap<NaiveDate, T>, order: SortOrder) -> Vec<T> {
    match order {
        SortOrder::OldestFirst => rows.into_values().collect(),
        SortOrder::NewestFirst => rows.into_values().rev().collect(),
    }
}

/// Per-day sales with completed returns netted on the day they were made.
pub fn daily_sales(
    invoices: &[Invoice],
    returns: &[SalesReturn],
    range: &DateRange,
    order: SortOrder,
) -> Vec<DailySalesRow> {
    let mut days: BTreeMap<NaiveDate, DailySalesRow> = BTreeMap::new();

    for invoice in invoices_in(invoices, range) {
        let r = days
            .entry(invoice.created_at.date_naive())
            .or_insert_with(|| empty_day(invoice.created_at.date_naive()));
        r.invoice_count += 1;
        r.items_sold += invoice.total_quantity();
        r.gross_cents += invoice.grand_total_cents;
        r.discount_cents += invoice.discount_cents;
    }

    for ret in completed_returns_in(returns, range) {
        let r = days
            .entry(ret.created_at.date_naive())
            .or_insert_with(|| empty_day(ret.created_at.date_naive()));
        r.returns_cents += ret.total_cents;
    }

    for r in days.values_mut() {
        r.net_cents = r.gross_cents - r.returns_cents;
    }

    order_days(days, order)
}

fn empty_day(date: NaiveDate) -> DailySalesRow {
    DailySalesRow {
        date,
        invoice_count: 0,
        items_sold: 0,
        gross_cents: 0,
        discount_cents: 0,
        returns_cents: 0,
        net_cents: 0,
    }
}

/// Quantity and revenue per item, revenue descending.
///
/// Name and SKU come from the live item when known, else from the line
/// snapshot. `needle` must be lowercase (see `normalize_search`).
pub fn product_sales(invoices: &[Invoice], items: &[Item], range: &DateRange, needle: &str) -> Vec<ProductSalesRow> {
    let live: HashMap<&str, &Item> = items.iter().map(|i| (i.id.as_str(), i)).collect();
    let mut rows: HashMap<String, ProductSalesRow> = HashMap::new();

    for invoice in invoices_in(invoices, range) {
        for line in &invoice.lines {
            let row = rows.entry(line.item_id.clone()).or_insert_with(|| {
                let (name, sku) = match live.get(line.item_id.as_str()) {
                    Some(item) => (item.name.clone(), item.sku.clone()),
                    None => (line.name_snapshot.clone(), line.sku_snapshot.clone()),
                };
                ProductSalesRow {
                    item_id: line.item_id.clone(),
                    name,
                    sku,
                    quantity_sold: 0,
                    revenue_cents: 0,
                }
            });
            row.quantity_sold += line.quantity;
            row.revenue_cents += line.revenue().cents();
        }
    }

    let mut rows: Vec<ProductSalesRow> = rows
        .into_values()
        .filter(|r| {
            needle.is_empty() || r.name.to_lowercase().contains(needle) || r.sku.to_lowercase().contains(needle)
        })
        .collect();
    rows.sort_by(|a, b| b.revenue_cents.cmp(&a.revenue_cents).then_with(|| a.name.cmp(&b.name)));
    rows
}

/// Stock levels of active items with status per the active low-stock method.
///
/// `histories` holds each item's sale history (only read by `days_supply`
/// and for the days-of-supply column).
pub fn current_stock(
    items: &[Item],
    histories: &HashMap<String, SaleHistory>,
    config: &ThresholdConfig,
    needle: &str,
    low_stock_only: bool,
) -> Vec<StockRow> {
    let none = SaleHistory::default();
    let mut rows: Vec<StockRow> = items
        .iter()
        .filter(|item| item.is_active && item.matches_search(needle))
        .filter_map(|item| {
            let history = histories.get(&item.id).unwrap_or(&none);
            let threshold = stock_threshold(item, config, history);
            let status = stock_status(item.quantity, threshold);
            if low_stock_only && !is_low_stock(item, config, history) {
                return None;
            }
            Some(StockRow {
                item_id: item.id.clone(),
                name: item.name.clone(),
                sku: item.sku.clone(),
                category: item.category.clone(),
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents,
                stock_value_cents: item.stock_value().cents(),
                threshold,
                status,
                days_of_supply: history.days_of_supply(item.quantity),
            })
        })
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.sku.cmp(&b.sku)));
    rows
}

/// Active items by FSN class: Non-moving, Slow, Fast, then stock value desc.
///
/// Reads the cached `fsn_class`, so the caller recomputes first.
pub fn non_moving_items(items: &[Item], now: DateTime<Utc>, filter: Option<FsnClass>) -> Vec<NonMovingRow> {
    let mut rows: Vec<NonMovingRow> = items
        .iter()
        .filter(|item| item.is_active && filter.map_or(true, |f| item.fsn_class == f))
        .map(|item| NonMovingRow {
            item_id: item.id.clone(),
            name: item.name.clone(),
            sku: item.sku.clone(),
            quantity: item.quantity,
            last_sale_at: item.last_sale_at,
            days_since_last_sale: item.last_sale_at.map(|at| days_since(at, now)),
            stock_value_cents: item.stock_value().cents(),
            fsn_class: item.fsn_class,
        })
        .collect();
    rows.sort_by(|a, b| {
        a.fsn_class
            .report_rank()
            .cmp(&b.fsn_class.report_rank())
            .then_with(|| b.stock_value_cents.cmp(&a.stock_value_cents))
            .then_with(|| a.name.cmp(&b.name))
    });
    rows
}

/// Per-day revenue, cost and profit from invoice lines.
///
/// Cost is the snapshot stored on the line, never the live item cost.
pub fn profit_summary(invoices: &[Invoice], range: &DateRange, order: SortOrder) -> Vec<ProfitRow> {
    let mut days: BTreeMap<NaiveDate, (Money, Money)> = BTreeMap::new();
    for invoice in invoices_in(invoices, range) {
        let day = days.entry(invoice.created_at.date_naive()).or_default();
        for line in &invoice.lines {
            day.0 += line.revenue();
            day.1 += line.cost();
        }
    }

    let rows: BTreeMap<NaiveDate, ProfitRow> = days
        .into_iter()
        .map(|(date, (revenue, cost))| {
            (
                date,
                ProfitRow {
                    date,
                    revenue_cents: revenue.cents(),
                    cost_cents: cost.cents(),
                    profit_cents: (revenue - cost).cents(),
                },
            )
        })
        .collect();
    order_days(rows, order)
}

/// Range totals with completed returns netted out.
pub fn sales_stats(invoices: &[Invoice], returns: &[SalesReturn], range: &DateRange) -> SalesStats {
    let mut stats = SalesStats::default();

    for invoice in invoices_in(invoices, range) {
        stats.invoice_count += 1;
        stats.items_sold += invoice.total_quantity();
        stats.gross_cents += invoice.grand_total_cents;
        stats.discount_cents += invoice.discount_cents;
        let profit: Money = invoice.lines.iter().map(|l| l.revenue() - l.cost()).sum();
        stats.profit_cents += profit.cents();
    }

    for ret in completed_returns_in(returns, range) {
        stats.return_count += 1;
        stats.returns_cents += ret.total_cents;
    }

    stats.net_cents = stats.gross_cents - stats.returns_cents;
    stats
}

// =============================================================================
// Unit Tests
// =============================================================================
