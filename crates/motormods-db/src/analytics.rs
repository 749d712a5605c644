//! # Analytics Engine
//!
//! Fetches what a report needs from the store and hands it to the pure
//! aggregations in [`motormods_core::reports`].
//!
//! ```text
//! ┌──────────────┐   "YYYY-MM-DD"    ┌──────────────┐   documents   ┌───────────────┐
//! │  Reports UI  │ ────────────────► │ Analytics    │ ◄──────────── │ InventoryStore│
//! │              │ ◄──────────────── │ Engine       │               └───────────────┘
//! └──────────────┘    Vec<Row>       │              │ ── snapshot ─► SettingsService
//!                                    └──────┬───────┘
//!                                           ▼
//!                                    core::reports (pure)
//! ```
//!
//! Dates arrive as optional strings; an empty or missing end leaves the
//! range open, garbage is a validation error, and `from > to` gives an
//! empty result.

use std::sync::Arc;

use tracing::debug;

use motormods_core::reports::{
    self, DailySalesRow, NonMovingRow, ProductSalesRow, ProfitRow, SalesStats, SortOrder, StockRow,
};
use motormods_core::validation::normalize_search;
use motormods_core::{DateRange, FsnClass};

use crate::clock::Clock;
use crate::error::DbResult;
use crate::projection::InventoryProjection;
use crate::settings::SettingsService;
use crate::store::InventoryStore;

#[derive(Debug, Clone)]
pub struct AnalyticsEngine {
    store: Arc<dyn InventoryStore>,
    clock: Arc<dyn Clock>,
    settings: SettingsService,
    projection: InventoryProjection,
}

impl AnalyticsEngine {
    pub fn new(store: Arc<dyn InventoryStore>, clock: Arc<dyn Clock>) -> Self {
        AnalyticsEngine {
            settings: SettingsService::new(store.clone(), clock.clone()),
            projection: InventoryProjection::new(store.clone(), clock.clone()),
            store,
            clock,
        }
    }

    /// Per-day invoice totals with completed returns netted on their own day.
    pub async fn daily_sales(
        &self,
        from: Option<&str>,
        to: Option<&str>,
        order: SortOrder,
    ) -> DbResult<Vec<DailySalesRow>> {
        let range = DateRange::parse(from, to)?;
        if range.is_inverted() {
            return Ok(Vec::new());
        }

        let invoices = self.store.list_invoices(&range).await?;
        let returns = self.store.list_returns(&range).await?;
        debug!(invoices = invoices.len(), returns = returns.len(), "Building daily sales");
        Ok(reports::daily_sales(&invoices, &returns, &range, order))
    }

    /// Quantity and revenue per item, highest revenue first.
    pub async fn product_sales(
        &self,
        from: Option<&str>,
        to: Option<&str>,
        search: Option<&str>,
    ) -> DbResult<Vec<ProductSalesRow>> {
        let range = DateRange::parse(from, to)?;
        let needle = normalize_search(search)?;
        if range.is_inverted() {
            return Ok(Vec::new());
        }

        let invoices = self.store.list_invoices(&range).await?;
        let items = self.store.list_items().await?;
        Ok(reports::product_sales(&invoices, &items, &range, &needle))
    }

    /// Active items with stock value and low-stock status under the
    /// configured method.
    pub async fn current_stock(&self, search: Option<&str>, low_stock_only: bool) -> DbResult<Vec<StockRow>> {
        let needle = normalize_search(search)?;
        let config = self.settings.snapshot().await?;

        let items = self.store.list_items().await?;
        let histories = self.store.sale_histories().await?;
        debug!(method = %config.low_stock_method, low_stock_only, "Building current stock");
        Ok(reports::current_stock(&items, &histories, &config, &needle, low_stock_only))
    }

    /// Items ranked Non-moving, Slow, Fast. Reclassifies first.
    pub async fn non_moving_items(&self, filter: Option<FsnClass>) -> DbResult<Vec<NonMovingRow>> {
        let config = self.settings.snapshot().await?;
        self.projection.recompute_fsn(config.non_moving_threshold_days).await?;

        let items = self.store.list_items().await?;
        Ok(reports::non_moving_items(&items, self.clock.now(), filter))
    }

    /// Per-day revenue, cost and profit on the cost snapshotted at sale time.
    pub async fn profit_summary(
        &self,
        from: Option<&str>,
        to: Option<&str>,
        order: SortOrder,
    ) -> DbResult<Vec<ProfitRow>> {
        let range = DateRange::parse(from, to)?;
        if range.is_inverted() {
            return Ok(Vec::new());
        }

        let invoices = self.store.list_invoices(&range).await?;
        Ok(reports::profit_summary(&invoices, &range, order))
    }

    /// Headline totals for the range.
    pub async fn sales_stats(&self, from: Option<&str>, to: Option<&str>) -> DbResult<SalesStats> {
        let range = DateRange::parse(from, to)?;
        if range.is_inverted() {
            return Ok(SalesStats::default());
        }

        let invoices = self.store.list_invoices(&range).await?;
        let returns = self.store.list_returns(&range).await?;
        Ok(reports::sales_stats(&invoices, &returns, &range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::error::DbError;
    use crate::store::MemoryStore;

    fn engine() -> AnalyticsEngine {
        AnalyticsEngine::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn test_empty_store_gives_empty_reports() {
        let engine = engine();
        assert!(engine.daily_sales(None, None, SortOrder::default()).await.unwrap().is_empty());
        assert!(engine.product_sales(None, None, None).await.unwrap().is_empty());
        assert!(engine.current_stock(None, false).await.unwrap().is_empty());
        assert!(engine.non_moving_items(None).await.unwrap().is_empty());
        assert_eq!(engine.sales_stats(None, None).await.unwrap().invoice_count, 0);
    }

    #[tokio::test]
    async fn test_inverted_range_is_empty_not_error() {
        let engine = engine();
        let rows = engine
            .profit_summary(Some("2026-05-01"), Some("2026-04-01"), SortOrder::NewestFirst)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_bad_date_is_validation_error() {
        let engine = engine();
        let err = engine.daily_sales(Some("last week"), None, SortOrder::default()).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(_)));
    }
}
