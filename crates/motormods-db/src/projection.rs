//! # Inventory Projection
//!
//! Current state per item, derived from the ledger and cached on the item
//! row: quantity on hand, last sale date and FSN class.
//!
//! ## Reconciliation Invariant
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  for every item:  items.quantity  ==  Σ stock_ledger.delta (item)      │
//! │                                                                         │
//! │  append ──► delta applied in the same unit (store)                     │
//! │  rebuild ──► replay ledger, overwrite cache                            │
//! │  reconcile ──► list items where the two disagree                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! FSN classes are refreshed in batch by [`InventoryProjection::recompute_fsn`];
//! they are stale between runs by nature.

use std::sync::Arc;

use tracing::{debug, info, warn};

use motormods_core::inventory::classify_fsn;
use motormods_core::ledger::{fold_ledger, reconcile, ReconciliationIssue};
use motormods_core::FsnClass;

use crate::clock::Clock;
use crate::error::{DbError, DbResult};
use crate::store::InventoryStore;

#[derive(Debug, Clone)]
pub struct InventoryProjection {
    store: Arc<dyn InventoryStore>,
    clock: Arc<dyn Clock>,
}

impl InventoryProjection {
    pub fn new(store: Arc<dyn InventoryStore>, clock: Arc<dyn Clock>) -> Self {
        InventoryProjection { store, clock }
    }

    /// Quantity on hand. Can be negative after unchecked manual deductions.
    pub async fn current_quantity(&self, item_id: &str) -> DbResult<i64> {
        self.store
            .get_item(item_id)
            .await?
            .map(|item| item.quantity)
            .ok_or_else(|| DbError::not_found("Item", item_id))
    }

    /// Moves the item's last-sale date forward to `at`.
    ///
    /// Earlier timestamps leave it unchanged.
    pub async fn mark_sold(&self, item_id: &str, at: chrono::DateTime<chrono::Utc>) -> DbResult<()> {
        self.store.mark_sold(item_id, at).await
    }

    /// Reclassifies every item against the current date.
    ///
    /// Only classes that actually change are written, so running it twice
    /// in a row writes nothing the second time.
    ///
    /// ## Returns
    /// Number of items whose class changed.
    pub async fn recompute_fsn(&self, threshold_days: u32) -> DbResult<usize> {
        let now = self.clock.now();
        let items = self.store.list_items().await?;

        let changes: Vec<(String, FsnClass)> = items
            .iter()
            .filter_map(|item| {
                let class = classify_fsn(item.last_sale_at, now, threshold_days);
                (class != item.fsn_class).then(|| (item.id.clone(), class))
            })
            .collect();

        if !changes.is_empty() {
            self.store.set_fsn_classes(&changes).await?;
        }
        debug!(threshold_days, changed = changes.len(), "FSN classes recomputed");
        Ok(changes.len())
    }

    /// Replays the whole ledger and overwrites every cached quantity and
    /// last-sale date.
    ///
    /// ## Returns
    /// Number of items whose cache was corrected.
    pub async fn rebuild(&self) -> DbResult<usize> {
        let entries = self.store.all_entries().await?;
        let folded = fold_ledger(&entries);
        let corrected = self.store.replace_projection(&folded, self.clock.now()).await?;
        info!(entries = entries.len(), corrected, "Projection rebuilt from ledger");
        Ok(corrected)
    }

    /// Items whose cached quantity differs from their ledger sum.
    ///
    /// Empty when the invariant holds.
    pub async fn reconcile(&self) -> DbResult<Vec<ReconciliationIssue>> {
        let items = self.store.list_items().await?;
        let entries = self.store.all_entries().await?;
        let issues = reconcile(&items, &fold_ledger(&entries));
        for issue in &issues {
            warn!(
                sku = %issue.sku,
                cached = issue.cached_quantity,
                ledger = issue.ledger_quantity,
                "Cached quantity disagrees with ledger"
            );
        }
        Ok(issues)
    }
}
