//! # Stock Ledger Service
//!
//! The append-only audit trail of every quantity change.
//!
//! ```text
//!   append(item, type, delta, note, actor)
//!        │
//!        ▼
//!   ┌───────────────────── one unit ─────────────────────┐
//!   │  INSERT stock_ledger row   +   items.quantity += Δ │
//!   └────────────────────────────────────────────────────┘
//! ```
//!
//! There is no update or delete. A wrong entry is corrected by appending
//! an offsetting one.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use motormods_core::ledger::LedgerFilter;
use motormods_core::{new_id, AdjustmentType, LedgerEntry};

use crate::clock::Clock;
use crate::error::DbResult;
use crate::store::InventoryStore;

#[derive(Debug, Clone)]
pub struct StockLedger {
    store: Arc<dyn InventoryStore>,
    clock: Arc<dyn Clock>,
}

impl StockLedger {
    pub fn new(store: Arc<dyn InventoryStore>, clock: Arc<dyn Clock>) -> Self {
        StockLedger { store, clock }
    }

    /// Records one stock change and applies it to the cached quantity.
    ///
    /// Any sign and magnitude is accepted; only an unknown item
    /// (`NotFound`) or an unavailable store fails.
    pub async fn append(
        &self,
        item_id: &str,
        adjustment_type: AdjustmentType,
        delta: i64,
        note: &str,
        actor: &str,
    ) -> DbResult<LedgerEntry> {
        self.append_with_reference(item_id, adjustment_type, delta, note, actor, None)
            .await
    }

    /// [`append`](Self::append) with the id of the document that caused it.
    pub async fn append_with_reference(
        &self,
        item_id: &str,
        adjustment_type: AdjustmentType,
        delta: i64,
        note: &str,
        actor: &str,
        reference_id: Option<&str>,
    ) -> DbResult<LedgerEntry> {
        let entry = LedgerEntry {
            id: new_id(),
            item_id: item_id.to_string(),
            adjustment_type,
            delta,
            note: note.trim().to_string(),
            actor: actor.to_string(),
            reference_id: reference_id.map(str::to_string),
            created_at: self.clock.now(),
        };

        self.store.append_entry(&entry).await?;
        debug!(item_id = %item_id, kind = %adjustment_type, delta, "Ledger entry recorded");
        Ok(entry)
    }

    /// Entries matching the filter, newest first.
    pub async fn list(&self, filter: &LedgerFilter) -> DbResult<Vec<LedgerEntry>> {
        self.store.list_entries(filter).await
    }

    /// Signed sum of deltas per adjustment type for one item.
    ///
    /// Types the item never saw are absent.
    pub async fn count_by_type(&self, item_id: &str) -> DbResult<BTreeMap<AdjustmentType, i64>> {
        self.store.sum_by_type(item_id).await
    }
}
