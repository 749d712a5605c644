//! # In-Memory Store
//!
//! [`InventoryStore`] over plain collections behind one `tokio::sync::Mutex`.
//!
//! Every operation holds the lock for its whole duration and checks all of
//! its preconditions before mutating anything, so a rejected sale or return
//! leaves the state exactly as it was and readers never observe a partial
//! document.
//!
//! Used for tests, demos and as the fallback when no database file is
//! wanted (`MOTORMODS_STORE=memory`). Nothing survives the process.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use motormods_core::billing::{
    cancellation_entries, check_returnable, check_stock, price_return, returnable_quantities, ReturnPlan, SalePlan,
};
use motormods_core::inventory::SaleHistory;
use motormods_core::ledger::{
    day_prefix, document_number, next_sequence, sum_by_type, LedgerFilter, ProjectedState, INVOICE_PREFIX,
    RETURN_PREFIX,
};
use motormods_core::{
    AdjustmentType, DateRange, FsnClass, Invoice, Item, ItemUpdate, LedgerEntry, ReturnStatus, SalesReturn,
};

use super::{InventoryStore, StoreBackend};
use crate::error::{DbError, DbResult};

#[derive(Debug, Default)]
struct State {
    /// Insertion order.
    items: Vec<Item>,
    /// Append order.
    ledger: Vec<LedgerEntry>,
    invoices: Vec<Invoice>,
    returns: Vec<SalesReturn>,
    settings: BTreeMap<String, String>,
}

impl State {
    fn item(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    fn item_mut(&mut self, id: &str) -> DbResult<&mut Item> {
        self.items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| DbError::not_found("Item", id))
    }

    fn ensure_items_exist<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> DbResult<()> {
        for id in ids {
            if self.item(id).is_none() {
                return Err(DbError::not_found("Item", id));
            }
        }
        Ok(())
    }

    fn ensure_unique_sku(&self, sku: &str, except_id: Option<&str>) -> DbResult<()> {
        let taken = self
            .items
            .iter()
            .any(|i| i.sku.eq_ignore_ascii_case(sku) && Some(i.id.as_str()) != except_id);
        if taken {
            return Err(DbError::duplicate("items.sku", sku));
        }
        Ok(())
    }

    /// Appends an entry and applies its delta. The item must exist.
    fn apply(&mut self, entry: &LedgerEntry) -> DbResult<()> {
        let item = self.item_mut(&entry.item_id)?;
        item.quantity += entry.delta;
        item.updated_at = entry.created_at;
        self.ledger.push(entry.clone());
        Ok(())
    }

    fn mark_sold(&mut self, item_id: &str, at: DateTime<Utc>) -> DbResult<()> {
        let item = self.item_mut(item_id)?;
        if item.last_sale_at.map_or(true, |last| at > last) {
            item.last_sale_at = Some(at);
        }
        Ok(())
    }

    fn next_invoice_number(&self, at: DateTime<Utc>) -> String {
        let day = at.date_naive();
        let prefix = day_prefix(INVOICE_PREFIX, day);
        let seq = next_sequence(&prefix, self.invoices.iter().map(|i| i.invoice_number.as_str()));
        document_number(INVOICE_PREFIX, day, seq)
    }

    fn next_return_number(&self, at: DateTime<Utc>) -> String {
        let day = at.date_naive();
        let prefix = day_prefix(RETURN_PREFIX, day);
        let seq = next_sequence(&prefix, self.returns.iter().map(|r| r.return_number.as_str()));
        document_number(RETURN_PREFIX, day, seq)
    }
}

/// In-memory [`InventoryStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Memory
    }

    // =========================================================================
    // Items
    // =========================================================================

    async fn insert_item(&self, item: &Item, opening: Option<&LedgerEntry>) -> DbResult<()> {
        debug!(id = %item.id, sku = %item.sku, "Inserting item");
        let mut state = self.state.lock().await;

        if state.item(&item.id).is_some() {
            return Err(DbError::duplicate("items.id", &item.id));
        }
        state.ensure_unique_sku(&item.sku, None)?;

        let mut stored = item.clone();
        stored.quantity = 0;
        state.items.push(stored);
        if let Some(entry) = opening {
            state.apply(entry)?;
        }
        Ok(())
    }

    async fn get_item(&self, id: &str) -> DbResult<Option<Item>> {
        Ok(self.state.lock().await.item(id).cloned())
    }

    async fn list_items(&self) -> DbResult<Vec<Item>> {
        let state = self.state.lock().await;
        let mut items = state.items.clone();
        items.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.sku.cmp(&b.sku)));
        Ok(items)
    }

    async fn update_item(&self, id: &str, update: &ItemUpdate, at: DateTime<Utc>) -> DbResult<Item> {
        debug!(id = %id, "Updating item");
        let mut state = self.state.lock().await;
        state.ensure_unique_sku(update.sku.trim(), Some(id))?;

        let item = state.item_mut(id)?;
        item.name = update.name.trim().to_string();
        item.sku = update.sku.trim().to_string();
        item.category = update.category.clone();
        item.unit_price_cents = update.unit_price_cents;
        item.purchase_cost_cents = update.purchase_cost_cents;
        item.reorder_level = update.reorder_level;
        item.max_stock = update.max_stock;
        item.updated_at = at;
        Ok(item.clone())
    }

    async fn set_item_active(&self, id: &str, active: bool, at: DateTime<Utc>) -> DbResult<()> {
        let mut state = self.state.lock().await;
        let item = state.item_mut(id)?;
        item.is_active = active;
        item.updated_at = at;
        Ok(())
    }

    // =========================================================================
    // Ledger
    // =========================================================================

    async fn append_entry(&self, entry: &LedgerEntry) -> DbResult<()> {
        debug!(item_id = %entry.item_id, kind = %entry.adjustment_type, delta = entry.delta, "Appending ledger entry");
        self.state.lock().await.apply(entry)
    }

    async fn list_entries(&self, filter: &LedgerFilter) -> DbResult<Vec<LedgerEntry>> {
        Ok(filter.apply(&self.state.lock().await.ledger))
    }

    async fn all_entries(&self) -> DbResult<Vec<LedgerEntry>> {
        Ok(self.state.lock().await.ledger.clone())
    }

    async fn sum_by_type(&self, item_id: &str) -> DbResult<BTreeMap<AdjustmentType, i64>> {
        let state = self.state.lock().await;
        Ok(sum_by_type(state.ledger.iter().filter(|e| e.item_id == item_id)))
    }

    async fn sale_histories(&self) -> DbResult<HashMap<String, SaleHistory>> {
        let state = self.state.lock().await;
        let mut histories: HashMap<String, SaleHistory> = HashMap::new();
        for entry in state.ledger.iter().filter(|e| e.adjustment_type == AdjustmentType::Sale) {
            histories
                .entry(entry.item_id.clone())
                .or_default()
                .record(-entry.delta, entry.created_at);
        }
        Ok(histories)
    }

    // =========================================================================
    // Projection
    // =========================================================================

    async fn mark_sold(&self, item_id: &str, at: DateTime<Utc>) -> DbResult<()> {
        self.state.lock().await.mark_sold(item_id, at)
    }

    async fn set_fsn_classes(&self, classes: &[(String, FsnClass)]) -> DbResult<()> {
        let mut state = self.state.lock().await;
        for (id, class) in classes {
            if let Ok(item) = state.item_mut(id) {
                item.fsn_class = *class;
            }
        }
        Ok(())
    }

    async fn replace_projection(&self, states: &BTreeMap<String, ProjectedState>, at: DateTime<Utc>) -> DbResult<usize> {
        let mut state = self.state.lock().await;
        let mut changed = 0;
        for item in state.items.iter_mut() {
            let folded = states.get(&item.id).copied().unwrap_or_default();
            if item.quantity != folded.quantity || item.last_sale_at != folded.last_sale_at {
                item.quantity = folded.quantity;
                item.last_sale_at = folded.last_sale_at;
                item.updated_at = at;
                changed += 1;
            }
        }
        Ok(changed)
    }

    // =========================================================================
    // Documents
    // =========================================================================

    async fn commit_sale(&self, plan: SalePlan) -> DbResult<Invoice> {
        let mut state = self.state.lock().await;

        check_stock(&plan, |id| {
            state.item(id).map(|i| (i.name.clone(), i.sku.clone(), i.quantity))
        })?;

        let SalePlan { mut invoice, entries } = plan;
        invoice.invoice_number = state.next_invoice_number(invoice.created_at);

        for entry in &entries {
            state.apply(entry)?;
        }
        for line in &invoice.lines {
            state.mark_sold(&line.item_id, invoice.created_at)?;
        }
        state.invoices.push(invoice.clone());

        debug!(invoice_number = %invoice.invoice_number, lines = invoice.lines.len(), "Sale committed");
        Ok(invoice)
    }

    async fn commit_return(&self, mut plan: ReturnPlan) -> DbResult<SalesReturn> {
        let mut state = self.state.lock().await;

        let invoice = state
            .invoices
            .iter()
            .find(|i| i.id == plan.sales_return.invoice_id)
            .ok_or_else(|| DbError::not_found("Invoice", &plan.sales_return.invoice_id))?;
        price_return(&mut plan, invoice, &state.returns);
        let returnable = returnable_quantities(invoice, &state.returns);
        check_returnable(&plan, invoice, &returnable)?;
        state.ensure_items_exist(plan.entries.iter().map(|e| e.item_id.as_str()))?;

        let ReturnPlan { mut sales_return, entries } = plan;
        sales_return.return_number = state.next_return_number(sales_return.created_at);

        for entry in &entries {
            state.apply(entry)?;
        }
        state.returns.push(sales_return.clone());

        debug!(return_number = %sales_return.return_number, "Return committed");
        Ok(sales_return)
    }

    async fn commit_cancellation(&self, return_id: &str, actor: &str, at: DateTime<Utc>) -> DbResult<bool> {
        let mut state = self.state.lock().await;

        let Some(index) = state
            .returns
            .iter()
            .position(|r| r.id == return_id && r.status == ReturnStatus::Completed)
        else {
            return Ok(false);
        };

        let entries = cancellation_entries(&state.returns[index], actor, at);
        state.ensure_items_exist(entries.iter().map(|e| e.item_id.as_str()))?;

        let ret = &mut state.returns[index];
        ret.status = ReturnStatus::Cancelled;
        ret.cancelled_at = Some(at);
        for entry in &entries {
            state.apply(entry)?;
        }
        Ok(true)
    }

    async fn get_invoice(&self, id: &str) -> DbResult<Option<Invoice>> {
        let state = self.state.lock().await;
        Ok(state.invoices.iter().find(|i| i.id == id).cloned())
    }

    async fn list_invoices(&self, range: &DateRange) -> DbResult<Vec<Invoice>> {
        let state = self.state.lock().await;
        Ok(state
            .invoices
            .iter()
            .filter(|i| range.contains_timestamp(i.created_at))
            .cloned()
            .collect())
    }

    async fn get_return(&self, id: &str) -> DbResult<Option<SalesReturn>> {
        let state = self.state.lock().await;
        Ok(state.returns.iter().find(|r| r.id == id).cloned())
    }

    async fn returns_for_invoice(&self, invoice_id: &str) -> DbResult<Vec<SalesReturn>> {
        let state = self.state.lock().await;
        Ok(state
            .returns
            .iter()
            .filter(|r| r.invoice_id == invoice_id)
            .cloned()
            .collect())
    }

    async fn list_returns(&self, range: &DateRange) -> DbResult<Vec<SalesReturn>> {
        let state = self.state.lock().await;
        Ok(state
            .returns
            .iter()
            .filter(|r| range.contains_timestamp(r.created_at))
            .cloned()
            .collect())
    }

    // =========================================================================
    // Settings
    // =========================================================================

    async fn get_setting(&self, key: &str) -> DbResult<Option<String>> {
        Ok(self.state.lock().await.settings.get(key).cloned())
    }

    async fn put_setting(&self, key: &str, value: &str, _at: DateTime<Utc>) -> DbResult<()> {
        self.state
            .lock()
            .await
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn list_settings(&self) -> DbResult<Vec<(String, String)>> {
        let state = self.state.lock().await;
        Ok(state
            .settings
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
