//! # Sales Recorder
//!
//! Sales, returns and item master changes. Every stock movement it makes
//! goes through the ledger.
//!
//! ## Sale Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  NewInvoice                                                            │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  fetch items ──► plan_sale (core) ──► validation / stock errors        │
//! │      │                                  (nothing written)              │
//! │      ▼                                                                  │
//! │  store.commit_sale ──► one unit:                                       │
//! │      re-check stock, INV-YYYYMMDD-NNN, header, lines,                  │
//! │      `sale` entries (−qty), quantity −qty, last_sale_at                │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  Invoice                                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Return Flow
//! ```text
//!  NewReturn ──► invoice + its returns ──► plan_return ──► commit_return
//!                                              │
//!                  ExcessReturnQuantity ◄──────┘  (returnable = sold − completed returns)
//!
//!  cancel_return ──► status = cancelled + `manual_deduction` (−qty) per line
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, info};

use motormods_core::billing::{plan_return, plan_sale, returnable_quantities};
use motormods_core::validation::{validate_item_update, validate_new_item};
use motormods_core::{
    new_id, AdjustmentType, FsnClass, Invoice, Item, ItemUpdate, LedgerEntry, NewInvoice, NewItem, NewReturn,
    SalesReturn, ValidationError,
};

use crate::clock::Clock;
use crate::error::{DbError, DbResult};
use crate::ledger::StockLedger;
use crate::store::InventoryStore;

/// Adjustment types that only documents may write.
const DOCUMENT_TYPES: [AdjustmentType; 2] = [AdjustmentType::Sale, AdjustmentType::Return];

#[derive(Debug, Clone)]
pub struct SalesRecorder {
    store: Arc<dyn InventoryStore>,
    clock: Arc<dyn Clock>,
    ledger: StockLedger,
}

impl SalesRecorder {
    pub fn new(store: Arc<dyn InventoryStore>, clock: Arc<dyn Clock>) -> Self {
        let ledger = StockLedger::new(store.clone(), clock.clone());
        SalesRecorder { store, clock, ledger }
    }

    // =========================================================================
    // Sales
    // =========================================================================

    /// Records a sale.
    ///
    /// ## Errors
    /// - `Domain(EmptyDocument | Validation | InactiveItem)`: bad request
    /// - `Domain(InsufficientStock)`: some item's combined quantity exceeds
    ///   what is on hand
    /// - `NotFound`: a line names an unknown item
    ///
    /// On any error nothing is written.
    pub async fn record_sale(&self, request: NewInvoice) -> DbResult<Invoice> {
        debug!(lines = request.lines.len(), "Recording sale");

        let mut items: HashMap<String, Item> = HashMap::new();
        for line in &request.lines {
            if items.contains_key(&line.item_id) {
                continue;
            }
            if let Some(item) = self.store.get_item(&line.item_id).await? {
                items.insert(item.id.clone(), item);
            }
        }

        let plan = plan_sale(&request, &items, self.clock.now())?;
        let invoice = self.store.commit_sale(plan).await?;

        info!(
            invoice_number = %invoice.invoice_number,
            lines = invoice.lines.len(),
            total_cents = invoice.grand_total_cents,
            "Sale recorded"
        );
        Ok(invoice)
    }

    // =========================================================================
    // Returns
    // =========================================================================

    /// Records a return against an invoice.
    ///
    /// Each item may come back at most `sold − already returned` times;
    /// cancelled returns do not count as returned.
    pub async fn record_return(&self, request: NewReturn) -> DbResult<SalesReturn> {
        debug!(invoice_id = %request.invoice_id, lines = request.lines.len(), "Recording return");

        let invoice = self
            .store
            .get_invoice(&request.invoice_id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", &request.invoice_id))?;
        let prior = self.store.returns_for_invoice(&invoice.id).await?;

        let plan = plan_return(&request, &invoice, &prior, self.clock.now())?;
        let sales_return = self.store.commit_return(plan).await?;

        info!(
            return_number = %sales_return.return_number,
            invoice_number = %invoice.invoice_number,
            reason = %sales_return.reason,
            total_cents = sales_return.total_cents,
            "Return recorded"
        );
        Ok(sales_return)
    }

    /// Cancels a completed return and takes its units back out of stock.
    ///
    /// ## Returns
    /// `false` when the return does not exist or is already cancelled.
    pub async fn cancel_return(&self, return_id: &str, actor: &str) -> DbResult<bool> {
        let cancelled = self
            .store
            .commit_cancellation(return_id, actor, self.clock.now())
            .await?;
        if cancelled {
            info!(return_id = %return_id, actor = %actor, "Return cancelled");
        } else {
            debug!(return_id = %return_id, "Return not cancellable");
        }
        Ok(cancelled)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub async fn invoice(&self, id: &str) -> DbResult<Option<Invoice>> {
        self.store.get_invoice(id).await
    }

    pub async fn sales_return(&self, id: &str) -> DbResult<Option<SalesReturn>> {
        self.store.get_return(id).await
    }

    /// Every return against the invoice, cancelled ones included.
    pub async fn returns_for_invoice(&self, invoice_id: &str) -> DbResult<Vec<SalesReturn>> {
        self.store.returns_for_invoice(invoice_id).await
    }

    /// Units per item that can still be returned on an invoice.
    pub async fn returnable_quantities(&self, invoice_id: &str) -> DbResult<BTreeMap<String, i64>> {
        let invoice = self
            .store
            .get_invoice(invoice_id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", invoice_id))?;
        let returns = self.store.returns_for_invoice(invoice_id).await?;
        Ok(returnable_quantities(&invoice, &returns))
    }

    // =========================================================================
    // Item Master
    // =========================================================================

    /// Adds an item to the catalogue.
    ///
    /// A positive `opening_stock` is recorded as one `opening_stock` ledger
    /// entry in the same unit as the insert.
    pub async fn create_item(&self, new: NewItem) -> DbResult<Item> {
        validate_new_item(&new)?;

        let now = self.clock.now();
        let item = Item {
            id: new_id(),
            name: new.name.trim().to_string(),
            sku: new.sku.trim().to_string(),
            category: new
                .category
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            unit_price_cents: new.unit_price_cents,
            purchase_cost_cents: new.purchase_cost_cents,
            quantity: new.opening_stock,
            reorder_level: new.reorder_level,
            max_stock: new.max_stock,
            last_sale_at: None,
            fsn_class: FsnClass::NonMoving,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let opening = (new.opening_stock > 0).then(|| LedgerEntry {
            id: new_id(),
            item_id: item.id.clone(),
            adjustment_type: AdjustmentType::OpeningStock,
            delta: new.opening_stock,
            note: "Opening stock".to_string(),
            actor: new.actor.clone(),
            reference_id: None,
            created_at: now,
        });

        self.store.insert_item(&item, opening.as_ref()).await?;
        info!(id = %item.id, sku = %item.sku, opening_stock = item.quantity, "Item created");
        Ok(item)
    }

    /// Edits master data. Quantity only ever changes through the ledger.
    pub async fn update_item(&self, id: &str, update: ItemUpdate) -> DbResult<Item> {
        validate_item_update(&update)?;
        let item = self.store.update_item(id, &update, self.clock.now()).await?;
        info!(id = %item.id, sku = %item.sku, "Item updated");
        Ok(item)
    }

    /// Hides an item from billing. Its history stays.
    pub async fn deactivate_item(&self, id: &str) -> DbResult<()> {
        self.store.set_item_active(id, false, self.clock.now()).await?;
        info!(id = %id, "Item deactivated");
        Ok(())
    }

    /// Manual stock adjustment (delivery, damage, supplier return, ...).
    ///
    /// `sale` and `return` entries belong to documents and are refused
    /// here, as is a zero delta.
    pub async fn adjust_stock(
        &self,
        item_id: &str,
        adjustment_type: AdjustmentType,
        delta: i64,
        note: &str,
        actor: &str,
    ) -> DbResult<LedgerEntry> {
        if DOCUMENT_TYPES.contains(&adjustment_type) {
            return Err(ValidationError::NotAllowed {
                field: "adjustment_type".to_string(),
                allowed: AdjustmentType::ALL
                    .iter()
                    .filter(|t| !DOCUMENT_TYPES.contains(t))
                    .map(|t| t.as_str().to_string())
                    .collect(),
            }
            .into());
        }
        if delta == 0 {
            return Err(ValidationError::InvalidFormat {
                field: "delta".to_string(),
                reason: "must not be zero".to_string(),
            }
            .into());
        }

        let entry = self.ledger.append(item_id, adjustment_type, delta, note, actor).await?;
        info!(item_id = %item_id, kind = %adjustment_type, delta, actor = %actor, "Stock adjusted");
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};
    use motormods_core::{CoreError, NewInvoiceLine, PaymentMode, SYSTEM_ACTOR};

    fn recorder() -> SalesRecorder {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap()));
        SalesRecorder::new(Arc::new(MemoryStore::new()), clock)
    }

    fn new_item(sku: &str, opening_stock: i64) -> NewItem {
        NewItem {
            name: format!("  Part {sku} "),
            sku: sku.to_string(),
            category: Some(" ".to_string()),
            unit_price_cents: 1000,
            purchase_cost_cents: 700,
            reorder_level: None,
            max_stock: None,
            opening_stock,
            actor: SYSTEM_ACTOR.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_item_trims_and_opens_stock() {
        let recorder = recorder();
        let item = recorder.create_item(new_item("AF-1", 12)).await.unwrap();
        assert_eq!(item.name, "Part AF-1");
        assert_eq!(item.category, None);
        assert_eq!(item.quantity, 12);

        let counts = recorder.ledger.count_by_type(&item.id).await.unwrap();
        assert_eq!(counts.get(&AdjustmentType::OpeningStock), Some(&12));
    }

    #[tokio::test]
    async fn test_inactive_item_cannot_be_sold() {
        let recorder = recorder();
        let item = recorder.create_item(new_item("AF-2", 5)).await.unwrap();
        recorder.deactivate_item(&item.id).await.unwrap();

        let err = recorder
            .record_sale(NewInvoice {
                payment_mode: PaymentMode::Cash,
                actor: "asha".to_string(),
                lines: vec![NewInvoiceLine {
                    item_id: item.id.clone(),
                    quantity: 1,
                    unit_price_cents: None,
                }],
                ..NewInvoice::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(CoreError::InactiveItem { .. })));
    }

    #[tokio::test]
    async fn test_adjust_stock_refuses_document_types() {
        let recorder = recorder();
        let item = recorder.create_item(new_item("AF-3", 0)).await.unwrap();
        assert!(recorder
            .adjust_stock(&item.id, AdjustmentType::Sale, -1, "", SYSTEM_ACTOR)
            .await
            .is_err());
        assert!(recorder
            .adjust_stock(&item.id, AdjustmentType::ManualAdd, 0, "", SYSTEM_ACTOR)
            .await
            .is_err());

        let entry = recorder
            .adjust_stock(&item.id, AdjustmentType::ManualAdd, 4, " delivery ", SYSTEM_ACTOR)
            .await
            .unwrap();
        assert_eq!(entry.note, "delivery");
    }

    #[tokio::test]
    async fn test_unknown_item_in_sale_is_not_found() {
        let recorder = recorder();
        let err = recorder
            .record_sale(NewInvoice {
                actor: "asha".to_string(),
                lines: vec![NewInvoiceLine {
                    item_id: "ghost".to_string(),
                    quantity: 1,
                    unit_price_cents: None,
                }],
                ..NewInvoice::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
