//! Shared harness: the same services over each store backend.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use motormods_core::{
    Invoice, Item, NewInvoice, NewInvoiceLine, NewItem, NewReturn, NewReturnLine, PaymentMode, ReturnReason,
    SalesReturn, SYSTEM_ACTOR,
};
use motormods_db::{
    AnalyticsEngine, Database, DbConfig, DbResult, FixedClock, InventoryProjection, InventoryStore, MemoryStore,
    SalesRecorder, SettingsService, SqliteStore, StockLedger,
};

/// 2026-06-01 10:00 UTC.
pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap()
}

pub struct Harness {
    pub name: &'static str,
    pub store: Arc<dyn InventoryStore>,
    /// Raw pool access for the SQLite backend.
    pub db: Option<Database>,
    pub clock: Arc<FixedClock>,
    pub recorder: SalesRecorder,
    pub ledger: StockLedger,
    pub projection: InventoryProjection,
    pub analytics: AnalyticsEngine,
    pub settings: SettingsService,
}

impl Harness {
    fn with_store(name: &'static str, store: Arc<dyn InventoryStore>, db: Option<Database>) -> Self {
        let clock = Arc::new(FixedClock::new(start()));
        Harness {
            name,
            recorder: SalesRecorder::new(store.clone(), clock.clone()),
            ledger: StockLedger::new(store.clone(), clock.clone()),
            projection: InventoryProjection::new(store.clone(), clock.clone()),
            analytics: AnalyticsEngine::new(store.clone(), clock.clone()),
            settings: SettingsService::new(store.clone(), clock.clone()),
            store,
            db,
            clock,
        }
    }

    pub fn memory() -> Self {
        Harness::with_store("memory", Arc::new(MemoryStore::new()), None)
    }

    pub async fn sqlite() -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Harness::with_store("sqlite", Arc::new(SqliteStore::new(db.clone())), Some(db))
    }

    pub fn advance_days(&self, days: i64) {
        self.clock.advance(Duration::days(days));
    }

    pub async fn item(&self, sku: &str, name: &str, opening_stock: i64) -> Item {
        self.item_with(sku, name, opening_stock, 10_000, 6_000, None).await
    }

    pub async fn item_with(
        &self,
        sku: &str,
        name: &str,
        opening_stock: i64,
        price: i64,
        cost: i64,
        reorder_level: Option<i64>,
    ) -> Item {
        self.recorder
            .create_item(NewItem {
                name: name.to_string(),
                sku: sku.to_string(),
                category: None,
                unit_price_cents: price,
                purchase_cost_cents: cost,
                reorder_level,
                max_stock: None,
                opening_stock,
                actor: SYSTEM_ACTOR.to_string(),
            })
            .await
            .unwrap()
    }

    pub async fn sell(&self, lines: &[(&Item, i64)]) -> DbResult<Invoice> {
        self.recorder
            .record_sale(NewInvoice {
                customer_name: None,
                payment_mode: PaymentMode::Cash,
                discount_cents: 0,
                actor: "counter".to_string(),
                lines: lines
                    .iter()
                    .map(|(item, quantity)| NewInvoiceLine {
                        item_id: item.id.clone(),
                        quantity: *quantity,
                        unit_price_cents: None,
                    })
                    .collect(),
            })
            .await
    }

    pub async fn give_back(&self, invoice: &Invoice, lines: &[(&Item, i64)], reason: ReturnReason) -> DbResult<SalesReturn> {
        self.recorder
            .record_return(NewReturn {
                invoice_id: invoice.id.clone(),
                reason,
                notes: None,
                actor: "counter".to_string(),
                lines: lines
                    .iter()
                    .map(|(item, quantity)| NewReturnLine {
                        item_id: item.id.clone(),
                        quantity: *quantity,
                    })
                    .collect(),
            })
            .await
    }

    pub async fn quantity(&self, item: &Item) -> i64 {
        self.projection.current_quantity(&item.id).await.unwrap()
    }

    pub async fn assert_reconciled(&self) {
        let issues = self.projection.reconcile().await.unwrap();
        assert!(issues.is_empty(), "[{}] cache drifted: {issues:?}", self.name);
    }
}

/// One harness per backend.
pub async fn backends() -> Vec<Harness> {
    vec![Harness::memory(), Harness::sqlite().await]
}
