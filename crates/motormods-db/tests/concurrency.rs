//! Concurrent sales against the last units of an item.
//!
//! ```text
//!   20 tasks ──► record_sale(qty 1) ──┐
//!                                     ├──► 10 in stock
//!                                     └──► exactly 10 invoices, qty 0
//! ```

mod common;

use std::sync::Arc;

use motormods_core::{CoreError, DateRange, NewInvoice, NewInvoiceLine, NewItem, PaymentMode, SYSTEM_ACTOR};
use motormods_db::{
    Database, DbConfig, DbError, FixedClock, InventoryProjection, InventoryStore, MemoryStore, SalesRecorder,
    SqliteStore,
};

const STOCK: i64 = 10;
const BUYERS: usize = 20;

async fn race(store: Arc<dyn InventoryStore>) {
    let clock = Arc::new(FixedClock::new(common::start()));
    let recorder = Arc::new(SalesRecorder::new(store.clone(), clock.clone()));

    let item = recorder
        .create_item(NewItem {
            name: "Chain Sprocket Kit".to_string(),
            sku: "CS-428".to_string(),
            category: Some("Transmission".to_string()),
            unit_price_cents: 185_000,
            purchase_cost_cents: 138_000,
            reorder_level: None,
            max_stock: None,
            opening_stock: STOCK,
            actor: SYSTEM_ACTOR.to_string(),
        })
        .await
        .unwrap();

    let mut handles = Vec::with_capacity(BUYERS);
    for n in 0..BUYERS {
        let recorder = recorder.clone();
        let item_id = item.id.clone();
        handles.push(tokio::spawn(async move {
            recorder
                .record_sale(NewInvoice {
                    customer_name: Some(format!("Walk-in {n}")),
                    payment_mode: PaymentMode::Cash,
                    discount_cents: 0,
                    actor: "counter".to_string(),
                    lines: vec![NewInvoiceLine {
                        item_id,
                        quantity: 1,
                        unit_price_cents: None,
                    }],
                })
                .await
        }));
    }

    let mut sold = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => sold += 1,
            Err(DbError::Domain(CoreError::InsufficientStock { .. })) => refused += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(sold, STOCK as usize);
    assert_eq!(refused, BUYERS - STOCK as usize);

    let projection = InventoryProjection::new(store.clone(), clock);
    assert_eq!(projection.current_quantity(&item.id).await.unwrap(), 0);
    assert!(projection.reconcile().await.unwrap().is_empty());

    let invoices = store.list_invoices(&DateRange::default()).await.unwrap();
    assert_eq!(invoices.len(), STOCK as usize);

    let mut numbers: Vec<&str> = invoices.iter().map(|i| i.invoice_number.as_str()).collect();
    numbers.sort_unstable();
    numbers.dedup();
    assert_eq!(numbers.len(), STOCK as usize, "invoice numbers must be unique");
    assert_eq!(numbers.first().copied(), Some("INV-20260601-001"));
    assert_eq!(numbers.last().copied(), Some("INV-20260601-010"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sales_never_oversell_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(DbConfig::new(dir.path().join("motormods.db")))
        .await
        .unwrap();

    race(Arc::new(SqliteStore::new(db.clone()))).await;
    db.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sales_never_oversell_memory() {
    race(Arc::new(MemoryStore::new())).await;
}
