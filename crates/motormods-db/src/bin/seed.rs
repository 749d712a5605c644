//! # Demo Data Seeder
//!
//! Fills a store with a small two-wheeler parts catalogue and a few weeks
//! of sales and returns, for trying out the reports.
//!
//! ## Usage
//! ```bash
//! # Default store (MOTORMODS_STORE / MOTORMODS_DB_PATH, else app data folder)
//! cargo run -p motormods-db --bin seed
//!
//! # Specific database file
//! cargo run -p motormods-db --bin seed -- --db ./motormods_dev.db
//!
//! # Throwaway in-memory store (prints the reports, keeps nothing)
//! cargo run -p motormods-db --bin seed -- --memory
//! ```
//!
//! Logging follows `RUST_LOG` (default `info,motormods=debug,sqlx=warn`).

use std::env;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing_subscriber::EnvFilter;

use motormods_core::reports::SortOrder;
use motormods_core::{
    AdjustmentType, NewInvoice, NewInvoiceLine, NewItem, NewReturn, NewReturnLine, PaymentMode, ReturnReason,
    SYSTEM_ACTOR,
};
use motormods_db::{
    open_store, AnalyticsEngine, DbConfig, FixedClock, InventoryStore, SalesRecorder, StoreConfig,
};

/// (sku, name, category, price, cost, opening stock, reorder level)
const CATALOGUE: &[(&str, &str, &str, i64, i64, i64, Option<i64>)] = &[
    ("BP-101", "Brake Pad Front (Disc)", "Brakes", 45000, 31000, 24, Some(6)),
    ("BP-102", "Brake Shoe Rear (Drum)", "Brakes", 32000, 21000, 18, None),
    ("CL-200", "Chain Lube 150ml", "Lubricants", 28000, 17500, 30, Some(8)),
    ("EO-1040", "Engine Oil 10W-40 1L", "Lubricants", 52000, 39000, 40, Some(10)),
    ("SP-IRIDIUM", "Spark Plug Iridium", "Electrical", 61000, 42000, 15, None),
    ("AF-125", "Air Filter 125cc", "Filters", 23000, 14000, 12, None),
    ("CS-428", "Chain Sprocket Kit 428", "Transmission", 185000, 138000, 6, Some(2)),
    ("HL-H4", "Headlight Bulb H4", "Electrical", 19000, 11000, 25, None),
    ("MR-L", "Mirror Left", "Body", 35000, 22000, 8, None),
    ("GR-BLK", "Grip Set Black", "Body", 27000, 15500, 0, None),
];

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,motormods=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_help() {
    println!("MotorMods Demo Data Seeder");
    println!();
    println!("Usage: seed [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -d, --db <PATH>    Database file path");
    println!("  -m, --memory       Use a throwaway in-memory store");
    println!("  -h, --help         Show this help message");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut config = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-d" | "--db" => {
                let path = args.get(i + 1).ok_or("--db needs a path")?;
                config = Some(StoreConfig::Sqlite(DbConfig::new(path)));
                i += 1;
            }
            "-m" | "--memory" => config = Some(StoreConfig::Memory),
            "-h" | "--help" => {
                print_help();
                return Ok(());
            }
            other => return Err(format!("Unknown argument: {other}").into()),
        }
        i += 1;
    }

    let config = match config {
        Some(config) => config,
        None => StoreConfig::from_env()?,
    };
    let store = open_store(config).await?;

    if !store.list_items().await?.is_empty() {
        println!("Store already has items; skipping seed.");
        println!("Delete the database file to regenerate.");
        return Ok(());
    }

    // History is written with a clock that walks forward from 45 days ago.
    let clock = Arc::new(FixedClock::new(Utc::now() - Duration::days(45)));
    let recorder = SalesRecorder::new(store.clone(), clock.clone());

    let mut ids = Vec::with_capacity(CATALOGUE.len());
    for (sku, name, category, price, cost, opening, reorder) in CATALOGUE {
        let item = recorder
            .create_item(NewItem {
                name: name.to_string(),
                sku: sku.to_string(),
                category: Some(category.to_string()),
                unit_price_cents: *price,
                purchase_cost_cents: *cost,
                reorder_level: *reorder,
                max_stock: None,
                opening_stock: *opening,
                actor: SYSTEM_ACTOR.to_string(),
            })
            .await?;
        ids.push(item.id);
    }
    println!("✓ Created {} items", ids.len());

    // Sales spread over six weeks: a few items move daily, one never sells.
    let mut invoices = Vec::new();
    for day in 0..40_usize {
        clock.advance(Duration::days(1));
        let mut lines = vec![NewInvoiceLine {
            item_id: ids[day % 4].clone(),
            quantity: 1,
            unit_price_cents: None,
        }];
        if day % 7 == 3 {
            lines.push(NewInvoiceLine {
                item_id: ids[6].clone(),
                quantity: 1,
                unit_price_cents: None,
            });
        }
        if day % 5 == 0 {
            lines.push(NewInvoiceLine {
                item_id: ids[2].clone(),
                quantity: 2,
                unit_price_cents: None,
            });
        }

        let request = NewInvoice {
            customer_name: (day % 3 == 0).then(|| "Ravi Motors".to_string()),
            payment_mode: if day % 2 == 0 { PaymentMode::Cash } else { PaymentMode::Upi },
            discount_cents: if day % 10 == 0 { 5000 } else { 0 },
            actor: "counter".to_string(),
            lines,
        };
        match recorder.record_sale(request).await {
            Ok(invoice) => invoices.push(invoice),
            Err(e) => println!("  ⚠ Sale on day {day} skipped: {e}"),
        }
    }
    println!("✓ Recorded {} invoices", invoices.len());

    // One damaged-goods return and a late stock delivery.
    if let Some(invoice) = invoices.iter().find(|inv| inv.lines.iter().any(|l| l.item_id == ids[2])) {
        let returned = recorder
            .record_return(NewReturn {
                invoice_id: invoice.id.clone(),
                reason: ReturnReason::Damage,
                notes: Some("Leaking cap".to_string()),
                actor: "counter".to_string(),
                lines: vec![NewReturnLine {
                    item_id: ids[2].clone(),
                    quantity: 1,
                }],
            })
            .await?;
        println!("✓ Recorded return {}", returned.return_number);
    }
    recorder
        .adjust_stock(&ids[0], AdjustmentType::ManualAdd, 12, "Supplier delivery", SYSTEM_ACTOR)
        .await?;

    print_summary(store).await?;
    Ok(())
}

async fn print_summary(store: Arc<dyn InventoryStore>) -> Result<(), Box<dyn std::error::Error>> {
    let analytics = AnalyticsEngine::new(store, Arc::new(motormods_db::SystemClock));

    let stats = analytics.sales_stats(None, None).await?;
    println!();
    println!("Totals: {} invoices, {} units, net {} (profit {})",
        stats.invoice_count,
        stats.items_sold,
        motormods_core::Money::from_cents(stats.net_cents),
        motormods_core::Money::from_cents(stats.profit_cents),
    );

    println!();
    println!("Low stock:");
    for row in analytics.current_stock(None, true).await? {
        println!("  {:<12} {:<28} {:>4}  {}", row.sku, row.name, row.quantity, row.status);
    }

    println!();
    println!("Slowest movers:");
    for row in analytics.non_moving_items(None).await?.iter().take(5) {
        println!("  {:<12} {:<28} {}", row.sku, row.name, row.fsn_class);
    }

    let days = analytics.daily_sales(None, None, SortOrder::NewestFirst).await?;
    println!();
    println!("✓ {} days of sales on record", days.len());
    Ok(())
}
