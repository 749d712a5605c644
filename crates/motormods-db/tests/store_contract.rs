//! Behaviour every store backend must share.
//!
//! Each test runs once against the in-memory store and once against
//! SQLite, through the same services the UI calls.

mod common;

use motormods_core::ledger::LedgerFilter;
use motormods_core::thresholds::{KEY_LOW_STOCK_METHOD, KEY_LOW_STOCK_PERCENTAGE, KEY_NON_MOVING_THRESHOLD_DAYS};
use motormods_core::{AdjustmentType, CoreError, DateRange, ReturnReason, ReturnStatus, ValidationError};
use motormods_db::{DbError, InventoryStore};

// =============================================================================
// Cache / Ledger Agreement
// =============================================================================

#[tokio::test]
async fn test_cache_matches_ledger_after_mixed_operations() {
    for h in common::backends().await {
        let pads = h.item("BP-01", "Brake Pad", 20).await;
        let lube = h.item("CL-01", "Chain Lube", 8).await;

        let invoice = h.sell(&[(&pads, 4), (&lube, 3)]).await.unwrap();
        h.advance_days(1);
        h.sell(&[(&pads, 1)]).await.unwrap();
        let ret = h.give_back(&invoice, &[(&lube, 2)], ReturnReason::Damage).await.unwrap();
        h.recorder
            .adjust_stock(&pads.id, AdjustmentType::ManualAdd, 6, "Delivery", "owner")
            .await
            .unwrap();
        h.recorder
            .adjust_stock(&lube.id, AdjustmentType::DamageWriteOff, -1, "Leaking", "owner")
            .await
            .unwrap();
        assert!(h.recorder.cancel_return(&ret.id, "owner").await.unwrap());

        assert_eq!(h.quantity(&pads).await, 20 - 4 - 1 + 6, "[{}]", h.name);
        assert_eq!(h.quantity(&lube).await, 8 - 3 + 2 - 1 - 2, "[{}]", h.name);
        h.assert_reconciled().await;
    }
}

#[tokio::test]
async fn test_failed_sale_writes_nothing() {
    for h in common::backends().await {
        let pads = h.item("BP-01", "Brake Pad", 10).await;
        let lube = h.item("CL-01", "Chain Lube", 1).await;

        let err = h.sell(&[(&pads, 2), (&lube, 5)]).await.unwrap_err();
        assert!(
            matches!(err, DbError::Domain(CoreError::InsufficientStock { available: 1, requested: 5, .. })),
            "[{}] {err:?}",
            h.name
        );

        assert_eq!(h.quantity(&pads).await, 10, "[{}]", h.name);
        assert_eq!(h.quantity(&lube).await, 1, "[{}]", h.name);
        assert!(h.store.list_invoices(&DateRange::default()).await.unwrap().is_empty());
        let sales = h
            .ledger
            .list(&LedgerFilter::default().with_type(AdjustmentType::Sale))
            .await
            .unwrap();
        assert!(sales.is_empty(), "[{}]", h.name);

        // The next successful sale still gets the first number of the day.
        let invoice = h.sell(&[(&pads, 1)]).await.unwrap();
        assert_eq!(invoice.invoice_number, "INV-20260601-001");
    }
}

#[tokio::test]
async fn test_same_item_on_two_lines_counts_combined() {
    for h in common::backends().await {
        let pads = h.item("BP-01", "Brake Pad", 5).await;

        let err = h.sell(&[(&pads, 3), (&pads, 3)]).await.unwrap_err();
        assert!(
            matches!(err, DbError::Domain(CoreError::InsufficientStock { available: 5, requested: 6, .. })),
            "[{}] {err:?}",
            h.name
        );
        assert_eq!(h.quantity(&pads).await, 5);
    }
}

#[tokio::test]
async fn test_sale_of_unknown_item_is_not_found() {
    for h in common::backends().await {
        let pads = h.item("BP-01", "Brake Pad", 5).await;
        let mut ghost = pads.clone();
        ghost.id = "missing".to_string();

        let err = h.sell(&[(&pads, 1), (&ghost, 1)]).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }), "[{}] {err:?}", h.name);
        assert_eq!(h.quantity(&pads).await, 5);
    }
}

#[tokio::test]
async fn test_inactive_item_cannot_be_sold() {
    for h in common::backends().await {
        let pads = h.item("BP-01", "Brake Pad", 5).await;
        h.recorder.deactivate_item(&pads.id).await.unwrap();

        let err = h.sell(&[(&pads, 1)]).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InactiveItem { .. })), "[{}] {err:?}", h.name);
    }
}

// =============================================================================
// Returns
// =============================================================================

#[tokio::test]
async fn test_return_bound_rejects_without_partial_write() {
    for h in common::backends().await {
        let pads = h.item("BP-01", "Brake Pad", 10).await;
        let lube = h.item("CL-01", "Chain Lube", 10).await;
        let invoice = h.sell(&[(&pads, 2), (&lube, 5)]).await.unwrap();

        h.give_back(&invoice, &[(&lube, 4)], ReturnReason::WrongPart).await.unwrap();

        // First line is fine, second exceeds what is left: nothing lands.
        let err = h
            .give_back(&invoice, &[(&pads, 1), (&lube, 2)], ReturnReason::Other)
            .await
            .unwrap_err();
        assert!(
            matches!(err, DbError::Domain(CoreError::ExcessReturnQuantity { returnable: 1, requested: 2, .. })),
            "[{}] {err:?}",
            h.name
        );

        assert_eq!(h.quantity(&pads).await, 8, "[{}]", h.name);
        assert_eq!(h.quantity(&lube).await, 9, "[{}]", h.name);
        assert_eq!(h.recorder.returns_for_invoice(&invoice.id).await.unwrap().len(), 1);

        let left = h.recorder.returnable_quantities(&invoice.id).await.unwrap();
        assert_eq!(left.get(&pads.id), Some(&2));
        assert_eq!(left.get(&lube.id), Some(&1));
    }
}

#[tokio::test]
async fn test_return_against_unknown_invoice_is_not_found() {
    for h in common::backends().await {
        let pads = h.item("BP-01", "Brake Pad", 10).await;
        let mut invoice = h.sell(&[(&pads, 1)]).await.unwrap();
        invoice.id = "missing".to_string();

        let err = h.give_back(&invoice, &[(&pads, 1)], ReturnReason::Damage).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }), "[{}] {err:?}", h.name);
    }
}

#[tokio::test]
async fn test_return_of_item_not_on_invoice_is_rejected() {
    for h in common::backends().await {
        let pads = h.item("BP-01", "Brake Pad", 10).await;
        let lube = h.item("CL-01", "Chain Lube", 10).await;
        let invoice = h.sell(&[(&pads, 1)]).await.unwrap();

        let err = h.give_back(&invoice, &[(&lube, 1)], ReturnReason::Damage).await.unwrap_err();
        assert!(
            matches!(err, DbError::Domain(CoreError::ExcessReturnQuantity { returnable: 0, .. })),
            "[{}] {err:?}",
            h.name
        );
        assert_eq!(h.quantity(&lube).await, 10);
    }
}

#[tokio::test]
async fn test_cancellation_offsets_and_frees_quantity() {
    for h in common::backends().await {
        let lube = h.item("CL-01", "Chain Lube", 10).await;
        let invoice = h.sell(&[(&lube, 5)]).await.unwrap();
        let ret = h.give_back(&invoice, &[(&lube, 5)], ReturnReason::CustomerRequest).await.unwrap();
        assert_eq!(h.quantity(&lube).await, 10);

        h.advance_days(1);
        assert!(h.recorder.cancel_return(&ret.id, "owner").await.unwrap(), "[{}]", h.name);
        assert_eq!(h.quantity(&lube).await, 5, "[{}]", h.name);

        let stored = h.recorder.sales_return(&ret.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReturnStatus::Cancelled);
        assert!(stored.cancelled_at.is_some());

        // opening + sale + return + offset
        let entries = h.ledger.list(&LedgerFilter::for_item(&lube.id)).await.unwrap();
        assert_eq!(entries.len(), 4, "[{}]", h.name);
        let offset = &entries[0];
        assert_eq!(offset.adjustment_type, AdjustmentType::ManualDeduction);
        assert_eq!(offset.delta, -5);
        assert_eq!(offset.reference_id.as_deref(), Some(ret.id.as_str()));

        // Second cancel is a no-op.
        assert!(!h.recorder.cancel_return(&ret.id, "owner").await.unwrap());
        assert_eq!(h.quantity(&lube).await, 5);
        assert_eq!(h.ledger.list(&LedgerFilter::for_item(&lube.id)).await.unwrap().len(), 4);

        // Cancelled units are returnable again.
        let again = h.give_back(&invoice, &[(&lube, 5)], ReturnReason::Damage).await.unwrap();
        assert_eq!(again.status, ReturnStatus::Completed);
        h.assert_reconciled().await;
    }
}

#[tokio::test]
async fn test_cancel_unknown_return_is_false() {
    for h in common::backends().await {
        assert!(!h.recorder.cancel_return("missing", "owner").await.unwrap(), "[{}]", h.name);
    }
}

// =============================================================================
// Document Numbering
// =============================================================================

#[tokio::test]
async fn test_document_numbers_run_per_day() {
    for h in common::backends().await {
        let pads = h.item("BP-01", "Brake Pad", 50).await;

        let first = h.sell(&[(&pads, 1)]).await.unwrap();
        let second = h.sell(&[(&pads, 1)]).await.unwrap();
        assert_eq!(first.invoice_number, "INV-20260601-001", "[{}]", h.name);
        assert_eq!(second.invoice_number, "INV-20260601-002", "[{}]", h.name);

        let ret = h.give_back(&first, &[(&pads, 1)], ReturnReason::Damage).await.unwrap();
        assert_eq!(ret.return_number, "RET-20260601-001");

        h.advance_days(1);
        let next_day = h.sell(&[(&pads, 1)]).await.unwrap();
        assert_eq!(next_day.invoice_number, "INV-20260602-001", "[{}]", h.name);
        let ret = h.give_back(&second, &[(&pads, 1)], ReturnReason::Damage).await.unwrap();
        assert_eq!(ret.return_number, "RET-20260602-001");
    }
}

#[tokio::test]
async fn test_invoice_snapshots_and_totals() {
    for h in common::backends().await {
        let pads = h.item_with("BP-01", "Brake Pad", 10, 45_000, 31_000, None).await;
        let invoice = h.sell(&[(&pads, 2)]).await.unwrap();

        assert_eq!(invoice.subtotal_cents, 90_000);
        assert_eq!(invoice.grand_total_cents, 90_000);

        let stored = h.recorder.invoice(&invoice.id).await.unwrap().unwrap();
        assert_eq!(stored, invoice, "[{}]", h.name);
        let line = &stored.lines[0];
        assert_eq!(line.sku_snapshot, "BP-01");
        assert_eq!(line.unit_cost_cents, 31_000);
        assert_eq!(line.line_total_cents, 90_000);
    }
}

// =============================================================================
// Ledger Queries
// =============================================================================

#[tokio::test]
async fn test_ledger_filter_and_pagination() {
    for h in common::backends().await {
        let pads = h.item("BP-01", "Brake Pad", 10).await;
        let lube = h.item("CL-01", "Chain Lube", 10).await;

        for n in 1..=5 {
            h.advance_days(1);
            h.recorder
                .adjust_stock(&pads.id, AdjustmentType::ManualAdd, n, "Delivery", "owner")
                .await
                .unwrap();
        }
        h.sell(&[(&lube, 1)]).await.unwrap();

        let all = h.ledger.list(&LedgerFilter::for_item(&pads.id)).await.unwrap();
        assert_eq!(all.len(), 6, "[{}]", h.name);
        assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at), "[{}] not newest first", h.name);
        assert_eq!(all[0].delta, 5);

        let adds = LedgerFilter::for_item(&pads.id).with_type(AdjustmentType::ManualAdd);
        let page = h.ledger.list(&adds.clone().page(2, 1)).await.unwrap();
        assert_eq!(page.iter().map(|e| e.delta).collect::<Vec<_>>(), vec![4, 3], "[{}]", h.name);

        // 2026-06-03 and 2026-06-04 hold the deliveries of 2 and 3.
        let range = DateRange::parse(Some("2026-06-03"), Some("2026-06-04")).unwrap();
        let dated = h.ledger.list(&adds.clone().with_range(range)).await.unwrap();
        assert_eq!(dated.iter().map(|e| e.delta).collect::<Vec<_>>(), vec![3, 2], "[{}]", h.name);

        let inverted = DateRange::parse(Some("2026-06-09"), Some("2026-06-01")).unwrap();
        assert!(h.ledger.list(&adds.with_range(inverted)).await.unwrap().is_empty());

        let sums = h.ledger.count_by_type(&pads.id).await.unwrap();
        assert_eq!(sums.get(&AdjustmentType::OpeningStock), Some(&10));
        assert_eq!(sums.get(&AdjustmentType::ManualAdd), Some(&15));
        assert_eq!(sums.get(&AdjustmentType::Sale), None);
    }
}

#[tokio::test]
async fn test_document_types_are_refused_for_manual_adjustment() {
    for h in common::backends().await {
        let pads = h.item("BP-01", "Brake Pad", 10).await;

        let err = h
            .recorder
            .adjust_stock(&pads.id, AdjustmentType::Sale, -1, "sneaky", "owner")
            .await
            .unwrap_err();
        assert!(
            matches!(err, DbError::Domain(CoreError::Validation(ValidationError::NotAllowed { .. }))),
            "[{}] {err:?}",
            h.name
        );

        let err = h
            .recorder
            .adjust_stock(&pads.id, AdjustmentType::ManualAdd, 0, "nothing", "owner")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
        assert_eq!(h.quantity(&pads).await, 10);
    }
}

// =============================================================================
// Projection Repair
// =============================================================================

#[tokio::test]
async fn test_rebuild_repairs_drifted_cache() {
    let h = common::Harness::sqlite().await;
    let pads = h.item("BP-01", "Brake Pad", 10).await;
    let lube = h.item("CL-01", "Chain Lube", 4).await;
    h.sell(&[(&pads, 3)]).await.unwrap();

    let db = h.db.as_ref().unwrap();
    sqlx::query("UPDATE items SET quantity = 99, last_sale_at = NULL")
        .execute(db.pool())
        .await
        .unwrap();

    let issues = h.projection.reconcile().await.unwrap();
    assert_eq!(issues.len(), 2);
    let pad_issue = issues.iter().find(|i| i.item_id == pads.id).unwrap();
    assert_eq!(pad_issue.cached_quantity, 99);
    assert_eq!(pad_issue.ledger_quantity, 7);

    let changed = h.projection.rebuild().await.unwrap();
    assert_eq!(changed, 2);
    assert_eq!(h.quantity(&pads).await, 7);
    assert_eq!(h.quantity(&lube).await, 4);
    h.assert_reconciled().await;

    let item = h.store.get_item(&pads.id).await.unwrap().unwrap();
    assert_eq!(item.last_sale_at, Some(common::start()));

    assert_eq!(h.projection.rebuild().await.unwrap(), 0);
}

#[tokio::test]
async fn test_ledger_rows_are_immutable_in_sqlite() {
    let h = common::Harness::sqlite().await;
    let pads = h.item("BP-01", "Brake Pad", 10).await;
    let pool = h.db.as_ref().unwrap().pool();

    let update = sqlx::query("UPDATE stock_ledger SET delta = 1000 WHERE item_id = ?1")
        .bind(&pads.id)
        .execute(pool)
        .await;
    assert!(update.is_err());

    let delete = sqlx::query("DELETE FROM stock_ledger WHERE item_id = ?1")
        .bind(&pads.id)
        .execute(pool)
        .await;
    assert!(delete.is_err());

    h.assert_reconciled().await;
}

// =============================================================================
// Settings
// =============================================================================

#[tokio::test]
async fn test_settings_defaults_overrides_and_rejections() {
    for h in common::backends().await {
        assert_eq!(h.settings.get(KEY_LOW_STOCK_METHOD).await.unwrap(), "reorder_level");
        assert!(h.settings.get_all().await.unwrap().iter().all(|s| s.is_default));

        h.settings.set(KEY_LOW_STOCK_PERCENTAGE, " 35 ").await.unwrap();
        assert_eq!(h.settings.get(KEY_LOW_STOCK_PERCENTAGE).await.unwrap(), "35", "[{}]", h.name);

        let err = h.settings.set(KEY_NON_MOVING_THRESHOLD_DAYS, "7").await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(ValidationError::OutOfRange { .. }))));
        let err = h.settings.set("theme", "dark").await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(ValidationError::UnknownSetting { .. }))));
        assert_eq!(h.settings.get(KEY_NON_MOVING_THRESHOLD_DAYS).await.unwrap(), "120");

        let all = h.settings.get_all().await.unwrap();
        let overridden: Vec<&str> = all.iter().filter(|s| !s.is_default).map(|s| s.key.as_str()).collect();
        assert_eq!(overridden, vec![KEY_LOW_STOCK_PERCENTAGE], "[{}]", h.name);

        let config = h.settings.snapshot().await.unwrap();
        assert_eq!(config.low_stock_percentage, 35);
        assert_eq!(config.non_moving_threshold_days, 120);
    }
}

#[tokio::test]
async fn test_garbage_persisted_setting_falls_back_to_default() {
    for h in common::backends().await {
        h.store
            .put_setting(KEY_LOW_STOCK_METHOD, "vibes", common::start())
            .await
            .unwrap();

        assert_eq!(h.settings.get(KEY_LOW_STOCK_METHOD).await.unwrap(), "reorder_level", "[{}]", h.name);
        let config = h.settings.snapshot().await.unwrap();
        assert_eq!(config.low_stock_method, motormods_core::LowStockMethod::ReorderLevel);
        let method = h
            .settings
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .find(|s| s.key == KEY_LOW_STOCK_METHOD)
            .unwrap();
        assert!(method.is_default);
    }
}

// =============================================================================
// Item Master
// =============================================================================

#[tokio::test]
async fn test_duplicate_sku_is_rejected_case_insensitively() {
    for h in common::backends().await {
        h.item("BP-01", "Brake Pad", 1).await;
        let err = h
            .recorder
            .create_item(motormods_core::NewItem {
                name: "Brake Pad Copy".to_string(),
                sku: "bp-01".to_string(),
                category: None,
                unit_price_cents: 100,
                purchase_cost_cents: 50,
                reorder_level: None,
                max_stock: None,
                opening_stock: 3,
                actor: "owner".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }), "[{}] {err:?}", h.name);

        assert_eq!(h.store.list_items().await.unwrap().len(), 1);
        let opening = h
            .ledger
            .list(&LedgerFilter::default().with_type(AdjustmentType::OpeningStock))
            .await
            .unwrap();
        assert_eq!(opening.len(), 1, "[{}] orphan opening entry", h.name);
    }
}

#[tokio::test]
async fn test_update_item_leaves_quantity_alone() {
    for h in common::backends().await {
        let pads = h.item("BP-01", "Brake Pad", 10).await;
        h.sell(&[(&pads, 2)]).await.unwrap();

        let updated = h
            .recorder
            .update_item(
                &pads.id,
                motormods_core::ItemUpdate {
                    name: "Brake Pad (Sintered)".to_string(),
                    sku: "BP-01S".to_string(),
                    category: Some("Brakes".to_string()),
                    unit_price_cents: 52_000,
                    purchase_cost_cents: 36_000,
                    reorder_level: Some(4),
                    max_stock: Some(40),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.quantity, 8, "[{}]", h.name);
        assert_eq!(updated.sku, "BP-01S");
        assert_eq!(updated.last_sale_at, Some(common::start()));
        h.assert_reconciled().await;
    }
}
