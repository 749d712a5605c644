//! # SQLite Store
//!
//! [`InventoryStore`] over the sqlx pool.
//!
//! ## Transaction Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN (deferred)                                                      │
//! │    1. first statement is a write ──► holds the write lock from here    │
//! │       (conditional UPDATE on items / sales_returns)                    │
//! │    2. re-check rules on rows read inside the transaction               │
//! │    3. assign PREFIX-YYYYMMDD-NNN                                       │
//! │    4. insert header, lines, ledger entries                             │
//! │  COMMIT                                                                │
//! │                                                                         │
//! │  Any `?` before COMMIT drops the transaction ──► ROLLBACK              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Taking the write lock first means two tills can never both pass a stock
//! check against the same quantity, and the day's document sequence is
//! read and extended by one writer at a time.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, warn};

use motormods_core::billing::{
    cancellation_entries, check_returnable, price_return, returnable_quantities, ReturnPlan, SalePlan,
};
use motormods_core::inventory::SaleHistory;
use motormods_core::ledger::{
    day_prefix, document_number, next_sequence, LedgerFilter, ProjectedState, INVOICE_PREFIX, RETURN_PREFIX,
};
use motormods_core::{
    AdjustmentType, CoreError, DateRange, FsnClass, Invoice, InvoiceLine, Item, ItemUpdate, LedgerEntry,
    ReturnLine, SalesReturn,
};

use super::{InventoryStore, StoreBackend};
use crate::error::{DbError, DbResult};
use crate::pool::Database;

const ITEM_COLUMNS: &str = "id, name, sku, category, unit_price_cents, purchase_cost_cents, quantity, \
     reorder_level, max_stock, last_sale_at, fsn_class, is_active, created_at, updated_at";

const ENTRY_COLUMNS: &str = "id, item_id, adjustment_type, delta, note, actor, reference_id, created_at";

const INVOICE_COLUMNS: &str = "id, invoice_number, customer_name, payment_mode, subtotal_cents, \
     discount_cents, grand_total_cents, actor, created_at";

const RETURN_COLUMNS: &str =
    "id, return_number, invoice_id, reason, notes, total_cents, status, actor, created_at, cancelled_at";

/// SQLite-backed [`InventoryStore`].
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        SqliteStore { db }
    }

    /// The underlying database (backups, health checks).
    pub fn db(&self) -> &Database {
        &self.db
    }
}

// =============================================================================
// Connection-level helpers (shared by pool reads and transactions)
// =============================================================================

/// Applies `delta` to the cached quantity. `NotFound` when the item is missing.
async fn adjust_quantity(conn: &mut SqliteConnection, item_id: &str, delta: i64, at: DateTime<Utc>) -> DbResult<()> {
    let result = sqlx::query("UPDATE items SET quantity = quantity + ?2, updated_at = ?3 WHERE id = ?1")
        .bind(item_id)
        .bind(delta)
        .bind(at)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Item", item_id));
    }
    Ok(())
}

async fn insert_entry(conn: &mut SqliteConnection, entry: &LedgerEntry) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_ledger (
            id, item_id, adjustment_type, delta, note, actor, reference_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.item_id)
    .bind(entry.adjustment_type)
    .bind(entry.delta)
    .bind(&entry.note)
    .bind(&entry.actor)
    .bind(&entry.reference_id)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn fetch_item(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Item>> {
    let item = sqlx::query_as::<_, Item>(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(item)
}

/// Numbers already issued with `prefix`, for [`next_sequence`].
async fn numbers_with_prefix(conn: &mut SqliteConnection, table: &str, column: &str, prefix: &str) -> DbResult<Vec<String>> {
    let numbers: Vec<String> = sqlx::query_scalar(&format!("SELECT {column} FROM {table} WHERE {column} LIKE ?1"))
        .bind(format!("{prefix}%"))
        .fetch_all(&mut *conn)
        .await?;
    Ok(numbers)
}

async fn fetch_invoice(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Invoice>> {
    let header = sqlx::query_as::<_, Invoice>(&format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(mut invoice) = header else {
        return Ok(None);
    };
    invoice.lines = sqlx::query_as::<_, InvoiceLine>(
        "SELECT * FROM invoice_lines WHERE invoice_id = ?1 ORDER BY position",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(Some(invoice))
}

/// Attaches return lines to the given headers.
async fn attach_return_lines(conn: &mut SqliteConnection, returns: &mut [SalesReturn]) -> DbResult<()> {
    for ret in returns.iter_mut() {
        ret.lines = sqlx::query_as::<_, ReturnLine>("SELECT * FROM return_lines WHERE return_id = ?1 ORDER BY position")
            .bind(&ret.id)
            .fetch_all(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn fetch_return(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<SalesReturn>> {
    let header = sqlx::query_as::<_, SalesReturn>(&format!("SELECT {RETURN_COLUMNS} FROM sales_returns WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(ret) = header else {
        return Ok(None);
    };
    let mut returns = [ret];
    attach_return_lines(conn, &mut returns).await?;
    let [ret] = returns;
    Ok(Some(ret))
}

async fn fetch_returns_for_invoice(conn: &mut SqliteConnection, invoice_id: &str) -> DbResult<Vec<SalesReturn>> {
    let mut returns = sqlx::query_as::<_, SalesReturn>(&format!(
        "SELECT {RETURN_COLUMNS} FROM sales_returns WHERE invoice_id = ?1 ORDER BY created_at, rowid"
    ))
    .bind(invoice_id)
    .fetch_all(&mut *conn)
    .await?;
    attach_return_lines(conn, &mut returns).await?;
    Ok(returns)
}

/// Maps the SKU unique index violation to a message naming the SKU.
fn sku_conflict(err: DbError, sku: &str) -> DbError {
    match err {
        DbError::UniqueViolation { ref field, .. } if field.contains("sku") => DbError::duplicate("items.sku", sku),
        other => other,
    }
}

#[async_trait]
impl InventoryStore for SqliteStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Sqlite
    }

    // =========================================================================
    // Items
    // =========================================================================

    async fn insert_item(&self, item: &Item, opening: Option<&LedgerEntry>) -> DbResult<()> {
        debug!(id = %item.id, sku = %item.sku, "Inserting item");
        let mut tx = self.db.pool().begin().await?;

        // Quantity starts at zero; the opening entry brings it up.
        sqlx::query(
            r#"
            INSERT INTO items (
                id, name, sku, category, unit_price_cents, purchase_cost_cents, quantity,
                reorder_level, max_stock, last_sale_at, fsn_class, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&item.id)
        .bind(&item.name)
        .bind(&item.sku)
        .bind(&item.category)
        .bind(item.unit_price_cents)
        .bind(item.purchase_cost_cents)
        .bind(item.reorder_level)
        .bind(item.max_stock)
        .bind(item.last_sale_at)
        .bind(item.fsn_class)
        .bind(item.is_active)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| sku_conflict(e.into(), &item.sku))?;

        if let Some(entry) = opening {
            adjust_quantity(&mut tx, &entry.item_id, entry.delta, entry.created_at).await?;
            insert_entry(&mut tx, entry).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_item(&self, id: &str) -> DbResult<Option<Item>> {
        let mut conn = self.db.pool().acquire().await?;
        fetch_item(&mut conn, id).await
    }

    async fn list_items(&self) -> DbResult<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(&format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY name, sku"))
            .fetch_all(self.db.pool())
            .await?;
        Ok(items)
    }

    async fn update_item(&self, id: &str, update: &ItemUpdate, at: DateTime<Utc>) -> DbResult<Item> {
        debug!(id = %id, "Updating item");
        let mut tx = self.db.pool().begin().await?;

        let sku = update.sku.trim();
        let result = sqlx::query(
            r#"
            UPDATE items SET
                name = ?2, sku = ?3, category = ?4, unit_price_cents = ?5,
                purchase_cost_cents = ?6, reorder_level = ?7, max_stock = ?8, updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(update.name.trim())
        .bind(sku)
        .bind(&update.category)
        .bind(update.unit_price_cents)
        .bind(update.purchase_cost_cents)
        .bind(update.reorder_level)
        .bind(update.max_stock)
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(|e| sku_conflict(e.into(), sku))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Item", id));
        }

        let item = fetch_item(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Item", id))?;
        tx.commit().await?;
        Ok(item)
    }

    async fn set_item_active(&self, id: &str, active: bool, at: DateTime<Utc>) -> DbResult<()> {
        let result = sqlx::query("UPDATE items SET is_active = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .bind(at)
            .execute(self.db.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Item", id));
        }
        Ok(())
    }

    // =========================================================================
    // Ledger
    // =========================================================================

    async fn append_entry(&self, entry: &LedgerEntry) -> DbResult<()> {
        debug!(item_id = %entry.item_id, kind = %entry.adjustment_type, delta = entry.delta, "Appending ledger entry");
        let mut tx = self.db.pool().begin().await?;
        adjust_quantity(&mut tx, &entry.item_id, entry.delta, entry.created_at).await?;
        insert_entry(&mut tx, entry).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_entries(&self, filter: &LedgerFilter) -> DbResult<Vec<LedgerEntry>> {
        if filter.range.is_inverted() {
            return Ok(Vec::new());
        }

        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS} FROM stock_ledger
            WHERE (?1 IS NULL OR item_id = ?1)
              AND (?2 IS NULL OR adjustment_type = ?2)
              AND (?3 IS NULL OR created_at >= ?3)
              AND (?4 IS NULL OR created_at < ?4)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?5 OFFSET ?6
            "#
        ))
        .bind(&filter.item_id)
        .bind(filter.adjustment_type)
        .bind(filter.range.start_bound())
        .bind(filter.range.end_bound_exclusive())
        .bind(i64::from(filter.effective_limit()))
        .bind(i64::from(filter.offset))
        .fetch_all(self.db.pool())
        .await?;
        Ok(entries)
    }

    async fn all_entries(&self) -> DbResult<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM stock_ledger ORDER BY created_at, rowid"
        ))
        .fetch_all(self.db.pool())
        .await?;
        Ok(entries)
    }

    async fn sum_by_type(&self, item_id: &str) -> DbResult<BTreeMap<AdjustmentType, i64>> {
        let rows: Vec<(AdjustmentType, i64)> = sqlx::query_as(
            "SELECT adjustment_type, SUM(delta) FROM stock_ledger WHERE item_id = ?1 GROUP BY adjustment_type",
        )
        .bind(item_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn sale_histories(&self) -> DbResult<HashMap<String, SaleHistory>> {
        let rows: Vec<(String, i64, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT item_id, -SUM(delta), MIN(created_at), MAX(created_at)
            FROM stock_ledger
            WHERE adjustment_type = 'sale'
            GROUP BY item_id
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(item_id, total_sold, first, last)| {
                let history = SaleHistory {
                    total_sold,
                    first_sale: Some(first),
                    last_sale: Some(last),
                };
                (item_id, history)
            })
            .collect())
    }

    // =========================================================================
    // Projection
    // =========================================================================

    async fn mark_sold(&self, item_id: &str, at: DateTime<Utc>) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE items SET last_sale_at = ?2 WHERE id = ?1 AND (last_sale_at IS NULL OR last_sale_at < ?2)",
        )
        .bind(item_id)
        .bind(at)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 && self.get_item(item_id).await?.is_none() {
            return Err(DbError::not_found("Item", item_id));
        }
        Ok(())
    }

    async fn set_fsn_classes(&self, classes: &[(String, FsnClass)]) -> DbResult<()> {
        let mut tx = self.db.pool().begin().await?;
        for (id, class) in classes {
            sqlx::query("UPDATE items SET fsn_class = ?2 WHERE id = ?1")
                .bind(id)
                .bind(*class)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn replace_projection(&self, states: &BTreeMap<String, ProjectedState>, at: DateTime<Utc>) -> DbResult<usize> {
        let mut tx = self.db.pool().begin().await?;
        let mut changed: u64 = 0;

        for (item_id, state) in states {
            let result = sqlx::query(
                r#"
                UPDATE items SET quantity = ?2, last_sale_at = ?3, updated_at = ?4
                WHERE id = ?1 AND (quantity != ?2 OR last_sale_at IS NOT ?3)
                "#,
            )
            .bind(item_id)
            .bind(state.quantity)
            .bind(state.last_sale_at)
            .bind(at)
            .execute(&mut *tx)
            .await?;
            changed += result.rows_affected();
        }

        // Items with no ledger history at all.
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM items")
            .fetch_all(&mut *tx)
            .await?;
        for id in ids.iter().filter(|id| !states.contains_key(id.as_str())) {
            let result = sqlx::query(
                r#"
                UPDATE items SET quantity = 0, last_sale_at = NULL, updated_at = ?2
                WHERE id = ?1 AND (quantity != 0 OR last_sale_at IS NOT NULL)
                "#,
            )
            .bind(id)
            .bind(at)
            .execute(&mut *tx)
            .await?;
            changed += result.rows_affected();
        }

        tx.commit().await?;
        Ok(changed as usize)
    }

    // =========================================================================
    // Documents
    // =========================================================================

    async fn commit_sale(&self, plan: SalePlan) -> DbResult<Invoice> {
        let SalePlan { mut invoice, entries } = plan;
        let at = invoice.created_at;
        let mut tx = self.db.pool().begin().await?;

        // 1. Conditional decrement per item: the first write takes the lock,
        //    and a row that no longer has enough stock matches nothing.
        let mut requested: BTreeMap<&str, i64> = BTreeMap::new();
        for line in &invoice.lines {
            *requested.entry(line.item_id.as_str()).or_insert(0) += line.quantity;
        }
        for (item_id, quantity) in &requested {
            let result = sqlx::query(
                "UPDATE items SET quantity = quantity - ?2, updated_at = ?3 WHERE id = ?1 AND quantity >= ?2",
            )
            .bind(item_id)
            .bind(quantity)
            .bind(at)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                let current = fetch_item(&mut tx, item_id).await?;
                return Err(match current {
                    None => DbError::not_found("Item", *item_id),
                    Some(item) => {
                        warn!(sku = %item.sku, available = item.quantity, requested = quantity, "Sale rejected at commit");
                        CoreError::InsufficientStock {
                            item: item.name,
                            sku: item.sku,
                            available: item.quantity.max(0),
                            requested: *quantity,
                        }
                        .into()
                    }
                });
            }
        }

        // 2. Number
        let day = at.date_naive();
        let prefix = day_prefix(INVOICE_PREFIX, day);
        let existing = numbers_with_prefix(&mut tx, "invoices", "invoice_number", &prefix).await?;
        invoice.invoice_number = document_number(INVOICE_PREFIX, day, next_sequence(&prefix, existing.iter().map(String::as_str)));

        // 3. Header, lines, ledger
        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, invoice_number, customer_name, payment_mode, subtotal_cents,
                discount_cents, grand_total_cents, actor, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.invoice_number)
        .bind(&invoice.customer_name)
        .bind(invoice.payment_mode)
        .bind(invoice.subtotal_cents)
        .bind(invoice.discount_cents)
        .bind(invoice.grand_total_cents)
        .bind(&invoice.actor)
        .bind(invoice.created_at)
        .execute(&mut *tx)
        .await?;

        for line in &invoice.lines {
            sqlx::query(
                r#"
                INSERT INTO invoice_lines (
                    id, invoice_id, position, item_id, sku_snapshot, name_snapshot,
                    quantity, unit_price_cents, unit_cost_cents, line_total_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(&line.id)
            .bind(&line.invoice_id)
            .bind(line.position)
            .bind(&line.item_id)
            .bind(&line.sku_snapshot)
            .bind(&line.name_snapshot)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .bind(line.unit_cost_cents)
            .bind(line.line_total_cents)
            .execute(&mut *tx)
            .await?;
        }

        // Quantities were already moved in step 1.
        for entry in &entries {
            insert_entry(&mut tx, entry).await?;
        }

        // 4. Last sale
        for item_id in requested.keys() {
            sqlx::query("UPDATE items SET last_sale_at = ?2 WHERE id = ?1 AND (last_sale_at IS NULL OR last_sale_at < ?2)")
                .bind(item_id)
                .bind(at)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(invoice_number = %invoice.invoice_number, lines = invoice.lines.len(), "Sale committed");
        Ok(invoice)
    }

    async fn commit_return(&self, mut plan: ReturnPlan) -> DbResult<SalesReturn> {
        let mut tx = self.db.pool().begin().await?;

        // 1. Increments first (write lock)
        for entry in &plan.entries {
            adjust_quantity(&mut tx, &entry.item_id, entry.delta, entry.created_at).await?;
        }

        // 2. Re-price and re-check against the invoice as it stands inside the transaction
        let invoice_id = plan.sales_return.invoice_id.clone();
        let invoice = fetch_invoice(&mut tx, &invoice_id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", &invoice_id))?;
        let prior = fetch_returns_for_invoice(&mut tx, &invoice_id).await?;
        price_return(&mut plan, &invoice, &prior);
        check_returnable(&plan, &invoice, &returnable_quantities(&invoice, &prior))?;

        // 3. Number, header, lines, ledger
        let ReturnPlan { mut sales_return, entries } = plan;
        let day = sales_return.created_at.date_naive();
        let prefix = day_prefix(RETURN_PREFIX, day);
        let existing = numbers_with_prefix(&mut tx, "sales_returns", "return_number", &prefix).await?;
        sales_return.return_number =
            document_number(RETURN_PREFIX, day, next_sequence(&prefix, existing.iter().map(String::as_str)));

        sqlx::query(
            r#"
            INSERT INTO sales_returns (
                id, return_number, invoice_id, reason, notes, total_cents,
                status, actor, created_at, cancelled_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&sales_return.id)
        .bind(&sales_return.return_number)
        .bind(&sales_return.invoice_id)
        .bind(sales_return.reason)
        .bind(&sales_return.notes)
        .bind(sales_return.total_cents)
        .bind(sales_return.status)
        .bind(&sales_return.actor)
        .bind(sales_return.created_at)
        .bind(sales_return.cancelled_at)
        .execute(&mut *tx)
        .await?;

        for line in &sales_return.lines {
            sqlx::query(
                r#"
                INSERT INTO return_lines (
                    id, return_id, position, item_id, quantity, rate_cents, line_total_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&line.id)
            .bind(&line.return_id)
            .bind(line.position)
            .bind(&line.item_id)
            .bind(line.quantity)
            .bind(line.rate_cents)
            .bind(line.line_total_cents)
            .execute(&mut *tx)
            .await?;
        }

        for entry in &entries {
            insert_entry(&mut tx, entry).await?;
        }

        tx.commit().await?;
        debug!(return_number = %sales_return.return_number, "Return committed");
        Ok(sales_return)
    }

    async fn commit_cancellation(&self, return_id: &str, actor: &str, at: DateTime<Utc>) -> DbResult<bool> {
        let mut tx = self.db.pool().begin().await?;

        let result = sqlx::query(
            "UPDATE sales_returns SET status = 'cancelled', cancelled_at = ?2 WHERE id = ?1 AND status = 'completed'",
        )
        .bind(return_id)
        .bind(at)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }

        let ret = fetch_return(&mut tx, return_id)
            .await?
            .ok_or_else(|| DbError::not_found("Return", return_id))?;
        for entry in cancellation_entries(&ret, actor, at) {
            adjust_quantity(&mut tx, &entry.item_id, entry.delta, at).await?;
            insert_entry(&mut tx, &entry).await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn get_invoice(&self, id: &str) -> DbResult<Option<Invoice>> {
        let mut conn = self.db.pool().acquire().await?;
        fetch_invoice(&mut conn, id).await
    }

    async fn list_invoices(&self, range: &DateRange) -> DbResult<Vec<Invoice>> {
        if range.is_inverted() {
            return Ok(Vec::new());
        }

        let mut conn = self.db.pool().acquire().await?;
        let mut invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS} FROM invoices
            WHERE (?1 IS NULL OR created_at >= ?1) AND (?2 IS NULL OR created_at < ?2)
            ORDER BY created_at, rowid
            "#
        ))
        .bind(range.start_bound())
        .bind(range.end_bound_exclusive())
        .fetch_all(&mut *conn)
        .await?;

        let lines = sqlx::query_as::<_, InvoiceLine>(
            r#"
            SELECT l.* FROM invoice_lines l
            JOIN invoices i ON i.id = l.invoice_id
            WHERE (?1 IS NULL OR i.created_at >= ?1) AND (?2 IS NULL OR i.created_at < ?2)
            ORDER BY l.invoice_id, l.position
            "#,
        )
        .bind(range.start_bound())
        .bind(range.end_bound_exclusive())
        .fetch_all(&mut *conn)
        .await?;

        let mut by_invoice: HashMap<String, Vec<InvoiceLine>> = HashMap::new();
        for line in lines {
            by_invoice.entry(line.invoice_id.clone()).or_default().push(line);
        }
        for invoice in &mut invoices {
            invoice.lines = by_invoice.remove(&invoice.id).unwrap_or_default();
        }
        Ok(invoices)
    }

    async fn get_return(&self, id: &str) -> DbResult<Option<SalesReturn>> {
        let mut conn = self.db.pool().acquire().await?;
        fetch_return(&mut conn, id).await
    }

    async fn returns_for_invoice(&self, invoice_id: &str) -> DbResult<Vec<SalesReturn>> {
        let mut conn = self.db.pool().acquire().await?;
        fetch_returns_for_invoice(&mut conn, invoice_id).await
    }

    async fn list_returns(&self, range: &DateRange) -> DbResult<Vec<SalesReturn>> {
        if range.is_inverted() {
            return Ok(Vec::new());
        }

        let mut conn = self.db.pool().acquire().await?;
        let mut returns = sqlx::query_as::<_, SalesReturn>(&format!(
            r#"
            SELECT {RETURN_COLUMNS} FROM sales_returns
            WHERE (?1 IS NULL OR created_at >= ?1) AND (?2 IS NULL OR created_at < ?2)
            ORDER BY created_at, rowid
            "#
        ))
        .bind(range.start_bound())
        .bind(range.end_bound_exclusive())
        .fetch_all(&mut *conn)
        .await?;
        attach_return_lines(&mut conn, &mut returns).await?;
        Ok(returns)
    }

    // =========================================================================
    // Settings
    // =========================================================================

    async fn get_setting(&self, key: &str) -> DbResult<Option<String>> {
        let value = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(value)
    }

    async fn put_setting(&self, key: &str, value: &str, at: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(at)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    async fn list_settings(&self) -> DbResult<Vec<(String, String)>> {
        let rows = sqlx::query_as::<_, (String, String)>("SELECT key, value FROM settings ORDER BY key")
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
