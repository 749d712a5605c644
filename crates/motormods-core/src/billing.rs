//! # Billing Plans
//!
//! Turns a sale or return request into the exact rows to write, or the
//! business error explaining why nothing may be written.
//!
//! ```text
//!   NewInvoice + items ──► plan_sale ──► SalePlan { invoice, sale entries }
//!                              │
//!                              └──► InsufficientStock / InactiveItem / ...
//!
//!   NewReturn + invoice + prior returns ──► plan_return ──► ReturnPlan
//!                                                │
//!                                                └──► ExcessReturnQuantity
//! ```
//!
//! Both storage backends run the same checks again inside their write
//! transaction ([`check_stock`], [`check_returnable`]) so a plan that went
//! stale between planning and commit is still rejected.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{
    new_id, AdjustmentType, Invoice, InvoiceLine, Item, LedgerEntry, NewInvoice, NewReturn, ReturnLine,
    ReturnStatus, SalesReturn,
};
use crate::validation::{validate_new_invoice, validate_new_return};

/// Rows for one sale. `invoice.invoice_number` is assigned at commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalePlan {
    pub invoice: Invoice,
    /// One `sale` entry per line (delta = −qty), in line order.
    pub entries: Vec<LedgerEntry>,
}

impl SalePlan {
    /// Units requested per item, summed across lines.
    pub fn requested_by_item(&self) -> BTreeMap<&str, i64> {
        let mut totals = BTreeMap::new();
        for line in &self.invoice.lines {
            *totals.entry(line.item_id.as_str()).or_insert(0) += line.quantity;
        }
        totals
    }
}

/// Rows for one return. `sales_return.return_number` is assigned at commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnPlan {
    pub sales_return: SalesReturn,
    /// One `return` entry per requested line (delta = +qty), in request order.
    pub entries: Vec<LedgerEntry>,
}

impl ReturnPlan {
    /// Units requested per item, summed across lines.
    pub fn requested_by_item(&self) -> BTreeMap<&str, i64> {
        let mut totals = BTreeMap::new();
        for line in &self.sales_return.lines {
            *totals.entry(line.item_id.as_str()).or_insert(0) += line.quantity;
        }
        totals
    }
}

// =============================================================================
// Sales
// =============================================================================

/// Plans a sale against the current catalogue.
///
/// ## Checks (before anything is written)
/// - at least one line, positive quantities, non-negative prices
/// - every item known and active
/// - per item, the combined quantity of its lines ≤ quantity on hand
///
/// Cost is snapshotted from the item's current purchase cost.
pub fn plan_sale(request: &NewInvoice, items: &HashMap<String, Item>, at: DateTime<Utc>) -> CoreResult<SalePlan> {
    validate_new_invoice(request)?;

    for line in &request.lines {
        let item = items.get(&line.item_id).ok_or_else(|| CoreError::UnknownItem {
            id: line.item_id.clone(),
        })?;
        if !item.is_active {
            return Err(CoreError::InactiveItem {
                item: item.name.clone(),
                sku: item.sku.clone(),
            });
        }
    }

    let invoice_id = new_id();
    let mut lines = Vec::with_capacity(request.lines.len());
    let mut entries = Vec::with_capacity(request.lines.len());

    for (index, requested) in request.lines.iter().enumerate() {
        let item = items.get(&requested.item_id).ok_or_else(|| CoreError::UnknownItem {
            id: requested.item_id.clone(),
        })?;
        let unit_price = Money::from_cents(requested.unit_price_cents.unwrap_or(item.unit_price_cents));

        lines.push(InvoiceLine {
            id: new_id(),
            invoice_id: invoice_id.clone(),
            position: index as i64 + 1,
            item_id: item.id.clone(),
            sku_snapshot: item.sku.clone(),
            name_snapshot: item.name.clone(),
            quantity: requested.quantity,
            unit_price_cents: unit_price.cents(),
            unit_cost_cents: item.purchase_cost_cents,
            line_total_cents: unit_price.multiply_quantity(requested.quantity).cents(),
        });

        entries.push(LedgerEntry {
            id: new_id(),
            item_id: item.id.clone(),
            adjustment_type: AdjustmentType::Sale,
            delta: -requested.quantity,
            note: format!("Sale of {} × {}", requested.quantity, item.name),
            actor: request.actor.clone(),
            reference_id: Some(invoice_id.clone()),
            created_at: at,
        });
    }

    let subtotal: Money = lines.iter().map(|l| Money::from_cents(l.line_total_cents)).sum();
    let discount = Money::from_cents(request.discount_cents);

    let plan = SalePlan {
        invoice: Invoice {
            id: invoice_id,
            invoice_number: String::new(),
            customer_name: request
                .customer_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            payment_mode: request.payment_mode,
            subtotal_cents: subtotal.cents(),
            discount_cents: discount.cents(),
            grand_total_cents: (subtotal - discount).floor_zero().cents(),
            actor: request.actor.clone(),
            created_at: at,
            lines,
        },
        entries,
    };

    check_stock(&plan, |id| items.get(id).map(|i| (i.name.clone(), i.sku.clone(), i.quantity)))?;
    Ok(plan)
}

/// Verifies every item in the plan still has enough on hand.
///
/// `lookup` returns `(name, sku, quantity_on_hand)`.
pub fn check_stock<F>(plan: &SalePlan, lookup: F) -> CoreResult<()>
where
    F: Fn(&str) -> Option<(String, String, i64)>,
{
    for (item_id, requested) in plan.requested_by_item() {
        let (item, sku, available) = lookup(item_id).ok_or_else(|| CoreError::UnknownItem {
            id: item_id.to_string(),
        })?;
        if requested > available {
            return Err(CoreError::InsufficientStock {
                item,
                sku,
                available: available.max(0),
                requested,
            });
        }
    }
    Ok(())
}

// =============================================================================
// Returns
// =============================================================================

/// Remaining returnable units per item on an invoice.
///
/// Invoice quantity minus what completed returns already took back;
/// cancelled returns give their units back.
pub fn returnable_quantities(invoice: &Invoice, returns: &[SalesReturn]) -> BTreeMap<String, i64> {
    let mut remaining: BTreeMap<String, i64> = BTreeMap::new();
    for line in &invoice.lines {
        *remaining.entry(line.item_id.clone()).or_insert(0) += line.quantity;
    }
    for ret in returns.iter().filter(|r| r.invoice_id == invoice.id && r.is_completed()) {
        for line in &ret.lines {
            if let Some(r) = remaining.get_mut(&line.item_id) {
                *r -= line.quantity;
            }
        }
    }
    remaining
}

/// Plans a return against an invoice and its earlier returns.
///
/// Each unit is refunded at the price it was sold for; see [`price_return`].
pub fn plan_return(
    request: &NewReturn,
    invoice: &Invoice,
    prior_returns: &[SalesReturn],
    at: DateTime<Utc>,
) -> CoreResult<ReturnPlan> {
    validate_new_return(request)?;

    let return_id = new_id();
    let entries = request
        .lines
        .iter()
        .map(|requested| LedgerEntry {
            id: new_id(),
            item_id: requested.item_id.clone(),
            adjustment_type: AdjustmentType::Return,
            delta: requested.quantity,
            note: format!("Return against {} ({})", invoice.invoice_number, request.reason.label()),
            actor: request.actor.clone(),
            reference_id: Some(return_id.clone()),
            created_at: at,
        })
        .collect();

    let mut plan = ReturnPlan {
        sales_return: SalesReturn {
            id: return_id,
            return_number: String::new(),
            invoice_id: invoice.id.clone(),
            reason: request.reason,
            notes: request
                .notes
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            total_cents: 0,
            status: ReturnStatus::Completed,
            actor: request.actor.clone(),
            created_at: at,
            cancelled_at: None,
            lines: Vec::new(),
        },
        entries,
    };

    price_return(&mut plan, invoice, prior_returns);
    check_returnable(&plan, invoice, &returnable_quantities(invoice, prior_returns))?;
    Ok(plan)
}

/// Rebuilds the plan's refund lines from its `return` entries.
///
/// ```text
///   invoice:  BP-01 ×1 @ 1,000   BP-01 ×1 @ 500
///   return:   BP-01 ×2
///   refund:   ×1 @ 1,000 + ×1 @ 500 = 1,500
/// ```
///
/// Requested units are taken from the invoice lines of the item in invoice
/// order, skipping what completed returns already took. Adjacent takes at
/// the same price share one line. Units beyond what the invoice still
/// holds land on a zero-rate line, which [`check_returnable`] rejects.
pub fn price_return(plan: &mut ReturnPlan, invoice: &Invoice, prior_returns: &[SalesReturn]) {
    let mut open = open_invoice_lines(invoice, prior_returns);
    let return_id = plan.sales_return.id.clone();
    let mut lines: Vec<ReturnLine> = Vec::with_capacity(plan.entries.len());

    for entry in &plan.entries {
        let mut left = entry.delta;
        for (line, remaining) in open.iter_mut() {
            if left == 0 {
                break;
            }
            if line.item_id != entry.item_id || *remaining == 0 {
                continue;
            }
            let taken = left.min(*remaining);
            *remaining -= taken;
            left -= taken;
            push_refund(&mut lines, &return_id, &entry.item_id, taken, line.unit_price_cents);
        }
        if left > 0 {
            push_refund(&mut lines, &return_id, &entry.item_id, left, 0);
        }
    }

    plan.sales_return.total_cents = lines
        .iter()
        .map(|l| Money::from_cents(l.line_total_cents))
        .sum::<Money>()
        .cents();
    plan.sales_return.lines = lines;
}

/// Units still returnable on each invoice line.
///
/// Earlier return lines are matched to invoice lines of the same item and
/// price, in invoice order.
fn open_invoice_lines<'a>(invoice: &'a Invoice, prior_returns: &[SalesReturn]) -> Vec<(&'a InvoiceLine, i64)> {
    let mut open: Vec<(&InvoiceLine, i64)> = invoice.lines.iter().map(|l| (l, l.quantity)).collect();
    let completed = prior_returns
        .iter()
        .filter(|r| r.invoice_id == invoice.id && r.is_completed());

    for taken in completed.flat_map(|r| r.lines.iter()) {
        let mut left = taken.quantity;
        for (line, remaining) in open.iter_mut() {
            if left == 0 {
                break;
            }
            if line.item_id == taken.item_id && line.unit_price_cents == taken.rate_cents {
                let used = left.min(*remaining);
                *remaining -= used;
                left -= used;
            }
        }
    }
    open
}

fn push_refund(lines: &mut Vec<ReturnLine>, return_id: &str, item_id: &str, quantity: i64, rate: i64) {
    if let Some(last) = lines.last_mut() {
        if last.item_id == item_id && last.rate_cents == rate {
            last.quantity += quantity;
            last.line_total_cents = Money::from_cents(rate).multiply_quantity(last.quantity).cents();
            return;
        }
    }
    lines.push(ReturnLine {
        id: new_id(),
        return_id: return_id.to_string(),
        position: lines.len() as i64 + 1,
        item_id: item_id.to_string(),
        quantity,
        rate_cents: rate,
        line_total_cents: Money::from_cents(rate).multiply_quantity(quantity).cents(),
    });
}

/// Verifies no item in the plan exceeds its returnable remainder.
///
/// Items that are not on the invoice have a remainder of zero.
pub fn check_returnable(plan: &ReturnPlan, invoice: &Invoice, returnable: &BTreeMap<String, i64>) -> CoreResult<()> {
    for (item_id, requested) in plan.requested_by_item() {
        let remaining = returnable.get(item_id).copied().unwrap_or(0).max(0);
        if requested > remaining {
            let (item, sku) = invoice
                .lines
                .iter()
                .find(|l| l.item_id == item_id)
                .map(|l| (l.name_snapshot.clone(), l.sku_snapshot.clone()))
                .unwrap_or_else(|| (item_id.to_string(), String::new()));
            return Err(CoreError::ExcessReturnQuantity {
                item,
                sku,
                returnable: remaining,
                requested,
            });
        }
    }
    Ok(())
}

// =============================================================================
// Cancellation
// =============================================================================

/// Offsetting `manual_deduction` entries (−qty per line) for a cancelled return.
pub fn cancellation_entries(ret: &SalesReturn, actor: &str, at: DateTime<Utc>) -> Vec<LedgerEntry> {
    ret.lines
        .iter()
        .map(|line| LedgerEntry {
            id: new_id(),
            item_id: line.item_id.clone(),
            adjustment_type: AdjustmentType::ManualDeduction,
            delta: -line.quantity,
            note: format!("Cancelled return {}", ret.return_number),
            actor: actor.to_string(),
            reference_id: Some(ret.id.clone()),
            created_at: at,
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
