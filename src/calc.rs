//! Pure line-item and totals calculation
//!
//! No I/O and no mutation of inputs; the same inputs always produce the same
//! lines. Callers run this on every keystroke for live preview
//! (`Resolve::Preview`) and once more, strictly, at save time.

use rust_decimal::Decimal;

use crate::catalog::{CostMaster, Product};
use crate::costing::{self, CostDefaults, Resolve};
use crate::error::QuoteError;
use crate::quote::{AdditionalItemInput, LineItem, PRODUCT_BASE};

/// Derive the priced lines for a product plus its additional items, and the
/// subtotal over all of them.
///
/// The product line sits at sort_order 0 with quantity 1; additional items
/// follow at 1..n in input order. In preview mode a missing product is
/// tolerated (no base line); save paths always pass one.
pub fn compute_lines(
    product: Option<&Product>,
    items: &[AdditionalItemInput],
    defaults: &CostDefaults,
    master: &CostMaster,
    mode: Resolve,
) -> Result<(Vec<LineItem>, Decimal), QuoteError> {
    let mut lines = Vec::with_capacity(items.len() + 1);

    if let Some(product) = product {
        lines.push(LineItem {
            item_type: PRODUCT_BASE.into(),
            label: product.name.clone(),
            description: None,
            quantity: Decimal::ONE,
            unit_price: product.base_price,
            line_total: product.base_price,
            sort_order: 0,
        });
    }

    for (i, item) in items.iter().enumerate() {
        let unit_price = costing::resolve_unit_price(item, defaults, master, mode)?;
        // blank quantities price to zero in preview; the state machine
        // rejects them before any strict save gets this far
        let quantity = costing::parse_decimal(&item.quantity).unwrap_or(Decimal::ZERO);
        let label = master
            .entry(&item.code)
            .map(|e| e.label.clone())
            .unwrap_or_else(|| item.code.clone());

        lines.push(LineItem {
            item_type: item.code.clone(),
            label,
            description: if item.description.is_empty() {
                None
            } else {
                Some(item.description.clone())
            },
            quantity,
            unit_price,
            line_total: quantity * unit_price,
            sort_order: (i + 1) as u32,
        });
    }

    let subtotal = lines.iter().map(|l| l.line_total).sum();
    Ok((lines, subtotal))
}

/// `subtotal * (1 - discount/100)`. No clamping: range validation belongs to
/// the save-time checks, and preview must be able to show intermediate
/// out-of-range input without crashing.
pub fn net_total(subtotal: Decimal, discount_percent: Decimal) -> Decimal {
    subtotal * (Decimal::ONE - discount_percent / Decimal::ONE_HUNDRED)
}
