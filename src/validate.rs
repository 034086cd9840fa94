//! Approval state machine: save-time validation and transition guards
//!
//! Every guard here runs before anything touches the store; a failed check
//! means no write happened.

use rust_decimal::Decimal;

use crate::catalog::Catalog;
use crate::costing;
use crate::error::{FieldError, QuoteError};
use crate::quote::{Actor, Quote, QuoteDraft, QuoteStatus};

/// Field-level checks for saving a draft with the given target status.
///
/// DRAFT requires the catalog selections, numeric cost defaults and a numeric
/// discount in [0, 100]. PENDING_APPROVAL additionally requires every item to
/// have a quantity >= 1 and every FIXED row a unit price > 0.
pub fn validate_for_save(
    draft: &QuoteDraft,
    catalog: &Catalog,
    target: QuoteStatus,
) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let master = catalog.cost_master();

    match &draft.company_id {
        None => errors.push(FieldError::form("company_id", "company is required")),
        Some(id) if catalog.company(id).is_none() => {
            errors.push(FieldError::form("company_id", "unknown company"))
        }
        _ => {}
    }
    match &draft.product_id {
        None => errors.push(FieldError::form("product_id", "product is required")),
        Some(id) if catalog.product(id).is_none() => {
            errors.push(FieldError::form("product_id", "unknown product"))
        }
        _ => {}
    }

    for code in master.required_default_codes() {
        if draft.defaults.parsed(code).is_none() {
            errors.push(FieldError::form(code, "default cost must be a number"));
        }
    }

    match costing::parse_decimal(&draft.discount_percent) {
        None => errors.push(FieldError::form(
            "discount_percent",
            "discount is required",
        )),
        Some(d) if d.is_sign_negative() || d > Decimal::ONE_HUNDRED => {
            errors.push(FieldError::form(
                "discount_percent",
                "discount must be between 0 and 100",
            ))
        }
        _ => {}
    }

    for (i, item) in draft.items.iter().enumerate() {
        let entry = master.entry(&item.code);
        if entry.is_none() {
            errors.push(FieldError::item(i, "code", "unknown cost code"));
            continue;
        }

        if target == QuoteStatus::PendingApproval {
            match costing::parse_decimal(&item.quantity) {
                Some(q) if q >= Decimal::ONE => {}
                _ => errors.push(FieldError::item(i, "quantity", "quantity must be at least 1")),
            }
            if entry.is_some_and(|e| e.is_fixed()) {
                match costing::parse_decimal(&item.unit_price) {
                    Some(p) if p > Decimal::ZERO => {}
                    _ => errors.push(FieldError::item(
                        i,
                        "unit_price",
                        "cost is required for fixed items",
                    )),
                }
            }
        }
    }

    errors
}

/// Guard for a status change on an already-persisted version.
///
/// APPROVED beats everything: the version is read-only no matter who asks.
/// Approve and reject act only on the latest PENDING_APPROVAL version and
/// need the approval capability. No other transition is exposed here; drafts
/// move forward by saving a new version, not by flipping status.
pub fn guard_transition(quote: &Quote, target: QuoteStatus, actor: &Actor) -> Result<(), QuoteError> {
    if quote.status == QuoteStatus::Approved {
        return Err(QuoteError::Immutable);
    }

    match target {
        QuoteStatus::Approved | QuoteStatus::Rejected => {
            if quote.status != QuoteStatus::PendingApproval {
                return Err(QuoteError::InvalidTransition {
                    from: quote.status,
                    to: target,
                });
            }
            if !quote.is_latest {
                return Err(QuoteError::NotLatest(quote.id.clone()));
            }
            if !actor.can_approve {
                return Err(QuoteError::Forbidden(actor.id.clone()));
            }
            Ok(())
        }
        QuoteStatus::Draft | QuoteStatus::PendingApproval => Err(QuoteError::InvalidTransition {
            from: quote.status,
            to: target,
        }),
    }
}

/// Guard for extending a group's chain from a given source version. The chain
/// may only grow from a non-approved source; REJECTED forks are fine.
pub fn guard_new_version_source(source_status: QuoteStatus) -> Result<(), QuoteError> {
    if source_status == QuoteStatus::Approved {
        return Err(QuoteError::Immutable);
    }
    Ok(())
}
