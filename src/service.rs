//! Service layer API for quote workflow operations

use rust_decimal::Decimal;

use crate::calc;
use crate::catalog::Catalog;
use crate::costing::{self, Resolve, FIXED, MAN_DAYS, STAY_MAN_DAYS};
use crate::error::QuoteError;
use crate::quote::{
    Actor, AdditionalItemInput, LineItem, Quote, QuoteDraft, QuoteStatus, PRODUCT_BASE,
};
use crate::store::{NewVersion, QuoteStore, VersionSummary};

pub struct QuoteService {
    store: QuoteStore,
    catalog: Catalog,
}

impl QuoteService {
    pub fn new(store: QuoteStore, catalog: Catalog) -> Self {
        Self { store, catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Recompute lines and totals for live preview. Lenient: blank numerics
    /// count as zero, no product means no base line. Only an unknown cost
    /// code errors out.
    pub fn preview(
        &self,
        draft: &QuoteDraft,
    ) -> Result<(Vec<LineItem>, Decimal, Decimal), QuoteError> {
        let product = draft
            .product_id
            .as_deref()
            .and_then(|id| self.catalog.product(id));
        let (lines, subtotal) = calc::compute_lines(
            product,
            &draft.items,
            &draft.defaults,
            self.catalog.cost_master(),
            Resolve::Preview,
        )?;
        let discount = costing::parse_decimal(&draft.discount_percent).unwrap_or(Decimal::ZERO);
        let net = calc::net_total(subtotal, discount);
        Ok((lines, subtotal, net))
    }

    /// Save a draft as a new quote version with the given target status.
    ///
    /// "Save as draft", "submit for approval" and "create new version" all
    /// come through here; a version is only ever born DRAFT or
    /// PENDING_APPROVAL. With a `group_id` the chain is extended, which is
    /// blocked when the group's latest version is APPROVED. Validation runs
    /// before anything is written.
    pub fn save_quote(
        &self,
        draft: &QuoteDraft,
        target: QuoteStatus,
        group_id: Option<&str>,
        actor: &Actor,
    ) -> Result<Quote, QuoteError> {
        if !matches!(target, QuoteStatus::Draft | QuoteStatus::PendingApproval) {
            return Err(QuoteError::InvalidTransition {
                from: QuoteStatus::Draft,
                to: target,
            });
        }

        let errors = crate::validate::validate_for_save(draft, &self.catalog, target);
        if !errors.is_empty() {
            return Err(QuoteError::Validation(errors));
        }

        if let Some(group_id) = group_id {
            if let Some(latest) = self.store.latest(group_id)? {
                crate::validate::guard_new_version_source(latest.status)?;
            }
        }

        // validation guaranteed both selections resolve
        let product_id = draft.product_id.as_deref().unwrap_or_default();
        let company_id = draft.company_id.as_deref().unwrap_or_default();
        let product = self
            .catalog
            .product(product_id)
            .ok_or_else(|| QuoteError::NotFound(product_id.to_owned()))?;

        let (lines, subtotal) = calc::compute_lines(
            Some(product),
            &draft.items,
            &draft.defaults,
            self.catalog.cost_master(),
            Resolve::Strict,
        )?;
        let discount_percent = costing::parse_decimal(&draft.discount_percent).ok_or_else(|| {
            QuoteError::Validation(vec![crate::error::FieldError::form(
                "discount_percent",
                "discount is required",
            )])
        })?;
        let net_total = calc::net_total(subtotal, discount_percent);

        let fields = NewVersion {
            status: target,
            company_id: company_id.to_owned(),
            product_id: product_id.to_owned(),
            discount_percent,
            subtotal,
            net_total,
            fixed_cost: draft.defaults.parsed(FIXED),
            man_days_cost: draft.defaults.numeric_or_zero(MAN_DAYS),
            stay_man_days_cost: draft.defaults.numeric_or_zero(STAY_MAN_DAYS),
            created_by: actor.id.clone(),
        };

        self.store.create_version(group_id, fields, lines)
    }

    /// Approve the latest pending version of a group. Requires the approval
    /// capability; APPROVED versions are immutable regardless of capability.
    pub fn approve(&self, quote_id: &str, actor: &Actor) -> Result<Quote, QuoteError> {
        self.store
            .transition_status(quote_id, QuoteStatus::Approved, actor)
    }

    /// Reject the latest pending version of a group. A rejected version stays
    /// in the chain and may still be forked into a new version.
    pub fn reject(&self, quote_id: &str, actor: &Actor) -> Result<Quote, QuoteError> {
        self.store
            .transition_status(quote_id, QuoteStatus::Rejected, actor)
    }

    pub fn transition_status(
        &self,
        quote_id: &str,
        target: QuoteStatus,
        actor: &Actor,
    ) -> Result<Quote, QuoteError> {
        self.store.transition_status(quote_id, target, actor)
    }

    /// Prefill a draft for "create new version" from an existing version.
    /// Blocked when the source is APPROVED. Cost defaults are snapshotted
    /// from the group's most recent version, not from the source.
    pub fn draft_for_new_version(
        &self,
        source_quote_id: &str,
    ) -> Result<(QuoteDraft, String), QuoteError> {
        let source = self.store.get(source_quote_id)?;
        crate::validate::guard_new_version_source(source.status)?;

        let items = self
            .store
            .lines(source_quote_id)?
            .into_iter()
            .filter(|line| line.item_type != PRODUCT_BASE)
            .map(|line| AdditionalItemInput {
                code: line.item_type,
                description: line.description.unwrap_or_default(),
                quantity: line.quantity.to_string(),
                unit_price: line.unit_price.to_string(),
            })
            .collect();

        let snapshot = self
            .store
            .latest(&source.quote_group_id)?
            .unwrap_or_else(|| source.clone());
        let mut defaults = crate::costing::CostDefaults::new()
            .with(MAN_DAYS, &snapshot.man_days_cost.to_string())
            .with(STAY_MAN_DAYS, &snapshot.stay_man_days_cost.to_string());
        if let Some(fixed) = snapshot.fixed_cost {
            defaults.set(FIXED, &fixed.to_string());
        }

        let draft = QuoteDraft {
            company_id: Some(source.company_id.clone()),
            product_id: Some(source.product_id.clone()),
            discount_percent: source.discount_percent.to_string(),
            items,
            defaults,
        };

        Ok((draft, source.quote_group_id))
    }

    pub fn quote_details(&self, quote_id: &str) -> Result<(Quote, Vec<LineItem>), QuoteError> {
        Ok((self.store.get(quote_id)?, self.store.lines(quote_id)?))
    }

    pub fn latest_version(&self, group_id: &str) -> Result<Option<Quote>, QuoteError> {
        self.store.latest(group_id)
    }

    pub fn version_history(&self, group_id: &str) -> Result<Vec<VersionSummary>, QuoteError> {
        self.store.history(group_id)
    }
}
