//! Append-only quote version store over sled
//!
//! One record per quote version plus its line items, and a per-group index
//! keyed so that a prefix scan walks versions in order:
//!
//!   quote/{quote_id}            -> cbor(Quote)
//!   lines/{quote_id}            -> cbor(Vec<LineItem>)
//!   group/{group_id}/{version}  -> quote_id (version zero-padded)
//!
//! Appending a version is a read-modify-write (max version, current latest),
//! so the store serializes writers per group, lands the records in a single
//! batch and then claims the index slot with a compare-and-swap. The swap is
//! what arbitrates between writers on separate store handles, which share the
//! db but not the in-process locks. Readers never take the lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use rust_decimal::Decimal;
use sled::Batch;

use crate::error::QuoteError;
use crate::quote::{version_label, Actor, LineItem, Quote, QuoteStatus, TimeStamp};
use crate::utils;
use crate::validate;

const QUOTE_HRP: &str = "quote";
const GROUP_HRP: &str = "qgrp";

fn quote_key(id: &str) -> String {
    format!("quote/{id}")
}
fn lines_key(id: &str) -> String {
    format!("lines/{id}")
}
fn group_prefix(group_id: &str) -> String {
    format!("group/{group_id}/")
}
fn group_key(group_id: &str, version_number: u32) -> String {
    // zero-padded so lexicographic key order is version order
    format!("group/{group_id}/{version_number:010}")
}

fn encode<T: minicbor::Encode<()>>(value: T) -> Result<Vec<u8>, QuoteError> {
    minicbor::to_vec(value).map_err(|e| QuoteError::Persistence(e.to_string()))
}

fn decode_record<T: for<'b> minicbor::Decode<'b, ()>>(bytes: &[u8]) -> Result<T, QuoteError> {
    minicbor::decode(bytes).map_err(|e| QuoteError::Persistence(e.to_string()))
}

/// Financial fields captured once at save time for a new version.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub status: QuoteStatus,
    pub company_id: String,
    pub product_id: String,
    pub discount_percent: Decimal,
    pub subtotal: Decimal,
    pub net_total: Decimal,
    pub fixed_cost: Option<Decimal>,
    pub man_days_cost: Decimal,
    pub stay_man_days_cost: Decimal,
    pub created_by: String,
}

/// Row of the version-history projection, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionSummary {
    pub id: String,
    pub version_label: String,
    pub status: QuoteStatus,
    pub net_total: Decimal,
    pub updated_at: TimeStamp<Utc>,
}

pub struct QuoteStore {
    instance: Arc<sled::Db>,
    // lazily created, one lock per quote group
    group_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl QuoteStore {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self {
            instance,
            group_locks: Mutex::new(HashMap::new()),
        }
    }

    fn group_lock(&self, group_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .group_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(group_id.to_owned()).or_default().clone()
    }

    /// Append a new version. `group_id = None` starts a fresh group at
    /// version 0; otherwise the next gapless version number is allocated, the
    /// current latest is demoted and the new quote plus its lines land in one
    /// atomic batch, after which the group-index slot is claimed with a
    /// compare-and-swap. Writers for the same group are serialized in
    /// process; a lost swap against a writer on another store handle backs
    /// the records out and returns `ConcurrencyConflict`. An approved latest
    /// freezes the chain.
    pub fn create_version(
        &self,
        group_id: Option<&str>,
        fields: NewVersion,
        lines: Vec<LineItem>,
    ) -> Result<Quote, QuoteError> {
        let group_id = match group_id {
            Some(g) => g.to_owned(),
            None => utils::new_id(GROUP_HRP),
        };

        let lock = self.group_lock(&group_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let current_latest = self.latest(&group_id)?;
        if let Some(latest) = &current_latest {
            // checked again under the lock: an approved latest freezes the
            // chain even when the caller's own check raced a transition
            validate::guard_new_version_source(latest.status)?;
        }
        let version_number = match &current_latest {
            Some(latest) => latest.version_number + 1,
            None => 0,
        };
        let gkey = group_key(&group_id, version_number);

        let now = TimeStamp::now();
        let id = utils::new_id(QUOTE_HRP);
        let quote = Quote {
            id: id.clone(),
            quote_group_id: group_id,
            version_number,
            version_label: version_label(version_number, &now),
            is_latest: true,
            status: fields.status,
            company_id: fields.company_id,
            product_id: fields.product_id,
            discount_percent: fields.discount_percent,
            subtotal: fields.subtotal,
            net_total: fields.net_total,
            fixed_cost: fields.fixed_cost,
            man_days_cost: fields.man_days_cost,
            stay_man_days_cost: fields.stay_man_days_cost,
            created_at: now.clone(),
            updated_at: now,
            created_by: fields.created_by,
        };

        let mut batch = Batch::default();
        if let Some(mut previous) = current_latest {
            previous.is_latest = false;
            batch.insert(quote_key(&previous.id).into_bytes(), encode(&previous)?);
        }
        batch.insert(quote_key(&id).into_bytes(), encode(&quote)?);
        batch.insert(lines_key(&id).into_bytes(), encode(&lines)?);
        self.instance.apply_batch(batch)?;

        // the records land first; the index slot is then claimed atomically.
        // Losing the swap means a writer on another store handle allocated
        // this version number: back the records out and ask for a retry.
        let reserved =
            self.instance
                .compare_and_swap(gkey.as_bytes(), None::<&[u8]>, Some(id.as_bytes()))?;
        if reserved.is_err() {
            self.instance.remove(quote_key(&id).into_bytes())?;
            self.instance.remove(lines_key(&id).into_bytes())?;
            return Err(QuoteError::ConcurrencyConflict(quote.quote_group_id));
        }

        Ok(quote)
    }

    /// Apply a status transition to a persisted version. All guards run
    /// before the write; only `status` and `updated_at` ever change here.
    pub fn transition_status(
        &self,
        quote_id: &str,
        target: QuoteStatus,
        actor: &Actor,
    ) -> Result<Quote, QuoteError> {
        let group_id = self.get(quote_id)?.quote_group_id;

        let lock = self.group_lock(&group_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // reload under the lock so the guard sees current state
        let mut quote = self.get(quote_id)?;
        validate::guard_transition(&quote, target, actor)?;

        quote.status = target;
        quote.updated_at = TimeStamp::now();
        self.instance
            .insert(quote_key(quote_id).into_bytes(), encode(&quote)?)?;

        Ok(quote)
    }

    pub fn get(&self, quote_id: &str) -> Result<Quote, QuoteError> {
        let bytes = self
            .instance
            .get(quote_key(quote_id).into_bytes())?
            .ok_or_else(|| QuoteError::NotFound(quote_id.to_owned()))?;
        decode_record(&bytes)
    }

    pub fn lines(&self, quote_id: &str) -> Result<Vec<LineItem>, QuoteError> {
        let bytes = self
            .instance
            .get(lines_key(quote_id).into_bytes())?
            .ok_or_else(|| QuoteError::NotFound(quote_id.to_owned()))?;
        decode_record(&bytes)
    }

    /// Current latest version of a group, None for an unknown/empty group.
    pub fn latest(&self, group_id: &str) -> Result<Option<Quote>, QuoteError> {
        match self
            .instance
            .scan_prefix(group_prefix(group_id).into_bytes())
            .last()
        {
            Some(entry) => {
                let (_, id_bytes) = entry?;
                self.get(&index_value(&id_bytes)?).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Full version history of a group, newest first.
    pub fn history(&self, group_id: &str) -> Result<Vec<VersionSummary>, QuoteError> {
        let mut summaries = Vec::new();
        for entry in self
            .instance
            .scan_prefix(group_prefix(group_id).into_bytes())
        {
            let (_, id_bytes) = entry?;
            let quote = self.get(&index_value(&id_bytes)?)?;
            summaries.push(VersionSummary {
                id: quote.id,
                version_label: quote.version_label,
                status: quote.status,
                net_total: quote.net_total,
                updated_at: quote.updated_at,
            });
        }
        summaries.reverse();
        Ok(summaries)
    }

    /// Every version of a group in version order, with line items.
    pub fn versions(&self, group_id: &str) -> Result<Vec<(Quote, Vec<LineItem>)>, QuoteError> {
        let mut versions = Vec::new();
        for entry in self
            .instance
            .scan_prefix(group_prefix(group_id).into_bytes())
        {
            let (_, id_bytes) = entry?;
            let id = index_value(&id_bytes)?;
            versions.push((self.get(&id)?, self.lines(&id)?));
        }
        Ok(versions)
    }
}

fn index_value(bytes: &[u8]) -> Result<String, QuoteError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| QuoteError::Persistence("corrupt group index entry".into()))
}
