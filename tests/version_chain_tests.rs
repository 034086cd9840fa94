//! Version chain invariant tests
//!
//! These exercise the three coupled invariants of the store: exactly one
//! latest version per group, gapless monotonically increasing version
//! numbers, and no mutation once a version is approved. The concurrency
//! tests hammer one group from several threads; losing any of these
//! invariants under contention corrupts the audit trail.

use anyhow::Context;
use rust_decimal_macros::dec;
use sled::open;
use std::collections::BTreeSet;
use std::sync::{Arc, Barrier};
use std::thread;

use quote_approval::{
    error::QuoteError,
    quote::{Actor, LineItem, QuoteStatus, PRODUCT_BASE},
    store::{NewVersion, QuoteStore},
    utils,
};

use tempfile::tempdir;

fn base_fields(status: QuoteStatus) -> NewVersion {
    NewVersion {
        status,
        company_id: "company_acme".into(),
        product_id: "product_erp".into(),
        discount_percent: dec!(10),
        subtotal: dec!(52000),
        net_total: dec!(46800),
        fixed_cost: Some(dec!(1000)),
        man_days_cost: dec!(1000),
        stay_man_days_cost: dec!(500),
        created_by: "user_test".into(),
    }
}

fn base_lines() -> Vec<LineItem> {
    vec![LineItem {
        item_type: PRODUCT_BASE.into(),
        label: "ERP Suite".into(),
        description: None,
        quantity: dec!(1),
        unit_price: dec!(50000),
        line_total: dec!(50000),
        sort_order: 0,
    }]
}

#[test]
fn version_numbers_are_gapless_and_labels_derived() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db = Arc::new(open(temp_dir.path().join("gapless.db"))?);
    db.clear()?;
    let store = QuoteStore::new(db);

    let v0 = store.create_version(None, base_fields(QuoteStatus::Draft), base_lines())?;
    let group_id = v0.quote_group_id.clone();

    for expected in 1..=4u32 {
        let v = store.create_version(
            Some(&group_id),
            base_fields(QuoteStatus::Draft),
            base_lines(),
        )?;
        assert_eq!(v.version_number, expected);
        assert!(v.is_latest);
        assert!(v.version_label.starts_with(&format!("V{expected}/")));
    }

    let versions = store.versions(&group_id)?;
    let numbers: Vec<u32> = versions.iter().map(|(q, _)| q.version_number).collect();
    assert_eq!(numbers, vec![0, 1, 2, 3, 4]);

    let latest_count = versions.iter().filter(|(q, _)| q.is_latest).count();
    assert_eq!(latest_count, 1);
    assert!(versions.last().unwrap().0.is_latest);

    Ok(())
}

#[test]
fn provided_group_id_with_no_versions_starts_at_zero() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db = Arc::new(open(temp_dir.path().join("fresh_group.db"))?);
    db.clear()?;
    let store = QuoteStore::new(db);

    let group_id = utils::new_uuid_to_bech32("qgrp")?;
    let v = store.create_version(
        Some(&group_id),
        base_fields(QuoteStatus::Draft),
        base_lines(),
    )?;

    assert_eq!(v.version_number, 0);
    assert_eq!(v.quote_group_id, group_id);

    Ok(())
}

#[test]
fn concurrent_appends_keep_the_chain_consistent() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db = Arc::new(open(temp_dir.path().join("concurrent.db"))?);
    db.clear()?;
    let store = Arc::new(QuoteStore::new(db));

    let v0 = store.create_version(None, base_fields(QuoteStatus::Draft), base_lines())?;
    let group_id = v0.quote_group_id.clone();

    const WRITERS: usize = 8;
    let mut handles = Vec::new();
    for _ in 0..WRITERS {
        let store = Arc::clone(&store);
        let group_id = group_id.clone();
        handles.push(thread::spawn(move || {
            store.create_version(
                Some(&group_id),
                base_fields(QuoteStatus::Draft),
                base_lines(),
            )
        }));
    }

    let mut allocated = BTreeSet::new();
    for handle in handles {
        let quote = handle
            .join()
            .expect("writer thread panicked")
            .context("concurrent create_version failed")?;
        // no duplicate version numbers across the winners
        assert!(allocated.insert(quote.version_number));
    }

    let versions = store.versions(&group_id)?;
    let numbers: Vec<u32> = versions.iter().map(|(q, _)| q.version_number).collect();
    let expected: Vec<u32> = (0..=WRITERS as u32).collect();
    assert_eq!(numbers, expected, "version numbers must be gapless");

    let latest: Vec<_> = versions.iter().filter(|(q, _)| q.is_latest).collect();
    assert_eq!(latest.len(), 1, "exactly one latest per group");
    assert_eq!(latest[0].0.version_number, WRITERS as u32);

    // every version kept its line items
    for (_, lines) in &versions {
        assert_eq!(lines.len(), 1);
    }

    Ok(())
}

#[test]
fn concurrent_appends_to_distinct_groups_do_not_interfere() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db = Arc::new(open(temp_dir.path().join("many_groups.db"))?);
    db.clear()?;
    let store = Arc::new(QuoteStore::new(db));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            let v0 = store.create_version(None, base_fields(QuoteStatus::Draft), base_lines())?;
            let gid = v0.quote_group_id.clone();
            for _ in 0..3 {
                store.create_version(Some(&gid), base_fields(QuoteStatus::Draft), base_lines())?;
            }
            Ok::<String, QuoteError>(gid)
        }));
    }

    for handle in handles {
        let group_id = handle.join().expect("writer thread panicked")?;
        let versions = store.versions(&group_id)?;
        let numbers: Vec<u32> = versions.iter().map(|(q, _)| q.version_number).collect();
        assert_eq!(numbers, vec![0, 1, 2, 3]);
        assert_eq!(versions.iter().filter(|(q, _)| q.is_latest).count(), 1);
    }

    Ok(())
}

#[test]
fn separate_store_handles_sharing_a_db_keep_the_chain_consistent() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db = Arc::new(open(temp_dir.path().join("two_handles.db"))?);
    db.clear()?;
    // two stores over one db: they share the data but not the in-process
    // group locks, so only the index reservation arbitrates between them
    let store_a = Arc::new(QuoteStore::new(Arc::clone(&db)));
    let store_b = Arc::new(QuoteStore::new(Arc::clone(&db)));

    let v0 = store_a.create_version(None, base_fields(QuoteStatus::Draft), base_lines())?;
    let group_id = v0.quote_group_id.clone();

    for _ in 0..20 {
        let barrier = Arc::new(Barrier::new(2));
        let mut handles = Vec::new();
        for store in [Arc::clone(&store_a), Arc::clone(&store_b)] {
            let barrier = Arc::clone(&barrier);
            let group_id = group_id.clone();
            handles.push(thread::spawn(move || {
                barrier.wait();
                store.create_version(
                    Some(&group_id),
                    base_fields(QuoteStatus::Draft),
                    base_lines(),
                )
            }));
        }

        for handle in handles {
            match handle.join().expect("writer thread panicked") {
                Ok(_) => {}
                // the loser backs out and reports the group to retry on
                Err(QuoteError::ConcurrencyConflict(gid)) => assert_eq!(gid, group_id),
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        let versions = store_a.versions(&group_id)?;
        let numbers: Vec<u32> = versions.iter().map(|(q, _)| q.version_number).collect();
        let expected: Vec<u32> = (0..versions.len() as u32).collect();
        assert_eq!(numbers, expected, "version numbers must be gapless");
        assert_eq!(
            versions.iter().filter(|(q, _)| q.is_latest).count(),
            1,
            "exactly one latest per group"
        );
        assert!(versions.last().unwrap().0.is_latest);
    }

    Ok(())
}

#[test]
fn approved_latest_blocks_chain_extension_at_the_store() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db = Arc::new(open(temp_dir.path().join("approved_freezes.db"))?);
    db.clear()?;
    let store = QuoteStore::new(db);

    let v0 = store.create_version(
        None,
        base_fields(QuoteStatus::PendingApproval),
        base_lines(),
    )?;
    let gid = v0.quote_group_id.clone();
    store.transition_status(&v0.id, QuoteStatus::Approved, &Actor::approver("user_approver"))?;

    // the store itself re-checks under its lock, so even a caller whose own
    // status check raced the approval cannot extend the chain
    let err = store
        .create_version(Some(&gid), base_fields(QuoteStatus::Draft), base_lines())
        .unwrap_err();
    assert!(matches!(err, QuoteError::Immutable));

    let versions = store.versions(&gid)?;
    assert_eq!(versions.len(), 1);
    assert!(versions[0].0.is_latest);

    Ok(())
}

#[test]
fn transition_changes_only_status_and_timestamp() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db = Arc::new(open(temp_dir.path().join("transition.db"))?);
    db.clear()?;
    let store = QuoteStore::new(db);

    let pending = store.create_version(
        None,
        base_fields(QuoteStatus::PendingApproval),
        base_lines(),
    )?;

    let approver = Actor::approver("user_approver");
    let approved = store.transition_status(&pending.id, QuoteStatus::Approved, &approver)?;

    assert_eq!(approved.status, QuoteStatus::Approved);
    assert_eq!(approved.version_number, pending.version_number);
    assert_eq!(approved.subtotal, pending.subtotal);
    assert_eq!(approved.net_total, pending.net_total);
    assert_eq!(approved.created_at, pending.created_at);

    // line items untouched
    assert_eq!(store.lines(&approved.id)?, base_lines());

    Ok(())
}

#[test]
fn history_is_newest_first() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db = Arc::new(open(temp_dir.path().join("history.db"))?);
    db.clear()?;
    let store = QuoteStore::new(db);

    let v0 = store.create_version(None, base_fields(QuoteStatus::Draft), base_lines())?;
    let gid = v0.quote_group_id.clone();
    let v1 = store.create_version(Some(&gid), base_fields(QuoteStatus::Draft), base_lines())?;
    let v2 = store.create_version(
        Some(&gid),
        base_fields(QuoteStatus::PendingApproval),
        base_lines(),
    )?;

    let history = store.history(&gid)?;
    let ids: Vec<_> = history.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec![v2.id.as_str(), v1.id.as_str(), v0.id.as_str()]);
    assert_eq!(history[0].status, QuoteStatus::PendingApproval);
    assert_eq!(history[0].net_total, dec!(46800));

    Ok(())
}
