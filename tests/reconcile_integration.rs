// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! End-to-end reconciliation tests: ingress events flow through the handler
//! and the batch/prune/apply loop into a mock zone.
//!
//! Configuration throughout: target label `tier`, targets
//! `["public", "private"]`, zone apex `example.com.`. The mock resolver
//! reports an empty answer unless a test states otherwise.

mod common;

use common::{build_registrar, drain_queue, test_ingress, MockResolver, MockZone};
use registrar::ingress::OwnershipIndex;
use registrar::metrics;
use registrar::record::{ChangeAction, CnameRecord};
use registrar::watcher::{IngressEvent, IngressEventHandler};
use std::sync::Arc;

#[tokio::test]
async fn test_added_ingress_upserts_all_hostnames() {
    let zone = MockZone::new("example.com.");
    let resolver = MockResolver::empty();
    let (registrar, queue_rx) = build_registrar(
        zone.clone(),
        resolver,
        Arc::new(OwnershipIndex::new()),
    );

    let ingress = test_ingress(
        "exampleA",
        &[("tier", "private")],
        &["foo1.example.com", "foo2.example.com"],
    );
    registrar.handle(IngressEvent::Added(ingress)).await;
    drain_queue(registrar, queue_rx).await;

    let calls = zone.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, ChangeAction::Upsert);
    assert_eq!(
        calls[0].1,
        vec![
            CnameRecord::new("foo1.example.com", "private"),
            CnameRecord::new("foo2.example.com", "private"),
        ]
    );
}

#[tokio::test]
async fn test_deleted_ingress_withdraws_present_records() {
    let zone = MockZone::new("example.com.");
    let resolver = MockResolver::empty();
    // the zone already holds both records and the resolver can see them
    resolver.answer("foo1.example.com", "private.");
    resolver.answer("foo2.example.com", "private.");
    let (registrar, queue_rx) = build_registrar(
        zone.clone(),
        resolver,
        Arc::new(OwnershipIndex::new()),
    );

    let ingress = test_ingress(
        "exampleA",
        &[("tier", "private")],
        &["foo1.example.com", "foo2.example.com"],
    );
    registrar.handle(IngressEvent::Deleted(ingress)).await;
    drain_queue(registrar, queue_rx).await;

    let calls = zone.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, ChangeAction::Delete);
    assert_eq!(
        calls[0].1,
        vec![
            CnameRecord::new("foo1.example.com", "private"),
            CnameRecord::new("foo2.example.com", "private"),
        ]
    );
}

#[tokio::test]
async fn test_deleted_ingress_with_absent_records_is_a_noop() {
    let zone = MockZone::new("example.com.");
    let (registrar, queue_rx) = build_registrar(
        zone.clone(),
        MockResolver::empty(),
        Arc::new(OwnershipIndex::new()),
    );

    let ingress = test_ingress(
        "exampleA",
        &[("tier", "private")],
        &["foo1.example.com", "foo2.example.com"],
    );
    registrar.handle(IngressEvent::Deleted(ingress)).await;
    drain_queue(registrar, queue_rx).await;

    assert!(zone.calls().is_empty());
}

#[tokio::test]
async fn test_target_change_is_reflected_via_upsert_only() {
    let zone = MockZone::new("example.com.");
    let (registrar, queue_rx) = build_registrar(
        zone.clone(),
        MockResolver::empty(),
        Arc::new(OwnershipIndex::new()),
    );

    let old = test_ingress("exampleA", &[("tier", "private")], &["foo.example.com"]);
    let new = test_ingress("exampleA", &[("tier", "public")], &["foo.example.com"]);
    registrar.handle(IngressEvent::Modified { old, new }).await;
    drain_queue(registrar, queue_rx).await;

    let calls = zone.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, ChangeAction::Upsert);
    assert_eq!(calls[0].1, vec![CnameRecord::new("foo.example.com", "public")]);
}

#[tokio::test]
async fn test_resync_with_unchanged_ingress_is_suppressed() {
    let zone = MockZone::new("example.com.");
    let (registrar, queue_rx) = build_registrar(
        zone.clone(),
        MockResolver::empty(),
        Arc::new(OwnershipIndex::new()),
    );

    let ingress = test_ingress("exampleA", &[("tier", "private")], &["foo.example.com"]);
    registrar
        .handle(IngressEvent::Modified {
            old: ingress.clone(),
            new: ingress,
        })
        .await;
    drain_queue(registrar, queue_rx).await;

    assert!(zone.calls().is_empty());
}

#[tokio::test]
async fn test_delete_is_withheld_while_another_ingress_claims_the_hostname() {
    let zone = MockZone::new("example.com.");
    let resolver = MockResolver::empty();
    resolver.answer("shared.example.com", "private.");
    let ownership = Arc::new(OwnershipIndex::new());
    // another live ingress still lists the hostname
    ownership.insert(&test_ingress(
        "exampleB",
        &[("tier", "private")],
        &["shared.example.com"],
    ));
    let (registrar, queue_rx) = build_registrar(zone.clone(), resolver, ownership);

    let ingress = test_ingress(
        "exampleA",
        &[("tier", "private")],
        &["shared.example.com"],
    );
    registrar.handle(IngressEvent::Deleted(ingress)).await;
    drain_queue(registrar, queue_rx).await;

    assert!(zone.calls().is_empty());
}

#[tokio::test]
async fn test_modified_ingress_removes_dropped_hostnames() {
    let zone = MockZone::new("example.com.");
    let resolver = MockResolver::empty();
    resolver.answer("gone.example.com", "private.");
    let (registrar, queue_rx) = build_registrar(
        zone.clone(),
        resolver,
        Arc::new(OwnershipIndex::new()),
    );

    let old = test_ingress(
        "exampleA",
        &[("tier", "private")],
        &["keep.example.com", "gone.example.com"],
    );
    let new = test_ingress("exampleA", &[("tier", "private")], &["keep.example.com"]);
    registrar.handle(IngressEvent::Modified { old, new }).await;
    drain_queue(registrar, queue_rx).await;

    let calls = zone.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, ChangeAction::Upsert);
    assert_eq!(calls[0].1, vec![CnameRecord::new("keep.example.com", "private")]);
    assert_eq!(calls[1].0, ChangeAction::Delete);
    assert_eq!(calls[1].1, vec![CnameRecord::new("gone.example.com", "private")]);
}

#[tokio::test]
async fn test_identical_duplicate_records_collapse_to_one() {
    let zone = MockZone::new("example.com.");
    let (registrar, queue_rx) = build_registrar(
        zone.clone(),
        MockResolver::empty(),
        Arc::new(OwnershipIndex::new()),
    );

    // two ingresses claim the same hostname with the same target
    let a = test_ingress("exampleA", &[("tier", "private")], &["dup.example.com"]);
    let b = test_ingress("exampleB", &[("tier", "private")], &["dup.example.com"]);
    registrar.handle(IngressEvent::Added(a)).await;
    registrar.handle(IngressEvent::Added(b)).await;
    drain_queue(registrar, queue_rx).await;

    let calls = zone.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, vec![CnameRecord::new("dup.example.com", "private")]);
}

#[tokio::test]
async fn test_upsert_is_suppressed_when_zone_already_matches() {
    let zone = MockZone::new("example.com.");
    let resolver = MockResolver::empty();
    resolver.answer("foo.example.com", "private.");
    let (registrar, queue_rx) = build_registrar(
        zone.clone(),
        resolver,
        Arc::new(OwnershipIndex::new()),
    );

    let ingress = test_ingress("exampleA", &[("tier", "private")], &["foo.example.com"]);
    registrar.handle(IngressEvent::Added(ingress)).await;
    drain_queue(registrar, queue_rx).await;

    assert!(zone.calls().is_empty());
}

// Counter deltas are asserted in a single test because the counter is
// process-wide and tests run concurrently; no other test in this binary
// rejects records.
#[tokio::test]
async fn test_rejections_are_counted() {
    let before = metrics::UPDATES_REJECTED_TOTAL.get();

    // conflicting claims: two live ingresses, same hostname, different targets
    let zone = MockZone::new("example.com.");
    let (registrar, queue_rx) = build_registrar(
        zone.clone(),
        MockResolver::empty(),
        Arc::new(OwnershipIndex::new()),
    );
    let a = test_ingress("exampleA", &[("tier", "public")], &["shared.example.com"]);
    let b = test_ingress("exampleB", &[("tier", "private")], &["shared.example.com"]);
    registrar.handle(IngressEvent::Added(a)).await;
    registrar.handle(IngressEvent::Added(b)).await;
    drain_queue(registrar, queue_rx).await;

    assert!(zone.calls().is_empty());
    assert_eq!(metrics::UPDATES_REJECTED_TOTAL.get(), before + 2);

    // out-of-zone hostname: nested one label too deep under the apex
    let zone = MockZone::new("example.com.");
    let (registrar, queue_rx) = build_registrar(
        zone.clone(),
        MockResolver::empty(),
        Arc::new(OwnershipIndex::new()),
    );
    let ingress = test_ingress(
        "exampleC",
        &[("tier", "private")],
        &["wrong.sub.example.com"],
    );
    registrar.handle(IngressEvent::Added(ingress)).await;
    drain_queue(registrar, queue_rx).await;

    assert!(zone.calls().is_empty());
    assert_eq!(metrics::UPDATES_REJECTED_TOTAL.get(), before + 3);
}

#[tokio::test]
async fn test_zone_contents_track_ingress_lifecycle() {
    let zone = MockZone::new("example.com.");
    let resolver = MockResolver::empty();
    let (registrar, queue_rx) = build_registrar(
        zone.clone(),
        resolver.clone(),
        Arc::new(OwnershipIndex::new()),
    );

    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(registrar.clone().process_update_queue(queue_rx, stop_rx));

    // create
    let v1 = test_ingress("exampleA", &[("tier", "private")], &["foo.example.com"]);
    registrar.handle(IngressEvent::Added(v1.clone())).await;
    tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    assert_eq!(
        zone.data().get("foo.example.com"),
        Some(&"private".to_string())
    );
    resolver.answer("foo.example.com", "private.");

    // move to a new hostname
    let v2 = test_ingress("exampleA", &[("tier", "private")], &["bar.example.com"]);
    registrar
        .handle(IngressEvent::Modified {
            old: v1,
            new: v2.clone(),
        })
        .await;
    tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    assert_eq!(
        zone.data().get("bar.example.com"),
        Some(&"private".to_string())
    );
    assert_eq!(zone.data().get("foo.example.com"), None);
    resolver.clear("foo.example.com");
    resolver.answer("bar.example.com", "private.");

    // delete
    registrar.handle(IngressEvent::Deleted(v2)).await;
    tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    assert!(zone.data().is_empty());

    stop_tx.send(true).expect("reconciler is listening");
    handle.await.expect("reconciler loop completes");
}
