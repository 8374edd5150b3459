//! Concurrent callers, failed commits and timeouts.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

use futures::future::join_all;
use pasajes_core::model::RequestType;
use pasajes_core::sequence::DocumentType;
use pasajes_core::state::QuotaItemState;
use pasajes_core::{Error, Result};
use pasajes_testing::{Harness, RequestBuilder, at};
use std::collections::BTreeSet;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_item_is_reserved_by_exactly_one_request() {
    let h = Harness::start().await;
    let item = h.items_held_by(h.roster.titular.id).await[1].clone();

    let attempts = (0..8).map(|_| {
        let engine = h.engine.clone();
        let actor = h.roster.titular_actor();
        let new = RequestBuilder::quota(h.roster.titular.id)
            .one_way("LPB", "SRZ", at(2025, 1, 9, 7))
            .item(item.id)
            .build();
        tokio::spawn(async move { engine.requests().create(&actor, new).await })
    });
    let results: Vec<Result<_>> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|err| matches!(err, Error::QuotaUnavailable(_)))
    );
    assert_eq!(h.item(&item).await.state, QuotaItemState::Reservado);
    assert_eq!(
        h.storage
            .snapshot()
            .await
            .sequence(2025, DocumentType::Request),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creations_get_gapless_codes() {
    let h = Harness::start().await;

    let creations = (0..20).map(|_| {
        let engine = h.engine.clone();
        let actor = h.roster.titular_actor();
        let new = RequestBuilder::of_type(h.roster.titular.id, RequestType::Comision)
            .one_way("LPB", "CIJ", at(2025, 1, 14, 6))
            .build();
        tokio::spawn(async move { engine.requests().create(&actor, new).await })
    });
    let codes: BTreeSet<String> = join_all(creations)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked").unwrap().code)
        .collect();

    let expected: BTreeSet<String> = (1..=20).map(|n| format!("SPD-25{n:04}")).collect();
    assert_eq!(codes, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_takes_leave_the_alternate_one_item() {
    let h = Harness::start().await;
    let items = h.items_held_by(h.roster.titular.id).await;

    let takes = items.iter().map(|item| {
        let engine = h.engine.clone();
        let actor = h.roster.alternate_actor();
        let id = item.id;
        tokio::spawn(async move { engine.quota().take(&actor, id).await })
    });
    let taken = join_all(takes)
        .await
        .into_iter()
        .filter(|joined| matches!(joined, Ok(Ok(_))))
        .count();

    assert_eq!(taken, 1);
    assert_eq!(h.items_held_by(h.roster.alternate.id).await.len(), 1);
}

#[tokio::test]
async fn a_failed_commit_consumes_neither_code_nor_item() {
    let h = Harness::start().await;
    let first = h.items_held_by(h.roster.titular.id).await[1].clone();

    h.storage.fail_commits_after(0, 1);
    let err = h
        .engine
        .requests()
        .create(
            &h.roster.titular_actor(),
            RequestBuilder::quota(h.roster.titular.id)
                .one_way("LPB", "CBB", at(2025, 1, 8, 9))
                .build(),
        )
        .await
        .unwrap_err();
    assert!(err.is_transient());

    let snapshot = h.storage.snapshot().await;
    assert_eq!(snapshot.sequence(2025, DocumentType::Request), 0);
    assert_eq!(snapshot.item(first.id).unwrap().state, QuotaItemState::Disponible);
    assert!(h.events.names().is_empty());

    let request = h.quota_request().await;
    assert_eq!(request.code, "SPD-250001");
    assert_eq!(request.quota_item, Some(first.id));
}

#[tokio::test]
async fn timed_out_operations_roll_back() {
    let h = Harness::start_with(|env| env.with_timeout(Duration::from_millis(50))).await;
    h.storage.set_commit_latency(Duration::from_millis(200));

    let result = h
        .engine
        .requests()
        .create(
            &h.roster.titular_actor(),
            RequestBuilder::quota(h.roster.titular.id)
                .one_way("LPB", "CBB", at(2025, 1, 8, 9))
                .build(),
        )
        .await;
    assert!(matches!(result, Err(Error::Timeout)));

    h.storage.set_commit_latency(Duration::ZERO);
    let snapshot = h.storage.snapshot().await;
    assert_eq!(snapshot.sequence(2025, DocumentType::Request), 0);
    assert!(
        snapshot
            .items_held_by(h.roster.titular.id, Harness::period())
            .iter()
            .all(|item| item.state == QuotaItemState::Disponible)
    );
    assert!(h.events.names().is_empty());
}

#[tokio::test]
async fn reads_retry_one_transient_failure() {
    let h = Harness::start().await;
    let request = h.quota_request().await;
    let requests = h.engine.requests();

    h.storage.fail_next_begins(1);
    assert_eq!(requests.get(request.id).await.unwrap(), request);

    h.storage.fail_next_begins(2);
    let err = requests.get(request.id).await.unwrap_err();
    assert!(matches!(err, Error::Storage { transient: true, .. }));
}

#[tokio::test]
async fn writes_do_not_retry_transient_failures() {
    let h = Harness::start().await;
    let item = h.items_held_by(h.roster.titular.id).await[0].clone();
    h.storage.fail_next_begins(1);

    let err = h
        .engine
        .quota()
        .take(&h.roster.alternate_actor(), item.id)
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert_eq!(h.item(&item).await, item);
}
