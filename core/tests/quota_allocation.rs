//! Quota generation, transfers, reset and balances over in-memory storage.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

use chrono::TimeDelta;
use pasajes_core::model::Transfer;
use pasajes_core::period::Period;
use pasajes_core::state::QuotaItemState;
use pasajes_testing::assertions::{
    assert_events, assert_forbidden, assert_invalid_state, assert_validation,
};
use pasajes_testing::{Harness, RequestBuilder, at};

#[tokio::test]
async fn regenerating_a_period_changes_nothing() {
    let h = Harness::start().await;
    let before = h.storage.snapshot().await.items_in(Harness::period());
    assert_eq!(before.len(), 10, "two titulars × five January windows");

    let report = h.engine.generator().generate_for_month(2025, 1).await.unwrap();
    assert_eq!(report.titulars, 2);
    assert_eq!(report.aggregates_created, 0);
    assert_eq!(report.items_created, 0);
    assert_eq!(h.storage.snapshot().await.items_in(Harness::period()), before);
}

#[tokio::test]
async fn alternates_never_receive_generated_quota() {
    let h = Harness::start().await;
    assert!(h.items_held_by(h.roster.alternate.id).await.is_empty());
    let aggregate = h
        .storage
        .snapshot()
        .await
        .aggregate(h.roster.titular.id, Harness::period())
        .expect("titular aggregate");
    assert_eq!(aggregate.total_weeks, 5);
    assert_eq!(aggregate.total_units, 5);
    assert_eq!(aggregate.consumed_units, 0);
}

#[tokio::test]
async fn titular_transfers_an_item_to_an_alternate() {
    let h = Harness::start().await;
    let items = h.items_held_by(h.roster.titular.id).await;

    let moved = h
        .engine
        .quota()
        .transfer(
            &h.roster.titular_actor(),
            items[2].id,
            h.roster.alternate.id,
            "viaje a sesión regional",
        )
        .await
        .unwrap();

    assert_eq!(moved.holder, h.roster.alternate.id);
    assert_eq!(
        moved.transfer,
        Some(Transfer {
            from: h.roster.titular.id,
            at: at(2025, 1, 1, 0),
            reason: "viaje a sesión regional".into(),
        })
    );
    assert_eq!(h.items_held_by(h.roster.alternate.id).await, vec![moved]);
    assert_eq!(h.items_held_by(h.roster.titular.id).await.len(), 4);
    assert_events(&h.events, &["quota_item_transferred"]);
}

#[tokio::test]
async fn delegate_and_admin_may_transfer_but_outsiders_may_not() {
    let h = Harness::start().await;
    let items = h.items_held_by(h.roster.titular.id).await;
    let quota = h.engine.quota();

    assert_forbidden(
        quota
            .transfer(&h.roster.outsider_actor(), items[0].id, h.roster.alternate.id, "x")
            .await,
    );
    quota
        .transfer(&h.roster.delegate_actor(), items[0].id, h.roster.alternate.id, "x")
        .await
        .unwrap();
    quota
        .transfer(&h.roster.admin_actor(), items[1].id, h.roster.second_alternate.id, "x")
        .await
        .unwrap();
}

#[tokio::test]
async fn transfer_needs_a_reason_and_an_alternate_target() {
    let h = Harness::start().await;
    let item = h.items_held_by(h.roster.titular.id).await[0].clone();
    let quota = h.engine.quota();
    let titular = h.roster.titular_actor();

    assert_validation(quota.transfer(&titular, item.id, h.roster.alternate.id, "  ").await);
    assert_validation(
        quota
            .transfer(&titular, item.id, h.roster.other_titular.id, "x")
            .await,
    );
    assert_validation(quota.transfer(&titular, item.id, h.roster.titular.id, "x").await);
    assert_eq!(h.item(&item).await, item);
}

#[tokio::test]
async fn an_item_is_transferred_at_most_once() {
    let h = Harness::start().await;
    let item = h.items_held_by(h.roster.titular.id).await[0].clone();
    let quota = h.engine.quota();

    quota
        .transfer(&h.roster.titular_actor(), item.id, h.roster.alternate.id, "x")
        .await
        .unwrap();
    assert_invalid_state(
        quota
            .transfer(
                &h.roster.alternate_actor(),
                item.id,
                h.roster.second_alternate.id,
                "x",
            )
            .await,
    );
}

#[tokio::test]
async fn consumed_and_vencido_items_cannot_move() {
    let h = Harness::start().await;
    let request = h.quota_request().await;
    let reserved = request.quota_item.unwrap();
    let quota = h.engine.quota();
    let titular = h.roster.titular_actor();

    assert_invalid_state(quota.transfer(&titular, reserved, h.roster.alternate.id, "x").await);

    // Week 1 ends on Sunday the 5th; with 24h grace it is vencido once the 6th began
    let first = h.items_held_by(h.roster.titular.id).await[0].clone();
    assert_eq!(first.week, 1);
    h.clock.set(at(2025, 1, 6, 0) + TimeDelta::seconds(1));
    assert_invalid_state(quota.transfer(&titular, first.id, h.roster.alternate.id, "x").await);
}

#[tokio::test]
async fn item_moves_until_its_last_day_ends() {
    let h = Harness::start().await;
    let quota = h.engine.quota();
    let first = h.items_held_by(h.roster.titular.id).await[0].clone();
    assert_eq!(first.valid_to, chrono::NaiveDate::from_ymd_opt(2025, 1, 5).unwrap());

    h.clock.set(at(2025, 1, 5, 23));
    let moved = quota
        .transfer(&h.roster.titular_actor(), first.id, h.roster.alternate.id, "x")
        .await
        .unwrap();
    assert_eq!(moved.holder, h.roster.alternate.id);
}

#[tokio::test]
async fn alternate_takes_one_item_per_period() {
    let h = Harness::start().await;
    let items = h.items_held_by(h.roster.titular.id).await;
    let quota = h.engine.quota();

    let taken = quota
        .take(&h.roster.alternate_actor(), items[3].id)
        .await
        .unwrap();
    assert_eq!(taken.holder, h.roster.alternate.id);
    assert_eq!(taken.transfer.unwrap().reason, "taken by alternate");

    assert_invalid_state(quota.take(&h.roster.alternate_actor(), items[4].id).await);
    assert_forbidden(quota.take(&h.roster.titular_actor(), items[4].id).await);

    let other = h.items_held_by(h.roster.other_titular.id).await;
    assert_forbidden(
        quota
            .take(&pasajes_core::Actor::of(&h.roster.second_alternate), other[0].id)
            .await,
    );
}

#[tokio::test]
async fn only_admins_revert_transfers() {
    let h = Harness::start().await;
    let item = h.items_held_by(h.roster.titular.id).await[1].clone();
    let quota = h.engine.quota();
    quota
        .transfer(&h.roster.titular_actor(), item.id, h.roster.alternate.id, "x")
        .await
        .unwrap();

    assert_forbidden(quota.revert_transfer(&h.roster.responsable_actor(), item.id).await);
    let back = quota
        .revert_transfer(&h.roster.admin_actor(), item.id)
        .await
        .unwrap();
    assert_eq!(back.holder, h.roster.titular.id);
    assert!(!back.is_transferred());
    assert_invalid_state(quota.revert_transfer(&h.roster.admin_actor(), item.id).await);
}

#[tokio::test]
async fn balance_is_recomputed_from_items() {
    let h = Harness::start().await;
    h.quota_request().await;

    let balance = h
        .engine
        .quota()
        .balance(h.roster.titular.id, 2025, 1)
        .await
        .unwrap();
    assert_eq!(balance.total_units, 5);
    assert_eq!(balance.consumed_units, 1);
    assert_eq!(balance.remaining_units, 4);
    assert_eq!(balance.available_items, 4);
    assert_eq!(balance.message, "4 of 5 quota units remaining for 2025-01");

    let aggregate = h
        .storage
        .snapshot()
        .await
        .aggregate(h.roster.titular.id, Harness::period())
        .unwrap();
    assert_eq!(aggregate.consumed_units, 1);
}

#[tokio::test]
async fn item_details_list_the_referencing_requests() {
    let h = Harness::start().await;
    let request = h.quota_request().await;

    let details = h
        .engine
        .quota()
        .item_details(request.quota_item.unwrap())
        .await
        .unwrap();
    assert_eq!(details.item.state, QuotaItemState::Reservado);
    assert_eq!(details.holder.id, h.roster.titular.id);
    assert_eq!(details.titular.id, h.roster.titular.id);
    assert_eq!(details.requests.len(), 1);
    assert_eq!(details.requests[0].id, request.id);
}

#[tokio::test]
async fn ensure_for_member_generates_the_titulars_period() {
    let h = Harness::start().await;

    let report = h
        .engine
        .quota()
        .ensure_for_member(h.roster.alternate.id, 2025, 2)
        .await
        .unwrap();
    assert_eq!(report.aggregates_created, 1);
    assert_eq!(report.items_created, 5);

    let february = Period::new(2025, 2).unwrap();
    let snapshot = h.storage.snapshot().await;
    assert_eq!(snapshot.items_held_by(h.roster.titular.id, february).len(), 5);
    assert!(snapshot.items_held_by(h.roster.other_titular.id, february).is_empty());

    assert_validation(
        h.engine
            .quota()
            .ensure_for_member(h.roster.outsider.id, 2025, 2)
            .await,
    );
}

#[tokio::test]
async fn reset_keeps_items_held_by_active_requests() {
    let h = Harness::start().await;
    let request = h.quota_request().await;
    let reserved = request.quota_item.unwrap();
    let transferred = h.items_held_by(h.roster.titular.id).await[0].clone();
    h.engine
        .quota()
        .transfer(&h.roster.titular_actor(), transferred.id, h.roster.alternate.id, "x")
        .await
        .unwrap();

    assert_forbidden(
        h.engine
            .quota()
            .reset_for_month(&h.roster.responsable_actor(), 2025, 1)
            .await,
    );
    let report = h
        .engine
        .quota()
        .reset_for_month(&h.roster.admin_actor(), 2025, 1)
        .await
        .unwrap();

    assert_eq!(report.items_kept, 1);
    assert_eq!(report.items_deleted, 9);
    assert_eq!(report.aggregates_deleted, 1);
    assert_eq!(report.regenerated.aggregates_created, 1);
    assert_eq!(report.regenerated.items_created, 9);

    let snapshot = h.storage.snapshot().await;
    assert_eq!(snapshot.item(reserved).unwrap().state, QuotaItemState::Reservado);
    assert!(snapshot.item(transferred.id).is_none());
    let held = snapshot.items_held_by(h.roster.titular.id, Harness::period());
    assert_eq!(held.len(), 5);
    assert!(held.iter().all(|item| !item.is_transferred()));
    assert_eq!(
        snapshot
            .aggregate(h.roster.titular.id, Harness::period())
            .unwrap()
            .consumed_units,
        1
    );
}

#[tokio::test]
async fn reset_drops_items_of_rejected_requests() {
    let h = Harness::start().await;
    let request = h
        .engine
        .requests()
        .create(
            &h.roster.titular_actor(),
            RequestBuilder::quota(h.roster.titular.id)
                .one_way("LPB", "TJA", at(2025, 1, 15, 7))
                .build(),
        )
        .await
        .unwrap();
    h.engine
        .requests()
        .reject(&h.roster.admin_actor(), request.id)
        .await
        .unwrap();

    let report = h
        .engine
        .quota()
        .reset_for_month(&h.roster.admin_actor(), 2025, 1)
        .await
        .unwrap();
    assert_eq!(report.items_kept, 0);
    assert_eq!(report.aggregates_deleted, 2);
    assert!(h.storage.snapshot().await.item(request.quota_item.unwrap()).is_none());
}
