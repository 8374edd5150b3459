//! Request, leg and ticket lifecycle over in-memory storage.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

use pasajes_core::model::{Money, RequestType, Scope};
use pasajes_core::requests::Reschedule;
use pasajes_core::state::{LegStatus, QuotaItemState, RequestStatus, TicketStatus};
use pasajes_core::{Error, LifecycleEvent};
use pasajes_testing::assertions::{
    assert_events, assert_forbidden, assert_invalid_state, assert_quota_unavailable,
    assert_validation,
};
use pasajes_testing::{Harness, RequestBuilder, at, date, replacement, ticket};

// ============================================================================
// Creation
// ============================================================================

#[tokio::test]
async fn quota_request_reserves_the_item_covering_the_departure() {
    let h = Harness::start().await;
    let request = h.quota_request().await;

    assert_eq!(request.code, "SPD-250001");
    assert_eq!(request.status, RequestStatus::Solicitado);
    assert_eq!(request.legs.len(), 1);
    assert_eq!(request.legs[0].status, LegStatus::Solicitado);

    let item = h
        .storage
        .snapshot()
        .await
        .item(request.quota_item.unwrap())
        .unwrap();
    assert_eq!(item.week, 2);
    assert_eq!(item.state, QuotaItemState::Reservado);
    assert_events(&h.events, &["request_created"]);
}

#[tokio::test]
async fn delegate_files_for_the_titular_but_outsiders_cannot() {
    let h = Harness::start().await;
    let new = RequestBuilder::quota(h.roster.titular.id)
        .one_way("LPB", "SRE", at(2025, 1, 14, 8))
        .build();

    assert_forbidden(
        h.engine
            .requests()
            .create(&h.roster.outsider_actor(), new.clone())
            .await,
    );
    let request = h
        .engine
        .requests()
        .create(&h.roster.delegate_actor(), new)
        .await
        .unwrap();
    assert_eq!(request.requester, h.roster.delegate.id);
    assert_eq!(request.beneficiary, h.roster.titular.id);
}

#[tokio::test]
async fn only_senators_with_quota_may_file_quota_requests() {
    let h = Harness::start().await;
    let outsider = h.roster.outsider_actor();
    assert_validation(
        h.engine
            .requests()
            .create(
                &outsider,
                RequestBuilder::quota(h.roster.outsider.id)
                    .one_way("LPB", "CBB", at(2025, 1, 8, 9))
                    .build(),
            )
            .await,
    );
}

#[tokio::test]
async fn the_item_must_be_held_by_the_beneficiary() {
    let h = Harness::start().await;
    let foreign = h.items_held_by(h.roster.other_titular.id).await[1].clone();

    assert_forbidden(
        h.engine
            .requests()
            .create(
                &h.roster.titular_actor(),
                RequestBuilder::quota(h.roster.titular.id)
                    .one_way("LPB", "CBB", at(2025, 1, 8, 9))
                    .item(foreign.id)
                    .build(),
            )
            .await,
    );
    assert_eq!(h.item(&foreign).await.state, QuotaItemState::Disponible);
}

#[tokio::test]
async fn alternate_travels_on_a_transferred_item() {
    let h = Harness::start().await;
    let item = h.items_held_by(h.roster.titular.id).await[2].clone();
    h.engine
        .quota()
        .transfer(&h.roster.titular_actor(), item.id, h.roster.alternate.id, "x")
        .await
        .unwrap();

    let request = h
        .engine
        .requests()
        .create(
            &h.roster.alternate_actor(),
            RequestBuilder::quota(h.roster.alternate.id)
                .one_way("LPB", "CIJ", at(2025, 1, 16, 6))
                .build(),
        )
        .await
        .unwrap();
    assert_eq!(request.quota_item, Some(item.id));
}

#[tokio::test]
async fn an_item_backs_only_one_request() {
    let h = Harness::start().await;
    let item = h.items_held_by(h.roster.titular.id).await[1].clone();
    let new = RequestBuilder::quota(h.roster.titular.id)
        .one_way("LPB", "CBB", at(2025, 1, 8, 9))
        .item(item.id)
        .build();

    let requests = h.engine.requests();
    requests
        .create(&h.roster.titular_actor(), new.clone())
        .await
        .unwrap();
    assert_quota_unavailable(requests.create(&h.roster.titular_actor(), new).await);
}

#[tokio::test]
async fn running_out_of_items_is_quota_unavailable() {
    let h = Harness::start().await;
    let requests = h.engine.requests();
    for day in [2, 8, 14, 21, 28] {
        requests
            .create(
                &h.roster.titular_actor(),
                RequestBuilder::quota(h.roster.titular.id)
                    .one_way("LPB", "CBB", at(2025, 1, day, 9))
                    .build(),
            )
            .await
            .unwrap();
    }
    assert_quota_unavailable(
        requests
            .create(
                &h.roster.titular_actor(),
                RequestBuilder::quota(h.roster.titular.id)
                    .one_way("LPB", "CBB", at(2025, 1, 29, 9))
                    .build(),
            )
            .await,
    );
}

#[tokio::test]
async fn commission_requests_leave_quota_alone() {
    let h = Harness::start().await;
    let request = h
        .engine
        .requests()
        .create(
            &h.roster.titular_actor(),
            RequestBuilder::of_type(h.roster.titular.id, RequestType::Comision)
                .one_way("LPB", "VVI", at(2025, 1, 8, 9))
                .build(),
        )
        .await
        .unwrap();
    assert_eq!(request.quota_item, None);
    assert!(
        h.items_held_by(h.roster.titular.id)
            .await
            .iter()
            .all(|item| item.state == QuotaItemState::Disponible)
    );

    let item = h.items_held_by(h.roster.titular.id).await[0].id;
    assert_validation(
        h.engine
            .requests()
            .create(
                &h.roster.titular_actor(),
                RequestBuilder::of_type(h.roster.titular.id, RequestType::Comision)
                    .one_way("LPB", "VVI", at(2025, 1, 8, 9))
                    .item(item)
                    .build(),
            )
            .await,
    );
}

#[tokio::test]
async fn disabled_type_scope_pairs_are_refused() {
    let h = Harness::start().await;
    let requests = h.engine.requests();

    assert_forbidden(
        requests
            .set_type_scope(
                &h.roster.responsable_actor(),
                RequestType::UsoCupo,
                Scope::Internacional,
                false,
            )
            .await,
    );
    requests
        .set_type_scope(
            &h.roster.admin_actor(),
            RequestType::UsoCupo,
            Scope::Internacional,
            false,
        )
        .await
        .unwrap();

    assert_validation(
        requests
            .create(
                &h.roster.titular_actor(),
                RequestBuilder::quota(h.roster.titular.id)
                    .one_way("VVI", "GRU", at(2025, 1, 8, 9))
                    .scope(Scope::Internacional)
                    .build(),
            )
            .await,
    );
    assert_eq!(h.storage.snapshot().await.sequence(2025, pasajes_core::DocumentType::Request), 0);
}

#[tokio::test]
async fn legs_must_match_the_itinerary() {
    let h = Harness::start().await;
    let requests = h.engine.requests();
    let titular = h.roster.titular_actor();

    let mut missing_return = RequestBuilder::quota(h.roster.titular.id)
        .round_trip("LPB", "CBB", at(2025, 1, 8, 9), None)
        .build();
    missing_return.return_leg = None;
    assert_validation(requests.create(&titular, missing_return).await);

    assert_validation(
        requests
            .create(
                &titular,
                RequestBuilder::quota(h.roster.titular.id)
                    .round_trip("LPB", "CBB", at(2025, 1, 8, 9), Some(at(2025, 1, 7, 9)))
                    .build(),
            )
            .await,
    );
    assert_validation(
        requests
            .create(
                &titular,
                RequestBuilder::quota(h.roster.titular.id)
                    .one_way("LPB", "CBB", at(2025, 1, 8, 9))
                    .reason(" ")
                    .build(),
            )
            .await,
    );
}

// ============================================================================
// Approval, rejection and deletion
// ============================================================================

#[tokio::test]
async fn approval_is_for_administrators() {
    let h = Harness::start().await;
    let request = h.quota_request().await;
    let requests = h.engine.requests();

    assert_forbidden(requests.approve(&h.roster.titular_actor(), request.id).await);
    let approved = requests
        .approve(&h.roster.responsable_actor(), request.id)
        .await
        .unwrap();
    assert_eq!(approved.status, RequestStatus::Aprobado);
    assert_eq!(approved.legs[0].status, LegStatus::Aprobado);
    assert_invalid_state(requests.approve(&h.roster.admin_actor(), request.id).await);
}

#[tokio::test]
async fn rejection_releases_the_item() {
    let h = Harness::start().await;
    let request = h.quota_request().await;
    let requests = h.engine.requests();

    let rejected = requests
        .reject(&h.roster.admin_actor(), request.id)
        .await
        .unwrap();
    assert_eq!(rejected.status, RequestStatus::Rechazado);

    let item = request.quota_item.unwrap();
    assert_eq!(
        h.storage.snapshot().await.item(item).unwrap().state,
        QuotaItemState::Disponible
    );
    assert_eq!(
        h.events.events().last(),
        Some(&LifecycleEvent::RequestRejected {
            request_id: request.id,
            code: request.code.clone(),
            released_item: Some(item),
        })
    );
    assert_invalid_state(requests.reject(&h.roster.admin_actor(), request.id).await);
    assert_invalid_state(requests.approve(&h.roster.admin_actor(), request.id).await);
}

#[tokio::test]
async fn deletion_releases_the_item_and_hides_the_request() {
    let h = Harness::start().await;
    let request = h.quota_request().await;
    let requests = h.engine.requests();

    assert_forbidden(requests.delete(&h.roster.outsider_actor(), request.id).await);
    requests
        .delete(&h.roster.delegate_actor(), request.id)
        .await
        .unwrap();

    assert!(matches!(
        requests.get(request.id).await,
        Err(Error::NotFound { .. })
    ));
    let snapshot = h.storage.snapshot().await;
    let stored = snapshot.request(request.id).unwrap();
    assert_eq!(stored.audit.deleted_by, Some(h.roster.delegate.id));
    assert_eq!(
        snapshot.item(request.quota_item.unwrap()).unwrap().state,
        QuotaItemState::Disponible
    );
}

#[tokio::test]
async fn approved_requests_cannot_be_deleted() {
    let h = Harness::start().await;
    let request = h.quota_request().await;
    h.engine
        .requests()
        .approve(&h.roster.admin_actor(), request.id)
        .await
        .unwrap();
    assert_invalid_state(
        h.engine
            .requests()
            .delete(&h.roster.titular_actor(), request.id)
            .await,
    );
}

#[tokio::test]
async fn reverting_an_approval_keeps_the_reservation() {
    let h = Harness::start().await;
    let request = h.quota_request().await;
    let requests = h.engine.requests();
    let admin = h.roster.admin_actor();

    requests.approve(&admin, request.id).await.unwrap();
    let reverted = requests.revert_approval(&admin, request.id).await.unwrap();
    assert_eq!(reverted.status, RequestStatus::Solicitado);
    assert_eq!(reverted.legs[0].status, LegStatus::Solicitado);
    assert_eq!(
        h.storage
            .snapshot()
            .await
            .item(request.quota_item.unwrap())
            .unwrap()
            .state,
        QuotaItemState::Reservado
    );
    assert_invalid_state(requests.revert_approval(&admin, request.id).await);
}

#[tokio::test]
async fn ticketed_requests_cannot_revert_approval() {
    let h = Harness::start().await;
    let request = h.quota_request().await;
    let requests = h.engine.requests();
    let admin = h.roster.admin_actor();

    requests.approve(&admin, request.id).await.unwrap();
    requests
        .register_ticket(&admin, request.id, request.legs[0].id, ticket("930-1", date(2025, 1, 8)))
        .await
        .unwrap();
    assert_invalid_state(requests.revert_approval(&admin, request.id).await);
    assert_invalid_state(
        requests
            .revert_approval_item(&admin, request.id, request.legs[0].id)
            .await,
    );
}

#[tokio::test]
async fn ticketed_requests_cannot_be_rejected_until_voided() {
    let h = Harness::start().await;
    let request = h.quota_request().await;
    let requests = h.engine.requests();
    let admin = h.roster.admin_actor();
    let item = request.quota_item.unwrap();

    requests.approve(&admin, request.id).await.unwrap();
    let registered = requests
        .register_ticket(&admin, request.id, request.legs[0].id, ticket("930-2", date(2025, 1, 8)))
        .await
        .unwrap();

    assert_invalid_state(requests.reject(&admin, request.id).await);
    assert_invalid_state(
        requests
            .reject_item(&admin, request.id, request.legs[0].id)
            .await,
    );
    let untouched = requests.get(request.id).await.unwrap();
    assert_eq!(untouched.status, RequestStatus::Aprobado);
    assert!(untouched.legs[0].has_active_ticket());
    assert_eq!(
        h.storage.snapshot().await.item(item).unwrap().state,
        QuotaItemState::Reservado
    );

    requests.void_ticket(&admin, registered.id).await.unwrap();
    let rejected = requests.reject(&admin, request.id).await.unwrap();
    assert_eq!(rejected.status, RequestStatus::Rechazado);
    assert!(!rejected.legs[0].has_active_ticket());
    assert_eq!(
        h.storage.snapshot().await.item(item).unwrap().state,
        QuotaItemState::Disponible
    );
}

// ============================================================================
// Per-leg transitions
// ============================================================================

#[tokio::test]
async fn legs_are_approved_independently() {
    let h = Harness::start().await;
    let requests = h.engine.requests();
    let admin = h.roster.admin_actor();
    let request = requests
        .create(
            &h.roster.titular_actor(),
            RequestBuilder::quota(h.roster.titular.id)
                .round_trip("LPB", "SRZ", at(2025, 1, 8, 9), Some(at(2025, 1, 10, 18)))
                .build(),
        )
        .await
        .unwrap();
    let (outbound, back) = (request.legs[0].id, request.legs[1].id);

    let partial = requests.approve_item(&admin, request.id, outbound).await.unwrap();
    assert_eq!(partial.status, RequestStatus::ParcialmenteAprobado);

    let reverted = requests
        .revert_approval_item(&admin, request.id, outbound)
        .await
        .unwrap();
    assert_eq!(reverted.status, RequestStatus::Solicitado);

    requests.approve_item(&admin, request.id, outbound).await.unwrap();
    let full = requests.approve_item(&admin, request.id, back).await.unwrap();
    assert_eq!(full.status, RequestStatus::Aprobado);
    assert_invalid_state(requests.approve_item(&admin, request.id, back).await);
}

#[tokio::test]
async fn rejecting_the_last_leg_in_play_rejects_the_request() {
    let h = Harness::start().await;
    let requests = h.engine.requests();
    let admin = h.roster.admin_actor();
    let request = requests
        .create(
            &h.roster.titular_actor(),
            RequestBuilder::quota(h.roster.titular.id)
                .round_trip("LPB", "SRZ", at(2025, 1, 8, 9), Some(at(2025, 1, 10, 18)))
                .build(),
        )
        .await
        .unwrap();
    let item = request.quota_item.unwrap();

    let one = requests
        .reject_item(&admin, request.id, request.legs[0].id)
        .await
        .unwrap();
    assert_eq!(one.status, RequestStatus::Solicitado);
    assert_eq!(
        h.storage.snapshot().await.item(item).unwrap().state,
        QuotaItemState::Reservado
    );
    assert_events(&h.events, &["request_created"]);

    let both = requests
        .reject_item(&admin, request.id, request.legs[1].id)
        .await
        .unwrap();
    assert_eq!(both.status, RequestStatus::Rechazado);
    assert_eq!(
        h.storage.snapshot().await.item(item).unwrap().state,
        QuotaItemState::Disponible
    );
    assert_eq!(h.events.names().last(), Some(&"request_rejected"));
}

#[tokio::test]
async fn undated_return_waits_while_the_outbound_proceeds() {
    let h = Harness::start().await;
    let requests = h.engine.requests();
    let admin = h.roster.admin_actor();
    let request = requests
        .create(
            &h.roster.titular_actor(),
            RequestBuilder::quota(h.roster.titular.id)
                .round_trip("LPB", "SRZ", at(2025, 1, 8, 9), None)
                .build(),
        )
        .await
        .unwrap();
    let back = request.legs[1].id;
    assert_eq!(request.legs[1].status, LegStatus::Pendiente);

    let approved = requests.approve(&admin, request.id).await.unwrap();
    assert_eq!(approved.status, RequestStatus::Aprobado);
    assert_eq!(approved.legs[1].status, LegStatus::Pendiente);

    assert_validation(
        requests
            .set_return_date(&h.roster.titular_actor(), request.id, back, at(2025, 1, 7, 9))
            .await,
    );
    assert_forbidden(
        requests
            .set_return_date(&h.roster.outsider_actor(), request.id, back, at(2025, 1, 9, 9))
            .await,
    );
    let dated = requests
        .set_return_date(&h.roster.delegate_actor(), request.id, back, at(2025, 1, 9, 9))
        .await
        .unwrap();
    assert_eq!(dated.legs[1].status, LegStatus::Solicitado);
    assert_eq!(dated.status, RequestStatus::ParcialmenteAprobado);
    assert_invalid_state(
        requests
            .set_return_date(&h.roster.titular_actor(), request.id, back, at(2025, 1, 9, 9))
            .await,
    );
}

#[tokio::test]
async fn rejecting_the_outbound_cancels_an_undated_return() {
    let h = Harness::start().await;
    let requests = h.engine.requests();
    let request = requests
        .create(
            &h.roster.titular_actor(),
            RequestBuilder::quota(h.roster.titular.id)
                .round_trip("LPB", "SRZ", at(2025, 1, 8, 9), None)
                .build(),
        )
        .await
        .unwrap();

    let rejected = requests
        .reject_item(&h.roster.admin_actor(), request.id, request.legs[0].id)
        .await
        .unwrap();
    assert_eq!(rejected.status, RequestStatus::Rechazado);
    assert_eq!(rejected.legs[1].status, LegStatus::Cancelado);
    assert_eq!(
        h.storage
            .snapshot()
            .await
            .item(request.quota_item.unwrap())
            .unwrap()
            .state,
        QuotaItemState::Disponible
    );
}

// ============================================================================
// Tickets
// ============================================================================

#[tokio::test]
async fn emitting_every_leg_makes_the_request_emitido() {
    let h = Harness::start().await;
    let request = h.emitted_request("930-100").await;

    assert_eq!(request.status, RequestStatus::Emitido);
    assert_eq!(request.legs[0].status, LegStatus::Emitido);
    assert_eq!(request.legs[0].tickets[0].status, TicketStatus::Emitido);
    assert_eq!(request.latest_flight_date(), Some(date(2025, 1, 8)));
    assert!(h.events.names().contains(&"ticket_emitted"));
}

#[tokio::test]
async fn ticket_numbers_are_unique_and_legs_hold_one_active_ticket() {
    let h = Harness::start().await;
    let requests = h.engine.requests();
    let admin = h.roster.admin_actor();
    let first = h.emitted_request("930-100").await;

    let second = h
        .engine
        .requests()
        .create(
            &h.roster.titular_actor(),
            RequestBuilder::quota(h.roster.titular.id)
                .one_way("LPB", "CBB", at(2025, 1, 15, 9))
                .build(),
        )
        .await
        .unwrap();
    requests.approve(&admin, second.id).await.unwrap();
    assert_validation(
        requests
            .register_ticket(&admin, second.id, second.legs[0].id, ticket("930-100", date(2025, 1, 15)))
            .await,
    );

    assert_invalid_state(
        requests
            .register_ticket(&admin, first.id, first.legs[0].id, ticket("930-101", date(2025, 1, 8)))
            .await,
    );
    assert_validation(
        requests
            .register_ticket(
                &admin,
                second.id,
                second.legs[0].id,
                pasajes_core::requests::NewTicket {
                    cost: Money::from_cents(-1),
                    ..ticket("930-102", date(2025, 1, 15))
                },
            )
            .await,
    );
}

#[tokio::test]
async fn tickets_need_an_approved_leg() {
    let h = Harness::start().await;
    let request = h.quota_request().await;
    assert_invalid_state(
        h.engine
            .requests()
            .register_ticket(
                &h.roster.admin_actor(),
                request.id,
                request.legs[0].id,
                ticket("930-1", date(2025, 1, 8)),
            )
            .await,
    );
}

#[tokio::test]
async fn returning_the_ticket_reopens_the_leg() {
    let h = Harness::start().await;
    let requests = h.engine.requests();
    let admin = h.roster.admin_actor();
    let request = h.emitted_request("930-100").await;
    let emitted = request.legs[0].tickets[0].id;

    let returned = requests
        .return_ticket(&admin, emitted, Some(Money::from_cents(15_000)), "cambio de agenda")
        .await
        .unwrap();
    assert_eq!(returned.status, TicketStatus::Anulado);
    assert_eq!(returned.penalty, Some(Money::from_cents(15_000)));
    assert!(returned.notes.contains("Devolución: cambio de agenda"));

    let reopened = requests.get(request.id).await.unwrap();
    assert_eq!(reopened.legs[0].status, LegStatus::Aprobado);
    assert_eq!(reopened.status, RequestStatus::Aprobado);
    assert_invalid_state(requests.return_ticket(&admin, emitted, None, "").await);

    let rebooked = requests
        .register_ticket(&admin, request.id, request.legs[0].id, ticket("930-200", date(2025, 1, 9)))
        .await
        .unwrap();
    requests.emit_ticket(&admin, rebooked.id).await.unwrap();
    assert_eq!(
        requests.get(request.id).await.unwrap().status,
        RequestStatus::Emitido
    );
}

#[tokio::test]
async fn a_replacement_ticket_voids_the_one_it_supersedes() {
    let h = Harness::start().await;
    let requests = h.engine.requests();
    let admin = h.roster.admin_actor();
    let request = h.emitted_request("930-100").await;
    let old = request.legs[0].tickets[0].id;

    let new = requests
        .register_ticket(
            &admin,
            request.id,
            request.legs[0].id,
            replacement("930-300", date(2025, 1, 9), old),
        )
        .await
        .unwrap();
    assert_eq!(new.status, TicketStatus::Registrado);
    assert_eq!(new.supersedes, Some(old));

    let reloaded = requests.get(request.id).await.unwrap();
    let old_ticket = &reloaded.legs[0].tickets[0];
    assert_eq!(old_ticket.status, TicketStatus::Anulado);
    assert!(old_ticket.notes.contains("Reemplazado por 930-300"));
    assert_eq!(reloaded.status, RequestStatus::Aprobado);

    assert_invalid_state(requests.return_ticket(&admin, new.id, None, "x").await);
    requests.void_ticket(&admin, new.id).await.unwrap();
    assert_invalid_state(requests.void_ticket(&admin, new.id).await);
}

#[tokio::test]
async fn rescheduling_voids_tickets_and_adds_a_leg() {
    let h = Harness::start().await;
    let requests = h.engine.requests();
    let admin = h.roster.admin_actor();
    let request = h.emitted_request("930-100").await;
    let old_leg = request.legs[0].id;

    let reschedule = Reschedule {
        departure: at(2025, 1, 10, 9),
        origin: None,
        destination: Some("TJA".into()),
        reason: "sesión postergada".into(),
    };
    assert_validation(
        requests
            .reschedule_item(
                &admin,
                request.id,
                old_leg,
                Reschedule {
                    reason: String::new(),
                    ..reschedule.clone()
                },
            )
            .await,
    );
    let rebooked = requests
        .reschedule_item(&admin, request.id, old_leg, reschedule)
        .await
        .unwrap();

    assert_eq!(rebooked.legs.len(), 2);
    assert_eq!(rebooked.legs[0].status, LegStatus::Reprogramado);
    assert_eq!(rebooked.legs[0].tickets[0].status, TicketStatus::Anulado);
    assert!(rebooked.legs[0].tickets[0].notes.contains("sesión postergada"));
    assert_eq!(rebooked.legs[1].status, LegStatus::Solicitado);
    assert_eq!(rebooked.legs[1].origin, "LPB");
    assert_eq!(rebooked.legs[1].destination, "TJA");
    assert_eq!(rebooked.status, RequestStatus::Solicitado);
    assert_eq!(
        h.storage
            .snapshot()
            .await
            .item(request.quota_item.unwrap())
            .unwrap()
            .state,
        QuotaItemState::Reservado
    );
    assert_invalid_state(
        requests
            .reschedule_item(
                &admin,
                request.id,
                old_leg,
                Reschedule {
                    departure: at(2025, 1, 11, 9),
                    origin: None,
                    destination: None,
                    reason: "otra vez".into(),
                },
            )
            .await,
    );
}

#[tokio::test]
async fn flown_legs_cannot_be_rescheduled() {
    let h = Harness::start().await;
    let requests = h.engine.requests();
    let admin = h.roster.admin_actor();
    let request = h.emitted_request("930-100").await;

    let flown = requests
        .mark_ticket_used(&admin, request.legs[0].tickets[0].id)
        .await
        .unwrap();
    assert_eq!(flown.status, TicketStatus::Usado);
    assert_invalid_state(
        requests
            .reschedule_item(
                &admin,
                request.id,
                request.legs[0].id,
                Reschedule {
                    departure: at(2025, 1, 10, 9),
                    origin: None,
                    destination: None,
                    reason: "x".into(),
                },
            )
            .await,
    );
}
