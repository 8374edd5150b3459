//! Request lifecycle engine.
//!
//! Every public operation runs in one transaction: load (locking), check the
//! actor's standing, apply the transition through the transition tables,
//! re-derive the request status from its legs, reconcile the quota item and
//! commit. Events are published only after the commit.
//!
//! Leg-level operations live in `legs`, ticket operations in `tickets`.

mod legs;
mod tickets;

pub use legs::Reschedule;
pub use tickets::NewTicket;

use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::events::LifecycleEvent;
use crate::ids::{MemberId, QuotaItemId, RequestId, RequestItemId};
use crate::member::{Actor, Member, Role};
use crate::model::{
    Audit, ItineraryKind, LegKind, QuotaItem, Request, RequestItem, RequestType, Scope, TypeScope,
};
use crate::period::Period;
use crate::quota::resync_consumed;
use crate::sequence::{DocumentType, format_code, next_in};
use crate::state::{LegStatus, QuotaItemState, RequestStatus, StateMachine};
use crate::storage::{Storage, Transaction, require_member, require_quota_item, require_request};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// One leg as submitted by the requester.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegInput {
    /// Origin city or airport
    pub origin: String,
    /// Destination city or airport
    pub destination: String,
    /// Scheduled departure; a return leg may omit it
    pub departure: Option<DateTime<Utc>>,
}

impl LegInput {
    /// Create a leg input.
    #[must_use]
    pub fn new(
        origin: impl Into<String>,
        destination: impl Into<String>,
        departure: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            departure,
        }
    }
}

/// Input of [`RequestEngine::create`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRequest {
    /// Member who travels
    pub beneficiary: MemberId,
    /// Request type
    pub request_type: RequestType,
    /// Scope
    pub scope: Scope,
    /// Itinerary shape
    pub itinerary: ItineraryKind,
    /// Quota item to consume; picked automatically when absent
    pub quota_item: Option<QuotaItemId>,
    /// Purpose of the trip
    pub reason: String,
    /// Outbound leg
    pub outbound: Option<LegInput>,
    /// Return leg
    pub return_leg: Option<LegInput>,
}

/// The request state machine and its reconciliation with quota items.
pub struct RequestEngine<S> {
    env: Environment<S>,
}

impl<S> Clone for RequestEngine<S> {
    fn clone(&self) -> Self {
        Self {
            env: self.env.clone(),
        }
    }
}

impl<S: Storage> RequestEngine<S> {
    /// Create the engine.
    #[must_use]
    pub const fn new(env: Environment<S>) -> Self {
        Self { env }
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// File a request.
    ///
    /// For quota-consuming types the beneficiary must be a senator holding a
    /// DISPONIBLE, non-vencido item. The item is reserved and the `SPD` code
    /// issued in the same transaction.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for legs that do not match the itinerary, an
    ///   inactive type/scope pair or a non-senator beneficiary
    /// - [`Error::Forbidden`] if the actor may not act for the beneficiary or
    ///   the beneficiary does not hold the item
    /// - [`Error::QuotaUnavailable`] if no eligible item exists
    pub async fn create(&self, actor: &Actor, new: NewRequest) -> Result<Request> {
        self.env.bounded(self.create_tx(actor, new)).await
    }

    async fn create_tx(&self, actor: &Actor, new: NewRequest) -> Result<Request> {
        let reason = new.reason.trim();
        if reason.is_empty() {
            return Err(Error::Validation("a request needs a reason".into()));
        }
        let planned = plan_legs(new.itinerary, new.outbound, new.return_leg)?;

        let mut tx = self.env.storage().begin().await?;
        let beneficiary = require_member(&mut tx, new.beneficiary).await?;
        if !beneficiary.can_be_represented_by(actor) {
            return Err(Error::Forbidden(format!(
                "member {} cannot file requests for {}",
                actor.member_id, beneficiary.full_name
            )));
        }

        let association = tx.type_scope(new.request_type, new.scope).await?;
        if !association.is_some_and(|a| a.active) {
            return Err(Error::Validation(format!(
                "{} requests are not enabled for scope {}",
                new.request_type.as_str(),
                new.scope.as_str()
            )));
        }

        let now = self.env.now();
        let first_departure = planned.iter().filter_map(|(_, leg)| leg.departure).min();
        let quota_item = if new.request_type.consumes_quota() {
            let item = self
                .reserve_quota(&mut tx, &beneficiary, new.quota_item, first_departure, now)
                .await?;
            Some(item.id)
        } else if new.quota_item.is_some() {
            return Err(Error::Validation(format!(
                "{} requests do not consume quota",
                new.request_type.as_str()
            )));
        } else {
            None
        };

        let year = now.year();
        let code = format_code(
            DocumentType::Request,
            year,
            next_in(&mut tx, year, DocumentType::Request).await?,
        );

        let id = RequestId::new();
        let legs = planned
            .into_iter()
            .map(|(kind, leg)| RequestItem {
                id: RequestItemId::new(),
                request_id: id,
                kind,
                origin: leg.origin.trim().to_string(),
                destination: leg.destination.trim().to_string(),
                status: if leg.departure.is_some() {
                    LegStatus::Solicitado
                } else {
                    LegStatus::Pendiente
                },
                departure: leg.departure,
                tickets: Vec::new(),
                created_at: now,
            })
            .collect();

        let request = Request {
            id,
            code,
            requester: actor.member_id,
            beneficiary: beneficiary.id,
            request_type: new.request_type,
            scope: new.scope,
            itinerary: new.itinerary,
            quota_item,
            status: RequestStatus::Solicitado,
            reason: reason.to_string(),
            legs,
            audit: Audit::created(actor.member_id, now),
        };
        tx.save_request(&request).await?;
        tx.commit().await?;

        tracing::info!(
            request_id = %request.id,
            code = %request.code,
            beneficiary = %request.beneficiary,
            quota_item = ?request.quota_item,
            "Travel request created"
        );
        metrics::counter!("pasajes.requests.created", "type" => request.request_type.as_str())
            .increment(1);
        self.env.publish([LifecycleEvent::RequestCreated {
            request_id: request.id,
            code: request.code.clone(),
            beneficiary: request.beneficiary,
            quota_item: request.quota_item,
        }]);
        Ok(request)
    }

    /// Lock and reserve the item the request will consume.
    async fn reserve_quota(
        &self,
        tx: &mut S::Tx,
        beneficiary: &Member,
        requested: Option<QuotaItemId>,
        departure: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<QuotaItem> {
        if beneficiary.role != Role::Senator || beneficiary.quota_owner().is_none() {
            return Err(Error::Validation(format!(
                "{} is not entitled to quota travel",
                beneficiary.full_name
            )));
        }

        let grace = self.env.policy().expiry_grace;
        let item_id = match requested {
            Some(id) => id,
            None => {
                let date = departure.unwrap_or(now).date_naive();
                let held = tx
                    .quota_items_held_by(beneficiary.id, Period::containing(date))
                    .await?;
                held.iter()
                    .filter(|item| item.is_available(now, grace))
                    .find(|item| item.covers(date))
                    .or_else(|| held.iter().find(|item| item.is_available(now, grace)))
                    .map(|item| item.id)
                    .ok_or_else(|| {
                        Error::QuotaUnavailable(format!(
                            "{} has no available quota item for {}",
                            beneficiary.full_name,
                            Period::containing(date)
                        ))
                    })?
            }
        };

        let mut item = require_quota_item(tx, item_id).await?;
        if item.holder != beneficiary.id {
            return Err(Error::Forbidden(format!(
                "quota item {} is not held by {}",
                item.label, beneficiary.full_name
            )));
        }
        if !item.is_available(now, grace) {
            return Err(Error::QuotaUnavailable(format!(
                "quota item {} is {}",
                item.label,
                if item.state == QuotaItemState::Disponible {
                    "vencido"
                } else {
                    item.state.as_str()
                }
            )));
        }

        item.set_state(QuotaItemState::Reservado)?;
        tx.save_quota_item(&item).await?;
        resync_consumed(tx, item.titular, item.period, self.env.policy()).await?;
        tracing::debug!(item_id = %item.id, holder = %item.holder, "Quota item reserved");
        Ok(item)
    }

    // ========================================================================
    // Request-level transitions
    // ========================================================================

    /// Approve every SOLICITADO leg. Administrators only.
    ///
    /// # Errors
    ///
    /// - [`Error::Forbidden`] for non-administrators
    /// - [`Error::InvalidState`] if no leg awaits approval
    pub async fn approve(&self, actor: &Actor, id: RequestId) -> Result<Request> {
        actor.require_administrator("approving a request")?;
        self.env
            .bounded(async {
                let mut tx = self.env.storage().begin().await?;
                let mut request = require_request(&mut tx, id).await?;
                let before = request.status;
                ensure_open(&request)?;

                let mut approved = 0;
                for leg in request
                    .legs
                    .iter_mut()
                    .filter(|leg| leg.status == LegStatus::Solicitado)
                {
                    leg.set_status(LegStatus::Aprobado)?;
                    approved += 1;
                }
                if approved == 0 {
                    return Err(Error::InvalidState(format!(
                        "request {} has no leg awaiting approval",
                        request.code
                    )));
                }

                request.rederive_status()?;
                self.save(&mut tx, &mut request, actor, before).await?;
                tx.commit().await?;

                self.env.publish([LifecycleEvent::RequestApproved {
                    request_id: request.id,
                    code: request.code.clone(),
                    status: request.status,
                }]);
                Ok(request)
            })
            .await
    }

    /// Reject every live leg and release the quota item. Administrators only.
    ///
    /// # Errors
    ///
    /// - [`Error::Forbidden`] for non-administrators
    /// - [`Error::InvalidState`] while any leg holds an active ticket, or once
    ///   the request is closed
    pub async fn reject(&self, actor: &Actor, id: RequestId) -> Result<Request> {
        actor.require_administrator("rejecting a request")?;
        self.env
            .bounded(async {
                let mut tx = self.env.storage().begin().await?;
                let mut request = require_request(&mut tx, id).await?;
                let before = request.status;
                ensure_open(&request)?;
                if request.has_active_ticket() {
                    return Err(Error::InvalidState(format!(
                        "request {} has active tickets",
                        request.code
                    )));
                }

                for leg in request
                    .legs
                    .iter_mut()
                    .filter(|leg| !leg.status.is_superseded() && leg.status != LegStatus::Rechazado)
                {
                    leg.set_status(LegStatus::Rechazado)?;
                }
                request.rederive_status()?;

                let released = self.release_quota(&mut tx, &request).await?;
                self.save(&mut tx, &mut request, actor, before).await?;
                tx.commit().await?;

                self.env.publish([LifecycleEvent::RequestRejected {
                    request_id: request.id,
                    code: request.code.clone(),
                    released_item: released,
                }]);
                Ok(request)
            })
            .await
    }

    /// Soft-delete a SOLICITADO request and release its quota item.
    ///
    /// Allowed to the requester, anyone who may act for the beneficiary, and
    /// administrators.
    ///
    /// # Errors
    ///
    /// - [`Error::Forbidden`] if the actor lacks standing
    /// - [`Error::InvalidState`] once any leg has been approved or rejected
    pub async fn delete(&self, actor: &Actor, id: RequestId) -> Result<()> {
        self.env
            .bounded(async {
                let mut tx = self.env.storage().begin().await?;
                let mut request = require_request(&mut tx, id).await?;
                self.require_standing(&mut tx, actor, &request).await?;
                if request.status != RequestStatus::Solicitado {
                    return Err(Error::InvalidState(format!(
                        "request {} is {} and can no longer be deleted",
                        request.code,
                        request.status.as_str()
                    )));
                }

                self.release_quota(&mut tx, &request).await?;
                let now = self.env.now();
                request.audit.touch(actor.member_id, now);
                request.audit.deleted_at = Some(now);
                request.audit.deleted_by = Some(actor.member_id);
                tx.save_request(&request).await?;
                tx.commit().await?;

                tracing::info!(request_id = %request.id, code = %request.code, "Travel request deleted");
                self.env.publish([LifecycleEvent::RequestDeleted {
                    request_id: request.id,
                    code: request.code,
                }]);
                Ok(())
            })
            .await
    }

    /// Return approved legs to SOLICITADO. Administrators only.
    ///
    /// The quota item stays reserved: the request still holds it.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] unless the request is APROBADO,
    ///   PARCIALMENTE_APROBADO or EMITIDO with no active ticket
    pub async fn revert_approval(&self, actor: &Actor, id: RequestId) -> Result<Request> {
        actor.require_administrator("reverting an approval")?;
        self.env
            .bounded(async {
                let mut tx = self.env.storage().begin().await?;
                let mut request = require_request(&mut tx, id).await?;
                let before = request.status;

                if !request.status.is_revertible() {
                    return Err(Error::InvalidState(format!(
                        "request {} is {} and its approval cannot be reverted",
                        request.code,
                        request.status.as_str()
                    )));
                }
                if request.has_active_ticket() {
                    return Err(Error::InvalidState(format!(
                        "request {} has active tickets",
                        request.code
                    )));
                }

                for leg in request
                    .legs
                    .iter_mut()
                    .filter(|leg| leg.status == LegStatus::Aprobado)
                {
                    leg.set_status(LegStatus::Solicitado)?;
                }
                request.rederive_status()?;
                self.save(&mut tx, &mut request, actor, before).await?;
                tx.commit().await?;
                Ok(request)
            })
            .await
    }

    // ========================================================================
    // Finalization (driven by the liquidation linkage)
    // ========================================================================

    /// EMITIDO → FINALIZADO: emitted legs close and the quota item becomes
    /// USADO. A no-op on an already finalized request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] from any other state.
    pub async fn finalize(&self, actor: &Actor, id: RequestId) -> Result<Request> {
        self.finalize_tracked(actor, id).await.map(|(request, _)| request)
    }

    /// FINALIZADO → EMITIDO, undoing exactly what [`Self::finalize`] did.
    /// A no-op on an EMITIDO request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] from any other state.
    pub async fn revert_finalize(&self, actor: &Actor, id: RequestId) -> Result<Request> {
        self.revert_finalize_tracked(actor, id)
            .await
            .map(|(request, _)| request)
    }

    /// [`Self::finalize`], also reporting whether anything changed.
    pub(crate) async fn finalize_tracked(
        &self,
        actor: &Actor,
        id: RequestId,
    ) -> Result<(Request, bool)> {
        actor.require_administrator("finalizing a request")?;
        self.env
            .bounded(async {
                let mut tx = self.env.storage().begin().await?;
                let mut request = require_request(&mut tx, id).await?;
                let before = request.status;
                match request.status {
                    RequestStatus::Finalizado => return Ok((request, false)),
                    RequestStatus::Emitido => {}
                    other => {
                        return Err(Error::InvalidState(format!(
                            "request {} is {} and cannot be finalized",
                            request.code,
                            other.as_str()
                        )));
                    }
                }

                for leg in request
                    .legs
                    .iter_mut()
                    .filter(|leg| leg.status == LegStatus::Emitido)
                {
                    leg.set_status(LegStatus::Finalizado)?;
                }
                request.rederive_status()?;
                self.move_quota(&mut tx, &request, QuotaItemState::Reservado, QuotaItemState::Usado)
                    .await?;
                self.save(&mut tx, &mut request, actor, before).await?;
                tx.commit().await?;

                self.env.publish([LifecycleEvent::RequestFinalized {
                    request_id: request.id,
                    code: request.code.clone(),
                }]);
                Ok((request, true))
            })
            .await
    }

    /// [`Self::revert_finalize`], also reporting whether anything changed.
    pub(crate) async fn revert_finalize_tracked(
        &self,
        actor: &Actor,
        id: RequestId,
    ) -> Result<(Request, bool)> {
        actor.require_administrator("reverting a finalization")?;
        self.env
            .bounded(async {
                let mut tx = self.env.storage().begin().await?;
                let mut request = require_request(&mut tx, id).await?;
                let before = request.status;
                match request.status {
                    RequestStatus::Emitido => return Ok((request, false)),
                    RequestStatus::Finalizado => {}
                    other => {
                        return Err(Error::InvalidState(format!(
                            "request {} is {} and was not finalized",
                            request.code,
                            other.as_str()
                        )));
                    }
                }

                for leg in request
                    .legs
                    .iter_mut()
                    .filter(|leg| leg.status == LegStatus::Finalizado)
                {
                    leg.set_status(LegStatus::Emitido)?;
                }
                request.rederive_status()?;
                self.move_quota(&mut tx, &request, QuotaItemState::Usado, QuotaItemState::Reservado)
                    .await?;
                self.save(&mut tx, &mut request, actor, before).await?;
                tx.commit().await?;
                Ok((request, true))
            })
            .await
    }

    // ========================================================================
    // Queries and catalog
    // ========================================================================

    /// A fully-loaded live request: legs, tickets and quota link.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for unknown or deleted requests.
    pub async fn get(&self, id: RequestId) -> Result<Request> {
        self.env
            .read(|| async move {
                let mut tx = self.env.storage().begin().await?;
                let request = require_request(&mut tx, id).await?;
                tx.commit().await?;
                Ok(request)
            })
            .await
    }

    /// Enable or disable a request-type ↔ scope association. Admin only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Forbidden`] unless the actor holds the admin role.
    pub async fn set_type_scope(
        &self,
        actor: &Actor,
        request_type: RequestType,
        scope: Scope,
        active: bool,
    ) -> Result<TypeScope> {
        actor.require_admin("changing request type scopes")?;
        self.env
            .bounded(async {
                let association = TypeScope {
                    request_type,
                    scope,
                    active,
                };
                let mut tx = self.env.storage().begin().await?;
                tx.upsert_type_scope(&association).await?;
                tx.commit().await?;
                tracing::info!(
                    request_type = request_type.as_str(),
                    scope = scope.as_str(),
                    active,
                    "Request type scope updated"
                );
                Ok(association)
            })
            .await
    }

    // ========================================================================
    // Shared steps
    // ========================================================================

    /// Fail unless the actor filed the request or may act for its beneficiary.
    async fn require_standing(
        &self,
        tx: &mut S::Tx,
        actor: &Actor,
        request: &Request,
    ) -> Result<()> {
        if actor.member_id == request.requester || actor.is_administrator() {
            return Ok(());
        }
        let beneficiary = require_member(tx, request.beneficiary).await?;
        if beneficiary.can_be_represented_by(actor) {
            Ok(())
        } else {
            Err(Error::Forbidden(format!(
                "member {} cannot modify request {}",
                actor.member_id, request.code
            )))
        }
    }

    /// Return a reserved quota item to DISPONIBLE.
    async fn release_quota(&self, tx: &mut S::Tx, request: &Request) -> Result<Option<QuotaItemId>> {
        let Some(item_id) = request.quota_item else {
            return Ok(None);
        };
        let mut item = require_quota_item(tx, item_id).await?;
        if item.state == QuotaItemState::Disponible {
            return Ok(None);
        }

        item.set_state(QuotaItemState::Disponible)?;
        tx.save_quota_item(&item).await?;
        resync_consumed(tx, item.titular, item.period, self.env.policy()).await?;
        tracing::debug!(item_id = %item.id, request_id = %request.id, "Quota item released");
        Ok(Some(item.id))
    }

    /// Move the request's quota item between the two consumed states.
    async fn move_quota(
        &self,
        tx: &mut S::Tx,
        request: &Request,
        from: QuotaItemState,
        to: QuotaItemState,
    ) -> Result<()> {
        let Some(item_id) = request.quota_item else {
            return Ok(());
        };
        let mut item = require_quota_item(tx, item_id).await?;
        if item.state == to {
            return Ok(());
        }
        if item.state != from {
            return Err(Error::InvalidState(format!(
                "quota item {} is {}, expected {}",
                item.label,
                item.state.as_str(),
                from.as_str()
            )));
        }
        item.set_state(to)?;
        tx.save_quota_item(&item).await?;
        resync_consumed(tx, item.titular, item.period, self.env.policy()).await
    }

    /// Stamp, persist and record the status change.
    async fn save(
        &self,
        tx: &mut S::Tx,
        request: &mut Request,
        actor: &Actor,
        before: RequestStatus,
    ) -> Result<()> {
        request.audit.touch(actor.member_id, self.env.now());
        tx.save_request(request).await?;

        if request.status != before {
            tracing::info!(
                request_id = %request.id,
                code = %request.code,
                from = before.as_str(),
                to = request.status.as_str(),
                actor = %actor.member_id,
                "Request status changed"
            );
            metrics::counter!(
                "pasajes.requests.transitions",
                "from" => before.as_str(),
                "to" => request.status.as_str()
            )
            .increment(1);
        }
        Ok(())
    }
}

/// Reject mutations of a closed (FINALIZADO or RECHAZADO) request.
fn ensure_open(request: &Request) -> Result<()> {
    match request.status {
        RequestStatus::Finalizado | RequestStatus::Rechazado => Err(Error::InvalidState(format!(
            "request {} is {}",
            request.code,
            request.status.as_str()
        ))),
        _ => Ok(()),
    }
}

/// Check the submitted legs against the itinerary shape.
fn plan_legs(
    itinerary: ItineraryKind,
    outbound: Option<LegInput>,
    return_leg: Option<LegInput>,
) -> Result<SmallVec<[(LegKind, LegInput); 2]>> {
    let mut planned: SmallVec<[(LegKind, LegInput); 2]> = SmallVec::new();
    match (itinerary, outbound, return_leg) {
        (ItineraryKind::OneWayOutbound, Some(outbound), None) => {
            planned.push((LegKind::Outbound, outbound));
        }
        (ItineraryKind::RoundTrip, Some(outbound), Some(back)) => {
            if let (Some(out_at), Some(back_at)) = (outbound.departure, back.departure) {
                if back_at < out_at {
                    return Err(Error::Validation(
                        "the return leg departs before the outbound leg".into(),
                    ));
                }
            }
            planned.push((LegKind::Outbound, outbound));
            planned.push((LegKind::Return, back));
        }
        (ItineraryKind::OneWayReturn, None, Some(back)) => {
            planned.push((LegKind::Return, back));
        }
        (itinerary, _, _) => {
            return Err(Error::Validation(format!(
                "legs do not match itinerary {}",
                itinerary.as_str()
            )));
        }
    }

    for (kind, leg) in &planned {
        if leg.origin.trim().is_empty() || leg.destination.trim().is_empty() {
            return Err(Error::Validation("every leg needs an origin and a destination".into()));
        }
        let may_be_undated =
            *kind == LegKind::Return && itinerary == ItineraryKind::RoundTrip;
        if leg.departure.is_none() && !may_be_undated {
            return Err(Error::Validation(format!(
                "the {} leg needs a departure date",
                kind.as_str()
            )));
        }
    }
    Ok(planned)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> Option<DateTime<Utc>> {
        Utc.with_ymd_and_hms(2025, 3, day, 9, 0, 0).single()
    }

    #[test]
    fn round_trip_may_leave_return_undated() {
        let planned = plan_legs(
            ItineraryKind::RoundTrip,
            Some(LegInput::new("LPB", "VVI", at(3))),
            Some(LegInput::new("VVI", "LPB", None)),
        )
        .unwrap();
        assert_eq!(planned.len(), 2);
        assert_eq!(planned[1].0, LegKind::Return);
    }

    #[test]
    fn one_way_legs_need_a_date() {
        let err = plan_legs(
            ItineraryKind::OneWayReturn,
            None,
            Some(LegInput::new("VVI", "LPB", None)),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn legs_must_match_itinerary() {
        let err = plan_legs(
            ItineraryKind::OneWayOutbound,
            Some(LegInput::new("LPB", "VVI", at(3))),
            Some(LegInput::new("VVI", "LPB", at(5))),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn return_cannot_precede_outbound() {
        let err = plan_legs(
            ItineraryKind::RoundTrip,
            Some(LegInput::new("LPB", "VVI", at(5))),
            Some(LegInput::new("VVI", "LPB", at(3))),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn closed_requests_reject_mutation() {
        let mut request = Request {
            id: RequestId::new(),
            code: "SPD-250001".into(),
            requester: MemberId::new(),
            beneficiary: MemberId::new(),
            request_type: RequestType::Comision,
            scope: Scope::Nacional,
            itinerary: ItineraryKind::OneWayOutbound,
            quota_item: None,
            status: RequestStatus::Finalizado,
            reason: "Session".into(),
            legs: SmallVec::new(),
            audit: Audit::created(MemberId::new(), Utc::now()),
        };
        assert!(ensure_open(&request).is_err());
        request.status = RequestStatus::Aprobado;
        assert!(ensure_open(&request).is_ok());
    }
}
