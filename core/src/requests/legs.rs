//! Per-leg transitions: independent approval, rejection, rescheduling and
//! dating a pending return leg.

use super::{RequestEngine, ensure_open};
use crate::error::{Error, Result};
use crate::events::LifecycleEvent;
use crate::ids::{RequestId, RequestItemId};
use crate::member::Actor;
use crate::model::{Request, RequestItem};
use crate::state::{LegStatus, RequestStatus, StateMachine, TicketStatus};
use crate::storage::{Storage, Transaction, require_request};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// New schedule for a leg being rebooked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reschedule {
    /// New departure
    pub departure: DateTime<Utc>,
    /// New origin; the old leg's when absent
    pub origin: Option<String>,
    /// New destination; the old leg's when absent
    pub destination: Option<String>,
    /// Why the leg was rebooked, appended to voided tickets
    pub reason: String,
}

impl<S: Storage> RequestEngine<S> {
    /// Approve one SOLICITADO leg. Administrators only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the leg is not SOLICITADO.
    pub async fn approve_item(
        &self,
        actor: &Actor,
        id: RequestId,
        leg: RequestItemId,
    ) -> Result<Request> {
        actor.require_administrator("approving a leg")?;
        self.env
            .bounded(async {
                let mut tx = self.env.storage().begin().await?;
                let mut request = require_request(&mut tx, id).await?;
                let before = request.status;
                ensure_open(&request)?;

                request.leg_mut(leg)?.set_status(LegStatus::Aprobado)?;
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

    /// Reject one leg. Administrators only.
    ///
    /// When no other leg remains in play, pending legs are cancelled, the
    /// request becomes RECHAZADO and its quota item is released.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] for an emitted or closed leg, or one
    /// still holding an active ticket.
    pub async fn reject_item(
        &self,
        actor: &Actor,
        id: RequestId,
        leg: RequestItemId,
    ) -> Result<Request> {
        actor.require_administrator("rejecting a leg")?;
        self.env
            .bounded(async {
                let mut tx = self.env.storage().begin().await?;
                let mut request = require_request(&mut tx, id).await?;
                let before = request.status;
                ensure_open(&request)?;

                let item = request.leg_mut(leg)?;
                if item.has_active_ticket() {
                    return Err(Error::InvalidState("leg has an active ticket".into()));
                }
                item.set_status(LegStatus::Rechazado)?;

                let nothing_in_play = request
                    .legs
                    .iter()
                    .all(|leg| leg.status.is_superseded() || leg.status.is_dormant());
                let mut released = None;
                if nothing_in_play {
                    for pending in request
                        .legs
                        .iter_mut()
                        .filter(|leg| leg.status == LegStatus::Pendiente)
                    {
                        pending.set_status(LegStatus::Cancelado)?;
                    }
                    released = self.release_quota(&mut tx, &request).await?;
                }

                request.rederive_status()?;
                self.save(&mut tx, &mut request, actor, before).await?;
                tx.commit().await?;

                if request.status == RequestStatus::Rechazado {
                    self.env.publish([LifecycleEvent::RequestRejected {
                        request_id: request.id,
                        code: request.code.clone(),
                        released_item: released,
                    }]);
                }
                Ok(request)
            })
            .await
    }

    /// Return an APROBADO leg without active tickets to SOLICITADO.
    /// Administrators only. The quota item stays reserved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the leg is not APROBADO or carries
    /// an active ticket.
    pub async fn revert_approval_item(
        &self,
        actor: &Actor,
        id: RequestId,
        leg: RequestItemId,
    ) -> Result<Request> {
        actor.require_administrator("reverting a leg approval")?;
        self.env
            .bounded(async {
                let mut tx = self.env.storage().begin().await?;
                let mut request = require_request(&mut tx, id).await?;
                let before = request.status;
                ensure_open(&request)?;

                let item = request.leg_mut(leg)?;
                if item.status != LegStatus::Aprobado {
                    return Err(Error::InvalidState(format!(
                        "leg is {} and its approval cannot be reverted",
                        item.status.as_str()
                    )));
                }
                if item.has_active_ticket() {
                    return Err(Error::InvalidState("leg has an active ticket".into()));
                }
                item.set_status(LegStatus::Solicitado)?;

                request.rederive_status()?;
                self.save(&mut tx, &mut request, actor, before).await?;
                tx.commit().await?;
                Ok(request)
            })
            .await
    }

    /// Rebook a leg. Administrators only.
    ///
    /// The old leg becomes REPROGRAMADO and stays as history; its active
    /// tickets are voided with the reason noted. A new SOLICITADO leg of the
    /// same direction is appended.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for a blank reason
    /// - [`Error::InvalidState`] if the leg was flown or is not in play
    pub async fn reschedule_item(
        &self,
        actor: &Actor,
        id: RequestId,
        leg: RequestItemId,
        reschedule: Reschedule,
    ) -> Result<Request> {
        actor.require_administrator("rescheduling a leg")?;
        let reason = reschedule.reason.trim().to_string();
        if reason.is_empty() {
            return Err(Error::Validation("a reschedule needs a reason".into()));
        }

        self.env
            .bounded(async {
                let mut tx = self.env.storage().begin().await?;
                let mut request = require_request(&mut tx, id).await?;
                let before = request.status;
                ensure_open(&request)?;
                let now = self.env.now();
                let request_id = request.id;

                let old = request.leg_mut(leg)?;
                if old.tickets.iter().any(|t| t.status == TicketStatus::Usado) {
                    return Err(Error::InvalidState("a flown leg cannot be rescheduled".into()));
                }
                old.set_status(LegStatus::Reprogramado)?;
                for ticket in old.tickets.iter_mut().filter(|t| t.status.is_active()) {
                    ticket.set_status(TicketStatus::Anulado)?;
                    ticket.append_note(&format!("Reprogramado: {reason}"));
                }

                let replacement = RequestItem {
                    id: RequestItemId::new(),
                    request_id,
                    kind: old.kind,
                    origin: reschedule.origin.unwrap_or_else(|| old.origin.clone()),
                    destination: reschedule
                        .destination
                        .unwrap_or_else(|| old.destination.clone()),
                    departure: Some(reschedule.departure),
                    status: LegStatus::Solicitado,
                    tickets: Vec::new(),
                    created_at: now,
                };
                tracing::info!(
                    request_id = %request.id,
                    old_leg = %leg,
                    new_leg = %replacement.id,
                    %reason,
                    "Leg rescheduled"
                );
                request.legs.push(replacement);

                request.rederive_status()?;
                self.save(&mut tx, &mut request, actor, before).await?;
                tx.commit().await?;
                Ok(request)
            })
            .await
    }

    /// Date a PENDIENTE return leg, moving it to SOLICITADO.
    ///
    /// Allowed to the requester, anyone who may act for the beneficiary, and
    /// administrators.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if the leg is not PENDIENTE
    /// - [`Error::Validation`] if the date precedes the outbound departure
    pub async fn set_return_date(
        &self,
        actor: &Actor,
        id: RequestId,
        leg: RequestItemId,
        departure: DateTime<Utc>,
    ) -> Result<Request> {
        self.env
            .bounded(async {
                let mut tx = self.env.storage().begin().await?;
                let mut request = require_request(&mut tx, id).await?;
                self.require_standing(&mut tx, actor, &request).await?;
                let before = request.status;
                ensure_open(&request)?;

                let outbound = request
                    .legs
                    .iter()
                    .filter(|l| l.id != leg && !l.status.is_superseded())
                    .filter_map(|l| l.departure)
                    .min();
                if outbound.is_some_and(|out| departure < out) {
                    return Err(Error::Validation(
                        "the return leg departs before the outbound leg".into(),
                    ));
                }

                let item = request.leg_mut(leg)?;
                if item.status != LegStatus::Pendiente {
                    return Err(Error::InvalidState(format!(
                        "leg is {} and already dated",
                        item.status.as_str()
                    )));
                }
                item.departure = Some(departure);
                item.set_status(LegStatus::Solicitado)?;

                request.rederive_status()?;
                self.save(&mut tx, &mut request, actor, before).await?;
                tx.commit().await?;
                Ok(request)
            })
            .await
    }
}
