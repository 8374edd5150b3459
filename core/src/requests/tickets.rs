//! Ticket sub-lifecycle: REGISTRADO → EMITIDO → USADO | ANULADO.
//!
//! Emitting a ticket moves its leg to EMITIDO; returning or voiding the
//! last emitted ticket moves the leg back to APROBADO. A finalized request
//! only accepts marking tickets as used.

use super::RequestEngine;
use crate::error::{Error, Result};
use crate::events::LifecycleEvent;
use crate::ids::{RequestId, RequestItemId, TicketId};
use crate::member::Actor;
use crate::model::{Money, Request, RequestItem, Ticket};
use crate::state::{LegStatus, RequestStatus, StateMachine, TicketStatus};
use crate::storage::{Storage, Transaction, require_request};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Input of [`RequestEngine::register_ticket`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTicket {
    /// Airline ticket number, unique system-wide
    pub number: String,
    /// Carrier
    pub airline: String,
    /// Flight date
    pub flight_date: NaiveDate,
    /// Fare
    pub cost: Money,
    /// Ticket this one rebooks; an active one is voided
    pub supersedes: Option<TicketId>,
}

impl<S: Storage> RequestEngine<S> {
    /// Register a ticket against an approved leg. Administrators only.
    ///
    /// A leg has at most one active ticket; registering a replacement
    /// requires `supersedes` to name the current one, which is voided.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for a blank or duplicate number or a negative cost
    /// - [`Error::InvalidState`] if the leg is not approved or already ticketed
    pub async fn register_ticket(
        &self,
        actor: &Actor,
        id: RequestId,
        leg: RequestItemId,
        new: NewTicket,
    ) -> Result<Ticket> {
        actor.require_administrator("registering a ticket")?;
        let number = new.number.trim().to_string();
        if number.is_empty() {
            return Err(Error::Validation("a ticket needs a number".into()));
        }
        if new.cost.is_negative() {
            return Err(Error::Validation("ticket cost cannot be negative".into()));
        }

        self.env
            .bounded(async {
                let mut tx = self.env.storage().begin().await?;
                let mut request = require_request(&mut tx, id).await?;
                let before = request.status;
                ensure_ticketable(&request)?;

                if tx.ticket_number_exists(&number).await? {
                    return Err(Error::Validation(format!(
                        "ticket number {number} is already registered"
                    )));
                }

                let now = self.env.now();
                let request_id = request.id;
                let item = request.leg_mut(leg)?;
                if let Some(superseded) = new.supersedes {
                    let old = item
                        .tickets
                        .iter_mut()
                        .find(|t| t.id == superseded)
                        .ok_or_else(|| Error::not_found("ticket", superseded))?;
                    if old.status.is_active() {
                        old.set_status(TicketStatus::Anulado)?;
                        old.append_note(&format!("Reemplazado por {number}"));
                    }
                    settle_leg(item)?;
                }
                if item.has_active_ticket() {
                    return Err(Error::InvalidState(
                        "leg already has an active ticket; supersede it instead".into(),
                    ));
                }
                if item.status != LegStatus::Aprobado {
                    return Err(Error::InvalidState(format!(
                        "leg is {} and cannot be ticketed",
                        item.status.as_str()
                    )));
                }

                let ticket = Ticket {
                    id: TicketId::new(),
                    request_id,
                    item_id: item.id,
                    number: number.clone(),
                    airline: new.airline.trim().to_string(),
                    flight_date: new.flight_date,
                    cost: new.cost,
                    penalty: None,
                    notes: String::new(),
                    status: TicketStatus::Registrado,
                    supersedes: new.supersedes,
                    created_at: now,
                };
                item.tickets.push(ticket.clone());

                request.rederive_status()?;
                self.save(&mut tx, &mut request, actor, before).await?;
                tx.commit().await?;

                tracing::info!(
                    request_id = %request.id,
                    ticket_id = %ticket.id,
                    number = %ticket.number,
                    "Ticket registered"
                );
                Ok(ticket)
            })
            .await
    }

    /// REGISTRADO → EMITIDO; the leg becomes EMITIDO. Administrators only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the ticket is REGISTRADO.
    pub async fn emit_ticket(&self, actor: &Actor, ticket: TicketId) -> Result<Ticket> {
        actor.require_administrator("emitting a ticket")?;
        let emitted = self
            .ticket_transition(actor, ticket, false, |leg, index| {
                leg.tickets[index].set_status(TicketStatus::Emitido)?;
                if leg.status != LegStatus::Emitido {
                    leg.set_status(LegStatus::Emitido)?;
                }
                Ok(())
            })
            .await?;

        self.env.publish([LifecycleEvent::TicketEmitted {
            request_id: emitted.request_id,
            ticket_id: emitted.id,
            number: emitted.number.clone(),
        }]);
        Ok(emitted)
    }

    /// EMITIDO → USADO. Also allowed on a finalized request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the ticket is EMITIDO.
    pub async fn mark_ticket_used(&self, actor: &Actor, ticket: TicketId) -> Result<Ticket> {
        actor.require_administrator("marking a ticket used")?;
        self.ticket_transition(actor, ticket, true, |leg, index| {
            leg.tickets[index].set_status(TicketStatus::Usado)
        })
        .await
    }

    /// Return an EMITIDO ticket: it becomes ANULADO with the penalty and
    /// note recorded. Administrators only.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for a negative penalty
    /// - [`Error::InvalidState`] unless the ticket is EMITIDO
    pub async fn return_ticket(
        &self,
        actor: &Actor,
        ticket: TicketId,
        penalty: Option<Money>,
        note: &str,
    ) -> Result<Ticket> {
        actor.require_administrator("returning a ticket")?;
        if penalty.is_some_and(|p| p.is_negative()) {
            return Err(Error::Validation("penalty cannot be negative".into()));
        }
        self.ticket_transition(actor, ticket, false, |leg, index| {
            let returned = &mut leg.tickets[index];
            if returned.status != TicketStatus::Emitido {
                return Err(Error::InvalidState(format!(
                    "ticket {} is {} and cannot be returned",
                    returned.number,
                    returned.status.as_str()
                )));
            }
            returned.set_status(TicketStatus::Anulado)?;
            returned.penalty = penalty;
            returned.append_note(&format!("Devolución: {}", note.trim()));
            settle_leg(leg)
        })
        .await
    }

    /// Void a REGISTRADO ticket. Administrators only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the ticket is REGISTRADO.
    pub async fn void_ticket(&self, actor: &Actor, ticket: TicketId) -> Result<Ticket> {
        actor.require_administrator("voiding a ticket")?;
        self.ticket_transition(actor, ticket, false, |leg, index| {
            let voided = &mut leg.tickets[index];
            if voided.status != TicketStatus::Registrado {
                return Err(Error::InvalidState(format!(
                    "ticket {} is {}; return it instead",
                    voided.number,
                    voided.status.as_str()
                )));
            }
            voided.set_status(TicketStatus::Anulado)
        })
        .await
    }

    async fn ticket_transition<F>(
        &self,
        actor: &Actor,
        ticket: TicketId,
        allow_finalized: bool,
        apply: F,
    ) -> Result<Ticket>
    where
        F: FnOnce(&mut RequestItem, usize) -> Result<()>,
    {
        self.env
            .bounded(async {
                let mut tx = self.env.storage().begin().await?;
                let request_id = tx
                    .ticket_request(ticket)
                    .await?
                    .ok_or_else(|| Error::not_found("ticket", ticket))?;
                let mut request = require_request(&mut tx, request_id).await?;
                let before = request.status;
                if !(allow_finalized && request.status == RequestStatus::Finalizado) {
                    ensure_ticketable(&request)?;
                }

                let (leg, index) = request.locate_ticket(ticket)?;
                apply(&mut request.legs[leg], index)?;
                let updated = request.legs[leg].tickets[index].clone();

                request.rederive_status()?;
                self.save(&mut tx, &mut request, actor, before).await?;
                tx.commit().await?;

                tracing::info!(
                    request_id = %request.id,
                    ticket_id = %updated.id,
                    status = updated.status.as_str(),
                    "Ticket status changed"
                );
                Ok(updated)
            })
            .await
    }
}

/// Tickets change only on approved, not yet finalized requests.
fn ensure_ticketable(request: &Request) -> Result<()> {
    match request.status {
        RequestStatus::Aprobado | RequestStatus::ParcialmenteAprobado | RequestStatus::Emitido => {
            Ok(())
        }
        other => Err(Error::InvalidState(format!(
            "request {} is {} and its tickets cannot change",
            request.code,
            other.as_str()
        ))),
    }
}

/// An EMITIDO leg whose last emitted ticket is gone goes back to APROBADO.
fn settle_leg(leg: &mut RequestItem) -> Result<()> {
    if leg.status == LegStatus::Emitido && !leg.has_emitted_ticket() {
        leg.set_status(LegStatus::Aprobado)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::LegKind;
    use chrono::Utc;

    fn emitted_leg() -> RequestItem {
        let request_id = RequestId::new();
        let leg_id = RequestItemId::new();
        RequestItem {
            id: leg_id,
            request_id,
            kind: LegKind::Outbound,
            origin: "LPB".into(),
            destination: "CBB".into(),
            departure: None,
            status: LegStatus::Emitido,
            tickets: vec![Ticket {
                id: TicketId::new(),
                request_id,
                item_id: leg_id,
                number: "930-100".into(),
                airline: "BoA".into(),
                flight_date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
                cost: Money::from_cents(80_000),
                penalty: None,
                notes: String::new(),
                status: TicketStatus::Emitido,
                supersedes: None,
                created_at: Utc::now(),
            }],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn leg_keeps_emitted_status_while_a_ticket_is_live() {
        let mut leg = emitted_leg();
        settle_leg(&mut leg).unwrap();
        assert_eq!(leg.status, LegStatus::Emitido);
    }

    #[test]
    fn leg_returns_to_approved_when_its_ticket_is_returned() {
        let mut leg = emitted_leg();
        leg.tickets[0].set_status(TicketStatus::Anulado).unwrap();
        settle_leg(&mut leg).unwrap();
        assert_eq!(leg.status, LegStatus::Aprobado);
    }

    #[test]
    fn flown_ticket_keeps_leg_emitted() {
        let mut leg = emitted_leg();
        leg.tickets[0].set_status(TicketStatus::Usado).unwrap();
        settle_leg(&mut leg).unwrap();
        assert_eq!(leg.status, LegStatus::Emitido);
    }
}
