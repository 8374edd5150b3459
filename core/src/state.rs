//! Lifecycle states and their transition tables.
//!
//! Each entity's state is a closed enum. Every change goes through
//! [`StateMachine::transition`], which consults the entity's exhaustive
//! table and rejects anything not listed with [`Error::InvalidState`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A closed lifecycle state with a central transition table.
pub trait StateMachine: Copy + Eq + Debug + Send + Sync + 'static {
    /// Entity name used in error messages.
    const ENTITY: &'static str;

    /// Every state, in declaration order.
    const ALL: &'static [Self];

    /// Storage code.
    fn as_str(self) -> &'static str;

    /// Whether the table contains `self -> next`.
    fn can_transition_to(self, next: Self) -> bool;

    /// Validate `self -> next` against the table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the pair is not in the table.
    fn transition(self, next: Self) -> Result<Self> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(Error::InvalidState(format!(
                "{} cannot move from {} to {}",
                Self::ENTITY,
                self.as_str(),
                next.as_str()
            )))
        }
    }

    /// Parse a storage code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an unknown code.
    fn parse(value: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == value)
            .ok_or_else(|| Error::Validation(format!("unknown {} state: {value}", Self::ENTITY)))
    }
}

// ============================================================================
// Quota item
// ============================================================================

/// Quota item lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuotaItemState {
    /// Free to be requested or transferred
    Disponible,
    /// Committed to an active request
    Reservado,
    /// Consumed by a finalized request
    Usado,
}

impl StateMachine for QuotaItemState {
    const ENTITY: &'static str = "quota item";
    const ALL: &'static [Self] = &[Self::Disponible, Self::Reservado, Self::Usado];

    fn as_str(self) -> &'static str {
        match self {
            Self::Disponible => "DISPONIBLE",
            Self::Reservado => "RESERVADO",
            Self::Usado => "USADO",
        }
    }

    fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Disponible, Self::Reservado)
                | (Self::Reservado, Self::Disponible | Self::Usado)
                | (Self::Usado, Self::Reservado)
        )
    }
}

// ============================================================================
// Request
// ============================================================================

/// Request-level lifecycle, derived from the legs after every leg change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Initial state
    Solicitado,
    /// Some legs approved, others not
    ParcialmenteAprobado,
    /// Every leg approved
    Aprobado,
    /// Every leg ticketed
    Emitido,
    /// Closed by liquidation approval
    Finalizado,
    /// Every leg rejected (terminal)
    Rechazado,
}

impl RequestStatus {
    /// States from which an administrator may revert approval.
    #[must_use]
    pub const fn is_revertible(self) -> bool {
        matches!(self, Self::Aprobado | Self::ParcialmenteAprobado | Self::Emitido)
    }

    /// Whether a request in this state still holds its quota item.
    #[must_use]
    pub const fn holds_quota(self) -> bool {
        !matches!(self, Self::Rechazado)
    }
}

impl StateMachine for RequestStatus {
    const ENTITY: &'static str = "request";
    const ALL: &'static [Self] = &[
        Self::Solicitado,
        Self::ParcialmenteAprobado,
        Self::Aprobado,
        Self::Emitido,
        Self::Finalizado,
        Self::Rechazado,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Solicitado => "SOLICITADO",
            Self::ParcialmenteAprobado => "PARCIALMENTE_APROBADO",
            Self::Aprobado => "APROBADO",
            Self::Emitido => "EMITIDO",
            Self::Finalizado => "FINALIZADO",
            Self::Rechazado => "RECHAZADO",
        }
    }

    fn can_transition_to(self, next: Self) -> bool {
        use RequestStatus::{
            Aprobado, Emitido, Finalizado, ParcialmenteAprobado, Rechazado, Solicitado,
        };
        matches!(
            (self, next),
            (Solicitado, ParcialmenteAprobado | Aprobado | Rechazado)
                | (ParcialmenteAprobado, Solicitado | Aprobado | Emitido | Rechazado)
                | (Aprobado, Solicitado | ParcialmenteAprobado | Emitido | Rechazado)
                | (Emitido, Solicitado | ParcialmenteAprobado | Aprobado | Finalizado)
                | (Finalizado, Emitido)
        )
    }
}

// ============================================================================
// Request leg
// ============================================================================

/// Per-leg lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegStatus {
    /// Return leg submitted without a date
    Pendiente,
    /// Awaiting approval
    Solicitado,
    /// Approved by an administrator
    Aprobado,
    /// Rejected by an administrator (terminal)
    Rechazado,
    /// Ticket emitted
    Emitido,
    /// Closed by liquidation approval
    Finalizado,
    /// Superseded by a rescheduled leg (terminal)
    Reprogramado,
    /// Withdrawn before it was ever requested (terminal)
    Cancelado,
}

impl LegStatus {
    /// Approved for the purpose of request-state derivation.
    #[must_use]
    pub const fn is_approved(self) -> bool {
        matches!(self, Self::Aprobado | Self::Emitido | Self::Finalizado)
    }

    /// Superseded legs are history and ignored by derivation.
    #[must_use]
    pub const fn is_superseded(self) -> bool {
        matches!(self, Self::Reprogramado | Self::Cancelado)
    }

    /// Rejected or still undated; only counts when nothing else is live.
    #[must_use]
    pub const fn is_dormant(self) -> bool {
        matches!(self, Self::Rechazado | Self::Pendiente)
    }
}

impl StateMachine for LegStatus {
    const ENTITY: &'static str = "request leg";
    const ALL: &'static [Self] = &[
        Self::Pendiente,
        Self::Solicitado,
        Self::Aprobado,
        Self::Rechazado,
        Self::Emitido,
        Self::Finalizado,
        Self::Reprogramado,
        Self::Cancelado,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Pendiente => "PENDIENTE",
            Self::Solicitado => "SOLICITADO",
            Self::Aprobado => "APROBADO",
            Self::Rechazado => "RECHAZADO",
            Self::Emitido => "EMITIDO",
            Self::Finalizado => "FINALIZADO",
            Self::Reprogramado => "REPROGRAMADO",
            Self::Cancelado => "CANCELADO",
        }
    }

    fn can_transition_to(self, next: Self) -> bool {
        use LegStatus::{
            Aprobado, Cancelado, Emitido, Finalizado, Pendiente, Rechazado, Reprogramado,
            Solicitado,
        };
        matches!(
            (self, next),
            (Pendiente, Solicitado | Rechazado | Cancelado)
                | (Solicitado, Aprobado | Rechazado | Reprogramado)
                | (Aprobado, Solicitado | Rechazado | Emitido | Reprogramado)
                | (Emitido, Solicitado | Aprobado | Finalizado | Reprogramado)
                | (Finalizado, Emitido)
        )
    }
}

// ============================================================================
// Ticket
// ============================================================================

/// Ticket lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketStatus {
    /// Booked, not yet emitted
    Registrado,
    /// Emitted by the agency
    Emitido,
    /// Flown (terminal)
    Usado,
    /// Voided or returned (terminal)
    Anulado,
}

impl TicketStatus {
    /// A leg with any non-void ticket has an active ticket.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Anulado)
    }
}

impl StateMachine for TicketStatus {
    const ENTITY: &'static str = "ticket";
    const ALL: &'static [Self] = &[Self::Registrado, Self::Emitido, Self::Usado, Self::Anulado];

    fn as_str(self) -> &'static str {
        match self {
            Self::Registrado => "REGISTRADO",
            Self::Emitido => "EMITIDO",
            Self::Usado => "USADO",
            Self::Anulado => "ANULADO",
        }
    }

    fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Registrado, Self::Emitido | Self::Anulado)
                | (Self::Emitido, Self::Usado | Self::Anulado)
        )
    }
}

// ============================================================================
// Liquidation
// ============================================================================

/// Expense-liquidation lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiquidationStatus {
    /// Submitted, awaiting review
    EnRevision,
    /// Approved; the request is finalized
    Aprobado,
}

impl StateMachine for LiquidationStatus {
    const ENTITY: &'static str = "liquidation";
    const ALL: &'static [Self] = &[Self::EnRevision, Self::Aprobado];

    fn as_str(self) -> &'static str {
        match self {
            Self::EnRevision => "EN_REVISION",
            Self::Aprobado => "APROBADO",
        }
    }

    fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::EnRevision, Self::Aprobado) | (Self::Aprobado, Self::EnRevision)
        )
    }
}

/// Derive the request status from its leg states.
///
/// Superseded legs are ignored. Rejected and pending legs are dormant: they
/// are ignored while any other live leg remains. With only dormant legs
/// left, a pending leg keeps the request SOLICITADO. Returns `None` when no
/// live leg remains.
#[must_use]
pub fn derive_request_status<I>(legs: I) -> Option<RequestStatus>
where
    I: IntoIterator<Item = LegStatus>,
{
    let live: Vec<LegStatus> = legs.into_iter().filter(|leg| !leg.is_superseded()).collect();
    if live.is_empty() {
        return None;
    }

    let active: Vec<LegStatus> = live.iter().copied().filter(|leg| !leg.is_dormant()).collect();
    if active.is_empty() {
        let status = if live.contains(&LegStatus::Pendiente) {
            RequestStatus::Solicitado
        } else {
            RequestStatus::Rechazado
        };
        return Some(status);
    }

    let all_finalized = active.iter().all(|leg| *leg == LegStatus::Finalizado);
    let all_emitted = active
        .iter()
        .all(|leg| matches!(leg, LegStatus::Emitido | LegStatus::Finalizado));
    let all_approved = active.iter().all(|leg| leg.is_approved());
    let any_approved = active.iter().any(|leg| leg.is_approved());

    let status = if all_finalized {
        RequestStatus::Finalizado
    } else if all_emitted {
        RequestStatus::Emitido
    } else if all_approved {
        RequestStatus::Aprobado
    } else if any_approved {
        RequestStatus::ParcialmenteAprobado
    } else {
        RequestStatus::Solicitado
    };
    Some(status)
}
