//! Domain entities: quota aggregates and items, requests, legs, tickets and
//! liquidations.

use crate::error::{Error, Result};
use crate::ids::{
    LiquidationId, MemberId, QuotaAggregateId, QuotaItemId, RequestId, RequestItemId, TicketId,
};
use crate::period::{Period, WeekWindow};
use crate::state::{
    LegStatus, LiquidationStatus, QuotaItemState, RequestStatus, StateMachine, TicketStatus,
    derive_request_status,
};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

// ============================================================================
// Catalog
// ============================================================================

/// Money amount in cents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Create an amount from cents.
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Amount in cents.
    #[must_use]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Whether the amount is negative.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, (self.0 % 100).abs())
    }
}

macro_rules! catalog_code {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $code:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every code.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Storage code.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $code),+
                }
            }

            /// Parse a storage code.
            ///
            /// # Errors
            ///
            /// Returns [`Error::Validation`] for an unknown code.
            pub fn parse(value: &str) -> Result<Self> {
                match value {
                    $($code => Ok(Self::$variant),)+
                    other => Err(Error::Validation(format!(
                        concat!("unknown ", stringify!($name), ": {}"),
                        other
                    ))),
                }
            }
        }
    };
}

catalog_code!(
    /// Kind of trip, which drives whether a quota item is consumed.
    RequestType {
        /// Travel against the member's own weekly right
        UsoCupo => "USO_CUPO",
        /// Official commission
        Comision => "COMISION",
        /// Official invitation
        Invitacion => "INVITACION",
    }
);

impl RequestType {
    /// Whether a request of this type consumes a quota item.
    #[must_use]
    pub const fn consumes_quota(self) -> bool {
        matches!(self, Self::UsoCupo)
    }
}

catalog_code!(
    /// Geographic scope.
    Scope {
        /// Domestic
        Nacional => "NACIONAL",
        /// International
        Internacional => "INTERNACIONAL",
    }
);

catalog_code!(
    /// Itinerary shape, fixing which legs a request has.
    ItineraryKind {
        /// Outbound only
        OneWayOutbound => "SOLO_IDA",
        /// Outbound and return
        RoundTrip => "IDA_VUELTA",
        /// Return only
        OneWayReturn => "SOLO_VUELTA",
    }
);

catalog_code!(
    /// Direction of a request leg.
    LegKind {
        /// Outbound
        Outbound => "IDA",
        /// Return
        Return => "VUELTA",
    }
);

/// Explicit request-type ↔ scope association with its own lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeScope {
    /// Request type
    pub request_type: RequestType,
    /// Scope
    pub scope: Scope,
    /// Whether new requests may use the pair
    pub active: bool,
}

// ============================================================================
// Quota
// ============================================================================

/// Per-titular, per-period entitlement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaAggregate {
    /// Identifier
    pub id: QuotaAggregateId,
    /// Owning titular
    pub titular: MemberId,
    /// Period
    pub period: Period,
    /// Weekly windows in the period
    pub total_weeks: u32,
    /// `total_weeks` × units per week
    pub total_units: u32,
    /// Cached projection of consumed units, resynchronised from the items
    pub consumed_units: u32,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl QuotaAggregate {
    /// Remaining units according to the cached projection.
    #[must_use]
    pub const fn remaining_units(&self) -> u32 {
        self.total_units.saturating_sub(self.consumed_units)
    }
}

/// Origin of a transferred quota item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Holder before the transfer
    pub from: MemberId,
    /// When the transfer happened
    pub at: DateTime<Utc>,
    /// Stated reason
    pub reason: String,
}

/// One weekly unit of travel-rights entitlement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaItem {
    /// Identifier
    pub id: QuotaItemId,
    /// Parent aggregate
    pub aggregate_id: QuotaAggregateId,
    /// Owning titular
    pub titular: MemberId,
    /// Currently assigned holder (titular or an alternate)
    pub holder: MemberId,
    /// Period
    pub period: Period,
    /// Week number within the period
    pub week: u32,
    /// Human label (`SEMANA n`)
    pub label: String,
    /// First valid day
    pub valid_from: NaiveDate,
    /// Last valid day
    pub valid_to: NaiveDate,
    /// Lifecycle state
    pub state: QuotaItemState,
    /// Set once the item has been transferred away from its titular
    pub transfer: Option<Transfer>,
}

impl QuotaItem {
    /// Fresh item for `window`, held by its titular.
    #[must_use]
    pub fn for_window(aggregate: &QuotaAggregate, window: &WeekWindow) -> Self {
        Self {
            id: QuotaItemId::new(),
            aggregate_id: aggregate.id,
            titular: aggregate.titular,
            holder: aggregate.titular,
            period: aggregate.period,
            week: window.number,
            label: window.label(),
            valid_from: window.from,
            valid_to: window.to,
            state: QuotaItemState::Disponible,
            transfer: None,
        }
    }

    /// Whether the item has been handed to someone other than its titular.
    #[must_use]
    pub const fn is_transferred(&self) -> bool {
        self.transfer.is_some()
    }

    /// Instant after which the item is vencido: start of the window's last
    /// day plus grace.
    #[must_use]
    pub fn expires_at(&self, grace: TimeDelta) -> DateTime<Utc> {
        self.valid_to.and_time(NaiveTime::MIN).and_utc() + grace
    }

    /// Whether the item is vencido at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, grace: TimeDelta) -> bool {
        now > self.expires_at(grace)
    }

    /// Whether the item may be requested or transferred at `now`.
    #[must_use]
    pub fn is_available(&self, now: DateTime<Utc>, grace: TimeDelta) -> bool {
        self.state == QuotaItemState::Disponible && !self.is_expired(now, grace)
    }

    /// Whether the validity window contains `date`.
    #[must_use]
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.valid_from <= date && date <= self.valid_to
    }

    /// Move to `next` through the transition table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the transition is not allowed.
    pub fn set_state(&mut self, next: QuotaItemState) -> Result<()> {
        self.state = self.state.transition(next)?;
        Ok(())
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Creation, update and soft-deletion stamps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Creating member
    pub created_by: MemberId,
    /// Last update time
    pub updated_at: DateTime<Utc>,
    /// Last updating member
    pub updated_by: MemberId,
    /// Soft-deletion time
    pub deleted_at: Option<DateTime<Utc>>,
    /// Soft-deleting member
    pub deleted_by: Option<MemberId>,
}

impl Audit {
    /// Stamps for a new record.
    #[must_use]
    pub const fn created(by: MemberId, at: DateTime<Utc>) -> Self {
        Self {
            created_at: at,
            created_by: by,
            updated_at: at,
            updated_by: by,
            deleted_at: None,
            deleted_by: None,
        }
    }

    /// Record an update.
    pub fn touch(&mut self, by: MemberId, at: DateTime<Utc>) {
        self.updated_at = at;
        self.updated_by = by;
    }
}

/// Ticket issued against a leg.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Identifier
    pub id: TicketId,
    /// Owning request
    pub request_id: RequestId,
    /// Owning leg
    pub item_id: RequestItemId,
    /// Airline ticket number, unique system-wide
    pub number: String,
    /// Carrier
    pub airline: String,
    /// Flight date
    pub flight_date: NaiveDate,
    /// Fare
    pub cost: Money,
    /// Penalty charged when the ticket was returned
    pub penalty: Option<Money>,
    /// Free-form notes, appended to on return
    pub notes: String,
    /// Lifecycle state
    pub status: TicketStatus,
    /// Ticket this one rebooks
    pub supersedes: Option<TicketId>,
    /// Registration time
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    /// Move to `next` through the transition table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the transition is not allowed.
    pub fn set_status(&mut self, next: TicketStatus) -> Result<()> {
        self.status = self.status.transition(next)?;
        Ok(())
    }

    /// Append a line to the notes.
    pub fn append_note(&mut self, note: &str) {
        if note.trim().is_empty() {
            return;
        }
        if !self.notes.is_empty() {
            self.notes.push('\n');
        }
        self.notes.push_str(note.trim());
    }
}

/// One leg of a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestItem {
    /// Identifier
    pub id: RequestItemId,
    /// Owning request
    pub request_id: RequestId,
    /// Direction
    pub kind: LegKind,
    /// Origin city or airport
    pub origin: String,
    /// Destination city or airport
    pub destination: String,
    /// Scheduled departure, absent for a pending return leg
    pub departure: Option<DateTime<Utc>>,
    /// Lifecycle state
    pub status: LegStatus,
    /// Tickets issued over time, oldest first
    pub tickets: Vec<Ticket>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl RequestItem {
    /// Whether any ticket on this leg is not void.
    #[must_use]
    pub fn has_active_ticket(&self) -> bool {
        self.tickets.iter().any(|t| t.status.is_active())
    }

    /// The non-void ticket, if any.
    #[must_use]
    pub fn active_ticket(&self) -> Option<&Ticket> {
        self.tickets.iter().find(|t| t.status.is_active())
    }

    /// Whether a ticket on this leg has been emitted or flown.
    #[must_use]
    pub fn has_emitted_ticket(&self) -> bool {
        self.tickets
            .iter()
            .any(|t| matches!(t.status, TicketStatus::Emitido | TicketStatus::Usado))
    }

    /// Move to `next` through the transition table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the transition is not allowed.
    pub fn set_status(&mut self, next: LegStatus) -> Result<()> {
        self.status = self.status.transition(next)?;
        Ok(())
    }
}

/// A travel request with its legs and their tickets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Identifier
    pub id: RequestId,
    /// Human-readable code (`SPD-250001`)
    pub code: String,
    /// Member who filed the request
    pub requester: MemberId,
    /// Member who travels
    pub beneficiary: MemberId,
    /// Type
    pub request_type: RequestType,
    /// Scope
    pub scope: Scope,
    /// Itinerary shape
    pub itinerary: ItineraryKind,
    /// Consumed quota item, for quota-consuming types
    pub quota_item: Option<QuotaItemId>,
    /// Request-level state
    pub status: RequestStatus,
    /// Stated purpose of the trip
    pub reason: String,
    /// Legs in creation order; rescheduled legs stay as history
    pub legs: SmallVec<[RequestItem; 2]>,
    /// Audit stamps
    pub audit: Audit,
}

impl Request {
    /// Whether the request has been soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.audit.deleted_at.is_some()
    }

    /// Whether the request holds its quota item: not rejected, not deleted.
    #[must_use]
    pub const fn holds_quota(&self) -> bool {
        self.status.holds_quota() && !self.is_deleted()
    }

    /// Look up a leg.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the leg does not belong to this request.
    pub fn leg(&self, id: RequestItemId) -> Result<&RequestItem> {
        self.legs
            .iter()
            .find(|leg| leg.id == id)
            .ok_or_else(|| Error::not_found("request leg", id))
    }

    /// Look up a leg mutably.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the leg does not belong to this request.
    pub fn leg_mut(&mut self, id: RequestItemId) -> Result<&mut RequestItem> {
        self.legs
            .iter_mut()
            .find(|leg| leg.id == id)
            .ok_or_else(|| Error::not_found("request leg", id))
    }

    /// Position of a ticket as `(leg index, ticket index)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no leg carries the ticket.
    pub fn locate_ticket(&self, id: TicketId) -> Result<(usize, usize)> {
        self.legs
            .iter()
            .enumerate()
            .find_map(|(leg, item)| {
                item.tickets
                    .iter()
                    .position(|t| t.id == id)
                    .map(|ticket| (leg, ticket))
            })
            .ok_or_else(|| Error::not_found("ticket", id))
    }

    /// Whether any leg carries a non-void ticket.
    #[must_use]
    pub fn has_active_ticket(&self) -> bool {
        self.legs.iter().any(RequestItem::has_active_ticket)
    }

    /// Latest flight date among emitted or flown tickets.
    #[must_use]
    pub fn latest_flight_date(&self) -> Option<NaiveDate> {
        self.legs
            .iter()
            .flat_map(|leg| leg.tickets.iter())
            .filter(|t| matches!(t.status, TicketStatus::Emitido | TicketStatus::Usado))
            .map(|t| t.flight_date)
            .max()
    }

    /// First scheduled departure among live legs.
    #[must_use]
    pub fn first_departure(&self) -> Option<DateTime<Utc>> {
        self.legs
            .iter()
            .filter(|leg| !leg.status.is_superseded())
            .filter_map(|leg| leg.departure)
            .min()
    }

    /// Re-derive the request status from the legs, validating the change
    /// against the request transition table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the derived status is not reachable.
    pub fn rederive_status(&mut self) -> Result<()> {
        match derive_request_status(self.legs.iter().map(|leg| leg.status)) {
            Some(next) if next != self.status => {
                self.status = self.status.transition(next)?;
            }
            _ => {}
        }
        Ok(())
    }
}

// ============================================================================
// Liquidation
// ============================================================================

/// Post-trip expense report closing a request; one per request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liquidation {
    /// Identifier
    pub id: LiquidationId,
    /// Human-readable code (`DES-250001`)
    pub code: String,
    /// Closed request
    pub request_id: RequestId,
    /// Lifecycle state
    pub status: LiquidationStatus,
    /// Member who submitted the report
    pub submitted_by: MemberId,
    /// Approving administrator
    pub approved_by: Option<MemberId>,
    /// Approval time
    pub approved_at: Option<DateTime<Utc>>,
    /// Submission time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}
