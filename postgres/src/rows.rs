//! Row shapes and their conversion into domain entities.

use crate::error::corrupt;
use chrono::{DateTime, NaiveDate, Utc};
use pasajes_core::error::Result;
use pasajes_core::ids::{
    LiquidationId, MemberId, QuotaAggregateId, QuotaItemId, RequestId, RequestItemId, TicketId,
};
use pasajes_core::member::{Member, MemberKind, Role};
use pasajes_core::model::{
    Audit, ItineraryKind, LegKind, Liquidation, Money, QuotaAggregate, QuotaItem, Request,
    RequestItem, RequestType, Scope, Ticket, Transfer, TypeScope,
};
use pasajes_core::period::Period;
use pasajes_core::state::{
    LegStatus, LiquidationStatus, QuotaItemState, RequestStatus, StateMachine, TicketStatus,
};
use uuid::Uuid;

pub(crate) fn to_i32(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|e| corrupt("integer", e))
}

fn to_u32(value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|e| corrupt("integer", e))
}

fn period(year: i32, month: i32) -> Result<Period> {
    Period::new(year, to_u32(month)?)
}

/// Storage code of a member kind; the titular is stored alongside.
pub(crate) const fn kind_code(kind: MemberKind) -> (&'static str, Option<MemberId>) {
    match kind {
        MemberKind::Titular => ("TITULAR", None),
        MemberKind::Alternate { titular } => ("SUPLENTE", Some(titular)),
        MemberKind::Other => ("OTRO", None),
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct MemberRow {
    id: Uuid,
    full_name: String,
    email: Option<String>,
    role: String,
    kind: String,
    titular_id: Option<Uuid>,
    delegate_id: Option<Uuid>,
    active: bool,
}

impl TryFrom<MemberRow> for Member {
    type Error = pasajes_core::Error;

    fn try_from(row: MemberRow) -> Result<Self> {
        let kind = match (row.kind.as_str(), row.titular_id) {
            ("TITULAR", None) => MemberKind::Titular,
            ("SUPLENTE", Some(titular)) => MemberKind::Alternate {
                titular: MemberId::from_uuid(titular),
            },
            ("OTRO", None) => MemberKind::Other,
            (other, _) => return Err(corrupt("member", format!("kind {other} for {}", row.id))),
        };
        Ok(Self {
            id: MemberId::from_uuid(row.id),
            full_name: row.full_name,
            email: row.email,
            role: Role::parse(&row.role)?,
            kind,
            delegate: row.delegate_id.map(MemberId::from_uuid),
            active: row.active,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct TypeScopeRow {
    request_type: String,
    scope: String,
    active: bool,
}

impl TryFrom<TypeScopeRow> for TypeScope {
    type Error = pasajes_core::Error;

    fn try_from(row: TypeScopeRow) -> Result<Self> {
        Ok(Self {
            request_type: RequestType::parse(&row.request_type)?,
            scope: Scope::parse(&row.scope)?,
            active: row.active,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct AggregateRow {
    id: Uuid,
    titular_id: Uuid,
    year: i32,
    month: i32,
    total_weeks: i32,
    total_units: i32,
    consumed_units: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<AggregateRow> for QuotaAggregate {
    type Error = pasajes_core::Error;

    fn try_from(row: AggregateRow) -> Result<Self> {
        Ok(Self {
            id: QuotaAggregateId::from_uuid(row.id),
            titular: MemberId::from_uuid(row.titular_id),
            period: period(row.year, row.month)?,
            total_weeks: to_u32(row.total_weeks)?,
            total_units: to_u32(row.total_units)?,
            consumed_units: to_u32(row.consumed_units)?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ItemRow {
    id: Uuid,
    aggregate_id: Uuid,
    titular_id: Uuid,
    holder_id: Uuid,
    year: i32,
    month: i32,
    week: i32,
    label: String,
    valid_from: NaiveDate,
    valid_to: NaiveDate,
    state: String,
    transferred_from: Option<Uuid>,
    transferred_at: Option<DateTime<Utc>>,
    transfer_reason: Option<String>,
}

impl TryFrom<ItemRow> for QuotaItem {
    type Error = pasajes_core::Error;

    fn try_from(row: ItemRow) -> Result<Self> {
        let transfer = match (row.transferred_from, row.transferred_at) {
            (Some(from), Some(at)) => Some(Transfer {
                from: MemberId::from_uuid(from),
                at,
                reason: row.transfer_reason.unwrap_or_default(),
            }),
            (None, None) => None,
            _ => return Err(corrupt("quota item", format!("partial transfer on {}", row.id))),
        };
        Ok(Self {
            id: QuotaItemId::from_uuid(row.id),
            aggregate_id: QuotaAggregateId::from_uuid(row.aggregate_id),
            titular: MemberId::from_uuid(row.titular_id),
            holder: MemberId::from_uuid(row.holder_id),
            period: period(row.year, row.month)?,
            week: to_u32(row.week)?,
            label: row.label,
            valid_from: row.valid_from,
            valid_to: row.valid_to,
            state: QuotaItemState::parse(&row.state)?,
            transfer,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct RequestRow {
    id: Uuid,
    code: String,
    requester_id: Uuid,
    beneficiary_id: Uuid,
    request_type: String,
    scope: String,
    itinerary: String,
    quota_item_id: Option<Uuid>,
    status: String,
    reason: String,
    created_at: DateTime<Utc>,
    created_by: Uuid,
    updated_at: DateTime<Utc>,
    updated_by: Uuid,
    deleted_at: Option<DateTime<Utc>>,
    deleted_by: Option<Uuid>,
}

impl RequestRow {
    pub(crate) const fn id(&self) -> Uuid {
        self.id
    }

    /// Assemble the request from its legs (ordered by position) and their
    /// tickets (ordered by position).
    pub(crate) fn assemble(self, legs: Vec<LegRow>, tickets: Vec<TicketRow>) -> Result<Request> {
        let mut assembled = legs
            .into_iter()
            .map(RequestItem::try_from)
            .collect::<Result<smallvec::SmallVec<[RequestItem; 2]>>>()?;
        for row in tickets {
            let ticket = Ticket::try_from(row)?;
            let leg = assembled
                .iter_mut()
                .find(|leg| leg.id == ticket.item_id)
                .ok_or_else(|| corrupt("ticket", format!("orphan ticket {}", ticket.id)))?;
            leg.tickets.push(ticket);
        }

        Ok(Request {
            id: RequestId::from_uuid(self.id),
            code: self.code,
            requester: MemberId::from_uuid(self.requester_id),
            beneficiary: MemberId::from_uuid(self.beneficiary_id),
            request_type: RequestType::parse(&self.request_type)?,
            scope: Scope::parse(&self.scope)?,
            itinerary: ItineraryKind::parse(&self.itinerary)?,
            quota_item: self.quota_item_id.map(QuotaItemId::from_uuid),
            status: RequestStatus::parse(&self.status)?,
            reason: self.reason,
            legs: assembled,
            audit: Audit {
                created_at: self.created_at,
                created_by: MemberId::from_uuid(self.created_by),
                updated_at: self.updated_at,
                updated_by: MemberId::from_uuid(self.updated_by),
                deleted_at: self.deleted_at,
                deleted_by: self.deleted_by.map(MemberId::from_uuid),
            },
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct LegRow {
    id: Uuid,
    request_id: Uuid,
    kind: String,
    origin: String,
    destination: String,
    departure: Option<DateTime<Utc>>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<LegRow> for RequestItem {
    type Error = pasajes_core::Error;

    fn try_from(row: LegRow) -> Result<Self> {
        Ok(Self {
            id: RequestItemId::from_uuid(row.id),
            request_id: RequestId::from_uuid(row.request_id),
            kind: LegKind::parse(&row.kind)?,
            origin: row.origin,
            destination: row.destination,
            departure: row.departure,
            status: LegStatus::parse(&row.status)?,
            tickets: Vec::new(),
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct TicketRow {
    id: Uuid,
    request_id: Uuid,
    item_id: Uuid,
    number: String,
    airline: String,
    flight_date: NaiveDate,
    cost_cents: i64,
    penalty_cents: Option<i64>,
    notes: String,
    status: String,
    supersedes: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = pasajes_core::Error;

    fn try_from(row: TicketRow) -> Result<Self> {
        Ok(Self {
            id: TicketId::from_uuid(row.id),
            request_id: RequestId::from_uuid(row.request_id),
            item_id: RequestItemId::from_uuid(row.item_id),
            number: row.number,
            airline: row.airline,
            flight_date: row.flight_date,
            cost: Money::from_cents(row.cost_cents),
            penalty: row.penalty_cents.map(Money::from_cents),
            notes: row.notes,
            status: TicketStatus::parse(&row.status)?,
            supersedes: row.supersedes.map(TicketId::from_uuid),
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct LiquidationRow {
    id: Uuid,
    code: String,
    request_id: Uuid,
    status: String,
    submitted_by: Uuid,
    approved_by: Option<Uuid>,
    approved_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LiquidationRow> for Liquidation {
    type Error = pasajes_core::Error;

    fn try_from(row: LiquidationRow) -> Result<Self> {
        Ok(Self {
            id: LiquidationId::from_uuid(row.id),
            code: row.code,
            request_id: RequestId::from_uuid(row.request_id),
            status: LiquidationStatus::parse(&row.status)?,
            submitted_by: MemberId::from_uuid(row.submitted_by),
            approved_by: row.approved_by.map(MemberId::from_uuid),
            approved_at: row.approved_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
