//! Builders for request and ticket inputs.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for fixed dates

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use pasajes_core::ids::{MemberId, QuotaItemId, TicketId};
use pasajes_core::model::{ItineraryKind, Money, RequestType, Scope};
use pasajes_core::requests::{LegInput, NewRequest, NewTicket};

/// `year-month-day hour:00:00` UTC.
///
/// # Panics
///
/// Panics on an invalid date.
#[must_use]
pub fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}

/// A calendar date.
///
/// # Panics
///
/// Panics on an invalid date.
#[must_use]
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// A ticket for `flight_date` with a fixed fare.
#[must_use]
pub fn ticket(number: &str, flight_date: NaiveDate) -> NewTicket {
    NewTicket {
        number: number.to_string(),
        airline: "BoA".to_string(),
        flight_date,
        cost: Money::from_cents(85_000),
        supersedes: None,
    }
}

/// Fluent builder for [`NewRequest`].
///
/// # Example
///
/// ```
/// use pasajes_core::ids::MemberId;
/// use pasajes_core::model::ItineraryKind;
/// use pasajes_testing::{RequestBuilder, at};
///
/// let new = RequestBuilder::quota(MemberId::new())
///     .round_trip("LPB", "SRZ", at(2025, 1, 8, 9), Some(at(2025, 1, 10, 18)))
///     .build();
/// assert_eq!(new.itinerary, ItineraryKind::RoundTrip);
/// ```
#[derive(Clone, Debug)]
pub struct RequestBuilder {
    request: NewRequest,
}

impl RequestBuilder {
    /// A quota-consuming domestic request for `beneficiary`.
    #[must_use]
    pub fn quota(beneficiary: MemberId) -> Self {
        Self::of_type(beneficiary, RequestType::UsoCupo)
    }

    /// A domestic request of any type.
    #[must_use]
    pub fn of_type(beneficiary: MemberId, request_type: RequestType) -> Self {
        Self {
            request: NewRequest {
                beneficiary,
                request_type,
                scope: Scope::Nacional,
                itinerary: ItineraryKind::OneWayOutbound,
                quota_item: None,
                reason: "Sesión de comisión".to_string(),
                outbound: None,
                return_leg: None,
            },
        }
    }

    /// Outbound-only itinerary.
    #[must_use]
    pub fn one_way(mut self, origin: &str, destination: &str, departure: DateTime<Utc>) -> Self {
        self.request.itinerary = ItineraryKind::OneWayOutbound;
        self.request.outbound = Some(LegInput::new(origin, destination, Some(departure)));
        self.request.return_leg = None;
        self
    }

    /// Round trip; the return date may be left open.
    #[must_use]
    pub fn round_trip(
        mut self,
        origin: &str,
        destination: &str,
        departure: DateTime<Utc>,
        back: Option<DateTime<Utc>>,
    ) -> Self {
        self.request.itinerary = ItineraryKind::RoundTrip;
        self.request.outbound = Some(LegInput::new(origin, destination, Some(departure)));
        self.request.return_leg = Some(LegInput::new(destination, origin, back));
        self
    }

    /// Consume a specific item instead of letting the engine pick one.
    #[must_use]
    pub const fn item(mut self, item: QuotaItemId) -> Self {
        self.request.quota_item = Some(item);
        self
    }

    /// Set the scope.
    #[must_use]
    pub const fn scope(mut self, scope: Scope) -> Self {
        self.request.scope = scope;
        self
    }

    /// Set the reason.
    #[must_use]
    pub fn reason(mut self, reason: &str) -> Self {
        self.request.reason = reason.to_string();
        self
    }

    /// Finish.
    #[must_use]
    pub fn build(self) -> NewRequest {
        self.request
    }
}

/// A ticket that replaces `supersedes`.
#[must_use]
pub fn replacement(number: &str, flight_date: NaiveDate, supersedes: TicketId) -> NewTicket {
    NewTicket {
        supersedes: Some(supersedes),
        ..ticket(number, flight_date)
    }
}
