//! Storage abstraction with explicit transactions.
//!
//! Every engine operation opens one [`Transaction`], performs all of its
//! reads and writes through it and commits. Dropping a transaction without
//! committing rolls everything back, which is how validation failures and
//! caller timeouts leave prior state untouched.
//!
//! Methods documented as *locking* must hold an exclusive row lock (or an
//! equivalent serialization) until the transaction ends. The engine relies
//! on them for check-then-set on quota items and for gapless sequences.

use crate::error::{Error, Result};
use crate::ids::{LiquidationId, MemberId, QuotaAggregateId, QuotaItemId, RequestId, TicketId};
use crate::member::Member;
use crate::model::{
    Liquidation, QuotaAggregate, QuotaItem, Request, RequestType, Scope, TypeScope,
};
use crate::period::Period;
use crate::sequence::DocumentType;
use std::future::Future;

/// A transactional store.
pub trait Storage: Send + Sync + 'static {
    /// Transaction handle.
    type Tx: Transaction;

    /// Open a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] if no connection can be obtained.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx>> + Send;
}

/// Unit of work over the store. Dropped without [`Transaction::commit`],
/// it rolls back.
///
/// All methods return [`crate::Error::Storage`] on backend failure.
pub trait Transaction: Send + Sized {
    /// Make every write visible atomically.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] if the commit fails; nothing is
    /// persisted in that case.
    fn commit(self) -> impl Future<Output = Result<()>> + Send;

    /// Serialize period-wide operations (generation, reset) for `period`.
    fn lock_period(&mut self, period: Period) -> impl Future<Output = Result<()>> + Send;

    /// *Locking.* Increment the counter for `(year, document)`, creating it
    /// at zero when absent, and return the new value.
    fn increment_sequence(
        &mut self,
        year: i32,
        document: DocumentType,
    ) -> impl Future<Output = Result<u32>> + Send;

    // ------------------------------------------------------------------
    // Members and catalog
    // ------------------------------------------------------------------

    /// Load a member.
    fn member(&mut self, id: MemberId) -> impl Future<Output = Result<Option<Member>>> + Send;

    /// Insert or replace a member.
    fn upsert_member(&mut self, member: &Member) -> impl Future<Output = Result<()>> + Send;

    /// Every active titular.
    fn active_titulars(&mut self) -> impl Future<Output = Result<Vec<Member>>> + Send;

    /// Load a request-type ↔ scope association.
    fn type_scope(
        &mut self,
        request_type: RequestType,
        scope: Scope,
    ) -> impl Future<Output = Result<Option<TypeScope>>> + Send;

    /// Insert or replace a request-type ↔ scope association.
    fn upsert_type_scope(
        &mut self,
        association: &TypeScope,
    ) -> impl Future<Output = Result<()>> + Send;

    // ------------------------------------------------------------------
    // Quota
    // ------------------------------------------------------------------

    /// Load the aggregate for `(titular, period)`.
    fn quota_aggregate(
        &mut self,
        titular: MemberId,
        period: Period,
    ) -> impl Future<Output = Result<Option<QuotaAggregate>>> + Send;

    /// Every aggregate in `period`.
    fn quota_aggregates(
        &mut self,
        period: Period,
    ) -> impl Future<Output = Result<Vec<QuotaAggregate>>> + Send;

    /// Insert or replace an aggregate.
    fn save_quota_aggregate(
        &mut self,
        aggregate: &QuotaAggregate,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Hard-delete an aggregate. Its items must already be gone.
    fn delete_quota_aggregate(
        &mut self,
        id: QuotaAggregateId,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Items of an aggregate, ordered by week.
    fn quota_items(
        &mut self,
        aggregate: QuotaAggregateId,
    ) -> impl Future<Output = Result<Vec<QuotaItem>>> + Send;

    /// Items currently held by `holder` in `period`, ordered by week.
    fn quota_items_held_by(
        &mut self,
        holder: MemberId,
        period: Period,
    ) -> impl Future<Output = Result<Vec<QuotaItem>>> + Send;

    /// *Locking.* Load one item.
    fn quota_item(
        &mut self,
        id: QuotaItemId,
    ) -> impl Future<Output = Result<Option<QuotaItem>>> + Send;

    /// Insert or replace an item.
    fn save_quota_item(&mut self, item: &QuotaItem) -> impl Future<Output = Result<()>> + Send;

    /// Hard-delete an item.
    fn delete_quota_item(&mut self, id: QuotaItemId) -> impl Future<Output = Result<()>> + Send;

    // ------------------------------------------------------------------
    // Requests and tickets
    // ------------------------------------------------------------------

    /// *Locking.* Load a request with its legs and tickets, soft-deleted
    /// ones included.
    fn request(&mut self, id: RequestId) -> impl Future<Output = Result<Option<Request>>> + Send;

    /// Insert or replace a request with its legs and tickets.
    fn save_request(&mut self, request: &Request) -> impl Future<Output = Result<()>> + Send;

    /// Every request (soft-deleted ones included) that references `item`.
    fn requests_for_quota_item(
        &mut self,
        item: QuotaItemId,
    ) -> impl Future<Output = Result<Vec<Request>>> + Send;

    /// Live requests in EMITIDO or FINALIZADO that have no liquidation.
    fn requests_awaiting_liquidation(
        &mut self,
    ) -> impl Future<Output = Result<Vec<Request>>> + Send;

    /// The request owning a ticket.
    fn ticket_request(
        &mut self,
        ticket: TicketId,
    ) -> impl Future<Output = Result<Option<RequestId>>> + Send;

    /// Whether a ticket number is already registered.
    fn ticket_number_exists(&mut self, number: &str) -> impl Future<Output = Result<bool>> + Send;

    // ------------------------------------------------------------------
    // Liquidations
    // ------------------------------------------------------------------

    /// *Locking.* Load a liquidation.
    fn liquidation(
        &mut self,
        id: LiquidationId,
    ) -> impl Future<Output = Result<Option<Liquidation>>> + Send;

    /// The liquidation of a request, if one was submitted.
    fn liquidation_for_request(
        &mut self,
        request: RequestId,
    ) -> impl Future<Output = Result<Option<Liquidation>>> + Send;

    /// Insert or replace a liquidation.
    fn save_liquidation(
        &mut self,
        liquidation: &Liquidation,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Load a member or fail with [`Error::NotFound`].
pub(crate) async fn require_member<T: Transaction>(tx: &mut T, id: MemberId) -> Result<Member> {
    tx.member(id).await?.ok_or_else(|| Error::not_found("member", id))
}

/// Lock a quota item or fail with [`Error::NotFound`].
pub(crate) async fn require_quota_item<T: Transaction>(
    tx: &mut T,
    id: QuotaItemId,
) -> Result<QuotaItem> {
    tx.quota_item(id)
        .await?
        .ok_or_else(|| Error::not_found("quota item", id))
}

/// Lock a live request; soft-deleted requests are reported as missing.
pub(crate) async fn require_request<T: Transaction>(tx: &mut T, id: RequestId) -> Result<Request> {
    match tx.request(id).await? {
        Some(request) if !request.is_deleted() => Ok(request),
        _ => Err(Error::not_found("request", id)),
    }
}

/// Lock a liquidation or fail with [`Error::NotFound`].
pub(crate) async fn require_liquidation<T: Transaction>(
    tx: &mut T,
    id: LiquidationId,
) -> Result<Liquidation> {
    tx.liquidation(id)
        .await?
        .ok_or_else(|| Error::not_found("liquidation", id))
}
