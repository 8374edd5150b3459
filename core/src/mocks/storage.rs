use crate::error::{Error, Result};
use crate::ids::{LiquidationId, MemberId, QuotaAggregateId, QuotaItemId, RequestId, TicketId};
use crate::member::Member;
use crate::model::{
    Liquidation, QuotaAggregate, QuotaItem, Request, RequestType, Scope, TypeScope,
};
use crate::period::Period;
use crate::sequence::DocumentType;
use crate::state::RequestStatus;
use crate::storage::{Storage, Transaction};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Committed contents of an [`InMemoryStorage`].
///
/// Also the working copy of an open transaction: writes go to the copy and
/// replace the committed state on commit.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    members: HashMap<MemberId, Member>,
    type_scopes: HashMap<(RequestType, Scope), TypeScope>,
    sequences: HashMap<(i32, DocumentType), u32>,
    aggregates: HashMap<QuotaAggregateId, QuotaAggregate>,
    items: HashMap<QuotaItemId, QuotaItem>,
    requests: HashMap<RequestId, Request>,
    liquidations: HashMap<LiquidationId, Liquidation>,
}

impl Snapshot {
    /// A member.
    #[must_use]
    pub fn member(&self, id: MemberId) -> Option<Member> {
        self.members.get(&id).cloned()
    }

    /// Last issued value of a counter, zero if never used.
    #[must_use]
    pub fn sequence(&self, year: i32, document: DocumentType) -> u32 {
        self.sequences.get(&(year, document)).copied().unwrap_or(0)
    }

    /// The aggregate of `(titular, period)`.
    #[must_use]
    pub fn aggregate(&self, titular: MemberId, period: Period) -> Option<QuotaAggregate> {
        self.aggregates
            .values()
            .find(|a| a.titular == titular && a.period == period)
            .cloned()
    }

    /// Every aggregate of a period.
    #[must_use]
    pub fn aggregates_in(&self, period: Period) -> Vec<QuotaAggregate> {
        self.aggregates
            .values()
            .filter(|a| a.period == period)
            .cloned()
            .collect()
    }

    /// A quota item.
    #[must_use]
    pub fn item(&self, id: QuotaItemId) -> Option<QuotaItem> {
        self.items.get(&id).cloned()
    }

    /// Items of a period, ordered by titular and week.
    #[must_use]
    pub fn items_in(&self, period: Period) -> Vec<QuotaItem> {
        let mut items: Vec<_> = self
            .items
            .values()
            .filter(|i| i.period == period)
            .cloned()
            .collect();
        items.sort_by_key(|i| (i.titular, i.week));
        items
    }

    /// Items held by `holder` in a period, ordered by week.
    #[must_use]
    pub fn items_held_by(&self, holder: MemberId, period: Period) -> Vec<QuotaItem> {
        let mut items: Vec<_> = self
            .items
            .values()
            .filter(|i| i.holder == holder && i.period == period)
            .cloned()
            .collect();
        items.sort_by_key(|i| (i.valid_from, i.week));
        items
    }

    /// A request, soft-deleted ones included.
    #[must_use]
    pub fn request(&self, id: RequestId) -> Option<Request> {
        self.requests.get(&id).cloned()
    }

    /// A liquidation.
    #[must_use]
    pub fn liquidation(&self, id: LiquidationId) -> Option<Liquidation> {
        self.liquidations.get(&id).cloned()
    }

    fn items_of(&self, aggregate: QuotaAggregateId) -> Vec<QuotaItem> {
        let mut items: Vec<_> = self
            .items
            .values()
            .filter(|i| i.aggregate_id == aggregate)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.week);
        items
    }

    fn with_seeded_catalog() -> Self {
        let mut snapshot = Self::default();
        for request_type in RequestType::ALL {
            for scope in Scope::ALL {
                snapshot.type_scopes.insert(
                    (*request_type, *scope),
                    TypeScope {
                        request_type: *request_type,
                        scope: *scope,
                        active: true,
                    },
                );
            }
        }
        snapshot
    }
}

#[derive(Debug, Default)]
struct Faults {
    failing_begins: AtomicUsize,
    commits_to_skip: AtomicUsize,
    failing_commits: AtomicUsize,
    commit_latency_ms: AtomicU64,
}

impl Faults {
    fn fail_begin(&self) -> bool {
        take(&self.failing_begins)
    }

    fn fail_commit(&self) -> bool {
        if self.failing_commits.load(Ordering::SeqCst) == 0 {
            return false;
        }
        !take(&self.commits_to_skip) && take(&self.failing_commits)
    }
}

fn take(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Transactional in-memory store.
///
/// Transactions are fully serialized: `begin` takes the store lock and holds
/// it until the transaction is committed or dropped. This gives every
/// locking read its exclusive semantics for free. All request-type ↔ scope
/// associations start active.
#[derive(Clone, Debug)]
pub struct InMemoryStorage {
    state: Arc<Mutex<Snapshot>>,
    faults: Arc<Faults>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    /// Empty store with the catalog seeded.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(Snapshot::with_seeded_catalog())),
            faults: Arc::new(Faults::default()),
        }
    }

    /// Insert or replace a member outside any engine operation.
    ///
    /// # Errors
    ///
    /// Propagates injected faults.
    pub async fn seed_member(&self, member: &Member) -> Result<()> {
        let mut tx = self.begin().await?;
        tx.upsert_member(member).await?;
        tx.commit().await
    }

    /// Copy of the committed state. Waits for open transactions.
    pub async fn snapshot(&self) -> Snapshot {
        self.state.lock().await.clone()
    }

    /// Make the next `n` calls to `begin` fail with a transient error.
    pub fn fail_next_begins(&self, n: usize) {
        self.faults.failing_begins.store(n, Ordering::SeqCst);
    }

    /// Let `skip` commits succeed, then fail the following `n` with a
    /// transient error.
    pub fn fail_commits_after(&self, skip: usize, n: usize) {
        self.faults.commits_to_skip.store(skip, Ordering::SeqCst);
        self.faults.failing_commits.store(n, Ordering::SeqCst);
    }

    /// Delay every commit, e.g. to trip an operation timeout.
    pub fn set_commit_latency(&self, latency: Duration) {
        self.faults.commit_latency_ms.store(
            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
            Ordering::SeqCst,
        );
    }
}

impl Storage for InMemoryStorage {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        if self.faults.fail_begin() {
            return Err(Error::transient("injected connection failure"));
        }
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction {
            guard,
            working,
            faults: Arc::clone(&self.faults),
        })
    }
}

/// Open transaction over an [`InMemoryStorage`]. Dropping it discards the
/// working copy.
#[derive(Debug)]
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Snapshot>,
    working: Snapshot,
    faults: Arc<Faults>,
}

impl Transaction for InMemoryTransaction {
    async fn commit(mut self) -> Result<()> {
        let latency = self.faults.commit_latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.faults.fail_commit() {
            return Err(Error::transient("injected commit failure"));
        }
        *self.guard = self.working;
        Ok(())
    }

    async fn lock_period(&mut self, _period: Period) -> Result<()> {
        Ok(())
    }

    async fn increment_sequence(&mut self, year: i32, document: DocumentType) -> Result<u32> {
        let value = self.working.sequences.entry((year, document)).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn member(&mut self, id: MemberId) -> Result<Option<Member>> {
        Ok(self.working.member(id))
    }

    async fn upsert_member(&mut self, member: &Member) -> Result<()> {
        self.working.members.insert(member.id, member.clone());
        Ok(())
    }

    async fn active_titulars(&mut self) -> Result<Vec<Member>> {
        let mut titulars: Vec<_> = self
            .working
            .members
            .values()
            .filter(|m| m.active && m.is_titular())
            .cloned()
            .collect();
        titulars.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(titulars)
    }

    async fn type_scope(
        &mut self,
        request_type: RequestType,
        scope: Scope,
    ) -> Result<Option<TypeScope>> {
        Ok(self.working.type_scopes.get(&(request_type, scope)).copied())
    }

    async fn upsert_type_scope(&mut self, association: &TypeScope) -> Result<()> {
        self.working
            .type_scopes
            .insert((association.request_type, association.scope), *association);
        Ok(())
    }

    async fn quota_aggregate(
        &mut self,
        titular: MemberId,
        period: Period,
    ) -> Result<Option<QuotaAggregate>> {
        Ok(self.working.aggregate(titular, period))
    }

    async fn quota_aggregates(&mut self, period: Period) -> Result<Vec<QuotaAggregate>> {
        Ok(self.working.aggregates_in(period))
    }

    async fn save_quota_aggregate(&mut self, aggregate: &QuotaAggregate) -> Result<()> {
        self.working
            .aggregates
            .insert(aggregate.id, aggregate.clone());
        Ok(())
    }

    async fn delete_quota_aggregate(&mut self, id: QuotaAggregateId) -> Result<()> {
        if self.working.items.values().any(|i| i.aggregate_id == id) {
            return Err(Error::storage(format!("aggregate {id} still has items")));
        }
        self.working.aggregates.remove(&id);
        Ok(())
    }

    async fn quota_items(&mut self, aggregate: QuotaAggregateId) -> Result<Vec<QuotaItem>> {
        Ok(self.working.items_of(aggregate))
    }

    async fn quota_items_held_by(
        &mut self,
        holder: MemberId,
        period: Period,
    ) -> Result<Vec<QuotaItem>> {
        Ok(self.working.items_held_by(holder, period))
    }

    async fn quota_item(&mut self, id: QuotaItemId) -> Result<Option<QuotaItem>> {
        Ok(self.working.item(id))
    }

    async fn save_quota_item(&mut self, item: &QuotaItem) -> Result<()> {
        if !self.working.aggregates.contains_key(&item.aggregate_id) {
            return Err(Error::storage(format!(
                "aggregate {} does not exist",
                item.aggregate_id
            )));
        }
        self.working.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn delete_quota_item(&mut self, id: QuotaItemId) -> Result<()> {
        self.working.items.remove(&id);
        Ok(())
    }

    async fn request(&mut self, id: RequestId) -> Result<Option<Request>> {
        Ok(self.working.request(id))
    }

    async fn save_request(&mut self, request: &Request) -> Result<()> {
        let duplicate = request
            .legs
            .iter()
            .flat_map(|leg| leg.tickets.iter())
            .any(|ticket| {
                self.working.requests.values().any(|other| {
                    other.id != request.id
                        && other
                            .legs
                            .iter()
                            .flat_map(|leg| leg.tickets.iter())
                            .any(|t| t.number == ticket.number)
                })
            });
        if duplicate {
            return Err(Error::Validation("ticket number already registered".into()));
        }
        self.working.requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn requests_for_quota_item(&mut self, item: QuotaItemId) -> Result<Vec<Request>> {
        let mut requests: Vec<_> = self
            .working
            .requests
            .values()
            .filter(|r| r.quota_item == Some(item))
            .cloned()
            .collect();
        requests.sort_by_key(|r| r.audit.created_at);
        Ok(requests)
    }

    async fn requests_awaiting_liquidation(&mut self) -> Result<Vec<Request>> {
        let liquidated: Vec<RequestId> = self
            .working
            .liquidations
            .values()
            .map(|l| l.request_id)
            .collect();
        let mut requests: Vec<_> = self
            .working
            .requests
            .values()
            .filter(|r| !r.is_deleted())
            .filter(|r| matches!(r.status, RequestStatus::Emitido | RequestStatus::Finalizado))
            .filter(|r| !liquidated.contains(&r.id))
            .cloned()
            .collect();
        requests.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(requests)
    }

    async fn ticket_request(&mut self, ticket: TicketId) -> Result<Option<RequestId>> {
        Ok(self
            .working
            .requests
            .values()
            .find(|r| {
                r.legs
                    .iter()
                    .flat_map(|leg| leg.tickets.iter())
                    .any(|t| t.id == ticket)
            })
            .map(|r| r.id))
    }

    async fn ticket_number_exists(&mut self, number: &str) -> Result<bool> {
        Ok(self
            .working
            .requests
            .values()
            .flat_map(|r| r.legs.iter())
            .flat_map(|leg| leg.tickets.iter())
            .any(|t| t.number == number))
    }

    async fn liquidation(&mut self, id: LiquidationId) -> Result<Option<Liquidation>> {
        Ok(self.working.liquidation(id))
    }

    async fn liquidation_for_request(&mut self, request: RequestId) -> Result<Option<Liquidation>> {
        Ok(self
            .working
            .liquidations
            .values()
            .find(|l| l.request_id == request)
            .cloned())
    }

    async fn save_liquidation(&mut self, liquidation: &Liquidation) -> Result<()> {
        let taken = self
            .working
            .liquidations
            .values()
            .any(|l| l.request_id == liquidation.request_id && l.id != liquidation.id);
        if taken {
            return Err(Error::Validation(
                "the request already has a liquidation".into(),
            ));
        }
        self.working
            .liquidations
            .insert(liquidation.id, liquidation.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::member::{MemberKind, Role};

    #[tokio::test]
    async fn dropped_transaction_leaves_no_trace() {
        let storage = InMemoryStorage::new();
        let member = Member::new("Titular", Role::Senator, MemberKind::Titular);
        {
            let mut tx = storage.begin().await.unwrap();
            tx.upsert_member(&member).await.unwrap();
        }
        assert!(storage.snapshot().await.member(member.id).is_none());

        storage.seed_member(&member).await.unwrap();
        assert!(storage.snapshot().await.member(member.id).is_some());
    }

    #[tokio::test]
    async fn injected_commit_failures_skip_then_fail() {
        let storage = InMemoryStorage::new();
        storage.fail_commits_after(1, 1);

        let first = storage.begin().await.unwrap();
        assert!(first.commit().await.is_ok());
        let second = storage.begin().await.unwrap();
        assert!(second.commit().await.unwrap_err().is_transient());
        let third = storage.begin().await.unwrap();
        assert!(third.commit().await.is_ok());
    }

    #[tokio::test]
    async fn catalog_starts_active() {
        let storage = InMemoryStorage::new();
        let mut tx = storage.begin().await.unwrap();
        let association = tx
            .type_scope(RequestType::UsoCupo, Scope::Nacional)
            .await
            .unwrap()
            .unwrap();
        assert!(association.active);
    }
}
