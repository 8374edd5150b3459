//! `PostgreSQL` storage backend for the pasajes engine.
//!
//! Implements [`Storage`] over a sqlx connection pool. Each engine operation
//! runs inside one database transaction:
//!
//! - locking reads use `SELECT ... FOR UPDATE`
//! - sequences are incremented with an upsert whose row lock is held until
//!   commit, so numbering stays gapless under concurrency
//! - period-wide work (generation, reset) takes a transaction-scoped
//!   advisory lock
//!
//! # Example
//!
//! ```no_run
//! use pasajes_core::{Engine, Environment, SystemClock};
//! use pasajes_postgres::PostgresStorage;
//! use std::sync::Arc;
//!
//! # async fn example() -> pasajes_core::Result<()> {
//! let storage = PostgresStorage::connect("postgres://localhost/pasajes", 10).await?;
//! storage.migrate().await?;
//! let engine = Engine::new(Environment::new(storage, Arc::new(SystemClock)));
//! engine.generator().generate_for_month(2025, 3).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod rows;

use crate::error::map_sqlx;
use crate::rows::{
    AggregateRow, ItemRow, LegRow, LiquidationRow, MemberRow, RequestRow, TicketRow, TypeScopeRow,
    kind_code, to_i32,
};
use pasajes_core::error::{Error, Result};
use pasajes_core::ids::{LiquidationId, MemberId, QuotaAggregateId, QuotaItemId, RequestId, TicketId};
use pasajes_core::member::Member;
use pasajes_core::model::{
    Liquidation, QuotaAggregate, QuotaItem, Request, RequestType, Scope, TypeScope,
};
use pasajes_core::period::Period;
use pasajes_core::sequence::DocumentType;
use pasajes_core::state::StateMachine;
use pasajes_core::storage::{Storage, Transaction};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Postgres;
use std::time::Duration;
use uuid::Uuid;

/// Namespace of the advisory locks taken by [`Transaction::lock_period`].
const PERIOD_LOCK_NAMESPACE: i32 = 0x5041_5341;

const REQUEST_COLUMNS: &str = "id, code, requester_id, beneficiary_id, request_type, scope, \
     itinerary, quota_item_id, status, reason, created_at, created_by, updated_at, updated_by, \
     deleted_at, deleted_by";

const ITEM_COLUMNS: &str = "id, aggregate_id, titular_id, holder_id, year, month, week, label, \
     valid_from, valid_to, state, transferred_from, transferred_at, transfer_reason";

/// Pool-backed [`Storage`].
#[derive(Clone, Debug)]
pub struct PostgresStorage {
    pool: PgPool,
    lock_timeout: Option<Duration>,
}

impl PostgresStorage {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: None,
        }
    }

    /// Connect a new pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the database is unreachable.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx("connect", e))?;
        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::new(pool))
    }

    /// Abort row-lock waits after `timeout`; the waiting operation fails
    /// with a transient storage error.
    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Apply the bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::storage(format!("Migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Storage for PostgresStorage {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx("begin", e))?;
        if let Some(timeout) = self.lock_timeout {
            // SET does not accept bind parameters
            let statement = format!("SET LOCAL lock_timeout = '{}ms'", timeout.as_millis());
            sqlx::query(&statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx("set lock timeout", e))?;
        }
        Ok(PostgresTransaction { tx })
    }
}

/// One database transaction. Dropping it without commit rolls back.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl std::fmt::Debug for PostgresTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresTransaction").finish_non_exhaustive()
    }
}

impl PostgresTransaction {
    async fn load_requests(&mut self, rows: Vec<RequestRow>) -> Result<Vec<Request>> {
        let mut requests = Vec::with_capacity(rows.len());
        for row in rows {
            requests.push(self.load_request(row).await?);
        }
        Ok(requests)
    }

    async fn load_request(&mut self, row: RequestRow) -> Result<Request> {
        let legs: Vec<LegRow> = sqlx::query_as(
            "SELECT id, request_id, kind, origin, destination, departure, status, created_at
             FROM request_items WHERE request_id = $1 ORDER BY position",
        )
        .bind(row.id())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("load request legs", e))?;

        let tickets: Vec<TicketRow> = sqlx::query_as(
            "SELECT id, request_id, item_id, number, airline, flight_date, cost_cents,
                    penalty_cents, notes, status, supersedes, created_at
             FROM tickets WHERE request_id = $1 ORDER BY position",
        )
        .bind(row.id())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("load tickets", e))?;

        row.assemble(legs, tickets)
    }
}

impl Transaction for PostgresTransaction {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(|e| map_sqlx("commit", e))
    }

    async fn lock_period(&mut self, period: Period) -> Result<()> {
        let key = period.year() * 100 + to_i32(period.month())?;
        sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind(PERIOD_LOCK_NAMESPACE)
            .bind(key)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx("lock period", e))?;
        Ok(())
    }

    async fn increment_sequence(&mut self, year: i32, document: DocumentType) -> Result<u32> {
        let (value,): (i32,) = sqlx::query_as(
            "INSERT INTO sequences (year, document, value) VALUES ($1, $2, 1)
             ON CONFLICT (year, document) DO UPDATE SET value = sequences.value + 1
             RETURNING value",
        )
        .bind(year)
        .bind(document.prefix())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("increment sequence", e))?;
        u32::try_from(value).map_err(|e| Error::storage(format!("corrupt sequence value: {e}")))
    }

    // ------------------------------------------------------------------
    // Members and catalog
    // ------------------------------------------------------------------

    async fn member(&mut self, id: MemberId) -> Result<Option<Member>> {
        let row: Option<MemberRow> = sqlx::query_as(
            "SELECT id, full_name, email, role, kind, titular_id, delegate_id, active
             FROM members WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("load member", e))?;
        row.map(Member::try_from).transpose()
    }

    async fn upsert_member(&mut self, member: &Member) -> Result<()> {
        let (kind, titular) = kind_code(member.kind);
        sqlx::query(
            "INSERT INTO members (id, full_name, email, role, kind, titular_id, delegate_id, active)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (id) DO UPDATE SET
                full_name = EXCLUDED.full_name, email = EXCLUDED.email, role = EXCLUDED.role,
                kind = EXCLUDED.kind, titular_id = EXCLUDED.titular_id,
                delegate_id = EXCLUDED.delegate_id, active = EXCLUDED.active",
        )
        .bind(member.id.as_uuid())
        .bind(&member.full_name)
        .bind(&member.email)
        .bind(member.role.as_str())
        .bind(kind)
        .bind(titular.map(|id| *id.as_uuid()))
        .bind(member.delegate.map(|id| *id.as_uuid()))
        .bind(member.active)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("save member", e))?;
        Ok(())
    }

    async fn active_titulars(&mut self) -> Result<Vec<Member>> {
        let rows: Vec<MemberRow> = sqlx::query_as(
            "SELECT id, full_name, email, role, kind, titular_id, delegate_id, active
             FROM members WHERE kind = 'TITULAR' AND active ORDER BY full_name",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("list titulars", e))?;
        rows.into_iter().map(Member::try_from).collect()
    }

    async fn type_scope(
        &mut self,
        request_type: RequestType,
        scope: Scope,
    ) -> Result<Option<TypeScope>> {
        let row: Option<TypeScopeRow> = sqlx::query_as(
            "SELECT request_type, scope, active FROM type_scopes
             WHERE request_type = $1 AND scope = $2",
        )
        .bind(request_type.as_str())
        .bind(scope.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("load type scope", e))?;
        row.map(TypeScope::try_from).transpose()
    }

    async fn upsert_type_scope(&mut self, association: &TypeScope) -> Result<()> {
        sqlx::query(
            "INSERT INTO type_scopes (request_type, scope, active) VALUES ($1, $2, $3)
             ON CONFLICT (request_type, scope) DO UPDATE SET active = EXCLUDED.active",
        )
        .bind(association.request_type.as_str())
        .bind(association.scope.as_str())
        .bind(association.active)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("save type scope", e))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Quota
    // ------------------------------------------------------------------

    async fn quota_aggregate(
        &mut self,
        titular: MemberId,
        period: Period,
    ) -> Result<Option<QuotaAggregate>> {
        let row: Option<AggregateRow> = sqlx::query_as(
            "SELECT id, titular_id, year, month, total_weeks, total_units, consumed_units, created_at
             FROM quota_aggregates WHERE titular_id = $1 AND year = $2 AND month = $3",
        )
        .bind(titular.as_uuid())
        .bind(period.year())
        .bind(to_i32(period.month())?)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("load quota aggregate", e))?;
        row.map(QuotaAggregate::try_from).transpose()
    }

    async fn quota_aggregates(&mut self, period: Period) -> Result<Vec<QuotaAggregate>> {
        let rows: Vec<AggregateRow> = sqlx::query_as(
            "SELECT id, titular_id, year, month, total_weeks, total_units, consumed_units, created_at
             FROM quota_aggregates WHERE year = $1 AND month = $2 ORDER BY titular_id",
        )
        .bind(period.year())
        .bind(to_i32(period.month())?)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("list quota aggregates", e))?;
        rows.into_iter().map(QuotaAggregate::try_from).collect()
    }

    async fn save_quota_aggregate(&mut self, aggregate: &QuotaAggregate) -> Result<()> {
        sqlx::query(
            "INSERT INTO quota_aggregates
                (id, titular_id, year, month, total_weeks, total_units, consumed_units, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (id) DO UPDATE SET
                total_weeks = EXCLUDED.total_weeks, total_units = EXCLUDED.total_units,
                consumed_units = EXCLUDED.consumed_units",
        )
        .bind(aggregate.id.as_uuid())
        .bind(aggregate.titular.as_uuid())
        .bind(aggregate.period.year())
        .bind(to_i32(aggregate.period.month())?)
        .bind(to_i32(aggregate.total_weeks)?)
        .bind(to_i32(aggregate.total_units)?)
        .bind(to_i32(aggregate.consumed_units)?)
        .bind(aggregate.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("save quota aggregate", e))?;
        Ok(())
    }

    async fn delete_quota_aggregate(&mut self, id: QuotaAggregateId) -> Result<()> {
        sqlx::query("DELETE FROM quota_aggregates WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx("delete quota aggregate", e))?;
        Ok(())
    }

    async fn quota_items(&mut self, aggregate: QuotaAggregateId) -> Result<Vec<QuotaItem>> {
        let query = format!("SELECT {ITEM_COLUMNS} FROM quota_items WHERE aggregate_id = $1 ORDER BY week");
        let rows: Vec<ItemRow> = sqlx::query_as(&query)
            .bind(aggregate.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx("list quota items", e))?;
        rows.into_iter().map(QuotaItem::try_from).collect()
    }

    async fn quota_items_held_by(
        &mut self,
        holder: MemberId,
        period: Period,
    ) -> Result<Vec<QuotaItem>> {
        let query = format!(
            "SELECT {ITEM_COLUMNS} FROM quota_items
             WHERE holder_id = $1 AND year = $2 AND month = $3
             ORDER BY valid_from, week"
        );
        let rows: Vec<ItemRow> = sqlx::query_as(&query)
            .bind(holder.as_uuid())
            .bind(period.year())
            .bind(to_i32(period.month())?)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx("list held quota items", e))?;
        rows.into_iter().map(QuotaItem::try_from).collect()
    }

    async fn quota_item(&mut self, id: QuotaItemId) -> Result<Option<QuotaItem>> {
        let query = format!("SELECT {ITEM_COLUMNS} FROM quota_items WHERE id = $1 FOR UPDATE");
        let row: Option<ItemRow> = sqlx::query_as(&query)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx("lock quota item", e))?;
        row.map(QuotaItem::try_from).transpose()
    }

    async fn save_quota_item(&mut self, item: &QuotaItem) -> Result<()> {
        let transfer = item.transfer.as_ref();
        sqlx::query(
            "INSERT INTO quota_items
                (id, aggregate_id, titular_id, holder_id, year, month, week, label,
                 valid_from, valid_to, state, transferred_from, transferred_at, transfer_reason)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             ON CONFLICT (id) DO UPDATE SET
                holder_id = EXCLUDED.holder_id, state = EXCLUDED.state,
                transferred_from = EXCLUDED.transferred_from,
                transferred_at = EXCLUDED.transferred_at,
                transfer_reason = EXCLUDED.transfer_reason",
        )
        .bind(item.id.as_uuid())
        .bind(item.aggregate_id.as_uuid())
        .bind(item.titular.as_uuid())
        .bind(item.holder.as_uuid())
        .bind(item.period.year())
        .bind(to_i32(item.period.month())?)
        .bind(to_i32(item.week)?)
        .bind(&item.label)
        .bind(item.valid_from)
        .bind(item.valid_to)
        .bind(item.state.as_str())
        .bind(transfer.map(|t| *t.from.as_uuid()))
        .bind(transfer.map(|t| t.at))
        .bind(transfer.map(|t| t.reason.as_str()))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("save quota item", e))?;
        Ok(())
    }

    async fn delete_quota_item(&mut self, id: QuotaItemId) -> Result<()> {
        sqlx::query("DELETE FROM quota_items WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx("delete quota item", e))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Requests and tickets
    // ------------------------------------------------------------------

    async fn request(&mut self, id: RequestId) -> Result<Option<Request>> {
        let query = format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE id = $1 FOR UPDATE");
        let row: Option<RequestRow> = sqlx::query_as(&query)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx("lock request", e))?;
        match row {
            Some(row) => self.load_request(row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn save_request(&mut self, request: &Request) -> Result<()> {
        sqlx::query(
            "INSERT INTO requests
                (id, code, requester_id, beneficiary_id, request_type, scope, itinerary,
                 quota_item_id, status, reason, created_at, created_by, updated_at, updated_by,
                 deleted_at, deleted_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
             ON CONFLICT (id) DO UPDATE SET
                quota_item_id = EXCLUDED.quota_item_id, status = EXCLUDED.status,
                reason = EXCLUDED.reason, updated_at = EXCLUDED.updated_at,
                updated_by = EXCLUDED.updated_by, deleted_at = EXCLUDED.deleted_at,
                deleted_by = EXCLUDED.deleted_by",
        )
        .bind(request.id.as_uuid())
        .bind(&request.code)
        .bind(request.requester.as_uuid())
        .bind(request.beneficiary.as_uuid())
        .bind(request.request_type.as_str())
        .bind(request.scope.as_str())
        .bind(request.itinerary.as_str())
        .bind(request.quota_item.map(|id| *id.as_uuid()))
        .bind(request.status.as_str())
        .bind(&request.reason)
        .bind(request.audit.created_at)
        .bind(request.audit.created_by.as_uuid())
        .bind(request.audit.updated_at)
        .bind(request.audit.updated_by.as_uuid())
        .bind(request.audit.deleted_at)
        .bind(request.audit.deleted_by.map(|id| *id.as_uuid()))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("save request", e))?;

        // Legs and tickets are rewritten wholesale; tickets cascade
        sqlx::query("DELETE FROM request_items WHERE request_id = $1")
            .bind(request.id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx("clear request legs", e))?;

        for (position, leg) in request.legs.iter().enumerate() {
            sqlx::query(
                "INSERT INTO request_items
                    (id, request_id, position, kind, origin, destination, departure, status, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(leg.id.as_uuid())
            .bind(request.id.as_uuid())
            .bind(position_of(position)?)
            .bind(leg.kind.as_str())
            .bind(&leg.origin)
            .bind(&leg.destination)
            .bind(leg.departure)
            .bind(leg.status.as_str())
            .bind(leg.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx("save request leg", e))?;

            for (position, ticket) in leg.tickets.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO tickets
                        (id, request_id, item_id, position, number, airline, flight_date,
                         cost_cents, penalty_cents, notes, status, supersedes, created_at)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
                )
                .bind(ticket.id.as_uuid())
                .bind(request.id.as_uuid())
                .bind(leg.id.as_uuid())
                .bind(position_of(position)?)
                .bind(&ticket.number)
                .bind(&ticket.airline)
                .bind(ticket.flight_date)
                .bind(ticket.cost.cents())
                .bind(ticket.penalty.map(|p| p.cents()))
                .bind(&ticket.notes)
                .bind(ticket.status.as_str())
                .bind(ticket.supersedes.map(|id| *id.as_uuid()))
                .bind(ticket.created_at)
                .execute(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx("save ticket", e))?;
            }
        }
        Ok(())
    }

    async fn requests_for_quota_item(&mut self, item: QuotaItemId) -> Result<Vec<Request>> {
        let query = format!(
            "SELECT {REQUEST_COLUMNS} FROM requests WHERE quota_item_id = $1 ORDER BY code"
        );
        let rows: Vec<RequestRow> = sqlx::query_as(&query)
            .bind(item.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx("list requests for quota item", e))?;
        self.load_requests(rows).await
    }

    async fn requests_awaiting_liquidation(&mut self) -> Result<Vec<Request>> {
        let query = format!(
            "SELECT {REQUEST_COLUMNS} FROM requests r
             WHERE r.deleted_at IS NULL
               AND r.status IN ('EMITIDO', 'FINALIZADO')
               AND NOT EXISTS (SELECT 1 FROM liquidations l WHERE l.request_id = r.id)
             ORDER BY r.code"
        );
        let rows: Vec<RequestRow> = sqlx::query_as(&query)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx("list requests awaiting liquidation", e))?;
        self.load_requests(rows).await
    }

    async fn ticket_request(&mut self, ticket: TicketId) -> Result<Option<RequestId>> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT request_id FROM tickets WHERE id = $1")
            .bind(ticket.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx("find ticket", e))?;
        Ok(row.map(|(id,)| RequestId::from_uuid(id)))
    }

    async fn ticket_number_exists(&mut self, number: &str) -> Result<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM tickets WHERE number = $1)")
                .bind(number)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx("check ticket number", e))?;
        Ok(exists)
    }

    // ------------------------------------------------------------------
    // Liquidations
    // ------------------------------------------------------------------

    async fn liquidation(&mut self, id: LiquidationId) -> Result<Option<Liquidation>> {
        let row: Option<LiquidationRow> = sqlx::query_as(
            "SELECT id, code, request_id, status, submitted_by, approved_by, approved_at,
                    created_at, updated_at
             FROM liquidations WHERE id = $1 FOR UPDATE",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("lock liquidation", e))?;
        row.map(Liquidation::try_from).transpose()
    }

    async fn liquidation_for_request(&mut self, request: RequestId) -> Result<Option<Liquidation>> {
        let row: Option<LiquidationRow> = sqlx::query_as(
            "SELECT id, code, request_id, status, submitted_by, approved_by, approved_at,
                    created_at, updated_at
             FROM liquidations WHERE request_id = $1",
        )
        .bind(request.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("load liquidation of request", e))?;
        row.map(Liquidation::try_from).transpose()
    }

    async fn save_liquidation(&mut self, liquidation: &Liquidation) -> Result<()> {
        sqlx::query(
            "INSERT INTO liquidations
                (id, code, request_id, status, submitted_by, approved_by, approved_at,
                 created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status, approved_by = EXCLUDED.approved_by,
                approved_at = EXCLUDED.approved_at, updated_at = EXCLUDED.updated_at",
        )
        .bind(liquidation.id.as_uuid())
        .bind(&liquidation.code)
        .bind(liquidation.request_id.as_uuid())
        .bind(liquidation.status.as_str())
        .bind(liquidation.submitted_by.as_uuid())
        .bind(liquidation.approved_by.map(|id| *id.as_uuid()))
        .bind(liquidation.approved_at)
        .bind(liquidation.created_at)
        .bind(liquidation.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("save liquidation", e))?;
        Ok(())
    }
}

fn position_of(index: usize) -> Result<i32> {
    i32::try_from(index).map_err(|e| Error::storage(format!("too many rows: {e}")))
}
