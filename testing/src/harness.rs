//! Seeded members and an engine wired to in-memory doubles.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Every helper panics on engine failure

use crate::builders::{RequestBuilder, at, date, ticket};
use crate::test_clock;
use pasajes_core::environment::Clock;
use pasajes_core::events::EventSink;
use pasajes_core::ids::MemberId;
use pasajes_core::member::{Actor, Member, MemberKind, Role};
use pasajes_core::mocks::{FixedClock, InMemoryStorage, RecordingEventSink};
use pasajes_core::model::{QuotaItem, Request};
use pasajes_core::period::Period;
use pasajes_core::storage::{Storage, Transaction};
use pasajes_core::{Engine, Environment};
use std::sync::Arc;

/// The cast every scenario starts from.
#[derive(Clone, Debug)]
pub struct Roster {
    /// Full administrator
    pub admin: Member,
    /// Responsable: approves, but cannot reset or revert transfers
    pub responsable: Member,
    /// Staff delegate of `titular`
    pub delegate: Member,
    /// Titular senator holding quota
    pub titular: Member,
    /// Alternate of `titular`
    pub alternate: Member,
    /// Second alternate of `titular`
    pub second_alternate: Member,
    /// Unrelated titular
    pub other_titular: Member,
    /// Staff member with no standing over anyone
    pub outsider: Member,
}

impl Roster {
    /// Build the cast with fresh ids.
    #[must_use]
    pub fn new() -> Self {
        let delegate = Member::new("Encargado Rojas", Role::Staff, MemberKind::Other);
        let titular = Member::new("Senadora Mamani", Role::Senator, MemberKind::Titular)
            .with_delegate(delegate.id)
            .with_email("mamani@senado.test");
        let alternate = Member::new(
            "Suplente Flores",
            Role::Senator,
            MemberKind::Alternate {
                titular: titular.id,
            },
        );
        let second_alternate = Member::new(
            "Suplente Vargas",
            Role::Senator,
            MemberKind::Alternate {
                titular: titular.id,
            },
        );
        Self {
            admin: Member::new("Admin", Role::Admin, MemberKind::Other),
            responsable: Member::new("Responsable", Role::Responsable, MemberKind::Other),
            delegate,
            titular,
            alternate,
            second_alternate,
            other_titular: Member::new("Senador Choque", Role::Senator, MemberKind::Titular),
            outsider: Member::new("Funcionario", Role::Staff, MemberKind::Other),
        }
    }

    /// Every member.
    #[must_use]
    pub fn members(&self) -> [&Member; 8] {
        [
            &self.admin,
            &self.responsable,
            &self.delegate,
            &self.titular,
            &self.alternate,
            &self.second_alternate,
            &self.other_titular,
            &self.outsider,
        ]
    }

    /// Persist every member in one transaction.
    pub async fn seed<S: Storage>(&self, storage: &S) {
        let mut tx = storage.begin().await.unwrap();
        for member in self.members() {
            tx.upsert_member(member).await.unwrap();
        }
        tx.commit().await.unwrap();
    }

    /// Acting as the admin.
    #[must_use]
    pub const fn admin_actor(&self) -> Actor {
        Actor::of(&self.admin)
    }

    /// Acting as the responsable.
    #[must_use]
    pub const fn responsable_actor(&self) -> Actor {
        Actor::of(&self.responsable)
    }

    /// Acting as the titular.
    #[must_use]
    pub const fn titular_actor(&self) -> Actor {
        Actor::of(&self.titular)
    }

    /// Acting as the first alternate.
    #[must_use]
    pub const fn alternate_actor(&self) -> Actor {
        Actor::of(&self.alternate)
    }

    /// Acting as the titular's delegate.
    #[must_use]
    pub const fn delegate_actor(&self) -> Actor {
        Actor::of(&self.delegate)
    }

    /// Acting as the outsider.
    #[must_use]
    pub const fn outsider_actor(&self) -> Actor {
        Actor::of(&self.outsider)
    }
}

impl Default for Roster {
    fn default() -> Self {
        Self::new()
    }
}

/// Engine over in-memory storage, seeded with a [`Roster`] and January 2025
/// quota.
///
/// # Example
///
/// ```
/// use pasajes_testing::Harness;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let h = Harness::start().await;
/// assert_eq!(h.items_held_by(h.roster.titular.id).await.len(), 5);
/// # }
/// ```
pub struct Harness {
    /// Store shared with the engine
    pub storage: InMemoryStorage,
    /// Clock shared with the engine
    pub clock: Arc<FixedClock>,
    /// Every published event
    pub events: Arc<RecordingEventSink>,
    /// The engine under test
    pub engine: Engine<InMemoryStorage>,
    /// Seeded members
    pub roster: Roster,
}

impl Harness {
    /// January 2025 of the harness period.
    #[must_use]
    pub fn period() -> Period {
        Period::new(2025, 1).unwrap()
    }

    /// Default environment, roster seeded, January 2025 generated.
    pub async fn start() -> Self {
        Self::start_with(|env| env).await
    }

    /// Like [`Harness::start`], letting the caller adjust the environment
    /// (timeout, policy, retry).
    pub async fn start_with<F>(configure: F) -> Self
    where
        F: FnOnce(Environment<InMemoryStorage>) -> Environment<InMemoryStorage>,
    {
        let storage = InMemoryStorage::new();
        let clock = Arc::new(test_clock());
        let events = Arc::new(RecordingEventSink::new());
        let roster = Roster::new();
        roster.seed(&storage).await;

        let env = Environment::new(storage.clone(), Arc::clone(&clock) as Arc<dyn Clock>)
            .with_events(Arc::clone(&events) as Arc<dyn EventSink>);
        let engine = Engine::new(configure(env));
        engine.generator().generate_for_month(2025, 1).await.unwrap();
        events.clear();

        Self {
            storage,
            clock,
            events,
            engine,
            roster,
        }
    }

    /// Items `holder` holds in January 2025, ordered by week.
    pub async fn items_held_by(&self, holder: MemberId) -> Vec<QuotaItem> {
        self.storage
            .snapshot()
            .await
            .items_held_by(holder, Self::period())
    }

    /// Reload a quota item.
    pub async fn item(&self, item: &QuotaItem) -> QuotaItem {
        self.storage.snapshot().await.item(item.id).unwrap()
    }

    /// A one-way quota request by the titular on 2025-01-08, week 2.
    pub async fn quota_request(&self) -> Request {
        self.engine
            .requests()
            .create(
                &self.roster.titular_actor(),
                RequestBuilder::quota(self.roster.titular.id)
                    .one_way("LPB", "CBB", at(2025, 1, 8, 9))
                    .build(),
            )
            .await
            .unwrap()
    }

    /// [`Harness::quota_request`] approved, ticketed and emitted.
    pub async fn emitted_request(&self, number: &str) -> Request {
        let admin = self.roster.admin_actor();
        let request = self.quota_request().await;
        let request = self.engine.requests().approve(&admin, request.id).await.unwrap();
        let ticket = self
            .engine
            .requests()
            .register_ticket(
                &admin,
                request.id,
                request.legs[0].id,
                ticket(number, date(2025, 1, 8)),
            )
            .await
            .unwrap();
        self.engine.requests().emit_ticket(&admin, ticket.id).await.unwrap();
        self.engine.requests().get(request.id).await.unwrap()
    }
}
