//! # Pasajes Core
//!
//! Travel-quota allocation and request workflow for the members of a
//! legislative body.
//!
//! Titular members receive one quota item per weekly window of every
//! monthly period. Items can be handed to an alternate, reserved by a
//! travel request, consumed when the trip is closed by an approved expense
//! liquidation, and released when the request is rejected or deleted.
//!
//! ## Components
//!
//! - [`SequenceGenerator`]: gapless `SPD-yy####` / `DES-yy####` codes
//! - [`PeriodGenerator`]: idempotent monthly quota generation
//! - [`QuotaAllocation`]: transfers, reset and balances
//! - [`RequestEngine`]: request, leg and ticket lifecycle
//! - [`LiquidationLinkage`]: liquidation approval driving request finalization
//! - [`DeadlineScanner`]: liquidation-deadline alerts
//!
//! Every component works against a [`Storage`] through one transaction per
//! operation and publishes [`LifecycleEvent`]s only after commit.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pasajes_core::member::{Actor, Member, MemberKind, Role};
//! use pasajes_core::mocks::{FixedClock, InMemoryStorage};
//! use pasajes_core::{Engine, Environment};
//! use std::sync::Arc;
//!
//! # async fn example() -> pasajes_core::Result<()> {
//! let storage = InMemoryStorage::new();
//! let titular = Member::new("Ana Quispe", Role::Senator, MemberKind::Titular);
//! storage.seed_member(&titular).await?;
//!
//! let engine = Engine::new(Environment::new(storage, Arc::new(FixedClock::default())));
//! engine.generator().generate_for_month(2025, 1).await?;
//!
//! let balance = engine.quota().balance(titular.id, 2025, 1).await?;
//! assert_eq!(balance.remaining_units, balance.total_units);
//! # let _ = Actor::of(&titular);
//! # Ok(())
//! # }
//! ```

pub mod deadline;
pub mod engine;
pub mod environment;
pub mod error;
pub mod events;
pub mod ids;
pub mod liquidation;
pub mod member;
pub mod model;
pub mod period;
pub mod policy;
pub mod quota;
pub mod requests;
pub mod retry;
pub mod sequence;
pub mod state;
pub mod storage;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

pub use deadline::{DeadlineAlert, DeadlineScanner};
pub use engine::Engine;
pub use environment::{Clock, Environment, SystemClock};
pub use error::{Error, Result};
pub use events::{EventSink, LifecycleEvent, NullEventSink};
pub use liquidation::LiquidationLinkage;
pub use member::{Actor, Member, MemberKind, Role};
pub use policy::QuotaPolicy;
pub use quota::{PeriodGenerator, QuotaAllocation, QuotaBalance};
pub use requests::RequestEngine;
pub use retry::RetryPolicy;
pub use sequence::{DocumentType, SequenceGenerator};
pub use storage::{Storage, Transaction};
