//! One handle bundling every engine component over a shared environment.

use crate::deadline::DeadlineScanner;
use crate::environment::Environment;
use crate::liquidation::LiquidationLinkage;
use crate::quota::{PeriodGenerator, QuotaAllocation};
use crate::requests::RequestEngine;
use crate::sequence::SequenceGenerator;
use crate::storage::Storage;

/// The quota and request-workflow engine.
///
/// # Example
///
/// ```rust,no_run
/// use pasajes_core::mocks::{FixedClock, InMemoryStorage};
/// use pasajes_core::{Engine, Environment};
/// use std::sync::Arc;
///
/// # async fn example() -> pasajes_core::Result<()> {
/// let env = Environment::new(InMemoryStorage::new(), Arc::new(FixedClock::default()));
/// let engine = Engine::new(env);
/// engine.generator().generate_for_month(2025, 3).await?;
/// # Ok(())
/// # }
/// ```
pub struct Engine<S> {
    env: Environment<S>,
    sequences: SequenceGenerator<S>,
    generator: PeriodGenerator<S>,
    quota: QuotaAllocation<S>,
    requests: RequestEngine<S>,
    liquidations: LiquidationLinkage<S>,
    deadlines: DeadlineScanner<S>,
}

impl<S> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            env: self.env.clone(),
            sequences: self.sequences.clone(),
            generator: self.generator.clone(),
            quota: self.quota.clone(),
            requests: self.requests.clone(),
            liquidations: self.liquidations.clone(),
            deadlines: self.deadlines.clone(),
        }
    }
}

impl<S: Storage> Engine<S> {
    /// Build every component over `env`.
    #[must_use]
    pub fn new(env: Environment<S>) -> Self {
        Self {
            sequences: SequenceGenerator::new(env.clone()),
            generator: PeriodGenerator::new(env.clone()),
            quota: QuotaAllocation::new(env.clone()),
            requests: RequestEngine::new(env.clone()),
            liquidations: LiquidationLinkage::new(env.clone()),
            deadlines: DeadlineScanner::new(env.clone()),
            env,
        }
    }

    /// The shared environment.
    #[must_use]
    pub const fn env(&self) -> &Environment<S> {
        &self.env
    }

    /// Sequence generator.
    #[must_use]
    pub const fn sequences(&self) -> &SequenceGenerator<S> {
        &self.sequences
    }

    /// Quota period generator.
    #[must_use]
    pub const fn generator(&self) -> &PeriodGenerator<S> {
        &self.generator
    }

    /// Transfers, reset and balances.
    #[must_use]
    pub const fn quota(&self) -> &QuotaAllocation<S> {
        &self.quota
    }

    /// Request lifecycle.
    #[must_use]
    pub const fn requests(&self) -> &RequestEngine<S> {
        &self.requests
    }

    /// Liquidation linkage.
    #[must_use]
    pub const fn liquidations(&self) -> &LiquidationLinkage<S> {
        &self.liquidations
    }

    /// Liquidation-deadline scanner.
    #[must_use]
    pub const fn deadlines(&self) -> &DeadlineScanner<S> {
        &self.deadlines
    }
}
