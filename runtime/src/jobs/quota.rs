//! Monthly quota generation as a background job.

use super::Job;
use anyhow::Context;
use futures::future::BoxFuture;
use pasajes_core::period::Period;
use pasajes_core::{Engine, Storage};

/// Generates (or completes) every titular's quota for one period.
///
/// Generation is idempotent, so the job is safe to submit on every tick.
pub struct GenerateQuotaJob<S> {
    engine: Engine<S>,
    period: Period,
}

impl<S: Storage> GenerateQuotaJob<S> {
    /// Job for `period`.
    #[must_use]
    pub const fn new(engine: Engine<S>, period: Period) -> Self {
        Self { engine, period }
    }

    /// Job for the period containing the engine clock's current date.
    #[must_use]
    pub fn current(engine: Engine<S>) -> Self {
        let period = Period::containing(engine.env().now().date_naive());
        Self::new(engine, period)
    }

    /// The period this job generates.
    #[must_use]
    pub const fn period(&self) -> Period {
        self.period
    }
}

impl<S: Storage> Job for GenerateQuotaJob<S> {
    fn name(&self) -> &'static str {
        "generate_quota"
    }

    fn run(self: Box<Self>) -> BoxFuture<'static, anyhow::Result<()>> {
        Box::pin(async move {
            let report = self
                .engine
                .generator()
                .generate(self.period)
                .await
                .with_context(|| format!("generating quota for {}", self.period))?;

            tracing::info!(
                period = %self.period,
                titulars = report.titulars,
                aggregates_created = report.aggregates_created,
                items_created = report.items_created,
                "Quota generation job finished"
            );
            Ok(())
        })
    }
}
