//! Periodic submission of the recurring jobs.

use crate::jobs::{DeadlineScanJob, GenerateQuotaJob, JobPool};
use pasajes_core::{Engine, Storage};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Submits quota generation for the current period and a deadline scan on
/// every tick.
pub struct Scheduler<S> {
    pool: Arc<JobPool>,
    engine: Engine<S>,
    interval: Duration,
}

impl<S: Storage> Scheduler<S> {
    /// Scheduler feeding `pool` every `interval`.
    #[must_use]
    pub const fn new(pool: Arc<JobPool>, engine: Engine<S>, interval: Duration) -> Self {
        Self {
            pool,
            engine,
            interval,
        }
    }

    /// Submit one round of jobs; returns how many were accepted.
    pub fn tick(&self) -> usize {
        let generate = GenerateQuotaJob::current(self.engine.clone());
        let period = generate.period();

        let mut accepted = 0;
        match self.pool.submit(generate) {
            Ok(()) => accepted += 1,
            Err(error) => tracing::warn!(period = %period, error = %error, "Quota generation not scheduled"),
        }
        match self.pool.submit(DeadlineScanJob::new(self.engine.clone())) {
            Ok(()) => accepted += 1,
            Err(error) => tracing::warn!(error = %error, "Deadline scan not scheduled"),
        }
        accepted
    }

    /// Tick immediately, then every interval, until `stop` resolves.
    pub async fn run_until<F>(self, stop: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(stop);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.pool.is_shutting_down() {
                        break;
                    }
                    self.tick();
                }
                () = &mut stop => break,
            }
        }
        tracing::info!("Scheduler stopped");
    }
}
