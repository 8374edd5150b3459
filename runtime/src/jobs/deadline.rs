//! Liquidation-deadline scan as a background job.

use super::Job;
use anyhow::Context;
use futures::future::BoxFuture;
use pasajes_core::{Engine, Storage};

/// Runs the deadline scan; the scanner publishes one event per alert.
pub struct DeadlineScanJob<S> {
    engine: Engine<S>,
}

impl<S: Storage> DeadlineScanJob<S> {
    /// Scan job over `engine`.
    #[must_use]
    pub const fn new(engine: Engine<S>) -> Self {
        Self { engine }
    }
}

impl<S: Storage> Job for DeadlineScanJob<S> {
    fn name(&self) -> &'static str {
        "deadline_scan"
    }

    fn run(self: Box<Self>) -> BoxFuture<'static, anyhow::Result<()>> {
        Box::pin(async move {
            let alerts = self
                .engine
                .deadlines()
                .scan()
                .await
                .context("scanning liquidation deadlines")?;

            for alert in alerts.iter().filter(|alert| alert.days_remaining < 0) {
                tracing::warn!(
                    request_id = %alert.request_id,
                    code = %alert.code,
                    deadline = %alert.deadline,
                    days_overdue = -alert.days_remaining,
                    "Liquidation overdue"
                );
            }
            Ok(())
        })
    }
}
