//! Materialization of weekly quota items for a period.

use super::resync_consumed;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::ids::QuotaAggregateId;
use crate::member::Member;
use crate::model::{QuotaAggregate, QuotaItem};
use crate::period::{Period, WeekWindow};
use crate::policy::QuotaPolicy;
use crate::storage::{Storage, Transaction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What a generation run created or changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationReport {
    /// Titulars visited
    pub titulars: usize,
    /// Aggregates created
    pub aggregates_created: usize,
    /// Aggregates whose week count changed
    pub aggregates_updated: usize,
    /// Items created
    pub items_created: usize,
}

impl GenerationReport {
    const fn absorb(&mut self, other: Self) {
        self.titulars += other.titulars;
        self.aggregates_created += other.aggregates_created;
        self.aggregates_updated += other.aggregates_updated;
        self.items_created += other.items_created;
    }
}

/// Creates one aggregate per titular and one item per weekly window.
///
/// Idempotent by period: existing items are left untouched and only missing
/// ones are created.
pub struct PeriodGenerator<S> {
    env: Environment<S>,
}

impl<S> Clone for PeriodGenerator<S> {
    fn clone(&self) -> Self {
        Self {
            env: self.env.clone(),
        }
    }
}

impl<S: Storage> PeriodGenerator<S> {
    /// Create a generator.
    #[must_use]
    pub const fn new(env: Environment<S>) -> Self {
        Self { env }
    }

    /// Generate quota for every active titular for `year`/`month`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an invalid month and
    /// [`Error::Storage`]/[`Error::Timeout`] on backend failure, in which
    /// case nothing is persisted.
    pub async fn generate_for_month(&self, year: i32, month: u32) -> Result<GenerationReport> {
        self.generate(Period::new(year, month)?).await
    }

    /// Generate quota for every active titular for `period`.
    ///
    /// # Errors
    ///
    /// See [`PeriodGenerator::generate_for_month`].
    pub async fn generate(&self, period: Period) -> Result<GenerationReport> {
        self.env
            .bounded(async {
                let mut tx = self.env.storage().begin().await?;
                let report = generate_in(&mut tx, period, self.env.policy(), self.env.now()).await?;
                tx.commit().await?;

                tracing::info!(
                    %period,
                    titulars = report.titulars,
                    aggregates_created = report.aggregates_created,
                    items_created = report.items_created,
                    "Quota generated for period"
                );
                metrics::counter!("pasajes.quota.items_generated")
                    .increment(report.items_created as u64);
                Ok(report)
            })
            .await
    }
}

/// Generate `period` for every active titular on an open transaction.
pub(crate) async fn generate_in<T: Transaction>(
    tx: &mut T,
    period: Period,
    policy: &QuotaPolicy,
    now: DateTime<Utc>,
) -> Result<GenerationReport> {
    tx.lock_period(period).await?;
    let windows = period.weekly_windows();

    let mut report = GenerationReport::default();
    for titular in tx.active_titulars().await? {
        report.absorb(generate_for_titular_in(tx, &titular, period, &windows, policy, now).await?);
    }
    Ok(report)
}

/// Generate `period` for one titular. The caller holds the period lock.
pub(crate) async fn generate_for_titular_in<T: Transaction>(
    tx: &mut T,
    titular: &Member,
    period: Period,
    windows: &[WeekWindow],
    policy: &QuotaPolicy,
    now: DateTime<Utc>,
) -> Result<GenerationReport> {
    let mut report = GenerationReport {
        titulars: 1,
        ..GenerationReport::default()
    };
    if windows.is_empty() {
        return Ok(report);
    }

    let total_weeks = u32::try_from(windows.len())
        .map_err(|_| Error::Validation(format!("too many weeks in {period}")))?;
    let total_units = total_weeks.saturating_mul(policy.units_per_week);

    let aggregate = match tx.quota_aggregate(titular.id, period).await? {
        Some(mut existing) => {
            if existing.total_weeks != total_weeks || existing.total_units != total_units {
                existing.total_weeks = total_weeks;
                existing.total_units = total_units;
                tx.save_quota_aggregate(&existing).await?;
                report.aggregates_updated += 1;
            }
            existing
        }
        None => {
            let created = QuotaAggregate {
                id: QuotaAggregateId::new(),
                titular: titular.id,
                period,
                total_weeks,
                total_units,
                consumed_units: 0,
                created_at: now,
            };
            tx.save_quota_aggregate(&created).await?;
            report.aggregates_created += 1;
            created
        }
    };

    let existing_weeks: HashSet<u32> = tx
        .quota_items(aggregate.id)
        .await?
        .iter()
        .map(|item| item.week)
        .collect();

    for window in windows.iter().filter(|w| !existing_weeks.contains(&w.number)) {
        tx.save_quota_item(&QuotaItem::for_window(&aggregate, window))
            .await?;
        report.items_created += 1;
    }

    if report.aggregates_updated > 0 {
        resync_consumed(tx, titular.id, period, policy).await?;
    }

    tracing::debug!(
        titular_id = %titular.id,
        %period,
        items_created = report.items_created,
        "Titular quota generated"
    );
    Ok(report)
}
