//! Quota allocation: period generation, transfers, reset and balances.
//!
//! Items are the source of truth. The aggregate's consumed count is a cached
//! projection that is resynchronised after every reserve/release and never
//! consulted for a decision; [`QuotaBalance`] recomputes from the items.

mod allocation;
mod generator;

pub use allocation::{QuotaAllocation, QuotaItemDetails, ResetReport};
pub use generator::{GenerationReport, PeriodGenerator};

pub(crate) use generator::generate_in;

use crate::error::{Error, Result};
use crate::ids::MemberId;
use crate::model::{QuotaAggregate, QuotaItem};
use crate::period::Period;
use crate::policy::QuotaPolicy;
use crate::state::QuotaItemState;
use crate::storage::Transaction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Balance of a titular's quota for one period, computed from the items.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaBalance {
    /// Titular
    pub titular: MemberId,
    /// Period
    pub period: Period,
    /// Weekly windows in the period
    pub total_weeks: u32,
    /// Units granted
    pub total_units: u32,
    /// Units reserved or used
    pub consumed_units: u32,
    /// Units left
    pub remaining_units: u32,
    /// Items that can still be requested right now
    pub available_items: usize,
    /// Human summary
    pub message: String,
}

impl QuotaBalance {
    /// Recompute the balance from the aggregate's items.
    #[must_use]
    pub fn from_items(
        aggregate: &QuotaAggregate,
        items: &[QuotaItem],
        policy: &QuotaPolicy,
        now: DateTime<Utc>,
    ) -> Self {
        let consumed_units = consumed_units(items, policy);
        let remaining_units = aggregate.total_units.saturating_sub(consumed_units);
        let available_items = items
            .iter()
            .filter(|item| item.is_available(now, policy.expiry_grace))
            .count();

        let message = if remaining_units == 0 {
            format!("No quota units remaining for {}", aggregate.period)
        } else {
            format!(
                "{remaining_units} of {} quota units remaining for {}",
                aggregate.total_units, aggregate.period
            )
        };

        Self {
            titular: aggregate.titular,
            period: aggregate.period,
            total_weeks: aggregate.total_weeks,
            total_units: aggregate.total_units,
            consumed_units,
            remaining_units,
            available_items,
            message,
        }
    }
}

fn consumed_units(items: &[QuotaItem], policy: &QuotaPolicy) -> u32 {
    let consumed = items
        .iter()
        .filter(|item| item.state != QuotaItemState::Disponible)
        .count();
    u32::try_from(consumed)
        .unwrap_or(u32::MAX)
        .saturating_mul(policy.units_per_week)
}

/// Refresh the aggregate's cached consumed count from its items.
pub(crate) async fn resync_consumed<T: Transaction>(
    tx: &mut T,
    titular: MemberId,
    period: Period,
    policy: &QuotaPolicy,
) -> Result<()> {
    let mut aggregate = tx
        .quota_aggregate(titular, period)
        .await?
        .ok_or_else(|| Error::not_found("quota aggregate", format!("{titular}/{period}")))?;
    let items = tx.quota_items(aggregate.id).await?;
    let consumed = consumed_units(&items, policy);

    if consumed != aggregate.consumed_units {
        tracing::debug!(
            aggregate_id = %aggregate.id,
            cached = aggregate.consumed_units,
            consumed,
            "Resynchronising consumed quota units"
        );
        aggregate.consumed_units = consumed;
        tx.save_quota_aggregate(&aggregate).await?;
    }
    Ok(())
}
