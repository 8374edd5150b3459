//! Scan for requests whose liquidation deadline is near or past.

use crate::environment::Environment;
use crate::error::Result;
use crate::events::LifecycleEvent;
use crate::ids::{MemberId, RequestId};
use crate::period::add_business_days;
use crate::policy::QuotaPolicy;
use crate::storage::{Storage, Transaction};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// A request that must be liquidated soon (or already should have been).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineAlert {
    /// Request
    pub request_id: RequestId,
    /// Request code
    pub code: String,
    /// Traveller
    pub beneficiary: MemberId,
    /// Traveller's delegate, copied on notifications
    pub delegate: Option<MemberId>,
    /// Latest emitted or flown ticket date
    pub last_flight: NaiveDate,
    /// Last day to present the liquidation
    pub deadline: NaiveDate,
    /// Days until the deadline; negative when overdue
    pub days_remaining: i64,
}

/// Liquidation deadline for a trip ending on `last_flight`.
#[must_use]
pub fn liquidation_deadline(last_flight: NaiveDate, policy: &QuotaPolicy) -> NaiveDate {
    add_business_days(last_flight, policy.liquidation_business_days)
}

/// Lists EMITIDO/FINALIZADO requests without a liquidation whose alert
/// window has opened. Read-only, so safely re-runnable.
pub struct DeadlineScanner<S> {
    env: Environment<S>,
}

impl<S> Clone for DeadlineScanner<S> {
    fn clone(&self) -> Self {
        Self {
            env: self.env.clone(),
        }
    }
}

impl<S: Storage> DeadlineScanner<S> {
    /// Create a scanner.
    #[must_use]
    pub const fn new(env: Environment<S>) -> Self {
        Self { env }
    }

    /// Scan and publish one `LiquidationDeadlineApproaching` event per alert.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] or [`crate::Error::Timeout`].
    pub async fn scan(&self) -> Result<Vec<DeadlineAlert>> {
        let alerts = self.env.read(|| self.collect()).await?;

        tracing::info!(alerts = alerts.len(), "Liquidation deadline scan finished");
        metrics::counter!("pasajes.deadline.alerts").increment(alerts.len() as u64);
        self.env
            .publish(alerts.iter().map(|alert| LifecycleEvent::LiquidationDeadlineApproaching {
                request_id: alert.request_id,
                code: alert.code.clone(),
                beneficiary: alert.beneficiary,
                deadline: alert.deadline,
                days_remaining: alert.days_remaining,
            }));
        Ok(alerts)
    }

    async fn collect(&self) -> Result<Vec<DeadlineAlert>> {
        let policy = self.env.policy();
        let today = self.env.now().date_naive();

        let mut tx = self.env.storage().begin().await?;
        let mut alerts = Vec::new();
        for request in tx.requests_awaiting_liquidation().await? {
            let Some(last_flight) = request.latest_flight_date() else {
                continue;
            };
            let deadline = liquidation_deadline(last_flight, policy);
            let alert_from = deadline
                .checked_sub_days(Days::new(u64::from(policy.alert_lead_days)))
                .unwrap_or(deadline);
            if today < alert_from {
                continue;
            }

            let delegate = tx
                .member(request.beneficiary)
                .await?
                .and_then(|member| member.delegate);
            tracing::debug!(
                request_id = %request.id,
                code = %request.code,
                %deadline,
                "Liquidation deadline approaching"
            );
            alerts.push(DeadlineAlert {
                request_id: request.id,
                code: request.code,
                beneficiary: request.beneficiary,
                delegate,
                last_flight,
                deadline,
                days_remaining: (deadline - today).num_days(),
            });
        }
        tx.commit().await?;
        Ok(alerts)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn deadline_skips_weekends() {
        // Friday 2025-03-07 + 8 business days = Wednesday 2025-03-19
        let friday = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(
            liquidation_deadline(friday, &QuotaPolicy::default()),
            NaiveDate::from_ymd_opt(2025, 3, 19).unwrap()
        );
    }
}
