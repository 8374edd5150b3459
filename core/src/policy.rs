//! Domain constants governing quota and liquidation deadlines.

use chrono::TimeDelta;

/// Quota and deadline policy.
///
/// # Default Values
///
/// - `units_per_week`: 1
/// - `expiry_grace`: 24 hours after the start of an item's last day
/// - `liquidation_business_days`: 8 business days after the last flight
/// - `alert_lead_days`: alerts start 2 days before the liquidation deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    /// Quota units granted per weekly window
    pub units_per_week: u32,
    /// Grace counted from the start of an item's last day before it is vencido
    pub expiry_grace: TimeDelta,
    /// Business days after the last flight to present a liquidation
    pub liquidation_business_days: u32,
    /// Calendar days before the deadline when alerts begin
    pub alert_lead_days: u32,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            units_per_week: 1,
            expiry_grace: TimeDelta::hours(24),
            liquidation_business_days: 8,
            alert_lead_days: 2,
        }
    }
}

impl QuotaPolicy {
    /// Set units per week.
    #[must_use]
    pub const fn with_units_per_week(mut self, units: u32) -> Self {
        self.units_per_week = units;
        self
    }

    /// Set the expiry grace.
    #[must_use]
    pub const fn with_expiry_grace(mut self, grace: TimeDelta) -> Self {
        self.expiry_grace = grace;
        self
    }

    /// Set the liquidation window in business days.
    #[must_use]
    pub const fn with_liquidation_business_days(mut self, days: u32) -> Self {
        self.liquidation_business_days = days;
        self
    }

    /// Set the alert lead time in calendar days.
    #[must_use]
    pub const fn with_alert_lead_days(mut self, days: u32) -> Self {
        self.alert_lead_days = days;
        self
    }
}
