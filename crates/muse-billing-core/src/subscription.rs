//! Subscription types for muse-billing.
//!
//! A subscription is a user's enrollment in a plan. At most one row exists
//! per user; status transitions go `Active -> {Cancelled, Expired}` and
//! never back - reactivation creates a fresh record.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::{PlanId, UserId};

/// A user's enrollment in a recurring or one-time plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// The subscribed user. Unique - one subscription row per user.
    pub user_id: UserId,

    /// The subscribed plan.
    pub plan: PlanId,

    /// Current status.
    pub status: SubscriptionStatus,

    /// Billing interval chosen at purchase.
    pub interval: BillingInterval,

    /// Start of the current billing period.
    pub current_period_start: DateTime<Utc>,

    /// End of the current billing period. Always strictly after the start.
    pub current_period_end: DateTime<Utc>,

    /// Generations used in the current period. Reset to 0 at rollover.
    pub used_this_month: u32,

    /// When the subscription was cancelled, if it was.
    pub cancelled_at: Option<DateTime<Utc>>,

    /// When the subscription was created.
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// Create a new active subscription starting at `now`.
    #[must_use]
    pub fn new(user_id: UserId, plan: PlanId, interval: BillingInterval, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            plan,
            status: SubscriptionStatus::Active,
            interval,
            current_period_start: now,
            current_period_end: interval.advance(now),
            used_this_month: 0,
            cancelled_at: None,
            created_at: now,
        }
    }

    /// Whether the current billing period covers `now`.
    #[must_use]
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.current_period_end > now
    }

    /// Whether the subscription still confers entitlements at `now`.
    ///
    /// A cancelled subscription is honored until its period end; the status
    /// change records intent, not immediate loss of service.
    #[must_use]
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status,
            SubscriptionStatus::Active | SubscriptionStatus::Cancelled
        ) && self.is_current(now)
    }
}

/// Status of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Subscription is active.
    Active,

    /// Cancelled by the user; honored until period end.
    Cancelled,

    /// Period ended without renewal.
    Expired,

    /// Temporarily paused (payment retry window).
    Paused,
}

/// The billing interval chosen at purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    /// Renews monthly.
    Monthly,

    /// Renews yearly.
    Yearly,

    /// One-time purchase; the period covers one month and never renews.
    OneTime,
}

impl BillingInterval {
    /// Advance a timestamp by one interval unit.
    ///
    /// Calendar-aware month arithmetic: Jan 31 + 1 month = Feb 28/29.
    #[must_use]
    pub fn advance(self, from: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Monthly | Self::OneTime => from + Months::new(1),
            Self::Yearly => from + Months::new(12),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn new_subscription_has_valid_period() {
        let now = Utc::now();
        let sub = Subscription::new(UserId::generate(), PlanId::Pro, BillingInterval::Monthly, now);

        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.used_this_month, 0);
        assert!(sub.current_period_end > sub.current_period_start);
        assert!(sub.is_current(now));
    }

    #[test]
    fn yearly_interval_advances_twelve_months() {
        let now = Utc::now();
        let end = BillingInterval::Yearly.advance(now);
        assert!(end > now + Duration::days(360));
    }

    #[test]
    fn cancelled_subscription_usable_until_period_end() {
        let now = Utc::now();
        let mut sub =
            Subscription::new(UserId::generate(), PlanId::Pro, BillingInterval::Monthly, now);
        sub.status = SubscriptionStatus::Cancelled;
        sub.cancelled_at = Some(now);

        assert!(sub.is_usable(now + Duration::days(1)));
        assert!(!sub.is_usable(sub.current_period_end + Duration::seconds(1)));
    }

    #[test]
    fn expired_subscription_not_usable() {
        let now = Utc::now();
        let mut sub =
            Subscription::new(UserId::generate(), PlanId::Pro, BillingInterval::Monthly, now);
        sub.status = SubscriptionStatus::Expired;
        assert!(!sub.is_usable(now));
    }
}
