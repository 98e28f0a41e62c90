//! Subscription lifecycle management.
//!
//! Creation, cancellation, lazy expiry on read, and the scheduled period
//! rollover. The free tier never gets a subscription row; its limits are
//! enforced entirely by the entitlement engine.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};

use muse_billing_core::{
    BillingInterval, LedgerEntry, PlanId, Subscription, SubscriptionStatus, UserId,
};
use muse_billing_store::Store;

use crate::error::{EngineError, Result};
use crate::locks::UserLocks;

/// Manages subscription state transitions and scheduled maintenance.
pub struct SubscriptionManager {
    store: Arc<dyn Store>,
    locks: Arc<UserLocks>,
}

impl SubscriptionManager {
    /// Create a manager over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, locks: Arc<UserLocks>) -> Self {
        Self { store, locks }
    }

    /// Enroll a user in a plan.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::FreePlanNotSubscribable`] for the free tier
    /// and [`EngineError::AlreadySubscribed`] when an active, current
    /// subscription already exists. A stale `Active` row is expired first
    /// and does not block re-enrollment.
    pub async fn create(
        &self,
        user_id: UserId,
        plan: PlanId,
        interval: BillingInterval,
        now: DateTime<Utc>,
    ) -> Result<Subscription> {
        if plan == PlanId::Free {
            return Err(EngineError::FreePlanNotSubscribable);
        }

        let _guard = self.locks.acquire(user_id).await;

        if let Some(existing) = self.load_with_lazy_expiry(&user_id, now)? {
            if existing.status == SubscriptionStatus::Active && existing.is_current(now) {
                return Err(EngineError::AlreadySubscribed {
                    user_id: user_id.to_string(),
                });
            }
        }

        let interval = if plan.definition().is_one_time {
            BillingInterval::OneTime
        } else {
            interval
        };

        let subscription = Subscription::new(user_id, plan, interval, now);
        self.store.put_subscription(&subscription)?;

        tracing::info!(
            user_id = %user_id,
            plan = %plan.as_str(),
            period_end = %subscription.current_period_end,
            "Subscription created"
        );

        Ok(subscription)
    }

    /// Cancel a user's active subscription.
    ///
    /// The row keeps conferring entitlements until its period end; only the
    /// renewal intent is withdrawn.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SubscriptionNotFound`] when the user has no
    /// subscription or it is not `Active`.
    pub async fn cancel(&self, user_id: UserId, now: DateTime<Utc>) -> Result<Subscription> {
        let _guard = self.locks.acquire(user_id).await;

        let Some(mut subscription) = self.load_with_lazy_expiry(&user_id, now)? else {
            return Err(EngineError::SubscriptionNotFound {
                user_id: user_id.to_string(),
            });
        };

        if subscription.status != SubscriptionStatus::Active {
            return Err(EngineError::SubscriptionNotFound {
                user_id: user_id.to_string(),
            });
        }

        subscription.status = SubscriptionStatus::Cancelled;
        subscription.cancelled_at = Some(now);
        self.store.put_subscription(&subscription)?;

        tracing::info!(
            user_id = %user_id,
            plan = %subscription.plan.as_str(),
            honored_until = %subscription.current_period_end,
            "Subscription cancelled"
        );

        Ok(subscription)
    }

    /// Fetch the user's subscription, applying lazy expiry.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the lookup or expiry write fails.
    pub fn get(&self, user_id: UserId, now: DateTime<Utc>) -> Result<Option<Subscription>> {
        self.load_with_lazy_expiry(&user_id, now)
    }

    /// Whether the user currently holds a usable subscription.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the lookup fails.
    pub fn is_active_and_current(&self, user_id: UserId, now: DateTime<Utc>) -> Result<bool> {
        Ok(self
            .load_with_lazy_expiry(&user_id, now)?
            .map_or(false, |sub| sub.is_usable(now)))
    }

    /// Roll over every active subscription whose period has lapsed.
    ///
    /// Recurring plans get a fresh period starting at `now` with the usage
    /// counter zeroed; one-time plans transition to `Expired`. Returns the
    /// number of rows touched.
    ///
    /// # Errors
    ///
    /// Returns a storage error if listing or persisting fails; rows already
    /// processed stay processed.
    pub fn reset_expired_periods(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut touched = 0u64;

        for mut subscription in self.store.list_active_subscriptions()? {
            if subscription.is_current(now) {
                continue;
            }

            if subscription.interval == BillingInterval::OneTime {
                subscription.status = SubscriptionStatus::Expired;
                tracing::info!(
                    user_id = %subscription.user_id,
                    plan = %subscription.plan.as_str(),
                    "One-time plan period ended; marked expired"
                );
            } else {
                subscription.used_this_month = 0;
                subscription.current_period_start = now;
                subscription.current_period_end = subscription.interval.advance(now);
                tracing::info!(
                    user_id = %subscription.user_id,
                    plan = %subscription.plan.as_str(),
                    period_end = %subscription.current_period_end,
                    "Billing period rolled over"
                );
            }

            self.store.put_subscription(&subscription)?;
            touched += 1;
        }

        Ok(touched)
    }

    /// Run the monthly reset, at most once per calendar month.
    ///
    /// Claims the month's marker before touching any rows; the losing
    /// invocation of a duplicate trigger returns `Ok(0)` without scanning.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the marker claim or the rollover fails.
    pub fn run_monthly_reset(&self, now: DateTime<Utc>) -> Result<u64> {
        let month_key = format!("{:04}-{:02}", now.year(), now.month());
        if !self.store.try_claim_reset_marker(&month_key, now)? {
            tracing::debug!(month = %month_key, "Monthly reset already ran this month");
            return Ok(0);
        }

        let touched = self.reset_expired_periods(now)?;
        tracing::info!(month = %month_key, touched, "Monthly reset complete");
        Ok(touched)
    }

    /// Offset every expired, not-yet-offset bonus grant.
    ///
    /// Each expired `BonusGrant` gets a negating `BonusExpiry` entry with
    /// the same expiry timestamp, so the valid-entry sum is unchanged and
    /// the full ledger nets to zero. The offset link makes repeat sweeps
    /// no-ops. Returns the number of entries written.
    ///
    /// # Errors
    ///
    /// Returns a storage error if listing or appending fails; grants
    /// already offset stay offset.
    pub fn sweep_expired_bonuses(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut swept = 0u64;

        for grant in self.store.list_expired_bonus_grants(now)? {
            let offset = LedgerEntry::bonus_expiry(&grant);
            self.store.append_entry(&offset)?;
            swept += 1;

            tracing::info!(
                user_id = %grant.user_id,
                grant_id = %grant.id,
                amount = grant.amount,
                "Expired bonus grant offset"
            );
        }

        Ok(swept)
    }

    fn load_with_lazy_expiry(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>> {
        let Some(mut subscription) = self.store.get_subscription(user_id)? else {
            return Ok(None);
        };

        if subscription.status == SubscriptionStatus::Active && !subscription.is_current(now) {
            subscription.status = SubscriptionStatus::Expired;
            self.store.put_subscription(&subscription)?;
            tracing::info!(
                user_id = %user_id,
                plan = %subscription.plan.as_str(),
                "Subscription lazily expired on read"
            );
        }

        Ok(Some(subscription))
    }
}
