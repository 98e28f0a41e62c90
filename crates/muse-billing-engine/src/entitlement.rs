//! Entitlement checks and usage recording.
//!
//! Decides whether a generation request may proceed under the user's tier:
//! the free tier is capped per calendar day (counted from generation
//! history), metered tiers per billing period (counted on the subscription
//! row), unlimited tiers are gated on output quality.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Utc};

use muse_billing_core::{
    DenialReason, EntitlementDecision, GenerationId, PlanId, SubscriptionStatus, UsageRecord,
    UserId, FREE_DAILY_GENERATION_LIMIT,
};
use muse_billing_store::Store;

use crate::collaborators::{GenerationHistory, UsageRecorder};
use crate::error::Result;

/// Decides allow/deny for generation requests and records metered usage.
pub struct EntitlementEngine {
    store: Arc<dyn Store>,
    history: Arc<dyn GenerationHistory>,
    recorder: Arc<dyn UsageRecorder>,

    /// Reference timezone for the free tier's calendar-day window.
    reference_offset: FixedOffset,
}

impl EntitlementEngine {
    /// Create an engine with explicit collaborator dependencies.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        history: Arc<dyn GenerationHistory>,
        recorder: Arc<dyn UsageRecorder>,
        reference_offset: FixedOffset,
    ) -> Self {
        Self {
            store,
            history,
            recorder,
            reference_offset,
        }
    }

    /// Decide whether the user may generate with the requested style and
    /// quality.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the subscription or history lookup fails.
    /// A denial is a decision value, never an error.
    pub async fn can_generate(
        &self,
        user_id: UserId,
        style: Option<&str>,
        quality: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<EntitlementDecision> {
        let subscription = self.load_with_lazy_expiry(user_id, now)?;

        let Some(subscription) = subscription else {
            return self.check_free_tier(user_id, style, now).await;
        };

        if !subscription.is_usable(now) {
            // The lapsed plan is the suggestion: re-subscribe to what the
            // user had, rather than pitch a higher tier.
            return Ok(EntitlementDecision::Denied {
                reason: DenialReason::SubscriptionRequired,
                reset_at: None,
                suggested_upgrade: Some(subscription.plan),
            });
        }

        let definition = subscription.plan.definition();

        if let Some(limit) = definition.monthly_generation_limit {
            if subscription.used_this_month >= limit {
                return Ok(EntitlementDecision::Denied {
                    reason: DenialReason::MonthlyLimitReached,
                    reset_at: Some(subscription.current_period_end),
                    suggested_upgrade: subscription.plan.upgrade_target(),
                });
            }
            return Ok(EntitlementDecision::Allowed {
                remaining: Some(limit - subscription.used_this_month),
                reset_at: Some(subscription.current_period_end),
            });
        }

        // Unlimited plans still gate output quality.
        if let Some(quality) = quality {
            if !definition.allowed_quality.allows(quality) {
                return Ok(EntitlementDecision::Denied {
                    reason: DenialReason::QualityNotAllowed,
                    reset_at: None,
                    suggested_upgrade: Some(PlanId::quality_upgrade(quality)),
                });
            }
        }

        Ok(EntitlementDecision::Allowed {
            remaining: None,
            reset_at: None,
        })
    }

    /// Record a completed generation's usage.
    ///
    /// Always appends a usage record; it doubles as the generation history
    /// that the free tier's daily window counts. Metered tiers additionally
    /// increment the subscription counter. Bookkeeping failures are logged
    /// and swallowed: a generation that already succeeded is never rolled
    /// back because accounting failed afterward.
    pub async fn record_usage(
        &self,
        user_id: UserId,
        generation_id: GenerationId,
        credits_used: i64,
        style: Option<String>,
        prompt: Option<String>,
        now: DateTime<Utc>,
    ) {
        let subscription = match self.load_with_lazy_expiry(user_id, now) {
            Ok(sub) => sub,
            Err(err) => {
                tracing::warn!(
                    user_id = %user_id,
                    generation_id = %generation_id,
                    error = %err,
                    "Usage recording skipped: subscription lookup failed"
                );
                None
            }
        };

        let plan = subscription.as_ref().map(|s| s.plan);

        let record = UsageRecord::new(user_id, generation_id, plan, style, prompt, credits_used);
        if let Err(err) = self.recorder.record(&record).await {
            tracing::warn!(
                user_id = %user_id,
                generation_id = %generation_id,
                error = %err,
                "Usage record append failed; continuing"
            );
        }

        // Free users have no counter to advance.
        let Some(subscription) = subscription else {
            return;
        };
        if !subscription.is_usable(now) {
            return;
        }

        match self.store.increment_usage(&user_id) {
            Ok(used) => {
                tracing::debug!(
                    user_id = %user_id,
                    used_this_month = %used,
                    "Monthly usage counter advanced"
                );
            }
            Err(err) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %err,
                    "Usage counter increment failed; continuing"
                );
            }
        }
    }

    /// Free tier: one generation per calendar day in the reference
    /// timezone, basic styles only.
    async fn check_free_tier(
        &self,
        user_id: UserId,
        style: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<EntitlementDecision> {
        let (start_of_today, start_of_tomorrow) = self.day_window(now);

        let count = self
            .history
            .count_generations(user_id, start_of_today, now)
            .await?;

        let limit = u64::from(FREE_DAILY_GENERATION_LIMIT);
        if count >= limit {
            return Ok(EntitlementDecision::Denied {
                reason: DenialReason::DailyLimitReached,
                reset_at: Some(start_of_tomorrow),
                suggested_upgrade: Some(PlanId::Trial),
            });
        }

        if let Some(style) = style {
            if !PlanId::Free.definition().allowed_styles.allows(style) {
                return Ok(EntitlementDecision::Denied {
                    reason: DenialReason::StyleNotAllowed,
                    reset_at: None,
                    suggested_upgrade: Some(PlanId::Trial),
                });
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        let remaining = (limit - count) as u32;
        Ok(EntitlementDecision::Allowed {
            remaining: Some(remaining),
            reset_at: Some(start_of_tomorrow),
        })
    }

    /// Compute `[start_of_today, start_of_tomorrow)` in the reference
    /// timezone, expressed in UTC.
    fn day_window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let local = now.with_timezone(&self.reference_offset);
        let start_of_today = local
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is a valid time")
            .and_local_timezone(self.reference_offset)
            .single()
            .expect("fixed offsets have no DST gaps")
            .with_timezone(&Utc);
        (start_of_today, start_of_today + Duration::days(1))
    }

    /// Load the subscription, transitioning a stale `Active` row to
    /// `Expired` on read.
    fn load_with_lazy_expiry(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<muse_billing_core::Subscription>> {
        let Some(mut subscription) = self.store.get_subscription(&user_id)? else {
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

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use muse_billing_core::{BillingInterval, Subscription};
    use muse_billing_store::{RocksStore, StoreError};
    use std::sync::atomic::{AtomicU64, Ordering};
    use tempfile::TempDir;

    /// History fake returning a fixed count.
    struct FixedHistory(AtomicU64);

    #[async_trait]
    impl GenerationHistory for FixedHistory {
        async fn count_generations(
            &self,
            _user_id: UserId,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> std::result::Result<u64, StoreError> {
            Ok(self.0.load(Ordering::SeqCst))
        }
    }

    /// Recorder fake that always fails, for the failure-isolation test.
    struct FailingRecorder;

    #[async_trait]
    impl UsageRecorder for FailingRecorder {
        async fn record(&self, _record: &UsageRecord) -> std::result::Result<(), StoreError> {
            Err(StoreError::Unavailable("sink down".into()))
        }
    }

    struct NoopRecorder;

    #[async_trait]
    impl UsageRecorder for NoopRecorder {
        async fn record(&self, _record: &UsageRecord) -> std::result::Result<(), StoreError> {
            Ok(())
        }
    }

    struct Harness {
        engine: EntitlementEngine,
        store: Arc<dyn Store>,
        history: Arc<FixedHistory>,
        _dir: TempDir,
    }

    fn setup() -> Harness {
        setup_with_recorder(Arc::new(NoopRecorder))
    }

    fn setup_with_recorder(recorder: Arc<dyn UsageRecorder>) -> Harness {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn Store> = Arc::new(RocksStore::open(dir.path()).unwrap());
        let history = Arc::new(FixedHistory(AtomicU64::new(0)));
        let engine = EntitlementEngine::new(
            Arc::clone(&store),
            Arc::clone(&history) as Arc<dyn GenerationHistory>,
            recorder,
            FixedOffset::east_opt(0).unwrap(),
        );
        Harness {
            engine,
            store,
            history,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn free_user_allowed_then_denied_for_the_day() {
        let h = setup();
        let user = UserId::generate();
        let now = Utc::now();

        let decision = h.engine.can_generate(user, None, None, now).await.unwrap();
        match decision {
            EntitlementDecision::Allowed {
                remaining,
                reset_at,
            } => {
                assert_eq!(remaining, Some(1));
                assert!(reset_at.unwrap() > now);
            }
            EntitlementDecision::Denied { .. } => panic!("expected allowance"),
        }

        // One generation recorded; an hour later the limit bites.
        h.history.0.store(1, Ordering::SeqCst);
        let later = now + Duration::hours(1);
        let decision = h.engine.can_generate(user, None, None, later).await.unwrap();
        match decision {
            EntitlementDecision::Denied {
                reason,
                reset_at,
                suggested_upgrade,
            } => {
                assert_eq!(reason, DenialReason::DailyLimitReached);
                assert_eq!(suggested_upgrade, Some(PlanId::Trial));
                assert!(reset_at.unwrap() > later);
            }
            EntitlementDecision::Allowed { .. } => panic!("expected denial"),
        }
    }

    #[tokio::test]
    async fn free_tier_resets_next_day() {
        let h = setup();
        let user = UserId::generate();
        let now = Utc::now();

        // The history collaborator scopes its count to the day window; a
        // request 25 hours later falls in a fresh window with zero prior
        // generations.
        h.history.0.store(0, Ordering::SeqCst);
        let next_day = now + Duration::hours(25);
        let decision = h
            .engine
            .can_generate(user, None, None, next_day)
            .await
            .unwrap();
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn day_window_scopes_stored_history() {
        use chrono::Timelike;

        use crate::collaborators::{StoreHistory, StoreUsageRecorder};

        let dir = TempDir::new().unwrap();
        let store: Arc<dyn Store> = Arc::new(RocksStore::open(dir.path()).unwrap());

        // Pin the reference offset so local midnight falls at `now`; the
        // usage record written below then lands just inside today's window
        // no matter what wall-clock time the run starts at.
        let now = Utc::now();
        #[allow(clippy::cast_possible_wrap)]
        let offset =
            FixedOffset::west_opt(now.time().num_seconds_from_midnight() as i32).unwrap();

        let engine = EntitlementEngine::new(
            Arc::clone(&store),
            Arc::new(StoreHistory::new(Arc::clone(&store))),
            Arc::new(StoreUsageRecorder::new(Arc::clone(&store))),
            offset,
        );
        let user = UserId::generate();

        engine
            .record_usage(user, GenerationId::generate(), 1, None, None, now)
            .await;

        // An hour later the stored record still counts against the day.
        let decision = engine
            .can_generate(user, None, None, now + Duration::hours(1))
            .await
            .unwrap();
        match decision {
            EntitlementDecision::Denied { reason, .. } => {
                assert_eq!(reason, DenialReason::DailyLimitReached);
            }
            EntitlementDecision::Allowed { .. } => panic!("expected denial"),
        }

        // 25 hours later the window has rolled past the record.
        let decision = engine
            .can_generate(user, None, None, now + Duration::hours(25))
            .await
            .unwrap();
        match decision {
            EntitlementDecision::Allowed { remaining, .. } => {
                assert_eq!(remaining, Some(1));
            }
            EntitlementDecision::Denied { .. } => panic!("expected allowance"),
        }
    }

    #[tokio::test]
    async fn free_tier_style_gating() {
        let h = setup();
        let user = UserId::generate();
        let now = Utc::now();

        let decision = h
            .engine
            .can_generate(user, Some("cyberpunk"), None, now)
            .await
            .unwrap();
        assert_eq!(
            decision,
            EntitlementDecision::Denied {
                reason: DenialReason::StyleNotAllowed,
                reset_at: None,
                suggested_upgrade: Some(PlanId::Trial),
            }
        );

        let decision = h
            .engine
            .can_generate(user, Some("anime"), None, now)
            .await
            .unwrap();
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn monthly_limit_boundary() {
        let h = setup();
        let user = UserId::generate();
        let now = Utc::now();

        let mut sub = Subscription::new(user, PlanId::Pro, BillingInterval::Monthly, now);
        sub.used_this_month = 49;
        h.store.put_subscription(&sub).unwrap();

        let decision = h.engine.can_generate(user, None, None, now).await.unwrap();
        assert_eq!(
            decision,
            EntitlementDecision::Allowed {
                remaining: Some(1),
                reset_at: Some(sub.current_period_end),
            }
        );

        sub.used_this_month = 50;
        h.store.put_subscription(&sub).unwrap();

        let decision = h.engine.can_generate(user, None, None, now).await.unwrap();
        assert_eq!(
            decision,
            EntitlementDecision::Denied {
                reason: DenialReason::MonthlyLimitReached,
                reset_at: Some(sub.current_period_end),
                suggested_upgrade: Some(PlanId::Ultra),
            }
        );
    }

    #[tokio::test]
    async fn unlimited_plan_gates_quality() {
        let h = setup();
        let user = UserId::generate();
        let now = Utc::now();

        let sub = Subscription::new(user, PlanId::Ultra, BillingInterval::Monthly, now);
        h.store.put_subscription(&sub).unwrap();

        let decision = h
            .engine
            .can_generate(user, None, Some("8k"), now)
            .await
            .unwrap();
        assert!(decision.is_allowed());

        // A Pro subscriber asking for 8k is pointed at Ultra - but Pro is
        // metered, so quality gating applies to unlimited plans only; the
        // Pro user is admitted under the monthly limit instead.
        let pro_user = UserId::generate();
        let pro = Subscription::new(pro_user, PlanId::Pro, BillingInterval::Monthly, now);
        h.store.put_subscription(&pro).unwrap();
        let decision = h
            .engine
            .can_generate(pro_user, None, Some("8k"), now)
            .await
            .unwrap();
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn lapsed_subscription_denies_subscription_required() {
        let h = setup();
        let user = UserId::generate();
        let now = Utc::now();

        let old = now - Duration::days(60);
        let sub = Subscription::new(user, PlanId::Pro, BillingInterval::Monthly, old);
        h.store.put_subscription(&sub).unwrap();

        // The suggestion is the lapsed plan itself: a re-subscribe hint.
        let decision = h.engine.can_generate(user, None, None, now).await.unwrap();
        assert_eq!(
            decision,
            EntitlementDecision::Denied {
                reason: DenialReason::SubscriptionRequired,
                reset_at: None,
                suggested_upgrade: Some(PlanId::Pro),
            }
        );

        // Lazy expiry persisted the status change.
        let stored = h.store.get_subscription(&user).unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Expired);
    }

    #[tokio::test]
    async fn cancelled_subscription_honored_until_period_end() {
        let h = setup();
        let user = UserId::generate();
        let now = Utc::now();

        let mut sub = Subscription::new(user, PlanId::Pro, BillingInterval::Monthly, now);
        sub.status = SubscriptionStatus::Cancelled;
        sub.cancelled_at = Some(now);
        h.store.put_subscription(&sub).unwrap();

        let decision = h.engine.can_generate(user, None, None, now).await.unwrap();
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn record_usage_increments_metered_counter() {
        let h = setup();
        let user = UserId::generate();
        let now = Utc::now();

        let sub = Subscription::new(user, PlanId::Pro, BillingInterval::Monthly, now);
        h.store.put_subscription(&sub).unwrap();

        h.engine
            .record_usage(user, GenerationId::generate(), 1, None, None, now)
            .await;

        let stored = h.store.get_subscription(&user).unwrap().unwrap();
        assert_eq!(stored.used_this_month, 1);
    }

    #[tokio::test]
    async fn record_usage_noop_for_free_tier() {
        let h = setup();
        let user = UserId::generate();

        // Completes without a subscription row and without error.
        h.engine
            .record_usage(user, GenerationId::generate(), 1, None, None, Utc::now())
            .await;
        assert!(h.store.get_subscription(&user).unwrap().is_none());
    }

    #[tokio::test]
    async fn recorder_failure_never_propagates() {
        let h = setup_with_recorder(Arc::new(FailingRecorder));
        let user = UserId::generate();
        let now = Utc::now();

        let sub = Subscription::new(user, PlanId::Pro, BillingInterval::Monthly, now);
        h.store.put_subscription(&sub).unwrap();

        // Returns normally despite the failing audit sink; the counter
        // still advances.
        h.engine
            .record_usage(user, GenerationId::generate(), 1, None, None, now)
            .await;
        let stored = h.store.get_subscription(&user).unwrap().unwrap();
        assert_eq!(stored.used_this_month, 1);
    }
}
