//! Application state.

use std::sync::Arc;

use muse_billing_engine::{
    BalanceCalculator, ConsumptionEngine, EntitlementEngine, OrderReconciler, StoreHistory,
    StoreUsageRecorder, SubscriptionManager, UserLocks,
};
use muse_billing_store::Store;

use crate::config::ServiceConfig;

/// Application state shared across handlers.
///
/// All engines share one store and one per-user lock map, so HTTP requests
/// and scheduled jobs serialize correctly against each other.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: ServiceConfig,

    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Balance derivation.
    pub balance: Arc<BalanceCalculator>,

    /// Credit debits and grants.
    pub consumption: Arc<ConsumptionEngine>,

    /// Entitlement checks and usage recording.
    pub entitlement: Arc<EntitlementEngine>,

    /// Subscription lifecycle and scheduled maintenance.
    pub subscriptions: Arc<SubscriptionManager>,

    /// Payment order reconciliation.
    pub reconciler: Arc<OrderReconciler>,
}

impl AppState {
    /// Wire all engines over one store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let locks = Arc::new(UserLocks::new());

        let history = Arc::new(StoreHistory::new(Arc::clone(&store)));
        let recorder = Arc::new(StoreUsageRecorder::new(Arc::clone(&store)));

        let balance = Arc::new(BalanceCalculator::new(Arc::clone(&store)));
        let consumption = Arc::new(ConsumptionEngine::new(
            Arc::clone(&store),
            Arc::clone(&locks),
        ));
        let entitlement = Arc::new(EntitlementEngine::new(
            Arc::clone(&store),
            history,
            recorder,
            config.reset_offset(),
        ));
        let subscriptions = Arc::new(SubscriptionManager::new(
            Arc::clone(&store),
            Arc::clone(&locks),
        ));
        let reconciler = Arc::new(OrderReconciler::new(
            Arc::clone(&store),
            Arc::clone(&consumption),
        ));

        Self {
            config,
            store,
            balance,
            consumption,
            entitlement,
            subscriptions,
            reconciler,
        }
    }
}
