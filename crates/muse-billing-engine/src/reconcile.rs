//! Order reconciliation.
//!
//! Converts a paid payment order into exactly one ledger grant. Webhooks
//! are delivered at-least-once, so the whole path is idempotent: a repeat
//! delivery of the same order is a successful no-op.

use std::sync::Arc;

use muse_billing_core::{EntryKind, Order, OrderStatus};
use muse_billing_store::{Store, StoreError};

use crate::consumption::ConsumptionEngine;
use crate::error::{EngineError, Result};

/// Applies paid orders to the ledger, once each.
pub struct OrderReconciler {
    store: Arc<dyn Store>,
    consumption: Arc<ConsumptionEngine>,
}

impl OrderReconciler {
    /// Create a reconciler sharing the consumption engine's grant path.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, consumption: Arc<ConsumptionEngine>) -> Self {
        Self { store, consumption }
    }

    /// Grant the order's credits if it has not been reconciled yet.
    ///
    /// Unpaid orders are rejected. A previously reconciled order returns
    /// `Ok` without writing. Two concurrent deliveries race on the storage
    /// uniqueness constraint; the loser's `Conflict` is also a success.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OrderNotPaid`] for unpaid orders and a
    /// storage error if the ledger lookup or append fails.
    pub async fn reconcile(&self, order: &Order) -> Result<()> {
        if order.status != OrderStatus::Paid {
            return Err(EngineError::OrderNotPaid {
                order_id: order.order_id.to_string(),
            });
        }

        if let Some(existing) = self.store.find_by_order_id(&order.order_id)? {
            tracing::debug!(
                order_id = %order.order_id,
                entry_id = %existing.id,
                "Order already reconciled; skipping"
            );
            return Ok(());
        }

        let result = self
            .consumption
            .grant(
                order.user_id,
                order.credits_granted,
                EntryKind::OrderPayment,
                order.expires_at,
                Some(order.order_id.clone()),
                format!("Order payment {}", order.order_id),
            )
            .await;

        match result {
            Ok(entry) => {
                tracing::info!(
                    order_id = %order.order_id,
                    user_id = %order.user_id,
                    credits = order.credits_granted,
                    entry_id = %entry.id,
                    "Order reconciled"
                );
                Ok(())
            }
            // Duplicate-delivery race loser: the credits are already there.
            Err(EngineError::Store(StoreError::Conflict { .. })) => {
                tracing::debug!(order_id = %order.order_id, "Lost reconcile race; order already applied");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use muse_billing_core::UserId;
    use muse_billing_store::RocksStore;
    use tempfile::TempDir;

    use crate::locks::UserLocks;

    fn setup() -> (OrderReconciler, Arc<dyn Store>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn Store> = Arc::new(RocksStore::open(dir.path()).unwrap());
        let consumption = Arc::new(ConsumptionEngine::new(
            Arc::clone(&store),
            Arc::new(UserLocks::new()),
        ));
        let reconciler = OrderReconciler::new(Arc::clone(&store), consumption);
        (reconciler, store, dir)
    }

    fn paid_order(user_id: UserId, order_id: &str, credits: i64) -> Order {
        Order {
            order_id: order_id.parse().unwrap(),
            user_id,
            credits_granted: credits,
            status: OrderStatus::Paid,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn paid_order_grants_once() {
        let (reconciler, store, _dir) = setup();
        let user = UserId::generate();
        let order = paid_order(user, "ord_1001", 500);

        reconciler.reconcile(&order).await.unwrap();
        reconciler.reconcile(&order).await.unwrap();

        let entries = store.list_entries(&user, 10, 0).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, 500);
        assert_eq!(entries[0].kind, EntryKind::OrderPayment);
        assert_eq!(
            entries[0].related_order_id.as_ref().map(ToString::to_string),
            Some("ord_1001".to_string())
        );
    }

    #[tokio::test]
    async fn unpaid_order_rejected() {
        let (reconciler, store, _dir) = setup();
        let user = UserId::generate();
        let mut order = paid_order(user, "ord_1002", 500);
        order.status = OrderStatus::Created;

        let err = reconciler.reconcile(&order).await.unwrap_err();
        assert!(matches!(err, EngineError::OrderNotPaid { .. }));
        assert!(store.list_entries(&user, 10, 0).unwrap().is_empty());
    }

    #[tokio::test]
    async fn distinct_orders_both_apply() {
        let (reconciler, store, _dir) = setup();
        let user = UserId::generate();

        reconciler
            .reconcile(&paid_order(user, "ord_2001", 100))
            .await
            .unwrap();
        reconciler
            .reconcile(&paid_order(user, "ord_2002", 200))
            .await
            .unwrap();

        let entries = store.list_entries(&user, 10, 0).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.iter().map(|e| e.amount).sum::<i64>(), 300);
    }

    #[tokio::test]
    async fn expiring_order_carries_expiry_onto_grant() {
        let (reconciler, store, _dir) = setup();
        let user = UserId::generate();
        let expires = Utc::now() + chrono::Duration::days(365);
        let mut order = paid_order(user, "ord_3001", 1000);
        order.expires_at = Some(expires);

        reconciler.reconcile(&order).await.unwrap();

        let entries = store.list_entries(&user, 10, 0).unwrap();
        assert_eq!(entries[0].expires_at, Some(expires));
    }
}
