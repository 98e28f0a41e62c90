//! Credit consumption and grants.
//!
//! Debits walk the user's valid ledger entries oldest-first and are
//! attributed to the grant batch at which the running total crosses the
//! requested amount. A request the balance cannot cover is rejected
//! atomically: no ledger entry is written, the balance never goes negative.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use muse_billing_core::{EntryKind, LedgerEntry, OrderId, UserId};
use muse_billing_store::Store;

use crate::error::{EngineError, Result};
use crate::locks::UserLocks;

/// The outcome of a successful debit.
///
/// `left_credits` is computed from the same ledger snapshot the debit was
/// validated against, under the per-user lock, so it is exact at the
/// moment the debit committed. A balance read after the lock is released
/// could already reflect interleaved writes.
#[derive(Debug)]
pub struct DebitReceipt {
    /// The consumption entry that was written.
    pub entry: LedgerEntry,

    /// Usable credits remaining immediately after the debit.
    pub left_credits: i64,
}

/// Debits and grants credits against the ledger.
pub struct ConsumptionEngine {
    store: Arc<dyn Store>,
    locks: Arc<UserLocks>,
}

impl ConsumptionEngine {
    /// Create an engine over the given store, serializing per-user ledger
    /// writes through `locks`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, locks: Arc<UserLocks>) -> Self {
        Self { store, locks }
    }

    /// Debit `amount` credits from the user.
    ///
    /// Writes exactly one `Consumption` entry on success; writes nothing on
    /// failure. The per-user lock makes the read-then-write a single
    /// logical unit: two concurrent debits cannot both observe the same
    /// pre-debit balance. The returned receipt carries the balance left
    /// after the debit, taken from the locked snapshot.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidAmount`] if `amount <= 0`.
    /// - [`EngineError::InsufficientCredits`] if the valid ledger sum does
    ///   not cover `amount`.
    /// - Storage errors are propagated.
    pub async fn consume(
        &self,
        user_id: UserId,
        amount: i64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<DebitReceipt> {
        if amount <= 0 {
            return Err(EngineError::InvalidAmount(amount));
        }

        let _guard = self.locks.acquire(user_id).await;

        let entries = self.store.list_valid(&user_id, now)?;

        // Walk oldest-first; the entry at which the running total crosses
        // the requested amount is the batch the debit is recorded against.
        let mut running = 0i64;
        let mut crossing_batch: Option<&LedgerEntry> = None;
        for entry in &entries {
            running += entry.amount;
            if running >= amount && crossing_batch.is_none() {
                crossing_batch = Some(entry);
            }
        }
        let balance = running.max(0);

        if running < amount || crossing_batch.is_none() {
            tracing::debug!(
                user_id = %user_id,
                balance = %balance,
                required = %amount,
                "Debit rejected: insufficient credits"
            );
            return Err(EngineError::InsufficientCredits {
                balance,
                required: amount,
            });
        }

        let entry = LedgerEntry::consumption(user_id, amount, crossing_batch, reason.to_string());
        self.store.append_entry(&entry)?;

        tracing::info!(
            user_id = %user_id,
            amount = %amount,
            transaction_id = %entry.id,
            reason = %reason,
            "Credits consumed"
        );

        Ok(DebitReceipt {
            entry,
            left_credits: running - amount,
        })
    }

    /// Grant `amount` credits to the user.
    ///
    /// Writes one positive ledger entry. When `related_order_id` is set,
    /// the storage layer's order index rejects a second grant for the same
    /// order with a conflict.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidAmount`] if `amount <= 0`.
    /// - Storage errors (including the order-uniqueness conflict) are
    ///   propagated.
    pub async fn grant(
        &self,
        user_id: UserId,
        amount: i64,
        kind: EntryKind,
        expires_at: Option<DateTime<Utc>>,
        related_order_id: Option<OrderId>,
        description: String,
    ) -> Result<LedgerEntry> {
        if amount <= 0 {
            return Err(EngineError::InvalidAmount(amount));
        }

        let _guard = self.locks.acquire(user_id).await;

        let entry = LedgerEntry::grant(
            user_id,
            amount,
            kind,
            expires_at,
            related_order_id,
            description,
        );
        self.store.append_entry(&entry)?;

        tracing::info!(
            user_id = %user_id,
            amount = %amount,
            kind = ?kind,
            transaction_id = %entry.id,
            "Credits granted"
        );

        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::BalanceCalculator;
    use chrono::Duration;
    use muse_billing_store::{RocksStore, StoreError};
    use tempfile::TempDir;

    struct Harness {
        engine: Arc<ConsumptionEngine>,
        balance: BalanceCalculator,
        store: Arc<dyn Store>,
        _dir: TempDir,
    }

    fn setup() -> Harness {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn Store> = Arc::new(RocksStore::open(dir.path()).unwrap());
        Harness {
            engine: Arc::new(ConsumptionEngine::new(
                Arc::clone(&store),
                Arc::new(UserLocks::new()),
            )),
            balance: BalanceCalculator::new(Arc::clone(&store)),
            store,
            _dir: dir,
        }
    }

    async fn grant(h: &Harness, user: UserId, amount: i64, expires: Option<DateTime<Utc>>) {
        h.engine
            .grant(
                user,
                amount,
                if expires.is_some() {
                    EntryKind::BonusGrant
                } else {
                    EntryKind::PermanentGrant
                },
                expires,
                None,
                "test grant".into(),
            )
            .await
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2)); // Distinct ULIDs
    }

    #[tokio::test]
    async fn grant_then_consume_roundtrip() {
        let h = setup();
        let user = UserId::generate();
        let now = Utc::now();

        grant(&h, user, 100, None).await;
        let receipt = h.engine.consume(user, 100, "generation", now).await.unwrap();
        assert_eq!(receipt.left_credits, 0);

        let balance = h.balance.balance(user, now).unwrap();
        assert_eq!(balance.left_credits, 0);

        // Exactly two entries: +100 and -100.
        let entries = h.store.list_entries(&user, 10, 0).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].amount, -100);
        assert_eq!(entries[1].amount, 100);
    }

    #[tokio::test]
    async fn fifo_debit_references_crossing_batch() {
        let h = setup();
        let user = UserId::generate();
        let now = Utc::now();

        let g2_expiry = now + Duration::days(60);
        grant(&h, user, 10, Some(now + Duration::days(30))).await;
        grant(&h, user, 20, Some(g2_expiry)).await;
        grant(&h, user, 15, None).await;

        // 25 crosses inside G2: G1 fully, G2 partially, G3 untouched.
        let receipt = h.engine.consume(user, 25, "generation", now).await.unwrap();
        assert_eq!(receipt.entry.expires_at, Some(g2_expiry));
        assert_eq!(receipt.left_credits, 10 + 20 + 15 - 25);

        let balance = h.balance.balance(user, now).unwrap();
        assert_eq!(balance.left_credits, 10 + 20 + 15 - 25);
    }

    #[tokio::test]
    async fn insufficient_funds_rejected_and_nothing_written() {
        let h = setup();
        let user = UserId::generate();
        let now = Utc::now();

        grant(&h, user, 40, None).await;

        let result = h.engine.consume(user, 50, "generation", now).await;
        assert!(matches!(
            result,
            Err(EngineError::InsufficientCredits {
                balance: 40,
                required: 50
            })
        ));

        // The failed debit left no trace.
        let entries = h.store.list_entries(&user, 10, 0).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(h.balance.balance(user, now).unwrap().left_credits, 40);
    }

    #[tokio::test]
    async fn zero_and_negative_amounts_rejected() {
        let h = setup();
        let user = UserId::generate();
        let now = Utc::now();

        assert!(matches!(
            h.engine.consume(user, 0, "x", now).await,
            Err(EngineError::InvalidAmount(0))
        ));
        assert!(matches!(
            h.engine
                .grant(user, -5, EntryKind::SystemGrant, None, None, "x".into())
                .await,
            Err(EngineError::InvalidAmount(-5))
        ));
    }

    #[tokio::test]
    async fn expired_grants_do_not_fund_debits() {
        let h = setup();
        let user = UserId::generate();
        let now = Utc::now();

        grant(&h, user, 100, Some(now - Duration::hours(1))).await;

        let result = h.engine.consume(user, 10, "generation", now).await;
        assert!(matches!(
            result,
            Err(EngineError::InsufficientCredits { balance: 0, .. })
        ));
    }

    #[tokio::test]
    async fn duplicate_order_grant_conflicts() {
        let h = setup();
        let user = UserId::generate();
        let order: OrderId = "ord_dup".parse().unwrap();

        h.engine
            .grant(
                user,
                500,
                EntryKind::OrderPayment,
                None,
                Some(order.clone()),
                "Order".into(),
            )
            .await
            .unwrap();

        let result = h
            .engine
            .grant(
                user,
                500,
                EntryKind::OrderPayment,
                None,
                Some(order),
                "Order replay".into(),
            )
            .await;
        assert!(matches!(
            result,
            Err(EngineError::Store(StoreError::Conflict { .. }))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_debits_cannot_overspend() {
        let h = setup();
        let user = UserId::generate();
        let now = Utc::now();

        grant(&h, user, 100, None).await;

        let e1 = Arc::clone(&h.engine);
        let e2 = Arc::clone(&h.engine);
        let t1 = tokio::spawn(async move { e1.consume(user, 60, "a", now).await });
        let t2 = tokio::spawn(async move { e2.consume(user, 60, "b", now).await });

        let r1 = t1.await.unwrap();
        let r2 = t2.await.unwrap();

        // Exactly one success, one rejection; the winner's receipt reports
        // the post-debit balance from its locked snapshot.
        let receipt = r1.ok().xor(r2.ok()).expect("exactly one debit succeeds");
        assert_eq!(receipt.left_credits, 40);

        let balance = h.balance.balance(user, now).unwrap();
        assert_eq!(balance.left_credits, 40);
    }
}
