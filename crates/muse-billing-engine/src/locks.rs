//! Per-user serialization for ledger writes.
//!
//! Two concurrent `consume` calls for the same user must not both observe
//! the pre-debit balance and together overspend it. The store's write lock
//! covers individual appends; this map covers the whole read-then-write
//! window of a consume or grant.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use muse_billing_core::UserId;

/// A map of per-user async mutexes.
///
/// Locks are created on first use and kept for the process lifetime; the
/// user population of a single service instance is small enough that
/// eviction is not worth its complexity.
#[derive(Default)]
pub struct UserLocks {
    inner: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl UserLocks {
    /// Create an empty lock map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `user_id`, waiting if another ledger operation
    /// for the same user is in flight.
    pub async fn acquire(&self, user_id: UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            Arc::clone(map.entry(user_id).or_default())
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_user_serializes() {
        let locks = Arc::new(UserLocks::new());
        let user = UserId::generate();

        let guard = locks.acquire(user).await;

        let locks2 = Arc::clone(&locks);
        let contender = tokio::spawn(async move { locks2.acquire(user).await });

        // The second acquire cannot complete while the first guard lives.
        tokio::task::yield_now().await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn different_users_do_not_contend() {
        let locks = UserLocks::new();
        let _a = locks.acquire(UserId::generate()).await;
        let _b = locks.acquire(UserId::generate()).await;
    }
}
