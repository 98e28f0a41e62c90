//! External collaborator interfaces.
//!
//! The entitlement engine consumes two collaborators: a generation-history
//! counter for the free-tier daily window, and an append-only usage
//! recorder. Both are trait objects so tests can substitute fakes; the
//! service wires the store-backed implementations below.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use muse_billing_core::{UsageRecord, UserId};
use muse_billing_store::{Store, StoreError};

/// Counts a user's prior generations in a time window.
///
/// Must reflect generations recorded strictly before the current request.
#[async_trait]
pub trait GenerationHistory: Send + Sync {
    /// Count generations with timestamps in `[from, to)`.
    async fn count_generations(
        &self,
        user_id: UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64, StoreError>;
}

/// Append-only audit sink for generation usage. Never read back by the
/// engines except through [`GenerationHistory`].
#[async_trait]
pub trait UsageRecorder: Send + Sync {
    /// Record one generation's usage.
    async fn record(&self, record: &UsageRecord) -> Result<(), StoreError>;
}

/// [`GenerationHistory`] backed by the store's usage records.
pub struct StoreHistory {
    store: Arc<dyn Store>,
}

impl StoreHistory {
    /// Create a history counter over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl GenerationHistory for StoreHistory {
    async fn count_generations(
        &self,
        user_id: UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        self.store.count_usage_between(&user_id, from, to)
    }
}

/// [`UsageRecorder`] backed by the store's usage column family.
pub struct StoreUsageRecorder {
    store: Arc<dyn Store>,
}

impl StoreUsageRecorder {
    /// Create a recorder over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl UsageRecorder for StoreUsageRecorder {
    async fn record(&self, record: &UsageRecord) -> Result<(), StoreError> {
        self.store.append_usage(record)
    }
}
