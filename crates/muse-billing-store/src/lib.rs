//! `RocksDB` storage layer for muse-billing.
//!
//! This crate provides the durable ledger store: append-only credit
//! movements, subscription rows, usage records, and the small amount of
//! bookkeeping the scheduled jobs need (reset markers, expiry offsets).
//!
//! # Architecture
//!
//! Rows are CBOR-encoded into column families; see [`schema`] for the
//! layout. Two index families matter for correctness:
//!
//! - `ledger_by_user` keys are `user_id || ulid`, so a prefix scan yields a
//!   user's entries oldest-first - the ordering FIFO consumption relies on.
//! - `ledger_by_order` enforces at most one grant per payment order at the
//!   storage layer; a duplicate append fails with [`StoreError::Conflict`].
//!
//! # Example
//!
//! ```no_run
//! use muse_billing_store::{RocksStore, Store};
//! use muse_billing_core::{EntryKind, LedgerEntry, UserId};
//!
//! let store = RocksStore::open("/tmp/muse-billing-db").unwrap();
//!
//! let user_id = UserId::generate();
//! let entry = LedgerEntry::grant(
//!     user_id, 100, EntryKind::NewUserGrant, None, None, "Welcome".into(),
//! );
//! store.append_entry(&entry).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};
use muse_billing_core::{EntryKind, LedgerEntry, OrderId, Subscription, UsageRecord, UserId};

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer so engines can be tested against
/// alternative implementations.
pub trait Store: Send + Sync {
    // =========================================================================
    // Ledger Operations
    // =========================================================================

    /// Append a ledger entry.
    ///
    /// Entries are immutable once written.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Conflict`] if the transaction ID already exists, or
    ///   if the entry is a grant whose `related_order_id` already has a
    ///   grant (the reconciliation uniqueness guard).
    /// - [`StoreError::Unavailable`] on database failure.
    fn append_entry(&self, entry: &LedgerEntry) -> Result<()>;

    /// Find the grant produced by a payment order, if one exists.
    ///
    /// Used for reconciliation idempotency.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_by_order_id(&self, order_id: &OrderId) -> Result<Option<LedgerEntry>>;

    /// List a user's non-expired entries, ordered by `created_at` ascending.
    ///
    /// An entry qualifies when `expires_at` is `None` or `> as_of`. The
    /// oldest-first ordering is load-bearing for FIFO consumption.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_valid(&self, user_id: &UserId, as_of: DateTime<Utc>) -> Result<Vec<LedgerEntry>>;

    /// List a user's entries newest-first, paginated (history endpoint).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_entries(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>>;

    /// Whether the user has at least one entry of the given kind, expired
    /// entries included. Backs the `is_recharged` flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn has_entry_of_kind(&self, user_id: &UserId, kind: EntryKind) -> Result<bool>;

    /// List all expired `BonusGrant` entries that do not yet have an
    /// offsetting `BonusExpiry` entry. Input for the cleanup sweep.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_expired_bonus_grants(&self, now: DateTime<Utc>) -> Result<Vec<LedgerEntry>>;

    // =========================================================================
    // Subscription Operations
    // =========================================================================

    /// Get a user's subscription row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_subscription(&self, user_id: &UserId) -> Result<Option<Subscription>>;

    /// Insert or replace a subscription row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_subscription(&self, subscription: &Subscription) -> Result<()>;

    /// Atomically increment `used_this_month`, returning the new counter.
    ///
    /// The read-modify-write runs under the store's write lock so that
    /// concurrent generation requests from one user cannot lose increments.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no subscription row exists.
    fn increment_usage(&self, user_id: &UserId) -> Result<u32>;

    /// List all subscriptions currently in `Active` status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_active_subscriptions(&self) -> Result<Vec<Subscription>>;

    // =========================================================================
    // Scheduler Bookkeeping
    // =========================================================================

    /// Claim the monthly reset marker for `month_key` (`"YYYY-MM"`).
    ///
    /// Returns `true` if this call claimed it, `false` if the marker already
    /// existed - the at-most-once-per-calendar-month guard for the reset
    /// batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn try_claim_reset_marker(&self, month_key: &str, now: DateTime<Utc>) -> Result<bool>;

    // =========================================================================
    // Usage Records
    // =========================================================================

    /// Append a usage record (audit sink).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn append_usage(&self, record: &UsageRecord) -> Result<()>;

    /// Count a user's usage records with `created_at` in `[from, to)`.
    ///
    /// Backs the free-tier daily window check.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn count_usage_between(
        &self,
        user_id: &UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64>;
}
