//! Database schema definitions and column families.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Ledger entries, keyed by `transaction_id` (ULID).
    pub const LEDGER: &str = "ledger";

    /// Index: ledger entries by user, keyed by `user_id || transaction_id`.
    /// Value is empty (index only). ULID ordering makes a prefix scan
    /// iterate a user's entries oldest-first.
    pub const LEDGER_BY_USER: &str = "ledger_by_user";

    /// Index: grant entries by payment order, keyed by `order_id`.
    /// Value is the grant's `transaction_id`. The uniqueness of this key is
    /// the storage-layer guard against duplicate order reconciliation.
    pub const LEDGER_BY_ORDER: &str = "ledger_by_order";

    /// Subscription rows, keyed by `user_id`.
    pub const SUBSCRIPTIONS: &str = "subscriptions";

    /// Usage records, keyed by `record_id` (ULID).
    pub const USAGE: &str = "usage";

    /// Index: usage records by user, keyed by `user_id || record_id`.
    pub const USAGE_BY_USER: &str = "usage_by_user";

    /// Monthly reset markers, keyed by `"YYYY-MM"`. One row per calendar
    /// month; claiming the row is the at-most-once guard for the reset job.
    pub const RESET_MARKERS: &str = "reset_markers";

    /// Index: bonus grants already offset by a `BonusExpiry` entry, keyed
    /// by the grant's `transaction_id`. Makes the expiry sweep idempotent.
    pub const EXPIRY_OFFSETS: &str = "expiry_offsets";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::LEDGER,
        cf::LEDGER_BY_USER,
        cf::LEDGER_BY_ORDER,
        cf::SUBSCRIPTIONS,
        cf::USAGE,
        cf::USAGE_BY_USER,
        cf::RESET_MARKERS,
        cf::EXPIRY_OFFSETS,
    ]
}
