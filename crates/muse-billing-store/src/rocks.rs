//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use muse_billing_core::{
    EntryKind, LedgerEntry, OrderId, Subscription, SubscriptionStatus, UsageRecord, UserId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,

    /// Serializes check-then-write sequences (unique-key appends, counter
    /// increments, marker claims). `WriteBatch` gives atomicity; this lock
    /// gives the preceding existence checks their isolation.
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Unavailable(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_entry(&self, key: &[u8]) -> Result<Option<LedgerEntry>> {
        let cf = self.cf(cf::LEDGER)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Collect all index keys under a user prefix, oldest-first.
    fn user_index_keys(&self, cf_name: &str, user_id: &UserId) -> Result<Vec<Vec<u8>>> {
        let cf = self.cf(cf_name)?;
        let prefix = keys::user_prefix(user_id);

        let iter = self.db.iterator_cf(
            &cf,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut all_keys = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Unavailable(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            all_keys.push(key.to_vec());
        }
        Ok(all_keys)
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Ledger Operations
    // =========================================================================

    fn append_entry(&self, entry: &LedgerEntry) -> Result<()> {
        let cf_ledger = self.cf(cf::LEDGER)?;
        let cf_by_user = self.cf(cf::LEDGER_BY_USER)?;
        let cf_by_order = self.cf(cf::LEDGER_BY_ORDER)?;

        let ledger_key = keys::ledger_key(&entry.id);
        let user_key = keys::user_ledger_key(&entry.user_id, &entry.id);

        // The existence checks and the batch write must not interleave with
        // another append, or two writers could both pass the checks.
        let _guard = self.write_lock.lock().map_err(|_| {
            StoreError::Unavailable("store write lock poisoned".into())
        })?;

        if self
            .db
            .get_cf(&cf_ledger, &ledger_key)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .is_some()
        {
            return Err(StoreError::Conflict {
                key: entry.id.to_string(),
            });
        }

        // Only grants claim the order index slot; a consumption entry
        // carrying a batch's order id is lookup metadata, not a claim.
        let order_index_key = match (&entry.related_order_id, entry.is_credit()) {
            (Some(order_id), true) => {
                let key = keys::order_key(order_id);
                if self
                    .db
                    .get_cf(&cf_by_order, &key)
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?
                    .is_some()
                {
                    return Err(StoreError::Conflict {
                        key: order_id.to_string(),
                    });
                }
                Some(key)
            }
            _ => None,
        };

        let value = Self::serialize(entry)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_ledger, &ledger_key, &value);
        batch.put_cf(&cf_by_user, &user_key, []); // Index entry (empty value)
        if let Some(order_key) = order_index_key {
            batch.put_cf(&cf_by_order, &order_key, entry.id.to_bytes());
        }
        if let Some(grant_id) = entry.offsets {
            let cf_offsets = self.cf(cf::EXPIRY_OFFSETS)?;
            batch.put_cf(&cf_offsets, grant_id.to_bytes(), entry.id.to_bytes());
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(())
    }

    fn find_by_order_id(&self, order_id: &OrderId) -> Result<Option<LedgerEntry>> {
        let cf_by_order = self.cf(cf::LEDGER_BY_ORDER)?;

        let Some(tx_bytes) = self
            .db
            .get_cf(&cf_by_order, keys::order_key(order_id))
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
        else {
            return Ok(None);
        };

        self.get_entry(&tx_bytes)
    }

    fn list_valid(&self, user_id: &UserId, as_of: DateTime<Utc>) -> Result<Vec<LedgerEntry>> {
        let index_keys = self.user_index_keys(cf::LEDGER_BY_USER, user_id)?;

        let mut entries = Vec::new();
        for key in index_keys {
            let tx_id = keys::extract_transaction_id(&key);
            if let Some(entry) = self.get_entry(&keys::ledger_key(&tx_id))? {
                if entry.is_valid_at(as_of) {
                    entries.push(entry);
                }
            }
        }
        Ok(entries)
    }

    fn list_entries(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>> {
        let mut index_keys = self.user_index_keys(cf::LEDGER_BY_USER, user_id)?;

        // Reverse to get newest first
        index_keys.reverse();

        let mut entries = Vec::new();
        for key in index_keys.into_iter().skip(offset) {
            if entries.len() >= limit {
                break;
            }
            let tx_id = keys::extract_transaction_id(&key);
            if let Some(entry) = self.get_entry(&keys::ledger_key(&tx_id))? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    fn has_entry_of_kind(&self, user_id: &UserId, kind: EntryKind) -> Result<bool> {
        let index_keys = self.user_index_keys(cf::LEDGER_BY_USER, user_id)?;

        for key in index_keys {
            let tx_id = keys::extract_transaction_id(&key);
            if let Some(entry) = self.get_entry(&keys::ledger_key(&tx_id))? {
                if entry.kind == kind {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn list_expired_bonus_grants(&self, now: DateTime<Utc>) -> Result<Vec<LedgerEntry>> {
        let cf_ledger = self.cf(cf::LEDGER)?;
        let cf_offsets = self.cf(cf::EXPIRY_OFFSETS)?;

        // Full scan; the sweep runs daily from a scheduler, not per-request.
        let mut grants = Vec::new();
        for item in self.db.iterator_cf(&cf_ledger, IteratorMode::Start) {
            let (key, value) = item.map_err(|e| StoreError::Unavailable(e.to_string()))?;
            let entry: LedgerEntry = Self::deserialize(&value)?;

            if entry.kind != EntryKind::BonusGrant {
                continue;
            }
            if entry.expires_at.map_or(true, |exp| exp > now) {
                continue;
            }
            let already_offset = self
                .db
                .get_cf(&cf_offsets, &key)
                .map_err(|e| StoreError::Unavailable(e.to_string()))?
                .is_some();
            if !already_offset {
                grants.push(entry);
            }
        }
        Ok(grants)
    }

    // =========================================================================
    // Subscription Operations
    // =========================================================================

    fn get_subscription(&self, user_id: &UserId) -> Result<Option<Subscription>> {
        let cf = self.cf(cf::SUBSCRIPTIONS)?;

        self.db
            .get_cf(&cf, keys::subscription_key(user_id))
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn put_subscription(&self, subscription: &Subscription) -> Result<()> {
        let cf = self.cf(cf::SUBSCRIPTIONS)?;
        let key = keys::subscription_key(&subscription.user_id);
        let value = Self::serialize(subscription)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(())
    }

    fn increment_usage(&self, user_id: &UserId) -> Result<u32> {
        let cf = self.cf(cf::SUBSCRIPTIONS)?;
        let key = keys::subscription_key(user_id);

        let _guard = self.write_lock.lock().map_err(|_| {
            StoreError::Unavailable("store write lock poisoned".into())
        })?;

        let mut subscription = self
            .get_subscription(user_id)?
            .ok_or(StoreError::NotFound)?;

        subscription.used_this_month += 1;

        let value = Self::serialize(&subscription)?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(subscription.used_this_month)
    }

    fn list_active_subscriptions(&self) -> Result<Vec<Subscription>> {
        let cf = self.cf(cf::SUBSCRIPTIONS)?;

        let mut subscriptions = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Unavailable(e.to_string()))?;
            let subscription: Subscription = Self::deserialize(&value)?;
            if subscription.status == SubscriptionStatus::Active {
                subscriptions.push(subscription);
            }
        }
        Ok(subscriptions)
    }

    // =========================================================================
    // Scheduler Bookkeeping
    // =========================================================================

    fn try_claim_reset_marker(&self, month_key: &str, now: DateTime<Utc>) -> Result<bool> {
        let cf = self.cf(cf::RESET_MARKERS)?;

        let _guard = self.write_lock.lock().map_err(|_| {
            StoreError::Unavailable("store write lock poisoned".into())
        })?;

        if self
            .db
            .get_cf(&cf, month_key.as_bytes())
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .is_some()
        {
            return Ok(false);
        }

        self.db
            .put_cf(&cf, month_key.as_bytes(), now.to_rfc3339().as_bytes())
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(true)
    }

    // =========================================================================
    // Usage Records
    // =========================================================================

    fn append_usage(&self, record: &UsageRecord) -> Result<()> {
        let cf_usage = self.cf(cf::USAGE)?;
        let cf_by_user = self.cf(cf::USAGE_BY_USER)?;

        let usage_key = record.id.to_bytes();
        let user_key = keys::user_ledger_key(&record.user_id, &record.id);
        let value = Self::serialize(record)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_usage, usage_key, &value);
        batch.put_cf(&cf_by_user, &user_key, []);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(())
    }

    fn count_usage_between(
        &self,
        user_id: &UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64> {
        let cf_usage = self.cf(cf::USAGE)?;
        let index_keys = self.user_index_keys(cf::USAGE_BY_USER, user_id)?;

        let mut count = 0u64;
        for key in index_keys {
            let tx_id = keys::extract_transaction_id(&key);
            let Some(data) = self
                .db
                .get_cf(&cf_usage, tx_id.to_bytes())
                .map_err(|e| StoreError::Unavailable(e.to_string()))?
            else {
                continue;
            };
            let record: UsageRecord = Self::deserialize(&data)?;
            if record.created_at >= from && record.created_at < to {
                count += 1;
            }
        }
        Ok(count)
    }
}
