//! Balance derivation from the ledger.
//!
//! Balances are never stored; they are computed by summing a user's
//! non-expired ledger entries. The partition totals attribute debits to
//! grants oldest-first (the same order the consumption engine debits in)
//! and split the surviving remainders by expiry semantics: *permanent*
//! (never expires) vs *bonus* (has a real expiry). Subscription-cyclical
//! allowances live on the subscription row, not the ledger.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use muse_billing_core::{EntryKind, UserId};
use muse_billing_store::Store;

use crate::error::Result;

/// A user's derived credit balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Balance {
    /// Total usable credits, floored at zero for display.
    pub left_credits: i64,

    /// Credits from non-expiring grants, after FIFO debit attribution.
    pub permanent_credits: i64,

    /// Credits from expiring grants, after FIFO debit attribution.
    pub bonus_credits: i64,

    /// Whether the user has ever had a payment order reconciled.
    pub is_recharged: bool,
}

/// Derives balances from the ledger store.
pub struct BalanceCalculator {
    store: Arc<dyn Store>,
}

impl BalanceCalculator {
    /// Create a calculator over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Compute the user's balance as of `now`.
    ///
    /// The true ledger sum never goes negative under correct consumption
    /// behavior; the zero floor guards against historical data anomalies.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the ledger cannot be read.
    pub fn balance(&self, user_id: UserId, now: DateTime<Utc>) -> Result<Balance> {
        let entries = self.store.list_valid(&user_id, now)?;

        let total: i64 = entries.iter().map(|e| e.amount).sum();

        // FIFO netting: walk oldest-first, reducing surviving grant
        // remainders as debits are encountered.
        let mut remainders: Vec<(bool, i64)> = Vec::new(); // (expires, remaining)
        for entry in &entries {
            if entry.is_credit() {
                remainders.push((entry.expires_at.is_some(), entry.amount));
            } else {
                let mut debit = -entry.amount;
                for (_, remaining) in &mut remainders {
                    if debit == 0 {
                        break;
                    }
                    let taken = debit.min(*remaining);
                    *remaining -= taken;
                    debit -= taken;
                }
                // Any excess debit belongs to an already-expired batch and
                // has no surviving grant to attribute to.
            }
        }

        let permanent_credits = remainders
            .iter()
            .filter(|(expires, _)| !expires)
            .map(|(_, r)| r)
            .sum();
        let bonus_credits = remainders
            .iter()
            .filter(|(expires, _)| *expires)
            .map(|(_, r)| r)
            .sum();

        let is_recharged = self
            .store
            .has_entry_of_kind(&user_id, EntryKind::OrderPayment)?;

        Ok(Balance {
            left_credits: total.max(0),
            permanent_credits,
            bonus_credits,
            is_recharged,
        })
    }
}
