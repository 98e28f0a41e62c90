//! Ledger entry types for muse-billing.
//!
//! The ledger is the only source of truth for a user's credit balance.
//! Entries are immutable facts of credit movement: they are appended, never
//! mutated or deleted. A reversal is modeled as a new entry with the negated
//! amount (a `BonusExpiry` entry exactly offsets an expired `BonusGrant`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{OrderId, TransactionId, UserId};

/// An immutable fact of credit movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry ID (ULID for time-ordering).
    pub id: TransactionId,

    /// The user whose balance this entry affects.
    pub user_id: UserId,

    /// What kind of movement this is.
    pub kind: EntryKind,

    /// Signed credit amount. Positive = credit, negative = debit.
    pub amount: i64,

    /// When the entry was created. Immutable.
    pub created_at: DateTime<Utc>,

    /// When the credits expire. `None` = never.
    ///
    /// Consumption entries inherit the expiry of the grant batch they were
    /// debited against, so a debit leaves the valid sum together with its
    /// source batch.
    pub expires_at: Option<DateTime<Utc>>,

    /// Back-reference to the payment order that produced this entry.
    ///
    /// On grants this is the reconciliation idempotency key. A consumption
    /// entry carries the order ID of its crossing batch for lookup only.
    pub related_order_id: Option<OrderId>,

    /// For `BonusExpiry` entries: the `BonusGrant` this entry negates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offsets: Option<TransactionId>,

    /// Human-readable description.
    pub description: String,
}

impl LedgerEntry {
    /// Create a positive (grant) entry.
    ///
    /// The amount is taken as an absolute value; callers validate positivity
    /// before reaching this constructor.
    #[must_use]
    pub fn grant(
        user_id: UserId,
        amount: i64,
        kind: EntryKind,
        expires_at: Option<DateTime<Utc>>,
        related_order_id: Option<OrderId>,
        description: String,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            kind,
            amount: amount.abs(),
            created_at: Utc::now(),
            expires_at,
            related_order_id,
            offsets: None,
            description,
        }
    }

    /// Create a consumption (debit) entry.
    ///
    /// `batch` is the grant entry at which the FIFO running total crossed
    /// the requested amount; the debit inherits its expiry and order
    /// back-reference ("debit against the oldest-still-valid batch").
    #[must_use]
    pub fn consumption(
        user_id: UserId,
        amount: i64,
        batch: Option<&LedgerEntry>,
        description: String,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            kind: EntryKind::Consumption,
            amount: -amount.abs(),
            created_at: Utc::now(),
            expires_at: batch.and_then(|b| b.expires_at),
            related_order_id: batch.and_then(|b| b.related_order_id.clone()),
            offsets: None,
            description,
        }
    }

    /// Create a `BonusExpiry` entry negating an expired `BonusGrant`.
    ///
    /// The offset carries the same `expires_at` as the grant, so the pair
    /// nets to zero in the full ledger while neither contributes to the
    /// valid (non-expired) sum.
    #[must_use]
    pub fn bonus_expiry(grant: &LedgerEntry) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id: grant.user_id,
            kind: EntryKind::BonusExpiry,
            amount: -grant.amount,
            created_at: Utc::now(),
            expires_at: grant.expires_at,
            related_order_id: None,
            offsets: Some(grant.id),
            description: format!("Expiry of bonus grant {}", grant.id),
        }
    }

    /// Whether this entry adds credits.
    #[must_use]
    pub const fn is_credit(&self) -> bool {
        self.amount > 0
    }

    /// Whether this entry removes credits.
    #[must_use]
    pub const fn is_debit(&self) -> bool {
        self.amount < 0
    }

    /// Whether this entry still counts towards the balance at `as_of`.
    #[must_use]
    pub fn is_valid_at(&self, as_of: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |exp| exp > as_of)
    }
}

/// The kind of credit movement a ledger entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Welcome credits granted on signup.
    NewUserGrant,

    /// Credits purchased through a reconciled payment order.
    OrderPayment,

    /// Credits granted manually by an operator.
    SystemGrant,

    /// Credits debited for a generation.
    Consumption,

    /// Credits granted as part of a subscription plan.
    SubscriptionGrant,

    /// Non-expiring promotional credits.
    PermanentGrant,

    /// Time-boxed promotional credits.
    BonusGrant,

    /// Credits granted with a one-time trial pack purchase.
    TrialPackGrant,

    /// Offsetting entry written when a `BonusGrant` expires.
    BonusExpiry,
}

impl EntryKind {
    /// Grant kinds add credits; `Consumption` and `BonusExpiry` remove them.
    #[must_use]
    pub const fn is_grant(&self) -> bool {
        !matches!(self, Self::Consumption | Self::BonusExpiry)
    }
}
