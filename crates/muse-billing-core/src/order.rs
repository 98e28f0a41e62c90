//! Payment order types.
//!
//! Orders are owned by the payment provider; muse-billing only reads them.
//! Reconciliation converts a paid order into exactly one ledger grant,
//! keyed by the order ID.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{OrderId, UserId};

/// A payment order delivered by the payment webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Provider-issued order identifier. The reconciliation idempotency key.
    pub order_id: OrderId,

    /// The purchasing user.
    pub user_id: UserId,

    /// Credits to grant when the order is reconciled.
    pub credits_granted: i64,

    /// Payment status. Only `Paid` orders are reconciled.
    pub status: OrderStatus,

    /// When the granted credits expire. `None` = never.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Payment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created but not yet paid.
    Created,

    /// Payment confirmed.
    Paid,
}
