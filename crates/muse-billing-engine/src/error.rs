//! Error types for the muse-billing engines.

use muse_billing_store::StoreError;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur in engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The user's valid credits do not cover the requested debit.
    ///
    /// Nothing is written when this is returned; the ledger never records a
    /// partial or negative-inducing debit.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Usable balance at the time of the attempt.
        balance: i64,
        /// Requested amount.
        required: i64,
    },

    /// A debit or grant amount was zero or negative.
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),

    /// No subscription row exists for the user.
    #[error("subscription not found for user {user_id}")]
    SubscriptionNotFound {
        /// The user without a subscription.
        user_id: String,
    },

    /// The user already has an active subscription.
    #[error("user {user_id} already has an active subscription")]
    AlreadySubscribed {
        /// The already-subscribed user.
        user_id: String,
    },

    /// The free tier never has a subscription row.
    #[error("cannot create a subscription for the free tier")]
    FreePlanNotSubscribable,

    /// Reconciliation was invoked with an unpaid order.
    #[error("order {order_id} is not paid")]
    OrderNotPaid {
        /// The unpaid order.
        order_id: String,
    },

    /// Storage error.
    #[error(transparent)]
    Store(#[from] StoreError),
}
