//! Business engines for muse-billing.
//!
//! This crate implements the credit and subscription logic on top of the
//! storage layer:
//!
//! - [`BalanceCalculator`] - derives balances from the ledger
//! - [`ConsumptionEngine`] - FIFO credit debits and grants
//! - [`EntitlementEngine`] - tier limit and style/quality gating decisions
//! - [`SubscriptionManager`] - subscription lifecycle and scheduled resets
//! - [`OrderReconciler`] - idempotent order-to-credit conversion
//!
//! Engines take their storage and collaborator dependencies as constructor
//! parameters - no module-level singletons. All state they touch lives in
//! the [`Store`](muse_billing_store::Store); the engines themselves are
//! cheap to clone behind `Arc`s and safe to share across request handlers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod balance;
pub mod collaborators;
pub mod consumption;
pub mod entitlement;
pub mod error;
pub mod lifecycle;
pub mod locks;
pub mod reconcile;

pub use balance::{Balance, BalanceCalculator};
pub use collaborators::{GenerationHistory, StoreHistory, StoreUsageRecorder, UsageRecorder};
pub use consumption::{ConsumptionEngine, DebitReceipt};
pub use entitlement::EntitlementEngine;
pub use error::{EngineError, Result};
pub use lifecycle::SubscriptionManager;
pub use locks::UserLocks;
pub use reconcile::OrderReconciler;
