//! Core types for the muse-billing platform.
//!
//! This crate provides the foundational types used throughout muse-billing:
//!
//! - **Identifiers**: `UserId`, `TransactionId`, `GenerationId`, `OrderId`
//! - **Ledger**: `LedgerEntry`, `EntryKind` - the append-only credit ledger
//! - **Plans**: `PlanId`, `PlanDefinition` - static tier configuration
//! - **Subscriptions**: `Subscription`, `SubscriptionStatus`, `BillingInterval`
//! - **Entitlements**: `EntitlementDecision`, `DenialReason`
//! - **Usage**: `UsageRecord` - append-only generation audit rows
//! - **Orders**: `Order`, `OrderStatus` - paid orders awaiting reconciliation
//!
//! # Credit unit
//!
//! Credits are whole units stored as `i64`. A generation costs a small
//! integer number of credits; grants and debits are signed ledger amounts
//! (positive = credit, negative = debit). The balance is never stored - it
//! is always derived by summing non-expired ledger entries.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod entitlement;
pub mod ids;
pub mod ledger;
pub mod order;
pub mod plan;
pub mod subscription;
pub mod usage;

pub use entitlement::{DenialReason, EntitlementDecision};
pub use ids::{GenerationId, IdError, OrderId, TransactionId, UserId};
pub use ledger::{EntryKind, LedgerEntry};
pub use order::{Order, OrderStatus};
pub use plan::{
    PlanDefinition, PlanId, StyleSet, FREE_DAILY_GENERATION_LIMIT, PRO_MONTHLY_GENERATION_LIMIT,
    PRO_MONTHLY_PRICE_CENTS, PRO_YEARLY_PRICE_CENTS, TRIAL_MONTHLY_GENERATION_LIMIT,
    TRIAL_PRICE_CENTS, ULTRA_MONTHLY_PRICE_CENTS, ULTRA_YEARLY_PRICE_CENTS,
};
pub use subscription::{BillingInterval, Subscription, SubscriptionStatus};
pub use usage::UsageRecord;
