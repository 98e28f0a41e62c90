//! API handlers.

pub mod credits;
pub mod entitlements;
pub mod health;
pub mod internal;
pub mod subscriptions;
pub mod usage;
pub mod webhooks;
