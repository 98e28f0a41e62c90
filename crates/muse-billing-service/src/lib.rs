//! Muse billing HTTP API service.
//!
//! This crate exposes the credit ledger, entitlement checks, and
//! subscription lifecycle over HTTP:
//!
//! - Balance and ledger history for authenticated users
//! - Consume/grant endpoints for generation workers
//! - Entitlement checks for the generation gateway
//! - Payment webhooks and internal maintenance triggers
//!
//! # Authentication
//!
//! Two authentication methods:
//!
//! 1. **Bearer tokens** - for end-user requests (minted by the API gateway)
//! 2. **Service API keys** - for service-to-service requests (workers,
//!    schedulers)

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers need async for routing consistency

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
