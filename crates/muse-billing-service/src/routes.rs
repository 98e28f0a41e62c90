//! Router configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{credits, entitlements, health, internal, subscriptions, usage, webhooks};
use crate::state::AppState;

/// Maximum concurrent requests for the entitlement check and usage
/// endpoints, which take the bulk of traffic from the generation services.
const USAGE_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Credits (bearer auth)
/// - `GET /v1/credits/balance` - Derived balance
/// - `GET /v1/credits/ledger` - Ledger history, newest first
///
/// ## Credits (service API key)
/// - `POST /v1/credits/consume` - Debit for a generation
/// - `POST /v1/credits/grant` - Grant credits
///
/// ## Entitlements (bearer auth)
/// - `POST /v1/entitlements/check` - Allow/deny decision for a generation
///
/// ## Usage (service API key)
/// - `POST /v1/usage` - Record a completed generation
///
/// ## Subscriptions (bearer auth)
/// - `POST /v1/subscriptions` - Subscribe to a plan
/// - `GET /v1/subscriptions/me` - Current subscription
/// - `DELETE /v1/subscriptions` - Cancel (honored until period end)
///
/// ## Webhooks (HMAC signature)
/// - `POST /webhooks/payments` - Payment provider events
///
/// ## Internal (service API key)
/// - `POST /internal/monthly-reset` - Period rollover
/// - `POST /internal/bonus-sweep` - Offset expired bonus grants
/// - `POST /internal/orders/reconcile` - Backfill a payment order
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    // Entitlement checks and usage reports arrive per generation, so they
    // carry their own higher concurrency limit.
    let usage_routes = Router::new()
        .route("/entitlements/check", post(entitlements::check))
        .route("/usage", post(usage::report_usage))
        .layer(ConcurrencyLimitLayer::new(USAGE_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        // Credits
        .route("/credits/balance", get(credits::get_balance))
        .route("/credits/ledger", get(credits::list_ledger))
        .route("/credits/consume", post(credits::consume))
        .route("/credits/grant", post(credits::grant))
        // Subscriptions
        .route("/subscriptions", post(subscriptions::create))
        .route("/subscriptions", delete(subscriptions::cancel))
        .route("/subscriptions/me", get(subscriptions::get_mine))
        // Entitlement and usage routes (with their own concurrency limit)
        .merge(usage_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        // API v1 routes (rate limited)
        .nest("/v1", api_routes)
        // Webhooks (no rate limit - controlled by the payment provider)
        .route("/webhooks/payments", post(webhooks::payment_webhook))
        // Internal maintenance (service auth)
        .route("/internal/monthly-reset", post(internal::monthly_reset))
        .route("/internal/bonus-sweep", post(internal::bonus_sweep))
        .route(
            "/internal/orders/reconcile",
            post(internal::reconcile_order),
        )
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
