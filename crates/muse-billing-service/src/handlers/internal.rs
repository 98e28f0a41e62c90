//! Internal maintenance endpoints (service-to-service).
//!
//! The external scheduler triggers these; each underlying operation is
//! idempotent, so a retried trigger is harmless.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use muse_billing_core::Order;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Monthly reset response.
#[derive(Debug, Serialize)]
pub struct MonthlyResetResponse {
    /// Subscription rows touched. Zero when the month's reset already ran.
    pub touched: u64,
}

/// Run the monthly period reset.
pub async fn monthly_reset(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
) -> Result<Json<MonthlyResetResponse>, ApiError> {
    let touched = state.subscriptions.run_monthly_reset(Utc::now())?;

    tracing::info!(touched, service = %auth.service_name, "Monthly reset triggered");
    Ok(Json(MonthlyResetResponse { touched }))
}

/// Bonus sweep response.
#[derive(Debug, Serialize)]
pub struct BonusSweepResponse {
    /// Expired bonus grants offset by this sweep.
    pub swept: u64,
}

/// Offset expired bonus grants.
pub async fn bonus_sweep(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
) -> Result<Json<BonusSweepResponse>, ApiError> {
    let swept = state.subscriptions.sweep_expired_bonuses(Utc::now())?;

    tracing::info!(swept, service = %auth.service_name, "Bonus sweep triggered");
    Ok(Json(BonusSweepResponse { swept }))
}

/// Reconcile response.
#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    /// Whether the order is now reflected in the ledger.
    pub reconciled: bool,
}

/// Reconcile a payment order directly, bypassing the webhook path.
///
/// Backfill entry point for orders whose webhook delivery was lost.
pub async fn reconcile_order(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(order): Json<Order>,
) -> Result<Json<ReconcileResponse>, ApiError> {
    state.reconciler.reconcile(&order).await?;

    tracing::info!(
        order_id = %order.order_id,
        user_id = %order.user_id,
        service = %auth.service_name,
        "Order reconciled via internal endpoint"
    );
    Ok(Json(ReconcileResponse { reconciled: true }))
}
