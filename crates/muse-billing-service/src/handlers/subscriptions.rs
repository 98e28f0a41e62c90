//! Subscription lifecycle handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use muse_billing_core::{BillingInterval, PlanId, Subscription, SubscriptionStatus};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Create subscription request.
#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    /// The plan to subscribe to.
    pub plan: PlanId,
    /// Billing interval. Defaults to monthly; one-time plans ignore it.
    #[serde(default = "default_interval")]
    pub interval: BillingInterval,
}

fn default_interval() -> BillingInterval {
    BillingInterval::Monthly
}

/// Subscription response.
#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    /// The subscribed plan.
    pub plan: PlanId,
    /// Current status.
    pub status: SubscriptionStatus,
    /// Billing interval.
    pub interval: BillingInterval,
    /// Start of the current billing period.
    pub current_period_start: DateTime<Utc>,
    /// End of the current billing period.
    pub current_period_end: DateTime<Utc>,
    /// Generations used in the current period.
    pub used_this_month: u32,
    /// When the subscription was cancelled, if it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl From<&Subscription> for SubscriptionResponse {
    fn from(sub: &Subscription) -> Self {
        Self {
            plan: sub.plan,
            status: sub.status,
            interval: sub.interval,
            current_period_start: sub.current_period_start,
            current_period_end: sub.current_period_end,
            used_this_month: sub.used_this_month,
            cancelled_at: sub.cancelled_at,
        }
    }
}

/// Subscribe the user to a plan.
pub async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CreateSubscriptionRequest>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let subscription = state
        .subscriptions
        .create(auth.user_id, body.plan, body.interval, Utc::now())
        .await?;

    Ok(Json(SubscriptionResponse::from(&subscription)))
}

/// Get the current user's subscription.
pub async fn get_mine(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let subscription = state
        .subscriptions
        .get(auth.user_id, Utc::now())?
        .ok_or_else(|| ApiError::NotFound("no subscription".into()))?;

    Ok(Json(SubscriptionResponse::from(&subscription)))
}

/// Cancel the current user's subscription.
///
/// Entitlements are honored until the period end; only renewal stops.
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let subscription = state.subscriptions.cancel(auth.user_id, Utc::now()).await?;

    Ok(Json(SubscriptionResponse::from(&subscription)))
}
