//! Usage reporting handler (service-to-service).

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use muse_billing_core::{GenerationId, UserId};

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Usage report from a generation worker.
#[derive(Debug, Deserialize)]
pub struct ReportUsageRequest {
    /// The user who generated.
    pub user_id: UserId,
    /// The generation being reported.
    pub generation_id: GenerationId,
    /// Credits the generation consumed.
    pub credits_used: i64,
    /// Requested style, if any.
    pub style: Option<String>,
    /// The prompt, if the caller chooses to include it.
    pub prompt: Option<String>,
}

/// Usage report response.
#[derive(Debug, Serialize)]
pub struct ReportUsageResponse {
    /// Always true; bookkeeping failures are absorbed server-side.
    pub recorded: bool,
}

/// Record a completed generation's usage.
///
/// Always succeeds from the caller's perspective: the generation has
/// already happened, so accounting failures are logged and absorbed rather
/// than bounced back to the worker.
pub async fn report_usage(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<ReportUsageRequest>,
) -> Result<Json<ReportUsageResponse>, ApiError> {
    tracing::debug!(
        user_id = %body.user_id,
        generation_id = %body.generation_id,
        service = %auth.service_name,
        "Usage report received"
    );

    state
        .entitlement
        .record_usage(
            body.user_id,
            body.generation_id,
            body.credits_used,
            body.style,
            body.prompt,
            Utc::now(),
        )
        .await;

    Ok(Json(ReportUsageResponse { recorded: true }))
}
