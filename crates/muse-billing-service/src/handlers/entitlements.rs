//! Entitlement check handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use muse_billing_core::EntitlementDecision;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Entitlement check request.
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    /// Requested generation style, if any.
    pub style: Option<String>,
    /// Requested output quality, if any.
    pub quality: Option<String>,
}

/// Check whether the user may generate.
///
/// A denial is a 200 with a `denied` decision body, not an error status;
/// callers branch on the `decision` tag.
pub async fn check(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CheckRequest>,
) -> Result<Json<EntitlementDecision>, ApiError> {
    let decision = state
        .entitlement
        .can_generate(
            auth.user_id,
            body.style.as_deref(),
            body.quality.as_deref(),
            Utc::now(),
        )
        .await?;

    if !decision.is_allowed() {
        tracing::debug!(user_id = %auth.user_id, decision = ?decision, "Generation denied");
    }

    Ok(Json(decision))
}
