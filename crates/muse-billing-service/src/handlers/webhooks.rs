//! Payment webhook handler.
//!
//! The payment provider delivers `order.paid` events at least once; the
//! reconciler makes repeat deliveries no-ops. Payloads are authenticated
//! with an HMAC-SHA256 signature over the raw body.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use muse_billing_core::Order;

use crate::crypto::{constant_time_eq, hmac_sha256_hex};
use crate::error::ApiError;
use crate::state::AppState;

/// Payment webhook payload.
#[derive(Debug, Deserialize)]
pub struct PaymentWebhook {
    /// Event type, e.g. `"order.paid"`.
    pub event_type: String,
    /// Provider event ID, for log correlation.
    pub event_id: String,
    /// The order the event concerns.
    pub order: Order,
}

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the webhook was processed.
    pub received: bool,
}

/// Handle payment provider webhooks.
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    verify_signature(&state, &headers, &body)?;

    let webhook: PaymentWebhook =
        serde_json::from_str(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    tracing::info!(
        event_type = %webhook.event_type,
        event_id = %webhook.event_id,
        order_id = %webhook.order.order_id,
        "Received payment webhook"
    );

    match webhook.event_type.as_str() {
        "order.paid" => {
            state.reconciler.reconcile(&webhook.order).await?;
        }
        _ => {
            tracing::debug!(event_type = %webhook.event_type, "Unhandled payment event");
        }
    }

    Ok(Json(WebhookResponse { received: true }))
}

/// Check the HMAC-SHA256 signature header against the raw body.
fn verify_signature(state: &AppState, headers: &HeaderMap, body: &str) -> Result<(), ApiError> {
    let Some(secret) = &state.config.payment_webhook_secret else {
        // No secret configured - skip verification (development mode).
        tracing::warn!("payment_webhook_secret not configured - skipping signature verification");
        return Ok(());
    };

    let signature = headers
        .get("x-webhook-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing webhook signature".into()))?;

    let expected = hmac_sha256_hex(secret, body);
    if !constant_time_eq(signature, &expected) {
        tracing::warn!("Invalid payment webhook signature");
        return Err(ApiError::Unauthorized);
    }

    Ok(())
}
