//! Credit balance, ledger history, and service-side credit movements.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use muse_billing_core::{EntryKind, LedgerEntry, UserId};
use muse_billing_engine::Balance;

use crate::auth::{AuthUser, ServiceAuth};
use crate::error::ApiError;
use crate::state::AppState;

/// Balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Total usable credits.
    pub left_credits: i64,
    /// Credits from non-expiring grants.
    pub permanent_credits: i64,
    /// Credits from expiring grants.
    pub bonus_credits: i64,
    /// Whether the user has ever completed a payment.
    pub is_recharged: bool,
    /// Whether the user currently has spendable credits.
    pub is_pro: bool,
}

impl From<Balance> for BalanceResponse {
    fn from(balance: Balance) -> Self {
        Self {
            left_credits: balance.left_credits,
            permanent_credits: balance.permanent_credits,
            bonus_credits: balance.bonus_credits,
            is_recharged: balance.is_recharged,
            is_pro: balance.left_credits > 0,
        }
    }
}

/// Get current credit balance.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.balance.balance(auth.user_id, Utc::now())?;
    Ok(Json(BalanceResponse::from(balance)))
}

/// Ledger history query parameters.
#[derive(Debug, Deserialize)]
pub struct ListLedgerQuery {
    /// Maximum number of entries to return (default: 50, max: 100).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// One ledger entry, as rendered for the history endpoint.
#[derive(Debug, Serialize)]
pub struct EntryResponse {
    /// Transaction ID.
    pub id: String,
    /// Movement kind.
    pub kind: EntryKind,
    /// Signed credit amount.
    pub amount: i64,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
    /// When the credits expire, if ever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Payment order behind this entry, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_order_id: Option<String>,
    /// Human-readable description.
    pub description: String,
}

impl From<&LedgerEntry> for EntryResponse {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            kind: entry.kind,
            amount: entry.amount,
            created_at: entry.created_at,
            expires_at: entry.expires_at,
            related_order_id: entry.related_order_id.as_ref().map(ToString::to_string),
            description: entry.description.clone(),
        }
    }
}

/// Ledger history response.
#[derive(Debug, Serialize)]
pub struct ListLedgerResponse {
    /// Entries, newest first.
    pub entries: Vec<EntryResponse>,
    /// Whether there are more entries beyond this page.
    pub has_more: bool,
}

/// List ledger history, newest first.
pub async fn list_ledger(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListLedgerQuery>,
) -> Result<Json<ListLedgerResponse>, ApiError> {
    // Fetch one more than requested to determine has_more.
    let limit = query.limit.min(100);
    let entries = state
        .store
        .list_entries(&auth.user_id, limit + 1, query.offset)?;

    let has_more = entries.len() > limit;
    let entries: Vec<_> = entries.iter().take(limit).map(EntryResponse::from).collect();

    Ok(Json(ListLedgerResponse { entries, has_more }))
}

/// Consume request (service-to-service).
#[derive(Debug, Deserialize)]
pub struct ConsumeRequest {
    /// The user to debit.
    pub user_id: UserId,
    /// Credits to consume. Must be positive.
    pub amount: i64,
    /// What the credits were spent on.
    pub reason: String,
}

/// Consume response.
#[derive(Debug, Serialize)]
pub struct ConsumeResponse {
    /// The debit's transaction ID.
    pub transaction_id: String,
    /// Balance after the debit.
    pub left_credits: i64,
}

/// Debit a user's credits for a completed generation.
pub async fn consume(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<ConsumeRequest>,
) -> Result<Json<ConsumeResponse>, ApiError> {
    tracing::debug!(
        user_id = %body.user_id,
        amount = body.amount,
        service = %auth.service_name,
        "Consume request received"
    );

    // The receipt's balance comes from the snapshot the debit was
    // validated against, so the response cannot leak an interleaved
    // grant or debit from another request.
    let receipt = state
        .consumption
        .consume(body.user_id, body.amount, &body.reason, Utc::now())
        .await?;

    Ok(Json(ConsumeResponse {
        transaction_id: receipt.entry.id.to_string(),
        left_credits: receipt.left_credits,
    }))
}

/// Grant request (service-to-service).
#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    /// The user to credit.
    pub user_id: UserId,
    /// Credits to grant. Must be positive.
    pub amount: i64,
    /// Movement kind. Must be a grant kind.
    pub kind: EntryKind,
    /// When the credits expire, if ever.
    pub expires_at: Option<DateTime<Utc>>,
    /// Payment order backing this grant, if any.
    pub order_id: Option<String>,
    /// Human-readable description.
    pub description: String,
}

/// Grant response.
#[derive(Debug, Serialize)]
pub struct GrantResponse {
    /// The grant's transaction ID.
    pub transaction_id: String,
}

/// Credit a user's ledger.
pub async fn grant(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<GrantRequest>,
) -> Result<Json<GrantResponse>, ApiError> {
    if !body.kind.is_grant() {
        return Err(ApiError::BadRequest(format!(
            "kind {:?} is not a grant kind",
            body.kind
        )));
    }

    let order_id = body
        .order_id
        .map(|raw| {
            raw.parse()
                .map_err(|_| ApiError::BadRequest("invalid order id".into()))
        })
        .transpose()?;

    tracing::debug!(
        user_id = %body.user_id,
        amount = body.amount,
        kind = ?body.kind,
        service = %auth.service_name,
        "Grant request received"
    );

    let entry = state
        .consumption
        .grant(
            body.user_id,
            body.amount,
            body.kind,
            body.expires_at,
            order_id,
            body.description,
        )
        .await?;

    Ok(Json(GrantResponse {
        transaction_id: entry.id.to_string(),
    }))
}
