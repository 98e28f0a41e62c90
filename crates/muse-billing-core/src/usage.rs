//! Usage audit records.
//!
//! Every metered generation appends one `UsageRecord`. These rows are an
//! append-only audit sink; the engines read them back only to count a free
//! user's generations for the daily window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{GenerationId, PlanId, TransactionId, UserId};

/// One generation's usage, as recorded by the usage recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Unique record ID (ULID, time-ordered).
    pub id: TransactionId,

    /// The user who generated.
    pub user_id: UserId,

    /// The generation this records.
    pub generation_id: GenerationId,

    /// Plan at the time of generation, if the user had a subscription.
    pub plan: Option<PlanId>,

    /// Requested style, if any.
    pub style: Option<String>,

    /// The prompt, truncated by the caller if oversized.
    pub prompt: Option<String>,

    /// Credits debited for this generation.
    pub credits_consumed: i64,

    /// When the generation happened.
    pub created_at: DateTime<Utc>,
}

impl UsageRecord {
    /// Create a usage record timestamped now.
    #[must_use]
    pub fn new(
        user_id: UserId,
        generation_id: GenerationId,
        plan: Option<PlanId>,
        style: Option<String>,
        prompt: Option<String>,
        credits_consumed: i64,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            generation_id,
            plan,
            style,
            prompt,
            credits_consumed,
            created_at: Utc::now(),
        }
    }
}
