//! Plan definitions for muse-billing.
//!
//! Plans are static configuration, not persisted per-user. Each `PlanId`
//! maps to one `PlanDefinition` describing its limits and entitlements.
//! Definitions are immutable and safe for unsynchronized concurrent reads.

use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Free tier daily generation limit.
pub const FREE_DAILY_GENERATION_LIMIT: u32 = 1;

/// Trial pack generation allowance (one-time).
pub const TRIAL_MONTHLY_GENERATION_LIMIT: u32 = 10;

/// Pro plan monthly generation limit.
pub const PRO_MONTHLY_GENERATION_LIMIT: u32 = 50;

/// Trial pack price in cents ($4.90, one-time).
pub const TRIAL_PRICE_CENTS: i64 = 490;

/// Pro plan monthly price in cents ($19.90).
pub const PRO_MONTHLY_PRICE_CENTS: i64 = 1990;

/// Pro plan yearly price in cents ($199).
pub const PRO_YEARLY_PRICE_CENTS: i64 = 19900;

/// Ultra plan monthly price in cents ($49.90).
pub const ULTRA_MONTHLY_PRICE_CENTS: i64 = 4990;

/// Ultra plan yearly price in cents ($499).
pub const ULTRA_YEARLY_PRICE_CENTS: i64 = 49900;

/// Available subscription tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanId {
    /// Free tier: one generation per day, basic styles only.
    Free,

    /// Trial pack: one-time purchase, 10 generations.
    Trial,

    /// Pro plan: 50 generations per month, up to UHD quality.
    Pro,

    /// Ultra plan: unlimited generations, all styles and qualities.
    Ultra,
}

impl PlanId {
    /// Get the static definition for this plan.
    #[must_use]
    pub const fn definition(self) -> &'static PlanDefinition {
        match self {
            Self::Free => &FREE_PLAN,
            Self::Trial => &TRIAL_PLAN,
            Self::Pro => &PRO_PLAN,
            Self::Ultra => &ULTRA_PLAN,
        }
    }

    /// The next tier to suggest when this plan's limit is reached.
    ///
    /// Free users are pointed at the trial pack; Ultra has nowhere to go.
    #[must_use]
    pub const fn upgrade_target(self) -> Option<PlanId> {
        match self {
            Self::Free => Some(Self::Trial),
            Self::Trial => Some(Self::Pro),
            Self::Pro => Some(Self::Ultra),
            Self::Ultra => None,
        }
    }

    /// The tier that unlocks a requested quality.
    #[must_use]
    pub fn quality_upgrade(quality: &str) -> PlanId {
        match quality {
            "8k" => Self::Ultra,
            "uhd" => Self::Pro,
            _ => Self::Trial,
        }
    }

    /// Plan name as a lowercase string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Trial => "trial",
            Self::Pro => "pro",
            Self::Ultra => "ultra",
        }
    }
}

/// A set of allowed style or quality names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleSet {
    /// The `"*"` wildcard: any value is allowed.
    Any,

    /// Only the listed values are allowed.
    Only(&'static [&'static str]),
}

impl StyleSet {
    /// Whether `value` is a member of this set.
    #[must_use]
    pub fn allows(&self, value: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Only(values) => values.contains(&value),
        }
    }
}

/// Static limits and entitlements for one plan.
#[derive(Debug, Clone, Copy)]
pub struct PlanDefinition {
    /// Which plan this defines.
    pub plan: PlanId,

    /// Monthly price in cents (one-time price for one-time plans).
    pub monthly_price_cents: i64,

    /// Yearly price in cents, if the plan offers a yearly interval.
    pub yearly_price_cents: Option<i64>,

    /// Daily generation limit. Only the free tier uses a daily cap.
    pub daily_generation_limit: Option<u32>,

    /// Monthly generation limit. `None` = unlimited.
    ///
    /// Mutually exclusive with `daily_generation_limit`.
    pub monthly_generation_limit: Option<u32>,

    /// Styles this plan may generate with.
    pub allowed_styles: StyleSet,

    /// Output qualities this plan may request.
    pub allowed_quality: StyleSet,

    /// Maximum images per batch request.
    pub max_batch_size: u32,

    /// One-time purchase rather than a recurring subscription.
    pub is_one_time: bool,
}

/// Free tier definition.
pub static FREE_PLAN: PlanDefinition = PlanDefinition {
    plan: PlanId::Free,
    monthly_price_cents: 0,
    yearly_price_cents: None,
    daily_generation_limit: Some(FREE_DAILY_GENERATION_LIMIT),
    monthly_generation_limit: None,
    allowed_styles: StyleSet::Only(&["realistic", "anime", "sketch"]),
    allowed_quality: StyleSet::Only(&["standard"]),
    max_batch_size: 1,
    is_one_time: false,
};

/// Trial pack definition.
pub static TRIAL_PLAN: PlanDefinition = PlanDefinition {
    plan: PlanId::Trial,
    monthly_price_cents: TRIAL_PRICE_CENTS,
    yearly_price_cents: None,
    daily_generation_limit: None,
    monthly_generation_limit: Some(TRIAL_MONTHLY_GENERATION_LIMIT),
    allowed_styles: StyleSet::Any,
    allowed_quality: StyleSet::Only(&["standard", "hd"]),
    max_batch_size: 2,
    is_one_time: true,
};

/// Pro plan definition.
pub static PRO_PLAN: PlanDefinition = PlanDefinition {
    plan: PlanId::Pro,
    monthly_price_cents: PRO_MONTHLY_PRICE_CENTS,
    yearly_price_cents: Some(PRO_YEARLY_PRICE_CENTS),
    daily_generation_limit: None,
    monthly_generation_limit: Some(PRO_MONTHLY_GENERATION_LIMIT),
    allowed_styles: StyleSet::Any,
    allowed_quality: StyleSet::Only(&["standard", "hd", "uhd"]),
    max_batch_size: 4,
    is_one_time: false,
};

/// Ultra plan definition.
pub static ULTRA_PLAN: PlanDefinition = PlanDefinition {
    plan: PlanId::Ultra,
    monthly_price_cents: ULTRA_MONTHLY_PRICE_CENTS,
    yearly_price_cents: Some(ULTRA_YEARLY_PRICE_CENTS),
    daily_generation_limit: None,
    monthly_generation_limit: None,
    allowed_styles: StyleSet::Any,
    allowed_quality: StyleSet::Any,
    max_batch_size: 8,
    is_one_time: false,
};
