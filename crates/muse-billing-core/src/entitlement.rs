//! Entitlement decision types.
//!
//! Denial is an expected, frequent, business-meaningful outcome - it is a
//! first-class decision value, not an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::PlanId;

/// The outcome of an entitlement check for a generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision")]
pub enum EntitlementDecision {
    /// The request may proceed.
    Allowed {
        /// Generations remaining in the current window. `None` = unlimited.
        remaining: Option<u32>,

        /// When the window resets, if the plan has one.
        reset_at: Option<DateTime<Utc>>,
    },

    /// The request is denied.
    Denied {
        /// Why the request was denied.
        reason: DenialReason,

        /// When the limit resets, for limit-based denials.
        reset_at: Option<DateTime<Utc>>,

        /// The plan that would lift this denial.
        ///
        /// For limit and style/quality denials this is the next tier up.
        /// For a lapsed subscription it is the user's previous plan: the
        /// suggestion is to re-subscribe, not to upgrade.
        suggested_upgrade: Option<PlanId>,
    },
}

impl EntitlementDecision {
    /// Whether the request may proceed.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Why a generation request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// Free tier daily cap reached.
    DailyLimitReached,

    /// Metered plan monthly cap reached.
    MonthlyLimitReached,

    /// A paid subscription is required (none exists or it lapsed).
    SubscriptionRequired,

    /// The requested style is not available on the current plan.
    StyleNotAllowed,

    /// The requested output quality is not available on the current plan.
    QualityNotAllowed,
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::DailyLimitReached => "daily generation limit reached",
            Self::MonthlyLimitReached => "monthly generation limit reached",
            Self::SubscriptionRequired => "subscription required",
            Self::StyleNotAllowed => "style not allowed on current plan",
            Self::QualityNotAllowed => "quality not allowed on current plan",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_serde_shape() {
        let decision = EntitlementDecision::Denied {
            reason: DenialReason::MonthlyLimitReached,
            reset_at: None,
            suggested_upgrade: Some(PlanId::Ultra),
        };

        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["decision"], "denied");
        assert_eq!(json["reason"], "monthly_limit_reached");
        assert_eq!(json["suggested_upgrade"], "ultra");

        let parsed: EntitlementDecision = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, decision);
    }

    #[test]
    fn allowed_is_allowed() {
        let decision = EntitlementDecision::Allowed {
            remaining: Some(3),
            reset_at: None,
        };
        assert!(decision.is_allowed());
    }
}
