//! Rule evaluation trace, embedded on events as `rules_evaluated`.
//!
//! Defined here (rather than in the rules engine crate) because an
//! `Event`'s `rules_evaluated` field is part of the persisted event shape —
//! every consumer of an event needs these types without needing the rules
//! engine itself.

use serde::{Deserialize, Serialize};

/// The action a rule takes when its conditions match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Approve,
    Reject,
    RouteForApproval,
    Enrich,
}

/// The outcome of evaluating one rule against one context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TraceResult {
    /// All conditions matched; the rule's action was taken.
    Fired,
    /// Conditions were evaluated but did not all match.
    NotFired,
    /// The rule's action does not apply in the current phase (e.g. a
    /// non-`enrich` action during the enrich phase).
    NotApplicable { reason: String },
    /// The rule's effective-date window excludes the context date; its
    /// conditions were never evaluated.
    SkippedInactive,
}

/// One rule's contribution to an intent's evaluation, kept for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTrace {
    pub rule_id: String,
    #[serde(flatten)]
    pub outcome: TraceResult,
    pub actions_taken: Vec<RuleAction>,
    pub duration_micros: u64,
}

impl RuleTrace {
    pub fn fired(rule_id: impl Into<String>, action: RuleAction, duration_micros: u64) -> Self {
        Self {
            rule_id: rule_id.into(),
            outcome: TraceResult::Fired,
            actions_taken: vec![action],
            duration_micros,
        }
    }

    pub fn not_fired(rule_id: impl Into<String>, duration_micros: u64) -> Self {
        Self {
            rule_id: rule_id.into(),
            outcome: TraceResult::NotFired,
            actions_taken: Vec::new(),
            duration_micros,
        }
    }

    pub fn not_applicable(rule_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            outcome: TraceResult::NotApplicable {
                reason: reason.into(),
            },
            actions_taken: Vec::new(),
            duration_micros: 0,
        }
    }

    pub fn skipped_inactive(rule_id: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            outcome: TraceResult::SkippedInactive,
            actions_taken: Vec::new(),
            duration_micros: 0,
        }
    }

    pub fn is_fired(&self) -> bool {
        matches!(self.outcome, TraceResult::Fired)
    }
}
