//! The shared output shape for both evaluators.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use ledgerflow_events::RuleTrace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
    RouteForApproval,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEvaluation {
    pub decision: Decision,
    pub traces: Vec<RuleTrace>,
    pub rejection_message: Option<String>,
    pub required_approver_role: Option<String>,
    pub enriched_context: Option<JsonValue>,
}

impl RuleEvaluation {
    pub fn is_rejected(&self) -> bool {
        matches!(self.decision, Decision::Reject)
    }

    pub fn needs_approval(&self) -> bool {
        matches!(self.decision, Decision::RouteForApproval)
    }
}
