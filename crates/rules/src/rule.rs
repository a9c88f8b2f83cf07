//! The rule itself, as loaded from a rule file.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use ledgerflow_events::RuleAction;

use crate::condition::Condition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Validate,
    Enrich,
    Decide,
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Validate
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub priority: i32,

    pub intent_type: String,
    #[serde(default)]
    pub phase: Phase,

    pub conditions: Vec<Condition>,
    pub action: RuleAction,

    #[serde(default)]
    pub rejection_message: Option<String>,
    #[serde(default)]
    pub approver_role: Option<String>,
    #[serde(default)]
    pub enrich_fields: Option<serde_json::Value>,

    #[serde(default)]
    pub effective_from: Option<NaiveDate>,
    #[serde(default)]
    pub effective_to: Option<NaiveDate>,
}

impl Rule {
    /// Whether `date` falls within this rule's effective window. A rule
    /// with no bounds is always active.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        if let Some(from) = self.effective_from {
            if date < from {
                return false;
            }
        }
        if let Some(to) = self.effective_to {
            if date > to {
                return false;
            }
        }
        true
    }

    pub fn matches_all_conditions(&self, data: &serde_json::Value) -> bool {
        self.conditions.iter().all(|c| c.evaluate(data))
    }
}
