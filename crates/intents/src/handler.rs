//! The `IntentHandler` contract (C9): one implementation per `intent_type`.

use ledgerflow_core::{EventId, IntentId};
use ledgerflow_events::{RuleTrace, StoredEvent};

use crate::intent::Intent;

/// The outcome of running one intent through its handler.
#[derive(Debug, Clone)]
pub enum IntentResult {
    /// Committed: an event was appended.
    Success {
        event_id: EventId,
        event: Option<StoredEvent>,
    },
    /// Recoverable business failure: validation or rule rejection. No state
    /// was mutated.
    Failed { error: String, traces: Vec<RuleTrace> },
    /// A rule routed this intent for approval; no event appended yet. The
    /// pipeline persists the pending intent.
    PendingApproval {
        required_approver_role: String,
        traces: Vec<RuleTrace>,
    },
}

impl IntentResult {
    pub fn is_success(&self) -> bool {
        matches!(self, IntentResult::Success { .. })
    }
}

/// Implemented once per `intent_type` and registered into an
/// `IntentPipeline` at startup. Sync like `EventStore`/`EntityGraph`: bridges
/// to async Postgres work underneath via the same
/// `tokio::runtime::Handle::try_current().block_on(...)` pattern the
/// teacher's infra layer uses.
pub trait IntentHandler: Send + Sync {
    fn intent_type(&self) -> &'static str;

    fn execute(&self, intent: &Intent, intent_id: IntentId) -> IntentResult;
}
