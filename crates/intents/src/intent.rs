//! The intent itself: the request to mutate state, and its persisted
//! pending-approval shape.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use ledgerflow_core::{Actor, EventId, IntentId, LegalEntityId, Scope, TenantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    /// Submitted, not yet evaluated. Never persisted by the Intent Store —
    /// only intents a rule routes for approval are stored, at which point
    /// they move straight to `PendingApproval`.
    Received,
    PendingApproval,
    Approved,
    Rejected,
    Executed,
    Failed,
}

/// A request to mutate state, authored by a human, system, or agent. Also
/// the persisted shape once a rule routes it for approval (§3 "Intent
/// (pending)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub id: IntentId,
    #[serde(rename = "type")]
    pub intent_type: String,
    pub status: IntentStatus,
    pub actor: Actor,
    pub tenant: TenantId,
    pub legal_entity: LegalEntityId,
    pub data: JsonValue,

    pub required_approver_role: Option<String>,
    pub approved_by: Option<Actor>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<Actor>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,

    pub result_event_id: Option<EventId>,
    pub failure_reason: Option<String>,

    pub correlation_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub effective_date: Option<NaiveDate>,
    pub occurred_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl Intent {
    /// A freshly-submitted request, not yet evaluated.
    pub fn new_request(
        intent_type: impl Into<String>,
        actor: Actor,
        tenant: TenantId,
        legal_entity: LegalEntityId,
        data: JsonValue,
    ) -> Self {
        Self {
            id: IntentId::new(),
            intent_type: intent_type.into(),
            status: IntentStatus::Received,
            actor,
            tenant,
            legal_entity,
            data,
            required_approver_role: None,
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejected_at: None,
            rejection_reason: None,
            result_event_id: None,
            failure_reason: None,
            correlation_id: None,
            idempotency_key: None,
            effective_date: None,
            occurred_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn new_pending_approval(
        intent_type: impl Into<String>,
        actor: Actor,
        tenant: TenantId,
        legal_entity: LegalEntityId,
        data: JsonValue,
        required_approver_role: impl Into<String>,
    ) -> Self {
        Self {
            status: IntentStatus::PendingApproval,
            required_approver_role: Some(required_approver_role.into()),
            ..Self::new_request(intent_type, actor, tenant, legal_entity, data)
        }
    }

    pub fn scope(&self) -> Scope {
        Scope::new(self.tenant, self.legal_entity)
    }
}
