//! Intent Store (C8): the pending-intent lifecycle, including the
//! segregation-of-duties check on approval.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use thiserror::Error;

use ledgerflow_core::{ActorId, EventId, IntentId};

use crate::intent::{Intent, IntentStatus};

#[derive(Debug, Error)]
pub enum IntentStoreError {
    #[error("intent {0} not found")]
    NotFound(IntentId),

    #[error("intent {0} is not pending approval (status: {1:?})")]
    NotPendingApproval(IntentId, IntentStatus),

    #[error("segregation of duties: approver {approver} is the intent's own actor")]
    SelfApproval { approver: ActorId },

    #[error("storage error: {0}")]
    Storage(String),
}

pub trait IntentStore: Send + Sync {
    fn create(&self, intent: Intent) -> Result<(), IntentStoreError>;

    fn get_by_id(&self, id: IntentId) -> Option<Intent>;

    /// Rejects if `approver_id` is the same principal as the intent's own
    /// actor — segregation of duties must hold before any mutation.
    fn approve(
        &self,
        id: IntentId,
        approver_id: ActorId,
        approver_name: &str,
        reason: Option<String>,
    ) -> Result<Intent, IntentStoreError>;

    fn reject(
        &self,
        id: IntentId,
        rejector_id: ActorId,
        rejector_name: &str,
        reason: Option<String>,
    ) -> Result<Intent, IntentStoreError>;

    fn mark_executed(&self, id: IntentId, event_id: EventId) -> Result<(), IntentStoreError>;

    fn mark_failed(&self, id: IntentId, error: &str) -> Result<(), IntentStoreError>;
}

#[derive(Default)]
pub struct InMemoryIntentStore {
    intents: RwLock<HashMap<IntentId, Intent>>,
}

impl InMemoryIntentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn require_pending(intent: &Intent) -> Result<(), IntentStoreError> {
        if intent.status != IntentStatus::PendingApproval {
            return Err(IntentStoreError::NotPendingApproval(intent.id, intent.status));
        }
        Ok(())
    }
}

impl IntentStore for InMemoryIntentStore {
    fn create(&self, intent: Intent) -> Result<(), IntentStoreError> {
        self.intents.write().expect("intent store lock poisoned").insert(intent.id, intent);
        Ok(())
    }

    fn get_by_id(&self, id: IntentId) -> Option<Intent> {
        self.intents.read().expect("intent store lock poisoned").get(&id).cloned()
    }

    fn approve(
        &self,
        id: IntentId,
        approver_id: ActorId,
        approver_name: &str,
        reason: Option<String>,
    ) -> Result<Intent, IntentStoreError> {
        let mut intents = self.intents.write().expect("intent store lock poisoned");
        let intent = intents.get_mut(&id).ok_or(IntentStoreError::NotFound(id))?;
        Self::require_pending(intent)?;

        if intent.actor.id == approver_id {
            return Err(IntentStoreError::SelfApproval { approver: approver_id });
        }

        intent.status = IntentStatus::Approved;
        intent.approved_by = Some(ledgerflow_core::Actor::new(
            ledgerflow_core::ActorType::Human,
            approver_id,
            approver_name.to_string(),
        ));
        intent.approved_at = Some(Utc::now());
        intent.rejection_reason = reason;
        Ok(intent.clone())
    }

    fn reject(
        &self,
        id: IntentId,
        rejector_id: ActorId,
        rejector_name: &str,
        reason: Option<String>,
    ) -> Result<Intent, IntentStoreError> {
        let mut intents = self.intents.write().expect("intent store lock poisoned");
        let intent = intents.get_mut(&id).ok_or(IntentStoreError::NotFound(id))?;
        Self::require_pending(intent)?;

        intent.status = IntentStatus::Rejected;
        intent.rejected_by = Some(ledgerflow_core::Actor::new(
            ledgerflow_core::ActorType::Human,
            rejector_id,
            rejector_name.to_string(),
        ));
        intent.rejected_at = Some(Utc::now());
        intent.rejection_reason = reason;
        Ok(intent.clone())
    }

    fn mark_executed(&self, id: IntentId, event_id: EventId) -> Result<(), IntentStoreError> {
        let mut intents = self.intents.write().expect("intent store lock poisoned");
        let intent = intents.get_mut(&id).ok_or(IntentStoreError::NotFound(id))?;
        intent.status = IntentStatus::Executed;
        intent.result_event_id = Some(event_id);
        Ok(())
    }

    fn mark_failed(&self, id: IntentId, error: &str) -> Result<(), IntentStoreError> {
        let mut intents = self.intents.write().expect("intent store lock poisoned");
        let intent = intents.get_mut(&id).ok_or(IntentStoreError::NotFound(id))?;
        intent.status = IntentStatus::Failed;
        intent.failure_reason = Some(error.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerflow_core::{Actor, ActorType, LegalEntityId, TenantId};
    use serde_json::json;

    fn pending_intent(actor: Actor) -> Intent {
        Intent::new_pending_approval(
            "ap.vendor.create",
            actor,
            TenantId::new(),
            LegalEntityId::new(),
            json!({"name": "Big Co", "credit_limit": 200000}),
            "mdm_manager",
        )
    }

    #[test]
    fn self_approval_is_rejected() {
        let store = InMemoryIntentStore::new();
        let actor = Actor::new(ActorType::Human, ActorId::new(), "alice".to_string());
        let intent = pending_intent(actor.clone());
        let id = intent.id;
        store.create(intent).unwrap();

        let err = store.approve(id, actor.id, "alice", None).unwrap_err();
        assert!(matches!(err, IntentStoreError::SelfApproval { .. }));
    }

    #[test]
    fn distinct_approver_succeeds() {
        let store = InMemoryIntentStore::new();
        let actor = Actor::new(ActorType::Human, ActorId::new(), "alice".to_string());
        let intent = pending_intent(actor);
        let id = intent.id;
        store.create(intent).unwrap();

        let approver_id = ActorId::new();
        let approved = store.approve(id, approver_id, "bob", None).unwrap();
        assert_eq!(approved.status, IntentStatus::Approved);
    }

    #[test]
    fn approving_non_pending_intent_errors() {
        let store = InMemoryIntentStore::new();
        let actor = Actor::new(ActorType::Human, ActorId::new(), "alice".to_string());
        let intent = pending_intent(actor);
        let id = intent.id;
        store.create(intent).unwrap();
        store.approve(id, ActorId::new(), "bob", None).unwrap();

        let err = store.approve(id, ActorId::new(), "carol", None).unwrap_err();
        assert!(matches!(err, IntentStoreError::NotPendingApproval(_, IntentStatus::Approved)));
    }
}
