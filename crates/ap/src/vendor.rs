//! Vendor create/update/add-contact handlers.

use serde_json::json;

use ledgerflow_core::{EntityId, ExpectedVersion, IntentId};
use ledgerflow_entities::EntityRelationship;
use ledgerflow_events::EntityRef;
use ledgerflow_intents::{Intent, IntentHandler, IntentResult};
use ledgerflow_rules::Decision;

use crate::runtime::ApRuntime;
use crate::support::{append_and_project, entity_id_field, evaluate, field, new_event, required_field};

pub struct VendorCreateHandler {
    runtime: ApRuntime,
}

impl VendorCreateHandler {
    pub fn new(runtime: ApRuntime) -> Self {
        Self { runtime }
    }
}

impl IntentHandler for VendorCreateHandler {
    fn intent_type(&self) -> &'static str {
        "ap.vendor.create"
    }

    fn execute(&self, intent: &Intent, intent_id: IntentId) -> IntentResult {
        let name = match required_field(&intent.data, "name") {
            Ok(name) => name,
            Err(error) => return IntentResult::Failed { error, traces: Vec::new() },
        };

        let duplicate_exists = self
            .runtime
            .entities
            .get_entity_by_type_and_attribute("vendor", "name", &json!(name), Some(intent.legal_entity))
            .unwrap_or(None)
            .is_some();

        let mut context_data = intent.data.clone();
        if let serde_json::Value::Object(obj) = &mut context_data {
            obj.insert("_duplicate_exists".to_string(), json!(duplicate_exists));
        }

        let evaluation = evaluate(&self.runtime, intent, context_data);

        if evaluation.is_rejected() {
            return IntentResult::Failed {
                error: evaluation.rejection_message.unwrap_or_else(|| "vendor create rejected".to_string()),
                traces: evaluation.traces,
            };
        }
        if evaluation.needs_approval() {
            return IntentResult::PendingApproval {
                required_approver_role: evaluation
                    .required_approver_role
                    .unwrap_or_else(|| "mdm_manager".to_string()),
                traces: evaluation.traces,
            };
        }

        let entity_id = EntityId::new();
        let attributes = json!({
            "name": name,
            "credit_limit": intent.data.get("credit_limit").cloned().unwrap_or(json!(0)),
            "tax_id": intent.data.get("tax_id").cloned(),
        });

        let created = match self.runtime.entities.create_entity("vendor", entity_id, intent.legal_entity, attributes) {
            Ok(record) => record,
            Err(e) => return IntentResult::Failed { error: e.to_string(), traces: evaluation.traces },
        };

        let scope = intent.scope();
        let event = new_event(
            "ap.vendor.created",
            scope,
            intent.actor.clone(),
            intent.data.clone(),
            EntityRef::subject("vendor", entity_id),
            intent_id,
            intent.idempotency_key.clone(),
        );

        match append_and_project(&self.runtime, event, Some(ExpectedVersion::Exact(created.version))) {
            Ok(stored) => IntentResult::Success { event_id: stored.id, event: Some(stored) },
            Err(e) => IntentResult::Failed { error: e.to_string(), traces: evaluation.traces },
        }
    }
}

pub struct VendorUpdateHandler {
    runtime: ApRuntime,
}

impl VendorUpdateHandler {
    pub fn new(runtime: ApRuntime) -> Self {
        Self { runtime }
    }
}

impl IntentHandler for VendorUpdateHandler {
    fn intent_type(&self) -> &'static str {
        "ap.vendor.update"
    }

    fn execute(&self, intent: &Intent, intent_id: IntentId) -> IntentResult {
        let vendor_id = match entity_id_field(&intent.data, "vendor_id") {
            Ok(id) => id,
            Err(error) => return IntentResult::Failed { error, traces: Vec::new() },
        };

        let expected_version = intent
            .data
            .get("expected_entity_version")
            .and_then(serde_json::Value::as_u64);
        let Some(expected_version) = expected_version else {
            return IntentResult::Failed {
                error: "expected_entity_version is required".to_string(),
                traces: Vec::new(),
            };
        };

        let existing = match self.runtime.entities.get_entity("vendor", vendor_id, Some(intent.legal_entity)) {
            Ok(Some(record)) => record,
            Ok(None) => return IntentResult::Failed { error: "vendor not found".to_string(), traces: Vec::new() },
            Err(e) => return IntentResult::Failed { error: e.to_string(), traces: Vec::new() },
        };

        let mut attributes = existing.attributes.clone();
        if let serde_json::Value::Object(obj) = &mut attributes {
            if let serde_json::Value::Object(updates) = &intent.data {
                for (k, v) in updates {
                    if k == "vendor_id" || k == "expected_entity_version" {
                        continue;
                    }
                    obj.insert(k.clone(), v.clone());
                }
            }
        }

        let evaluation = evaluate(&self.runtime, intent, attributes.clone());
        if evaluation.is_rejected() {
            return IntentResult::Failed {
                error: evaluation.rejection_message.unwrap_or_else(|| "vendor update rejected".to_string()),
                traces: evaluation.traces,
            };
        }

        let updated = match self.runtime.entities.update_entity(
            "vendor",
            vendor_id,
            attributes,
            ExpectedVersion::Exact(expected_version),
        ) {
            Ok(record) => record,
            Err(e) => return IntentResult::Failed { error: e.to_string(), traces: evaluation.traces },
        };

        let scope = intent.scope();
        let event = new_event(
            "ap.vendor.updated",
            scope,
            intent.actor.clone(),
            updated.attributes.clone(),
            EntityRef::subject("vendor", vendor_id),
            intent_id,
            intent.idempotency_key.clone(),
        );

        match append_and_project(&self.runtime, event, Some(ExpectedVersion::Exact(updated.version))) {
            Ok(stored) => IntentResult::Success { event_id: stored.id, event: Some(stored) },
            Err(e) => IntentResult::Failed { error: e.to_string(), traces: evaluation.traces },
        }
    }
}

pub struct VendorAddContactHandler {
    runtime: ApRuntime,
}

impl VendorAddContactHandler {
    pub fn new(runtime: ApRuntime) -> Self {
        Self { runtime }
    }
}

impl IntentHandler for VendorAddContactHandler {
    fn intent_type(&self) -> &'static str {
        "ap.vendor.add_contact"
    }

    fn execute(&self, intent: &Intent, intent_id: IntentId) -> IntentResult {
        let vendor_id = match entity_id_field(&intent.data, "vendor_id") {
            Ok(id) => id,
            Err(error) => return IntentResult::Failed { error, traces: Vec::new() },
        };
        let contact_name = match required_field(&intent.data, "contact_name") {
            Ok(name) => name,
            Err(error) => return IntentResult::Failed { error, traces: Vec::new() },
        };

        match self.runtime.entities.get_entity("vendor", vendor_id, Some(intent.legal_entity)) {
            Ok(Some(_)) => {}
            Ok(None) => return IntentResult::Failed { error: "vendor not found".to_string(), traces: Vec::new() },
            Err(e) => return IntentResult::Failed { error: e.to_string(), traces: Vec::new() },
        }

        let contact_id = EntityId::new();
        let attributes = json!({
            "contact_name": contact_name,
            "email": field(&intent.data, "email"),
            "phone": field(&intent.data, "phone"),
        });

        if let Err(e) = self.runtime.entities.create_entity("contact", contact_id, intent.legal_entity, attributes) {
            return IntentResult::Failed { error: e.to_string(), traces: Vec::new() };
        }

        if let Err(e) = self.runtime.entities.create_relationship(EntityRelationship {
            from_type: "vendor".to_string(),
            from_id: vendor_id,
            to_type: "contact".to_string(),
            to_id: contact_id,
            relation_type: "has_contact".to_string(),
            attributes: json!({}),
        }) {
            return IntentResult::Failed { error: e.to_string(), traces: Vec::new() };
        }

        let scope = intent.scope();
        let event = new_event(
            "ap.vendor.contact_added",
            scope,
            intent.actor.clone(),
            intent.data.clone(),
            EntityRef::subject("vendor", vendor_id),
            intent_id,
            intent.idempotency_key.clone(),
        );

        match append_and_project(&self.runtime, event, None) {
            Ok(stored) => IntentResult::Success { event_id: stored.id, event: Some(stored) },
            Err(e) => IntentResult::Failed { error: e.to_string(), traces: Vec::new() },
        }
    }
}

#[cfg(test)]
mod tests {
    use ledgerflow_core::{Actor, ActorType, ActorId, LegalEntityId, TenantId};
    use ledgerflow_intents::Intent;
    use ledgerflow_rules::{Phase, Rule};
    use serde_json::json;

    use crate::runtime::test_runtime;

    use super::*;

    fn no_op_rules() -> Vec<Rule> {
        Vec::new()
    }

    fn actor() -> Actor {
        Actor::new(ActorType::Human, ActorId::new(), "ap-clerk")
    }

    fn intent(intent_type: &str, data: serde_json::Value) -> Intent {
        Intent::new_request(intent_type, actor(), TenantId::new(), LegalEntityId::new(), data)
    }

    fn intent_in(intent_type: &str, tenant: TenantId, legal_entity: LegalEntityId, data: serde_json::Value) -> Intent {
        Intent::new_request(intent_type, actor(), tenant, legal_entity, data)
    }

    #[test]
    fn create_rejects_empty_name() {
        let runtime = test_runtime(vec![Rule {
            id: "vendor-name-required".into(),
            name: "name required".into(),
            description: None,
            priority: 10,
            intent_type: "ap.vendor.create".into(),
            phase: Phase::Validate,
            conditions: vec![ledgerflow_rules::Condition {
                field: "name".into(),
                operator: ledgerflow_rules::Operator::NotEmpty,
                value: None,
            }],
            action: ledgerflow_events::RuleAction::Reject,
            rejection_message: Some("vendor name must not be empty".into()),
            approver_role: None,
            enrich_fields: None,
            effective_from: None,
            effective_to: None,
        }]);
        let handler = VendorCreateHandler::new(runtime);
        let intent = intent("ap.vendor.create", json!({"name": ""}));

        let result = handler.execute(&intent, intent.id);
        assert!(matches!(result, IntentResult::Failed { .. }));
    }

    #[test]
    fn create_then_duplicate_name_is_rejected_by_rule() {
        let runtime = test_runtime(vec![Rule {
            id: "vendor-name-unique".into(),
            name: "name unique".into(),
            description: None,
            priority: 20,
            intent_type: "ap.vendor.create".into(),
            phase: Phase::Validate,
            conditions: vec![ledgerflow_rules::Condition {
                field: "_duplicate_exists".into(),
                operator: ledgerflow_rules::Operator::Eq,
                value: Some(json!(true)),
            }],
            action: ledgerflow_events::RuleAction::Reject,
            rejection_message: Some("a vendor with this name already exists".into()),
            approver_role: None,
            enrich_fields: None,
            effective_from: None,
            effective_to: None,
        }]);
        let handler = VendorCreateHandler::new(runtime);

        let first = intent("ap.vendor.create", json!({"name": "Acme"}));
        let first_result = handler.execute(&first, first.id);
        assert!(matches!(first_result, IntentResult::Success { .. }));

        let second = intent("ap.vendor.create", json!({"name": "Acme"}));
        let second_result = handler.execute(&second, second.id);
        assert!(matches!(second_result, IntentResult::Failed { .. }));
    }

    #[test]
    fn create_succeeds_with_no_rules() {
        let runtime = test_runtime(no_op_rules());
        let handler = VendorCreateHandler::new(runtime);
        let intent = intent("ap.vendor.create", json!({"name": "Acme", "credit_limit": 5000}));

        let result = handler.execute(&intent, intent.id);
        assert!(matches!(result, IntentResult::Success { .. }));
    }

    #[test]
    fn update_with_stale_version_conflicts() {
        let runtime = test_runtime(no_op_rules());
        let create_handler = VendorCreateHandler::new(runtime.clone());
        let create_intent = intent("ap.vendor.create", json!({"name": "Acme"}));
        let IntentResult::Success { event, .. } = create_handler.execute(&create_intent, create_intent.id) else {
            panic!("expected create to succeed");
        };
        let vendor_id = event.expect("event").entities[0].entity_id;

        let update_handler = VendorUpdateHandler::new(runtime);
        let data = json!({"vendor_id": vendor_id.to_string(), "expected_entity_version": 999, "name": "Acme Inc"});
        let update_intent = intent_in("ap.vendor.update", create_intent.tenant, create_intent.legal_entity, data);

        let result = update_handler.execute(&update_intent, update_intent.id);
        assert!(matches!(result, IntentResult::Failed { .. }));
    }
}
