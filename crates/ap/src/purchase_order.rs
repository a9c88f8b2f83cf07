//! Purchase order create handler.

use serde_json::json;

use ledgerflow_core::{EntityId, ExpectedVersion, IntentId};
use ledgerflow_entities::EntityRelationship;
use ledgerflow_events::EntityRef;
use ledgerflow_intents::{Intent, IntentHandler, IntentResult};

use crate::runtime::ApRuntime;
use crate::support::{append_and_project, entity_id_field, evaluate, new_event, required_field};

pub struct PurchaseOrderCreateHandler {
    runtime: ApRuntime,
}

impl PurchaseOrderCreateHandler {
    pub fn new(runtime: ApRuntime) -> Self {
        Self { runtime }
    }
}

impl IntentHandler for PurchaseOrderCreateHandler {
    fn intent_type(&self) -> &'static str {
        "ap.purchase_order.create"
    }

    fn execute(&self, intent: &Intent, intent_id: IntentId) -> IntentResult {
        let vendor_id = match entity_id_field(&intent.data, "vendor_id") {
            Ok(id) => id,
            Err(error) => return IntentResult::Failed { error, traces: Vec::new() },
        };
        let po_number = match required_field(&intent.data, "po_number") {
            Ok(n) => n,
            Err(error) => return IntentResult::Failed { error, traces: Vec::new() },
        };

        match self.runtime.entities.get_entity("vendor", vendor_id, Some(intent.legal_entity)) {
            Ok(Some(_)) => {}
            Ok(None) => return IntentResult::Failed { error: "vendor not found".to_string(), traces: Vec::new() },
            Err(e) => return IntentResult::Failed { error: e.to_string(), traces: Vec::new() },
        }

        let evaluation = evaluate(&self.runtime, intent, intent.data.clone());
        if evaluation.is_rejected() {
            return IntentResult::Failed {
                error: evaluation.rejection_message.unwrap_or_else(|| "purchase order create rejected".to_string()),
                traces: evaluation.traces,
            };
        }
        if evaluation.needs_approval() {
            return IntentResult::PendingApproval {
                required_approver_role: evaluation
                    .required_approver_role
                    .unwrap_or_else(|| "ap_manager".to_string()),
                traces: evaluation.traces,
            };
        }

        let po_id = EntityId::new();
        let attributes = json!({
            "po_number": po_number,
            "vendor_id": vendor_id.to_string(),
            "total_amount": intent.data.get("total_amount").cloned().unwrap_or(json!(0)),
            "status": "open",
        });

        let created = match self.runtime.entities.create_entity("purchase_order", po_id, intent.legal_entity, attributes) {
            Ok(record) => record,
            Err(e) => return IntentResult::Failed { error: e.to_string(), traces: evaluation.traces },
        };

        if let Err(e) = self.runtime.entities.create_relationship(EntityRelationship {
            from_type: "purchase_order".to_string(),
            from_id: po_id,
            to_type: "vendor".to_string(),
            to_id: vendor_id,
            relation_type: "ordered_from".to_string(),
            attributes: json!({}),
        }) {
            return IntentResult::Failed { error: e.to_string(), traces: evaluation.traces };
        }

        let scope = intent.scope();
        let event = new_event(
            "ap.purchase_order.created",
            scope,
            intent.actor.clone(),
            intent.data.clone(),
            EntityRef::subject("purchase_order", po_id),
            intent_id,
            intent.idempotency_key.clone(),
        );

        match append_and_project(&self.runtime, event, Some(ExpectedVersion::Exact(created.version))) {
            Ok(stored) => IntentResult::Success { event_id: stored.id, event: Some(stored) },
            Err(e) => IntentResult::Failed { error: e.to_string(), traces: evaluation.traces },
        }
    }
}

#[cfg(test)]
mod tests {
    use ledgerflow_core::{Actor, ActorId, ActorType, LegalEntityId, TenantId};
    use ledgerflow_intents::Intent;

    use crate::runtime::test_runtime;
    use crate::vendor::VendorCreateHandler;

    use super::*;

    fn actor() -> Actor {
        Actor::new(ActorType::Human, ActorId::new(), "ap-clerk")
    }

    fn intent_in(intent_type: &str, tenant: TenantId, legal_entity: LegalEntityId, data: serde_json::Value) -> Intent {
        Intent::new_request(intent_type, actor(), tenant, legal_entity, data)
    }

    #[test]
    fn rejects_when_vendor_does_not_exist() {
        let runtime = test_runtime(Vec::new());
        let handler = PurchaseOrderCreateHandler::new(runtime);
        let tenant = TenantId::new();
        let legal_entity = LegalEntityId::new();

        let intent = intent_in(
            "ap.purchase_order.create",
            tenant,
            legal_entity,
            json!({"vendor_id": EntityId::new().to_string(), "po_number": "PO-1", "total_amount": 10_000}),
        );

        let result = handler.execute(&intent, intent.id);
        assert!(matches!(result, IntentResult::Failed { .. }));
    }

    #[test]
    fn create_with_existing_vendor_links_ordered_from_relationship() {
        let runtime = test_runtime(Vec::new());
        let tenant = TenantId::new();
        let legal_entity = LegalEntityId::new();

        let vendor_handler = VendorCreateHandler::new(runtime.clone());
        let vendor_intent = intent_in("ap.vendor.create", tenant, legal_entity, json!({"name": "Acme"}));
        let IntentResult::Success { event, .. } = vendor_handler.execute(&vendor_intent, vendor_intent.id) else {
            panic!("expected vendor create to succeed");
        };
        let vendor_id = event.expect("event").entities[0].entity_id;

        let po_handler = PurchaseOrderCreateHandler::new(runtime.clone());
        let po_intent = intent_in(
            "ap.purchase_order.create",
            tenant,
            legal_entity,
            json!({"vendor_id": vendor_id.to_string(), "po_number": "PO-1", "total_amount": 10_000}),
        );
        let IntentResult::Success { event, .. } = po_handler.execute(&po_intent, po_intent.id) else {
            panic!("expected purchase order create to succeed");
        };
        let po_id = event.expect("event").entities[0].entity_id;

        let related = runtime.entities.get_related_entities("purchase_order", po_id, "ordered_from").unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].entity_id, vendor_id);
    }
}
