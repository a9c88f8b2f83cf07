//! Item create handler.

use serde_json::json;

use ledgerflow_core::{EntityId, ExpectedVersion, IntentId};
use ledgerflow_events::EntityRef;
use ledgerflow_intents::{Intent, IntentHandler, IntentResult};

use crate::runtime::ApRuntime;
use crate::support::{append_and_project, evaluate, field, new_event, required_field};

pub struct ItemCreateHandler {
    runtime: ApRuntime,
}

impl ItemCreateHandler {
    pub fn new(runtime: ApRuntime) -> Self {
        Self { runtime }
    }
}

impl IntentHandler for ItemCreateHandler {
    fn intent_type(&self) -> &'static str {
        "ap.item.create"
    }

    fn execute(&self, intent: &Intent, intent_id: IntentId) -> IntentResult {
        let name = match required_field(&intent.data, "name") {
            Ok(name) => name,
            Err(error) => return IntentResult::Failed { error, traces: Vec::new() },
        };
        let sku = field(&intent.data, "sku");

        let duplicate_exists = sku
            .map(|sku| {
                self.runtime
                    .entities
                    .get_entity_by_type_and_attribute("item", "sku", &json!(sku), Some(intent.legal_entity))
                    .unwrap_or(None)
                    .is_some()
            })
            .unwrap_or(false);

        let mut context_data = intent.data.clone();
        if let serde_json::Value::Object(obj) = &mut context_data {
            obj.insert("_duplicate_exists".to_string(), json!(duplicate_exists));
        }

        let evaluation = evaluate(&self.runtime, intent, context_data);
        if evaluation.is_rejected() {
            return IntentResult::Failed {
                error: evaluation.rejection_message.unwrap_or_else(|| "item create rejected".to_string()),
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
            "sku": sku,
            "unit_price": intent.data.get("unit_price").cloned().unwrap_or(json!(0)),
            "expense_account": intent.data.get("expense_account").cloned(),
        });

        let created = match self.runtime.entities.create_entity("item", entity_id, intent.legal_entity, attributes) {
            Ok(record) => record,
            Err(e) => return IntentResult::Failed { error: e.to_string(), traces: evaluation.traces },
        };

        let scope = intent.scope();
        let event = new_event(
            "ap.item.created",
            scope,
            intent.actor.clone(),
            intent.data.clone(),
            EntityRef::subject("item", entity_id),
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
    use ledgerflow_events::RuleAction;
    use ledgerflow_intents::Intent;
    use ledgerflow_rules::{Condition, Operator, Phase, Rule};

    use crate::runtime::test_runtime;

    use super::*;

    fn actor() -> Actor {
        Actor::new(ActorType::Human, ActorId::new(), "ap-clerk")
    }

    fn intent(data: serde_json::Value) -> Intent {
        Intent::new_request("ap.item.create", actor(), TenantId::new(), LegalEntityId::new(), data)
    }

    fn sku_unique_rule() -> Rule {
        Rule {
            id: "item-sku-unique".into(),
            name: "sku unique".into(),
            description: None,
            priority: 20,
            intent_type: "ap.item.create".into(),
            phase: Phase::Validate,
            conditions: vec![Condition {
                field: "_duplicate_exists".into(),
                operator: Operator::Eq,
                value: Some(json!(true)),
            }],
            action: RuleAction::Reject,
            rejection_message: Some("an item with this SKU already exists".into()),
            approver_role: None,
            enrich_fields: None,
            effective_from: None,
            effective_to: None,
        }
    }

    #[test]
    fn sku_less_item_always_allowed() {
        let runtime = test_runtime(vec![sku_unique_rule()]);
        let handler = ItemCreateHandler::new(runtime);

        let first = intent(json!({"name": "Widget"}));
        assert!(matches!(handler.execute(&first, first.id), IntentResult::Success { .. }));
        let second = intent(json!({"name": "Widget"}));
        assert!(matches!(handler.execute(&second, second.id), IntentResult::Success { .. }));
    }

    #[test]
    fn duplicate_sku_is_rejected() {
        let runtime = test_runtime(vec![sku_unique_rule()]);
        let handler = ItemCreateHandler::new(runtime);

        let first = intent(json!({"name": "Widget", "sku": "WID-1"}));
        assert!(matches!(handler.execute(&first, first.id), IntentResult::Success { .. }));

        let second = intent(json!({"name": "Other Widget", "sku": "WID-1"}));
        assert!(matches!(handler.execute(&second, second.id), IntentResult::Failed { .. }));
    }
}
