//! Invoice submit/approve/reject/post/pay handlers.

use chrono::Utc;
use serde_json::json;

use ledgerflow_core::{EntityId, ExpectedVersion, IntentId};
use ledgerflow_events::EntityRef;
use ledgerflow_intents::{Intent, IntentHandler, IntentResult};

use crate::money::Cents;
use crate::runtime::ApRuntime;
use crate::support::{append_and_project, entity_id_field, evaluate, field, follow_on_event, new_event, required_field};

/// Three-way match tolerance: amounts within 1% of the PO total match
/// cleanly; anything wider is a match exception.
const MATCH_TOLERANCE: f64 = 0.01;

pub struct InvoiceSubmitHandler {
    runtime: ApRuntime,
}

impl InvoiceSubmitHandler {
    pub fn new(runtime: ApRuntime) -> Self {
        Self { runtime }
    }
}

impl IntentHandler for InvoiceSubmitHandler {
    fn intent_type(&self) -> &'static str {
        "ap.invoice.submit"
    }

    fn execute(&self, intent: &Intent, intent_id: IntentId) -> IntentResult {
        let vendor_id = match entity_id_field(&intent.data, "vendor_id") {
            Ok(id) => id,
            Err(error) => return IntentResult::Failed { error, traces: Vec::new() },
        };
        let invoice_number = match required_field(&intent.data, "invoice_number") {
            Ok(n) => n,
            Err(error) => return IntentResult::Failed { error, traces: Vec::new() },
        };
        let invoice_amount = match Cents::from_json(&intent.data, "amount") {
            Ok(c) => c,
            Err(error) => return IntentResult::Failed { error, traces: Vec::new() },
        };

        match self.runtime.entities.get_entity("vendor", vendor_id, Some(intent.legal_entity)) {
            Ok(Some(_)) => {}
            Ok(None) => return IntentResult::Failed { error: "vendor not found".to_string(), traces: Vec::new() },
            Err(e) => return IntentResult::Failed { error: e.to_string(), traces: Vec::new() },
        }

        let duplicate_exists = self
            .runtime
            .entities
            .get_entity_by_type_and_attribute("invoice", "invoice_number", &json!(invoice_number), Some(intent.legal_entity))
            .unwrap_or(None)
            .filter(|existing| field(&existing.attributes, "vendor_id") == Some(vendor_id.to_string().as_str()))
            .is_some();

        let po_id = match entity_id_field(&intent.data, "purchase_order_id") {
            Ok(id) => Some(id),
            Err(_) => None,
        };
        let (status, variance) = match po_id {
            Some(po_id) => {
                let po = match self.runtime.entities.get_entity("purchase_order", po_id, Some(intent.legal_entity)) {
                    Ok(Some(record)) => record,
                    Ok(None) => return IntentResult::Failed { error: "purchase order not found".to_string(), traces: Vec::new() },
                    Err(e) => return IntentResult::Failed { error: e.to_string(), traces: Vec::new() },
                };
                let po_amount = match Cents::from_json(&po.attributes, "total_amount") {
                    Ok(c) => c,
                    Err(error) => return IntentResult::Failed { error, traces: Vec::new() },
                };
                let variance = invoice_amount.variance_fraction(po_amount);
                let status = if variance <= MATCH_TOLERANCE { "matched" } else { "match_exception" };
                (status, Some(variance))
            }
            None => ("submitted", None),
        };

        let mut context_data = intent.data.clone();
        if let serde_json::Value::Object(obj) = &mut context_data {
            obj.insert("_match_result".to_string(), json!(status));
            obj.insert("_duplicate_exists".to_string(), json!(duplicate_exists));
        }

        let evaluation = evaluate(&self.runtime, intent, context_data);
        if evaluation.is_rejected() {
            return IntentResult::Failed {
                error: evaluation.rejection_message.unwrap_or_else(|| "invoice submit rejected".to_string()),
                traces: evaluation.traces,
            };
        }

        let invoice_id = EntityId::new();
        let attributes = json!({
            "invoice_number": invoice_number,
            "vendor_id": vendor_id.to_string(),
            "purchase_order_id": po_id.map(|id| id.to_string()),
            "amount": invoice_amount.0,
            "status": status,
            "submitted_by": intent.actor.id.to_string(),
        });

        let created = match self.runtime.entities.create_entity("invoice", invoice_id, intent.legal_entity, attributes) {
            Ok(record) => record,
            Err(e) => return IntentResult::Failed { error: e.to_string(), traces: evaluation.traces },
        };

        let scope = intent.scope();
        let subject = EntityRef::subject("invoice", invoice_id);
        let event = new_event(
            "ap.invoice.submitted",
            scope,
            intent.actor.clone(),
            intent.data.clone(),
            subject.clone(),
            intent_id,
            intent.idempotency_key.clone(),
        );

        let submitted = match append_and_project(&self.runtime, event, Some(ExpectedVersion::Exact(created.version))) {
            Ok(stored) => stored,
            Err(e) => return IntentResult::Failed { error: e.to_string(), traces: evaluation.traces },
        };

        let Some(variance) = variance else {
            return IntentResult::Success { event_id: submitted.id, event: Some(submitted) };
        };

        let follow_on_type = if status == "matched" { "ap.invoice.matched" } else { "ap.invoice.match_exception" };
        let follow_on_data = if status == "matched" {
            json!({"invoice_id": invoice_id.to_string(), "variance": variance, "match_type": "3-way"})
        } else {
            json!({"invoice_id": invoice_id.to_string(), "variance": variance, "exception_type": "price_variance"})
        };
        let follow_on = follow_on_event(
            follow_on_type,
            scope,
            follow_on_data,
            subject,
            intent_id,
            submitted.id,
            Utc::now(),
        );

        match append_and_project(&self.runtime, follow_on, None) {
            Ok(stored) => IntentResult::Success { event_id: stored.id, event: Some(stored) },
            Err(e) => IntentResult::Failed { error: e.to_string(), traces: evaluation.traces },
        }
    }
}

pub struct InvoiceApproveHandler {
    runtime: ApRuntime,
}

impl InvoiceApproveHandler {
    pub fn new(runtime: ApRuntime) -> Self {
        Self { runtime }
    }
}

impl IntentHandler for InvoiceApproveHandler {
    fn intent_type(&self) -> &'static str {
        "ap.invoice.approve"
    }

    fn execute(&self, intent: &Intent, intent_id: IntentId) -> IntentResult {
        let invoice_id = match entity_id_field(&intent.data, "invoice_id") {
            Ok(id) => id,
            Err(error) => return IntentResult::Failed { error, traces: Vec::new() },
        };

        let invoice = match self.runtime.entities.get_entity("invoice", invoice_id, Some(intent.legal_entity)) {
            Ok(Some(record)) => record,
            Ok(None) => return IntentResult::Failed { error: "invoice not found".to_string(), traces: Vec::new() },
            Err(e) => return IntentResult::Failed { error: e.to_string(), traces: Vec::new() },
        };

        let status = field(&invoice.attributes, "status").unwrap_or("");
        if status != "matched" && status != "submitted" {
            return IntentResult::Failed {
                error: format!("invoice in status {status} cannot be approved"),
                traces: Vec::new(),
            };
        }

        let submitter_is_approver = field(&invoice.attributes, "submitted_by")
            .map(|submitted_by| submitted_by == intent.actor.id.to_string())
            .unwrap_or(false);

        let mut context_data = invoice.attributes.clone();
        if let serde_json::Value::Object(obj) = &mut context_data {
            obj.insert("_submitter_is_approver".to_string(), json!(submitter_is_approver));
        }

        let evaluation = evaluate(&self.runtime, intent, context_data);
        if evaluation.is_rejected() {
            return IntentResult::Failed {
                error: evaluation.rejection_message.unwrap_or_else(|| "invoice approval rejected".to_string()),
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

        let mut attributes = invoice.attributes.clone();
        if let serde_json::Value::Object(obj) = &mut attributes {
            obj.insert("status".to_string(), json!("approved"));
        }

        let updated = match self.runtime.entities.update_entity(
            "invoice",
            invoice_id,
            attributes,
            ExpectedVersion::Exact(invoice.version),
        ) {
            Ok(record) => record,
            Err(e) => return IntentResult::Failed { error: e.to_string(), traces: evaluation.traces },
        };

        let scope = intent.scope();
        let event = new_event(
            "ap.invoice.approved",
            scope,
            intent.actor.clone(),
            intent.data.clone(),
            EntityRef::subject("invoice", invoice_id),
            intent_id,
            intent.idempotency_key.clone(),
        );

        match append_and_project(&self.runtime, event, Some(ExpectedVersion::Exact(updated.version))) {
            Ok(stored) => IntentResult::Success { event_id: stored.id, event: Some(stored) },
            Err(e) => IntentResult::Failed { error: e.to_string(), traces: evaluation.traces },
        }
    }
}

pub struct InvoiceRejectHandler {
    runtime: ApRuntime,
}

impl InvoiceRejectHandler {
    pub fn new(runtime: ApRuntime) -> Self {
        Self { runtime }
    }
}

impl IntentHandler for InvoiceRejectHandler {
    fn intent_type(&self) -> &'static str {
        "ap.invoice.reject"
    }

    fn execute(&self, intent: &Intent, intent_id: IntentId) -> IntentResult {
        let invoice_id = match entity_id_field(&intent.data, "invoice_id") {
            Ok(id) => id,
            Err(error) => return IntentResult::Failed { error, traces: Vec::new() },
        };

        let invoice = match self.runtime.entities.get_entity("invoice", invoice_id, Some(intent.legal_entity)) {
            Ok(Some(record)) => record,
            Ok(None) => return IntentResult::Failed { error: "invoice not found".to_string(), traces: Vec::new() },
            Err(e) => return IntentResult::Failed { error: e.to_string(), traces: Vec::new() },
        };

        let status = field(&invoice.attributes, "status").unwrap_or("");
        if status == "paid" || status == "cancelled" {
            return IntentResult::Failed {
                error: format!("invoice in status {status} cannot be rejected"),
                traces: Vec::new(),
            };
        }

        let mut attributes = invoice.attributes.clone();
        if let serde_json::Value::Object(obj) = &mut attributes {
            obj.insert("status".to_string(), json!("rejected"));
        }

        let updated = match self.runtime.entities.update_entity(
            "invoice",
            invoice_id,
            attributes,
            ExpectedVersion::Exact(invoice.version),
        ) {
            Ok(record) => record,
            Err(e) => return IntentResult::Failed { error: e.to_string(), traces: Vec::new() },
        };

        let scope = intent.scope();
        let event = new_event(
            "ap.invoice.rejected",
            scope,
            intent.actor.clone(),
            intent.data.clone(),
            EntityRef::subject("invoice", invoice_id),
            intent_id,
            intent.idempotency_key.clone(),
        );

        match append_and_project(&self.runtime, event, Some(ExpectedVersion::Exact(updated.version))) {
            Ok(stored) => IntentResult::Success { event_id: stored.id, event: Some(stored) },
            Err(e) => IntentResult::Failed { error: e.to_string(), traces: Vec::new() },
        }
    }
}

pub struct InvoicePostHandler {
    runtime: ApRuntime,
}

impl InvoicePostHandler {
    pub fn new(runtime: ApRuntime) -> Self {
        Self { runtime }
    }
}

/// Default credit account for accounts-payable liability postings when the
/// invoice doesn't carry a vendor-specific override.
const DEFAULT_AP_LIABILITY_ACCOUNT: &str = "2100-00";

/// Fallback debit account for the expense side of a posting when neither the
/// post intent nor the invoice itself names one.
fn default_expense_account() -> String {
    std::env::var("DEFAULT_EXPENSE_ACCOUNT").unwrap_or_else(|_| "5000-00".to_string())
}

impl IntentHandler for InvoicePostHandler {
    fn intent_type(&self) -> &'static str {
        "ap.invoice.post"
    }

    fn execute(&self, intent: &Intent, intent_id: IntentId) -> IntentResult {
        let invoice_id = match entity_id_field(&intent.data, "invoice_id") {
            Ok(id) => id,
            Err(error) => return IntentResult::Failed { error, traces: Vec::new() },
        };

        let invoice = match self.runtime.entities.get_entity("invoice", invoice_id, Some(intent.legal_entity)) {
            Ok(Some(record)) => record,
            Ok(None) => return IntentResult::Failed { error: "invoice not found".to_string(), traces: Vec::new() },
            Err(e) => return IntentResult::Failed { error: e.to_string(), traces: Vec::new() },
        };

        let status = field(&invoice.attributes, "status").unwrap_or("");
        if status != "approved" {
            return IntentResult::Failed {
                error: format!("invoice in status {status} cannot be posted"),
                traces: Vec::new(),
            };
        }
        let amount = match Cents::from_json(&invoice.attributes, "amount") {
            Ok(c) => c,
            Err(error) => return IntentResult::Failed { error, traces: Vec::new() },
        };
        let expense_account = field(&intent.data, "expense_account")
            .or_else(|| field(&invoice.attributes, "expense_account"))
            .map(|s| s.to_string())
            .unwrap_or_else(default_expense_account);

        let mut attributes = invoice.attributes.clone();
        if let serde_json::Value::Object(obj) = &mut attributes {
            obj.insert("status".to_string(), json!("posted"));
        }

        let updated = match self.runtime.entities.update_entity(
            "invoice",
            invoice_id,
            attributes,
            ExpectedVersion::Exact(invoice.version),
        ) {
            Ok(record) => record,
            Err(e) => return IntentResult::Failed { error: e.to_string(), traces: Vec::new() },
        };

        let gl_entries = json!([
            {"account": expense_account, "side": "debit", "amount": amount.0},
            {"account": DEFAULT_AP_LIABILITY_ACCOUNT, "side": "credit", "amount": amount.0},
        ]);

        let scope = intent.scope();
        let event = new_event(
            "ap.invoice.posted",
            scope,
            intent.actor.clone(),
            json!({"invoice_id": invoice_id.to_string(), "gl_entries": gl_entries}),
            EntityRef::subject("invoice", invoice_id),
            intent_id,
            intent.idempotency_key.clone(),
        );

        match append_and_project(&self.runtime, event, Some(ExpectedVersion::Exact(updated.version))) {
            Ok(stored) => IntentResult::Success { event_id: stored.id, event: Some(stored) },
            Err(e) => IntentResult::Failed { error: e.to_string(), traces: Vec::new() },
        }
    }
}

pub struct InvoicePayHandler {
    runtime: ApRuntime,
}

impl InvoicePayHandler {
    pub fn new(runtime: ApRuntime) -> Self {
        Self { runtime }
    }
}

impl IntentHandler for InvoicePayHandler {
    fn intent_type(&self) -> &'static str {
        "ap.invoice.pay"
    }

    fn execute(&self, intent: &Intent, intent_id: IntentId) -> IntentResult {
        let invoice_id = match entity_id_field(&intent.data, "invoice_id") {
            Ok(id) => id,
            Err(error) => return IntentResult::Failed { error, traces: Vec::new() },
        };
        let payment_reference = match required_field(&intent.data, "payment_reference") {
            Ok(r) => r,
            Err(error) => return IntentResult::Failed { error, traces: Vec::new() },
        };

        let invoice = match self.runtime.entities.get_entity("invoice", invoice_id, Some(intent.legal_entity)) {
            Ok(Some(record)) => record,
            Ok(None) => return IntentResult::Failed { error: "invoice not found".to_string(), traces: Vec::new() },
            Err(e) => return IntentResult::Failed { error: e.to_string(), traces: Vec::new() },
        };

        let status = field(&invoice.attributes, "status").unwrap_or("");
        if status != "posted" {
            return IntentResult::Failed {
                error: format!("invoice in status {status} cannot be paid"),
                traces: Vec::new(),
            };
        }

        let payment_date = intent.data.get("payment_date").cloned().unwrap_or(json!(Utc::now().date_naive()));

        let mut attributes = invoice.attributes.clone();
        if let serde_json::Value::Object(obj) = &mut attributes {
            obj.insert("status".to_string(), json!("paid"));
            obj.insert("payment_reference".to_string(), json!(payment_reference));
            obj.insert("payment_date".to_string(), payment_date.clone());
        }

        let updated = match self.runtime.entities.update_entity(
            "invoice",
            invoice_id,
            attributes,
            ExpectedVersion::Exact(invoice.version),
        ) {
            Ok(record) => record,
            Err(e) => return IntentResult::Failed { error: e.to_string(), traces: Vec::new() },
        };

        let scope = intent.scope();
        let event = new_event(
            "ap.invoice.paid",
            scope,
            intent.actor.clone(),
            json!({
                "invoice_id": invoice_id.to_string(),
                "payment_reference": payment_reference,
                "payment_date": payment_date,
            }),
            EntityRef::subject("invoice", invoice_id),
            intent_id,
            intent.idempotency_key.clone(),
        );

        match append_and_project(&self.runtime, event, Some(ExpectedVersion::Exact(updated.version))) {
            Ok(stored) => IntentResult::Success { event_id: stored.id, event: Some(stored) },
            Err(e) => IntentResult::Failed { error: e.to_string(), traces: Vec::new() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variance_within_tolerance_matches() {
        let invoice = Cents(10_000);
        let po = Cents(10_050);
        assert!(invoice.variance_fraction(po) <= MATCH_TOLERANCE);
    }

    #[test]
    fn variance_outside_tolerance_is_exception() {
        let invoice = Cents(12_000);
        let po = Cents(10_000);
        assert!(invoice.variance_fraction(po) > MATCH_TOLERANCE);
    }

    mod handlers {
        use ledgerflow_core::{Actor, ActorId, ActorType, LegalEntityId, TenantId};
        use ledgerflow_intents::Intent;

        use crate::purchase_order::PurchaseOrderCreateHandler;
        use crate::runtime::test_runtime;
        use crate::vendor::VendorCreateHandler;

        use super::*;

        struct Fixture {
            runtime: ApRuntime,
            tenant: TenantId,
            legal_entity: LegalEntityId,
            submitter: Actor,
            vendor_id: EntityId,
        }

        fn setup() -> Fixture {
            let runtime = test_runtime(Vec::new());
            let tenant = TenantId::new();
            let legal_entity = LegalEntityId::new();
            let submitter = Actor::new(ActorType::Human, ActorId::new(), "ap-clerk");

            let vendor_handler = VendorCreateHandler::new(runtime.clone());
            let vendor_intent = Intent::new_request(
                "ap.vendor.create",
                submitter.clone(),
                tenant,
                legal_entity,
                json!({"name": "Acme"}),
            );
            let IntentResult::Success { event, .. } = vendor_handler.execute(&vendor_intent, vendor_intent.id) else {
                panic!("expected vendor create to succeed");
            };
            let vendor_id = event.expect("event").entities[0].entity_id;

            Fixture {
                runtime,
                tenant,
                legal_entity,
                submitter,
                vendor_id,
            }
        }

        fn submit(fx: &Fixture, po_id: Option<EntityId>, amount: i64) -> EntityId {
            let handler = InvoiceSubmitHandler::new(fx.runtime.clone());
            let mut data = json!({
                "vendor_id": fx.vendor_id.to_string(),
                "invoice_number": "INV-1",
                "amount": amount,
            });
            if let Some(po_id) = po_id {
                data["purchase_order_id"] = json!(po_id.to_string());
            }
            let intent = Intent::new_request("ap.invoice.submit", fx.submitter.clone(), fx.tenant, fx.legal_entity, data);
            let IntentResult::Success { event, .. } = handler.execute(&intent, intent.id) else {
                panic!("expected invoice submit to succeed");
            };
            event.expect("event").entities[0].entity_id
        }

        #[test]
        fn submit_without_po_stays_submitted() {
            let fx = setup();
            let invoice_id = submit(&fx, None, 10_000);
            let invoice = fx.runtime.entities.get_entity("invoice", invoice_id, Some(fx.legal_entity)).unwrap().unwrap();
            assert_eq!(invoice.attributes["status"], json!("submitted"));
        }

        #[test]
        fn submit_within_tolerance_matches_and_emits_follow_on() {
            let fx = setup();
            let po_handler = PurchaseOrderCreateHandler::new(fx.runtime.clone());
            let po_intent = Intent::new_request(
                "ap.purchase_order.create",
                fx.submitter.clone(),
                fx.tenant,
                fx.legal_entity,
                json!({"vendor_id": fx.vendor_id.to_string(), "po_number": "PO-1", "total_amount": 10_000}),
            );
            let IntentResult::Success { event, .. } = po_handler.execute(&po_intent, po_intent.id) else {
                panic!("expected purchase order create to succeed");
            };
            let po_id = event.expect("event").entities[0].entity_id;

            let invoice_id = submit(&fx, Some(po_id), 10_030);
            let invoice = fx.runtime.entities.get_entity("invoice", invoice_id, Some(fx.legal_entity)).unwrap().unwrap();
            assert_eq!(invoice.attributes["status"], json!("matched"));
        }

        #[test]
        fn submitter_cannot_also_approve() {
            let fx = setup();
            let invoice_id = submit(&fx, None, 10_000);

            let rules = vec![ledgerflow_rules::Rule {
                id: "ap-sod-enforcement".into(),
                name: "sod".into(),
                description: None,
                priority: 10,
                intent_type: "ap.invoice.approve".into(),
                phase: ledgerflow_rules::Phase::Validate,
                conditions: vec![ledgerflow_rules::Condition {
                    field: "_submitter_is_approver".into(),
                    operator: ledgerflow_rules::Operator::Eq,
                    value: Some(json!(true)),
                }],
                action: ledgerflow_events::RuleAction::Reject,
                rejection_message: Some("the submitter of an invoice cannot also approve it".into()),
                approver_role: None,
                enrich_fields: None,
                effective_from: None,
                effective_to: None,
            }];
            let approve_handler = InvoiceApproveHandler::new(ApRuntime {
                rules: std::sync::Arc::new(rules),
                ..fx.runtime.clone()
            });

            let approve_intent = Intent::new_request(
                "ap.invoice.approve",
                fx.submitter.clone(),
                fx.tenant,
                fx.legal_entity,
                json!({"invoice_id": invoice_id.to_string()}),
            );
            let result = approve_handler.execute(&approve_intent, approve_intent.id);
            assert!(matches!(result, IntentResult::Failed { .. }));
        }

        #[test]
        fn different_approver_can_approve() {
            let fx = setup();
            let invoice_id = submit(&fx, None, 10_000);

            let approver = Actor::new(ActorType::Human, ActorId::new(), "ap-manager");
            let approve_handler = InvoiceApproveHandler::new(fx.runtime.clone());
            let approve_intent = Intent::new_request(
                "ap.invoice.approve",
                approver,
                fx.tenant,
                fx.legal_entity,
                json!({"invoice_id": invoice_id.to_string()}),
            );
            let result = approve_handler.execute(&approve_intent, approve_intent.id);
            assert!(matches!(result, IntentResult::Success { .. }));
        }
    }
}
