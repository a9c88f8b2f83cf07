//! Shared plumbing every handler in this crate leans on: rule-context
//! evaluation, JSON field extraction, and the append-then-project tail end
//! of the canonical lifecycle (§4.10 steps 8-9).

use std::str::FromStr;

use chrono::Utc;
use serde_json::Value as JsonValue;

use ledgerflow_core::{Actor, EntityId, EventId, ExpectedVersion, Scope};
use ledgerflow_events::{EntityRef, EventStore, EventStoreError, NewEvent, NewEventBuilder, StoredEvent};
use ledgerflow_intents::{Intent, IntentStatus};
use ledgerflow_rules::{evaluate_phased, Decision, RuleContext, RuleEvaluation};

use crate::runtime::ApRuntime;

pub fn field<'a>(data: &'a JsonValue, field: &str) -> Option<&'a str> {
    data.get(field).and_then(JsonValue::as_str)
}

pub fn required_field<'a>(data: &'a JsonValue, field_name: &str) -> Result<&'a str, String> {
    field(data, field_name)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("{field_name} is required"))
}

pub fn entity_id_field(data: &JsonValue, field_name: &str) -> Result<EntityId, String> {
    let raw = required_field(data, field_name)?;
    EntityId::from_str(raw).map_err(|e| format!("{field_name} is not a valid id: {e}"))
}

/// Run the phased evaluator over this runtime's full rule set, scoped to
/// `intent.intent_type` (the evaluator itself filters by it).
///
/// An intent already carrying `IntentStatus::Approved` has already cleared
/// segregation-of-duties at the Intent Store (`/intents/:id/approve`); rules
/// are not re-run on the `/intents/:id/execute` dispatch that follows, since
/// a `RouteForApproval` rule would otherwise just route it right back for
/// approval forever.
pub fn evaluate(runtime: &ApRuntime, intent: &Intent, data: JsonValue) -> RuleEvaluation {
    if intent.status == IntentStatus::Approved {
        return RuleEvaluation {
            decision: Decision::Approve,
            traces: Vec::new(),
            rejection_message: None,
            required_approver_role: None,
            enriched_context: None,
        };
    }
    let context = RuleContext::new(&intent.intent_type, data, Utc::now().date_naive());
    evaluate_phased(&runtime.rules, &context)
}

/// Append `event`, then fan it out to every registered projection handler
/// (§4.10 steps 8-9), same-transaction in spirit (`Tx = ()` here).
pub fn append_and_project(
    runtime: &ApRuntime,
    event: NewEvent,
    expected_entity_version: Option<ExpectedVersion>,
) -> Result<StoredEvent, EventStoreError> {
    let stored = runtime.event_store.append(event, expected_entity_version)?;
    runtime.project(&stored);
    Ok(stored)
}

pub fn new_event(
    event_type: &'static str,
    scope: Scope,
    actor: Actor,
    data: JsonValue,
    subject: EntityRef,
    intent_id: ledgerflow_core::IntentId,
    idempotency_key: Option<String>,
) -> NewEvent {
    let mut builder = NewEventBuilder::new(event_type, scope, actor, data)
        .entities(vec![subject])
        .intent_id(intent_id);
    if let Some(key) = idempotency_key {
        builder = builder.idempotency_key(key);
    }
    builder.build()
}

/// A follow-on event caused by another, authored by the system actor (e.g.
/// `ap.invoice.matched` caused by `ap.invoice.submitted`), per §4.10.
pub fn follow_on_event(
    event_type: &'static str,
    scope: Scope,
    data: JsonValue,
    subject: EntityRef,
    intent_id: ledgerflow_core::IntentId,
    caused_by: EventId,
    occurred_at: chrono::DateTime<Utc>,
) -> NewEvent {
    NewEventBuilder::new(event_type, scope, Actor::system("match-engine"), data)
        .entities(vec![subject])
        .intent_id(intent_id)
        .caused_by(caused_by)
        .occurred_at(occurred_at)
        .build()
}
