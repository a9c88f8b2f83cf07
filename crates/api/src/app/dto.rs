//! Request DTOs and response JSON mapping for the REST surface (§6).

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use ledgerflow_core::{Actor, ActorId, ActorType};
use ledgerflow_events::StoredEvent;
use ledgerflow_intents::Intent;

#[derive(Debug, Deserialize)]
pub struct SubmitIntentRequest {
    #[serde(rename = "type")]
    pub intent_type: String,
    pub actor: Option<RequestActor>,
    pub data: JsonValue,
    pub idempotency_key: Option<String>,
    pub correlation_id: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub effective_date: Option<NaiveDate>,
    pub expected_entity_version: Option<u64>,
}

/// `{type, id, name}` per §6 "Actor identity": used only when the transport
/// injected no authenticated identity (e.g. a service-to-service call with
/// its own actor notion).
#[derive(Debug, Deserialize)]
pub struct RequestActor {
    #[serde(rename = "type")]
    pub actor_type: ActorType,
    pub id: Option<ActorId>,
    pub name: String,
}

impl RequestActor {
    pub fn into_actor(self) -> Actor {
        Actor::new(self.actor_type, self.id.unwrap_or_default(), self.name)
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ApproveRejectRequest {
    pub reason: Option<String>,
}

/// `sequence` is rendered as a string per §6 "Event stream format" (JSON
/// numbers lose precision past 53 bits; `u64` sequences don't fit that).
pub fn event_to_json(event: &StoredEvent) -> JsonValue {
    let mut value = serde_json::to_value(event).expect("StoredEvent always serializes");
    if let JsonValue::Object(obj) = &mut value {
        obj.insert("sequence".to_string(), json!(event.sequence.to_string()));
    }
    value
}

pub fn intent_to_json(intent: &Intent) -> JsonValue {
    serde_json::to_value(intent).expect("Intent always serializes")
}
