//! The event envelope: the full persisted shape, and the not-yet-sequenced
//! shape callers build before appending.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use ledgerflow_core::{Actor, EventId, IntentId, Scope};

use crate::entity_ref::EntityRef;
use crate::rule_trace::RuleTrace;
use crate::source::EventSource;

/// An event ready to be appended (no `id`, `sequence`, or `recorded_at`
/// yet — those are store-assigned).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub schema_version: u32,

    pub occurred_at: Option<DateTime<Utc>>,
    pub effective_date: Option<NaiveDate>,

    pub scope: Scope,
    pub actor: Actor,

    pub correlation_id: String,
    pub caused_by: Option<EventId>,
    pub intent_id: Option<IntentId>,

    pub data: JsonValue,
    #[serde(default)]
    pub dimensions: HashMap<String, JsonValue>,
    #[serde(default)]
    pub entities: Vec<EntityRef>,
    #[serde(default)]
    pub rules_evaluated: Vec<RuleTrace>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source: EventSource,

    pub idempotency_key: Option<String>,
}

impl NewEvent {
    /// The `entities` entry with role `subject`, if any — the canonical OCC
    /// target for this append.
    pub fn subject(&self) -> Option<&EntityRef> {
        self.entities
            .iter()
            .find(|e| matches!(e.role, crate::entity_ref::EntityRole::Subject))
    }
}

/// A builder for `NewEvent`, since most fields have sensible defaults and
/// only a handful vary per call site.
pub struct NewEventBuilder {
    inner: NewEvent,
}

impl NewEventBuilder {
    pub fn new(event_type: impl Into<String>, scope: Scope, actor: Actor, data: JsonValue) -> Self {
        Self {
            inner: NewEvent {
                event_type: event_type.into(),
                schema_version: 1,
                occurred_at: None,
                effective_date: None,
                scope,
                actor,
                correlation_id: EventId::new().to_string(),
                caused_by: None,
                intent_id: None,
                data,
                dimensions: HashMap::new(),
                entities: Vec::new(),
                rules_evaluated: Vec::new(),
                tags: Vec::new(),
                source: EventSource::default(),
                idempotency_key: None,
            },
        }
    }

    pub fn schema_version(mut self, v: u32) -> Self {
        self.inner.schema_version = v;
        self
    }

    pub fn occurred_at(mut self, at: DateTime<Utc>) -> Self {
        self.inner.occurred_at = Some(at);
        self
    }

    pub fn effective_date(mut self, date: NaiveDate) -> Self {
        self.inner.effective_date = Some(date);
        self
    }

    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.inner.correlation_id = id.into();
        self
    }

    pub fn caused_by(mut self, id: EventId) -> Self {
        self.inner.caused_by = Some(id);
        self
    }

    pub fn intent_id(mut self, id: IntentId) -> Self {
        self.inner.intent_id = Some(id);
        self
    }

    pub fn entities(mut self, entities: Vec<EntityRef>) -> Self {
        self.inner.entities = entities;
        self
    }

    pub fn rules_evaluated(mut self, traces: Vec<RuleTrace>) -> Self {
        self.inner.rules_evaluated = traces;
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.inner.tags = tags;
        self
    }

    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.inner.idempotency_key = Some(key.into());
        self
    }

    pub fn build(self) -> NewEvent {
        self.inner
    }
}

/// A stored, sequenced event — immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: EventId,
    /// Store-assigned, globally monotonically increasing, never reused.
    pub sequence: u64,

    #[serde(rename = "type")]
    pub event_type: String,
    pub schema_version: u32,

    pub occurred_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
    pub effective_date: NaiveDate,

    pub scope: Scope,
    pub actor: Actor,

    pub correlation_id: String,
    pub caused_by: Option<EventId>,
    pub intent_id: Option<IntentId>,

    pub data: JsonValue,
    pub dimensions: HashMap<String, JsonValue>,
    pub entities: Vec<EntityRef>,
    pub rules_evaluated: Vec<RuleTrace>,
    pub tags: Vec<String>,
    pub source: EventSource,

    pub idempotency_key: Option<String>,
}

impl StoredEvent {
    pub fn subject(&self) -> Option<&EntityRef> {
        self.entities
            .iter()
            .find(|e| matches!(e.role, crate::entity_ref::EntityRole::Subject))
    }
}
