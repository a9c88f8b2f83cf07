//! The entity record itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use ledgerflow_core::{EntityId, LegalEntityId};

/// A mutable, derived write-side record — the current-state cache kept in
/// step with the event log, not an event-sourced aggregate reconstructed by
/// replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity_type: String,
    pub entity_id: EntityId,
    pub legal_entity: LegalEntityId,
    pub attributes: JsonValue,
    /// Starts at 1 on create, increments on each successful update. The
    /// optimistic-concurrency-control target for mutations against this
    /// entity.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntityRecord {
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: EntityId,
        legal_entity: LegalEntityId,
        attributes: JsonValue,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id,
            legal_entity,
            attributes,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

/// `{from_entity, to_entity, relation_type, attributes}` — directed, typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRelationship {
    pub from_type: String,
    pub from_id: EntityId,
    pub to_type: String,
    pub to_id: EntityId,
    pub relation_type: String,
    pub attributes: JsonValue,
}
