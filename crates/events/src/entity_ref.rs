//! References from an event to the entities it touched.

use serde::{Deserialize, Serialize};

use ledgerflow_core::EntityId;

/// The role an entity plays in an event.
///
/// Exactly one entity reference on an event carries `Subject`: that is the
/// canonical target for optimistic concurrency control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityRole {
    /// The canonical OCC target of this event.
    Subject,
    /// Any other entity referenced (e.g. a PO referenced by an invoice
    /// submission, or the related party in a relationship).
    Related,
}

/// `{entity_type, entity_id, role}` — one element of an event's `entities`
/// list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: String,
    pub entity_id: EntityId,
    pub role: EntityRole,
}

impl EntityRef {
    pub fn subject(entity_type: impl Into<String>, entity_id: EntityId) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id,
            role: EntityRole::Subject,
        }
    }

    pub fn related(entity_type: impl Into<String>, entity_id: EntityId) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id,
            role: EntityRole::Related,
        }
    }
}
