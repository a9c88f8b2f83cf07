//! The Entity Graph trait (C3): the derived, mutable write-side cache.

use std::sync::Arc;

use thiserror::Error;

use ledgerflow_core::{EntityId, ExpectedVersion, LegalEntityId};

use crate::record::{EntityRecord, EntityRelationship};

#[derive(Debug, Error)]
pub enum EntityGraphError {
    #[error("optimistic concurrency check failed for {entity_type}/{entity_id}: expected {expected}, found {actual}")]
    Concurrency {
        entity_type: String,
        entity_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("entity {entity_type}/{entity_id} already exists")]
    AlreadyExists { entity_type: String, entity_id: String },

    #[error("entity {entity_type}/{entity_id} not found")]
    NotFound { entity_type: String, entity_id: String },

    #[error("storage error: {0}")]
    Storage(String),
}

/// Scoping: callers that pass `Some(legal_entity)` only see rows in that
/// legal entity; a row in a different legal entity is invisible, not an
/// error.
pub trait EntityGraph: Send + Sync {
    fn create_entity(
        &self,
        entity_type: &str,
        entity_id: EntityId,
        legal_entity: LegalEntityId,
        attributes: serde_json::Value,
    ) -> Result<EntityRecord, EntityGraphError>;

    fn update_entity(
        &self,
        entity_type: &str,
        entity_id: EntityId,
        new_attributes: serde_json::Value,
        expected_version: ExpectedVersion,
    ) -> Result<EntityRecord, EntityGraphError>;

    fn get_entity(
        &self,
        entity_type: &str,
        entity_id: EntityId,
        legal_entity: Option<LegalEntityId>,
    ) -> Result<Option<EntityRecord>, EntityGraphError>;

    fn get_entity_by_type_and_attribute(
        &self,
        entity_type: &str,
        attribute: &str,
        value: &serde_json::Value,
        legal_entity: Option<LegalEntityId>,
    ) -> Result<Option<EntityRecord>, EntityGraphError>;

    fn create_relationship(
        &self,
        relationship: EntityRelationship,
    ) -> Result<(), EntityGraphError>;

    fn get_related_entities(
        &self,
        entity_type: &str,
        entity_id: EntityId,
        relation_type: &str,
    ) -> Result<Vec<EntityRecord>, EntityGraphError>;
}

impl<G> EntityGraph for Arc<G>
where
    G: EntityGraph + ?Sized,
{
    fn create_entity(
        &self,
        entity_type: &str,
        entity_id: EntityId,
        legal_entity: LegalEntityId,
        attributes: serde_json::Value,
    ) -> Result<EntityRecord, EntityGraphError> {
        (**self).create_entity(entity_type, entity_id, legal_entity, attributes)
    }

    fn update_entity(
        &self,
        entity_type: &str,
        entity_id: EntityId,
        new_attributes: serde_json::Value,
        expected_version: ExpectedVersion,
    ) -> Result<EntityRecord, EntityGraphError> {
        (**self).update_entity(entity_type, entity_id, new_attributes, expected_version)
    }

    fn get_entity(
        &self,
        entity_type: &str,
        entity_id: EntityId,
        legal_entity: Option<LegalEntityId>,
    ) -> Result<Option<EntityRecord>, EntityGraphError> {
        (**self).get_entity(entity_type, entity_id, legal_entity)
    }

    fn get_entity_by_type_and_attribute(
        &self,
        entity_type: &str,
        attribute: &str,
        value: &serde_json::Value,
        legal_entity: Option<LegalEntityId>,
    ) -> Result<Option<EntityRecord>, EntityGraphError> {
        (**self).get_entity_by_type_and_attribute(entity_type, attribute, value, legal_entity)
    }

    fn create_relationship(&self, relationship: EntityRelationship) -> Result<(), EntityGraphError> {
        (**self).create_relationship(relationship)
    }

    fn get_related_entities(
        &self,
        entity_type: &str,
        entity_id: EntityId,
        relation_type: &str,
    ) -> Result<Vec<EntityRecord>, EntityGraphError> {
        (**self).get_related_entities(entity_type, entity_id, relation_type)
    }
}
