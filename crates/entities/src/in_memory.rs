//! In-memory `EntityGraph` for unit tests, grounded in the teacher's
//! `RwLock<HashMap<...>>`-backed in-memory event store.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use ledgerflow_core::{EntityId, ExpectedVersion, LegalEntityId};

use crate::graph::{EntityGraph, EntityGraphError};
use crate::record::{EntityRecord, EntityRelationship};

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct Key {
    entity_type: String,
    entity_id: EntityId,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct RelationKey {
    from_type: String,
    from_id: EntityId,
    relation_type: String,
}

#[derive(Default)]
pub struct InMemoryEntityGraph {
    entities: RwLock<HashMap<Key, EntityRecord>>,
    relationships: RwLock<HashMap<RelationKey, Vec<EntityRelationship>>>,
}

impl InMemoryEntityGraph {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EntityGraph for InMemoryEntityGraph {
    fn create_entity(
        &self,
        entity_type: &str,
        entity_id: EntityId,
        legal_entity: LegalEntityId,
        attributes: serde_json::Value,
    ) -> Result<EntityRecord, EntityGraphError> {
        let key = Key {
            entity_type: entity_type.to_string(),
            entity_id,
        };
        let mut entities = self.entities.write().expect("entity graph lock poisoned");

        if entities.contains_key(&key) {
            return Err(EntityGraphError::AlreadyExists {
                entity_type: entity_type.to_string(),
                entity_id: entity_id.to_string(),
            });
        }

        let record = EntityRecord::new(entity_type, entity_id, legal_entity, attributes, Utc::now());
        entities.insert(key, record.clone());
        Ok(record)
    }

    fn update_entity(
        &self,
        entity_type: &str,
        entity_id: EntityId,
        new_attributes: serde_json::Value,
        expected_version: ExpectedVersion,
    ) -> Result<EntityRecord, EntityGraphError> {
        let key = Key {
            entity_type: entity_type.to_string(),
            entity_id,
        };
        let mut entities = self.entities.write().expect("entity graph lock poisoned");

        let record = entities.get_mut(&key).ok_or_else(|| EntityGraphError::NotFound {
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
        })?;

        if !expected_version.matches(record.version) {
            let expected = match expected_version {
                ExpectedVersion::Exact(v) => v,
                ExpectedVersion::NoStream => 0,
                ExpectedVersion::Any => record.version,
            };
            return Err(EntityGraphError::Concurrency {
                entity_type: entity_type.to_string(),
                entity_id: entity_id.to_string(),
                expected,
                actual: record.version,
            });
        }

        record.attributes = new_attributes;
        record.version += 1;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    fn get_entity(
        &self,
        entity_type: &str,
        entity_id: EntityId,
        legal_entity: Option<LegalEntityId>,
    ) -> Result<Option<EntityRecord>, EntityGraphError> {
        let key = Key {
            entity_type: entity_type.to_string(),
            entity_id,
        };
        let entities = self.entities.read().expect("entity graph lock poisoned");
        let found = entities.get(&key).cloned();

        Ok(found.filter(|r| match legal_entity {
            Some(le) => r.legal_entity == le,
            None => true,
        }))
    }

    fn get_entity_by_type_and_attribute(
        &self,
        entity_type: &str,
        attribute: &str,
        value: &serde_json::Value,
        legal_entity: Option<LegalEntityId>,
    ) -> Result<Option<EntityRecord>, EntityGraphError> {
        let entities = self.entities.read().expect("entity graph lock poisoned");
        let found = entities
            .values()
            .find(|r| {
                r.entity_type == entity_type
                    && r.attributes.get(attribute) == Some(value)
                    && legal_entity.map_or(true, |le| r.legal_entity == le)
            })
            .cloned();
        Ok(found)
    }

    fn create_relationship(&self, relationship: EntityRelationship) -> Result<(), EntityGraphError> {
        let key = RelationKey {
            from_type: relationship.from_type.clone(),
            from_id: relationship.from_id,
            relation_type: relationship.relation_type.clone(),
        };
        self.relationships
            .write()
            .expect("entity graph lock poisoned")
            .entry(key)
            .or_default()
            .push(relationship);
        Ok(())
    }

    fn get_related_entities(
        &self,
        entity_type: &str,
        entity_id: EntityId,
        relation_type: &str,
    ) -> Result<Vec<EntityRecord>, EntityGraphError> {
        let key = RelationKey {
            from_type: entity_type.to_string(),
            from_id: entity_id,
            relation_type: relation_type.to_string(),
        };
        let relationships = self.relationships.read().expect("entity graph lock poisoned");
        let Some(related) = relationships.get(&key) else {
            return Ok(Vec::new());
        };

        let entities = self.entities.read().expect("entity graph lock poisoned");
        Ok(related
            .iter()
            .filter_map(|r| {
                entities
                    .get(&Key {
                        entity_type: r.to_type.clone(),
                        entity_id: r.to_id,
                    })
                    .cloned()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn legal_entity() -> LegalEntityId {
        LegalEntityId::new()
    }

    #[test]
    fn create_then_get_roundtrips() {
        let graph = InMemoryEntityGraph::new();
        let id = EntityId::new();
        let le = legal_entity();
        graph
            .create_entity("vendor", id, le, json!({"name": "Acme"}))
            .unwrap();

        let found = graph.get_entity("vendor", id, None).unwrap().unwrap();
        assert_eq!(found.version, 1);
        assert_eq!(found.attributes["name"], json!("Acme"));
    }

    #[test]
    fn update_with_stale_version_conflicts() {
        let graph = InMemoryEntityGraph::new();
        let id = EntityId::new();
        graph
            .create_entity("vendor", id, legal_entity(), json!({"name": "Acme"}))
            .unwrap();

        graph
            .update_entity("vendor", id, json!({"name": "Acme Inc"}), ExpectedVersion::Exact(1))
            .unwrap();

        let err = graph
            .update_entity("vendor", id, json!({"name": "Acme Corp"}), ExpectedVersion::Exact(1))
            .unwrap_err();
        assert!(matches!(err, EntityGraphError::Concurrency { .. }));
    }

    #[test]
    fn legal_entity_scoping_hides_cross_tenant_rows() {
        let graph = InMemoryEntityGraph::new();
        let id = EntityId::new();
        graph
            .create_entity("vendor", id, legal_entity(), json!({"name": "Acme"}))
            .unwrap();

        let other_le = legal_entity();
        let found = graph.get_entity("vendor", id, Some(other_le)).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn uniqueness_probe_by_attribute() {
        let graph = InMemoryEntityGraph::new();
        let id = EntityId::new();
        let le = legal_entity();
        graph
            .create_entity("vendor", id, le, json!({"name": "Acme"}))
            .unwrap();

        let found = graph
            .get_entity_by_type_and_attribute("vendor", "name", &json!("Acme"), Some(le))
            .unwrap();
        assert!(found.is_some());
    }
}
