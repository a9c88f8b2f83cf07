//! Event Store (C1): the append-only, globally-sequenced log.
//!
//! Generalizes the teacher's per-`(tenant, aggregate)` stream
//! (`forgeerp-infra::event_store`) into a single global sequence: one
//! `events` table, scope carried as columns rather than as the stream key.
//! Idempotency-key dedup and OCC against the subject entity's version
//! replace the teacher's per-stream version check.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use thiserror::Error;

use ledgerflow_core::{EntityId, EventId, ExpectedVersion, IntentId, LegalEntityId};
use ledgerflow_entities::EntityGraph;

use crate::bus::{EventAppended, EventBus};
use crate::entity_ref::EntityRole;
use crate::envelope::{NewEvent, StoredEvent};
use crate::registry::EventTypeRegistry;

#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("event payload failed schema validation: {0}")]
    Validation(String),

    #[error("optimistic concurrency check failed for entity {entity_id}: expected {expected}, found {actual}")]
    Concurrency {
        entity_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone)]
pub struct EventPage {
    pub events: Vec<StoredEvent>,
    pub has_more: bool,
    pub next_sequence: Option<u64>,
}

const DEFAULT_PAGE_SIZE: u32 = 100;

/// Sync like the teacher's `EventStore`; a Postgres implementation in
/// `ledgerflow-infra` bridges to `sqlx` via
/// `tokio::runtime::Handle::try_current().block_on(...)`.
pub trait EventStore: Send + Sync {
    fn append(
        &self,
        event: NewEvent,
        expected_entity_version: Option<ExpectedVersion>,
    ) -> Result<StoredEvent, EventStoreError>;

    fn read_stream(
        &self,
        after_sequence: Option<u64>,
        limit: Option<u32>,
        event_types: Option<&[String]>,
    ) -> Result<EventPage, EventStoreError>;

    fn read_by_partition(
        &self,
        legal_entity: LegalEntityId,
        after_sequence: Option<u64>,
        limit: Option<u32>,
    ) -> Result<EventPage, EventStoreError>;

    fn get_by_id(&self, id: EventId) -> Option<StoredEvent>;

    fn get_by_intent_id(&self, intent_id: IntentId) -> Option<StoredEvent>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        event: NewEvent,
        expected_entity_version: Option<ExpectedVersion>,
    ) -> Result<StoredEvent, EventStoreError> {
        (**self).append(event, expected_entity_version)
    }

    fn read_stream(
        &self,
        after_sequence: Option<u64>,
        limit: Option<u32>,
        event_types: Option<&[String]>,
    ) -> Result<EventPage, EventStoreError> {
        (**self).read_stream(after_sequence, limit, event_types)
    }

    fn read_by_partition(
        &self,
        legal_entity: LegalEntityId,
        after_sequence: Option<u64>,
        limit: Option<u32>,
    ) -> Result<EventPage, EventStoreError> {
        (**self).read_by_partition(legal_entity, after_sequence, limit)
    }

    fn get_by_id(&self, id: EventId) -> Option<StoredEvent> {
        (**self).get_by_id(id)
    }

    fn get_by_intent_id(&self, intent_id: IntentId) -> Option<StoredEvent> {
        (**self).get_by_intent_id(intent_id)
    }
}

/// In-memory append-only event store, for tests/dev. Holds its collaborators
/// the same optional, dependency-injected way the teacher's event store
/// holds an `Option<Arc<dyn EventBus>>`.
pub struct InMemoryEventStore {
    events: RwLock<Vec<StoredEvent>>,
    idempotency_index: RwLock<std::collections::HashMap<String, EventId>>,
    next_sequence: AtomicU64,
    registry: Option<Arc<dyn EventTypeRegistry>>,
    entity_graph: Option<Arc<dyn EntityGraph>>,
    bus: Option<Arc<crate::in_memory_bus::InMemoryEventBus<EventAppended>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            idempotency_index: RwLock::new(std::collections::HashMap::new()),
            next_sequence: AtomicU64::new(1),
            registry: None,
            entity_graph: None,
            bus: None,
        }
    }

    pub fn with_registry(mut self, registry: Arc<dyn EventTypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_entity_graph(mut self, entity_graph: Arc<dyn EntityGraph>) -> Self {
        self.entity_graph = Some(entity_graph);
        self
    }

    pub fn with_bus(mut self, bus: Arc<crate::in_memory_bus::InMemoryEventBus<EventAppended>>) -> Self {
        self.bus = Some(bus);
        self
    }

    fn subject_entity_id(event: &NewEvent) -> Option<EntityId> {
        event
            .entities
            .iter()
            .find(|e| matches!(e.role, EntityRole::Subject))
            .map(|e| e.entity_id)
    }

    fn check_entity_version(
        &self,
        event: &NewEvent,
        expected: ExpectedVersion,
    ) -> Result<(), EventStoreError> {
        let (Some(graph), Some(entity_id)) = (&self.entity_graph, Self::subject_entity_id(event))
        else {
            return Ok(());
        };
        let subject = event
            .entities
            .iter()
            .find(|e| matches!(e.role, EntityRole::Subject))
            .expect("subject_entity_id returned Some");

        let current = graph
            .get_entity(&subject.entity_type, entity_id, Some(event.scope.legal_entity))
            .map_err(|e| EventStoreError::Storage(e.to_string()))?
            .map(|record| record.version)
            .unwrap_or(0);

        if !expected.matches(current) {
            return Err(EventStoreError::Concurrency {
                entity_id: entity_id.to_string(),
                expected: match expected {
                    ExpectedVersion::Exact(v) => v,
                    _ => current,
                },
                actual: current,
            });
        }
        Ok(())
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        event: NewEvent,
        expected_entity_version: Option<ExpectedVersion>,
    ) -> Result<StoredEvent, EventStoreError> {
        if let Some(key) = &event.idempotency_key {
            let index = self
                .idempotency_index
                .read()
                .map_err(|_| EventStoreError::Storage("lock poisoned".to_string()))?;
            if let Some(existing_id) = index.get(key) {
                let existing_id = *existing_id;
                drop(index);
                return Ok(self
                    .get_by_id(existing_id)
                    .expect("idempotency index points at a stored event"));
            }
        }

        if let Some(registry) = &self.registry {
            registry
                .validate(&event.event_type, event.schema_version, &event.data)
                .map_err(|e| EventStoreError::Validation(e.to_string()))?;
        }

        if let Some(expected) = expected_entity_version {
            self.check_entity_version(&event, expected)?;
        }

        let now = chrono::Utc::now();
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);

        let stored = StoredEvent {
            id: EventId::new(),
            sequence,
            event_type: event.event_type,
            schema_version: event.schema_version,
            occurred_at: event.occurred_at.unwrap_or(now),
            recorded_at: now,
            effective_date: event.effective_date.unwrap_or_else(|| now.date_naive()),
            scope: event.scope,
            actor: event.actor,
            correlation_id: event.correlation_id,
            caused_by: event.caused_by,
            intent_id: event.intent_id,
            data: event.data,
            dimensions: event.dimensions,
            entities: event.entities,
            rules_evaluated: event.rules_evaluated,
            tags: event.tags,
            source: event.source,
            idempotency_key: event.idempotency_key.clone(),
        };

        {
            let mut events = self
                .events
                .write()
                .map_err(|_| EventStoreError::Storage("lock poisoned".to_string()))?;
            events.push(stored.clone());
        }

        if let Some(key) = event.idempotency_key {
            let mut index = self
                .idempotency_index
                .write()
                .map_err(|_| EventStoreError::Storage("lock poisoned".to_string()))?;
            index.insert(key, stored.id);
        }

        if let Some(bus) = &self.bus {
            let _ = bus.publish(EventAppended {
                id: stored.id,
                event_type: stored.event_type.clone(),
                sequence: stored.sequence,
            });
        }

        Ok(stored)
    }

    fn read_stream(
        &self,
        after_sequence: Option<u64>,
        limit: Option<u32>,
        event_types: Option<&[String]>,
    ) -> Result<EventPage, EventStoreError> {
        let events = self
            .events
            .read()
            .map_err(|_| EventStoreError::Storage("lock poisoned".to_string()))?;

        let after = after_sequence.unwrap_or(0);
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE) as usize;

        let mut matching: Vec<&StoredEvent> = events
            .iter()
            .filter(|e| e.sequence > after)
            .filter(|e| event_types.map_or(true, |types| types.iter().any(|t| t == &e.event_type)))
            .collect();
        matching.sort_by_key(|e| e.sequence);

        let has_more = matching.len() > limit;
        let page: Vec<StoredEvent> = matching.into_iter().take(limit).cloned().collect();
        let next_sequence = page.last().map(|e| e.sequence);

        Ok(EventPage {
            events: page,
            has_more,
            next_sequence,
        })
    }

    fn read_by_partition(
        &self,
        legal_entity: LegalEntityId,
        after_sequence: Option<u64>,
        limit: Option<u32>,
    ) -> Result<EventPage, EventStoreError> {
        let events = self
            .events
            .read()
            .map_err(|_| EventStoreError::Storage("lock poisoned".to_string()))?;

        let after = after_sequence.unwrap_or(0);
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE) as usize;

        let mut matching: Vec<&StoredEvent> = events
            .iter()
            .filter(|e| e.sequence > after && e.scope.legal_entity == legal_entity)
            .collect();
        matching.sort_by_key(|e| e.sequence);

        let has_more = matching.len() > limit;
        let page: Vec<StoredEvent> = matching.into_iter().take(limit).cloned().collect();
        let next_sequence = page.last().map(|e| e.sequence);

        Ok(EventPage {
            events: page,
            has_more,
            next_sequence,
        })
    }

    fn get_by_id(&self, id: EventId) -> Option<StoredEvent> {
        self.events.read().ok()?.iter().find(|e| e.id == id).cloned()
    }

    fn get_by_intent_id(&self, intent_id: IntentId) -> Option<StoredEvent> {
        self.events
            .read()
            .ok()?
            .iter()
            .find(|e| e.intent_id == Some(intent_id))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::NewEventBuilder;
    use ledgerflow_core::{Actor, ActorType, ActorId, Scope, TenantId};
    use serde_json::json;

    fn scope() -> Scope {
        Scope {
            tenant: TenantId::new(),
            legal_entity: LegalEntityId::new(),
        }
    }

    fn actor() -> Actor {
        Actor::new(ActorType::System, ActorId::new(), "test-system".to_string())
    }

    #[test]
    fn sequence_is_strictly_increasing() {
        let store = InMemoryEventStore::new();
        let a = store
            .append(
                NewEventBuilder::new("ap.vendor.created", scope(), actor(), json!({})).build(),
                None,
            )
            .unwrap();
        let b = store
            .append(
                NewEventBuilder::new("ap.vendor.created", scope(), actor(), json!({})).build(),
                None,
            )
            .unwrap();
        assert!(b.sequence > a.sequence);
    }

    #[test]
    fn duplicate_idempotency_key_returns_existing_event() {
        let store = InMemoryEventStore::new();
        let event = NewEventBuilder::new("ap.vendor.created", scope(), actor(), json!({}))
            .idempotency_key("req-1")
            .build();

        let first = store.append(event.clone(), None).unwrap();
        let second = store.append(event, None).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.read_stream(None, None, None).unwrap().events.len(), 1);
    }

    #[test]
    fn read_stream_paginates_after_sequence() {
        let store = InMemoryEventStore::new();
        for _ in 0..3 {
            store
                .append(
                    NewEventBuilder::new("ap.vendor.created", scope(), actor(), json!({})).build(),
                    None,
                )
                .unwrap();
        }

        let page = store.read_stream(Some(1), Some(1), None).unwrap();
        assert_eq!(page.events.len(), 1);
        assert!(page.has_more);
    }
}
