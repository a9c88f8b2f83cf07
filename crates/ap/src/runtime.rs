//! Shared collaborators every AP intent handler is built against: the
//! Event Store, Entity Graph, loaded rule set, and Projection Engine. One
//! `ApRuntime` is constructed at startup and cloned (cheaply, via `Arc`)
//! into each handler.

use std::sync::Arc;

use ledgerflow_entities::EntityGraph;
use ledgerflow_events::EventStore;
use ledgerflow_projections::{DeadLetterStore, ProjectionEngine};
use ledgerflow_rules::Rule;

#[derive(Clone)]
pub struct ApRuntime {
    pub event_store: Arc<dyn EventStore>,
    pub entities: Arc<dyn EntityGraph>,
    pub rules: Arc<Vec<Rule>>,
    pub projections: Arc<ProjectionEngine<()>>,
    pub dead_letters: Arc<dyn DeadLetterStore>,
}

impl ApRuntime {
    pub fn new(
        event_store: Arc<dyn EventStore>,
        entities: Arc<dyn EntityGraph>,
        rules: Arc<Vec<Rule>>,
        projections: Arc<ProjectionEngine<()>>,
        dead_letters: Arc<dyn DeadLetterStore>,
    ) -> Self {
        Self {
            event_store,
            entities,
            rules,
            projections,
            dead_letters,
        }
    }

    /// Dispatch a freshly-appended event to every registered projection
    /// handler, same-transaction per the canonical handler lifecycle (§4.10
    /// step 8). `Tx = ()` here since this runtime has no real transaction to
    /// thread — the Postgres runtime in `ledgerflow-infra` passes its own.
    pub fn project(&self, event: &ledgerflow_events::StoredEvent) {
        let mut tx = ();
        self.projections.process_event(event, &mut tx, self.dead_letters.as_ref());
    }
}

#[cfg(test)]
pub(crate) fn test_runtime(rules: Vec<Rule>) -> ApRuntime {
    use ledgerflow_entities::InMemoryEntityGraph;
    use ledgerflow_events::InMemoryEventStore;
    use ledgerflow_projections::{InMemoryDeadLetterStore, ProjectionEngine};

    let entities: Arc<dyn EntityGraph> = Arc::new(InMemoryEntityGraph::new());
    let event_store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new().with_entity_graph(entities.clone()));

    ApRuntime::new(
        event_store,
        entities,
        Arc::new(rules),
        Arc::new(ProjectionEngine::new()),
        Arc::new(InMemoryDeadLetterStore::new()),
    )
}
