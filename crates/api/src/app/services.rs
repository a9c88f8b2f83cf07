//! Process-wide wiring: the Event Store, Entity Graph, Rules Engine,
//! Projection Engine, Intent Pipeline, and every C6/C7/C2/C8 collaborator
//! behind the REST surface. One `AppState` is built at startup and shared
//! (via `Arc`) across every request, the same shape as the teacher's
//! `AppServices`.

use std::path::PathBuf;
use std::sync::Arc;

use ledgerflow_ap::{build_ap_projections, ApProjections, ApRuntime};
use ledgerflow_auth::CapabilityMap;
use ledgerflow_entities::{EntityGraph, InMemoryEntityGraph};
use ledgerflow_events::{EventStore, EventTypeRegistry, InMemoryEventStore, InMemoryEventTypeRegistry};
use ledgerflow_intents::{InMemoryIntentStore, IntentPipeline, IntentStore};
use ledgerflow_projections::{
    DeadLetterStore, InMemoryDeadLetterStore, InMemorySnapshotService, InMemorySubscriptionStore,
    SnapshotService, SubscriptionStore,
};
use ledgerflow_rules::Rule;

use crate::authz::default_capability_map;

pub struct AppState {
    pub runtime: ApRuntime,
    pub pipeline: IntentPipeline,
    pub intents: Arc<dyn IntentStore>,
    pub projections: ApProjections,
    pub event_types: Arc<dyn EventTypeRegistry>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub snapshots: Arc<dyn SnapshotService>,
    pub capabilities: CapabilityMap,
}

/// Build the process-wide `AppState`: load rules from `RULES_DIR` (if set),
/// wire the in-memory Event Store / Entity Graph / Projection Engine, and
/// register every AP intent handler.
pub async fn build_state() -> AppState {
    let rules = load_rules();

    let entities: Arc<dyn EntityGraph> = Arc::new(InMemoryEntityGraph::new());
    let event_store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new().with_entity_graph(entities.clone()));
    let dead_letters: Arc<dyn DeadLetterStore> = Arc::new(InMemoryDeadLetterStore::new());

    let (engine, projections) = build_ap_projections();

    let runtime = ApRuntime::new(event_store, entities, Arc::new(rules), Arc::new(engine), dead_letters);

    let mut pipeline = IntentPipeline::new();
    ledgerflow_ap::register_handlers(&mut pipeline, runtime.clone());

    AppState {
        runtime,
        pipeline,
        intents: Arc::new(InMemoryIntentStore::new()),
        projections,
        event_types: Arc::new(InMemoryEventTypeRegistry::new()),
        subscriptions: Arc::new(InMemorySubscriptionStore::new()),
        snapshots: Arc::new(InMemorySnapshotService::new()),
        capabilities: default_capability_map(),
    }
}

fn load_rules() -> Vec<Rule> {
    let Ok(dir) = std::env::var("RULES_DIR") else {
        return Vec::new();
    };
    match ledgerflow_rules::load_directory(&PathBuf::from(&dir)) {
        Ok(rules) => rules,
        Err(e) => {
            tracing::warn!(error = %e, dir = %dir, "failed to load rules directory; starting with no rules");
            Vec::new()
        }
    }
}
