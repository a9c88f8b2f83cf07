//! The append-only event log's data shapes and publishing mechanics.

pub mod bus;
pub mod entity_ref;
pub mod envelope;
pub mod in_memory_bus;
pub mod registry;
pub mod rule_trace;
pub mod source;
pub mod store;

pub use bus::{EventAppended, EventBus, ListenerHandle, Subscription};
pub use entity_ref::{EntityRef, EntityRole};
pub use envelope::{NewEvent, NewEventBuilder, StoredEvent};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use registry::{EventTypeRegistry, InMemoryEventTypeRegistry, RegistryError, SchemaEntry};
pub use rule_trace::{RuleAction, RuleTrace, TraceResult};
pub use source::EventSource;
pub use store::{EventPage, EventStore, EventStoreError, InMemoryEventStore};
