//! The Entity Graph (C3): the derived, mutable write-side entity cache.

pub mod graph;
pub mod in_memory;
pub mod record;

pub use graph::{EntityGraph, EntityGraphError};
pub use in_memory::InMemoryEntityGraph;
pub use record::{EntityRecord, EntityRelationship};
