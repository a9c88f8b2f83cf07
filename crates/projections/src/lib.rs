//! Projection Engine (C5), Subscription Service (C6), and Snapshot Service
//! (C7): storage-agnostic traits plus in-memory reference implementations.

pub mod dead_letter;
pub mod engine;
pub mod handler;
pub mod in_memory;
pub mod snapshot;
pub mod subscription;

pub use dead_letter::{DeadLetterEntry, DeadLetterStore};
pub use engine::{ProjectionEngine, RebuildHandle, RebuildOutcome, RebuildPhase, RebuildProgress, run_rebuild};
pub use handler::{ProjectionError, ProjectionHandler};
pub use in_memory::{InMemoryDeadLetterStore, InMemorySnapshotService, InMemorySubscriptionStore};
pub use snapshot::{ProjectionTableDescriptor, Snapshot, SnapshotError, SnapshotService};
pub use subscription::{Subscription, SubscriptionError, SubscriptionStatus, SubscriptionStore};
