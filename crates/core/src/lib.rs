//! Shared domain primitives: identifiers, scope, actor, errors, OCC.
//!
//! This crate has no IO and no async; everything in it is a plain value type
//! or a pure function, so every other crate in the workspace can depend on
//! it without pulling in a runtime or a storage driver.

pub mod actor;
pub mod error;
pub mod expected_version;
pub mod id;
pub mod scope;
pub mod value_object;

pub use actor::{Actor, ActorType};
pub use error::{DomainError, DomainResult};
pub use expected_version::ExpectedVersion;
pub use id::{
    ActorId, DeadLetterId, EntityId, EventId, IntentId, LegalEntityId, SnapshotId, TenantId,
};
pub use scope::Scope;
pub use value_object::ValueObject;

