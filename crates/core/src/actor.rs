//! Actor identity: who (or what) caused an event or submitted an intent.

use serde::{Deserialize, Serialize};

use crate::id::ActorId;

/// The kind of actor responsible for an intent or event.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    /// A human operator acting through the REST surface.
    Human,
    /// An autonomous or semi-autonomous agent.
    Agent,
    /// The system itself (e.g. the match-engine emitting `ap.invoice.matched`).
    System,
    /// An external system acting via an integration.
    External,
    /// A bulk-import process.
    Import,
}

/// `{type, id, name}` identifying who caused a fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    #[serde(rename = "type")]
    pub actor_type: ActorType,
    pub id: ActorId,
    pub name: String,
}

impl Actor {
    pub fn new(actor_type: ActorType, id: ActorId, name: impl Into<String>) -> Self {
        Self {
            actor_type,
            id,
            name: name.into(),
        }
    }

    pub fn system(name: impl Into<String>) -> Self {
        Self::new(ActorType::System, ActorId::new(), name)
    }

    /// Whether `self` and `other` are the same acting principal, for
    /// segregation-of-duties comparisons (the approver must not be the
    /// originator).
    pub fn is_same_principal(&self, other: &Actor) -> bool {
        self.id == other.id
    }
}
