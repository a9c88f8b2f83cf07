//! The authenticated identity a transport injects ahead of intent dispatch.

use serde::{Deserialize, Serialize};

use ledgerflow_core::{Actor, ActorId, ActorType, LegalEntityId, TenantId};

use crate::capability::Capability;

/// `{actor_type, id, name, capabilities[], legal_entity}` resolved from
/// validated JWT claims (or, in tests/dev, constructed directly). The
/// pipeline adopts this identity's actor fields when present; otherwise it
/// falls back to the request body's actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub actor_type: ActorType,
    pub id: ActorId,
    pub name: String,
    pub tenant_id: TenantId,
    pub legal_entity: LegalEntityId,
    pub capabilities: Vec<Capability>,
}

impl AuthenticatedIdentity {
    pub fn new(
        actor_type: ActorType,
        id: ActorId,
        name: impl Into<String>,
        tenant_id: TenantId,
        legal_entity: LegalEntityId,
        capabilities: Vec<Capability>,
    ) -> Self {
        Self {
            actor_type,
            id,
            name: name.into(),
            tenant_id,
            legal_entity,
            capabilities,
        }
    }

    pub fn holds(&self, capability: &Capability) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    pub fn to_actor(&self) -> Actor {
        Actor::new(self.actor_type, self.id, self.name.clone())
    }
}
