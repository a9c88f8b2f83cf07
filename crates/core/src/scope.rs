//! Partition scope: the `{tenant, legal_entity}` pair events and entities are
//! keyed by.

use serde::{Deserialize, Serialize};

use crate::id::{LegalEntityId, TenantId};

/// A partition key pair. Every event, entity, and subscription row is scoped
/// to exactly one `Scope`; queries that accept a legal entity filter by it,
/// and omitted entities are hidden from cross-legal-entity reads.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub tenant: TenantId,
    pub legal_entity: LegalEntityId,
}

impl Scope {
    pub fn new(tenant: TenantId, legal_entity: LegalEntityId) -> Self {
        Self {
            tenant,
            legal_entity,
        }
    }
}
