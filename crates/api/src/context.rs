//! Request-scoped context injected by `middleware::auth_middleware`.

use ledgerflow_auth::AuthenticatedIdentity;
use ledgerflow_core::{LegalEntityId, TenantId};

/// Tenant/legal-entity scope for a request. Immutable, present on every
/// route behind the auth middleware.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
    legal_entity: LegalEntityId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId, legal_entity: LegalEntityId) -> Self {
        Self { tenant_id, legal_entity }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn legal_entity(&self) -> LegalEntityId {
        self.legal_entity
    }
}

/// The authenticated identity for a request, resolved from validated JWT
/// claims (§6 "Actor identity").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    identity: AuthenticatedIdentity,
}

impl PrincipalContext {
    pub fn new(identity: AuthenticatedIdentity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &AuthenticatedIdentity {
        &self.identity
    }
}
