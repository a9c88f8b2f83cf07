use std::collections::HashMap;

use thiserror::Error;

use crate::capability::Capability;
use crate::principal::AuthenticatedIdentity;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("no capability is registered for intent type '{0}'")]
    UnknownIntentType(String),

    #[error("forbidden: missing capability '{0}'")]
    Forbidden(String),
}

/// Maps each `intent_type` to the capability required to submit it. Built
/// once at startup from configuration and shared read-only across requests.
#[derive(Debug, Clone, Default)]
pub struct CapabilityMap {
    required: HashMap<String, Capability>,
}

impl CapabilityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, intent_type: impl Into<String>, capability: impl Into<Capability>) -> Self {
        self.required.insert(intent_type.into(), capability.into());
        self
    }

    pub fn required_for(&self, intent_type: &str) -> Option<&Capability> {
        self.required.get(intent_type)
    }
}

/// Authorize an identity against the capability `intent_type` requires.
///
/// - No IO
/// - No panics
/// - No business logic beyond the capability lookup (pure policy check)
///
/// An `intent_type` with no registered capability is a misconfiguration,
/// not an implicit allow — it fails closed.
pub fn authorize(identity: &AuthenticatedIdentity, map: &CapabilityMap, intent_type: &str) -> Result<(), AuthzError> {
    let required = map
        .required_for(intent_type)
        .ok_or_else(|| AuthzError::UnknownIntentType(intent_type.to_string()))?;

    if identity.holds(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use ledgerflow_core::{ActorId, ActorType, LegalEntityId, TenantId};

    use super::*;

    fn identity(capabilities: Vec<Capability>) -> AuthenticatedIdentity {
        AuthenticatedIdentity::new(
            ActorType::Human,
            ActorId::new(),
            "ap-clerk",
            TenantId::new(),
            LegalEntityId::new(),
            capabilities,
        )
    }

    #[test]
    fn unknown_intent_type_fails_closed() {
        let map = CapabilityMap::new();
        let identity = identity(vec![Capability::new("ap.vendor.create")]);
        let err = authorize(&identity, &map, "ap.vendor.create").unwrap_err();
        assert!(matches!(err, AuthzError::UnknownIntentType(_)));
    }

    #[test]
    fn missing_capability_is_forbidden() {
        let map = CapabilityMap::new().require("ap.vendor.create", "ap.vendor.create");
        let identity = identity(vec![Capability::new("ap.item.create")]);
        let err = authorize(&identity, &map, "ap.vendor.create").unwrap_err();
        assert!(matches!(err, AuthzError::Forbidden(_)));
    }

    #[test]
    fn held_capability_authorizes() {
        let map = CapabilityMap::new().require("ap.vendor.create", "ap.vendor.create");
        let identity = identity(vec![Capability::new("ap.vendor.create")]);
        assert!(authorize(&identity, &map, "ap.vendor.create").is_ok());
    }
}
