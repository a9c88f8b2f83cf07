//! Actor identity, capability model, and JWT validation consumed by the
//! REST surface ahead of intent dispatch.

pub mod authorize;
pub mod capability;
pub mod claims;
pub mod principal;

pub use authorize::{authorize, AuthzError, CapabilityMap};
pub use capability::Capability;
pub use claims::{validate_claims, Hs256JwtValidator, JwtClaims, JwtValidator, TokenValidationError};
pub use principal::AuthenticatedIdentity;
