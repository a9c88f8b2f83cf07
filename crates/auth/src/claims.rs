use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ledgerflow_core::{ActorId, ActorType, LegalEntityId, TenantId};

use crate::capability::Capability;
use crate::principal::AuthenticatedIdentity;

/// JWT claims model (transport-agnostic): the minimal set of claims the
/// pipeline expects once a token has been decoded/verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject: the acting principal's id.
    pub sub: ActorId,
    pub actor_type: ActorType,
    pub name: String,
    pub tenant_id: TenantId,
    pub legal_entity: LegalEntityId,
    pub capabilities: Vec<Capability>,

    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,
    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl JwtClaims {
    pub fn into_identity(self) -> AuthenticatedIdentity {
        AuthenticatedIdentity::new(
            self.actor_type,
            self.sub,
            self.name,
            self.tenant_id,
            self.legal_entity,
            self.capabilities,
        )
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("missing token")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate JWT claims. Signature verification / decoding
/// happens in `Hs256JwtValidator::validate`; this validates the time window.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

/// JWT validator abstraction, keeping the pipeline decoupled from token
/// decoding specifics.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// HS256 validator: signature verification plus deterministic claims
/// validation. Configured from the `JWT_SECRET` environment variable at
/// startup.
#[derive(Clone)]
pub struct Hs256JwtValidator {
    secret: Vec<u8>,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self { secret: secret.into() }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        if token.trim().is_empty() {
            return Err(TokenValidationError::MissingToken);
        }

        let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;

        let decoded = jsonwebtoken::decode::<JwtClaims>(
            token,
            &jsonwebtoken::DecodingKey::from_secret(&self.secret),
            &validation,
        )
        .map_err(|e| TokenValidationError::InvalidToken(e.to_string()))?;

        validate_claims(&decoded.claims, now)?;
        Ok(decoded.claims)
    }
}

#[cfg(test)]
mod tests {
    use ledgerflow_core::LegalEntityId;

    use super::*;

    fn claims(issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> JwtClaims {
        JwtClaims {
            sub: ActorId::new(),
            actor_type: ActorType::Human,
            name: "ap-clerk".to_string(),
            tenant_id: TenantId::new(),
            legal_entity: LegalEntityId::new(),
            capabilities: Vec::new(),
            issued_at,
            expires_at,
        }
    }

    #[test]
    fn expired_token_rejected() {
        let now = Utc::now();
        let c = claims(now - chrono::Duration::hours(2), now - chrono::Duration::hours(1));
        assert_eq!(validate_claims(&c, now), Err(TokenValidationError::Expired));
    }

    #[test]
    fn not_yet_valid_token_rejected() {
        let now = Utc::now();
        let c = claims(now + chrono::Duration::hours(1), now + chrono::Duration::hours(2));
        assert_eq!(validate_claims(&c, now), Err(TokenValidationError::NotYetValid));
    }

    #[test]
    fn inverted_window_rejected() {
        let now = Utc::now();
        let c = claims(now, now - chrono::Duration::hours(1));
        assert_eq!(validate_claims(&c, now), Err(TokenValidationError::InvalidTimeWindow));
    }

    #[test]
    fn valid_window_accepted() {
        let now = Utc::now();
        let c = claims(now - chrono::Duration::minutes(5), now + chrono::Duration::hours(1));
        assert!(validate_claims(&c, now).is_ok());
    }
}
