//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input, failed schema check).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found: {0}")]
    NotFound(String),

    /// An optimistic-concurrency conflict (stale `expected_version`).
    #[error("concurrency conflict on {entity_id}: expected {expected}, found {actual}")]
    Concurrency {
        entity_id: String,
        expected: u64,
        actual: u64,
    },

    /// A declarative rule rejected the intent.
    #[error("rejected by rule: {0}")]
    RuleRejection(String),

    /// Authorization failure at the domain boundary (capability or SoD).
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn concurrency(entity_id: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self::Concurrency {
            entity_id: entity_id.into(),
            expected,
            actual,
        }
    }

    pub fn rule_rejection(msg: impl Into<String>) -> Self {
        Self::RuleRejection(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
}
