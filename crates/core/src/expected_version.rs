//! Optimistic-concurrency-control compare-and-swap target.

/// Expected version of an entity (or stream) at the moment of a write.
///
/// This is the compare-and-swap hint threaded through the Event Store
/// (`append`) and the Entity Graph (`update_entity`): callers state what
/// version they believe they are updating, and the store rejects the write
/// if reality disagrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// No expectation; the write is unconditional. Used for create-only
    /// paths where there is nothing to compare against yet.
    Any,
    /// The entity must not already exist.
    NoStream,
    /// The entity must be at exactly this version.
    Exact(u64),
}

impl ExpectedVersion {
    /// Whether `current` satisfies this expectation.
    pub fn matches(self, current: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::NoStream => current == 0,
            ExpectedVersion::Exact(expected) => current == expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_matches_everything() {
        assert!(ExpectedVersion::Any.matches(0));
        assert!(ExpectedVersion::Any.matches(42));
    }

    #[test]
    fn no_stream_requires_zero() {
        assert!(ExpectedVersion::NoStream.matches(0));
        assert!(!ExpectedVersion::NoStream.matches(1));
    }

    #[test]
    fn exact_requires_equality() {
        assert!(ExpectedVersion::Exact(3).matches(3));
        assert!(!ExpectedVersion::Exact(3).matches(4));
    }
}
