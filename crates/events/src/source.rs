//! Where an event came from.

use serde::{Deserialize, Serialize};

/// `{system, channel, reference}` provenance metadata, distinct from `actor`
/// (who caused the fact) — this is what produced the request (e.g. the REST
/// API, a batch import job, a webhook).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSource {
    pub system: Option<String>,
    pub channel: Option<String>,
    pub reference: Option<String>,
}

impl EventSource {
    pub fn new(
        system: impl Into<String>,
        channel: impl Into<String>,
        reference: Option<String>,
    ) -> Self {
        Self {
            system: Some(system.into()),
            channel: Some(channel.into()),
            reference,
        }
    }
}
