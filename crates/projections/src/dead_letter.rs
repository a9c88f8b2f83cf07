//! Dead-lettered projection failures — a handler error is caught and
//! recorded here rather than aborting the event's commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ledgerflow_core::{DeadLetterId, EventId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub id: DeadLetterId,
    pub event_id: EventId,
    pub event_sequence: u64,
    pub projection_type: String,
    pub error_message: String,
    pub error_stack: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DeadLetterEntry {
    pub fn new(
        event_id: EventId,
        event_sequence: u64,
        projection_type: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            id: DeadLetterId::new(),
            event_id,
            event_sequence,
            projection_type: projection_type.into(),
            error_message: error_message.into(),
            error_stack: None,
            created_at: Utc::now(),
        }
    }
}

pub trait DeadLetterStore: Send + Sync {
    fn record(&self, entry: DeadLetterEntry);
    fn list(&self, projection_type: &str) -> Vec<DeadLetterEntry>;
}
