//! Subscription Service (C6): projection cursors and their state machine.
//!
//! ```text
//! [missing] --create()--> active
//! active --pause()--> paused
//! paused --resume()--> active
//! {active|paused} --reset()--> resetting --rebuild-end--> active
//! ```
//!
//! Generalizes the teacher's `ProjectionCursorStore` (bare
//! tenant/aggregate/projection cursor) to the full subscription row shape
//! including `status`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ledgerflow_core::EventId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Paused,
    Resetting,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub projection_type: String,
    pub subscriber_type: String,
    pub subscriber_id: String,
    pub event_types: Option<Vec<String>>,
    pub last_processed_id: Option<EventId>,
    pub last_processed_sequence: u64,
    pub status: SubscriptionStatus,
    pub batch_size: u32,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new(
        projection_type: impl Into<String>,
        subscriber_type: impl Into<String>,
        subscriber_id: impl Into<String>,
        batch_size: u32,
    ) -> Self {
        Self {
            projection_type: projection_type.into(),
            subscriber_type: subscriber_type.into(),
            subscriber_id: subscriber_id.into(),
            event_types: None,
            last_processed_id: None,
            last_processed_sequence: 0,
            status: SubscriptionStatus::Active,
            batch_size,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("subscription {projection_type}/{subscriber_id} not found")]
    NotFound {
        projection_type: String,
        subscriber_id: String,
    },

    #[error("no-op transition: subscription already in state {0:?}")]
    NoOpTransition(SubscriptionStatus),

    #[error("storage error: {0}")]
    Storage(String),
}

pub trait SubscriptionStore: Send + Sync {
    fn create(&self, subscription: Subscription) -> Result<(), SubscriptionError>;

    fn get(&self, projection_type: &str, subscriber_id: &str) -> Option<Subscription>;

    fn update_cursor(
        &self,
        projection_type: &str,
        subscriber_id: &str,
        last_processed_id: EventId,
        last_processed_sequence: u64,
    ) -> Result<(), SubscriptionError>;

    fn pause(&self, projection_type: &str, subscriber_id: &str) -> Result<(), SubscriptionError>;
    fn resume(&self, projection_type: &str, subscriber_id: &str) -> Result<(), SubscriptionError>;

    /// Transition to `resetting` and zero the cursor, ahead of a rebuild.
    fn begin_reset(&self, projection_type: &str, subscriber_id: &str) -> Result<(), SubscriptionError>;

    /// Transition back to `active` once a rebuild completes.
    fn end_reset(&self, projection_type: &str, subscriber_id: &str) -> Result<(), SubscriptionError>;

    /// The minimum cursor across all active subscriptions for a projection
    /// type — the polling worker's low-water mark.
    fn min_active_cursor(&self, projection_type: &str) -> Option<u64>;
}
