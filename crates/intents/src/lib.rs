//! Intent Store (C8) and Intent Pipeline (C9): the deferred-approval
//! intent lifecycle and per-`intent_type` dispatch.

pub mod handler;
pub mod intent;
pub mod pipeline;
pub mod retry;
pub mod store;

pub use handler::{IntentHandler, IntentResult};
pub use intent::{Intent, IntentStatus};
pub use pipeline::{IntentPipeline, NoHandlerRegistered};
pub use retry::{retry_on_occ_conflict, OccRetryPolicy};
pub use store::{InMemoryIntentStore, IntentStore, IntentStoreError};
