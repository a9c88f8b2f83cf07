//! The projection handler contract (C5).
//!
//! `Tx` is a type parameter rather than a fixed `sqlx::Transaction` so that
//! the same trait serves the in-memory reference engine in this crate and
//! the Postgres-backed engine in `ledgerflow-infra`, which instantiates it
//! with its own transaction type.

use thiserror::Error;

use ledgerflow_events::StoredEvent;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("projection handler failed: {0}")]
    HandlerFailed(String),

    #[error("storage error: {0}")]
    Storage(String),
}

pub trait ProjectionHandler<Tx>: Send + Sync {
    /// The projection table/view this handler maintains.
    fn projection_type(&self) -> &'static str;

    /// Event types this handler is registered against.
    fn event_types(&self) -> &'static [&'static str];

    fn handle(&self, event: &StoredEvent, tx: &mut Tx) -> Result<(), ProjectionError>;

    /// Truncate/reinitialize this handler's projection state. Called at the
    /// start of a rebuild. Default is a no-op for handlers with no durable
    /// state to clear (e.g. pure fan-out handlers).
    fn reset(&self, _tx: &mut Tx) -> Result<(), ProjectionError> {
        Ok(())
    }
}
