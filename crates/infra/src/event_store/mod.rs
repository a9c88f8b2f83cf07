//! Postgres-backed Event Store (C1) wiring.
//!
//! The trait and the in-memory reference implementation live in
//! `ledgerflow_events::store`; this module only adds the durable backend.

pub mod postgres;

pub use ledgerflow_events::store::{EventPage, EventStore, EventStoreError};
pub use postgres::PostgresEventStore;
