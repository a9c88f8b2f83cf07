//! Durable backends for the storage-agnostic traits defined in
//! `ledgerflow-events`, `ledgerflow-entities`, `ledgerflow-projections`, and
//! `ledgerflow-intents`: Postgres for the Event Store, Entity Graph, and the
//! rest of C1-C8, plus the rule file loader and the projection polling
//! worker that ties the durable Event Store to the projection handlers in
//! `ledgerflow-ap`.

pub mod event_store;

/// Database adapters (connection pools, migrations wiring).
pub mod db {}

/// Configuration loading and representation.
pub mod config {}
