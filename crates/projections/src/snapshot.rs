//! Snapshot Service (C7): point-in-time captures of a projection's rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use ledgerflow_core::SnapshotId;

/// `{table_name, id_column}` registered at startup alongside each
/// `ProjectionHandler`, so the service can operate schema-agnostically over
/// a small closed set of known, descriptor-validated table names rather
/// than accepting arbitrary strings.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionTableDescriptor {
    pub table_name: &'static str,
    pub id_column: &'static str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub snapshot_id: SnapshotId,
    pub projection_type: String,
    pub sequence_number: u64,
    pub snapshot_data: Vec<JsonValue>,
    pub is_stale: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("no descriptor registered for projection type {0}")]
    UnknownProjectionType(String),

    #[error("snapshot {0} not found")]
    NotFound(SnapshotId),

    #[error("storage error: {0}")]
    Storage(String),
}

pub trait SnapshotService: Send + Sync {
    fn create_snapshot(&self, projection_type: &str) -> Result<Snapshot, SnapshotError>;

    fn restore_from_snapshot(&self, projection_type: &str, id: SnapshotId) -> Result<(), SnapshotError>;

    fn get_latest_valid_snapshot(&self, projection_type: &str) -> Option<Snapshot>;

    /// Mark stale any snapshot whose `sequence_number >= from_sequence`,
    /// because a back-dated event's effective date now predates it.
    fn invalidate_snapshots(&self, projection_type: &str, from_sequence: u64);

    fn list_snapshots(&self, projection_type: &str) -> Vec<Snapshot>;

    fn get_by_id(&self, id: SnapshotId) -> Option<Snapshot>;
}
