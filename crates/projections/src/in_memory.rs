//! In-memory reference implementations of the C6/C7 storage traits, for
//! tests and the rebuild/process_event unit suite in `engine.rs`.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use ledgerflow_core::{EventId, SnapshotId};

use crate::dead_letter::{DeadLetterEntry, DeadLetterStore};
use crate::snapshot::{Snapshot, SnapshotError, SnapshotService};
use crate::subscription::{Subscription, SubscriptionError, SubscriptionStatus, SubscriptionStore};

#[derive(Default)]
pub struct InMemoryDeadLetterStore {
    entries: RwLock<Vec<DeadLetterEntry>>,
}

impl InMemoryDeadLetterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeadLetterStore for InMemoryDeadLetterStore {
    fn record(&self, entry: DeadLetterEntry) {
        self.entries.write().expect("dead letter lock poisoned").push(entry);
    }

    fn list(&self, projection_type: &str) -> Vec<DeadLetterEntry> {
        self.entries
            .read()
            .expect("dead letter lock poisoned")
            .iter()
            .filter(|e| e.projection_type == projection_type)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct SubKey {
    projection_type: String,
    subscriber_id: String,
}

#[derive(Default)]
pub struct InMemorySubscriptionStore {
    subscriptions: RwLock<HashMap<SubKey, Subscription>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(projection_type: &str, subscriber_id: &str) -> SubKey {
        SubKey {
            projection_type: projection_type.to_string(),
            subscriber_id: subscriber_id.to_string(),
        }
    }
}

impl SubscriptionStore for InMemorySubscriptionStore {
    fn create(&self, subscription: Subscription) -> Result<(), SubscriptionError> {
        let key = Self::key(&subscription.projection_type, &subscription.subscriber_id);
        self.subscriptions
            .write()
            .expect("subscription lock poisoned")
            .insert(key, subscription);
        Ok(())
    }

    fn get(&self, projection_type: &str, subscriber_id: &str) -> Option<Subscription> {
        self.subscriptions
            .read()
            .expect("subscription lock poisoned")
            .get(&Self::key(projection_type, subscriber_id))
            .cloned()
    }

    fn update_cursor(
        &self,
        projection_type: &str,
        subscriber_id: &str,
        last_processed_id: EventId,
        last_processed_sequence: u64,
    ) -> Result<(), SubscriptionError> {
        let mut subs = self.subscriptions.write().expect("subscription lock poisoned");
        let sub = subs
            .get_mut(&Self::key(projection_type, subscriber_id))
            .ok_or_else(|| SubscriptionError::NotFound {
                projection_type: projection_type.to_string(),
                subscriber_id: subscriber_id.to_string(),
            })?;
        sub.last_processed_id = Some(last_processed_id);
        sub.last_processed_sequence = last_processed_sequence;
        sub.updated_at = Utc::now();
        Ok(())
    }

    fn pause(&self, projection_type: &str, subscriber_id: &str) -> Result<(), SubscriptionError> {
        self.transition(projection_type, subscriber_id, SubscriptionStatus::Active, SubscriptionStatus::Paused)
    }

    fn resume(&self, projection_type: &str, subscriber_id: &str) -> Result<(), SubscriptionError> {
        self.transition(projection_type, subscriber_id, SubscriptionStatus::Paused, SubscriptionStatus::Active)
    }

    fn begin_reset(&self, projection_type: &str, subscriber_id: &str) -> Result<(), SubscriptionError> {
        let mut subs = self.subscriptions.write().expect("subscription lock poisoned");
        let sub = subs
            .get_mut(&Self::key(projection_type, subscriber_id))
            .ok_or_else(|| SubscriptionError::NotFound {
                projection_type: projection_type.to_string(),
                subscriber_id: subscriber_id.to_string(),
            })?;
        sub.status = SubscriptionStatus::Resetting;
        sub.last_processed_sequence = 0;
        sub.last_processed_id = None;
        Ok(())
    }

    fn end_reset(&self, projection_type: &str, subscriber_id: &str) -> Result<(), SubscriptionError> {
        self.transition(
            projection_type,
            subscriber_id,
            SubscriptionStatus::Resetting,
            SubscriptionStatus::Active,
        )
    }

    fn min_active_cursor(&self, projection_type: &str) -> Option<u64> {
        self.subscriptions
            .read()
            .expect("subscription lock poisoned")
            .values()
            .filter(|s| s.projection_type == projection_type && s.status == SubscriptionStatus::Active)
            .map(|s| s.last_processed_sequence)
            .min()
    }
}

impl InMemorySubscriptionStore {
    fn transition(
        &self,
        projection_type: &str,
        subscriber_id: &str,
        from: SubscriptionStatus,
        to: SubscriptionStatus,
    ) -> Result<(), SubscriptionError> {
        let mut subs = self.subscriptions.write().expect("subscription lock poisoned");
        let sub = subs
            .get_mut(&Self::key(projection_type, subscriber_id))
            .ok_or_else(|| SubscriptionError::NotFound {
                projection_type: projection_type.to_string(),
                subscriber_id: subscriber_id.to_string(),
            })?;
        if sub.status != from {
            return Err(SubscriptionError::NoOpTransition(sub.status));
        }
        sub.status = to;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySnapshotService {
    snapshots: RwLock<Vec<Snapshot>>,
}

impl InMemorySnapshotService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture `rows` as a new snapshot. Unlike the Postgres service, this
    /// reference impl takes the rows directly rather than reading them from
    /// a live projection table.
    pub fn capture(&self, projection_type: &str, sequence_number: u64, rows: Vec<serde_json::Value>) -> Snapshot {
        let snapshot = Snapshot {
            snapshot_id: SnapshotId::new(),
            projection_type: projection_type.to_string(),
            sequence_number,
            snapshot_data: rows,
            is_stale: false,
            created_at: Utc::now(),
        };
        self.snapshots
            .write()
            .expect("snapshot lock poisoned")
            .push(snapshot.clone());
        snapshot
    }
}

impl SnapshotService for InMemorySnapshotService {
    fn create_snapshot(&self, projection_type: &str) -> Result<Snapshot, SnapshotError> {
        Ok(self.capture(projection_type, 0, Vec::new()))
    }

    fn restore_from_snapshot(&self, _projection_type: &str, id: SnapshotId) -> Result<(), SnapshotError> {
        let exists = self
            .snapshots
            .read()
            .expect("snapshot lock poisoned")
            .iter()
            .any(|s| s.snapshot_id == id);
        if exists {
            Ok(())
        } else {
            Err(SnapshotError::NotFound(id))
        }
    }

    fn get_latest_valid_snapshot(&self, projection_type: &str) -> Option<Snapshot> {
        self.snapshots
            .read()
            .expect("snapshot lock poisoned")
            .iter()
            .filter(|s| s.projection_type == projection_type && !s.is_stale)
            .max_by_key(|s| s.sequence_number)
            .cloned()
    }

    fn invalidate_snapshots(&self, projection_type: &str, from_sequence: u64) {
        let mut snapshots = self.snapshots.write().expect("snapshot lock poisoned");
        for snapshot in snapshots.iter_mut() {
            if snapshot.projection_type == projection_type && snapshot.sequence_number >= from_sequence {
                snapshot.is_stale = true;
            }
        }
    }

    fn list_snapshots(&self, projection_type: &str) -> Vec<Snapshot> {
        self.snapshots
            .read()
            .expect("snapshot lock poisoned")
            .iter()
            .filter(|s| s.projection_type == projection_type)
            .cloned()
            .collect()
    }

    fn get_by_id(&self, id: SnapshotId) -> Option<Snapshot> {
        self.snapshots
            .read()
            .expect("snapshot lock poisoned")
            .iter()
            .find(|s| s.snapshot_id == id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_state_machine_rejects_no_op_transitions() {
        let store = InMemorySubscriptionStore::new();
        store
            .create(Subscription::new("ap_invoice_list", "projection", "ap_invoice_list", 100))
            .unwrap();

        store.pause("ap_invoice_list", "ap_invoice_list").unwrap();
        let err = store.pause("ap_invoice_list", "ap_invoice_list").unwrap_err();
        assert!(matches!(err, SubscriptionError::NoOpTransition(SubscriptionStatus::Paused)));
    }

    #[test]
    fn min_active_cursor_ignores_paused_subscriptions() {
        let store = InMemorySubscriptionStore::new();
        store
            .create(Subscription::new("ap_invoice_list", "projection", "sub_a", 100))
            .unwrap();
        store
            .create(Subscription::new("ap_invoice_list", "projection", "sub_b", 100))
            .unwrap();

        store
            .update_cursor("ap_invoice_list", "sub_a", EventId::new(), 10)
            .unwrap();
        store
            .update_cursor("ap_invoice_list", "sub_b", EventId::new(), 3)
            .unwrap();
        store.pause("ap_invoice_list", "sub_b").unwrap();

        assert_eq!(store.min_active_cursor("ap_invoice_list"), Some(10));
    }

    #[test]
    fn invalidate_marks_snapshots_at_or_after_sequence_stale() {
        let service = InMemorySnapshotService::new();
        let s1 = service.capture("ap_invoice_list", 100, vec![]);
        let s2 = service.capture("ap_invoice_list", 200, vec![]);

        service.invalidate_snapshots("ap_invoice_list", 150);

        assert!(!service.get_by_id(s1.snapshot_id).unwrap().is_stale);
        assert!(service.get_by_id(s2.snapshot_id).unwrap().is_stale);
    }
}
