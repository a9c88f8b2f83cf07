//! Postgres-backed Event Store: a single global `events` table rather than
//! the teacher's per-`(tenant, aggregate)` stream table. Optimistic
//! concurrency is checked against the subject entity's current version (read
//! from the `entities` table written by the Entity Graph) instead of a
//! per-stream `MAX(sequence_number)`; idempotency is a unique constraint on
//! `idempotency_key`, with a duplicate insert resolved by returning the
//! already-stored event rather than failing the append.
//!
//! ## Error mapping
//!
//! | sqlx error | SQLSTATE | `EventStoreError` |
//! |---|---|---|
//! | unique violation on `idempotency_key` | `23505` | resolved to the existing row, not an error |
//! | unique violation on `sequence` | `23505` | `Storage` (sequence is a `BIGSERIAL`; should not happen) |
//! | other database error | `23503`/`23514`/other | `Storage` |
//! | pool closed / row not found / other | n/a | `Storage` |

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as JsonValue;
use sqlx::postgres::PgListener;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{instrument, Span};

use ledgerflow_core::{Actor, ActorType, EntityId, EventId, ExpectedVersion, IntentId, LegalEntityId, Scope, TenantId};
use ledgerflow_events::entity_ref::{EntityRef, EntityRole};
use ledgerflow_events::envelope::{NewEvent, StoredEvent};
use ledgerflow_events::rule_trace::RuleTrace;
use ledgerflow_events::source::EventSource;
use ledgerflow_events::store::{EventPage, EventStore, EventStoreError};
use ledgerflow_events::{EventAppended, ListenerHandle};

const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct PostgresEventStore {
    pool: Arc<PgPool>,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    #[instrument(skip(self, event), fields(event_type = %event.event_type), err)]
    async fn append_inner(
        &self,
        event: NewEvent,
        expected_entity_version: Option<ExpectedVersion>,
    ) -> Result<StoredEvent, EventStoreError> {
        if let Some(key) = &event.idempotency_key {
            if let Some(existing) = self.get_by_idempotency_key(key).await? {
                return Ok(existing);
            }
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        if let Some(expected) = expected_entity_version {
            if let Some(subject) = event.subject() {
                let current = entity_version(&mut tx, &subject.entity_type, subject.entity_id, event.scope.legal_entity).await?;
                if !expected.matches(current) {
                    tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
                    return Err(EventStoreError::Concurrency {
                        entity_id: subject.entity_id.to_string(),
                        expected: match expected {
                            ExpectedVersion::Exact(v) => v,
                            _ => current,
                        },
                        actual: current,
                    });
                }
            }
        }

        let now = Utc::now();
        let id = EventId::new();
        let occurred_at = event.occurred_at.unwrap_or(now);
        let effective_date = event.effective_date.unwrap_or_else(|| now.date_naive());
        let entity_refs = serde_json::to_value(&event.entities)
            .map_err(|e| EventStoreError::Storage(format!("failed to serialize entities: {e}")))?;
        let rules_evaluated = serde_json::to_value(&event.rules_evaluated)
            .map_err(|e| EventStoreError::Storage(format!("failed to serialize rules_evaluated: {e}")))?;
        let dimensions = serde_json::to_value(&event.dimensions)
            .map_err(|e| EventStoreError::Storage(format!("failed to serialize dimensions: {e}")))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO events (
                id, sequence, type, schema_version,
                occurred_at, recorded_at, effective_date,
                tenant_id, legal_entity,
                actor_type, actor_id, actor_name,
                correlation_id, caused_by, intent_id,
                data, dimensions, entity_refs, rules_evaluated, tags,
                source_system, source_channel, source_reference,
                idempotency_key
            )
            VALUES (
                $1, DEFAULT, $2, $3,
                $4, $5, $6,
                $7, $8,
                $9, $10, $11,
                $12, $13, $14,
                $15, $16, $17, $18, $19,
                $20, $21, $22,
                $23
            )
            RETURNING sequence
            "#,
        )
        .bind(id.as_uuid())
        .bind(&event.event_type)
        .bind(event.schema_version as i32)
        .bind(occurred_at)
        .bind(now)
        .bind(effective_date)
        .bind(event.scope.tenant.as_uuid())
        .bind(event.scope.legal_entity.as_uuid())
        .bind(actor_type_str(event.actor.actor_type))
        .bind(event.actor.id.as_uuid())
        .bind(&event.actor.name)
        .bind(&event.correlation_id)
        .bind(event.caused_by.map(|id| *id.as_uuid()))
        .bind(event.intent_id.map(|id| *id.as_uuid()))
        .bind(&event.data)
        .bind(&dimensions)
        .bind(&entity_refs)
        .bind(&rules_evaluated)
        .bind(&event.tags)
        .bind(&event.source.system)
        .bind(&event.source.channel)
        .bind(&event.source.reference)
        .bind(&event.idempotency_key)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                EventStoreError::Storage(format!("unique constraint violated on append: {e}"))
            } else {
                map_sqlx_error("insert_event", e)
            }
        })?;

        let sequence: i64 = inserted
            .try_get("sequence")
            .map_err(|e| EventStoreError::Storage(format!("failed to read sequence: {e}")))?;

        let notify_payload = serde_json::to_string(&EventAppended {
            id,
            event_type: event.event_type.clone(),
            sequence: sequence as u64,
        })
        .map_err(|e| EventStoreError::Storage(format!("failed to serialize notify payload: {e}")))?;
        sqlx::query("SELECT pg_notify('event_appended', $1)")
            .bind(&notify_payload)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("notify_event_appended", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(StoredEvent {
            id,
            sequence: sequence as u64,
            event_type: event.event_type,
            schema_version: event.schema_version,
            occurred_at,
            recorded_at: now,
            effective_date,
            scope: event.scope,
            actor: event.actor,
            correlation_id: event.correlation_id,
            caused_by: event.caused_by,
            intent_id: event.intent_id,
            data: event.data,
            dimensions: event.dimensions,
            entities: event.entities,
            rules_evaluated: event.rules_evaluated,
            tags: event.tags,
            source: event.source,
            idempotency_key: event.idempotency_key,
        })
    }

    async fn get_by_idempotency_key(&self, key: &str) -> Result<Option<StoredEvent>, EventStoreError> {
        let row = sqlx::query(&format!("{SELECT_EVENT} WHERE idempotency_key = $1"))
            .bind(key)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_by_idempotency_key", e))?;
        row.map(row_to_event).transpose()
    }

    #[instrument(skip(self), err)]
    async fn read_stream_inner(
        &self,
        after_sequence: Option<u64>,
        limit: Option<u32>,
        event_types: Option<&[String]>,
    ) -> Result<EventPage, EventStoreError> {
        let span = Span::current();
        let after = after_sequence.unwrap_or(0) as i64;
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);

        let rows = sqlx::query(&format!(
            "{SELECT_EVENT} WHERE sequence > $1 AND ($2::text[] IS NULL OR type = ANY($2)) ORDER BY sequence ASC LIMIT $3"
        ))
        .bind(after)
        .bind(event_types)
        .bind((limit + 1) as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("read_stream", e))?;

        span.record("row_count", rows.len());
        page_from_rows(rows, limit)
    }

    #[instrument(skip(self), fields(legal_entity = %legal_entity.as_uuid()), err)]
    async fn read_by_partition_inner(
        &self,
        legal_entity: LegalEntityId,
        after_sequence: Option<u64>,
        limit: Option<u32>,
    ) -> Result<EventPage, EventStoreError> {
        let after = after_sequence.unwrap_or(0) as i64;
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);

        let rows = sqlx::query(&format!(
            "{SELECT_EVENT} WHERE sequence > $1 AND legal_entity = $2 ORDER BY sequence ASC LIMIT $3"
        ))
        .bind(after)
        .bind(legal_entity.as_uuid())
        .bind((limit + 1) as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("read_by_partition", e))?;

        page_from_rows(rows, limit)
    }

    async fn get_by_id_inner(&self, id: EventId) -> Option<StoredEvent> {
        let row = sqlx::query(&format!("{SELECT_EVENT} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .ok()??;
        row_to_event(row).ok()
    }

    async fn get_by_intent_id_inner(&self, intent_id: IntentId) -> Option<StoredEvent> {
        let row = sqlx::query(&format!("{SELECT_EVENT} WHERE intent_id = $1"))
            .bind(intent_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .ok()??;
        row_to_event(row).ok()
    }

    /// Listen on the `event_appended` channel NOTIFY'd by `append_inner` and
    /// invoke `on_notify` for each payload. Used by the out-of-band
    /// projection-rebuild worker to wake on new events rather than poll on a
    /// fixed timer. The returned handle's `release` stops the listener loop;
    /// it does not wait for the loop to exit.
    #[instrument(skip(self, on_notify), err)]
    pub async fn setup_notification_listener(
        &self,
        on_notify: impl Fn(EventAppended) + Send + Sync + 'static,
    ) -> Result<Arc<dyn ListenerHandle>, EventStoreError> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("setup_notification_listener/connect", e))?;
        listener
            .listen("event_appended")
            .await
            .map_err(|e| map_sqlx_error("setup_notification_listener/listen", e))?;

        let cancelled = Arc::new(AtomicBool::new(false));
        let loop_cancelled = cancelled.clone();
        tokio::spawn(async move {
            while !loop_cancelled.load(Ordering::Relaxed) {
                match tokio::time::timeout(Duration::from_secs(5), listener.recv()).await {
                    Ok(Ok(notification)) => match serde_json::from_str::<EventAppended>(notification.payload()) {
                        Ok(event) => on_notify(event),
                        Err(e) => tracing::warn!(error = %e, "failed to decode event_appended notification payload"),
                    },
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, "event_appended listener connection error");
                        break;
                    }
                    Err(_) => continue,
                }
            }
        });

        Ok(Arc::new(PgNotifyListenerHandle { cancelled }))
    }
}

/// `ListenerHandle` for a `setup_notification_listener` subscription.
/// `release` just flips the cancellation flag the listener loop polls; the
/// loop notices within one 5s recv timeout and exits on its own.
struct PgNotifyListenerHandle {
    cancelled: Arc<AtomicBool>,
}

impl ListenerHandle for PgNotifyListenerHandle {
    fn release(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

fn page_from_rows(rows: Vec<sqlx::postgres::PgRow>, limit: u32) -> Result<EventPage, EventStoreError> {
    let has_more = rows.len() > limit as usize;
    let mut events = Vec::with_capacity(rows.len().min(limit as usize));
    for row in rows.into_iter().take(limit as usize) {
        events.push(row_to_event(row)?);
    }
    let next_sequence = events.last().map(|e| e.sequence);
    Ok(EventPage { events, has_more, next_sequence })
}

const SELECT_EVENT: &str = r#"
    SELECT
        id, sequence, type, schema_version,
        occurred_at, recorded_at, effective_date,
        tenant_id, legal_entity,
        actor_type, actor_id, actor_name,
        correlation_id, caused_by, intent_id,
        data, dimensions, entity_refs, rules_evaluated, tags,
        source_system, source_channel, source_reference,
        idempotency_key
    FROM events
"#;

/// Read the subject entity's current version within `tx`, so the check is
/// atomic with the event insert that follows. 0 if the entity does not
/// exist yet (mirrors `ledgerflow_events::InMemoryEventStore::check_entity_version`).
async fn entity_version(
    tx: &mut Transaction<'_, Postgres>,
    entity_type: &str,
    entity_id: EntityId,
    legal_entity: LegalEntityId,
) -> Result<u64, EventStoreError> {
    let row = sqlx::query(
        "SELECT version FROM entities WHERE entity_type = $1 AND entity_id = $2 AND legal_entity = $3",
    )
    .bind(entity_type)
    .bind(entity_id.as_uuid())
    .bind(legal_entity.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("entity_version", e))?;

    match row {
        Some(row) => {
            let version: i64 = row
                .try_get("version")
                .map_err(|e| EventStoreError::Storage(format!("failed to read version: {e}")))?;
            Ok(version as u64)
        }
        None => Ok(0),
    }
}

fn actor_type_str(t: ActorType) -> &'static str {
    match t {
        ActorType::Human => "human",
        ActorType::Agent => "agent",
        ActorType::System => "system",
        ActorType::External => "external",
        ActorType::Import => "import",
    }
}

fn actor_type_from_str(s: &str) -> Result<ActorType, EventStoreError> {
    match s {
        "human" => Ok(ActorType::Human),
        "agent" => Ok(ActorType::Agent),
        "system" => Ok(ActorType::System),
        "external" => Ok(ActorType::External),
        "import" => Ok(ActorType::Import),
        other => Err(EventStoreError::Storage(format!("unknown actor_type '{other}' in stored row"))),
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> EventStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            EventStoreError::Storage(format!("database error in {operation}: {}", db_err.message()))
        }
        sqlx::Error::PoolClosed => EventStoreError::Storage(format!("connection pool closed in {operation}")),
        sqlx::Error::RowNotFound => EventStoreError::Storage(format!("unexpected row not found in {operation}")),
        other => EventStoreError::Storage(format!("sqlx error in {operation}: {other}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505"))
}

fn row_to_event(row: sqlx::postgres::PgRow) -> Result<StoredEvent, EventStoreError> {
    let row = StoredEventRow::from_row(&row)
        .map_err(|e| EventStoreError::Storage(format!("failed to deserialize event row: {e}")))?;
    row.try_into()
}

#[derive(Debug)]
struct StoredEventRow {
    id: uuid::Uuid,
    sequence: i64,
    event_type: String,
    schema_version: i32,
    occurred_at: DateTime<Utc>,
    recorded_at: DateTime<Utc>,
    effective_date: NaiveDate,
    tenant_id: uuid::Uuid,
    legal_entity: uuid::Uuid,
    actor_type: String,
    actor_id: uuid::Uuid,
    actor_name: String,
    correlation_id: String,
    caused_by: Option<uuid::Uuid>,
    intent_id: Option<uuid::Uuid>,
    data: JsonValue,
    dimensions: JsonValue,
    entity_refs: JsonValue,
    rules_evaluated: JsonValue,
    tags: Vec<String>,
    source_system: Option<String>,
    source_channel: Option<String>,
    source_reference: Option<String>,
    idempotency_key: Option<String>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredEventRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredEventRow {
            id: row.try_get("id")?,
            sequence: row.try_get("sequence")?,
            event_type: row.try_get("type")?,
            schema_version: row.try_get("schema_version")?,
            occurred_at: row.try_get("occurred_at")?,
            recorded_at: row.try_get("recorded_at")?,
            effective_date: row.try_get("effective_date")?,
            tenant_id: row.try_get("tenant_id")?,
            legal_entity: row.try_get("legal_entity")?,
            actor_type: row.try_get("actor_type")?,
            actor_id: row.try_get("actor_id")?,
            actor_name: row.try_get("actor_name")?,
            correlation_id: row.try_get("correlation_id")?,
            caused_by: row.try_get("caused_by")?,
            intent_id: row.try_get("intent_id")?,
            data: row.try_get("data")?,
            dimensions: row.try_get("dimensions")?,
            entity_refs: row.try_get("entity_refs")?,
            rules_evaluated: row.try_get("rules_evaluated")?,
            tags: row.try_get("tags")?,
            source_system: row.try_get("source_system")?,
            source_channel: row.try_get("source_channel")?,
            source_reference: row.try_get("source_reference")?,
            idempotency_key: row.try_get("idempotency_key")?,
        })
    }
}

impl TryFrom<StoredEventRow> for StoredEvent {
    type Error = EventStoreError;

    fn try_from(row: StoredEventRow) -> Result<Self, Self::Error> {
        let entities: Vec<EntityRef> = serde_json::from_value(row.entity_refs)
            .map_err(|e| EventStoreError::Storage(format!("failed to deserialize entity_refs: {e}")))?;
        let rules_evaluated: Vec<RuleTrace> = serde_json::from_value(row.rules_evaluated)
            .map_err(|e| EventStoreError::Storage(format!("failed to deserialize rules_evaluated: {e}")))?;
        let dimensions: HashMap<String, JsonValue> = serde_json::from_value(row.dimensions)
            .map_err(|e| EventStoreError::Storage(format!("failed to deserialize dimensions: {e}")))?;

        Ok(StoredEvent {
            id: EventId::from_uuid(row.id),
            sequence: row.sequence as u64,
            event_type: row.event_type,
            schema_version: row.schema_version as u32,
            occurred_at: row.occurred_at,
            recorded_at: row.recorded_at,
            effective_date: row.effective_date,
            scope: Scope::new(TenantId::from_uuid(row.tenant_id), LegalEntityId::from_uuid(row.legal_entity)),
            actor: Actor::new(actor_type_from_str(&row.actor_type)?, ledgerflow_core::ActorId::from_uuid(row.actor_id), row.actor_name),
            correlation_id: row.correlation_id,
            caused_by: row.caused_by.map(EventId::from_uuid),
            intent_id: row.intent_id.map(IntentId::from_uuid),
            data: row.data,
            dimensions,
            entities,
            rules_evaluated,
            tags: row.tags,
            source: EventSource {
                system: row.source_system,
                channel: row.source_channel,
                reference: row.source_reference,
            },
            idempotency_key: row.idempotency_key,
        })
    }
}

fn require_runtime(op: &str) -> Result<tokio::runtime::Handle, EventStoreError> {
    tokio::runtime::Handle::try_current()
        .map_err(|_| EventStoreError::Storage(format!("PostgresEventStore::{op} requires a tokio runtime")))
}

impl EventStore for PostgresEventStore {
    fn append(
        &self,
        event: NewEvent,
        expected_entity_version: Option<ExpectedVersion>,
    ) -> Result<StoredEvent, EventStoreError> {
        let handle = require_runtime("append")?;
        handle.block_on(self.append_inner(event, expected_entity_version))
    }

    fn read_stream(
        &self,
        after_sequence: Option<u64>,
        limit: Option<u32>,
        event_types: Option<&[String]>,
    ) -> Result<EventPage, EventStoreError> {
        let handle = require_runtime("read_stream")?;
        handle.block_on(self.read_stream_inner(after_sequence, limit, event_types))
    }

    fn read_by_partition(
        &self,
        legal_entity: LegalEntityId,
        after_sequence: Option<u64>,
        limit: Option<u32>,
    ) -> Result<EventPage, EventStoreError> {
        let handle = require_runtime("read_by_partition")?;
        handle.block_on(self.read_by_partition_inner(legal_entity, after_sequence, limit))
    }

    fn get_by_id(&self, id: EventId) -> Option<StoredEvent> {
        let handle = require_runtime("get_by_id").ok()?;
        handle.block_on(self.get_by_id_inner(id))
    }

    fn get_by_intent_id(&self, intent_id: IntentId) -> Option<StoredEvent> {
        let handle = require_runtime("get_by_intent_id").ok()?;
        handle.block_on(self.get_by_intent_id_inner(intent_id))
    }
}
