//! Append-only audit event persistence.
//!
//! No update or delete is exposed for audit rows. `append` takes an open
//! connection rather than the pool so the caller can issue it inside the
//! same transaction as the business mutation it records; the caller commits.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::pool::{AsyncSqliteConnection, AsyncSqlitePool, DieselError};
use super::records::{AuditEventRecord, NewAuditEvent};
use super::{parse_datetime, util::to_diesel_error};
use crate::models::{AuditEvent, EventDraft};
use crate::schema::audit_events;

/// Append one audit event on the given connection.
///
/// Must be called inside an already-open transaction so the event row is
/// durably written together with the mutation it describes.
pub async fn append(
    conn: &mut AsyncSqliteConnection,
    draft: &EventDraft,
) -> Result<AuditEvent, DieselError> {
    let id = uuid::Uuid::new_v4().to_string();
    let timestamp = Utc::now();
    let timestamp_str = timestamp.to_rfc3339();
    let metadata = match &draft.metadata {
        Some(value) => Some(serde_json::to_string(value).map_err(to_diesel_error)?),
        None => None,
    };

    let record = NewAuditEvent {
        id: &id,
        tenant_id: draft.tenant_id.as_deref(),
        timestamp: &timestamp_str,
        request_id: draft.request_id.as_deref(),
        actor: &draft.actor,
        event_type: &draft.event_type,
        entity_type: &draft.entity_type,
        entity_id: &draft.entity_id,
        source: draft.source.as_deref(),
        confidence: draft.confidence,
        notes: draft.notes.as_deref(),
        metadata: metadata.as_deref(),
    };

    diesel::insert_into(audit_events::table)
        .values(&record)
        .execute(conn)
        .await?;

    tracing::info!(
        event_type = %draft.event_type,
        entity_type = %draft.entity_type,
        entity_id = %draft.entity_id,
        actor = %draft.actor,
        "audit event recorded"
    );

    Ok(AuditEvent {
        id,
        tenant_id: draft.tenant_id.clone(),
        timestamp,
        request_id: draft.request_id.clone(),
        actor: draft.actor.clone(),
        event_type: draft.event_type.clone(),
        entity_type: draft.entity_type.clone(),
        entity_id: draft.entity_id.clone(),
        source: draft.source.clone(),
        confidence: draft.confidence,
        notes: draft.notes.clone(),
        metadata: draft.metadata.clone(),
    })
}

fn record_to_event(record: AuditEventRecord) -> AuditEvent {
    AuditEvent {
        timestamp: parse_datetime(&record.timestamp),
        metadata: record
            .metadata
            .as_deref()
            .and_then(|m| serde_json::from_str(m).ok()),
        id: record.id,
        tenant_id: record.tenant_id,
        request_id: record.request_id,
        actor: record.actor,
        event_type: record.event_type,
        entity_type: record.entity_type,
        entity_id: record.entity_id,
        source: record.source,
        confidence: record.confidence,
        notes: record.notes,
    }
}

/// Read access to the audit trail.
#[derive(Clone)]
pub struct AuditRepository {
    pool: AsyncSqlitePool,
}

impl AuditRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// All events referencing an entity, oldest first.
    pub async fn list_for_entity(&self, entity_id: &str) -> Result<Vec<AuditEvent>, DieselError> {
        let mut conn = self.pool.get().await?;

        let records: Vec<AuditEventRecord> = audit_events::table
            .filter(audit_events::entity_id.eq(entity_id))
            .order(audit_events::timestamp.asc())
            .load(&mut conn)
            .await?;

        Ok(records.into_iter().map(record_to_event).collect())
    }

    /// Most recent events across all entities.
    pub async fn recent(&self, limit: u32) -> Result<Vec<AuditEvent>, DieselError> {
        let mut conn = self.pool.get().await?;

        let records: Vec<AuditEventRecord> = audit_events::table
            .order(audit_events::timestamp.desc())
            .limit(limit as i64)
            .load(&mut conn)
            .await?;

        Ok(records.into_iter().map(record_to_event).collect())
    }
}
