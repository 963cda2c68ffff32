//! Audit trail rows - the compliance log of every state change.
//!
//! Rows are append-only: nothing in the crate exposes an update or delete,
//! and entities are referenced by bare id so the trail survives entity
//! deletion. Every state-changing operation writes its event in the same
//! transaction as the mutation it describes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub tenant_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub request_id: Option<String>,
    pub actor: String,
    /// Action label, conventionally `ENTITY_VERB` (e.g. INVOICE_UPLOADED).
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    /// Origin of the data change: "manual", "ocr", "llm", ...
    pub source: Option<String>,
    /// Extraction confidence 0-1, where applicable.
    pub confidence: Option<f64>,
    pub notes: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// An audit event waiting to be appended.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub tenant_id: Option<String>,
    pub request_id: Option<String>,
    pub actor: String,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub source: Option<String>,
    pub confidence: Option<f64>,
    pub notes: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl EventDraft {
    /// New draft with actor "system" and no optional context.
    pub fn new(
        event_type: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: None,
            request_id: None,
            actor: "system".to_string(),
            event_type: event_type.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            source: None,
            confidence: None,
            notes: None,
            metadata: None,
        }
    }

    pub fn tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_defaults() {
        let draft = EventDraft::new("INVOICE_UPLOADED", "invoice", "abc");
        assert_eq!(draft.actor, "system");
        assert!(draft.tenant_id.is_none());
        assert!(draft.confidence.is_none());
    }
}
