//! Audit event domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub event_type: String,
    pub user_id: Option<Uuid>,
    pub success: bool,
    pub reason: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditEvent {
    pub event_type: String,
    pub user_id: Option<Uuid>,
    pub success: bool,
    pub reason: Option<String>,
    pub metadata: serde_json::Value,
}

impl CreateAuditEvent {
    pub fn success(event_type: &str, user_id: Option<Uuid>) -> Self {
        Self {
            event_type: event_type.into(),
            user_id,
            success: true,
            reason: None,
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn failure(event_type: &str, user_id: Option<Uuid>, reason: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            user_id,
            success: false,
            reason: Some(reason.into()),
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
