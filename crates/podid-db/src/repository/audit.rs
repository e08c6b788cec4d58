//! SurrealDB implementation of [`AuditLogRepository`].
//!
//! The table permits create and select only.

use chrono::{DateTime, Utc};
use podid_core::error::PodidResult;
use podid_core::models::audit::{AuditEvent, CreateAuditEvent};
use podid_core::repository::{AuditFilter, AuditLogRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{parse_optional_uuid, parse_uuid};
use crate::error::DbError;

const DEFAULT_LIST_LIMIT: u64 = 100;

#[derive(Debug, SurrealValue)]
struct AuditRowWithId {
    record_id: String,
    event_type: String,
    user_id: Option<String>,
    success: bool,
    reason: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl AuditRowWithId {
    fn try_into_event(self) -> Result<AuditEvent, DbError> {
        Ok(AuditEvent {
            id: parse_uuid("audit_event", &self.record_id)?,
            event_type: self.event_type,
            user_id: parse_optional_uuid("audit_event", self.user_id.as_deref())?,
            success: self.success,
            reason: self.reason,
            metadata: self.metadata,
            created_at: self.created_at,
        })
    }
}

#[derive(Clone)]
pub struct SurrealAuditLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AuditLogRepository for SurrealAuditLogRepository<C> {
    async fn append(&self, input: CreateAuditEvent) -> PodidResult<AuditEvent> {
        let id_str = Uuid::new_v4().to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('audit_event', $id) SET \
                 event_type = $event_type, \
                 user_id = $user_id, \
                 success = $success, \
                 reason = $reason, \
                 metadata = $metadata; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('audit_event', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("event_type", input.event_type))
            .bind(("user_id", input.user_id.map(|u| u.to_string())))
            .bind(("success", input.success))
            .bind(("reason", input.reason))
            .bind(("metadata", input.metadata))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Rejected(e.to_string()))?;

        let rows: Vec<AuditRowWithId> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "audit_event".into(),
            id: id_str,
        })?;
        Ok(row.try_into_event()?)
    }

    async fn list(&self, filter: AuditFilter) -> PodidResult<Vec<AuditEvent>> {
        let mut conditions = Vec::new();
        if filter.event_type.is_some() {
            conditions.push("event_type = $event_type");
        }
        if filter.user_id.is_some() {
            conditions.push("user_id = $user_id");
        }
        if filter.success.is_some() {
            conditions.push("success = $success");
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM audit_event{where_clause} \
             ORDER BY created_at DESC LIMIT $limit"
        );
        let mut result = self
            .db
            .query(query)
            .bind(("event_type", filter.event_type))
            .bind(("user_id", filter.user_id.map(|u| u.to_string())))
            .bind(("success", filter.success))
            .bind(("limit", filter.limit.unwrap_or(DEFAULT_LIST_LIMIT)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AuditRowWithId> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .map(|r| r.try_into_event().map_err(Into::into))
            .collect()
    }
}
