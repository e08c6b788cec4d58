//! Database-specific error types and conversions.

use podid_core::error::PodidError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    /// A statement was rejected by the database (constraint, assertion).
    #[error("Query rejected: {0}")]
    Rejected(String),

    /// A stored row could not be mapped back to a domain model.
    #[error("Malformed {entity} record: {detail}")]
    Malformed { entity: &'static str, detail: String },

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

impl DbError {
    /// Unique index or record-id collision.
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Surreal(_) | Self::Rejected(_) => {
                let msg = self.to_string();
                msg.contains("already contains") || msg.contains("already exists")
            }
            _ => false,
        }
    }
}

impl From<DbError> for PodidError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => PodidError::NotFound { entity, id },
            other => PodidError::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use podid_core::ErrorKind;

    use super::*;

    #[test]
    fn not_found_keeps_its_kind() {
        let err: PodidError = DbError::NotFound {
            entity: "session".into(),
            id: "abc".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn index_violation_is_a_conflict() {
        let err = DbError::Rejected(
            "Database index `idx_identity_external` already contains ['github', '42']".into(),
        );
        assert!(err.is_conflict());
        assert!(!DbError::Rejected("Found NONE for field `email`".into()).is_conflict());
    }
}
