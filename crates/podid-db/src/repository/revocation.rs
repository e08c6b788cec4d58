//! SurrealDB implementation of [`RevocationRepository`], keyed by `jti`.

use chrono::{DateTime, Utc};
use podid_core::error::PodidResult;
use podid_core::models::revocation::RevocationEntry;
use podid_core::repository::RevocationRepository;
use surrealdb::{Connection, Surreal};

use super::CountRow;
use crate::error::DbError;

#[derive(Clone)]
pub struct SurrealRevocationRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRevocationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> RevocationRepository for SurrealRevocationRepository<C> {
    /// Revoking an already revoked `jti` overwrites the entry.
    async fn add(&self, entry: &RevocationEntry) -> PodidResult<()> {
        self.db
            .query(
                "UPSERT type::record('token_revocation', $jti) SET \
                 reason = $reason, \
                 revoked_at = $revoked_at, \
                 expires_at = $expires_at",
            )
            .bind(("jti", entry.jti.clone()))
            .bind(("reason", entry.reason.clone()))
            .bind(("revoked_at", entry.revoked_at))
            .bind(("expires_at", entry.expires_at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Rejected(e.to_string()))?;

        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> PodidResult<bool> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('token_revocation', $jti)")
            .bind(("jti", jti.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<surrealdb_types::Value> = result.take(0).map_err(DbError::from)?;
        Ok(!rows.is_empty())
    }

    async fn remove(&self, jti: &str) -> PodidResult<()> {
        self.db
            .query("DELETE type::record('token_revocation', $jti)")
            .bind(("jti", jti.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Rejected(e.to_string()))?;

        Ok(())
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> PodidResult<u64> {
        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM token_revocation \
                 WHERE expires_at <= $now GROUP ALL",
            )
            .bind(("now", now))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        self.db
            .query("DELETE token_revocation WHERE expires_at <= $now")
            .bind(("now", now))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Rejected(e.to_string()))?;

        Ok(total)
    }
}
