//! SurrealDB implementation of [`CredentialRepository`].
//!
//! Each credential is stored under its user's id, so there is at most
//! one per user and replacing a password rewrites that record.

use chrono::{DateTime, Utc};
use podid_core::error::PodidResult;
use podid_core::models::credential::PasswordCredential;
use podid_core::repository::CredentialRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::CountRow;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct CredentialRow {
    password_hash: String,
    salt: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CredentialRow {
    fn into_credential(self, user_id: Uuid) -> PasswordCredential {
        PasswordCredential {
            user_id,
            password_hash: self.password_hash,
            salt: self.salt,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct SurrealCredentialRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealCredentialRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

fn not_found(user_id: Uuid) -> DbError {
    DbError::NotFound {
        entity: "credential".into(),
        id: user_id.to_string(),
    }
}

impl<C: Connection> CredentialRepository for SurrealCredentialRepository<C> {
    async fn save(&self, credential: &PasswordCredential) -> PodidResult<()> {
        self.db
            .query(
                "CREATE type::record('credential', $id) SET \
                 user_id = $id, \
                 password_hash = $password_hash, \
                 salt = $salt, \
                 created_at = $created_at, \
                 updated_at = $updated_at",
            )
            .bind(("id", credential.user_id.to_string()))
            .bind(("password_hash", credential.password_hash.clone()))
            .bind(("salt", credential.salt.clone()))
            .bind(("created_at", credential.created_at))
            .bind(("updated_at", credential.updated_at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Rejected(e.to_string()))?;

        Ok(())
    }

    async fn update(&self, user_id: Uuid, password_hash: &str, salt: &str) -> PodidResult<()> {
        let mut result = self
            .db
            .query(
                "UPDATE type::record('credential', $id) SET \
                 password_hash = $password_hash, \
                 salt = $salt, \
                 updated_at = time::now()",
            )
            .bind(("id", user_id.to_string()))
            .bind(("password_hash", password_hash.to_string()))
            .bind(("salt", salt.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CredentialRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(not_found(user_id).into());
        }
        Ok(())
    }

    async fn find(&self, user_id: Uuid) -> PodidResult<PasswordCredential> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('credential', $id)")
            .bind(("id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CredentialRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| not_found(user_id))?;
        Ok(row.into_credential(user_id))
    }

    async fn delete(&self, user_id: Uuid) -> PodidResult<()> {
        self.db
            .query("DELETE type::record('credential', $id)")
            .bind(("id", user_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Rejected(e.to_string()))?;

        Ok(())
    }

    async fn exists(&self, user_id: Uuid) -> PodidResult<bool> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM credential \
                 WHERE user_id = $id GROUP ALL",
            )
            .bind(("id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }
}
