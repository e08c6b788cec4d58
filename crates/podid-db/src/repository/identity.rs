//! SurrealDB implementation of [`IdentityLinkRepository`].
//!
//! `(provider, external_id)` uniqueness is enforced by a UNIQUE index,
//! so two concurrent `link` calls for the same external identity cannot
//! both succeed.

use chrono::{DateTime, Utc};
use podid_core::error::{PodidError, PodidResult};
use podid_core::models::identity::{CreateIdentityLink, IdentityLink};
use podid_core::repository::IdentityLinkRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use super::{CountRow, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct IdentityLinkRow {
    user_id: String,
    provider: String,
    external_id: String,
    created_at: DateTime<Utc>,
}

impl IdentityLinkRow {
    fn try_into_link(self) -> Result<IdentityLink, DbError> {
        Ok(IdentityLink {
            user_id: parse_uuid("identity_link", &self.user_id)?,
            provider: self.provider,
            external_id: self.external_id,
            created_at: self.created_at,
        })
    }
}

#[derive(Clone)]
pub struct SurrealIdentityLinkRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealIdentityLinkRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> IdentityLinkRepository for SurrealIdentityLinkRepository<C> {
    async fn link(&self, input: CreateIdentityLink) -> PodidResult<IdentityLink> {
        let id = Uuid::new_v4().to_string();

        let response = self
            .db
            .query(
                "CREATE type::record('identity_link', $id) SET \
                 user_id = $user_id, \
                 provider = $provider, \
                 external_id = $external_id",
            )
            .bind(("id", id.clone()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("provider", input.provider.clone()))
            .bind(("external_id", input.external_id.clone()))
            .await
            .map_err(DbError::from)
            .and_then(|r| r.check().map_err(|e| DbError::Rejected(e.to_string())));

        let mut result = match response {
            Ok(result) => result,
            Err(err) if err.is_conflict() => {
                debug!(provider = %input.provider, "External identity already linked");
                return Err(PodidError::AlreadyLinked {
                    provider: input.provider,
                    external_id: input.external_id,
                });
            }
            Err(err) => return Err(err.into()),
        };

        let rows: Vec<IdentityLinkRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "identity_link".into(),
            id,
        })?;
        Ok(row.try_into_link()?)
    }

    async fn find_by_external_id(
        &self,
        provider: &str,
        external_id: &str,
    ) -> PodidResult<IdentityLink> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM identity_link \
                 WHERE provider = $provider AND external_id = $external_id",
            )
            .bind(("provider", provider.to_string()))
            .bind(("external_id", external_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<IdentityLinkRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "identity_link".into(),
            id: format!("{provider}/{external_id}"),
        })?;
        Ok(row.try_into_link()?)
    }

    async fn get_linked_for_user(&self, user_id: Uuid) -> PodidResult<Vec<IdentityLink>> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM identity_link \
                 WHERE user_id = $user_id ORDER BY provider",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<IdentityLinkRow> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .map(|r| r.try_into_link().map_err(Into::into))
            .collect()
    }

    async fn unlink(&self, user_id: Uuid, provider: &str) -> PodidResult<()> {
        self.db
            .query(
                "DELETE identity_link \
                 WHERE user_id = $user_id AND provider = $provider",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("provider", provider.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Rejected(e.to_string()))?;

        Ok(())
    }

    async fn unlink_all_for_user(&self, user_id: Uuid) -> PodidResult<u64> {
        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM identity_link \
                 WHERE user_id = $user_id GROUP ALL",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        self.db
            .query("DELETE identity_link WHERE user_id = $user_id")
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Rejected(e.to_string()))?;

        Ok(total)
    }

    async fn is_linked(&self, provider: &str, external_id: &str) -> PodidResult<bool> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM identity_link \
                 WHERE provider = $provider AND external_id = $external_id \
                 GROUP ALL",
            )
            .bind(("provider", provider.to_string()))
            .bind(("external_id", external_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }

    async fn get_by_provider(&self, user_id: Uuid, provider: &str) -> PodidResult<IdentityLink> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM identity_link \
                 WHERE user_id = $user_id AND provider = $provider LIMIT 1",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("provider", provider.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<IdentityLinkRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "identity_link".into(),
            id: format!("{user_id}/{provider}"),
        })?;
        Ok(row.try_into_link()?)
    }
}
