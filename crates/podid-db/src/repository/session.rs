//! SurrealDB implementation of [`SessionRepository`].
//!
//! Sessions are keyed by their opaque id. The account context is
//! stored as two nullable columns and reassembled on read; a row with
//! only one of them set is reported as malformed.

use chrono::{DateTime, Utc};
use podid_core::error::PodidResult;
use podid_core::models::session::{AccountContext, Session};
use podid_core::repository::SessionRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_optional_uuid, parse_uuid};
use crate::error::DbError;

const SELECT_SESSIONS: &str = "SELECT meta::id(id) AS record_id, * FROM session";

#[derive(Debug, SurrealValue)]
struct SessionRowWithId {
    record_id: String,
    user_id: String,
    web_id: String,
    account_id: Option<String>,
    role_id: Option<String>,
    token_hash: String,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SessionRowWithId {
    fn try_into_session(self) -> Result<Session, DbError> {
        let account = AccountContext::from_parts(
            parse_optional_uuid("session", self.account_id.as_deref())?,
            parse_optional_uuid("session", self.role_id.as_deref())?,
        )
        .map_err(|e| DbError::Malformed {
            entity: "session",
            detail: e.to_string(),
        })?;

        Ok(Session {
            id: self.record_id,
            user_id: parse_uuid("session", &self.user_id)?,
            web_id: self.web_id,
            account,
            token_hash: self.token_hash,
            created_at: self.created_at,
            last_activity: self.last_activity,
            expires_at: self.expires_at,
        })
    }
}

fn into_sessions(rows: Vec<SessionRowWithId>) -> PodidResult<Vec<Session>> {
    rows.into_iter()
        .map(|r| r.try_into_session().map_err(Into::into))
        .collect()
}

fn account_columns(session: &Session) -> (Option<String>, Option<String>) {
    match session.account {
        Some(ctx) => (
            Some(ctx.account_id.to_string()),
            Some(ctx.role_id.to_string()),
        ),
        None => (None, None),
    }
}

#[derive(Clone)]
pub struct SurrealSessionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSessionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> SessionRepository for SurrealSessionRepository<C> {
    async fn create(&self, session: &Session) -> PodidResult<()> {
        let (account_id, role_id) = account_columns(session);

        self.db
            .query(
                "CREATE type::record('session', $id) SET \
                 user_id = $user_id, \
                 web_id = $web_id, \
                 account_id = $account_id, \
                 role_id = $role_id, \
                 token_hash = $token_hash, \
                 created_at = $created_at, \
                 last_activity = $last_activity, \
                 expires_at = $expires_at",
            )
            .bind(("id", session.id.clone()))
            .bind(("user_id", session.user_id.to_string()))
            .bind(("web_id", session.web_id.clone()))
            .bind(("account_id", account_id))
            .bind(("role_id", role_id))
            .bind(("token_hash", session.token_hash.clone()))
            .bind(("created_at", session.created_at))
            .bind(("last_activity", session.last_activity))
            .bind(("expires_at", session.expires_at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Rejected(e.to_string()))?;

        Ok(())
    }

    async fn update(&self, session: &Session) -> PodidResult<()> {
        let (account_id, role_id) = account_columns(session);

        // UPDATE on a missing record matches nothing, so a session deleted
        // concurrently stays deleted.
        let mut result = self
            .db
            .query(
                "UPDATE type::record('session', $id) SET \
                 account_id = $account_id, \
                 role_id = $role_id, \
                 last_activity = $last_activity, \
                 expires_at = $expires_at",
            )
            .bind(("id", session.id.clone()))
            .bind(("account_id", account_id))
            .bind(("role_id", role_id))
            .bind(("last_activity", session.last_activity))
            .bind(("expires_at", session.expires_at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Rejected(e.to_string()))?;

        let updated: Vec<surrealdb_types::Value> = result.take(0).map_err(DbError::from)?;
        if updated.is_empty() {
            return Err(DbError::NotFound {
                entity: "session".into(),
                id: session.id.clone(),
            }
            .into());
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> PodidResult<Session> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('session', $id)",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "session".into(),
            id: id.to_string(),
        })?;

        Ok(row.try_into_session()?)
    }

    async fn find_by_user(&self, user_id: Uuid) -> PodidResult<Vec<Session>> {
        let mut result = self
            .db
            .query(format!(
                "{SELECT_SESSIONS} WHERE user_id = $user_id ORDER BY created_at"
            ))
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRowWithId> = result.take(0).map_err(DbError::from)?;
        into_sessions(rows)
    }

    async fn find_by_account(&self, account_id: Uuid) -> PodidResult<Vec<Session>> {
        let mut result = self
            .db
            .query(format!(
                "{SELECT_SESSIONS} WHERE account_id = $account_id ORDER BY created_at"
            ))
            .bind(("account_id", account_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRowWithId> = result.take(0).map_err(DbError::from)?;
        into_sessions(rows)
    }

    async fn find_by_user_and_account(
        &self,
        user_id: Uuid,
        account_id: Uuid,
    ) -> PodidResult<Vec<Session>> {
        let mut result = self
            .db
            .query(format!(
                "{SELECT_SESSIONS} \
                 WHERE user_id = $user_id AND account_id = $account_id \
                 ORDER BY created_at"
            ))
            .bind(("user_id", user_id.to_string()))
            .bind(("account_id", account_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRowWithId> = result.take(0).map_err(DbError::from)?;
        into_sessions(rows)
    }

    async fn delete(&self, id: &str) -> PodidResult<()> {
        self.db
            .query("DELETE type::record('session', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Rejected(e.to_string()))?;

        Ok(())
    }

    async fn delete_by_user(&self, user_id: Uuid) -> PodidResult<u64> {
        // Count first, then delete.
        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM session \
                 WHERE user_id = $user_id GROUP ALL",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        self.db
            .query("DELETE session WHERE user_id = $user_id")
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Rejected(e.to_string()))?;

        Ok(total)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> PodidResult<u64> {
        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM session \
                 WHERE expires_at <= $now GROUP ALL",
            )
            .bind(("now", now))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        self.db
            .query("DELETE session WHERE expires_at <= $now")
            .bind(("now", now))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Rejected(e.to_string()))?;

        Ok(total)
    }

    async fn touch_activity(&self, id: &str, at: DateTime<Utc>) -> PodidResult<()> {
        let mut result = self
            .db
            .query(
                "UPDATE type::record('session', $id) SET last_activity = $at",
            )
            .bind(("id", id.to_string()))
            .bind(("at", at))
            .await
            .map_err(DbError::from)?;

        let touched: Vec<surrealdb_types::Value> = result.take(0).map_err(DbError::from)?;
        if touched.is_empty() {
            return Err(DbError::NotFound {
                entity: "session".into(),
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }
}
