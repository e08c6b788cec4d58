//! SurrealDB implementation of [`ResetTokenRepository`].

use chrono::{DateTime, Utc};
use podid_core::error::PodidResult;
use podid_core::models::reset_token::{CreatePasswordResetToken, PasswordResetToken};
use podid_core::repository::ResetTokenRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ResetTokenRow {
    token: String,
    user_id: String,
    email: String,
    expires_at: DateTime<Utc>,
    used: bool,
    created_at: DateTime<Utc>,
}

impl ResetTokenRow {
    fn try_into_token(self) -> Result<PasswordResetToken, DbError> {
        Ok(PasswordResetToken {
            user_id: parse_uuid("password_reset", &self.user_id)?,
            token: self.token,
            email: self.email,
            expires_at: self.expires_at,
            used: self.used,
            created_at: self.created_at,
        })
    }
}

#[derive(Clone)]
pub struct SurrealResetTokenRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealResetTokenRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

fn not_found(token: &str) -> DbError {
    DbError::NotFound {
        entity: "password_reset".into(),
        id: token.to_string(),
    }
}

impl<C: Connection> ResetTokenRepository for SurrealResetTokenRepository<C> {
    async fn save(&self, input: CreatePasswordResetToken) -> PodidResult<PasswordResetToken> {
        let token = input.token.clone();

        let result = self
            .db
            .query(
                "CREATE type::record('password_reset', $value) SET \
                 token = $value, \
                 user_id = $user_id, \
                 email = $email, \
                 expires_at = $expires_at, \
                 used = false",
            )
            .bind(("value", input.token))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("email", input.email))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Rejected(e.to_string()))?;

        let rows: Vec<ResetTokenRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| not_found(&token))?;
        Ok(row.try_into_token()?)
    }

    async fn find_by_token(&self, token: &str) -> PodidResult<PasswordResetToken> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('password_reset', $value)")
            .bind(("value", token.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ResetTokenRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| not_found(token))?;
        Ok(row.try_into_token()?)
    }

    async fn find_by_user(&self, user_id: Uuid) -> PodidResult<Vec<PasswordResetToken>> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM password_reset \
                 WHERE user_id = $user_id ORDER BY created_at",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ResetTokenRow> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .map(|r| r.try_into_token().map_err(Into::into))
            .collect()
    }

    async fn consume(&self, token: &str, now: DateTime<Utc>) -> PodidResult<PasswordResetToken> {
        let mut result = self
            .db
            .query(
                "UPDATE type::record('password_reset', $value) SET used = true \
                 WHERE used = false AND expires_at > $now RETURN BEFORE",
            )
            .bind(("value", token.to_string()))
            .bind(("now", now))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Rejected(e.to_string()))?;

        let rows: Vec<ResetTokenRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| not_found(token))?;
        Ok(row.try_into_token()?)
    }

    async fn delete(&self, token: &str) -> PodidResult<()> {
        self.db
            .query("DELETE type::record('password_reset', $value)")
            .bind(("value", token.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Rejected(e.to_string()))?;

        Ok(())
    }

    async fn delete_by_user(&self, user_id: Uuid) -> PodidResult<u64> {
        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM password_reset \
                 WHERE user_id = $user_id GROUP ALL",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        self.db
            .query("DELETE password_reset WHERE user_id = $user_id")
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
                "SELECT count() AS total FROM password_reset \
                 WHERE expires_at <= $now GROUP ALL",
            )
            .bind(("now", now))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        self.db
            .query("DELETE password_reset WHERE expires_at <= $now")
            .bind(("now", now))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Rejected(e.to_string()))?;

        Ok(total)
    }
}
