//! Session lifecycle: create, validate, refresh, invalidate and sweep.
//!
//! The session record is the source of truth; a signed token is only a
//! snapshot of it. Deleting a session makes every token bound to it
//! unusable through [`SessionManager::resume`], whether or not the token
//! itself was revoked.

use chrono::{Duration, Utc};
use podid_core::error::{PodidError, PodidResult};
use podid_core::models::session::{AccountContext, Session};
use podid_core::repository::{AuditLogRepository, RevocationRepository, SessionRepository};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password::generate_secure_token;
use crate::token::{NoAuditSink, NoRevocationStore, SessionClaims, TokenManager, hash_token};

/// Result of presenting a bearer token.
#[derive(Debug)]
pub struct ResumedSession {
    pub session: Session,
    pub claims: SessionClaims,
    /// Replacement token when the session was close enough to expiry to
    /// be extended. The caller should swap it in for the presented one.
    pub refreshed_token: Option<String>,
}

/// Session lifecycle service.
///
/// Generic over the session store and the token manager's optional
/// revocation store and audit sink.
pub struct SessionManager<S, R = NoRevocationStore, A = NoAuditSink> {
    repo: S,
    tokens: TokenManager<R, A>,
    lifetime: Duration,
    refresh_threshold: Duration,
    token_bytes: usize,
}

impl<S, R, A> SessionManager<S, R, A>
where
    S: SessionRepository,
    R: RevocationRepository,
    A: AuditLogRepository,
{
    pub fn new(repo: S, tokens: TokenManager<R, A>, config: &AuthConfig) -> Self {
        Self {
            repo,
            tokens,
            lifetime: Duration::seconds(config.session_lifetime_secs as i64),
            refresh_threshold: Duration::seconds(config.session_refresh_threshold_secs as i64),
            token_bytes: config.token_bytes(),
        }
    }

    pub fn tokens(&self) -> &TokenManager<R, A> {
        &self.tokens
    }

    pub fn repository(&self) -> &S {
        &self.repo
    }

    /// Persist a new session and issue a token bound to it.
    ///
    /// If issuance fails the session is deleted again before the error
    /// is returned.
    pub async fn create(&self, user_id: Uuid, web_id: &str) -> PodidResult<(Session, String)> {
        if user_id.is_nil() || web_id.is_empty() {
            return Err(PodidError::validation(
                "session requires a user id and a WebID",
            ));
        }

        let now = Utc::now();
        let session = Session {
            id: generate_secure_token(self.token_bytes),
            user_id,
            web_id: web_id.to_string(),
            account: None,
            token_hash: hash_token(&generate_secure_token(self.token_bytes)),
            created_at: now,
            last_activity: now,
            expires_at: now + self.lifetime,
        };
        self.repo.create(&session).await?;

        let token = match self.tokens.issue(&session).await {
            Ok(token) => token,
            Err(err) => {
                if let Err(e) = self.repo.delete(&session.id).await {
                    warn!(
                        session_id = %session.id,
                        error = %e,
                        "Failed to remove session after token issuance failure"
                    );
                }
                return Err(PodidError::from(err).context("issue session token"));
            }
        };

        info!(session_id = %session.id, %user_id, "Session created");
        Ok((session, token))
    }

    /// Load a session, deleting it if it is expired or incomplete, and
    /// record activity.
    pub async fn validate(&self, session_id: &str) -> PodidResult<Session> {
        let mut session = self.repo.find_by_id(session_id).await?;
        let now = Utc::now();

        if !session.is_valid_at(now) {
            if let Err(e) = self.repo.delete(session_id).await {
                warn!(session_id, error = %e, "Failed to delete invalid session");
            }
            debug!(session_id, "Session expired or incomplete");
            return Err(PodidError::expired("session"));
        }

        // A failed touch does not invalidate the session for this call.
        if let Err(e) = self.repo.touch_activity(session_id, now).await {
            warn!(session_id, error = %e, "Failed to record session activity");
        }
        session.last_activity = now;

        Ok(session)
    }

    /// Issue a fresh token, extending the session first when it is
    /// within the refresh threshold of expiring. A session deleted in the
    /// meantime is reported as not found and is never recreated.
    pub async fn refresh(&self, session_id: &str) -> PodidResult<(Session, String)> {
        let mut session = self.validate(session_id).await?;
        let now = Utc::now();

        if session.time_until_expiry(now) <= self.refresh_threshold {
            session.expires_at = now + self.lifetime;
            session.last_activity = now;
            self.repo.update(&session).await?;
            info!(session_id, expires_at = %session.expires_at, "Session extended");
        }

        let token = self.tokens.issue(&session).await?;
        Ok((session, token))
    }

    /// Delete one session. Absent sessions are not an error.
    pub async fn invalidate(&self, session_id: &str) -> PodidResult<()> {
        self.repo.delete(session_id).await?;
        debug!(session_id, "Session invalidated");
        Ok(())
    }

    pub async fn invalidate_all_for_user(&self, user_id: Uuid) -> PodidResult<u64> {
        let removed = self.repo.delete_by_user(user_id).await?;
        info!(%user_id, removed, "Invalidated all sessions for user");
        Ok(removed)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> PodidResult<Vec<Session>> {
        self.repo.find_by_user(user_id).await
    }

    pub async fn set_account_context(
        &self,
        session_id: &str,
        account_id: Uuid,
        role_id: Uuid,
    ) -> PodidResult<Session> {
        let mut session = self.validate(session_id).await?;
        session.account = Some(AccountContext {
            account_id,
            role_id,
        });
        self.repo.update(&session).await?;
        Ok(session)
    }

    pub async fn clear_account_context(&self, session_id: &str) -> PodidResult<Session> {
        let mut session = self.validate(session_id).await?;
        session.account = None;
        self.repo.update(&session).await?;
        Ok(session)
    }

    /// Remove every session whose expiry has passed.
    pub async fn cleanup_expired(&self) -> PodidResult<u64> {
        let removed = self.repo.delete_expired(Utc::now()).await?;
        if removed > 0 {
            info!(removed, "Purged expired sessions");
        }
        Ok(removed)
    }

    /// Authenticate a bearer token against its backing session,
    /// extending the session when it is close to expiry.
    pub async fn resume(&self, token: &str) -> PodidResult<ResumedSession> {
        let claims = self.tokens.validate(token).await?;
        let session = self.validate(&claims.sid).await?;

        if claims.user_id() != Some(session.user_id) || claims.webid != session.web_id {
            return Err(AuthError::TokenInvalid("token does not match its session".into()).into());
        }

        if session.time_until_expiry(Utc::now()) <= self.refresh_threshold {
            let (session, refreshed) = self.refresh(&session.id).await?;
            return Ok(ResumedSession {
                session,
                claims,
                refreshed_token: Some(refreshed),
            });
        }

        Ok(ResumedSession {
            session,
            claims,
            refreshed_token: None,
        })
    }

    /// Revoke the presented token (when a revocation store is
    /// configured) and delete its session.
    pub async fn logout(&self, token: &str) -> PodidResult<()> {
        let claims = self.tokens.inspect(token)?;
        match self.tokens.revoke(token, "logout").await {
            Ok(()) | Err(AuthError::RevocationUnavailable) => {}
            Err(e) => return Err(e.into()),
        }
        self.invalidate(&claims.sid).await
    }

    /// Emit the bulk revocation audit event and delete every session of
    /// the user, which leaves all their outstanding tokens unusable.
    pub async fn revoke_all_for_user(&self, user_id: Uuid, reason: &str) -> PodidResult<u64> {
        self.tokens.revoke_all_for_user(user_id, reason).await?;
        self.invalidate_all_for_user(user_id).await
    }
}
