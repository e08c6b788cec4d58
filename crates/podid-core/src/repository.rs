//! Repository and collaborator trait definitions.
//!
//! All operations are async. Implementations are responsible for
//! per-key isolation; the authentication layer holds no shared mutable
//! state of its own.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::PodidResult;
use crate::models::{
    audit::{AuditEvent, CreateAuditEvent},
    credential::PasswordCredential,
    identity::{CreateIdentityLink, IdentityLink},
    reset_token::{CreatePasswordResetToken, PasswordResetToken},
    revocation::RevocationEntry,
    session::Session,
    user::{CreateUser, User},
};

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = PodidResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = PodidResult<User>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = PodidResult<User>> + Send;
    fn get_by_web_id(&self, web_id: &str) -> impl Future<Output = PodidResult<User>> + Send;
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

pub trait SessionRepository: Send + Sync {
    /// Insert a new session. An existing id is rejected.
    fn create(&self, session: &Session) -> impl Future<Output = PodidResult<()>> + Send;
    /// Write the mutable fields (account context, activity, expiry) of
    /// an existing session. Fails with not-found when the session is gone.
    fn update(&self, session: &Session) -> impl Future<Output = PodidResult<()>> + Send;
    fn find_by_id(&self, id: &str) -> impl Future<Output = PodidResult<Session>> + Send;
    fn find_by_user(&self, user_id: Uuid) -> impl Future<Output = PodidResult<Vec<Session>>> + Send;
    fn find_by_account(
        &self,
        account_id: Uuid,
    ) -> impl Future<Output = PodidResult<Vec<Session>>> + Send;
    fn find_by_user_and_account(
        &self,
        user_id: Uuid,
        account_id: Uuid,
    ) -> impl Future<Output = PodidResult<Vec<Session>>> + Send;
    /// Deleting an absent session is not an error.
    fn delete(&self, id: &str) -> impl Future<Output = PodidResult<()>> + Send;
    fn delete_by_user(&self, user_id: Uuid) -> impl Future<Output = PodidResult<u64>> + Send;
    /// Remove every session whose expiry is at or before `now`.
    fn delete_expired(&self, now: DateTime<Utc>) -> impl Future<Output = PodidResult<u64>> + Send;
    fn touch_activity(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> impl Future<Output = PodidResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Password credentials (one row per user)
// ---------------------------------------------------------------------------

pub trait CredentialRepository: Send + Sync {
    fn save(&self, credential: &PasswordCredential) -> impl Future<Output = PodidResult<()>> + Send;
    /// Replace hash and salt of an existing credential.
    fn update(
        &self,
        user_id: Uuid,
        password_hash: &str,
        salt: &str,
    ) -> impl Future<Output = PodidResult<()>> + Send;
    fn find(&self, user_id: Uuid) -> impl Future<Output = PodidResult<PasswordCredential>> + Send;
    fn delete(&self, user_id: Uuid) -> impl Future<Output = PodidResult<()>> + Send;
    fn exists(&self, user_id: Uuid) -> impl Future<Output = PodidResult<bool>> + Send;
}

// ---------------------------------------------------------------------------
// Password reset tokens
// ---------------------------------------------------------------------------

pub trait ResetTokenRepository: Send + Sync {
    fn save(
        &self,
        input: CreatePasswordResetToken,
    ) -> impl Future<Output = PodidResult<PasswordResetToken>> + Send;
    fn find_by_token(
        &self,
        token: &str,
    ) -> impl Future<Output = PodidResult<PasswordResetToken>> + Send;
    fn find_by_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = PodidResult<Vec<PasswordResetToken>>> + Send;
    /// Atomically mark an unused, unexpired token as used and return it as
    /// it was before. Fails with not-found when no such token matches.
    fn consume(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = PodidResult<PasswordResetToken>> + Send;
    fn delete(&self, token: &str) -> impl Future<Output = PodidResult<()>> + Send;
    fn delete_by_user(&self, user_id: Uuid) -> impl Future<Output = PodidResult<u64>> + Send;
    fn delete_expired(&self, now: DateTime<Utc>) -> impl Future<Output = PodidResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// External identity links
// ---------------------------------------------------------------------------

pub trait IdentityLinkRepository: Send + Sync {
    /// Must reject an already-linked `(provider, external_id)` with
    /// `PodidError::AlreadyLinked`, atomically.
    fn link(
        &self,
        input: CreateIdentityLink,
    ) -> impl Future<Output = PodidResult<IdentityLink>> + Send;
    fn find_by_external_id(
        &self,
        provider: &str,
        external_id: &str,
    ) -> impl Future<Output = PodidResult<IdentityLink>> + Send;
    fn get_linked_for_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = PodidResult<Vec<IdentityLink>>> + Send;
    fn unlink(
        &self,
        user_id: Uuid,
        provider: &str,
    ) -> impl Future<Output = PodidResult<()>> + Send;
    fn unlink_all_for_user(&self, user_id: Uuid) -> impl Future<Output = PodidResult<u64>> + Send;
    fn is_linked(
        &self,
        provider: &str,
        external_id: &str,
    ) -> impl Future<Output = PodidResult<bool>> + Send;
    fn get_by_provider(
        &self,
        user_id: Uuid,
        provider: &str,
    ) -> impl Future<Output = PodidResult<IdentityLink>> + Send;
}

// ---------------------------------------------------------------------------
// Token revocation & audit
// ---------------------------------------------------------------------------

pub trait RevocationRepository: Send + Sync {
    fn add(&self, entry: &RevocationEntry) -> impl Future<Output = PodidResult<()>> + Send;
    fn is_revoked(&self, jti: &str) -> impl Future<Output = PodidResult<bool>> + Send;
    fn remove(&self, jti: &str) -> impl Future<Output = PodidResult<()>> + Send;
    fn cleanup_expired(&self, now: DateTime<Utc>)
    -> impl Future<Output = PodidResult<u64>> + Send;
}

/// Query filters for audit events.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub event_type: Option<String>,
    pub user_id: Option<Uuid>,
    pub success: Option<bool>,
    pub limit: Option<u64>,
}

pub trait AuditLogRepository: Send + Sync {
    /// Append a new event. No update or delete operations exist.
    fn append(
        &self,
        input: CreateAuditEvent,
    ) -> impl Future<Output = PodidResult<AuditEvent>> + Send;
    fn list(&self, filter: AuditFilter) -> impl Future<Output = PodidResult<Vec<AuditEvent>>> + Send;
}

// ---------------------------------------------------------------------------
// Outbound notifications
// ---------------------------------------------------------------------------

/// Templated message delivery, used by the password reset flow.
pub trait MessageSender: Send + Sync {
    fn send(
        &self,
        to: &str,
        template: &str,
        data: serde_json::Value,
    ) -> impl Future<Output = PodidResult<()>> + Send;
}
