//! Signed session tokens: issuance, validation, refresh and revocation.
//!
//! Tokens are EdDSA (Ed25519) JWTs. Each carries a unique `jti` that
//! the optional revocation store is keyed by. Every issuance,
//! validation, refresh and revocation is reported to the optional
//! audit sink; audit failures are logged, never propagated.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use podid_core::error::PodidResult;
use podid_core::models::audit::{AuditEvent, CreateAuditEvent};
use podid_core::models::revocation::RevocationEntry;
use podid_core::models::session::Session;
use podid_core::repository::{AuditFilter, AuditLogRepository, RevocationRepository};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;

pub const EVENT_TOKEN_ISSUED: &str = "token_issued";
pub const EVENT_TOKEN_VALIDATED: &str = "token_validated";
pub const EVENT_TOKEN_VALIDATION_FAILED: &str = "token_validation_failed";
pub const EVENT_TOKEN_REFRESHED: &str = "token_refreshed";
pub const EVENT_TOKEN_REVOKED: &str = "token_revoked";
pub const EVENT_TOKENS_REVOKED_FOR_USER: &str = "tokens_revoked_for_user";

/// Claims embedded in every session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// Session ID.
    pub sid: String,
    /// User ID (UUID string).
    pub uid: String,
    /// WebID of the principal.
    pub webid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<String>,
    pub iss: String,
    pub sub: String,
    pub aud: String,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Unique token ID, used for revocation lookups.
    pub jti: String,
}

impl SessionClaims {
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.uid).ok()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::UNIX_EPOCH)
    }
}

/// Placeholder store type for a [`TokenManager`] without revocation.
/// Uninhabited: it can never actually be constructed.
pub enum NoRevocationStore {}

impl RevocationRepository for NoRevocationStore {
    async fn add(&self, _entry: &RevocationEntry) -> PodidResult<()> {
        match *self {}
    }
    async fn is_revoked(&self, _jti: &str) -> PodidResult<bool> {
        match *self {}
    }
    async fn remove(&self, _jti: &str) -> PodidResult<()> {
        match *self {}
    }
    async fn cleanup_expired(&self, _now: DateTime<Utc>) -> PodidResult<u64> {
        match *self {}
    }
}

/// Placeholder sink type for a [`TokenManager`] without auditing.
pub enum NoAuditSink {}

impl AuditLogRepository for NoAuditSink {
    async fn append(&self, _input: CreateAuditEvent) -> PodidResult<AuditEvent> {
        match *self {}
    }
    async fn list(&self, _filter: AuditFilter) -> PodidResult<Vec<AuditEvent>> {
        match *self {}
    }
}

/// Issues and checks signed session tokens.
pub struct TokenManager<R = NoRevocationStore, A = NoAuditSink> {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    lifetime: Duration,
    refresh_threshold: Duration,
    revocations: Option<R>,
    audit: Option<A>,
}

impl TokenManager {
    /// Build a manager from the configured Ed25519 PEM key pair, with
    /// neither a revocation store nor an audit sink.
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let encoding_key = EncodingKey::from_ed_pem(config.jwt_private_key_pem.as_bytes())
            .map_err(|e| AuthError::Crypto(format!("bad private key: {e}")))?;
        let decoding_key = DecodingKey::from_ed_pem(config.jwt_public_key_pem.as_bytes())
            .map_err(|e| AuthError::Crypto(format!("bad public key: {e}")))?;

        Ok(Self {
            encoding_key,
            decoding_key,
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            lifetime: Duration::seconds(config.token_lifetime_secs as i64),
            refresh_threshold: Duration::seconds(config.token_refresh_threshold_secs as i64),
            revocations: None,
            audit: None,
        })
    }
}

impl<R, A> TokenManager<R, A> {
    pub fn with_revocation_store<R2: RevocationRepository>(self, store: R2) -> TokenManager<R2, A> {
        TokenManager {
            encoding_key: self.encoding_key,
            decoding_key: self.decoding_key,
            issuer: self.issuer,
            audience: self.audience,
            lifetime: self.lifetime,
            refresh_threshold: self.refresh_threshold,
            revocations: Some(store),
            audit: self.audit,
        }
    }

    pub fn with_audit_sink<A2: AuditLogRepository>(self, sink: A2) -> TokenManager<R, A2> {
        TokenManager {
            encoding_key: self.encoding_key,
            decoding_key: self.decoding_key,
            issuer: self.issuer,
            audience: self.audience,
            lifetime: self.lifetime,
            refresh_threshold: self.refresh_threshold,
            revocations: self.revocations,
            audit: Some(sink),
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn refresh_threshold(&self) -> Duration {
        self.refresh_threshold
    }
}

impl<R: RevocationRepository, A: AuditLogRepository> TokenManager<R, A> {
    /// Issue a token bound to `session`.
    pub async fn issue(&self, session: &Session) -> Result<String, AuthError> {
        let claims = SessionClaims {
            sid: session.id.clone(),
            uid: session.user_id.to_string(),
            webid: session.web_id.clone(),
            account_id: session.account.map(|a| a.account_id.to_string()),
            role_id: session.account.map(|a| a.role_id.to_string()),
            iss: self.issuer.clone(),
            sub: session.user_id.to_string(),
            aud: self.audience.clone(),
            iat: 0,
            exp: 0,
            jti: String::new(),
        };
        let (token, claims) = self.sign(claims)?;

        debug!(session_id = %session.id, jti = %claims.jti, "Issued session token");
        self.audit(CreateAuditEvent::success(EVENT_TOKEN_ISSUED, Some(session.user_id)))
            .await;

        Ok(token)
    }

    /// Verify signature, algorithm, expiry, required claims and
    /// revocation status.
    pub async fn validate(&self, token: &str) -> Result<SessionClaims, AuthError> {
        match self.check(token).await {
            Ok(claims) => {
                self.audit(CreateAuditEvent::success(
                    EVENT_TOKEN_VALIDATED,
                    claims.user_id(),
                ))
                .await;
                Ok(claims)
            }
            Err(err) => {
                let user_id = self.decode(token, false).ok().and_then(|c| c.user_id());
                self.audit(CreateAuditEvent::failure(
                    EVENT_TOKEN_VALIDATION_FAILED,
                    user_id,
                    err.to_string(),
                ))
                .await;
                Err(err)
            }
        }
    }

    /// Mint a replacement token with the same claims and a fresh expiry.
    ///
    /// Fails with [`AuthError::RefreshNotDue`] while the remaining
    /// lifetime exceeds the refresh threshold.
    pub async fn refresh(&self, token: &str) -> Result<String, AuthError> {
        let claims = self.validate(token).await?;

        let remaining = claims.expires_at() - Utc::now();
        if remaining > self.refresh_threshold {
            return Err(AuthError::RefreshNotDue {
                remaining_secs: remaining.num_seconds(),
            });
        }

        let user_id = claims.user_id();
        let (token, refreshed) = self.sign(claims)?;

        debug!(session_id = %refreshed.sid, jti = %refreshed.jti, "Refreshed session token");
        self.audit(CreateAuditEvent::success(EVENT_TOKEN_REFRESHED, user_id))
            .await;

        Ok(token)
    }

    /// Deny-list a token until its own expiry.
    pub async fn revoke(&self, token: &str, reason: &str) -> Result<(), AuthError> {
        let store = self
            .revocations
            .as_ref()
            .ok_or(AuthError::RevocationUnavailable)?;

        let claims = self.decode(token, false)?;
        let entry = RevocationEntry {
            jti: claims.jti.clone(),
            reason: reason.to_string(),
            revoked_at: Utc::now(),
            expires_at: claims.expires_at(),
        };
        store.add(&entry).await?;

        info!(jti = %claims.jti, reason, "Revoked session token");
        self.audit(
            CreateAuditEvent::success(EVENT_TOKEN_REVOKED, claims.user_id()).with_reason(reason),
        )
        .await;

        Ok(())
    }

    /// Record the intent to revoke every token of a user.
    ///
    /// Issued tokens are not tracked per user, so this only emits the
    /// audit event; the session layer makes the tokens moot by deleting
    /// the sessions they are bound to.
    pub async fn revoke_all_for_user(&self, user_id: Uuid, reason: &str) -> Result<(), AuthError> {
        info!(%user_id, reason, "Revoking all tokens for user");
        self.audit(
            CreateAuditEvent::success(EVENT_TOKENS_REVOKED_FOR_USER, Some(user_id))
                .with_reason(reason),
        )
        .await;
        Ok(())
    }

    /// Drop revocation entries whose tokens would have expired anyway.
    pub async fn cleanup_expired_revocations(&self) -> Result<u64, AuthError> {
        let Some(store) = self.revocations.as_ref() else {
            return Ok(0);
        };
        let removed = store.cleanup_expired(Utc::now()).await?;
        if removed > 0 {
            info!(removed, "Purged expired token revocations");
        }
        Ok(removed)
    }

    async fn check(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let claims = self.decode(token, true)?;

        if claims.sid.is_empty() || claims.uid.is_empty() || claims.webid.is_empty() {
            return Err(AuthError::TokenInvalid(
                "missing session, user or WebID claim".into(),
            ));
        }

        if let Some(store) = self.revocations.as_ref() {
            if store.is_revoked(&claims.jti).await? {
                return Err(AuthError::TokenRevoked);
            }
        }

        Ok(claims)
    }

    async fn audit(&self, event: CreateAuditEvent) {
        if let Some(sink) = self.audit.as_ref() {
            let event_type = event.event_type.clone();
            if let Err(e) = sink.append(event).await {
                warn!(event_type = %event_type, error = %e, "Failed to append audit event");
            }
        }
    }
}

impl<R, A> TokenManager<R, A> {
    /// Verify a token's signature and read its claims, ignoring expiry
    /// and revocation.
    pub fn inspect(&self, token: &str) -> Result<SessionClaims, AuthError> {
        self.decode(token, false)
    }

    /// Sign `claims` with a fresh `jti`, `iat` and `exp`.
    fn sign(&self, mut claims: SessionClaims) -> Result<(String, SessionClaims), AuthError> {
        let now = Utc::now();
        claims.iat = now.timestamp();
        claims.exp = (now + self.lifetime).timestamp();
        claims.jti = Uuid::new_v4().to_string();

        let header = Header::new(Algorithm::EdDSA);
        let token = jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))?;
        Ok((token, claims))
    }

    /// Verify signature, algorithm, issuer and audience; expiry only
    /// when `check_expiry` is set.
    fn decode(&self, token: &str, check_expiry: bool) -> Result<SessionClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss", "aud"]);
        validation.leeway = 0;
        validation.validate_exp = check_expiry;

        jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid(e.to_string()),
            })
    }
}

/// SHA-256 hash of a raw token value, hex-encoded.
pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}
