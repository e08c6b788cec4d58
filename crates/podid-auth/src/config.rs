//! Authentication configuration.

use crate::oauth::OAuthProviderConfig;
use crate::password::PasswordPolicy;

/// Default secure token length in bytes.
pub const DEFAULT_SECURE_TOKEN_BYTES: usize = 32;

/// Configuration for the authentication core.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// PEM-encoded Ed25519 private key for session token signing.
    pub jwt_private_key_pem: String,
    /// PEM-encoded Ed25519 public key for session token verification.
    pub jwt_public_key_pem: String,
    /// Token issuer (`iss` claim).
    pub jwt_issuer: String,
    /// Token audience (`aud` claim).
    pub jwt_audience: String,
    /// Signed token lifetime in seconds (default: 86_400 = 24 hours).
    pub token_lifetime_secs: u64,
    /// A token may only be refreshed once its remaining lifetime is at
    /// or below this many seconds (default: 3600).
    pub token_refresh_threshold_secs: u64,
    /// Session lifetime in seconds (default: 86_400 = 24 hours).
    pub session_lifetime_secs: u64,
    /// Sessions are extended once their remaining lifetime is at or
    /// below this many seconds (default: 3600).
    pub session_refresh_threshold_secs: u64,
    /// Interval between background cleanup sweeps (default: 3600).
    pub cleanup_interval_secs: u64,
    /// Password reset token lifetime in seconds (default: 3600).
    pub reset_token_lifetime_secs: u64,
    pub password_policy: PasswordPolicy,
    /// Random bytes per generated id/token. `0` falls back to 32.
    pub secure_token_bytes: usize,
    /// Upper bound for each WebID-OIDC network fetch (default: 10).
    pub oidc_discovery_timeout_secs: u64,
    /// How long a discovered OIDC configuration is reused (default: 3600).
    pub oidc_cache_ttl_secs: u64,
    /// Base URL under which locally registered users get a WebID.
    pub web_id_base_url: String,
    pub oauth_providers: Vec<OAuthProviderConfig>,
}

impl AuthConfig {
    /// Effective random byte length, substituting the default for `0`.
    pub fn token_bytes(&self) -> usize {
        if self.secure_token_bytes == 0 {
            DEFAULT_SECURE_TOKEN_BYTES
        } else {
            self.secure_token_bytes
        }
    }

    /// WebID minted for a locally registered user.
    pub fn web_id_for(&self, user_id: uuid::Uuid) -> String {
        format!(
            "{}/{user_id}/profile/card#me",
            self.web_id_base_url.trim_end_matches('/')
        )
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_private_key_pem: String::new(),
            jwt_public_key_pem: String::new(),
            jwt_issuer: "podid".into(),
            jwt_audience: "podid".into(),
            token_lifetime_secs: 86_400,
            token_refresh_threshold_secs: 3600,
            session_lifetime_secs: 86_400,
            session_refresh_threshold_secs: 3600,
            cleanup_interval_secs: 3600,
            reset_token_lifetime_secs: 3600,
            password_policy: PasswordPolicy::default(),
            secure_token_bytes: DEFAULT_SECURE_TOKEN_BYTES,
            oidc_discovery_timeout_secs: 10,
            oidc_cache_ttl_secs: 3600,
            web_id_base_url: "http://localhost:8000".into(),
            oauth_providers: Vec::new(),
        }
    }
}
