//! Command-line and environment configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use podid_auth::{AuthConfig, PasswordPolicy};
use podid_db::DbConfig;

/// Every flag can also be set through the matching `PODID_*`
/// environment variable.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "podid",
    version,
    about = "Authentication and session service for WebID pods"
)]
pub struct ServerArgs {
    #[arg(long, env = "PODID_DB_URL", default_value = "127.0.0.1:8000")]
    pub db_url: String,

    #[arg(long, env = "PODID_DB_NAMESPACE", default_value = "podid")]
    pub db_namespace: String,

    #[arg(long, env = "PODID_DB_DATABASE", default_value = "main")]
    pub db_database: String,

    #[arg(long, env = "PODID_DB_USERNAME", default_value = "root")]
    pub db_username: String,

    #[arg(long, env = "PODID_DB_PASSWORD", default_value = "root", hide_env_values = true)]
    pub db_password: String,

    /// PEM file holding the Ed25519 signing key.
    #[arg(long, env = "PODID_JWT_PRIVATE_KEY_FILE")]
    pub jwt_private_key_file: PathBuf,

    /// PEM file holding the Ed25519 verification key.
    #[arg(long, env = "PODID_JWT_PUBLIC_KEY_FILE")]
    pub jwt_public_key_file: PathBuf,

    #[arg(long, env = "PODID_JWT_ISSUER", default_value = "podid")]
    pub jwt_issuer: String,

    #[arg(long, env = "PODID_JWT_AUDIENCE", default_value = "podid")]
    pub jwt_audience: String,

    #[arg(long, env = "PODID_TOKEN_LIFETIME_SECS", default_value_t = 86_400)]
    pub token_lifetime_secs: u64,

    #[arg(long, env = "PODID_TOKEN_REFRESH_THRESHOLD_SECS", default_value_t = 3600)]
    pub token_refresh_threshold_secs: u64,

    #[arg(long, env = "PODID_SESSION_LIFETIME_SECS", default_value_t = 86_400)]
    pub session_lifetime_secs: u64,

    #[arg(long, env = "PODID_SESSION_REFRESH_THRESHOLD_SECS", default_value_t = 3600)]
    pub session_refresh_threshold_secs: u64,

    /// Seconds between cleanup sweeps of expired sessions and
    /// revocation entries.
    #[arg(long, env = "PODID_CLEANUP_INTERVAL_SECS", default_value_t = 3600)]
    pub cleanup_interval_secs: u64,

    #[arg(long, env = "PODID_RESET_TOKEN_LIFETIME_SECS", default_value_t = 3600)]
    pub reset_token_lifetime_secs: u64,

    #[arg(long, env = "PODID_PASSWORD_MIN_LENGTH", default_value_t = 8)]
    pub password_min_length: usize,

    /// Character classes a new password must contain. Each takes
    /// `true` or `false`.
    #[arg(long, env = "PODID_PASSWORD_REQUIRE_UPPERCASE", default_value_t = true, action = ArgAction::Set)]
    pub password_require_uppercase: bool,

    #[arg(long, env = "PODID_PASSWORD_REQUIRE_LOWERCASE", default_value_t = true, action = ArgAction::Set)]
    pub password_require_lowercase: bool,

    #[arg(long, env = "PODID_PASSWORD_REQUIRE_DIGIT", default_value_t = true, action = ArgAction::Set)]
    pub password_require_digit: bool,

    #[arg(long, env = "PODID_PASSWORD_REQUIRE_SYMBOL", default_value_t = true, action = ArgAction::Set)]
    pub password_require_symbol: bool,

    #[arg(long, env = "PODID_SECURE_TOKEN_BYTES", default_value_t = 32)]
    pub secure_token_bytes: usize,

    #[arg(long, env = "PODID_OIDC_DISCOVERY_TIMEOUT_SECS", default_value_t = 10)]
    pub oidc_discovery_timeout_secs: u64,

    #[arg(long, env = "PODID_OIDC_CACHE_TTL_SECS", default_value_t = 3600)]
    pub oidc_cache_ttl_secs: u64,

    /// Base URL under which locally minted WebIDs live.
    #[arg(long, env = "PODID_WEB_ID_BASE_URL", default_value = "http://localhost:8000")]
    pub web_id_base_url: String,
}

impl ServerArgs {
    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            url: self.db_url.clone(),
            namespace: self.db_namespace.clone(),
            database: self.db_database.clone(),
            username: self.db_username.clone(),
            password: self.db_password.clone(),
        }
    }

    /// Read the key files and build the auth configuration.
    pub fn auth_config(&self) -> Result<AuthConfig> {
        let private_pem = std::fs::read_to_string(&self.jwt_private_key_file).with_context(|| {
            format!(
                "failed to read signing key {}",
                self.jwt_private_key_file.display()
            )
        })?;
        let public_pem = std::fs::read_to_string(&self.jwt_public_key_file).with_context(|| {
            format!(
                "failed to read verification key {}",
                self.jwt_public_key_file.display()
            )
        })?;
        Ok(self.auth_config_with_keys(private_pem, public_pem))
    }

    pub fn auth_config_with_keys(&self, private_pem: String, public_pem: String) -> AuthConfig {
        AuthConfig {
            jwt_private_key_pem: private_pem,
            jwt_public_key_pem: public_pem,
            jwt_issuer: self.jwt_issuer.clone(),
            jwt_audience: self.jwt_audience.clone(),
            token_lifetime_secs: self.token_lifetime_secs,
            token_refresh_threshold_secs: self.token_refresh_threshold_secs,
            session_lifetime_secs: self.session_lifetime_secs,
            session_refresh_threshold_secs: self.session_refresh_threshold_secs,
            cleanup_interval_secs: self.cleanup_interval_secs,
            reset_token_lifetime_secs: self.reset_token_lifetime_secs,
            password_policy: PasswordPolicy {
                min_length: self.password_min_length,
                require_uppercase: self.password_require_uppercase,
                require_lowercase: self.password_require_lowercase,
                require_digit: self.password_require_digit,
                require_symbol: self.password_require_symbol,
            },
            secure_token_bytes: self.secure_token_bytes,
            oidc_discovery_timeout_secs: self.oidc_discovery_timeout_secs,
            oidc_cache_ttl_secs: self.oidc_cache_ttl_secs,
            web_id_base_url: self.web_id_base_url.clone(),
            oauth_providers: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> ServerArgs {
        let mut argv = vec![
            "podid",
            "--jwt-private-key-file",
            "/keys/private.pem",
            "--jwt-public-key-file",
            "/keys/public.pem",
        ];
        argv.extend_from_slice(extra);
        ServerArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn key_files_are_required() {
        assert!(ServerArgs::try_parse_from(["podid"]).is_err());
    }

    #[test]
    fn flags_override_defaults() {
        let args = parse(&[
            "--session-lifetime-secs",
            "600",
            "--cleanup-interval-secs",
            "30",
            "--password-min-length",
            "12",
        ]);
        let config = args.auth_config_with_keys("priv".into(), "pub".into());
        assert_eq!(config.session_lifetime_secs, 600);
        assert_eq!(config.cleanup_interval_secs, 30);
        assert_eq!(config.password_policy.min_length, 12);
        assert!(config.password_policy.require_symbol);
        assert_eq!(config.jwt_private_key_pem, "priv");
    }

    #[test]
    fn character_classes_can_be_relaxed() {
        let defaults = parse(&[]).auth_config_with_keys("priv".into(), "pub".into());
        assert_eq!(defaults.password_policy, PasswordPolicy::default());

        let args = parse(&[
            "--password-require-symbol",
            "false",
            "--password-require-uppercase",
            "false",
        ]);
        let policy = args
            .auth_config_with_keys("priv".into(), "pub".into())
            .password_policy;
        assert!(!policy.require_symbol);
        assert!(!policy.require_uppercase);
        assert!(policy.require_lowercase);
        assert!(policy.require_digit);
    }

    #[test]
    fn db_config_mirrors_flags() {
        let args = parse(&["--db-url", "db.internal:8000", "--db-namespace", "pods"]);
        let db = args.db_config();
        assert_eq!(db.url, "db.internal:8000");
        assert_eq!(db.namespace, "pods");
    }

    #[test]
    fn missing_key_file_is_reported() {
        let args = parse(&[]);
        let err = args.auth_config().unwrap_err();
        assert!(err.to_string().contains("/keys/private.pem"));
    }
}
