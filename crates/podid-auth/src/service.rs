//! Authentication orchestration: one entry point for password, OAuth and
//! WebID-OIDC credentials, all converging on the same session creation.

use chrono::Utc;
use podid_core::error::{PodidError, PodidResult};
use podid_core::models::credential::PasswordCredential;
use podid_core::models::identity::{CreateIdentityLink, ExternalProfile};
use podid_core::models::session::Session;
use podid_core::models::user::{CreateUser, User};
use podid_core::repository::{
    AuditLogRepository, CredentialRepository, IdentityLinkRepository, RevocationRepository,
    SessionRepository, UserRepository,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::oauth::OAuthProviders;
use crate::password::{self, PasswordPolicy};
use crate::session::SessionManager;
use crate::token::{NoAuditSink, NoRevocationStore};
use crate::webid::WebIdVerifier;

/// Credentials accepted by [`Authenticator::authenticate`].
#[derive(Debug, Clone)]
pub enum Credentials {
    Password {
        email: String,
        password: String,
    },
    WebIdOidc {
        web_id: String,
        token: String,
    },
    /// Authorization code returned by the provider's redirect.
    OAuth {
        provider: String,
        code: String,
        code_verifier: Option<String>,
    },
}

impl Credentials {
    pub fn method(&self) -> &'static str {
        match self {
            Self::Password { .. } => "password",
            Self::WebIdOidc { .. } => "webid-oidc",
            Self::OAuth { .. } => "oauth",
        }
    }
}

/// Successful authentication.
#[derive(Debug)]
pub struct AuthOutcome {
    pub user: User,
    pub session: Session,
    pub token: String,
    pub method: &'static str,
}

/// Authentication orchestrator.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate.
pub struct Authenticator<U, C, I, S, R = NoRevocationStore, A = NoAuditSink> {
    users: U,
    credentials: C,
    links: I,
    sessions: SessionManager<S, R, A>,
    webid: WebIdVerifier,
    oauth: OAuthProviders,
    config: AuthConfig,
}

impl<U, C, I, S, R, A> Authenticator<U, C, I, S, R, A>
where
    U: UserRepository,
    C: CredentialRepository,
    I: IdentityLinkRepository,
    S: SessionRepository,
    R: RevocationRepository,
    A: AuditLogRepository,
{
    pub fn new(
        users: U,
        credentials: C,
        links: I,
        sessions: SessionManager<S, R, A>,
        config: AuthConfig,
    ) -> Result<Self, AuthError> {
        Ok(Self {
            users,
            credentials,
            links,
            sessions,
            webid: WebIdVerifier::new(&config)?,
            oauth: OAuthProviders::from_configs(&config.oauth_providers),
            config,
        })
    }

    pub fn sessions(&self) -> &SessionManager<S, R, A> {
        &self.sessions
    }

    pub fn oauth_providers(&self) -> &OAuthProviders {
        &self.oauth
    }

    pub fn webid_verifier(&self) -> &WebIdVerifier {
        &self.webid
    }

    /// Verify `credentials` with the matching method and open a session
    /// for the resolved user.
    pub async fn authenticate(&self, credentials: Credentials) -> PodidResult<AuthOutcome> {
        let method = credentials.method();
        let user = match credentials {
            Credentials::Password { email, password } => {
                self.verify_password(&email, &password).await?
            }
            Credentials::WebIdOidc { web_id, token } => self.verify_webid(&web_id, &token).await?,
            Credentials::OAuth {
                provider,
                code,
                code_verifier,
            } => {
                self.verify_oauth(&provider, &code, code_verifier.as_deref())
                    .await?
            }
        };

        let (session, token) = self
            .sessions
            .create(user.id, &user.web_id)
            .await
            .map_err(|e| e.context("create session"))?;

        info!(user_id = %user.id, session_id = %session.id, method, "User authenticated");
        Ok(AuthOutcome {
            user,
            session,
            token,
            method,
        })
    }

    async fn verify_password(&self, email: &str, password: &str) -> PodidResult<User> {
        let user = match self.users.get_by_email(email).await {
            Ok(user) => user,
            Err(e) => {
                password::verify_against_dummy(password);
                return Err(undisclosed("user lookup", e));
            }
        };
        let credential = match self.credentials.find(user.id).await {
            Ok(credential) => credential,
            Err(e) => {
                password::verify_against_dummy(password);
                return Err(undisclosed("credential lookup", e));
            }
        };

        match password::verify_password(password, &credential.password_hash, &credential.salt) {
            Ok(true) => Ok(user),
            Ok(false) => {
                debug!(user_id = %user.id, "Password mismatch");
                Err(PodidError::InvalidCredentials)
            }
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Stored password hash is unusable");
                Err(PodidError::InvalidCredentials)
            }
        }
    }

    async fn verify_webid(&self, web_id: &str, token: &str) -> PodidResult<User> {
        let claims = self.webid.verify(token).await?;
        if claims.web_id != web_id {
            return Err(AuthError::TrustVerification(
                "verified WebID differs from the presented WebID".into(),
            )
            .into());
        }
        self.users
            .get_by_web_id(&claims.web_id)
            .await
            .map_err(|e| undisclosed("WebID lookup", e))
    }

    async fn verify_oauth(
        &self,
        provider: &str,
        code: &str,
        code_verifier: Option<&str>,
    ) -> PodidResult<User> {
        let client = self.oauth.get(provider)?;
        let tokens = client.exchange_code(code, code_verifier).await?;
        let profile = client.fetch_profile(&tokens.access_token).await?;

        let link = self
            .links
            .find_by_external_id(provider, &profile.external_id)
            .await
            .map_err(|e| undisclosed("identity link lookup", e))?;
        self.users
            .get_by_id(link.user_id)
            .await
            .map_err(|e| e.context("load linked user"))
    }

    /// Create a local account for a new external identity and link it.
    ///
    /// If linking fails after the account was created, the account is
    /// left in place and the linking error is returned.
    pub async fn register_external(&self, profile: ExternalProfile) -> PodidResult<User> {
        if profile.provider.is_empty() || profile.external_id.is_empty() || profile.email.is_empty()
        {
            return Err(PodidError::validation(
                "external profile requires provider, external id and email",
            ));
        }
        if self
            .links
            .is_linked(&profile.provider, &profile.external_id)
            .await?
        {
            return Err(PodidError::AlreadyLinked {
                provider: profile.provider,
                external_id: profile.external_id,
            });
        }

        let id = Uuid::new_v4();
        let user = self
            .users
            .create(CreateUser {
                id,
                email: profile.email,
                web_id: self.config.web_id_for(id),
                display_name: profile.name,
            })
            .await
            .map_err(|e| e.context("create user"))?;

        if let Err(e) = self
            .links
            .link(CreateIdentityLink {
                user_id: user.id,
                provider: profile.provider.clone(),
                external_id: profile.external_id,
            })
            .await
        {
            warn!(
                user_id = %user.id,
                provider = %profile.provider,
                error = %e,
                "Identity linking failed after user creation"
            );
            return Err(e.context("link external identity"));
        }

        info!(user_id = %user.id, provider = %profile.provider, "Registered external identity");
        Ok(user)
    }

    /// Create a local account with a password credential.
    pub async fn register_local(
        &self,
        email: &str,
        password: &str,
        display_name: Option<String>,
    ) -> PodidResult<User> {
        password::validate_strength(password, &self.config.password_policy)?;

        let id = Uuid::new_v4();
        let user = self
            .users
            .create(CreateUser {
                id,
                email: email.to_string(),
                web_id: self.config.web_id_for(id),
                display_name,
            })
            .await
            .map_err(|e| e.context("create user"))?;

        store_password(&self.credentials, user.id, password, &self.config.password_policy)
            .await
            .map_err(|e| e.context("store password"))?;
        info!(user_id = %user.id, "Registered local user");
        Ok(user)
    }

    /// Validate and store a new password, replacing any existing one.
    pub async fn set_password(&self, user_id: Uuid, password: &str) -> PodidResult<()> {
        store_password(&self.credentials, user_id, password, &self.config.password_policy).await
    }
}

/// Hide the reason a principal could not be resolved. Unexpected store
/// failures are still logged.
fn undisclosed(step: &str, err: PodidError) -> PodidError {
    if !err.is_not_found() {
        warn!(step, error = %err, "Lookup failed during authentication");
    }
    PodidError::InvalidCredentials
}

/// Check strength, hash, and save or replace the user's one credential.
pub(crate) async fn store_password<C: CredentialRepository>(
    credentials: &C,
    user_id: Uuid,
    password: &str,
    policy: &PasswordPolicy,
) -> PodidResult<()> {
    password::validate_strength(password, policy)?;
    let (hash, salt) = password::hash_password(password)?;

    if credentials.exists(user_id).await? {
        credentials.update(user_id, &hash, &salt).await?;
    } else {
        let now = Utc::now();
        credentials
            .save(&PasswordCredential {
                user_id,
                password_hash: hash,
                salt,
                created_at: now,
                updated_at: now,
            })
            .await?;
    }
    debug!(%user_id, "Password credential stored");
    Ok(())
}
