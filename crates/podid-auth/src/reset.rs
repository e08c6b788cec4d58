//! Password reset via single-use emailed tokens.

use chrono::{Duration, Utc};
use podid_core::error::{PodidError, PodidResult};
use podid_core::models::reset_token::CreatePasswordResetToken;
use podid_core::repository::{
    AuditLogRepository, CredentialRepository, MessageSender, ResetTokenRepository,
    RevocationRepository, SessionRepository, UserRepository,
};
use serde_json::json;
use tracing::{debug, info};

use crate::config::AuthConfig;
use crate::password::{self, PasswordPolicy, generate_secure_token};
use crate::service::store_password;
use crate::session::SessionManager;

/// Template name passed to the [`MessageSender`].
pub const RESET_TEMPLATE: &str = "password_reset";

pub struct PasswordResetService<U, C, T, N> {
    users: U,
    credentials: C,
    tokens: T,
    sender: N,
    lifetime: Duration,
    token_bytes: usize,
    policy: PasswordPolicy,
}

impl<U, C, T, N> PasswordResetService<U, C, T, N>
where
    U: UserRepository,
    C: CredentialRepository,
    T: ResetTokenRepository,
    N: MessageSender,
{
    pub fn new(users: U, credentials: C, tokens: T, sender: N, config: &AuthConfig) -> Self {
        Self {
            users,
            credentials,
            tokens,
            sender,
            lifetime: Duration::seconds(config.reset_token_lifetime_secs as i64),
            token_bytes: config.token_bytes(),
            policy: config.password_policy.clone(),
        }
    }

    /// Mint a reset token for `email` and send it.
    ///
    /// Unknown addresses succeed without sending anything.
    pub async fn request_reset(&self, email: &str) -> PodidResult<()> {
        let user = match self.users.get_by_email(email).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => {
                debug!("Password reset requested for unknown address");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let expires_at = Utc::now() + self.lifetime;
        let token = self
            .tokens
            .save(CreatePasswordResetToken {
                token: generate_secure_token(self.token_bytes),
                user_id: user.id,
                email: user.email.clone(),
                expires_at,
            })
            .await?;

        self.sender
            .send(
                &user.email,
                RESET_TEMPLATE,
                json!({
                    "token": token.token,
                    "user_id": user.id,
                    "expires_at": expires_at.to_rfc3339(),
                    "display_name": user.display_name,
                }),
            )
            .await
            .map_err(|e| e.context("send reset message"))?;

        info!(user_id = %user.id, "Password reset requested");
        Ok(())
    }

    /// Consume a reset token, replace the password and log the user out
    /// everywhere.
    ///
    /// The token is marked used before the credential is written, so a
    /// failure after that point needs a new reset request.
    pub async fn complete_reset<S, R, A>(
        &self,
        token: &str,
        new_password: &str,
        sessions: &SessionManager<S, R, A>,
    ) -> PodidResult<()>
    where
        S: SessionRepository,
        R: RevocationRepository,
        A: AuditLogRepository,
    {
        let record = self.tokens.find_by_token(token).await?;
        if record.used {
            return Err(PodidError::validation("reset token has already been used"));
        }
        if !record.is_valid_at(Utc::now()) {
            return Err(PodidError::expired("reset token"));
        }
        // A rejected password must leave the token usable.
        password::validate_strength(new_password, &self.policy)?;

        // Claim the token before touching the credential. Only one of
        // several concurrent completions gets past this point.
        let claimed = match self.tokens.consume(token, Utc::now()).await {
            Ok(claimed) => claimed,
            Err(e) if e.is_not_found() => {
                debug!(user_id = %record.user_id, "Reset token claimed concurrently");
                return Err(PodidError::validation("reset token has already been used"));
            }
            Err(e) => return Err(e),
        };

        store_password(&self.credentials, claimed.user_id, new_password, &self.policy)
            .await
            .map_err(|e| e.context("store new password"))?;
        let ended = sessions
            .invalidate_all_for_user(claimed.user_id)
            .await
            .map_err(|e| e.context("end sessions after reset"))?;

        info!(user_id = %claimed.user_id, ended, "Password reset completed");
        Ok(())
    }

    pub async fn cleanup_expired(&self) -> PodidResult<u64> {
        let removed = self.tokens.delete_expired(Utc::now()).await?;
        if removed > 0 {
            info!(removed, "Purged expired reset tokens");
        }
        Ok(removed)
    }
}
