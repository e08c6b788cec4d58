//! Authentication error types.

use podid_core::error::PodidError;
use thiserror::Error;

use crate::password::PasswordViolation;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("token has been revoked")]
    TokenRevoked,

    /// Remaining lifetime is still above the refresh threshold.
    #[error("token does not need refresh yet ({remaining_secs}s remaining)")]
    RefreshNotDue { remaining_secs: i64 },

    #[error("password must not be empty")]
    EmptyPassword,

    #[error("password does not meet requirements: {}", join_violations(.0))]
    WeakPassword(Vec<PasswordViolation>),

    #[error("WebID-OIDC verification failed: {0}")]
    TrustVerification(String),

    #[error("cryptography error: {0}")]
    Crypto(String),

    #[error("token revocation requires a revocation store")]
    RevocationUnavailable,

    #[error("unknown OAuth provider: {0}")]
    UnknownProvider(String),

    #[error("OAuth {operation} failed: {detail}")]
    Provider {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },

    #[error(transparent)]
    Store(#[from] PodidError),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Provider {
            operation: "request",
            status: err.status().map(|s| s.as_u16()),
            detail: err.to_string(),
        }
    }
}

fn join_violations(violations: &[PasswordViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<AuthError> for PodidError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => PodidError::InvalidCredentials,
            AuthError::TokenExpired => PodidError::expired("token"),
            AuthError::TokenRevoked => PodidError::Revoked,
            AuthError::TokenInvalid(_)
            | AuthError::RefreshNotDue { .. }
            | AuthError::EmptyPassword
            | AuthError::WeakPassword(_) => PodidError::Validation {
                message: err.to_string(),
            },
            AuthError::TrustVerification(reason) => PodidError::TrustVerification { reason },
            AuthError::Crypto(msg) => PodidError::Crypto(msg),
            AuthError::RevocationUnavailable => PodidError::Unsupported {
                what: "token revocation without a revocation store".into(),
            },
            AuthError::UnknownProvider(name) => PodidError::Unsupported {
                what: format!("OAuth provider {name}"),
            },
            // The provider refusing a code is a credential failure; anything
            // else is an upstream fault.
            AuthError::Provider {
                status: Some(400..=499),
                ..
            } => PodidError::InvalidCredentials,
            AuthError::Provider { .. } => PodidError::Internal(err.to_string()),
            AuthError::Store(inner) => inner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podid_core::ErrorKind;

    #[test]
    fn rejected_code_maps_to_invalid_credentials() {
        let err = AuthError::Provider {
            operation: "token exchange",
            status: Some(400),
            detail: "invalid_grant".into(),
        };
        assert_eq!(PodidError::from(err).kind(), ErrorKind::InvalidCredentials);
    }

    #[test]
    fn provider_outage_maps_to_internal() {
        let err = AuthError::Provider {
            operation: "userinfo",
            status: Some(503),
            detail: String::new(),
        };
        assert_eq!(PodidError::from(err).kind(), ErrorKind::Internal);
    }

    #[test]
    fn unknown_provider_is_unsupported() {
        let err = AuthError::UnknownProvider("myspace".into());
        assert_eq!(PodidError::from(err).kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn weak_password_lists_every_violation() {
        let err = AuthError::WeakPassword(vec![
            PasswordViolation::MissingDigit,
            PasswordViolation::MissingSymbol,
        ]);
        assert_eq!(
            err.to_string(),
            "password does not meet requirements: must contain a digit; must contain a symbol"
        );
    }
}
