//! Error types for the podid system.

use thiserror::Error;

/// Coarse classification of a [`PodidError`], stable across context
/// wrapping so callers can branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Expired,
    InvalidInput,
    InvalidCredentials,
    AlreadyLinked,
    Revoked,
    Unsupported,
    TrustVerification,
    Database,
    Crypto,
    Internal,
}

#[derive(Debug, Error)]
pub enum PodidError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("{entity} has expired")]
    Expired { entity: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Deliberately carries no detail: unknown user, wrong password and
    /// missing link all look the same to the caller.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("External identity already linked: {provider}/{external_id}")]
    AlreadyLinked {
        provider: String,
        external_id: String,
    },

    #[error("token has been revoked")]
    Revoked,

    #[error("Unsupported: {what}")]
    Unsupported { what: String },

    #[error("WebID-OIDC verification failed: {reason}")]
    TrustVerification { reason: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<PodidError>,
    },
}

impl PodidError {
    pub fn not_found(entity: &str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn expired(entity: &str) -> Self {
        Self::Expired {
            entity: entity.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Wrap this error with operation context. The [`ErrorKind`] is
    /// preserved.
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Expired { .. } => ErrorKind::Expired,
            Self::Validation { .. } => ErrorKind::InvalidInput,
            Self::InvalidCredentials => ErrorKind::InvalidCredentials,
            Self::AlreadyLinked { .. } => ErrorKind::AlreadyLinked,
            Self::Revoked => ErrorKind::Revoked,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::TrustVerification { .. } => ErrorKind::TrustVerification,
            Self::Database(_) => ErrorKind::Database,
            Self::Crypto(_) => ErrorKind::Crypto,
            Self::Internal(_) => ErrorKind::Internal,
            Self::Context { source, .. } => source.kind(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

pub type PodidResult<T> = Result<T, PodidError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_preserves_kind() {
        let err = PodidError::not_found("session", "abc")
            .context("validate session")
            .context("resume");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "resume: validate session: Entity not found: session with id abc"
        );
    }

    #[test]
    fn invalid_credentials_has_no_detail() {
        assert_eq!(
            PodidError::InvalidCredentials.to_string(),
            "invalid credentials"
        );
    }
}
