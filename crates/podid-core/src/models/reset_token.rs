//! Password reset token domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetToken {
    pub token: String,
    pub user_id: Uuid,
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    /// Usable iff unexpired and never consumed.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.used && now < self.expires_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePasswordResetToken {
    pub token: String,
    pub user_id: Uuid,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(expires_in: Duration, used: bool) -> PasswordResetToken {
        let now = Utc::now();
        PasswordResetToken {
            token: "t".into(),
            user_id: Uuid::new_v4(),
            email: "alice@example.com".into(),
            expires_at: now + expires_in,
            used,
            created_at: now,
        }
    }

    #[test]
    fn used_token_is_never_valid() {
        assert!(!token(Duration::hours(1), true).is_valid_at(Utc::now()));
    }

    #[test]
    fn expired_token_is_invalid() {
        assert!(!token(Duration::seconds(-1), false).is_valid_at(Utc::now()));
        assert!(token(Duration::hours(1), false).is_valid_at(Utc::now()));
    }
}
