//! Session domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PodidError, PodidResult};

/// Account/role pair a session is acting under. Both halves are always
/// present together.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountContext {
    pub account_id: Uuid,
    pub role_id: Uuid,
}

impl AccountContext {
    /// Rebuild a context from two independently stored columns.
    ///
    /// Fails when exactly one half is set.
    pub fn from_parts(
        account_id: Option<Uuid>,
        role_id: Option<Uuid>,
    ) -> PodidResult<Option<Self>> {
        match (account_id, role_id) {
            (Some(account_id), Some(role_id)) => Ok(Some(Self {
                account_id,
                role_id,
            })),
            (None, None) => Ok(None),
            _ => Err(PodidError::validation(
                "account context requires both account_id and role_id",
            )),
        }
    }
}

/// One authenticated principal's active login.
///
/// The raw bearer token is never stored; `token_hash` is an opaque
/// binding value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: Uuid,
    pub web_id: String,
    pub account: Option<AccountContext>,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// All identifying fields are populated.
    pub fn is_complete(&self) -> bool {
        !self.id.is_empty()
            && !self.user_id.is_nil()
            && !self.web_id.is_empty()
            && !self.token_hash.is_empty()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_complete() && !self.is_expired_at(now)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Remaining lifetime; negative once expired.
    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> chrono::Duration {
        self.expires_at - now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expires_in: Duration) -> Session {
        let now = Utc::now();
        Session {
            id: "sid".into(),
            user_id: Uuid::new_v4(),
            web_id: "https://alice.example/profile/card#me".into(),
            account: None,
            token_hash: "hash".into(),
            created_at: now,
            last_activity: now,
            expires_at: now + expires_in,
        }
    }

    #[test]
    fn valid_before_expiry() {
        assert!(session(Duration::minutes(5)).is_valid());
    }

    #[test]
    fn invalid_at_expiry_instant() {
        let s = session(Duration::minutes(5));
        assert!(!s.is_valid_at(s.expires_at));
        assert!(!s.is_valid_at(s.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn missing_web_id_is_invalid() {
        let mut s = session(Duration::minutes(5));
        s.web_id.clear();
        assert!(!s.is_valid());
    }

    #[test]
    fn account_context_is_all_or_nothing() {
        let a = Uuid::new_v4();
        let r = Uuid::new_v4();
        assert!(AccountContext::from_parts(Some(a), None).is_err());
        assert!(AccountContext::from_parts(None, Some(r)).is_err());
        assert_eq!(AccountContext::from_parts(None, None).unwrap(), None);
        assert_eq!(
            AccountContext::from_parts(Some(a), Some(r)).unwrap(),
            Some(AccountContext {
                account_id: a,
                role_id: r
            })
        );
    }
}
