//! Token revocation entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Deny-list entry for a signed token's `jti`. `expires_at` mirrors the
/// token's own expiry so the entry can be purged once moot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationEntry {
    pub jti: String,
    pub reason: String,
    pub revoked_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
