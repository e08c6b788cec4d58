//! External identity link domain model.
//!
//! A `(provider, external_id)` pair links to at most one local user; a
//! user may hold links to several providers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityLink {
    pub user_id: Uuid,
    pub provider: String,
    pub external_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIdentityLink {
    pub user_id: Uuid,
    pub provider: String,
    pub external_id: String,
}

/// Profile returned by an external OAuth provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExternalProfile {
    pub provider: String,
    pub external_id: String,
    pub email: String,
    pub name: Option<String>,
}
