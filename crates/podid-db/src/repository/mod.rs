//! SurrealDB repository implementations.

mod audit;
mod credential;
mod identity;
mod reset_token;
mod revocation;
mod session;
mod user;

pub use audit::SurrealAuditLogRepository;
pub use credential::SurrealCredentialRepository;
pub use identity::SurrealIdentityLinkRepository;
pub use reset_token::SurrealResetTokenRepository;
pub use revocation::SurrealRevocationRepository;
pub use session::SurrealSessionRepository;
pub use user::SurrealUserRepository;

use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_uuid(entity: &'static str, value: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::Malformed {
        entity,
        detail: format!("invalid UUID '{value}': {e}"),
    })
}

fn parse_optional_uuid(entity: &'static str, value: Option<&str>) -> Result<Option<Uuid>, DbError> {
    value.map(|v| parse_uuid(entity, v)).transpose()
}
