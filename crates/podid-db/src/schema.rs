//! Schema definitions and migration runner for SurrealDB.
//!
//! All tables are SCHEMAFULL. UUIDs and session ids are stored as
//! strings; the record key of each row is its natural identifier where
//! one exists (session id, user id, token value, `jti`).

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Users
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD web_id ON TABLE user TYPE string;
DEFINE FIELD display_name ON TABLE user TYPE option<string>;
DEFINE FIELD created_at ON TABLE user TYPE datetime DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;
DEFINE INDEX idx_user_web_id ON TABLE user COLUMNS web_id UNIQUE;

-- =======================================================================
-- Sessions (keyed by session id)
-- =======================================================================
DEFINE TABLE session SCHEMAFULL;
DEFINE FIELD user_id ON TABLE session TYPE string;
DEFINE FIELD web_id ON TABLE session TYPE string;
DEFINE FIELD account_id ON TABLE session TYPE option<string>;
DEFINE FIELD role_id ON TABLE session TYPE option<string>;
DEFINE FIELD token_hash ON TABLE session TYPE string;
DEFINE FIELD created_at ON TABLE session TYPE datetime;
DEFINE FIELD last_activity ON TABLE session TYPE datetime;
DEFINE FIELD expires_at ON TABLE session TYPE datetime;
DEFINE INDEX idx_session_user ON TABLE session COLUMNS user_id;
DEFINE INDEX idx_session_account ON TABLE session COLUMNS account_id;
DEFINE INDEX idx_session_expiry ON TABLE session COLUMNS expires_at;

-- =======================================================================
-- Password credentials (keyed by user id, one per user)
-- =======================================================================
DEFINE TABLE credential SCHEMAFULL;
DEFINE FIELD user_id ON TABLE credential TYPE string;
DEFINE FIELD password_hash ON TABLE credential TYPE string;
DEFINE FIELD salt ON TABLE credential TYPE string;
DEFINE FIELD created_at ON TABLE credential TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE credential TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_credential_user ON TABLE credential \
    COLUMNS user_id UNIQUE;

-- =======================================================================
-- Password reset tokens (keyed by token value)
-- =======================================================================
DEFINE TABLE password_reset SCHEMAFULL;
DEFINE FIELD token ON TABLE password_reset TYPE string;
DEFINE FIELD user_id ON TABLE password_reset TYPE string;
DEFINE FIELD email ON TABLE password_reset TYPE string;
DEFINE FIELD expires_at ON TABLE password_reset TYPE datetime;
DEFINE FIELD used ON TABLE password_reset TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE password_reset TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_reset_token ON TABLE password_reset \
    COLUMNS token UNIQUE;
DEFINE INDEX idx_reset_user ON TABLE password_reset COLUMNS user_id;

-- =======================================================================
-- External identity links
-- =======================================================================
DEFINE TABLE identity_link SCHEMAFULL;
DEFINE FIELD user_id ON TABLE identity_link TYPE string;
DEFINE FIELD provider ON TABLE identity_link TYPE string;
DEFINE FIELD external_id ON TABLE identity_link TYPE string;
DEFINE FIELD created_at ON TABLE identity_link TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_identity_external ON TABLE identity_link \
    COLUMNS provider, external_id UNIQUE;
DEFINE INDEX idx_identity_user ON TABLE identity_link COLUMNS user_id;

-- =======================================================================
-- Token revocations (keyed by jti)
-- =======================================================================
DEFINE TABLE token_revocation SCHEMAFULL;
DEFINE FIELD reason ON TABLE token_revocation TYPE string;
DEFINE FIELD revoked_at ON TABLE token_revocation TYPE datetime;
DEFINE FIELD expires_at ON TABLE token_revocation TYPE datetime;
DEFINE INDEX idx_revocation_expiry ON TABLE token_revocation \
    COLUMNS expires_at;

-- =======================================================================
-- Audit events (append-only)
-- =======================================================================
DEFINE TABLE audit_event SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD event_type ON TABLE audit_event TYPE string;
DEFINE FIELD user_id ON TABLE audit_event TYPE option<string>;
DEFINE FIELD success ON TABLE audit_event TYPE bool;
DEFINE FIELD reason ON TABLE audit_event TYPE option<string>;
DEFINE FIELD metadata ON TABLE audit_event TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD created_at ON TABLE audit_event TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_audit_type_time ON TABLE audit_event \
    COLUMNS event_type, created_at;
DEFINE INDEX idx_audit_user ON TABLE audit_event COLUMNS user_id;
";

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "failed to record v{}: {}",
                    migration.version, e,
                ))
            })?;
        info!(version = migration.version, "Migration applied");
    }

    Ok(())
}

/// Raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(window[0].version < window[1].version);
        }
    }

    #[test]
    fn every_table_is_defined() {
        for table in [
            "user",
            "session",
            "credential",
            "password_reset",
            "identity_link",
            "token_revocation",
            "audit_event",
        ] {
            assert!(
                SCHEMA_V1.contains(&format!("DEFINE TABLE {table} SCHEMAFULL")),
                "missing table {table}"
            );
        }
    }
}
