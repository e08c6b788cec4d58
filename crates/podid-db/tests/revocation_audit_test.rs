//! Integration tests for token revocations and the audit log.

use chrono::{Duration, Utc};
use podid_core::models::audit::CreateAuditEvent;
use podid_core::models::revocation::RevocationEntry;
use podid_core::repository::{AuditFilter, AuditLogRepository, RevocationRepository};
use podid_db::repository::{SurrealAuditLogRepository, SurrealRevocationRepository};
use serde_json::json;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    podid_db::run_migrations(&db).await.unwrap();
    db
}

fn entry(jti: &str, expires_in: Duration) -> RevocationEntry {
    let now = Utc::now();
    RevocationEntry {
        jti: jti.into(),
        reason: "logout".into(),
        revoked_at: now,
        expires_at: now + expires_in,
    }
}

#[tokio::test]
async fn revocation_add_check_remove() {
    let repo = SurrealRevocationRepository::new(setup().await);
    assert!(!repo.is_revoked("jti-1").await.unwrap());

    repo.add(&entry("jti-1", Duration::hours(1))).await.unwrap();
    assert!(repo.is_revoked("jti-1").await.unwrap());

    // Revoking twice is harmless.
    repo.add(&entry("jti-1", Duration::hours(1))).await.unwrap();

    repo.remove("jti-1").await.unwrap();
    assert!(!repo.is_revoked("jti-1").await.unwrap());
}

#[tokio::test]
async fn revocation_cleanup_prunes_moot_entries() {
    let repo = SurrealRevocationRepository::new(setup().await);
    repo.add(&entry("expired", Duration::minutes(-5)))
        .await
        .unwrap();
    repo.add(&entry("live", Duration::hours(1))).await.unwrap();

    assert_eq!(repo.cleanup_expired(Utc::now()).await.unwrap(), 1);
    assert!(!repo.is_revoked("expired").await.unwrap());
    assert!(repo.is_revoked("live").await.unwrap());
}

#[tokio::test]
async fn audit_events_are_filterable() {
    let repo = SurrealAuditLogRepository::new(setup().await);
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let issued = repo
        .append(
            CreateAuditEvent::success("token_issued", Some(alice))
                .with_metadata(json!({"jti": "j-1"})),
        )
        .await
        .unwrap();
    assert_eq!(issued.event_type, "token_issued");
    assert_eq!(issued.user_id, Some(alice));
    assert_eq!(issued.metadata["jti"], "j-1");

    repo.append(CreateAuditEvent::failure(
        "token_validation_failed",
        None,
        "bad signature",
    ))
    .await
    .unwrap();
    repo.append(CreateAuditEvent::success("token_issued", Some(bob)))
        .await
        .unwrap();

    let all = repo.list(AuditFilter::default()).await.unwrap();
    assert_eq!(all.len(), 3);

    let issued_only = repo
        .list(AuditFilter {
            event_type: Some("token_issued".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(issued_only.len(), 2);

    let alices = repo
        .list(AuditFilter {
            user_id: Some(alice),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(alices.len(), 1);

    let failures = repo
        .list(AuditFilter {
            success: Some(false),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].reason.as_deref(), Some("bad signature"));
    assert!(failures[0].user_id.is_none());

    let limited = repo
        .list(AuditFilter {
            limit: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
}
