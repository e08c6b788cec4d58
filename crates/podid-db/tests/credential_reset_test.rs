//! Integration tests for password credentials and reset tokens.

use chrono::{Duration, Utc};
use podid_core::models::credential::PasswordCredential;
use podid_core::models::reset_token::CreatePasswordResetToken;
use podid_core::repository::{CredentialRepository, ResetTokenRepository};
use podid_db::repository::{SurrealCredentialRepository, SurrealResetTokenRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    podid_db::run_migrations(&db).await.unwrap();
    db
}

fn credential(user_id: Uuid) -> PasswordCredential {
    let now = Utc::now();
    PasswordCredential {
        user_id,
        password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".into(),
        salt: "salt-1".into(),
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn credential_is_replaced_in_place() {
    let repo = SurrealCredentialRepository::new(setup().await);
    let user_id = Uuid::new_v4();
    assert!(!repo.exists(user_id).await.unwrap());

    repo.save(&credential(user_id)).await.unwrap();
    assert!(repo.exists(user_id).await.unwrap());

    repo.update(user_id, "new-hash", "salt-2").await.unwrap();
    let found = repo.find(user_id).await.unwrap();
    assert_eq!(found.password_hash, "new-hash");
    assert_eq!(found.salt, "salt-2");
    assert!(found.updated_at >= found.created_at);
}

#[tokio::test]
async fn second_credential_for_user_is_rejected() {
    let repo = SurrealCredentialRepository::new(setup().await);
    let user_id = Uuid::new_v4();
    repo.save(&credential(user_id)).await.unwrap();
    assert!(repo.save(&credential(user_id)).await.is_err());
}

#[tokio::test]
async fn update_of_missing_credential_is_not_found() {
    let repo = SurrealCredentialRepository::new(setup().await);
    let err = repo.update(Uuid::new_v4(), "h", "s").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn deleted_credential_is_gone() {
    let repo = SurrealCredentialRepository::new(setup().await);
    let user_id = Uuid::new_v4();
    repo.save(&credential(user_id)).await.unwrap();
    repo.delete(user_id).await.unwrap();
    assert!(!repo.exists(user_id).await.unwrap());
    assert!(repo.find(user_id).await.unwrap_err().is_not_found());
}

fn reset(token: &str, user_id: Uuid, expires_in: Duration) -> CreatePasswordResetToken {
    CreatePasswordResetToken {
        token: token.into(),
        user_id,
        email: "alice@example.com".into(),
        expires_at: Utc::now() + expires_in,
    }
}

#[tokio::test]
async fn reset_token_lifecycle() {
    let repo = SurrealResetTokenRepository::new(setup().await);
    let user_id = Uuid::new_v4();

    let saved = repo
        .save(reset("tok-1", user_id, Duration::hours(1)))
        .await
        .unwrap();
    assert!(!saved.used);
    assert!(saved.is_valid_at(Utc::now()));

    let before = repo.consume("tok-1", Utc::now()).await.unwrap();
    assert!(!before.used);
    let found = repo.find_by_token("tok-1").await.unwrap();
    assert!(found.used);
    assert!(!found.is_valid_at(Utc::now()));

    let again = repo.consume("tok-1", Utc::now()).await.unwrap_err();
    assert!(again.is_not_found());
    assert!(
        repo.consume("missing", Utc::now())
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn expired_reset_token_cannot_be_consumed() {
    let repo = SurrealResetTokenRepository::new(setup().await);
    repo.save(reset("stale", Uuid::new_v4(), Duration::minutes(-5)))
        .await
        .unwrap();

    let err = repo.consume("stale", Utc::now()).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!repo.find_by_token("stale").await.unwrap().used);
}

#[tokio::test]
async fn reset_tokens_are_swept_and_deleted_by_user() {
    let repo = SurrealResetTokenRepository::new(setup().await);
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    repo.save(reset("old", alice, Duration::hours(-1)))
        .await
        .unwrap();
    repo.save(reset("fresh", alice, Duration::hours(1)))
        .await
        .unwrap();
    repo.save(reset("bobs", bob, Duration::hours(1)))
        .await
        .unwrap();

    assert_eq!(repo.delete_expired(Utc::now()).await.unwrap(), 1);
    assert_eq!(repo.find_by_user(alice).await.unwrap().len(), 1);

    assert_eq!(repo.delete_by_user(alice).await.unwrap(), 1);
    assert!(repo.find_by_user(alice).await.unwrap().is_empty());
    assert_eq!(repo.find_by_user(bob).await.unwrap().len(), 1);

    repo.delete("bobs").await.unwrap();
    assert!(repo.find_by_token("bobs").await.is_err());
}
