//! Integration tests for the session repository.

use chrono::{Duration, Utc};
use podid_core::models::session::{AccountContext, Session};
use podid_core::repository::SessionRepository;
use podid_db::repository::SurrealSessionRepository;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> SurrealSessionRepository<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    podid_db::run_migrations(&db).await.unwrap();
    SurrealSessionRepository::new(db)
}

fn session(id: &str, user_id: Uuid, expires_in: Duration) -> Session {
    let now = Utc::now();
    Session {
        id: id.into(),
        user_id,
        web_id: format!("https://pods.example/{user_id}/profile/card#me"),
        account: None,
        token_hash: format!("hash-{id}"),
        created_at: now,
        last_activity: now,
        expires_at: now + expires_in,
    }
}

#[tokio::test]
async fn create_and_find_roundtrip() {
    let repo = setup().await;
    let user_id = Uuid::new_v4();
    let saved = session("s-1", user_id, Duration::hours(1));
    repo.create(&saved).await.unwrap();

    let found = repo.find_by_id("s-1").await.unwrap();
    assert_eq!(found.id, "s-1");
    assert_eq!(found.user_id, user_id);
    assert_eq!(found.web_id, saved.web_id);
    assert_eq!(found.token_hash, "hash-s-1");
    assert!(found.account.is_none());
}

#[tokio::test]
async fn missing_session_is_not_found() {
    let repo = setup().await;
    let err = repo.find_by_id("nope").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn update_keeps_account_context_whole() {
    let repo = setup().await;
    let user_id = Uuid::new_v4();
    let mut s = session("s-ctx", user_id, Duration::hours(1));
    repo.create(&s).await.unwrap();

    let ctx = AccountContext {
        account_id: Uuid::new_v4(),
        role_id: Uuid::new_v4(),
    };
    s.account = Some(ctx);
    repo.update(&s).await.unwrap();

    let found = repo.find_by_id("s-ctx").await.unwrap();
    assert_eq!(found.account, Some(ctx));

    let by_account = repo.find_by_account(ctx.account_id).await.unwrap();
    assert_eq!(by_account.len(), 1);
    let by_both = repo
        .find_by_user_and_account(user_id, ctx.account_id)
        .await
        .unwrap();
    assert_eq!(by_both.len(), 1);
    let other_user = repo
        .find_by_user_and_account(Uuid::new_v4(), ctx.account_id)
        .await
        .unwrap();
    assert!(other_user.is_empty());

    s.account = None;
    repo.update(&s).await.unwrap();
    assert!(repo.find_by_id("s-ctx").await.unwrap().account.is_none());
}

#[tokio::test]
async fn delete_is_idempotent() {
    let repo = setup().await;
    repo.create(&session("s-del", Uuid::new_v4(), Duration::hours(1)))
        .await
        .unwrap();

    repo.delete("s-del").await.unwrap();
    repo.delete("s-del").await.unwrap();
    assert!(repo.find_by_id("s-del").await.is_err());
}

#[tokio::test]
async fn delete_by_user_only_touches_that_user() {
    let repo = setup().await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    for id in ["a-1", "a-2", "a-3"] {
        repo.create(&session(id, alice, Duration::hours(1)))
            .await
            .unwrap();
    }
    repo.create(&session("b-1", bob, Duration::hours(1)))
        .await
        .unwrap();

    assert_eq!(repo.delete_by_user(alice).await.unwrap(), 3);
    assert!(repo.find_by_user(alice).await.unwrap().is_empty());
    assert_eq!(repo.find_by_user(bob).await.unwrap().len(), 1);
}

#[tokio::test]
async fn cleanup_removes_only_expired_sessions() {
    let repo = setup().await;
    let user_id = Uuid::new_v4();
    let fixtures = [
        ("expired-1", Duration::hours(-2)),
        ("expired-2", Duration::seconds(-1)),
        ("expired-3", Duration::days(-30)),
        ("live-1", Duration::hours(1)),
        ("live-2", Duration::days(1)),
    ];
    for (id, offset) in fixtures {
        repo.create(&session(id, user_id, offset)).await.unwrap();
    }

    let removed = repo.delete_expired(Utc::now()).await.unwrap();
    assert_eq!(removed, 3);

    let remaining: Vec<String> = repo
        .find_by_user(user_id)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.contains(&"live-1".to_string()));
    assert!(remaining.contains(&"live-2".to_string()));

    assert_eq!(repo.delete_expired(Utc::now()).await.unwrap(), 0);
}

#[tokio::test]
async fn touch_activity_updates_timestamp() {
    let repo = setup().await;
    let s = session("s-touch", Uuid::new_v4(), Duration::hours(1));
    repo.create(&s).await.unwrap();

    let later = s.last_activity + Duration::minutes(5);
    repo.touch_activity("s-touch", later).await.unwrap();

    let found = repo.find_by_id("s-touch").await.unwrap();
    assert_eq!(found.last_activity.timestamp(), later.timestamp());
    assert!(repo.touch_activity("gone", later).await.is_err());
}

#[tokio::test]
async fn create_rejects_existing_id() {
    let repo = setup().await;
    let s = session("s-dup", Uuid::new_v4(), Duration::hours(1));
    repo.create(&s).await.unwrap();
    assert!(repo.create(&s).await.is_err());
}

#[tokio::test]
async fn update_does_not_resurrect_deleted_session() {
    let repo = setup().await;
    let mut s = session("s-gone", Uuid::new_v4(), Duration::hours(1));
    repo.create(&s).await.unwrap();
    repo.delete("s-gone").await.unwrap();

    s.expires_at = Utc::now() + Duration::hours(2);
    let err = repo.update(&s).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(repo.find_by_id("s-gone").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn update_extends_expiry() {
    let repo = setup().await;
    let mut s = session("s-ext", Uuid::new_v4(), Duration::minutes(1));
    repo.create(&s).await.unwrap();

    s.expires_at = Utc::now() + Duration::hours(3);
    repo.update(&s).await.unwrap();

    let found = repo.find_by_id("s-ext").await.unwrap();
    assert_eq!(found.expires_at.timestamp(), s.expires_at.timestamp());
    assert_eq!(found.token_hash, "hash-s-ext");
}
