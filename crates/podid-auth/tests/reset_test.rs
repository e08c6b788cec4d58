//! Password reset flow: request, delivery, completion and token reuse.

mod common;

use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use common::*;
use podid_auth::reset::RESET_TEMPLATE;
use podid_auth::{Credentials, PasswordResetService};
use podid_core::ErrorKind;
use podid_core::error::PodidResult;
use podid_core::models::reset_token::CreatePasswordResetToken;
use podid_core::models::user::User;
use podid_core::repository::{MessageSender, ResetTokenRepository};
use podid_db::repository::{
    SurrealCredentialRepository, SurrealResetTokenRepository, SurrealUserRepository,
};
use serde_json::Value;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

const OLD_PASSWORD: &str = "Correct-Horse-9";
const NEW_PASSWORD: &str = "Battery-Staple-7";

#[derive(Debug, Clone)]
struct Sent {
    to: String,
    template: String,
    data: Value,
}

/// Records messages instead of delivering them.
#[derive(Clone, Default)]
struct CapturingSender {
    sent: Arc<Mutex<Vec<Sent>>>,
}

impl CapturingSender {
    fn messages(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

impl MessageSender for CapturingSender {
    async fn send(&self, to: &str, template: &str, data: Value) -> PodidResult<()> {
        self.sent.lock().unwrap().push(Sent {
            to: to.to_string(),
            template: template.to_string(),
            data,
        });
        Ok(())
    }
}

type ResetService = PasswordResetService<
    SurrealUserRepository<Db>,
    SurrealCredentialRepository<Db>,
    SurrealResetTokenRepository<Db>,
    CapturingSender,
>;

struct Fixture {
    db: Surreal<Db>,
    auth: TestAuthenticator,
    reset: ResetService,
    sender: CapturingSender,
    user: User,
}

impl Fixture {
    async fn new() -> Self {
        let db = memory_db().await;
        let config = test_config();
        let auth = authenticator(&db, config.clone());
        let user = auth
            .register_local("alice@example.com", OLD_PASSWORD, Some("Alice".into()))
            .await
            .unwrap();
        let sender = CapturingSender::default();
        let reset = PasswordResetService::new(
            SurrealUserRepository::new(db.clone()),
            SurrealCredentialRepository::new(db.clone()),
            SurrealResetTokenRepository::new(db.clone()),
            sender.clone(),
            &config,
        );
        Self {
            db,
            auth,
            reset,
            sender,
            user,
        }
    }

    /// Request a reset and return the token from the delivered message.
    async fn requested_token(&self) -> String {
        self.reset.request_reset(&self.user.email).await.unwrap();
        let messages = self.sender.messages();
        let last = messages.last().unwrap();
        last.data["token"].as_str().unwrap().to_string()
    }

    async fn login(&self, password: &str) -> PodidResult<podid_auth::AuthOutcome> {
        self.auth
            .authenticate(Credentials::Password {
                email: self.user.email.clone(),
                password: password.into(),
            })
            .await
    }
}

#[tokio::test]
async fn request_sends_token_to_the_user() {
    let f = Fixture::new().await;
    f.reset.request_reset("alice@example.com").await.unwrap();

    let messages = f.sender.messages();
    assert_eq!(messages.len(), 1);
    let message = &messages[0];
    assert_eq!(message.to, "alice@example.com");
    assert_eq!(message.template, RESET_TEMPLATE);
    assert_eq!(message.data["display_name"], "Alice");
    assert_eq!(message.data["user_id"], f.user.id.to_string());

    let token = message.data["token"].as_str().unwrap();
    let stored = SurrealResetTokenRepository::new(f.db.clone())
        .find_by_token(token)
        .await
        .unwrap();
    assert_eq!(stored.user_id, f.user.id);
    assert!(!stored.used);
    assert!(stored.expires_at > Utc::now());
}

#[tokio::test]
async fn unknown_email_succeeds_silently() {
    let f = Fixture::new().await;
    f.reset.request_reset("nobody@example.com").await.unwrap();
    assert!(f.sender.messages().is_empty());
}

#[tokio::test]
async fn completing_a_reset_replaces_password_and_ends_sessions() {
    let f = Fixture::new().await;
    let before = f.login(OLD_PASSWORD).await.unwrap();
    let token = f.requested_token().await;

    f.reset
        .complete_reset(&token, NEW_PASSWORD, f.auth.sessions())
        .await
        .unwrap();

    assert_eq!(
        f.login(OLD_PASSWORD).await.unwrap_err().kind(),
        ErrorKind::InvalidCredentials
    );
    f.login(NEW_PASSWORD).await.unwrap();

    let err = f.auth.sessions().validate(&before.session.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let stored = SurrealResetTokenRepository::new(f.db.clone())
        .find_by_token(&token)
        .await
        .unwrap();
    assert!(stored.used);
}

#[tokio::test]
async fn reset_token_is_single_use() {
    let f = Fixture::new().await;
    let token = f.requested_token().await;
    f.reset
        .complete_reset(&token, NEW_PASSWORD, f.auth.sessions())
        .await
        .unwrap();

    let err = f
        .reset
        .complete_reset(&token, "Another-Pass-5", f.auth.sessions())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    f.login(NEW_PASSWORD).await.unwrap();
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let f = Fixture::new().await;
    SurrealResetTokenRepository::new(f.db.clone())
        .save(CreatePasswordResetToken {
            token: "stale-token".into(),
            user_id: f.user.id,
            email: f.user.email.clone(),
            expires_at: Utc::now() - Duration::minutes(5),
        })
        .await
        .unwrap();

    let err = f
        .reset
        .complete_reset("stale-token", NEW_PASSWORD, f.auth.sessions())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Expired);
    f.login(OLD_PASSWORD).await.unwrap();
}

#[tokio::test]
async fn unknown_token_is_not_found() {
    let f = Fixture::new().await;
    let err = f
        .reset
        .complete_reset("never-issued", NEW_PASSWORD, f.auth.sessions())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn weak_new_password_leaves_token_usable() {
    let f = Fixture::new().await;
    let token = f.requested_token().await;

    let err = f
        .reset
        .complete_reset(&token, "short", f.auth.sessions())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    f.reset
        .complete_reset(&token, NEW_PASSWORD, f.auth.sessions())
        .await
        .unwrap();
}

#[tokio::test]
async fn cleanup_purges_expired_tokens() {
    let f = Fixture::new().await;
    let repo = SurrealResetTokenRepository::new(f.db.clone());
    repo.save(CreatePasswordResetToken {
        token: "stale-token".into(),
        user_id: f.user.id,
        email: f.user.email.clone(),
        expires_at: Utc::now() - Duration::minutes(5),
    })
    .await
    .unwrap();
    let live = f.requested_token().await;

    assert_eq!(f.reset.cleanup_expired().await.unwrap(), 1);
    assert!(repo.find_by_token("stale-token").await.is_err());
    repo.find_by_token(&live).await.unwrap();
}

#[tokio::test]
async fn concurrent_completions_only_one_wins() {
    let f = Fixture::new().await;
    let token = f.requested_token().await;
    let other_password = "Zebra-Orbit-3x";

    let (first, second) = tokio::join!(
        f.reset.complete_reset(&token, NEW_PASSWORD, f.auth.sessions()),
        f.reset.complete_reset(&token, other_password, f.auth.sessions()),
    );
    assert!(
        first.is_ok() != second.is_ok(),
        "exactly one completion must succeed: {first:?} / {second:?}"
    );

    let (winner, loser) = if first.is_ok() {
        (NEW_PASSWORD, other_password)
    } else {
        (other_password, NEW_PASSWORD)
    };
    f.login(winner).await.unwrap();
    assert_eq!(
        f.login(loser).await.unwrap_err().kind(),
        ErrorKind::InvalidCredentials
    );
}
