//! Integration tests for `AuthService` over the in-memory repositories.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{Duration, Utc};
use readlog_auth::token::{self, validate_access_token};
use readlog_auth::{AuthConfig, AuthErrorKind, AuthService, LoginInput, RegisterInput};
use readlog_core::error::ReadlogError;
use readlog_core::models::refresh_token::CreateRefreshToken;
use readlog_core::repository::{RefreshTokenRepository, UserRepository};
use readlog_db::memory::{MemoryRefreshTokenRepository, MemoryUserRepository};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use uuid::Uuid;

type Service = AuthService<MemoryUserRepository, MemoryRefreshTokenRepository>;

struct Harness {
    service: Arc<Service>,
    users: MemoryUserRepository,
    tokens: MemoryRefreshTokenRepository,
}

fn test_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "an-integration-test-secret-of-48-bytes-length!!!".into(),
        ..AuthConfig::default()
    }
}

fn harness() -> Harness {
    let users = MemoryUserRepository::new();
    let tokens = MemoryRefreshTokenRepository::new();
    let service = AuthService::new(users.clone(), tokens.clone(), test_config()).unwrap();
    Harness {
        service: Arc::new(service),
        users,
        tokens,
    }
}

fn register_input(username: &str, email: &str) -> RegisterInput {
    RegisterInput {
        username: username.into(),
        email: email.into(),
        password: "Passw0rd!".into(),
        first_name: Some("Ada".into()),
        last_name: Some("Lovelace".into()),
    }
}

fn login_input(identifier: &str, password: &str) -> LoginInput {
    LoginInput {
        email_or_username: identifier.into(),
        password: password.into(),
    }
}

#[tokio::test]
async fn register_login_refresh_revoke_lifecycle() {
    let h = harness();

    let registered = h
        .service
        .register(register_input("alice", "a@x.com"))
        .await
        .unwrap();
    let tokens = registered.into_tokens().expect("registration succeeds");
    assert!(!tokens.access_token.is_empty());
    assert!(tokens.access_token_expires_at > Utc::now());

    let logged_in = h
        .service
        .login(login_input("alice", "Passw0rd!"))
        .await
        .unwrap()
        .into_tokens()
        .expect("login succeeds");

    let rotated = h
        .service
        .refresh_token(&logged_in.refresh_token)
        .await
        .unwrap()
        .into_tokens()
        .expect("refresh succeeds");
    assert_ne!(rotated.refresh_token, logged_in.refresh_token);

    let replay = h
        .service
        .refresh_token(&logged_in.refresh_token)
        .await
        .unwrap();
    assert_eq!(replay.error_kind(), Some(AuthErrorKind::Unauthorized));
    assert_eq!(replay.errors(), ["Invalid or expired refresh token."]);

    assert!(h.service.revoke_token(&rotated.refresh_token).await.unwrap());
    assert!(!h.service.revoke_token(&rotated.refresh_token).await.unwrap());

    let after_logout = h.service.refresh_token(&rotated.refresh_token).await.unwrap();
    assert_eq!(after_logout.error_kind(), Some(AuthErrorKind::Unauthorized));
}

#[tokio::test]
async fn access_token_carries_identity_claims() {
    let h = harness();
    let tokens = h
        .service
        .register(register_input("alice", "a@x.com"))
        .await
        .unwrap()
        .into_tokens()
        .unwrap();

    let claims = validate_access_token(&tokens.access_token, h.service.config()).unwrap();
    let user = h.users.get_by_username("alice").await.unwrap();
    assert_eq!(claims.user_id().unwrap(), user.id);
    assert_eq!(claims.0.email, "a@x.com");
    assert_eq!(claims.0.name, "alice");
    assert_eq!(claims.0.given_name.as_deref(), Some("Ada"));
    assert_eq!(claims.0.family_name.as_deref(), Some("Lovelace"));
    assert_eq!(claims.0.iss, "readlog");
    assert_eq!(claims.0.aud, "readlog-api");
    assert!(claims.0.roles.is_empty());
}

#[tokio::test]
async fn refreshed_access_token_includes_assigned_roles() {
    let h = harness();
    let tokens = h
        .service
        .register(register_input("alice", "a@x.com"))
        .await
        .unwrap()
        .into_tokens()
        .unwrap();
    let user = h.users.get_by_email("a@x.com").await.unwrap();
    h.users.assign_role(user.id, "admin").await.unwrap();

    let rotated = h
        .service
        .refresh_token(&tokens.refresh_token)
        .await
        .unwrap()
        .into_tokens()
        .unwrap();

    let claims = h.service.authenticate(&rotated.access_token).unwrap();
    assert!(claims.has_role("admin"));
}

#[tokio::test]
async fn register_rejects_taken_email_case_insensitively() {
    let h = harness();
    h.service
        .register(register_input("alice", "a@x.com"))
        .await
        .unwrap();

    let result = h
        .service
        .register(register_input("bob", "A@X.com"))
        .await
        .unwrap();
    assert_eq!(result.error_kind(), Some(AuthErrorKind::Conflict));
    assert_eq!(result.errors(), ["Email 'A@X.com' is already taken."]);
}

#[tokio::test]
async fn register_rejects_taken_username() {
    let h = harness();
    h.service
        .register(register_input("alice", "a@x.com"))
        .await
        .unwrap();

    let result = h
        .service
        .register(register_input("Alice", "other@x.com"))
        .await
        .unwrap();
    assert_eq!(result.error_kind(), Some(AuthErrorKind::Conflict));
    assert_eq!(result.errors(), ["Username 'Alice' is already taken."]);
}

#[tokio::test]
async fn register_reports_every_policy_violation() {
    let h = harness();
    let mut input = register_input("alice", "not-an-email");
    input.password = "short".into();

    let result = h.service.register(input).await.unwrap();
    assert_eq!(result.error_kind(), Some(AuthErrorKind::Validation));
    assert!(result.errors().len() >= 3, "got {:?}", result.errors());
    assert!(h.tokens.all().unwrap().is_empty());
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let h = harness();
    h.service
        .register(register_input("alice", "a@x.com"))
        .await
        .unwrap();

    let unknown = h
        .service
        .login(login_input("nobody@x.com", "Passw0rd!"))
        .await
        .unwrap();
    let wrong_password = h
        .service
        .login(login_input("a@x.com", "Wr0ngPassword"))
        .await
        .unwrap();

    assert_eq!(unknown, wrong_password);
    assert_eq!(unknown.error_kind(), Some(AuthErrorKind::Unauthorized));
    assert_eq!(unknown.errors(), ["Invalid email or password."]);
}

/// Counts every event emitted while installed.
struct EventCounter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for EventCounter {
    fn on_event(&self, _event: &Event<'_>, _ctx: Context<'_, S>) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn login_failures_log_the_same_volume() {
    let h = harness();
    h.service
        .register(register_input("alice", "a@x.com"))
        .await
        .unwrap();

    let events = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(EventCounter(Arc::clone(&events)));
    let _guard = tracing::subscriber::set_default(subscriber);

    h.service
        .login(login_input("nobody@x.com", "Passw0rd!"))
        .await
        .unwrap();
    let unknown_user_events = events.swap(0, Ordering::SeqCst);

    h.service
        .login(login_input("a@x.com", "Wr0ngPassword"))
        .await
        .unwrap();
    let wrong_password_events = events.load(Ordering::SeqCst);

    assert_eq!(unknown_user_events, 1);
    assert_eq!(wrong_password_events, unknown_user_events);
}

#[tokio::test]
async fn login_resolves_email_before_username() {
    let h = harness();
    h.service
        .register(register_input("alice", "a@x.com"))
        .await
        .unwrap();
    // A second account whose username equals the first account's email.
    let mut shadow = register_input("a@x.com", "shadow@x.com");
    shadow.password = "Shad0wPass".into();
    h.service.register(shadow).await.unwrap();

    let via_email = h
        .service
        .login(login_input("A@x.com", "Passw0rd!"))
        .await
        .unwrap()
        .into_tokens()
        .expect("email match wins");
    let claims = h.service.authenticate(&via_email.access_token).unwrap();
    assert_eq!(claims.0.name, "alice");

    let shadowed = h
        .service
        .login(login_input("a@x.com", "Shad0wPass"))
        .await
        .unwrap();
    assert_eq!(shadowed.error_kind(), Some(AuthErrorKind::Unauthorized));
}

#[tokio::test]
async fn expired_refresh_token_is_rejected_but_revocable() {
    let h = harness();
    h.service
        .register(register_input("alice", "a@x.com"))
        .await
        .unwrap();
    let user = h.users.get_by_username("alice").await.unwrap();

    let raw = token::generate_refresh_token();
    h.tokens
        .create(CreateRefreshToken {
            user_id: user.id,
            token_hash: token::hash_refresh_token(&raw),
            expires_at: Utc::now() - Duration::seconds(1),
        })
        .await
        .unwrap();

    let result = h.service.refresh_token(&raw).await.unwrap();
    assert_eq!(result.errors(), ["Invalid or expired refresh token."]);

    assert!(h.service.revoke_token(&raw).await.unwrap());
    let stored = h
        .tokens
        .get_by_token_hash(&token::hash_refresh_token(&raw))
        .await
        .unwrap();
    assert!(stored.revoked);
    assert!(stored.revoked_at.is_some());
}

#[tokio::test]
async fn unknown_tokens_fail_quietly() {
    let h = harness();

    let refresh = h.service.refresh_token("never-issued").await.unwrap();
    assert_eq!(refresh.error_kind(), Some(AuthErrorKind::Unauthorized));
    assert_eq!(refresh.errors(), ["Invalid or expired refresh token."]);

    assert!(!h.service.revoke_token("never-issued").await.unwrap());
}

#[tokio::test]
async fn refresh_for_removed_user_leaves_token_untouched() {
    let h = harness();
    let tokens = h
        .service
        .register(register_input("alice", "a@x.com"))
        .await
        .unwrap()
        .into_tokens()
        .unwrap();
    let user = h.users.get_by_username("alice").await.unwrap();
    assert!(h.users.remove(user.id).unwrap());

    let result = h.service.refresh_token(&tokens.refresh_token).await.unwrap();
    assert_eq!(result.error_kind(), Some(AuthErrorKind::Unauthorized));
    assert_eq!(result.errors(), ["User not found."]);

    let stored = h
        .tokens
        .get_by_token_hash(&token::hash_refresh_token(&tokens.refresh_token))
        .await
        .unwrap();
    assert!(!stored.revoked);
    assert_eq!(h.tokens.all().unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_redemption_has_a_single_winner() {
    let h = harness();
    let tokens = h
        .service
        .register(register_input("alice", "a@x.com"))
        .await
        .unwrap()
        .into_tokens()
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let service = Arc::clone(&h.service);
        let raw = tokens.refresh_token.clone();
        handles.push(tokio::spawn(async move {
            service.refresh_token(&raw).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        if result.succeeded() {
            winners += 1;
        } else {
            assert_eq!(result.errors(), ["Invalid or expired refresh token."]);
        }
    }
    assert_eq!(winners, 1);

    // The original plus exactly one replacement.
    assert_eq!(h.tokens.all().unwrap().len(), 2);
    let user = h.users.get_by_username("alice").await.unwrap();
    assert_eq!(h.service.active_sessions(user.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn revoke_all_sessions_ends_every_session() {
    let h = harness();
    let first = h
        .service
        .register(register_input("alice", "a@x.com"))
        .await
        .unwrap()
        .into_tokens()
        .unwrap();
    let second = h
        .service
        .login(login_input("alice", "Passw0rd!"))
        .await
        .unwrap()
        .into_tokens()
        .unwrap();
    let user = h.users.get_by_username("alice").await.unwrap();
    assert_eq!(h.service.active_sessions(user.id).await.unwrap().len(), 2);

    assert_eq!(h.service.revoke_all_sessions(user.id).await.unwrap(), 2);
    assert!(h.service.active_sessions(user.id).await.unwrap().is_empty());

    for raw in [&first.refresh_token, &second.refresh_token] {
        let result = h.service.refresh_token(raw).await.unwrap();
        assert_eq!(result.error_kind(), Some(AuthErrorKind::Unauthorized));
    }
    assert_eq!(
        h.service.revoke_all_sessions(Uuid::new_v4()).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn tampered_access_token_is_rejected() {
    let h = harness();
    let tokens = h
        .service
        .register(register_input("alice", "a@x.com"))
        .await
        .unwrap()
        .into_tokens()
        .unwrap();

    let mut tampered = tokens.access_token.clone();
    tampered.push('x');
    assert!(h.service.authenticate(&tampered).is_err());
}

#[test]
fn short_secret_is_a_configuration_error() {
    let config = AuthConfig {
        jwt_secret: "too-short".into(),
        ..AuthConfig::default()
    };
    let result = AuthService::new(
        MemoryUserRepository::new(),
        MemoryRefreshTokenRepository::new(),
        config,
    );
    assert!(matches!(result, Err(ReadlogError::Configuration(_))));
}
