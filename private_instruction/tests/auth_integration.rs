//! Integration tests for the credential and session lifecycle.
//!
//! Tests sign-up, sign-in, refresh-token rotation, sign-out and password
//! changes against the in-memory store.

use chrono::Duration;
use private_instruction::auth::{
    AuthConfig, AuthError, AuthManager, HashCost, SignInRequest, SignUpRequest,
    UpdatePasswordRequest,
};
use private_instruction::db::{MemoryStore, SessionRepository};
use std::sync::Arc;

const JWT_SECRET: &str = "integration_test_jwt_secret_0123456789";
const PEPPER: &str = "integration_pepper";

fn test_config() -> AuthConfig {
    let mut config = AuthConfig::new(JWT_SECRET.to_string(), PEPPER.to_string());
    config.hash_cost = HashCost::minimal();
    config
}

/// Helper to create an auth manager over a fresh store
fn setup_auth_manager() -> (MemoryStore, AuthManager) {
    setup_with_config(&test_config())
}

fn setup_with_config(config: &AuthConfig) -> (MemoryStore, AuthManager) {
    let store = MemoryStore::new();
    let auth = AuthManager::new(Arc::new(store.clone()), Arc::new(store.clone()), config)
        .expect("valid auth config");
    (store, auth)
}

fn sign_up(username: &str, password: &str, email: &str) -> SignUpRequest {
    SignUpRequest {
        username: username.to_string(),
        password: password.to_string(),
        email: email.to_string(),
    }
}

fn by_username(username: &str, password: &str) -> SignInRequest {
    SignInRequest {
        username: Some(username.to_string()),
        email: None,
        password: password.to_string(),
    }
}

#[tokio::test]
async fn test_sign_up_sign_in_refresh_scenario() {
    let (_, auth) = setup_auth_manager();

    auth.sign_up(sign_up("alice", "pw1", "a@x.com"))
        .await
        .expect("first sign-up should succeed");

    let duplicate = auth.sign_up(sign_up("alice", "pw2", "b@x.com")).await;
    assert!(matches!(duplicate, Err(AuthError::UserExists)));

    let (account, tokens) = auth
        .sign_in(by_username("alice", "pw1"))
        .await
        .expect("sign-in should succeed");
    assert!(!tokens.access_token.is_empty());
    assert!(!tokens.refresh_token.is_empty());

    let (refreshed_account, refreshed) = auth
        .refresh_access_token(&tokens.refresh_token, account.id)
        .await
        .expect("refresh should succeed");
    assert_eq!(refreshed_account.id, account.id);
    assert_ne!(refreshed.refresh_token, tokens.refresh_token);
    let claims = auth.verify_access_token(&refreshed.access_token).unwrap();
    assert_eq!(claims.sub, account.id);
    assert_eq!(claims.username, "alice");

    let replay = auth
        .refresh_access_token(&tokens.refresh_token, account.id)
        .await;
    assert!(
        matches!(replay, Err(AuthError::InvalidCredentials)),
        "a rotated refresh secret must not work twice"
    );

    // The rotated secret keeps working
    auth.refresh_access_token(&refreshed.refresh_token, account.id)
        .await
        .expect("new refresh secret should work");
}

#[tokio::test]
async fn test_duplicate_email_any_case_or_padding() {
    let (_, auth) = setup_auth_manager();
    auth.sign_up(sign_up("alice", "pw1", "alice@example.com"))
        .await
        .unwrap();

    for email in ["ALICE@example.com", "  alice@Example.Com  ", "alice@example.com"] {
        let result = auth.sign_up(sign_up("someone_else", "pw", email)).await;
        assert!(
            matches!(result, Err(AuthError::UserExists)),
            "{email:?} should collide"
        );
    }
}

#[tokio::test]
async fn test_concurrent_sign_ups_only_one_wins() {
    let (_, auth) = setup_auth_manager();

    let (first, second) = tokio::join!(
        auth.sign_up(sign_up("racer", "pw1", "r1@x.com")),
        auth.sign_up(sign_up("racer", "pw2", "r2@x.com")),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        outcomes
            .iter()
            .any(|r| matches!(r, Err(AuthError::UserExists)))
    );
}

#[tokio::test]
async fn test_sign_in_failures_are_indistinguishable() {
    let (_, auth) = setup_auth_manager();
    auth.sign_up(sign_up("alice", "pw1", "a@x.com")).await.unwrap();

    let wrong_password = auth.sign_in(by_username("alice", "nope")).await.unwrap_err();
    let unknown_user = auth.sign_in(by_username("mallory", "pw1")).await.unwrap_err();

    assert!(matches!(wrong_password, AuthError::InvalidCredentials));
    assert!(matches!(unknown_user, AuthError::InvalidCredentials));
    assert_eq!(wrong_password.client_message(), unknown_user.client_message());
}

#[tokio::test]
async fn test_concurrent_refresh_with_same_secret() {
    let (_, auth) = setup_auth_manager();
    let account = auth.sign_up(sign_up("alice", "pw1", "a@x.com")).await.unwrap();
    let (_, tokens) = auth.sign_in(by_username("alice", "pw1")).await.unwrap();

    let (first, second) = tokio::join!(
        auth.refresh_access_token(&tokens.refresh_token, account.id),
        auth.refresh_access_token(&tokens.refresh_token, account.id),
    );

    let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "a refresh secret is single-use");
}

#[tokio::test]
async fn test_refresh_with_expired_session() {
    let mut config = test_config();
    config.refresh_token_ttl = Duration::seconds(-1);
    let (store, auth) = setup_with_config(&config);

    let account = auth.sign_up(sign_up("alice", "pw1", "a@x.com")).await.unwrap();
    let (_, tokens) = auth.sign_in(by_username("alice", "pw1")).await.unwrap();

    let result = auth
        .refresh_access_token(&tokens.refresh_token, account.id)
        .await;
    assert!(matches!(result, Err(AuthError::InvalidCredentials)));

    // The expired record is dropped on the failed attempt
    assert!(
        store
            .find_sessions_by_account(account.id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_refresh_secret_of_other_account_rejected() {
    let (_, auth) = setup_auth_manager();
    let alice = auth.sign_up(sign_up("alice", "pw1", "a@x.com")).await.unwrap();
    auth.sign_up(sign_up("bob", "pw2", "b@x.com")).await.unwrap();
    let (_, bob_tokens) = auth.sign_in(by_username("bob", "pw2")).await.unwrap();

    let result = auth
        .refresh_access_token(&bob_tokens.refresh_token, alice.id)
        .await;
    assert!(matches!(result, Err(AuthError::InvalidCredentials)));
}

#[tokio::test]
async fn test_multiple_devices_keep_separate_sessions() {
    let (store, auth) = setup_auth_manager();
    let account = auth.sign_up(sign_up("alice", "pw1", "a@x.com")).await.unwrap();

    let (_, laptop) = auth.sign_in(by_username("alice", "pw1")).await.unwrap();
    let (_, phone) = auth.sign_in(by_username("alice", "pw1")).await.unwrap();
    assert_eq!(
        store.find_sessions_by_account(account.id).await.unwrap().len(),
        2
    );

    auth.refresh_access_token(&laptop.refresh_token, account.id)
        .await
        .unwrap();
    auth.refresh_access_token(&phone.refresh_token, account.id)
        .await
        .expect("rotating one device leaves the other usable");
}

#[tokio::test]
async fn test_refresh_routed_by_expired_access_token() {
    let mut config = test_config();
    config.access_token_ttl = Duration::seconds(-60);
    let (_, auth) = setup_with_config(&config);

    let account = auth.sign_up(sign_up("alice", "pw1", "a@x.com")).await.unwrap();
    let (_, tokens) = auth.sign_in(by_username("alice", "pw1")).await.unwrap();

    assert!(matches!(
        auth.verify_access_token(&tokens.access_token),
        Err(AuthError::InvalidToken(_))
    ));

    let account_id = auth
        .account_id_from_expired_token(&tokens.access_token)
        .unwrap();
    assert_eq!(account_id, account.id);
    let (refreshed_account, refreshed) = auth
        .refresh_access_token(&tokens.refresh_token, account_id)
        .await
        .expect("refresh works once the access token has expired");
    assert_eq!(refreshed_account.id, account.id);
    assert_eq!(refreshed_account.username, "alice");

    // The replacement secret is live even though the new access token is
    // already expired
    let next_id = auth
        .account_id_from_expired_token(&refreshed.access_token)
        .unwrap();
    auth.refresh_access_token(&refreshed.refresh_token, next_id)
        .await
        .expect("the rotated secret keeps working");
}

#[tokio::test]
async fn test_update_password() {
    let (_, auth) = setup_auth_manager();
    let account = auth.sign_up(sign_up("alice", "pw1", "a@x.com")).await.unwrap();

    let wrong_old = auth
        .update_password(
            account.id,
            UpdatePasswordRequest {
                old_password: "nope".to_string(),
                new_password: "pw2".to_string(),
            },
        )
        .await;
    assert!(matches!(wrong_old, Err(AuthError::InvalidCredentials)));

    auth.update_password(
        account.id,
        UpdatePasswordRequest {
            old_password: "pw1".to_string(),
            new_password: "pw2".to_string(),
        },
    )
    .await
    .expect("password change should succeed");

    assert!(matches!(
        auth.sign_in(by_username("alice", "pw1")).await,
        Err(AuthError::InvalidCredentials)
    ));
    auth.sign_in(by_username("alice", "pw2"))
        .await
        .expect("new password works");
}

#[tokio::test]
async fn test_update_password_unknown_account() {
    let (_, auth) = setup_auth_manager();

    let result = auth
        .update_password(
            42,
            UpdatePasswordRequest {
                old_password: "pw1".to_string(),
                new_password: "pw2".to_string(),
            },
        )
        .await;
    assert!(matches!(result, Err(AuthError::InvalidCredentials)));
}

#[tokio::test]
async fn test_sign_out_ends_session() {
    let (_, auth) = setup_auth_manager();
    let account = auth.sign_up(sign_up("alice", "pw1", "a@x.com")).await.unwrap();
    let (_, tokens) = auth.sign_in(by_username("alice", "pw1")).await.unwrap();

    auth.sign_out(account.id, &tokens.refresh_token).await.unwrap();

    assert!(matches!(
        auth.refresh_access_token(&tokens.refresh_token, account.id)
            .await,
        Err(AuthError::InvalidCredentials)
    ));
    assert!(matches!(
        auth.sign_out(account.id, &tokens.refresh_token).await,
        Err(AuthError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn test_purge_expired_sessions() {
    let mut config = test_config();
    config.refresh_token_ttl = Duration::seconds(-1);
    let (_, auth) = setup_with_config(&config);

    auth.sign_up(sign_up("alice", "pw1", "a@x.com")).await.unwrap();
    auth.sign_in(by_username("alice", "pw1")).await.unwrap();
    auth.sign_in(by_username("alice", "pw1")).await.unwrap();

    assert_eq!(auth.purge_expired_sessions().await.unwrap(), 2);
    assert_eq!(auth.purge_expired_sessions().await.unwrap(), 0);
}

#[tokio::test]
async fn test_sign_up_validation() {
    let (_, auth) = setup_auth_manager();

    let cases = [
        sign_up("", "pw1", "a@x.com"),
        sign_up("has space", "pw1", "a@x.com"),
        sign_up("alice", "", "a@x.com"),
        sign_up("alice", "pw1", "not-an-email"),
        sign_up("alice", "pw1", "a@b@c"),
    ];
    for request in cases {
        assert!(matches!(
            auth.sign_up(request).await,
            Err(AuthError::Validation(_))
        ));
    }
}

#[tokio::test]
async fn test_authenticate_header() {
    let (_, auth) = setup_auth_manager();
    let account = auth.sign_up(sign_up("alice", "pw1", "a@x.com")).await.unwrap();
    let (_, tokens) = auth.sign_in(by_username("alice", "pw1")).await.unwrap();

    let header = format!("Bearer {}", tokens.access_token);
    let identity = auth.authenticate(Some(&header)).unwrap();
    assert_eq!(identity.account_id(), account.id);

    // The refresh secret is not an access token
    let header = format!("Bearer {}", tokens.refresh_token);
    assert!(matches!(
        auth.authenticate(Some(&header)),
        Err(AuthError::InvalidToken(_))
    ));
}
