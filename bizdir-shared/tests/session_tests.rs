//! Session lifecycle against a live database

mod common;

use bizdir_shared::auth::password::hash_password;
use bizdir_shared::auth::session::{self, SessionError};
use bizdir_shared::models::session::Session;
use bizdir_shared::models::user::User;
use chrono::Duration;
use common::{create_user_with_hash, test_pool};

const SECRET: &str = "integration-test-secret-at-least-32-bytes";
const PASSWORD: &str = "C0rrect-Horse!";

#[tokio::test]
async fn test_login_refresh_logout() {
    let Some(pool) = test_pool().await else { return };
    let user = create_user_with_hash(&pool, &hash_password(PASSWORD).unwrap()).await;

    let tokens = session::login(&pool, &user.email, PASSWORD, SECRET, Duration::days(30))
        .await
        .unwrap();
    assert!(Session::is_valid_for_user(&pool, tokens.session_id, user.id).await.unwrap());
    assert!(User::get(&pool, user.id).await.unwrap().last_login_at.is_some());

    let rotated = session::refresh(&pool, &tokens.refresh_token, SECRET).await.unwrap();
    assert_eq!(rotated.session_id, tokens.session_id);
    assert_ne!(rotated.refresh_token, tokens.refresh_token);

    // The old refresh token is spent
    assert!(matches!(
        session::refresh(&pool, &tokens.refresh_token, SECRET).await,
        Err(SessionError::SessionInvalid)
    ));

    assert!(session::invalidate(&pool, rotated.session_id).await.unwrap());
    assert!(!session::invalidate(&pool, rotated.session_id).await.unwrap());
    assert!(!Session::is_valid_for_user(&pool, rotated.session_id, user.id).await.unwrap());
    assert!(matches!(
        session::refresh(&pool, &rotated.refresh_token, SECRET).await,
        Err(SessionError::SessionInvalid)
    ));
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let Some(pool) = test_pool().await else { return };
    let user = create_user_with_hash(&pool, &hash_password(PASSWORD).unwrap()).await;

    assert!(matches!(
        session::login(&pool, &user.email, "Wr0ng-password!", SECRET, Duration::days(1)).await,
        Err(SessionError::InvalidCredentials)
    ));
    assert!(matches!(
        session::login(&pool, "nobody@example.com", PASSWORD, SECRET, Duration::days(1)).await,
        Err(SessionError::InvalidCredentials)
    ));

    User::deactivate(&pool, user.id).await.unwrap();
    assert!(matches!(
        session::login(&pool, &user.email, PASSWORD, SECRET, Duration::days(1)).await,
        Err(SessionError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn test_deactivation_revokes_sessions() {
    let Some(pool) = test_pool().await else { return };
    let user = create_user_with_hash(&pool, &hash_password(PASSWORD).unwrap()).await;

    let tokens = session::login(&pool, &user.email, PASSWORD, SECRET, Duration::days(30))
        .await
        .unwrap();

    User::deactivate(&pool, user.id).await.unwrap();

    let stored = Session::find_by_id(&pool, tokens.session_id).await.unwrap().unwrap();
    assert!(stored.revoked_at.is_some());
    assert!(!Session::is_valid_for_user(&pool, tokens.session_id, user.id).await.unwrap());
    assert!(session::refresh(&pool, &tokens.refresh_token, SECRET).await.is_err());
}

#[tokio::test]
async fn test_email_lookup_is_case_insensitive() {
    let Some(pool) = test_pool().await else { return };
    let user = create_user_with_hash(&pool, &hash_password(PASSWORD).unwrap()).await;

    let tokens = session::login(&pool, &user.email.to_uppercase(), PASSWORD, SECRET, Duration::days(1))
        .await
        .unwrap();
    assert!(Session::is_valid_for_user(&pool, tokens.session_id, user.id).await.unwrap());
}

#[tokio::test]
async fn test_stale_sessions_purged() {
    let Some(pool) = test_pool().await else { return };
    let user = create_user_with_hash(&pool, &hash_password(PASSWORD).unwrap()).await;

    let tokens = session::create(&pool, user.id, SECRET, Duration::days(1)).await.unwrap();
    sqlx::query("UPDATE sessions SET revoked_at = NOW() - INTERVAL '60 days' WHERE id = $1")
        .bind(tokens.session_id)
        .execute(&pool)
        .await
        .unwrap();

    assert!(Session::purge_stale(&pool, 30).await.unwrap() >= 1);
    assert!(Session::find_by_id(&pool, tokens.session_id).await.unwrap().is_none());
}
