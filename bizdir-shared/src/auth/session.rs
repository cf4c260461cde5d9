/// Session lifecycle: login, refresh, logout
///
/// Every token pair belongs to a row in `sessions`. The access token carries
/// the session id (`sid`) and is re-checked against that row on every request;
/// the refresh token is single-use, its hash is swapped on each refresh.
///
/// # Example
///
/// ```no_run
/// use bizdir_shared::auth::session;
/// use chrono::Duration;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "a-secret-of-at-least-thirty-two-bytes!";
/// let tokens = session::login(&pool, "owner@example.com", "Sup3r-secret!", secret, Duration::days(30)).await?;
///
/// let rotated = session::refresh(&pool, &tokens.refresh_token, secret).await?;
/// session::invalidate(&pool, rotated.session_id).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use super::jwt::{create_token, validate_refresh_token, Claims, JwtError, TokenType};
use super::password::{verify_password, PasswordError};
use crate::models::session::Session;
use crate::models::user::User;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Unknown email, wrong password or inactive user
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Refresh token is well-formed but no longer usable
    #[error("Session is no longer valid")]
    SessionInvalid,

    #[error(transparent)]
    Jwt(#[from] JwtError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Tokens handed to the client
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,

    /// Access token lifetime in seconds
    pub expires_in: i64,

    pub session_id: Uuid,
}

/// Hex SHA-256 of a refresh token, as stored on the session
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Compares two strings without short-circuiting on the first difference
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Checks credentials and opens a session
///
/// All credential failures collapse into `InvalidCredentials` so callers
/// cannot probe which emails are registered.
pub async fn login(
    pool: &PgPool,
    email: &str,
    password: &str,
    secret: &str,
    ttl: Duration,
) -> Result<TokenPair, SessionError> {
    let user = User::find_by_email(pool, email)
        .await?
        .ok_or(SessionError::InvalidCredentials)?;

    if !user.is_active || !verify_password(password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "Login rejected");
        return Err(SessionError::InvalidCredentials);
    }

    let tokens = create(pool, user.id, secret, ttl).await?;
    User::update_last_login(pool, user.id).await?;

    tracing::info!(user_id = %user.id, session_id = %tokens.session_id, "User logged in");
    Ok(tokens)
}

/// Issues a new session for `user_id` lasting `ttl`
pub async fn create(
    pool: &PgPool,
    user_id: Uuid,
    secret: &str,
    ttl: Duration,
) -> Result<TokenPair, SessionError> {
    let session_id = Uuid::new_v4();

    let refresh_claims = Claims::with_expiration(user_id, session_id, TokenType::Refresh, ttl);
    let refresh_token = create_token(&refresh_claims, secret)?;
    let expires_at = Utc::now() + ttl;

    Session::create(pool, session_id, user_id, &hash_token(&refresh_token), expires_at).await?;

    issue_access(user_id, session_id, refresh_token, secret)
}

/// Exchanges a refresh token for a new pair, rotating the refresh token
///
/// The new refresh token expires with the session; refreshing never extends
/// a session.
pub async fn refresh(pool: &PgPool, refresh_token: &str, secret: &str) -> Result<TokenPair, SessionError> {
    let claims = validate_refresh_token(refresh_token, secret)?;

    let session = Session::find_by_id(pool, claims.sid)
        .await?
        .ok_or(SessionError::SessionInvalid)?;

    let now = Utc::now();
    let presented_hash = hash_token(refresh_token);
    if session.user_id != claims.sub
        || !session.is_active_at(now)
        || !constant_time_compare(&presented_hash, &session.refresh_token_hash)
    {
        tracing::warn!(session_id = %session.id, "Refresh rejected");
        return Err(SessionError::SessionInvalid);
    }

    let user_active = User::find_by_id(pool, session.user_id)
        .await?
        .map_or(false, |user| user.is_active);
    if !user_active {
        return Err(SessionError::SessionInvalid);
    }

    let new_claims = Claims::with_expiration(
        session.user_id,
        session.id,
        TokenType::Refresh,
        session.expires_at - now,
    );
    let new_refresh = create_token(&new_claims, secret)?;

    if !Session::rotate(pool, session.id, &presented_hash, &hash_token(&new_refresh)).await? {
        // Lost a race with another refresh of the same token
        return Err(SessionError::SessionInvalid);
    }

    tracing::debug!(session_id = %session.id, "Session refreshed");
    issue_access(session.user_id, session.id, new_refresh, secret)
}

/// Revokes a session; its tokens stop working immediately
pub async fn invalidate(pool: &PgPool, session_id: Uuid) -> Result<bool, SessionError> {
    let revoked = Session::revoke(pool, session_id).await?;
    if revoked {
        tracing::info!(session_id = %session_id, "Session revoked");
    }
    Ok(revoked)
}

fn issue_access(
    user_id: Uuid,
    session_id: Uuid,
    refresh_token: String,
    secret: &str,
) -> Result<TokenPair, SessionError> {
    let access_claims = Claims::new(user_id, session_id, TokenType::Access);
    let access_token = create_token(&access_claims, secret)?;

    Ok(TokenPair {
        access_token,
        refresh_token,
        token_type: "Bearer",
        expires_in: TokenType::Access.default_expiration().num_seconds(),
        session_id,
    })
}
