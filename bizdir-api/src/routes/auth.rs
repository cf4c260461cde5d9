/// Authentication endpoints
///
/// - `POST /v1/auth/login`: email and password for a token pair
/// - `POST /v1/auth/refresh`: refresh token for a new pair (the old refresh
///   token stops working)
/// - `POST /v1/auth/logout`: revokes the caller's session

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, http::StatusCode, Extension, Json};
use bizdir_shared::auth::middleware::AuthContext;
use bizdir_shared::auth::session::{self, TokenPair};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Login
///
/// ```text
/// POST /v1/auth/login
///
/// {"email": "owner@example.com", "password": "Sup3r-secret!"}
/// ```
///
/// Returns `{access_token, refresh_token, token_type, expires_in, session_id}`.
///
/// # Errors
///
/// - 401 for unknown email, wrong password or an inactive user
/// - 422 for a malformed email
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenPair>> {
    req.validate()?;

    let tokens = session::login(
        &state.db,
        &req.email,
        &req.password,
        state.jwt_secret(),
        state.config.session_ttl(),
    )
    .await?;

    Ok(Json(tokens))
}

/// Rotates the refresh token
///
/// # Errors
///
/// - 401 if the token is invalid, already used, or its session is revoked
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<TokenPair>> {
    let tokens = session::refresh(&state.db, &req.refresh_token, state.jwt_secret()).await?;
    Ok(Json(tokens))
}

/// Ends the current session
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<StatusCode> {
    session::invalidate(&state.db, auth.session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
