/// User administration
///
/// - `POST /v1/users` (`users:create`)
/// - `POST /v1/users/:id/deactivate` (`users:update`): also revokes every session
/// - `POST|DELETE /v1/users/:id/roles/:name` (`users:assign_role`): idempotent

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use bizdir_shared::auth::authorization::{perms, require_permission};
use bizdir_shared::auth::middleware::AuthContext;
use bizdir_shared::auth::password::{hash_password, validate_password_strength};
use bizdir_shared::models::user::{CreateUser, User};
use bizdir_shared::models::user_role::UserRole;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,

    #[validate(length(max = 255, message = "Name must be at most 255 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 32, message = "Phone must be at most 32 characters"))]
    pub phone: Option<String>,
}

/// Creates a user
///
/// ```text
/// POST /v1/users
///
/// {"email": "owner@example.com", "password": "Sup3r-secret!", "name": "Dana"}
/// ```
///
/// # Errors
///
/// - 409 if the email is registered
/// - 422 for a malformed email or a weak password
pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    require_permission(&state.db, auth.user_id, perms::USERS_CREATE).await?;
    req.validate()?;

    validate_password_strength(&req.password).map_err(|message| {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "password".to_string(),
            message,
        }])
    })?;

    let user = User::create(
        &state.db,
        CreateUser {
            email: req.email,
            phone: req.phone,
            name: req.name,
            password_hash: hash_password(&req.password)?,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn deactivate_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    require_permission(&state.db, auth.user_id, perms::USERS_UPDATE).await?;
    Ok(Json(User::deactivate(&state.db, id).await?))
}

pub async fn assign_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((id, name)): Path<(Uuid, String)>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, auth.user_id, perms::USERS_ASSIGN_ROLE).await?;
    UserRole::assign(&state.db, id, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn revoke_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((id, name)): Path<(Uuid, String)>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, auth.user_id, perms::USERS_ASSIGN_ROLE).await?;
    UserRole::revoke(&state.db, id, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}
