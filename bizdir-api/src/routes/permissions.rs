/// Permission catalog
///
/// - `POST /v1/permissions` (`permissions:create`): names look like `resource:action`
/// - `GET /v1/permissions` (`roles:read`)

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, http::StatusCode, Extension, Json};
use bizdir_shared::auth::authorization::{perms, require_permission};
use bizdir_shared::auth::middleware::AuthContext;
use bizdir_shared::models::permission::{CreatePermission, Permission};
use validator::Validate;

pub async fn create_permission(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreatePermission>,
) -> ApiResult<(StatusCode, Json<Permission>)> {
    require_permission(&state.db, auth.user_id, perms::PERMISSIONS_CREATE).await?;
    req.validate()?;

    let permission = Permission::create(&state.db, req).await?;
    Ok((StatusCode::CREATED, Json(permission)))
}

pub async fn list_permissions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Permission>>> {
    require_permission(&state.db, auth.user_id, perms::ROLES_READ).await?;
    Ok(Json(Permission::list(&state.db).await?))
}
