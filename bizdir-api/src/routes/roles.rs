/// Role administration
///
/// - `POST /v1/roles` (`roles:create`)
/// - `GET /v1/roles` (`roles:read`)
/// - `DELETE /v1/roles/:id` (`roles:delete`): also removes every edge to the role
/// - `GET /v1/roles/:id/permissions` (`roles:read`)
/// - `POST|DELETE /v1/roles/:id/permissions/:name` (`roles:update`): idempotent

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use bizdir_shared::auth::authorization::{perms, require_permission};
use bizdir_shared::auth::middleware::AuthContext;
use bizdir_shared::models::permission::Permission;
use bizdir_shared::models::role::{CreateRole, Role};
use bizdir_shared::models::role_permission::RolePermission;
use uuid::Uuid;
use validator::Validate;

/// Creates a role
///
/// ```text
/// POST /v1/roles
///
/// {"name": "editor", "description": "Edits listings", "kind": "standard"}
/// ```
///
/// `kind` is `standard` (default) or `platform_admin`.
pub async fn create_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateRole>,
) -> ApiResult<(StatusCode, Json<Role>)> {
    require_permission(&state.db, auth.user_id, perms::ROLES_CREATE).await?;
    req.validate()?;

    let role = Role::create(&state.db, req).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn list_roles(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Role>>> {
    require_permission(&state.db, auth.user_id, perms::ROLES_READ).await?;
    Ok(Json(Role::list(&state.db).await?))
}

pub async fn delete_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, auth.user_id, perms::ROLES_DELETE).await?;
    Role::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_role_permissions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Permission>>> {
    require_permission(&state.db, auth.user_id, perms::ROLES_READ).await?;
    Ok(Json(RolePermission::permissions_for_role(&state.db, id).await?))
}

/// Attaches a permission; 204 whether or not it was already attached
pub async fn attach_permission(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((id, name)): Path<(Uuid, String)>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, auth.user_id, perms::ROLES_UPDATE).await?;
    RolePermission::assign(&state.db, id, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Detaches a permission; a permission the role lacks is a no-op
pub async fn detach_permission(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((id, name)): Path<(Uuid, String)>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, auth.user_id, perms::ROLES_UPDATE).await?;
    RolePermission::remove(&state.db, id, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}
