/// Customer type registry
///
/// All mutations need `customer_types:manage`; listing needs only a session.
/// Exactly one active type is the default at any time.

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use bizdir_shared::auth::authorization::{perms, require_permission};
use bizdir_shared::auth::middleware::AuthContext;
use bizdir_shared::models::customer_type::{CreateCustomerType, CustomerType, UpdateCustomerType};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

/// Registers a type
///
/// ```text
/// POST /v1/customer-types
///
/// {"name": "Restaurant", "description": "Food and drink", "is_default": false}
/// ```
pub async fn create_customer_type(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateCustomerType>,
) -> ApiResult<(StatusCode, Json<CustomerType>)> {
    require_permission(&state.db, auth.user_id, perms::CUSTOMER_TYPES_MANAGE).await?;
    req.validate()?;

    let customer_type = CustomerType::create(&state.db, req).await?;
    Ok((StatusCode::CREATED, Json(customer_type)))
}

pub async fn list_customer_types(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<CustomerType>>> {
    Ok(Json(CustomerType::list(&state.db, query.include_inactive).await?))
}

pub async fn update_customer_type(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCustomerType>,
) -> ApiResult<Json<CustomerType>> {
    require_permission(&state.db, auth.user_id, perms::CUSTOMER_TYPES_MANAGE).await?;
    req.validate()?;

    Ok(Json(CustomerType::update(&state.db, id, req).await?))
}

/// Makes the type the single default
pub async fn set_default_customer_type(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CustomerType>> {
    require_permission(&state.db, auth.user_id, perms::CUSTOMER_TYPES_MANAGE).await?;
    Ok(Json(CustomerType::set_default(&state.db, id).await?))
}

/// Soft-deletes the type; the current default is refused with 422
pub async fn deactivate_customer_type(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CustomerType>> {
    require_permission(&state.db, auth.user_id, perms::CUSTOMER_TYPES_MANAGE).await?;
    Ok(Json(CustomerType::deactivate(&state.db, id).await?))
}
