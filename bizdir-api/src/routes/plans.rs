/// Subscription plan catalog
///
/// Mutations need `plans:manage`; listing needs only a session. Plan
/// features are `max_<resource_type>` limits, e.g.
/// `{"max_products": 10, "max_services": 5}`; a missing key is unlimited.

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use bizdir_shared::auth::authorization::{perms, require_permission};
use bizdir_shared::auth::middleware::AuthContext;
use bizdir_shared::models::plan::{CreatePlan, SubscriptionPlan, UpdatePlan};
use uuid::Uuid;
use validator::Validate;

use super::customer_types::ListQuery;

/// Adds a plan
///
/// ```text
/// POST /v1/plans
///
/// {
///   "name": "Starter",
///   "price_cents": 1900,
///   "currency": "USD",
///   "duration_days": 30,
///   "trial_days": 7,
///   "features": {"max_products": 10},
///   "modules": ["catalog"]
/// }
/// ```
pub async fn create_plan(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreatePlan>,
) -> ApiResult<(StatusCode, Json<SubscriptionPlan>)> {
    require_permission(&state.db, auth.user_id, perms::PLANS_MANAGE).await?;
    req.validate()?;

    let plan = SubscriptionPlan::create(&state.db, req).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

pub async fn list_plans(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<SubscriptionPlan>>> {
    Ok(Json(SubscriptionPlan::list(&state.db, query.include_inactive).await?))
}

/// Partial update; existing subscriptions see new limits immediately
pub async fn update_plan(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePlan>,
) -> ApiResult<Json<SubscriptionPlan>> {
    require_permission(&state.db, auth.user_id, perms::PLANS_MANAGE).await?;
    req.validate()?;

    Ok(Json(SubscriptionPlan::update(&state.db, id, req).await?))
}

pub async fn set_default_plan(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SubscriptionPlan>> {
    require_permission(&state.db, auth.user_id, perms::PLANS_MANAGE).await?;
    Ok(Json(SubscriptionPlan::set_default(&state.db, id).await?))
}

pub async fn deactivate_plan(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SubscriptionPlan>> {
    require_permission(&state.db, auth.user_id, perms::PLANS_MANAGE).await?;
    Ok(Json(SubscriptionPlan::deactivate(&state.db, id).await?))
}
