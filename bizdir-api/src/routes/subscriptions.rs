/// Subscription assignment
///
/// ```text
/// POST /v1/subscriptions
///
/// {"customer_id": "...", "plan_id": "...", "duration_override_days": 45}
/// ```
///
/// Requires `subscriptions:assign`. Any in-force subscription of the
/// customer is ended in the same transaction. The length is the override
/// when given, else the plan's trial for a first-time subscriber, else the
/// plan's duration.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, http::StatusCode, Extension, Json};
use bizdir_shared::auth::authorization::{perms, require_permission};
use bizdir_shared::auth::middleware::AuthContext;
use bizdir_shared::models::subscription::{AssignSubscription, Subscription};
use validator::Validate;

pub async fn assign_subscription(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<AssignSubscription>,
) -> ApiResult<(StatusCode, Json<Subscription>)> {
    require_permission(&state.db, auth.user_id, perms::SUBSCRIPTIONS_ASSIGN).await?;
    req.validate()?;

    let subscription = Subscription::assign(&state.db, req).await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}
