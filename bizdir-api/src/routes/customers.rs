/// Customers and their per-tenant views
///
/// Creation needs `customers:manage`. Every `/customers/:id/...` route is
/// open to the customer's owner or any holder of `customers:manage`.
///
/// Content-management services call `POST .../resources/:resource_type`
/// before persisting a new resource and `DELETE` after removing one; a full
/// plan answers 402 `entitlement_exceeded` with `limit` and `used`.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use bizdir_shared::auth::authorization::{perms, require_customer_access, require_permission};
use bizdir_shared::auth::middleware::AuthContext;
use bizdir_shared::entitlement::{EntitlementCheck, Reservation};
use bizdir_shared::models::customer::{CreateCustomer, Customer};
use bizdir_shared::models::resource_usage::ResourceUsage;
use bizdir_shared::models::subscription::Subscription;
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

/// Registers a customer
///
/// ```text
/// POST /v1/customers
///
/// {"name": "Corner Bakery", "email": "hello@bakery.example", "owner_id": "..."}
/// ```
///
/// Without `customer_type_id` the default type is used.
pub async fn create_customer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateCustomer>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    require_permission(&state.db, auth.user_id, perms::CUSTOMERS_MANAGE).await?;
    req.validate()?;

    let customer = Customer::create(&state.db, req).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

/// Customers the caller owns
pub async fn list_own_customers(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Customer>>> {
    Ok(Json(Customer::list_by_owner(&state.db, auth.user_id).await?))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Customer>> {
    require_customer_access(&state.db, auth.user_id, id).await?;
    Ok(Json(Customer::get(&state.db, id).await?))
}

/// The in-force subscription; 404 when there is none
pub async fn current_subscription(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Subscription>> {
    require_customer_access(&state.db, auth.user_id, id).await?;

    Subscription::current(&state.db, id, Utc::now())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("customer {id} has no subscription in force")))
}

/// Subscription history, newest first, with elapsed rows shown as expired
pub async fn subscription_history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Subscription>>> {
    require_customer_access(&state.db, auth.user_id, id).await?;

    let now = Utc::now();
    let history = Subscription::history(&state.db, id)
        .await?
        .into_iter()
        .map(|mut subscription| {
            subscription.state = subscription.effective_state(now);
            subscription
        })
        .collect();

    Ok(Json(history))
}

/// Every usage counter the customer has, by resource type
pub async fn resource_usage(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<ResourceUsage>>> {
    require_customer_access(&state.db, auth.user_id, id).await?;
    Ok(Json(ResourceUsage::list_for_customer(&state.db, id).await?))
}

/// Read-only entitlement check
///
/// ```text
/// GET /v1/customers/:id/entitlement/products
///
/// {"allowed": false, "limit": 10, "used": 10, "remaining": 0, "reason": "entitlement_exceeded"}
/// ```
pub async fn check_entitlement(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((id, resource_type)): Path<(Uuid, String)>,
) -> ApiResult<Json<EntitlementCheck>> {
    require_customer_access(&state.db, auth.user_id, id).await?;
    Ok(Json(state.entitlements.can_create(id, &resource_type).await?))
}

/// Counts one new resource against the plan limit
pub async fn reserve_resource(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((id, resource_type)): Path<(Uuid, String)>,
) -> ApiResult<(StatusCode, Json<Reservation>)> {
    require_customer_access(&state.db, auth.user_id, id).await?;

    let reservation = state.entitlements.reserve(id, &resource_type).await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// Gives back one resource after deletion
pub async fn release_resource(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((id, resource_type)): Path<(Uuid, String)>,
) -> ApiResult<StatusCode> {
    require_customer_access(&state.db, auth.user_id, id).await?;

    state.entitlements.release(id, &resource_type).await?;
    Ok(StatusCode::NO_CONTENT)
}
