/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use bizdir_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = bizdir_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::config::Config;
use crate::routes;
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use bizdir_shared::auth::middleware::create_jwt_middleware;
use bizdir_shared::entitlement::EntitlementEvaluator;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub entitlements: EntitlementEvaluator,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            entitlements: EntitlementEvaluator::new(db.clone()),
            db,
            config: Arc::new(config),
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete router
///
/// ```text
/// /health                                        public
/// /v1/auth/login, /v1/auth/refresh               public
/// /v1/auth/logout                                authenticated
/// /v1/roles[/:id[/permissions[/:name]]]
/// /v1/permissions
/// /v1/users[/:id/deactivate | /:id/roles/:name]
/// /v1/customer-types[/:id[/default | /deactivate]]
/// /v1/customers[/:id[/subscription | /subscriptions | /usage |
///               /entitlement/:resource_type | /resources/:resource_type]]
/// /v1/plans[/:id[/default | /deactivate]]
/// /v1/subscriptions
/// ```
///
/// Every `/v1` route except login and refresh runs behind the bearer-token
/// middleware; handlers then apply the Permission Gate.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh));

    let protected_routes = Router::new()
        .route("/auth/logout", post(routes::auth::logout))
        // Roles and permissions
        .route("/roles", post(routes::roles::create_role).get(routes::roles::list_roles))
        .route("/roles/:id", delete(routes::roles::delete_role))
        .route("/roles/:id/permissions", get(routes::roles::list_role_permissions))
        .route(
            "/roles/:id/permissions/:name",
            post(routes::roles::attach_permission).delete(routes::roles::detach_permission),
        )
        .route(
            "/permissions",
            post(routes::permissions::create_permission).get(routes::permissions::list_permissions),
        )
        // Users
        .route("/users", post(routes::users::create_user))
        .route("/users/:id/deactivate", post(routes::users::deactivate_user))
        .route(
            "/users/:id/roles/:name",
            post(routes::users::assign_role).delete(routes::users::revoke_role),
        )
        // Customer types
        .route(
            "/customer-types",
            post(routes::customer_types::create_customer_type).get(routes::customer_types::list_customer_types),
        )
        .route("/customer-types/:id", put(routes::customer_types::update_customer_type))
        .route("/customer-types/:id/default", put(routes::customer_types::set_default_customer_type))
        .route("/customer-types/:id/deactivate", post(routes::customer_types::deactivate_customer_type))
        // Customers, their subscriptions and entitlements
        .route(
            "/customers",
            post(routes::customers::create_customer).get(routes::customers::list_own_customers),
        )
        .route("/customers/:id", get(routes::customers::get_customer))
        .route("/customers/:id/subscription", get(routes::customers::current_subscription))
        .route("/customers/:id/subscriptions", get(routes::customers::subscription_history))
        .route("/customers/:id/usage", get(routes::customers::resource_usage))
        .route(
            "/customers/:id/entitlement/:resource_type",
            get(routes::customers::check_entitlement),
        )
        .route(
            "/customers/:id/resources/:resource_type",
            post(routes::customers::reserve_resource).delete(routes::customers::release_resource),
        )
        // Plans and subscriptions
        .route("/plans", post(routes::plans::create_plan).get(routes::plans::list_plans))
        .route("/plans/:id", put(routes::plans::update_plan))
        .route("/plans/:id/default", put(routes::plans::set_default_plan))
        .route("/plans/:id/deactivate", post(routes::plans::deactivate_plan))
        .route("/subscriptions", post(routes::subscriptions::assign_subscription))
        .layer(middleware::from_fn(create_jwt_middleware(
            state.db.clone(),
            state.jwt_secret().to_string(),
        )));

    let v1_routes = Router::new().merge(public_routes).merge(protected_routes);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config.api.cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins.iter().filter_map(|origin| origin.parse().ok()).collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}
