/// Error handling for the API server
///
/// Handlers return [`ApiResult`]; engine errors convert through `?` and map
/// onto HTTP status codes:
///
/// | `CoreError` | Status |
/// |---|---|
/// | `Validation` | 422 |
/// | `NotFound` | 404 |
/// | `Conflict` | 409 |
/// | `Authorization` | 403 |
/// | `EntitlementExceeded`, `NoActiveSubscription` | 402 |
/// | `InvariantViolation`, `Database` | 500 |
///
/// Every error body is `{error, message, details?, limit?, used?}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bizdir_shared::auth::jwt::JwtError;
use bizdir_shared::auth::middleware::AuthError;
use bizdir_shared::auth::password::PasswordError;
use bizdir_shared::auth::session::SessionError;
use bizdir_shared::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Payment required (402): the plan does not allow the operation
    PaymentRequired {
        code: &'static str,
        message: String,
        limit: Option<i64>,
        used: Option<i64>,
    },

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409)
    Conflict(String),

    /// Unprocessable entity (422) with per-field details
    ValidationError(Vec<ValidationErrorDetail>),

    /// Unprocessable entity (422) with a single message
    InvalidInput(String),

    /// Internal server error (500)
    InternalError(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable code (e.g. "not_found", "entitlement_exceeded")
    pub error: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub used: Option<i64>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {msg}"),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            ApiError::PaymentRequired { message, .. } => write!(f, "Payment required: {message}"),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            ApiError::NotFound(msg) => write!(f, "Not found: {msg}"),
            ApiError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InvalidInput(msg) => write!(f, "Validation failed: {msg}"),
            ApiError::InternalError(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut limit = None;
        let mut used = None;

        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::PaymentRequired {
                code,
                message,
                limit: l,
                used: u,
            } => {
                limit = l;
                used = u;
                (StatusCode::PAYMENT_REQUIRED, code, message, None)
            }
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::InvalidInput(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg, None)
            }
            ApiError::InternalError(msg) => {
                // Logged here, never shown to clients
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
            limit,
            used,
        });

        (status, body).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => ApiError::InvalidInput(msg),
            err @ CoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            err @ CoreError::Conflict { .. } => ApiError::Conflict(err.to_string()),
            err @ CoreError::Authorization { .. } => ApiError::Forbidden(err.to_string()),
            CoreError::EntitlementExceeded {
                resource_type,
                limit,
                used,
            } => ApiError::PaymentRequired {
                code: "entitlement_exceeded",
                message: format!(
                    "Your plan allows {limit} {resource_type} and {used} are in use; upgrade your plan to add more"
                ),
                limit: Some(limit),
                used: Some(used),
            },
            CoreError::NoActiveSubscription(customer_id) => ApiError::PaymentRequired {
                code: "no_active_subscription",
                message: format!(
                    "Customer {customer_id} has no active subscription; subscribe to a plan to continue"
                ),
                limit: None,
                used: None,
            },
            CoreError::InvariantViolation(msg) => ApiError::InternalError(format!("Invariant violated: {msg}")),
            CoreError::Database(err) => ApiError::from(err),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            _ => ApiError::InternalError(format!("Database error: {err}")),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| ValidationErrorDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::ValidationError(details)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => ApiError::Unauthorized("Missing credentials".to_string()),
            AuthError::InvalidFormat(msg) => ApiError::BadRequest(msg),
            AuthError::InvalidToken(msg) => ApiError::Unauthorized(msg),
            AuthError::SessionRevoked => ApiError::Unauthorized("Session is no longer valid".to_string()),
            AuthError::DatabaseError(msg) => ApiError::InternalError(msg),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {err}"))
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::CreateError(msg) => ApiError::InternalError(format!("Token creation failed: {msg}")),
            _ => ApiError::Unauthorized(format!("Invalid token: {err}")),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
            SessionError::SessionInvalid => ApiError::Unauthorized(err.to_string()),
            SessionError::Jwt(err) => ApiError::from(err),
            SessionError::Password(err) => ApiError::from(err),
            SessionError::Database(err) => ApiError::from(err),
        }
    }
}
