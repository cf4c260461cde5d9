/// Error taxonomy for the identity, RBAC and entitlement engine
///
/// Every engine operation returns [`CoreResult`]. Idempotent no-ops (re-adding
/// an edge, removing an absent one) are successes and never reach this type.
///
/// | Variant | Meaning |
/// |---|---|
/// | `Validation` | Malformed input, rejected before any mutation |
/// | `NotFound` | Referenced entity is absent |
/// | `Conflict` | Unique name already taken |
/// | `Authorization` | Permission Gate denial |
/// | `EntitlementExceeded` | Plan limit reached, carries limit/used |
/// | `NoActiveSubscription` | Tenant has no trial/active subscription |
/// | `InvariantViolation` | Internal consistency check failed (always a bug) |
/// | `Database` | Datastore failure |

use uuid::Uuid;

/// Postgres SQLSTATE for serialization failures
pub const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";

/// Postgres SQLSTATE for detected deadlocks
pub const SQLSTATE_DEADLOCK: &str = "40P01";

/// Postgres SQLSTATE for unique constraint violations
pub const SQLSTATE_UNIQUE_VIOLATION: &str = "23505";

/// Engine error type
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Input failed validation
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Referenced entity does not exist
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Unique name already in use
    #[error("{entity} already exists: {key}")]
    Conflict { entity: &'static str, key: String },

    /// Caller lacks the named permission
    #[error("Permission denied: requires {permission}")]
    Authorization { permission: String },

    /// Plan limit reached for a resource type
    #[error("Entitlement exceeded for {resource_type} ({used}/{limit})")]
    EntitlementExceeded {
        resource_type: String,
        limit: i64,
        used: i64,
    },

    /// Customer has no subscription in force
    #[error("No active subscription for customer {0}")]
    NoActiveSubscription(Uuid),

    /// Internal consistency check failed
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result alias for engine operations
pub type CoreResult<T> = Result<T, CoreError>;

impl From<validator::ValidationErrors> for CoreError {
    fn from(errors: validator::ValidationErrors) -> Self {
        CoreError::Validation(errors.to_string())
    }
}

impl CoreError {
    /// Shorthand for [`CoreError::NotFound`]
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        CoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Maps a unique-name violation to `Conflict`, leaving other errors as `Database`
    ///
    /// Only `UNIQUE` constraints (named `*_key` by Postgres) are treated as name
    /// clashes; violations of the single-default and single-in-force indexes
    /// stay `Database` so the retry loop can see them.
    pub fn conflict_or_database(err: sqlx::Error, entity: &'static str, key: impl ToString) -> Self {
        if is_unique_key_violation(&err) {
            return CoreError::Conflict {
                entity,
                key: key.to_string(),
            };
        }
        CoreError::Database(err)
    }

    /// Whether a serializable transaction that failed with this error may be retried
    ///
    /// Serialization failures and deadlocks always qualify. A unique violation
    /// qualifies only on a `*_single_default` index, which is how two racing
    /// default swaps collide.
    pub fn is_retryable(&self) -> bool {
        let CoreError::Database(sqlx::Error::Database(db_err)) = self else {
            return false;
        };

        match db_err.code().as_deref() {
            Some(SQLSTATE_SERIALIZATION_FAILURE) | Some(SQLSTATE_DEADLOCK) => true,
            Some(SQLSTATE_UNIQUE_VIOLATION) => db_err
                .constraint()
                .map_or(false, |name| name.ends_with("_single_default")),
            _ => false,
        }
    }
}

/// Whether `err` violated the named unique index or constraint
pub fn violates_constraint(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint() == Some(constraint),
        _ => false,
    }
}

fn is_unique_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some(SQLSTATE_UNIQUE_VIOLATION)
                && db_err.constraint().map_or(true, |name| name.ends_with("_key"))
        }
        _ => false,
    }
}

/// Extracts the SQLSTATE code of a database error, if any
pub fn sqlstate(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().map(|code| code.into_owned()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::not_found("role", "editor");
        assert_eq!(err.to_string(), "role not found: editor");

        let err = CoreError::EntitlementExceeded {
            resource_type: "products".to_string(),
            limit: 10,
            used: 10,
        };
        assert_eq!(err.to_string(), "Entitlement exceeded for products (10/10)");

        let err = CoreError::Authorization {
            permission: "roles:create".to_string(),
        };
        assert!(err.to_string().contains("roles:create"));
    }

    #[test]
    fn test_non_database_errors_are_not_retryable() {
        assert!(!CoreError::Validation("bad".into()).is_retryable());
        assert!(!CoreError::InvariantViolation("two defaults".into()).is_retryable());
        assert!(!CoreError::Database(sqlx::Error::RowNotFound).is_retryable());
    }

    #[test]
    fn test_conflict_or_database_passthrough() {
        let err = CoreError::conflict_or_database(sqlx::Error::RowNotFound, "role", "x");
        assert!(matches!(err, CoreError::Database(_)));
    }

    #[test]
    fn test_sqlstate_of_non_database_error() {
        assert!(sqlstate(&sqlx::Error::PoolTimedOut).is_none());
        assert!(!violates_constraint(&sqlx::Error::PoolTimedOut, "roles_name_key"));
    }
}
