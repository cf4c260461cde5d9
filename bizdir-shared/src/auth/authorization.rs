/// Permission Gate
///
/// A user is authorized for a permission when they are active and at least
/// one of their roles either carries the permission or is of kind
/// `platform_admin`. There is no separate superuser flag; the bypass is just
/// another role property, answered by the same query.
///
/// # Example
///
/// ```no_run
/// use bizdir_shared::auth::authorization::{perms, require_permission};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, caller: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// require_permission(&pool, caller, perms::ROLES_CREATE).await?;
/// // ... create the role ...
/// # Ok(())
/// # }
/// ```

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Permission names seeded by the identity migration
pub mod perms {
    pub const ROLES_CREATE: &str = "roles:create";
    pub const ROLES_READ: &str = "roles:read";
    pub const ROLES_UPDATE: &str = "roles:update";
    pub const ROLES_DELETE: &str = "roles:delete";
    pub const PERMISSIONS_CREATE: &str = "permissions:create";
    pub const USERS_CREATE: &str = "users:create";
    pub const USERS_UPDATE: &str = "users:update";
    pub const USERS_ASSIGN_ROLE: &str = "users:assign_role";
    pub const CUSTOMER_TYPES_MANAGE: &str = "customer_types:manage";
    pub const CUSTOMERS_MANAGE: &str = "customers:manage";
    pub const PLANS_MANAGE: &str = "plans:manage";
    pub const SUBSCRIPTIONS_ASSIGN: &str = "subscriptions:assign";

    pub const ALL: [&str; 12] = [
        ROLES_CREATE,
        ROLES_READ,
        ROLES_UPDATE,
        ROLES_DELETE,
        PERMISSIONS_CREATE,
        USERS_CREATE,
        USERS_UPDATE,
        USERS_ASSIGN_ROLE,
        CUSTOMER_TYPES_MANAGE,
        CUSTOMERS_MANAGE,
        PLANS_MANAGE,
        SUBSCRIPTIONS_ASSIGN,
    ];
}

/// Whether `user_id` may exercise `permission`
///
/// Unknown or inactive users are never authorized.
pub async fn authorize(pool: &PgPool, user_id: Uuid, permission: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1
            FROM users u
            JOIN user_roles ur ON ur.user_id = u.id
            JOIN roles r ON r.id = ur.role_id
            LEFT JOIN role_permissions rp ON rp.role_id = r.id
            LEFT JOIN permissions p ON p.id = rp.permission_id
            WHERE u.id = $1
              AND u.is_active
              AND (r.kind = 'platform_admin' OR p.name = $2)
        )
        "#,
    )
    .bind(user_id)
    .bind(permission)
    .fetch_one(pool)
    .await
}

/// Like [`authorize`], but a denial is an `Authorization` error
pub async fn require_permission(pool: &PgPool, user_id: Uuid, permission: &str) -> CoreResult<()> {
    if authorize(pool, user_id, permission).await? {
        return Ok(());
    }

    tracing::debug!(user_id = %user_id, permission, "Permission denied");
    Err(CoreError::Authorization {
        permission: permission.to_string(),
    })
}

/// The caller owns the customer or holds `customers:manage`
///
/// # Errors
///
/// - `NotFound` for an unknown customer
/// - `Authorization` when neither condition holds
pub async fn require_customer_access(pool: &PgPool, user_id: Uuid, customer_id: Uuid) -> CoreResult<()> {
    let owner: Option<Option<Uuid>> = sqlx::query_scalar("SELECT owner_id FROM customers WHERE id = $1")
        .bind(customer_id)
        .fetch_optional(pool)
        .await?;

    match owner {
        None => Err(CoreError::not_found("customer", customer_id)),
        Some(Some(owner_id)) if owner_id == user_id => Ok(()),
        Some(_) => require_permission(pool, user_id, perms::CUSTOMERS_MANAGE).await,
    }
}
