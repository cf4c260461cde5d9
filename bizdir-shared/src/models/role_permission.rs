/// Role ↔ permission edges
///
/// Same set semantics as `user_role`: attach is `ON CONFLICT DO NOTHING`,
/// detach of an absent edge is a no-op. Detaching never fails on an unknown
/// permission name, since such a permission cannot be attached.

use super::permission::Permission;
use crate::error::{CoreError, CoreResult};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

pub struct RolePermission;

impl RolePermission {
    /// Attaches `permission_name` to the role
    ///
    /// # Errors
    ///
    /// `NotFound` if the role or the permission does not exist.
    pub async fn assign(pool: &PgPool, role_id: Uuid, permission_name: &str) -> CoreResult<bool> {
        let mut tx = pool.begin().await?;
        lock_role(&mut tx, role_id).await?;

        let permission_id: Uuid =
            sqlx::query_scalar("SELECT id FROM permissions WHERE name = $1")
                .bind(permission_name)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| CoreError::not_found("permission", permission_name))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id)
            VALUES ($1, $2)
            ON CONFLICT (role_id, permission_id) DO NOTHING
            "#,
        )
        .bind(role_id)
        .bind(permission_id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        tx.commit().await?;

        if inserted {
            tracing::info!(role_id = %role_id, permission = permission_name, "Permission attached");
        }
        Ok(inserted)
    }

    /// Detaches `permission_name` from the role
    ///
    /// # Errors
    ///
    /// `NotFound` only if the role does not exist.
    pub async fn remove(pool: &PgPool, role_id: Uuid, permission_name: &str) -> CoreResult<bool> {
        let mut tx = pool.begin().await?;
        lock_role(&mut tx, role_id).await?;

        let removed = sqlx::query(
            r#"
            DELETE FROM role_permissions rp
            USING permissions p
            WHERE rp.permission_id = p.id
              AND rp.role_id = $1
              AND p.name = $2
            "#,
        )
        .bind(role_id)
        .bind(permission_name)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        tx.commit().await?;

        if removed {
            tracing::info!(role_id = %role_id, permission = permission_name, "Permission detached");
        }
        Ok(removed)
    }

    /// Permissions attached to a role, ordered by name
    ///
    /// # Errors
    ///
    /// `NotFound` if the role does not exist.
    pub async fn permissions_for_role(pool: &PgPool, role_id: Uuid) -> CoreResult<Vec<Permission>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM roles WHERE id = $1)")
            .bind(role_id)
            .fetch_one(pool)
            .await?;
        if !exists {
            return Err(CoreError::not_found("role", role_id));
        }

        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT p.id, p.name, p.description, p.created_at
            FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.id
            WHERE rp.role_id = $1
            ORDER BY p.name
            "#,
        )
        .bind(role_id)
        .fetch_all(pool)
        .await?;

        Ok(permissions)
    }
}

async fn lock_role(conn: &mut PgConnection, role_id: Uuid) -> CoreResult<()> {
    let found: Option<Uuid> = sqlx::query_scalar("SELECT id FROM roles WHERE id = $1 FOR SHARE")
        .bind(role_id)
        .fetch_optional(&mut *conn)
        .await?;

    found
        .map(|_| ())
        .ok_or_else(|| CoreError::not_found("role", role_id))
}
