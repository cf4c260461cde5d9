/// User ↔ role edges
///
/// A set: `(user_id, role_id)` is the primary key, so re-assigning a held role
/// is `ON CONFLICT DO NOTHING` and revoking an absent one deletes zero rows.
/// Both are successes; only an unknown user or role is an error.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE user_roles (
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role_id UUID NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (user_id, role_id)
/// );
/// ```

use super::role::Role;
use crate::error::{CoreError, CoreResult};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

pub struct UserRole;

impl UserRole {
    /// Gives `user_id` the role named `role_name`
    ///
    /// Returns `true` when a new edge was written, `false` when it was already
    /// held.
    ///
    /// # Errors
    ///
    /// `NotFound` if the user or role does not exist.
    pub async fn assign(pool: &PgPool, user_id: Uuid, role_name: &str) -> CoreResult<bool> {
        let mut tx = pool.begin().await?;
        let role_id = resolve(&mut tx, user_id, role_name).await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, role_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(role_id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        tx.commit().await?;

        if inserted {
            tracing::info!(user_id = %user_id, role = role_name, "Role assigned");
        }
        Ok(inserted)
    }

    /// Removes the role named `role_name` from `user_id`
    ///
    /// Returns whether an edge was removed.
    pub async fn revoke(pool: &PgPool, user_id: Uuid, role_name: &str) -> CoreResult<bool> {
        let mut tx = pool.begin().await?;
        let role_id = resolve(&mut tx, user_id, role_name).await?;

        let removed = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id)
            .bind(role_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        tx.commit().await?;

        if removed {
            tracing::info!(user_id = %user_id, role = role_name, "Role revoked");
        }
        Ok(removed)
    }

    /// Roles held by a user, ordered by name
    pub async fn roles_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Role>, sqlx::Error> {
        sqlx::query_as::<_, Role>(
            r#"
            SELECT r.id, r.name, r.description, r.kind, r.created_at
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}

async fn resolve(conn: &mut PgConnection, user_id: Uuid, role_name: &str) -> CoreResult<Uuid> {
    let user: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
    if user.is_none() {
        return Err(CoreError::not_found("user", user_id));
    }

    // FOR SHARE keeps a concurrent role delete from slipping in before the insert
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM roles WHERE name = $1 FOR SHARE")
        .bind(role_name)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| CoreError::not_found("role", role_name))
}
