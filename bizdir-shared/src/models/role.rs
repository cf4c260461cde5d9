/// Role model and database operations
///
/// Roles are platform-global, uniquely named, and hold a set of permissions
/// (see `role_permission`). A role of kind [`RoleKind::PlatformAdmin`] passes
/// every Permission Gate check regardless of its permission set; the seeded
/// `superuser` role is one.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE role_kind AS ENUM ('standard', 'platform_admin');
///
/// CREATE TABLE roles (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(100) NOT NULL UNIQUE,
///     description TEXT,
///     kind role_kind NOT NULL DEFAULT 'standard',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use crate::error::{CoreError, CoreResult};
use crate::validation::validate_not_blank;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

/// Name of the seeded platform administrator role
pub const SUPERUSER_ROLE: &str = "superuser";

/// Role variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "role_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    /// Grants exactly its attached permissions
    #[default]
    Standard,

    /// Bypasses permission lookup entirely
    PlatformAdmin,
}

impl RoleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKind::Standard => "standard",
            RoleKind::PlatformAdmin => "platform_admin",
        }
    }

    pub fn bypasses_permissions(&self) -> bool {
        matches!(self, RoleKind::PlatformAdmin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub kind: RoleKind,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a role
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRole {
    #[validate(
        length(min = 1, max = 100, message = "Name must be 1-100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: String,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    #[serde(default)]
    pub kind: RoleKind,
}

impl Role {
    /// Creates a role
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty or overlong name
    /// - `Conflict` if the name is taken
    pub async fn create(pool: &PgPool, data: CreateRole) -> CoreResult<Self> {
        data.validate()?;

        let role = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (name, description, kind)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, kind, created_at
            "#,
        )
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.kind)
        .fetch_one(pool)
        .await
        .map_err(|e| CoreError::conflict_or_database(e, "role", &data.name))?;

        tracing::info!(role_id = %role.id, name = %role.name, kind = role.kind.as_str(), "Role created");
        Ok(role)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Role>(
            "SELECT id, name, description, kind, created_at FROM roles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Fetches a role or fails `NotFound`
    pub async fn get(pool: &PgPool, id: Uuid) -> CoreResult<Self> {
        Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| CoreError::not_found("role", id))
    }

    /// All roles ordered by name
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Role>(
            "SELECT id, name, description, kind, created_at FROM roles ORDER BY name",
        )
        .fetch_all(pool)
        .await
    }

    /// Deletes a role together with every user and permission edge
    ///
    /// Edges are removed explicitly inside the transaction so the cascade
    /// does not depend on foreign key actions.
    pub async fn delete(pool: &PgPool, id: Uuid) -> CoreResult<()> {
        let mut tx = pool.begin().await?;

        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM roles WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(CoreError::not_found("role", id));
        }

        let users = sqlx::query("DELETE FROM user_roles WHERE role_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let permissions = sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            role_id = %id,
            detached_users = users,
            detached_permissions = permissions,
            "Role deleted"
        );
        Ok(())
    }
}
