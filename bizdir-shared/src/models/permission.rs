/// Permission catalog
///
/// Permissions are named `resource:action`. Once a role references a
/// permission the row cannot be deleted (`ON DELETE RESTRICT`); it can only be
/// detached. The built-in names checked by the API are listed in
/// [`crate::auth::perms`] and seeded by the identity migration.

use crate::error::{CoreError, CoreResult};
use crate::validation::validate_permission_name;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Permission {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePermission {
    #[validate(
        length(max = 100, message = "Name must be at most 100 characters"),
        custom(function = "validate_permission_name")
    )]
    pub name: String,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
}

impl Permission {
    /// Adds a permission to the catalog
    ///
    /// # Errors
    ///
    /// - `Validation` if the name is not `resource:action`
    /// - `Conflict` if the name exists
    pub async fn create(pool: &PgPool, data: CreatePermission) -> CoreResult<Self> {
        data.validate()?;

        sqlx::query_as::<_, Permission>(
            r#"
            INSERT INTO permissions (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, created_at
            "#,
        )
        .bind(&data.name)
        .bind(&data.description)
        .fetch_one(pool)
        .await
        .map_err(|e| CoreError::conflict_or_database(e, "permission", &data.name))
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Permission>(
            "SELECT id, name, description, created_at FROM permissions ORDER BY name",
        )
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_permission_validation() {
        let ok = CreatePermission {
            name: "products:create".to_string(),
            description: Some("Create products".to_string()),
        };
        assert!(ok.validate().is_ok());

        let bad = CreatePermission {
            name: "create products".to_string(),
            description: None,
        };
        let errors = bad.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
    }
}
