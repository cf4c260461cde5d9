/// User model and database operations
///
/// Users are platform-global. They are deactivated, never hard-deleted; a
/// deactivated user fails every Permission Gate check and cannot log in.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email CITEXT NOT NULL UNIQUE,
///     phone VARCHAR(32),
///     name VARCHAR(255),
///     password_hash VARCHAR(255) NOT NULL,
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use bizdir_shared::models::user::{User, CreateUser};
/// use bizdir_shared::auth::password::hash_password;
/// # use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let user = User::create(&pool, CreateUser {
///     email: "owner@acme.test".to_string(),
///     phone: None,
///     name: Some("Acme Owner".to_string()),
///     password_hash: hash_password("correct horse battery")?,
/// }).await?;
///
/// User::deactivate(&pool, user.id).await?;
/// # Ok(())
/// # }
/// ```

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Login handle, unique case-insensitively
    pub email: String,

    pub phone: Option<String>,

    pub name: Option<String>,

    /// Argon2id hash; never serialized
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    /// Inactive users are denied by the Permission Gate
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// `None` until the first successful login
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a user
///
/// `password_hash` must already be an Argon2id hash.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUser {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(max = 32, message = "Phone must be at most 32 characters"))]
    pub phone: Option<String>,

    #[validate(length(max = 255, message = "Name must be at most 255 characters"))]
    pub name: Option<String>,

    pub password_hash: String,
}

const USER_COLUMNS: &str =
    "id, email, phone, name, password_hash, is_active, created_at, updated_at, last_login_at";

impl User {
    /// Creates a user
    ///
    /// # Errors
    ///
    /// - `Validation` for a malformed email, phone or name
    /// - `Conflict` if the email is already registered
    pub async fn create(pool: &PgPool, data: CreateUser) -> CoreResult<Self> {
        data.validate()?;

        let sql = format!(
            "INSERT INTO users (email, phone, name, password_hash)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(&data.email)
            .bind(&data.phone)
            .bind(&data.name)
            .bind(&data.password_hash)
            .fetch_one(pool)
            .await
            .map_err(|e| CoreError::conflict_or_database(e, "user", &data.email))
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by email, ignoring case
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1::citext");
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Fetches a user or fails `NotFound`
    pub async fn get(pool: &PgPool, id: Uuid) -> CoreResult<Self> {
        Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| CoreError::not_found("user", id))
    }

    /// Marks a user inactive
    ///
    /// Idempotent: deactivating an inactive user returns it unchanged. Open
    /// sessions are revoked in the same transaction.
    pub async fn deactivate(pool: &PgPool, id: Uuid) -> CoreResult<Self> {
        let mut tx = pool.begin().await?;

        let sql = format!(
            "UPDATE users SET is_active = FALSE, updated_at = NOW()
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CoreError::not_found("user", id))?;

        sqlx::query(
            "UPDATE sessions SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(user_id = %id, "User deactivated");
        Ok(user)
    }

    /// Records a successful login
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Lists users, newest first
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input(email: &str) -> CreateUser {
        CreateUser {
            email: email.to_string(),
            phone: None,
            name: Some("Test".to_string()),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
        }
    }

    #[test]
    fn test_create_user_validation() {
        assert!(sample_input("owner@acme.test").validate().is_ok());
        assert!(sample_input("not-an-email").validate().is_err());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            email: "owner@acme.test".to_string(),
            phone: None,
            name: None,
            password_hash: "secret-hash".to_string(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_login_at: None,
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("owner@acme.test"));
    }
}
