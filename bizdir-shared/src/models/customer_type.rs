/// Customer type registry
///
/// Tenant classifications. Exactly one active type is the default whenever
/// any type exists; new customers without an explicit type get it. Types are
/// soft-deleted only so historical customer references stay valid.
///
/// Every mutation that touches `is_default` runs in a SERIALIZABLE
/// transaction through [`with_retry`] and re-checks the single-default
/// invariant before committing.
///
/// # Example
///
/// ```no_run
/// use bizdir_shared::models::customer_type::{CustomerType, CreateCustomerType};
/// # use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let retail = CustomerType::create(&pool, CreateCustomerType {
///     name: "Retail".to_string(),
///     description: "Shops and stores".to_string(),
///     is_default: false,
/// }).await?;
///
/// CustomerType::set_default(&pool, retail.id).await?;
/// # Ok(())
/// # }
/// ```

use crate::db::singleton::{self, DefaultTable};
use crate::db::tx::{begin_serializable, with_retry};
use crate::error::{CoreError, CoreResult};
use crate::validation::validate_not_blank;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CustomerType {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCustomerType {
    #[validate(
        length(min = 1, max = 100, message = "Name must be 1-100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: String,

    #[serde(default)]
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: String,

    /// Make this the default; ignored for the first type, which always is
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateCustomerType {
    #[validate(
        length(min = 1, max = 100, message = "Name must be 1-100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: Option<String>,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
}

const COLUMNS: &str = "id, name, description, is_default, is_active, created_at, updated_at";

impl CustomerType {
    /// Registers a type
    ///
    /// The first type ever created becomes the default. A later create with
    /// `is_default` swaps the default to the new row in the same transaction.
    ///
    /// # Errors
    ///
    /// - `Validation` for a blank or overlong name
    /// - `Conflict` if the name exists
    /// - `InvariantViolation` if the default swap cannot settle
    pub async fn create(pool: &PgPool, data: CreateCustomerType) -> CoreResult<Self> {
        data.validate()?;

        let data = &data;
        let created = with_retry("create customer type", || async move {
            let mut tx = begin_serializable(pool).await?;

            let first = !singleton::has_default(&mut tx, DefaultTable::CustomerTypes).await?;

            let sql = format!(
                "INSERT INTO customer_types (name, description, is_default)
                 VALUES ($1, $2, $3)
                 RETURNING {COLUMNS}"
            );
            let inserted = sqlx::query_as::<_, CustomerType>(&sql)
                .bind(&data.name)
                .bind(&data.description)
                .bind(first)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| CoreError::conflict_or_database(e, "customer type", &data.name))?;

            if data.is_default && !first {
                singleton::swap_default(&mut tx, DefaultTable::CustomerTypes, inserted.id).await?;
            } else {
                singleton::assert_single_default(&mut tx, DefaultTable::CustomerTypes).await?;
            }

            let row = fetch(&mut tx, inserted.id).await?;
            tx.commit().await?;
            Ok::<_, CoreError>(row)
        })
        .await?;

        tracing::info!(
            customer_type_id = %created.id,
            name = %created.name,
            is_default = created.is_default,
            "Customer type created"
        );
        Ok(created)
    }

    /// Renames or re-describes a type
    pub async fn update(pool: &PgPool, id: Uuid, data: UpdateCustomerType) -> CoreResult<Self> {
        data.validate()?;

        let sql = format!(
            "UPDATE customer_types
             SET name = COALESCE($2, name),
                 description = COALESCE($3, description),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );

        sqlx::query_as::<_, CustomerType>(&sql)
            .bind(id)
            .bind(&data.name)
            .bind(&data.description)
            .fetch_optional(pool)
            .await
            .map_err(|e| {
                CoreError::conflict_or_database(e, "customer type", data.name.as_deref().unwrap_or_default())
            })?
            .ok_or_else(|| CoreError::not_found("customer type", id))
    }

    /// Soft-deletes a type
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown id
    /// - `Validation` if the type is the current default
    pub async fn deactivate(pool: &PgPool, id: Uuid) -> CoreResult<Self> {
        let deactivated = with_retry("deactivate customer type", || async move {
            let mut tx = begin_serializable(pool).await?;

            let current: Option<bool> =
                sqlx::query_scalar("SELECT is_default FROM customer_types WHERE id = $1 FOR UPDATE")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;

            match current {
                None => return Err(CoreError::not_found("customer type", id)),
                Some(true) => {
                    return Err(CoreError::Validation(
                        "the default customer type cannot be deactivated; choose another default first"
                            .to_string(),
                    ))
                }
                Some(false) => {}
            }

            sqlx::query("UPDATE customer_types SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;

            singleton::assert_single_default(&mut tx, DefaultTable::CustomerTypes).await?;

            let row = fetch(&mut tx, id).await?;
            tx.commit().await?;
            Ok::<_, CoreError>(row)
        })
        .await?;

        tracing::info!(customer_type_id = %id, "Customer type deactivated");
        Ok(deactivated)
    }

    /// Makes `id` the single default
    ///
    /// Clears the previous default and sets the new one atomically; a
    /// concurrent reader sees exactly one default throughout. Of two racing
    /// calls, the serializable retry ensures both settle with one winner.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown id
    /// - `Validation` if the type is inactive
    /// - `InvariantViolation` if the swap cannot settle
    pub async fn set_default(pool: &PgPool, id: Uuid) -> CoreResult<Self> {
        let updated = with_retry("set default customer type", || async move {
            let mut tx = begin_serializable(pool).await?;
            singleton::swap_default(&mut tx, DefaultTable::CustomerTypes, id).await?;
            let row = fetch(&mut tx, id).await?;
            tx.commit().await?;
            Ok::<_, CoreError>(row)
        })
        .await?;

        tracing::info!(customer_type_id = %id, "Default customer type changed");
        Ok(updated)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {COLUMNS} FROM customer_types WHERE id = $1");
        sqlx::query_as::<_, CustomerType>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Fetches a type or fails `NotFound`
    pub async fn get(pool: &PgPool, id: Uuid) -> CoreResult<Self> {
        Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| CoreError::not_found("customer type", id))
    }

    /// The current default, if any type exists
    pub async fn default_type(pool: &PgPool) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {COLUMNS} FROM customer_types WHERE is_default");
        sqlx::query_as::<_, CustomerType>(&sql)
            .fetch_optional(pool)
            .await
    }

    /// All types ordered by name, optionally including inactive ones
    pub async fn list(pool: &PgPool, include_inactive: bool) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM customer_types WHERE is_active OR $1 ORDER BY name"
        );
        sqlx::query_as::<_, CustomerType>(&sql)
            .bind(include_inactive)
            .fetch_all(pool)
            .await
    }
}

async fn fetch(conn: &mut PgConnection, id: Uuid) -> CoreResult<CustomerType> {
    let sql = format!("SELECT {COLUMNS} FROM customer_types WHERE id = $1");
    sqlx::query_as::<_, CustomerType>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| CoreError::not_found("customer type", id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_defaults_from_json() {
        let input: CreateCustomerType = serde_json::from_str(r#"{"name":"Retail"}"#).unwrap();
        assert_eq!(input.description, "");
        assert!(!input.is_default);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_update_validation() {
        let empty = UpdateCustomerType::default();
        assert!(empty.validate().is_ok());

        let blank = UpdateCustomerType {
            name: Some(" ".to_string()),
            description: None,
        };
        assert!(blank.validate().is_err());
    }
}
