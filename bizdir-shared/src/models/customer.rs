/// Customer (tenant) model
///
/// A customer belongs to exactly one customer type. When none is given at
/// creation the registry's default at that instant is used, locked until the
/// customer row commits so a concurrent default swap cannot leave it dangling.
///
/// `owner_id` links the user who administers the tenant; the owner passes
/// [`crate::auth::authorization::require_customer_access`] without holding
/// `customers:manage`.

use crate::db::singleton::{has_default, DefaultTable};
use crate::db::tx::MAX_ATTEMPTS;
use crate::error::{CoreError, CoreResult};
use crate::validation::validate_not_blank;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub owner_id: Option<Uuid>,
    pub customer_type_id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCustomer {
    #[validate(
        length(min = 1, max = 255, message = "Name must be 1-255 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(max = 32, message = "Phone must be at most 32 characters"))]
    pub phone: Option<String>,

    pub owner_id: Option<Uuid>,

    /// Falls back to the default customer type when absent
    pub customer_type_id: Option<Uuid>,
}

const COLUMNS: &str =
    "id, name, email, phone, owner_id, customer_type_id, is_active, created_at, updated_at";

/// Reads and share-locks the default customer type
///
/// A locked read that waited on an in-flight default swap skips the row that
/// lost the flag, and the new default is outside that statement's snapshot,
/// so it comes back empty. Each pass is a fresh statement and sees the
/// committed swap; only an unlocked read confirming there is no default at
/// all ends the lookup with `None`.
async fn lock_default_type(conn: &mut PgConnection) -> CoreResult<Option<(Uuid, bool)>> {
    for _ in 0..MAX_ATTEMPTS {
        let row: Option<(Uuid, bool)> =
            sqlx::query_as("SELECT id, is_active FROM customer_types WHERE is_default FOR SHARE")
                .fetch_optional(&mut *conn)
                .await?;

        if row.is_some() || !has_default(conn, DefaultTable::CustomerTypes).await? {
            return Ok(row);
        }

        tracing::debug!("Default customer type moved during lookup, reading again");
    }

    Err(CoreError::InvariantViolation(format!(
        "default customer type kept moving after {MAX_ATTEMPTS} reads"
    )))
}

impl Customer {
    /// Registers a customer
    ///
    /// # Errors
    ///
    /// - `Validation` for bad fields, an inactive type, or no default type
    ///   when none was given
    /// - `NotFound` for an unknown type or owner
    pub async fn create(pool: &PgPool, data: CreateCustomer) -> CoreResult<Self> {
        data.validate()?;

        let mut tx = pool.begin().await?;

        // FOR SHARE holds the chosen type (and the default flag) until commit
        let type_row: Option<(Uuid, bool)> = match data.customer_type_id {
            Some(type_id) => {
                sqlx::query_as("SELECT id, is_active FROM customer_types WHERE id = $1 FOR SHARE")
                    .bind(type_id)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            None => lock_default_type(&mut *tx).await?,
        };

        let customer_type_id = match (type_row, data.customer_type_id) {
            (Some((id, true)), _) => id,
            (Some((id, false)), _) => {
                return Err(CoreError::Validation(format!("customer type {id} is inactive")))
            }
            (None, Some(type_id)) => return Err(CoreError::not_found("customer type", type_id)),
            (None, None) => {
                return Err(CoreError::Validation(
                    "no default customer type exists; create one or pass customer_type_id"
                        .to_string(),
                ))
            }
        };

        if let Some(owner_id) = data.owner_id {
            let owner: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1")
                .bind(owner_id)
                .fetch_optional(&mut *tx)
                .await?;
            if owner.is_none() {
                return Err(CoreError::not_found("user", owner_id));
            }
        }

        let sql = format!(
            "INSERT INTO customers (name, email, phone, owner_id, customer_type_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(&data.name)
            .bind(&data.email)
            .bind(&data.phone)
            .bind(data.owner_id)
            .bind(customer_type_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            customer_id = %customer.id,
            customer_type_id = %customer.customer_type_id,
            "Customer created"
        );
        Ok(customer)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {COLUMNS} FROM customers WHERE id = $1");
        sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Fetches a customer or fails `NotFound`
    pub async fn get(pool: &PgPool, id: Uuid) -> CoreResult<Self> {
        Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| CoreError::not_found("customer", id))
    }

    /// Customers owned by a user
    pub async fn list_by_owner(pool: &PgPool, owner_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM customers WHERE owner_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Customer>(&sql)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Marks a customer inactive; its subscriptions are left as history
    pub async fn deactivate(pool: &PgPool, id: Uuid) -> CoreResult<Self> {
        let sql = format!(
            "UPDATE customers SET is_active = FALSE, updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| CoreError::not_found("customer", id))?;

        tracing::info!(customer_id = %id, "Customer deactivated");
        Ok(customer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_customer_validation() {
        let input: CreateCustomer =
            serde_json::from_str(r#"{"name":"Acme Bakery","email":"hello@acme.test"}"#).unwrap();
        assert!(input.customer_type_id.is_none());
        assert!(input.validate().is_ok());

        let bad = CreateCustomer {
            email: "nope".to_string(),
            ..input
        };
        assert!(bad.validate().is_err());
    }
}
