/// Per-customer resource counters
///
/// Content collaborators (products, services, blog posts, ...) persist their
/// own rows; the engine only tracks how many of each type a customer holds.
/// The counter is moved exclusively through the conditional upsert in
/// [`ResourceUsage::try_increment`] and the floor-at-zero decrement in
/// [`ResourceUsage::decrement`].
///
/// # Schema
///
/// ```sql
/// CREATE TABLE resource_usage (
///     customer_id UUID NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
///     resource_type VARCHAR(64) NOT NULL,
///     count BIGINT NOT NULL DEFAULT 0 CHECK (count >= 0),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (customer_id, resource_type)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ResourceUsage {
    pub customer_id: Uuid,
    pub resource_type: String,
    pub count: i64,
    pub updated_at: DateTime<Utc>,
}

impl ResourceUsage {
    /// Current count, 0 when the customer never created this type
    pub async fn count(
        conn: &mut PgConnection,
        customer_id: Uuid,
        resource_type: &str,
    ) -> Result<i64, sqlx::Error> {
        let count: Option<i64> = sqlx::query_scalar(
            "SELECT count FROM resource_usage WHERE customer_id = $1 AND resource_type = $2",
        )
        .bind(customer_id)
        .bind(resource_type)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(count.unwrap_or(0))
    }

    /// Adds one unless the count has reached `limit`
    ///
    /// Check and increment happen in a single statement. Concurrent callers on
    /// the same key queue on the row lock and each re-evaluates the `WHERE`
    /// against the committed count, so the limit is never overshot. `None`
    /// means unlimited.
    ///
    /// Returns the new count, or `None` when the limit was already reached.
    pub async fn try_increment(
        conn: &mut PgConnection,
        customer_id: Uuid,
        resource_type: &str,
        limit: Option<i64>,
    ) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            INSERT INTO resource_usage (customer_id, resource_type, count)
            VALUES ($1, $2, 1)
            ON CONFLICT (customer_id, resource_type)
            DO UPDATE SET count = resource_usage.count + 1, updated_at = NOW()
            WHERE $3::BIGINT IS NULL OR resource_usage.count < $3::BIGINT
            RETURNING count
            "#,
        )
        .bind(customer_id)
        .bind(resource_type)
        .bind(limit)
        .fetch_optional(&mut *conn)
        .await
    }

    /// Subtracts one, never going below zero
    ///
    /// Returns the new count, or `None` if nothing was held.
    pub async fn decrement(
        pool: &PgPool,
        customer_id: Uuid,
        resource_type: &str,
    ) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            UPDATE resource_usage
            SET count = count - 1, updated_at = NOW()
            WHERE customer_id = $1 AND resource_type = $2 AND count > 0
            RETURNING count
            "#,
        )
        .bind(customer_id)
        .bind(resource_type)
        .fetch_optional(pool)
        .await
    }

    /// All counters for a customer, ordered by type
    pub async fn list_for_customer(pool: &PgPool, customer_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ResourceUsage>(
            r#"
            SELECT customer_id, resource_type, count, updated_at
            FROM resource_usage
            WHERE customer_id = $1
            ORDER BY resource_type
            "#,
        )
        .bind(customer_id)
        .fetch_all(pool)
        .await
    }
}
