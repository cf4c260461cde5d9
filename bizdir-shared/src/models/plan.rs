/// Subscription plan catalog
///
/// A plan carries a price, a default duration, an optional first-time trial
/// and a `features` map whose `max_<resource_type>` entries are the limits
/// enforced by [`crate::entitlement`]. A missing key means unlimited. The
/// catalog keeps one default plan with the same mechanics as customer types.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE subscription_plans (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(100) NOT NULL UNIQUE,
///     price_cents BIGINT NOT NULL,
///     currency CHAR(3) NOT NULL,
///     duration_days INTEGER NOT NULL,
///     trial_days INTEGER NOT NULL DEFAULT 0,
///     is_default BOOLEAN NOT NULL DEFAULT FALSE,
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     features JSONB NOT NULL DEFAULT '{}',
///     modules TEXT[] NOT NULL DEFAULT '{}',
///     ...
/// );
/// ```

use crate::db::singleton::{self, DefaultTable};
use crate::db::tx::{begin_serializable, with_retry};
use crate::error::{CoreError, CoreResult};
use crate::validation::{
    validate_currency, validate_features, validate_modules, validate_not_blank, LIMIT_PREFIX,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

/// Named integer limits, e.g. `max_products -> 10`
pub type FeatureMap = BTreeMap<String, i64>;

/// Limit a feature map sets for `resource_type`; `None` means unlimited
pub fn feature_limit(features: &FeatureMap, resource_type: &str) -> Option<i64> {
    features.get(&format!("{LIMIT_PREFIX}{resource_type}")).copied()
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SubscriptionPlan {
    pub id: Uuid,
    pub name: String,

    /// Price in minor currency units
    pub price_cents: i64,

    /// ISO 4217 code
    pub currency: String,

    pub duration_days: i32,

    /// Length of the first-time trial; 0 disables it
    pub trial_days: i32,

    pub is_default: bool,
    pub is_active: bool,
    pub features: Json<FeatureMap>,
    pub modules: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionPlan {
    /// Limit for `resource_type`, or `None` when unlimited
    pub fn limit_for(&self, resource_type: &str) -> Option<i64> {
        feature_limit(&self.features, resource_type)
    }

    pub fn has_module(&self, module: &str) -> bool {
        self.modules.iter().any(|m| m == module)
    }

    pub fn offers_trial(&self) -> bool {
        self.trial_days > 0
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePlan {
    #[validate(
        length(min = 1, max = 100, message = "Name must be 1-100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: String,

    #[validate(range(min = 0, message = "Price must not be negative"))]
    pub price_cents: i64,

    #[validate(custom(function = "validate_currency"))]
    pub currency: String,

    #[validate(range(min = 1, max = 3650, message = "Duration must be 1-3650 days"))]
    pub duration_days: i32,

    #[serde(default)]
    #[validate(range(min = 0, max = 365, message = "Trial must be 0-365 days"))]
    pub trial_days: i32,

    #[serde(default)]
    pub is_default: bool,

    #[serde(default)]
    #[validate(custom(function = "validate_features"))]
    pub features: FeatureMap,

    #[serde(default)]
    #[validate(custom(function = "validate_modules"))]
    pub modules: Vec<String>,
}

/// Partial plan update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePlan {
    #[validate(
        length(min = 1, max = 100, message = "Name must be 1-100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: Option<String>,

    #[validate(range(min = 0, message = "Price must not be negative"))]
    pub price_cents: Option<i64>,

    #[validate(custom(function = "validate_currency"))]
    pub currency: Option<String>,

    #[validate(range(min = 1, max = 3650, message = "Duration must be 1-3650 days"))]
    pub duration_days: Option<i32>,

    #[validate(range(min = 0, max = 365, message = "Trial must be 0-365 days"))]
    pub trial_days: Option<i32>,

    #[validate(custom(function = "validate_features"))]
    pub features: Option<FeatureMap>,

    #[validate(custom(function = "validate_modules"))]
    pub modules: Option<Vec<String>>,
}

const COLUMNS: &str = "id, name, price_cents, currency, duration_days, trial_days, \
                       is_default, is_active, features, modules, created_at, updated_at";

impl SubscriptionPlan {
    /// Adds a plan to the catalog
    ///
    /// The first plan becomes the default; `is_default` on a later plan swaps
    /// the default in the same transaction.
    ///
    /// # Errors
    ///
    /// - `Validation` for out-of-range price, duration, trial or features
    /// - `Conflict` if the name exists
    pub async fn create(pool: &PgPool, data: CreatePlan) -> CoreResult<Self> {
        data.validate()?;

        let data = &data;
        let plan = with_retry("create subscription plan", || async move {
            let mut tx = begin_serializable(pool).await?;

            let first = !singleton::has_default(&mut tx, DefaultTable::SubscriptionPlans).await?;

            let sql = format!(
                "INSERT INTO subscription_plans
                    (name, price_cents, currency, duration_days, trial_days, is_default, features, modules)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 RETURNING {COLUMNS}"
            );
            let inserted = sqlx::query_as::<_, SubscriptionPlan>(&sql)
                .bind(&data.name)
                .bind(data.price_cents)
                .bind(&data.currency)
                .bind(data.duration_days)
                .bind(data.trial_days)
                .bind(first)
                .bind(Json(&data.features))
                .bind(&data.modules)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| CoreError::conflict_or_database(e, "subscription plan", &data.name))?;

            if data.is_default && !first {
                singleton::swap_default(&mut tx, DefaultTable::SubscriptionPlans, inserted.id).await?;
            } else {
                singleton::assert_single_default(&mut tx, DefaultTable::SubscriptionPlans).await?;
            }

            let row = fetch(&mut tx, inserted.id).await?;
            tx.commit().await?;
            Ok::<_, CoreError>(row)
        })
        .await?;

        tracing::info!(
            plan_id = %plan.id,
            name = %plan.name,
            is_default = plan.is_default,
            "Subscription plan created"
        );
        Ok(plan)
    }

    /// Applies a partial update
    ///
    /// Existing subscriptions keep their computed `expires_at`; only future
    /// assignments and entitlement checks see the new values.
    pub async fn update(pool: &PgPool, id: Uuid, data: UpdatePlan) -> CoreResult<Self> {
        data.validate()?;

        let sql = format!(
            "UPDATE subscription_plans
             SET name = COALESCE($2, name),
                 price_cents = COALESCE($3, price_cents),
                 currency = COALESCE($4, currency),
                 duration_days = COALESCE($5, duration_days),
                 trial_days = COALESCE($6, trial_days),
                 features = COALESCE($7, features),
                 modules = COALESCE($8, modules),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );

        let plan = sqlx::query_as::<_, SubscriptionPlan>(&sql)
            .bind(id)
            .bind(&data.name)
            .bind(data.price_cents)
            .bind(&data.currency)
            .bind(data.duration_days)
            .bind(data.trial_days)
            .bind(data.features.as_ref().map(Json))
            .bind(&data.modules)
            .fetch_optional(pool)
            .await
            .map_err(|e| {
                CoreError::conflict_or_database(
                    e,
                    "subscription plan",
                    data.name.as_deref().unwrap_or_default(),
                )
            })?
            .ok_or_else(|| CoreError::not_found("subscription plan", id))?;

        tracing::info!(plan_id = %id, "Subscription plan updated");
        Ok(plan)
    }

    /// Retires a plan from new assignments
    ///
    /// Subscriptions already on the plan stay in force until they expire or
    /// are replaced.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown id
    /// - `Validation` if the plan is the current default
    pub async fn deactivate(pool: &PgPool, id: Uuid) -> CoreResult<Self> {
        let plan = with_retry("deactivate subscription plan", || async move {
            let mut tx = begin_serializable(pool).await?;

            let is_default: bool = sqlx::query_scalar(
                "SELECT is_default FROM subscription_plans WHERE id = $1 FOR UPDATE",
            )
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CoreError::not_found("subscription plan", id))?;

            if is_default {
                return Err(CoreError::Validation(
                    "the default plan cannot be deactivated; choose another default first".to_string(),
                ));
            }

            sqlx::query(
                "UPDATE subscription_plans SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;

            singleton::assert_single_default(&mut tx, DefaultTable::SubscriptionPlans).await?;

            let row = fetch(&mut tx, id).await?;
            tx.commit().await?;
            Ok::<_, CoreError>(row)
        })
        .await?;

        tracing::info!(plan_id = %id, "Subscription plan deactivated");
        Ok(plan)
    }

    /// Makes `id` the single default plan
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown id
    /// - `Validation` if the plan is inactive
    /// - `InvariantViolation` if the swap cannot settle
    pub async fn set_default(pool: &PgPool, id: Uuid) -> CoreResult<Self> {
        let plan = with_retry("set default subscription plan", || async move {
            let mut tx = begin_serializable(pool).await?;
            singleton::swap_default(&mut tx, DefaultTable::SubscriptionPlans, id).await?;
            let row = fetch(&mut tx, id).await?;
            tx.commit().await?;
            Ok::<_, CoreError>(row)
        })
        .await?;

        tracing::info!(plan_id = %id, "Default subscription plan changed");
        Ok(plan)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {COLUMNS} FROM subscription_plans WHERE id = $1");
        sqlx::query_as::<_, SubscriptionPlan>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Fetches a plan or fails `NotFound`
    pub async fn get(pool: &PgPool, id: Uuid) -> CoreResult<Self> {
        Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| CoreError::not_found("subscription plan", id))
    }

    /// Plans ordered by price, optionally including inactive ones
    pub async fn list(pool: &PgPool, include_inactive: bool) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM subscription_plans
             WHERE is_active OR $1
             ORDER BY price_cents, name"
        );
        sqlx::query_as::<_, SubscriptionPlan>(&sql)
            .bind(include_inactive)
            .fetch_all(pool)
            .await
    }
}

/// Loads a plan inside a transaction
pub(crate) async fn fetch(conn: &mut PgConnection, id: Uuid) -> CoreResult<SubscriptionPlan> {
    let sql = format!("SELECT {COLUMNS} FROM subscription_plans WHERE id = $1");
    sqlx::query_as::<_, SubscriptionPlan>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| CoreError::not_found("subscription plan", id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(features: &[(&str, i64)], modules: &[&str]) -> SubscriptionPlan {
        SubscriptionPlan {
            id: Uuid::new_v4(),
            name: "Growth".to_string(),
            price_cents: 2_900,
            currency: "USD".to_string(),
            duration_days: 30,
            trial_days: 7,
            is_default: false,
            is_active: true,
            features: Json(
                features
                    .iter()
                    .map(|(k, v)| (k.to_string(), *v))
                    .collect(),
            ),
            modules: modules.iter().map(|m| m.to_string()).collect(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_limit_lookup() {
        let p = plan(&[("max_products", 10), ("max_services", 0)], &[]);
        assert_eq!(p.limit_for("products"), Some(10));
        assert_eq!(p.limit_for("services"), Some(0));
        assert_eq!(p.limit_for("blog_posts"), None);
    }

    #[test]
    fn test_feature_limit_reads_prefixed_keys() {
        let features: FeatureMap = [("max_products".to_string(), 3), ("products".to_string(), 9)]
            .into_iter()
            .collect();
        assert_eq!(feature_limit(&features, "products"), Some(3));
        assert_eq!(feature_limit(&features, "max_products"), None);
        assert_eq!(feature_limit(&FeatureMap::new(), "products"), None);
    }

    #[test]
    fn test_modules_and_trial() {
        let p = plan(&[], &["blog", "careers"]);
        assert!(p.has_module("blog"));
        assert!(!p.has_module("gallery"));
        assert!(p.offers_trial());
    }

    #[test]
    fn test_create_plan_validation() {
        let input: CreatePlan = serde_json::from_str(
            r#"{"name":"Starter","price_cents":0,"currency":"USD","duration_days":30,
                "features":{"max_products":5},"modules":["blog"]}"#,
        )
        .unwrap();
        assert_eq!(input.trial_days, 0);
        assert!(input.validate().is_ok());

        let bad = CreatePlan {
            duration_days: 0,
            currency: "usd".to_string(),
            ..input
        };
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("duration_days"));
        assert!(fields.contains_key("currency"));
    }

    #[test]
    fn test_features_serialize_as_plain_map() {
        let p = plan(&[("max_products", 10)], &[]);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["features"]["max_products"], 10);
    }
}
