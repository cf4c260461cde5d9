/// Entitlement evaluation for tenant content creation
///
/// A customer's in-force subscription plan sets per-resource limits through
/// `max_<resource_type>` feature keys. A missing key means unlimited; no
/// in-force subscription means nothing may be created.
///
/// Two entry points:
///
/// - [`EntitlementEvaluator::can_create`] is a read-only check used for
///   display ("3 of 10 products used").
/// - [`EntitlementEvaluator::reserve`] is the write-path gate. It checks and
///   increments in one statement, so two concurrent creations at
///   `used = limit - 1` yield exactly one success.
///
/// Collaborators call `reserve` before persisting a resource and `release`
/// after deleting one.
///
/// # Example
///
/// ```no_run
/// use bizdir_shared::entitlement::EntitlementEvaluator;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, customer_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let evaluator = EntitlementEvaluator::new(pool);
///
/// // Fails with EntitlementExceeded when the plan has no headroom
/// let reservation = evaluator.reserve(customer_id, "products").await?;
/// println!("{} products used", reservation.used);
///
/// // ... persist the product ...
/// # Ok(())
/// # }
/// ```

use crate::error::{CoreError, CoreResult};
use crate::models::plan::{feature_limit, FeatureMap};
use crate::models::resource_usage::ResourceUsage;
use crate::validation::validate_resource_type;
use serde::Serialize;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Why creation is not allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Customer has no trial or active subscription
    NoActiveSubscription,

    /// `used` has reached `limit`
    EntitlementExceeded,
}

/// Result of an entitlement check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntitlementCheck {
    pub allowed: bool,

    /// Plan limit; `None` means unlimited (or no subscription)
    pub limit: Option<i64>,

    /// Resources of this type currently held
    pub used: i64,

    /// Headroom left; `None` when unlimited
    pub remaining: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenyReason>,
}

impl EntitlementCheck {
    /// Decides from a plan limit and the live count
    pub fn evaluate(limit: Option<i64>, used: i64) -> Self {
        match limit {
            Some(limit) if used >= limit => EntitlementCheck {
                allowed: false,
                limit: Some(limit),
                used,
                remaining: Some(0),
                reason: Some(DenyReason::EntitlementExceeded),
            },
            Some(limit) => EntitlementCheck {
                allowed: true,
                limit: Some(limit),
                used,
                remaining: Some(limit - used),
                reason: None,
            },
            None => EntitlementCheck {
                allowed: true,
                limit: None,
                used,
                remaining: None,
                reason: None,
            },
        }
    }

    pub fn no_subscription(used: i64) -> Self {
        EntitlementCheck {
            allowed: false,
            limit: None,
            used,
            remaining: None,
            reason: Some(DenyReason::NoActiveSubscription),
        }
    }

    /// Converts a denial into the matching error
    pub fn into_result(self, customer_id: Uuid, resource_type: &str) -> CoreResult<Self> {
        match self.reason {
            None => Ok(self),
            Some(DenyReason::NoActiveSubscription) => Err(CoreError::NoActiveSubscription(customer_id)),
            Some(DenyReason::EntitlementExceeded) => Err(CoreError::EntitlementExceeded {
                resource_type: resource_type.to_string(),
                limit: self.limit.unwrap_or(0),
                used: self.used,
            }),
        }
    }
}

/// A successful reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reservation {
    /// Count after the increment
    pub used: i64,
    pub limit: Option<i64>,
}

/// Plan terms currently binding a customer
struct InForceTerms {
    features: FeatureMap,
    modules: Vec<String>,
}

impl InForceTerms {
    fn limit_for(&self, resource_type: &str) -> Option<i64> {
        feature_limit(&self.features, resource_type)
    }
}

/// Entitlement checks against live resource counts
#[derive(Clone)]
pub struct EntitlementEvaluator {
    db: PgPool,
}

impl EntitlementEvaluator {
    pub fn new(db: PgPool) -> Self {
        EntitlementEvaluator { db }
    }

    /// Whether the customer may create one more `resource_type`
    ///
    /// Denials are returned as data; use [`EntitlementCheck::into_result`] or
    /// [`EntitlementEvaluator::reserve`] to turn them into errors.
    ///
    /// # Errors
    ///
    /// - `Validation` for a malformed resource type
    /// - `NotFound` for an unknown customer
    pub async fn can_create(&self, customer_id: Uuid, resource_type: &str) -> CoreResult<EntitlementCheck> {
        check_resource_type(resource_type)?;

        let mut conn = self.db.acquire().await?;
        ensure_customer(&mut conn, customer_id).await?;

        let used = ResourceUsage::count(&mut conn, customer_id, resource_type).await?;

        let check = match in_force_terms(&mut conn, customer_id).await? {
            None => EntitlementCheck::no_subscription(used),
            Some(terms) => EntitlementCheck::evaluate(terms.limit_for(resource_type), used),
        };

        tracing::debug!(
            customer_id = %customer_id,
            resource_type,
            allowed = check.allowed,
            used = check.used,
            limit = ?check.limit,
            "Entitlement checked"
        );
        Ok(check)
    }

    /// Atomically checks the limit and counts one new resource
    ///
    /// # Errors
    ///
    /// - `Validation` for a malformed resource type
    /// - `NotFound` for an unknown customer
    /// - `NoActiveSubscription` without an in-force subscription
    /// - `EntitlementExceeded` when the plan limit is reached
    pub async fn reserve(&self, customer_id: Uuid, resource_type: &str) -> CoreResult<Reservation> {
        check_resource_type(resource_type)?;

        let mut tx = self.db.begin().await?;
        ensure_customer(&mut tx, customer_id).await?;

        let terms = in_force_terms(&mut tx, customer_id)
            .await?
            .ok_or(CoreError::NoActiveSubscription(customer_id))?;
        let limit = terms.limit_for(resource_type);

        let incremented = match limit {
            Some(limit) if limit <= 0 => None,
            _ => ResourceUsage::try_increment(&mut tx, customer_id, resource_type, limit).await?,
        };

        let Some(used) = incremented else {
            let used = ResourceUsage::count(&mut tx, customer_id, resource_type).await?;
            tracing::info!(
                customer_id = %customer_id,
                resource_type,
                used,
                limit = ?limit,
                "Entitlement exceeded"
            );
            return Err(CoreError::EntitlementExceeded {
                resource_type: resource_type.to_string(),
                limit: limit.unwrap_or(0),
                used,
            });
        };

        tx.commit().await?;

        tracing::debug!(customer_id = %customer_id, resource_type, used, "Resource reserved");
        Ok(Reservation { used, limit })
    }

    /// Gives back one unit after a resource is deleted
    ///
    /// Returns the remaining count. Releasing with nothing held is a no-op
    /// returning 0.
    pub async fn release(&self, customer_id: Uuid, resource_type: &str) -> CoreResult<i64> {
        check_resource_type(resource_type)?;

        let mut conn = self.db.acquire().await?;
        ensure_customer(&mut conn, customer_id).await?;
        drop(conn);

        let remaining = ResourceUsage::decrement(&self.db, customer_id, resource_type)
            .await?
            .unwrap_or(0);

        tracing::debug!(customer_id = %customer_id, resource_type, used = remaining, "Resource released");
        Ok(remaining)
    }

    /// Whether the in-force plan enables `module`
    ///
    /// `false` without an in-force subscription.
    pub async fn module_enabled(&self, customer_id: Uuid, module: &str) -> CoreResult<bool> {
        let mut conn = self.db.acquire().await?;
        ensure_customer(&mut conn, customer_id).await?;

        Ok(in_force_terms(&mut conn, customer_id)
            .await?
            .map_or(false, |terms| terms.modules.iter().any(|m| m == module)))
    }
}

fn check_resource_type(resource_type: &str) -> CoreResult<()> {
    validate_resource_type(resource_type).map_err(|_| {
        CoreError::Validation(format!(
            "resource type '{resource_type}' must be a lowercase identifier"
        ))
    })
}

async fn ensure_customer(conn: &mut PgConnection, customer_id: Uuid) -> CoreResult<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM customers WHERE id = $1)")
        .bind(customer_id)
        .fetch_one(&mut *conn)
        .await?;

    if exists {
        Ok(())
    } else {
        Err(CoreError::not_found("customer", customer_id))
    }
}

/// Plan terms of the in-force subscription; elapsed rows do not count
async fn in_force_terms(conn: &mut PgConnection, customer_id: Uuid) -> CoreResult<Option<InForceTerms>> {
    let row: Option<(Json<FeatureMap>, Vec<String>)> = sqlx::query_as(
        r#"
        SELECT p.features, p.modules
        FROM subscriptions s
        JOIN subscription_plans p ON p.id = s.plan_id
        WHERE s.customer_id = $1
          AND s.state IN ('trial', 'active')
          AND s.expires_at > NOW()
        "#,
    )
    .bind(customer_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|(Json(features), modules)| InForceTerms { features, modules }))
}
