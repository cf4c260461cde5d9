/// Subscription ledger
///
/// Each customer has a history of subscriptions. At most one row is in force
/// (`trial` or `active`) at any time, backed by the partial unique index
/// `subscriptions_single_in_force`. Rows are never deleted; superseded rows
/// move to a terminal state.
///
/// ```text
/// None ──assign──▶ Trial | Active ──assign──▶ Replaced
///                       │
///                       └──now ≥ expires_at──▶ Expired
/// ```
///
/// Expiry is lazy. [`Subscription::current`] only returns rows whose
/// `expires_at` is still in the future, so correctness never depends on the
/// worker's sweep having run.
///
/// # Example
///
/// ```no_run
/// use bizdir_shared::models::subscription::{Subscription, AssignSubscription};
/// # use sqlx::PgPool;
/// # use uuid::Uuid;
///
/// # async fn example(pool: PgPool, customer_id: Uuid, plan_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let sub = Subscription::assign(&pool, AssignSubscription {
///     customer_id,
///     plan_id,
///     duration_override_days: None,
/// }).await?;
///
/// println!("{:?} until {}", sub.state, sub.expires_at);
/// # Ok(())
/// # }
/// ```

use super::plan::SubscriptionPlan;
use crate::error::{violates_constraint, CoreError, CoreResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

const SINGLE_IN_FORCE_INDEX: &str = "subscriptions_single_in_force";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_state", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    /// First-time trial, in force but not billed
    Trial,

    /// Paid and in force
    Active,

    /// Superseded by a later assignment (terminal)
    Replaced,

    /// Ran past `expires_at` (terminal)
    Expired,
}

impl SubscriptionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionState::Trial => "trial",
            SubscriptionState::Active => "active",
            SubscriptionState::Replaced => "replaced",
            SubscriptionState::Expired => "expired",
        }
    }

    /// Trial and Active are treated identically by entitlement checks
    pub fn is_in_force(&self) -> bool {
        matches!(self, SubscriptionState::Trial | SubscriptionState::Active)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_in_force()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub plan_id: Uuid,

    /// Stored state; see [`Subscription::effective_state`] for reads
    pub state: SubscriptionState,

    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,

    /// Set when the row became Replaced or Expired
    pub ended_at: Option<DateTime<Utc>>,

    pub duration_override_days: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// State as of `now`, treating elapsed in-force rows as Expired
    pub fn effective_state(&self, now: DateTime<Utc>) -> SubscriptionState {
        if self.state.is_in_force() && self.expires_at <= now {
            SubscriptionState::Expired
        } else {
            self.state
        }
    }

    pub fn is_in_force_at(&self, now: DateTime<Utc>) -> bool {
        self.effective_state(now).is_in_force()
    }
}

/// Input for [`Subscription::assign`]
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AssignSubscription {
    pub customer_id: Uuid,
    pub plan_id: Uuid,

    /// Takes precedence over trial and plan duration when positive
    #[validate(range(max = 3650, message = "Override must be at most 3650 days"))]
    pub duration_override_days: Option<i32>,
}

/// Outcome of duration resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDuration {
    pub days: i32,
    pub state: SubscriptionState,
}

/// Picks the subscription length
///
/// Precedence: a positive override, then the plan's trial when the customer
/// has never held a subscription and the plan offers one, then the plan's
/// duration. Only the trial branch yields [`SubscriptionState::Trial`].
pub fn resolve_duration(
    override_days: Option<i32>,
    trial_days: i32,
    duration_days: i32,
    has_prior_subscription: bool,
) -> ResolvedDuration {
    match override_days {
        Some(days) if days > 0 => ResolvedDuration {
            days,
            state: SubscriptionState::Active,
        },
        _ if !has_prior_subscription && trial_days > 0 => ResolvedDuration {
            days: trial_days,
            state: SubscriptionState::Trial,
        },
        _ => ResolvedDuration {
            days: duration_days,
            state: SubscriptionState::Active,
        },
    }
}

/// What happened to the previously in-force row during an assignment
fn predecessor_outcome(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> (SubscriptionState, DateTime<Utc>) {
    if expires_at <= now {
        (SubscriptionState::Expired, expires_at)
    } else {
        (SubscriptionState::Replaced, now)
    }
}

const COLUMNS: &str = "id, customer_id, plan_id, state, started_at, expires_at, ended_at, \
                       duration_override_days, created_at";

impl Subscription {
    /// Assigns a plan to a customer, ending any in-force subscription
    ///
    /// Runs in one transaction holding the customer row lock, so two
    /// concurrent assignments for the same customer serialize and a reader
    /// never sees zero or two in-force rows. Replacement is destructive: no
    /// proration or refund.
    ///
    /// # Errors
    ///
    /// - `Validation` if the override is out of range or the customer is inactive
    /// - `NotFound` if the customer is missing, or the plan is missing or inactive
    /// - `InvariantViolation` if the single-in-force index is violated
    pub async fn assign(pool: &PgPool, data: AssignSubscription) -> CoreResult<Self> {
        data.validate()?;

        let mut tx = pool.begin().await?;

        let customer_active: bool =
            sqlx::query_scalar("SELECT is_active FROM customers WHERE id = $1 FOR UPDATE")
                .bind(data.customer_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| CoreError::not_found("customer", data.customer_id))?;

        if !customer_active {
            return Err(CoreError::Validation(format!(
                "customer {} is inactive",
                data.customer_id
            )));
        }

        let plan = super::plan::fetch(&mut tx, data.plan_id).await?;
        if !plan.is_active {
            return Err(CoreError::not_found("subscription plan", data.plan_id));
        }

        let has_prior: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM subscriptions WHERE customer_id = $1)")
                .bind(data.customer_id)
                .fetch_one(&mut *tx)
                .await?;

        let resolved = resolve_duration(
            data.duration_override_days,
            plan.trial_days,
            plan.duration_days,
            has_prior,
        );

        // Database clock read after the row lock, so queued assignments get ordered timestamps
        let now: DateTime<Utc> = sqlx::query_scalar("SELECT clock_timestamp()")
            .fetch_one(&mut *tx)
            .await?;

        let predecessor: Option<(Uuid, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, expires_at FROM subscriptions
             WHERE customer_id = $1 AND state IN ('trial', 'active')",
        )
        .bind(data.customer_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some((previous_id, previous_expiry)) = predecessor {
            let (state, ended_at) = predecessor_outcome(previous_expiry, now);
            sqlx::query("UPDATE subscriptions SET state = $2, ended_at = $3 WHERE id = $1")
                .bind(previous_id)
                .bind(state)
                .bind(ended_at)
                .execute(&mut *tx)
                .await?;

            tracing::info!(
                customer_id = %data.customer_id,
                subscription_id = %previous_id,
                state = state.as_str(),
                "Previous subscription ended"
            );
        }

        let expires_at = now + Duration::days(i64::from(resolved.days));
        let sql = format!(
            "INSERT INTO subscriptions
                (customer_id, plan_id, state, started_at, expires_at, duration_override_days)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        let subscription = sqlx::query_as::<_, Subscription>(&sql)
            .bind(data.customer_id)
            .bind(plan.id)
            .bind(resolved.state)
            .bind(now)
            .bind(expires_at)
            .bind(data.duration_override_days)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if violates_constraint(&e, SINGLE_IN_FORCE_INDEX) {
                    tracing::error!(customer_id = %data.customer_id, "Two in-force subscriptions");
                    CoreError::InvariantViolation(format!(
                        "customer {} would hold two in-force subscriptions",
                        data.customer_id
                    ))
                } else {
                    CoreError::Database(e)
                }
            })?;

        tx.commit().await?;

        tracing::info!(
            customer_id = %subscription.customer_id,
            subscription_id = %subscription.id,
            plan_id = %subscription.plan_id,
            state = subscription.state.as_str(),
            days = resolved.days,
            "Subscription assigned"
        );
        Ok(subscription)
    }

    /// The customer's in-force subscription as of `now`, if any
    pub async fn current(
        pool: &PgPool,
        customer_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM subscriptions
             WHERE customer_id = $1
               AND state IN ('trial', 'active')
               AND expires_at > $2"
        );
        sqlx::query_as::<_, Subscription>(&sql)
            .bind(customer_id)
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// The in-force subscription together with its plan
    pub async fn current_with_plan(
        pool: &PgPool,
        customer_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<(Self, SubscriptionPlan)>, sqlx::Error> {
        let Some(subscription) = Self::current(pool, customer_id, now).await? else {
            return Ok(None);
        };

        let plan = SubscriptionPlan::find_by_id(pool, subscription.plan_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        Ok(Some((subscription, plan)))
    }

    /// Full history, newest first
    pub async fn history(pool: &PgPool, customer_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM subscriptions
             WHERE customer_id = $1
             ORDER BY started_at DESC, created_at DESC"
        );
        sqlx::query_as::<_, Subscription>(&sql)
            .bind(customer_id)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {COLUMNS} FROM subscriptions WHERE id = $1");
        sqlx::query_as::<_, Subscription>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Persists Expired for every in-force row past its expiry
    ///
    /// Returns the number of rows transitioned. Safe to run concurrently with
    /// assignments: both only touch rows still in an in-force state.
    pub async fn expire_elapsed(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET state = 'expired', ended_at = expires_at
            WHERE state IN ('trial', 'active')
              AND expires_at <= NOW()
            "#,
        )
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins() {
        let resolved = resolve_duration(Some(45), 7, 30, false);
        assert_eq!(resolved.days, 45);
        assert_eq!(resolved.state, SubscriptionState::Active);
    }

    #[test]
    fn test_first_time_trial() {
        let resolved = resolve_duration(None, 7, 30, false);
        assert_eq!(resolved.days, 7);
        assert_eq!(resolved.state, SubscriptionState::Trial);
    }

    #[test]
    fn test_trial_only_once() {
        let resolved = resolve_duration(None, 7, 30, true);
        assert_eq!(resolved.days, 30);
        assert_eq!(resolved.state, SubscriptionState::Active);
    }

    #[test]
    fn test_no_trial_offered() {
        let resolved = resolve_duration(None, 0, 30, false);
        assert_eq!(resolved.days, 30);
        assert_eq!(resolved.state, SubscriptionState::Active);
    }

    #[test]
    fn test_non_positive_override_ignored() {
        assert_eq!(resolve_duration(Some(0), 7, 30, false).state, SubscriptionState::Trial);
        assert_eq!(resolve_duration(Some(-5), 0, 30, true).days, 30);
    }

    #[test]
    fn test_predecessor_outcome() {
        let now = Utc::now();

        let (state, ended) = predecessor_outcome(now + Duration::days(3), now);
        assert_eq!(state, SubscriptionState::Replaced);
        assert_eq!(ended, now);

        let expired_at = now - Duration::hours(1);
        let (state, ended) = predecessor_outcome(expired_at, now);
        assert_eq!(state, SubscriptionState::Expired);
        assert_eq!(ended, expired_at);
    }

    #[test]
    fn test_effective_state_is_lazy_expiry() {
        let now = Utc::now();
        let sub = Subscription {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
            state: SubscriptionState::Active,
            started_at: now - Duration::days(30),
            expires_at: now - Duration::seconds(1),
            ended_at: None,
            duration_override_days: None,
            created_at: now - Duration::days(30),
        };

        assert_eq!(sub.effective_state(now), SubscriptionState::Expired);
        assert!(!sub.is_in_force_at(now));
        assert_eq!(
            sub.effective_state(now - Duration::days(1)),
            SubscriptionState::Active
        );

        let replaced = Subscription {
            state: SubscriptionState::Replaced,
            ..sub
        };
        assert_eq!(replaced.effective_state(now), SubscriptionState::Replaced);
    }

    #[test]
    fn test_state_classification() {
        assert!(SubscriptionState::Trial.is_in_force());
        assert!(SubscriptionState::Active.is_in_force());
        assert!(SubscriptionState::Replaced.is_terminal());
        assert!(SubscriptionState::Expired.is_terminal());
        assert_eq!(
            serde_json::to_string(&SubscriptionState::Trial).unwrap(),
            "\"trial\""
        );
    }
}
