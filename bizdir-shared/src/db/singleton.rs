/// Single-default bookkeeping for customer types and subscription plans
///
/// Both tables carry `is_default` and `is_active` columns, a partial unique
/// index allowing at most one default row, and a check that the default is
/// active. The functions here run inside a caller's SERIALIZABLE transaction
/// so a concurrent reader sees either the old default or the new one.

use crate::error::{CoreError, CoreResult};
use sqlx::PgConnection;
use tracing::error;
use uuid::Uuid;

/// Tables that keep exactly one default row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultTable {
    CustomerTypes,
    SubscriptionPlans,
}

impl DefaultTable {
    pub fn table(self) -> &'static str {
        match self {
            DefaultTable::CustomerTypes => "customer_types",
            DefaultTable::SubscriptionPlans => "subscription_plans",
        }
    }

    /// Entity name used in errors
    pub fn entity(self) -> &'static str {
        match self {
            DefaultTable::CustomerTypes => "customer type",
            DefaultTable::SubscriptionPlans => "subscription plan",
        }
    }
}

/// Whether any default row exists
pub async fn has_default(conn: &mut PgConnection, table: DefaultTable) -> CoreResult<bool> {
    let sql = format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE is_default)",
        table.table()
    );
    let exists: bool = sqlx::query_scalar(&sql).fetch_one(&mut *conn).await?;
    Ok(exists)
}

/// Moves the default flag to `id`
///
/// The old default is cleared before the new one is set so the partial unique
/// index is never violated mid-swap. Fails `NotFound` for an unknown id and
/// `Validation` for an inactive one. Setting the current default is a no-op.
pub async fn swap_default(conn: &mut PgConnection, table: DefaultTable, id: Uuid) -> CoreResult<()> {
    let lock_sql = format!(
        "SELECT is_active, is_default FROM {} WHERE id = $1 FOR UPDATE",
        table.table()
    );
    let row: Option<(bool, bool)> = sqlx::query_as(&lock_sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    let (is_active, is_default) = row.ok_or_else(|| CoreError::not_found(table.entity(), id))?;

    if !is_active {
        return Err(CoreError::Validation(format!(
            "inactive {} cannot become the default",
            table.entity()
        )));
    }

    if !is_default {
        let clear_sql = format!(
            "UPDATE {} SET is_default = FALSE, updated_at = NOW() WHERE is_default AND id <> $1",
            table.table()
        );
        sqlx::query(&clear_sql).bind(id).execute(&mut *conn).await?;

        let set_sql = format!(
            "UPDATE {} SET is_default = TRUE, updated_at = NOW() WHERE id = $1",
            table.table()
        );
        sqlx::query(&set_sql).bind(id).execute(&mut *conn).await?;
    }

    assert_single_default(conn, table).await
}

/// Checks that exactly one default exists whenever the table has rows
///
/// Any other outcome is an internal consistency failure and must abort the
/// surrounding transaction.
pub async fn assert_single_default(conn: &mut PgConnection, table: DefaultTable) -> CoreResult<()> {
    let sql = format!(
        "SELECT COUNT(*) FILTER (WHERE is_default), COUNT(*) FROM {}",
        table.table()
    );
    let (defaults, total): (i64, i64) = sqlx::query_as(&sql).fetch_one(&mut *conn).await?;

    check_default_count(table, defaults, total)
}

fn check_default_count(table: DefaultTable, defaults: i64, total: i64) -> CoreResult<()> {
    if total == 0 || defaults == 1 {
        return Ok(());
    }

    error!(
        table = table.table(),
        defaults, total, "Single-default invariant violated"
    );
    Err(CoreError::InvariantViolation(format!(
        "{} has {defaults} defaults across {total} rows",
        table.table()
    )))
}
