/// Serializable transactions with bounded retry
///
/// Default swaps are the only engine operations that retry on their own.
/// Each attempt opens a fresh transaction; a retryable failure (see
/// [`CoreError::is_retryable`]) rolls back and tries again after a short
/// backoff. Exhausting the attempts surfaces `InvariantViolation`.

use crate::error::{CoreError, CoreResult};
use sqlx::{PgPool, Postgres, Transaction};
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Attempts made before giving up
pub const MAX_ATTEMPTS: u32 = 5;

const BASE_BACKOFF_MS: u64 = 10;

/// Opens a transaction at SERIALIZABLE isolation
pub async fn begin_serializable(pool: &PgPool) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

/// Runs `attempt` until it succeeds, fails for a non-retryable reason, or
/// [`MAX_ATTEMPTS`] is reached
///
/// `operation` names the work in logs and in the final error.
pub async fn with_retry<T, F, Fut>(operation: &'static str, mut attempt: F) -> CoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CoreResult<T>>,
{
    let mut tries = 0;

    loop {
        tries += 1;

        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && tries < MAX_ATTEMPTS => {
                warn!(operation, attempt = tries, error = %err, "Retrying serializable transaction");
                tokio::time::sleep(backoff(tries)).await;
            }
            Err(err) if err.is_retryable() => {
                error!(operation, attempts = tries, error = %err, "Serializable transaction did not converge");
                return Err(CoreError::InvariantViolation(format!(
                    "{operation} did not converge after {tries} attempts"
                )));
            }
            Err(err) => return Err(err),
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(BASE_BACKOFF_MS * u64::from(attempt))
}
