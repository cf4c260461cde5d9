/// Expiry sweeper
///
/// Reads already treat an elapsed subscription as Expired, so the sweep is
/// not needed for correctness. It makes the stored state catch up, which
/// keeps history queries and reporting honest, and it deletes sessions that
/// ended long ago.
///
/// A failed sweep is logged and retried on the next tick; the loop only
/// stops when the shutdown token is cancelled.

use bizdir_shared::models::session::Session;
use bizdir_shared::models::subscription::Subscription;
use sqlx::PgPool;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweeperConfig {
    /// Time between sweeps
    pub interval: Duration,

    /// `None` keeps ended sessions forever
    pub session_retention_days: Option<i32>,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        SweeperConfig {
            interval: Duration::from_secs(60),
            session_retention_days: Some(30),
        }
    }
}

/// Counts from one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_subscriptions: u64,
    pub purged_sessions: u64,
}

pub struct ExpirySweeper {
    pool: PgPool,
    config: SweeperConfig,
    shutdown_token: CancellationToken,
}

impl ExpirySweeper {
    pub fn new(pool: PgPool, config: SweeperConfig) -> Self {
        ExpirySweeper {
            pool,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Token that stops [`run`](Self::run) when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn config(&self) -> &SweeperConfig {
        &self.config
    }

    /// Sweeps immediately, then once per interval until shutdown
    pub async fn run(&self) {
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            session_retention_days = ?self.config.session_retention_days,
            "Expiry sweeper starting"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        tracing::error!(error = %e, "Sweep failed");
                    }
                }
            }
        }

        tracing::info!("Expiry sweeper stopped");
    }

    /// One pass over subscriptions and sessions
    pub async fn sweep_once(&self) -> Result<SweepReport, sqlx::Error> {
        let expired_subscriptions = Subscription::expire_elapsed(&self.pool).await?;

        let purged_sessions = match self.config.session_retention_days {
            Some(days) => Session::purge_stale(&self.pool, days).await?,
            None => 0,
        };

        let report = SweepReport {
            expired_subscriptions,
            purged_sessions,
        };

        if report == SweepReport::default() {
            tracing::debug!("Sweep found nothing to do");
        } else {
            tracing::info!(
                expired_subscriptions,
                purged_sessions,
                "Sweep complete"
            );
        }

        Ok(report)
    }
}
