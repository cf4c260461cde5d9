/// Worker configuration
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 2)
/// - `SWEEP_INTERVAL_SECS`: seconds between sweeps (default: 60)
/// - `SESSION_RETENTION_DAYS`: ended sessions older than this are deleted
///   (default: 30, `0` disables the purge)

use crate::sweeper::SweeperConfig;
use bizdir_shared::db::pool::DatabaseConfig;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database: DatabaseConfig,
    pub sweeper: SweeperConfig,
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .map(|v| v.parse::<u32>())
            .transpose()?
            .unwrap_or(2);

        let interval_secs = lookup("SWEEP_INTERVAL_SECS")
            .map(|v| v.parse::<u64>())
            .transpose()?
            .unwrap_or(60);
        if interval_secs == 0 {
            anyhow::bail!("SWEEP_INTERVAL_SECS must be positive");
        }

        let retention_days = lookup("SESSION_RETENTION_DAYS")
            .map(|v| v.parse::<i32>())
            .transpose()?
            .unwrap_or(30);
        if retention_days < 0 {
            anyhow::bail!("SESSION_RETENTION_DAYS must not be negative");
        }

        Ok(Self {
            database: DatabaseConfig {
                max_connections,
                ..DatabaseConfig::with_url(url)
            },
            sweeper: SweeperConfig {
                interval: Duration::from_secs(interval_secs),
                session_retention_days: (retention_days > 0).then_some(retention_days),
            },
        })
    }
}
