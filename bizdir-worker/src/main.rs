//! # bizdir Worker
//!
//! Runs the expiry sweeper until interrupted.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/bizdir cargo run -p bizdir-worker
//! ```

use bizdir_shared::db::pool::{close_pool, create_pool};
use bizdir_worker::config::WorkerConfig;
use bizdir_worker::sweeper::ExpirySweeper;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("bizdir worker v{} starting", env!("CARGO_PKG_VERSION"));

    let config = WorkerConfig::from_env()?;
    let pool = create_pool(config.database.clone()).await?;

    let sweeper = ExpirySweeper::new(pool.clone(), config.sweeper);
    let shutdown = sweeper.shutdown_token();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown signal received");
        shutdown.cancel();
    });

    sweeper.run().await;

    close_pool(pool).await;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bizdir_worker=debug,bizdir_shared=info".into());

    let json = std::env::var("LOG_FORMAT").map_or(false, |format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
