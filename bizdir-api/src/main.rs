//! # bizdir API Server
//!
//! HTTP front end for the identity, RBAC and subscription-entitlement engine.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/bizdir JWT_SECRET=$(openssl rand -hex 32) \
//!     cargo run -p bizdir-api
//! ```

use bizdir_api::app::{build_router, AppState};
use bizdir_api::bootstrap::ensure_platform_admin;
use bizdir_api::config::Config;
use bizdir_shared::db::migrations::run_migrations;
use bizdir_shared::db::pool::{close_pool, create_pool, DatabaseConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("bizdir API server v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let pool = create_pool(DatabaseConfig {
        max_connections: config.database.max_connections,
        ..DatabaseConfig::with_url(config.database.url.clone())
    })
    .await?;
    run_migrations(&pool).await?;

    if let Some(admin) = &config.bootstrap_admin {
        ensure_platform_admin(&pool, admin).await?;
    }

    let address = config.bind_address();
    let app = build_router(AppState::new(pool.clone(), config));

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(address = %address, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    close_pool(pool).await;
    tracing::info!("Server stopped");
    Ok(())
}

/// `LOG_FORMAT=json` switches to JSON lines
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bizdir_api=debug,bizdir_shared=info,tower_http=debug".into());

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

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
