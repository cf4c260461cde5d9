/// Database layer
///
/// - `pool`: PostgreSQL connection pool with health checks
/// - `migrations`: embedded schema migrations
/// - `tx`: serializable transaction retry helper
/// - `singleton`: single-default bookkeeping shared by customer types and plans
///
/// Row types live in the crate-level `models` module.
///
/// # Example
///
/// ```no_run
/// use bizdir_shared::db::pool::{create_pool, DatabaseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig {
///         url: std::env::var("DATABASE_URL")?,
///         ..Default::default()
///     };
///
///     let pool = create_pool(config).await?;
///     bizdir_shared::db::migrations::run_migrations(&pool).await?;
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;
pub mod singleton;
pub mod tx;
