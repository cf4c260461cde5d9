//! # bizdir Worker Library
//!
//! Background maintenance for the subscription engine.
//!
//! ## Modules
//!
//! - `config`: environment configuration
//! - `sweeper`: periodic expiry of elapsed subscriptions and purge of dead
//!   sessions
//!
//! ## Example
//!
//! ```no_run
//! use bizdir_worker::sweeper::{ExpirySweeper, SweeperConfig};
//! use sqlx::PgPool;
//!
//! # async fn example(pool: PgPool) {
//! let sweeper = ExpirySweeper::new(pool, SweeperConfig::default());
//! let shutdown = sweeper.shutdown_token();
//!
//! let handle = tokio::spawn(async move { sweeper.run().await });
//! shutdown.cancel();
//! handle.await.ok();
//! # }
//! ```

pub mod config;
pub mod sweeper;
