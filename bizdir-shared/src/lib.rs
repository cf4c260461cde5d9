//! # bizdir shared library
//!
//! Identity, RBAC and subscription-entitlement engine shared by the bizdir
//! API server and worker.
//!
//! ## Module Organization
//!
//! - `models`: database models and their operations
//! - `auth`: passwords, tokens, sessions, middleware and the Permission Gate
//! - `entitlement`: plan limit checks and reservations
//! - `db`: pool, migrations, transaction retry, single-default bookkeeping
//! - `error`: the `CoreError` taxonomy
//! - `validation`: field validators used by the input types

pub mod auth;
pub mod db;
pub mod entitlement;
pub mod error;
pub mod models;
pub mod validation;

/// Current version of the bizdir shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
