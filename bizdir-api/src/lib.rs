//! # bizdir API Server Library
//!
//! ## Modules
//!
//! - `app`: application state and router builder
//! - `bootstrap`: first platform admin provisioning
//! - `config`: environment configuration
//! - `error`: engine error to HTTP response mapping
//! - `routes`: route handlers

pub mod app;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod routes;
