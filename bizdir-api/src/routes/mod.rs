/// API route handlers, one module per resource
///
/// - `health`: liveness and database connectivity
/// - `auth`: login, token refresh, logout
/// - `roles`, `permissions`, `users`: identity and RBAC administration
/// - `customer_types`, `customers`: tenant registry, per-tenant subscription
///   and entitlement views
/// - `plans`, `subscriptions`: plan catalog and assignment

pub mod auth;
pub mod customer_types;
pub mod customers;
pub mod health;
pub mod permissions;
pub mod plans;
pub mod roles;
pub mod subscriptions;
pub mod users;
