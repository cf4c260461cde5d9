/// Database models
///
/// Identity and RBAC:
/// - [`user`], [`role`], [`permission`], [`user_role`], [`role_permission`], [`session`]
///
/// Tenancy and billing:
/// - [`customer_type`], [`customer`], [`plan`], [`subscription`], [`resource_usage`]
///
/// Every model uses runtime-checked `sqlx` queries against the schema in
/// `migrations/`.

pub mod customer;
pub mod customer_type;
pub mod permission;
pub mod plan;
pub mod resource_usage;
pub mod role;
pub mod role_permission;
pub mod session;
pub mod subscription;
pub mod user;
pub mod user_role;
