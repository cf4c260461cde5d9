//! Shared fixtures for database-backed tests
//!
//! Every suite reads `DATABASE_URL`; when it is unset the tests print a note
//! and return early.

#![allow(dead_code)]

use bizdir_shared::db::migrations::run_migrations;
use bizdir_shared::db::pool::{create_pool, DatabaseConfig};
use bizdir_shared::models::customer::{CreateCustomer, Customer};
use bizdir_shared::models::customer_type::{CreateCustomerType, CustomerType};
use bizdir_shared::models::plan::{CreatePlan, FeatureMap, SubscriptionPlan};
use bizdir_shared::models::user::{CreateUser, User};
use sqlx::PgPool;
use uuid::Uuid;

/// A migrated pool, or `None` when no database is configured
pub async fn test_pool() -> Option<PgPool> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping database test");
        return None;
    };

    let config = DatabaseConfig {
        max_connections: 8,
        ..DatabaseConfig::with_url(url)
    };
    let pool = create_pool(config).await.expect("Failed to connect to test database");
    run_migrations(&pool).await.expect("Failed to run migrations");
    Some(pool)
}

/// Name with a random suffix so parallel tests never collide
pub fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", &Uuid::new_v4().simple().to_string()[..12])
}

pub async fn create_user(pool: &PgPool) -> User {
    create_user_with_hash(pool, "not-a-real-hash").await
}

pub async fn create_user_with_hash(pool: &PgPool, password_hash: &str) -> User {
    User::create(
        pool,
        CreateUser {
            email: format!("{}@example.com", unique("user")),
            phone: None,
            name: Some("Test User".to_string()),
            password_hash: password_hash.to_string(),
        },
    )
    .await
    .expect("Failed to create user")
}

pub async fn create_customer_type(pool: &PgPool, is_default: bool) -> CustomerType {
    CustomerType::create(
        pool,
        CreateCustomerType {
            name: unique("type"),
            description: String::new(),
            is_default,
        },
    )
    .await
    .expect("Failed to create customer type")
}

/// A customer of a fresh non-default type
pub async fn create_customer(pool: &PgPool, owner_id: Option<Uuid>) -> Customer {
    let customer_type = create_customer_type(pool, false).await;

    Customer::create(
        pool,
        CreateCustomer {
            name: unique("Acme"),
            email: format!("{}@example.com", unique("billing")),
            phone: None,
            owner_id,
            customer_type_id: Some(customer_type.id),
        },
    )
    .await
    .expect("Failed to create customer")
}

pub fn plan_input(duration_days: i32, trial_days: i32, features: FeatureMap) -> CreatePlan {
    CreatePlan {
        name: unique("plan"),
        price_cents: 1999,
        currency: "USD".to_string(),
        duration_days,
        trial_days,
        is_default: false,
        features,
        modules: vec!["catalog".to_string()],
    }
}

pub async fn create_plan(pool: &PgPool, duration_days: i32, trial_days: i32, features: FeatureMap) -> SubscriptionPlan {
    SubscriptionPlan::create(pool, plan_input(duration_days, trial_days, features))
        .await
        .expect("Failed to create plan")
}

pub fn limits(pairs: &[(&str, i64)]) -> FeatureMap {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}
