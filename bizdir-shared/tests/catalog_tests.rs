//! Customer type registry and plan catalog: the single-default invariant

mod common;

use bizdir_shared::db::singleton::{swap_default, DefaultTable};
use bizdir_shared::db::tx::begin_serializable;
use bizdir_shared::error::CoreError;
use bizdir_shared::models::customer::{CreateCustomer, Customer};
use bizdir_shared::models::customer_type::{CustomerType, UpdateCustomerType};
use bizdir_shared::models::plan::{SubscriptionPlan, UpdatePlan};
use common::{create_customer_type, create_plan, limits, plan_input, test_pool, unique};
use futures::future::join_all;
use sqlx::PgPool;
use std::time::Duration;
use tokio::sync::Mutex;

// Defaults are table-wide, so tests that move them take turns
static DEFAULTS: Mutex<()> = Mutex::const_new(());

async fn default_count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE is_default"))
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_type_default_swaps_sequentially() {
    let Some(pool) = test_pool().await else { return };
    let _guard = DEFAULTS.lock().await;

    let a = create_customer_type(&pool, true).await;
    assert!(CustomerType::get(&pool, a.id).await.unwrap().is_default);

    let b = create_customer_type(&pool, true).await;
    assert!(b.is_default);
    assert!(!CustomerType::get(&pool, a.id).await.unwrap().is_default);
    assert_eq!(default_count(&pool, "customer_types").await, 1);

    let a = CustomerType::set_default(&pool, a.id).await.unwrap();
    assert!(a.is_default);
    assert_eq!(CustomerType::default_type(&pool).await.unwrap().unwrap().id, a.id);
    assert_eq!(default_count(&pool, "customer_types").await, 1);

    // Setting the current default again changes nothing
    CustomerType::set_default(&pool, a.id).await.unwrap();
    assert_eq!(default_count(&pool, "customer_types").await, 1);
}

#[tokio::test]
async fn test_type_default_survives_concurrent_swaps() {
    let Some(pool) = test_pool().await else { return };
    let _guard = DEFAULTS.lock().await;

    let mut ids = Vec::new();
    for _ in 0..4 {
        ids.push(create_customer_type(&pool, false).await.id);
    }

    let handles = ids.iter().map(|&id| {
        let pool = pool.clone();
        tokio::spawn(async move { CustomerType::set_default(&pool, id).await })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    for result in &results {
        match result {
            Ok(_) | Err(CoreError::InvariantViolation(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert!(results.iter().any(|r| r.is_ok()));
    assert_eq!(default_count(&pool, "customer_types").await, 1);

    let winner = CustomerType::default_type(&pool).await.unwrap().unwrap();
    assert!(ids.contains(&winner.id));
}

#[tokio::test]
async fn test_default_type_cannot_be_deactivated() {
    let Some(pool) = test_pool().await else { return };
    let _guard = DEFAULTS.lock().await;

    let default = create_customer_type(&pool, true).await;
    let err = CustomerType::deactivate(&pool, default.id).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    let other = create_customer_type(&pool, false).await;
    let other = CustomerType::deactivate(&pool, other.id).await.unwrap();
    assert!(!other.is_active);

    // An inactive type cannot become the default
    let err = CustomerType::set_default(&pool, other.id).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    assert!(CustomerType::get(&pool, default.id).await.unwrap().is_default);
}

#[tokio::test]
async fn test_customer_falls_back_to_default_type() {
    let Some(pool) = test_pool().await else { return };
    let _guard = DEFAULTS.lock().await;

    let default = create_customer_type(&pool, true).await;
    let customer = Customer::create(
        &pool,
        CreateCustomer {
            name: "Corner Bakery".to_string(),
            email: format!("{}@example.com", unique("bakery")),
            phone: Some("+1 555 0100".to_string()),
            owner_id: None,
            customer_type_id: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(customer.customer_type_id, default.id);
    assert!(customer.is_active);
}

#[tokio::test]
async fn test_readers_see_one_default_type_during_swap() {
    let Some(pool) = test_pool().await else { return };
    let _guard = DEFAULTS.lock().await;

    let old = create_customer_type(&pool, true).await;
    let new = create_customer_type(&pool, false).await;

    let mut swap = begin_serializable(&pool).await.unwrap();
    swap_default(&mut *swap, DefaultTable::CustomerTypes, new.id).await.unwrap();

    // Unlocked readers keep seeing the committed default
    assert_eq!(CustomerType::default_type(&pool).await.unwrap().unwrap().id, old.id);
    let listed = CustomerType::list(&pool, true).await.unwrap();
    assert_eq!(listed.iter().filter(|t| t.is_default).count(), 1);

    // A customer without a type waits on the swap, then lands on the new default
    let creating = tokio::spawn({
        let pool = pool.clone();
        async move {
            Customer::create(
                &pool,
                CreateCustomer {
                    name: "Night Market".to_string(),
                    email: format!("{}@example.com", unique("market")),
                    phone: None,
                    owner_id: None,
                    customer_type_id: None,
                },
            )
            .await
        }
    });

    tokio::time::sleep(Duration::from_millis(300)).await;
    swap.commit().await.unwrap();

    let customer = creating.await.expect("task panicked").unwrap();
    assert_eq!(customer.customer_type_id, new.id);
    assert_eq!(default_count(&pool, "customer_types").await, 1);
}

#[tokio::test]
async fn test_customer_type_rejects_inactive_and_unknown() {
    let Some(pool) = test_pool().await else { return };

    let inactive = create_customer_type(&pool, false).await;
    // Skip if this happened to become the first-ever default
    if inactive.is_default {
        return;
    }
    CustomerType::deactivate(&pool, inactive.id).await.unwrap();

    let input = |type_id| CreateCustomer {
        name: "Hardware Store".to_string(),
        email: format!("{}@example.com", unique("hw")),
        phone: None,
        owner_id: None,
        customer_type_id: Some(type_id),
    };

    let err = Customer::create(&pool, input(inactive.id)).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    let err = Customer::create(&pool, input(uuid::Uuid::new_v4())).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_customer_type_update_and_conflict() {
    let Some(pool) = test_pool().await else { return };

    let a = create_customer_type(&pool, false).await;
    let b = create_customer_type(&pool, false).await;

    let renamed = CustomerType::update(
        &pool,
        a.id,
        UpdateCustomerType {
            name: Some(unique("renamed")),
            description: Some("Shops and stalls".to_string()),
        },
    )
    .await
    .unwrap();
    assert_eq!(renamed.description, "Shops and stalls");

    let err = CustomerType::update(
        &pool,
        a.id,
        UpdateCustomerType {
            name: Some(b.name.clone()),
            description: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CoreError::Conflict { .. }));

    let err = CustomerType::update(&pool, uuid::Uuid::new_v4(), UpdateCustomerType::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_plan_default_swaps() {
    let Some(pool) = test_pool().await else { return };
    let _guard = DEFAULTS.lock().await;

    let mut input = plan_input(30, 0, limits(&[]));
    input.is_default = true;
    let a = SubscriptionPlan::create(&pool, input).await.unwrap();
    assert!(a.is_default);

    let b = create_plan(&pool, 30, 0, limits(&[])).await;
    assert!(!b.is_default);

    let b = SubscriptionPlan::set_default(&pool, b.id).await.unwrap();
    assert!(b.is_default);
    assert!(!SubscriptionPlan::get(&pool, a.id).await.unwrap().is_default);
    assert_eq!(default_count(&pool, "subscription_plans").await, 1);

    let err = SubscriptionPlan::deactivate(&pool, b.id).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    assert!(!SubscriptionPlan::deactivate(&pool, a.id).await.unwrap().is_active);
}

#[tokio::test]
async fn test_plan_default_survives_concurrent_swaps() {
    let Some(pool) = test_pool().await else { return };
    let _guard = DEFAULTS.lock().await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(create_plan(&pool, 30, 0, limits(&[])).await.id);
    }

    let handles = ids.iter().map(|&id| {
        let pool = pool.clone();
        tokio::spawn(async move { SubscriptionPlan::set_default(&pool, id).await })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    assert!(results.iter().any(|r| r.is_ok()));
    assert_eq!(default_count(&pool, "subscription_plans").await, 1);
}

#[tokio::test]
async fn test_readers_see_one_default_plan_during_swap() {
    let Some(pool) = test_pool().await else { return };
    let _guard = DEFAULTS.lock().await;

    let mut input = plan_input(30, 0, limits(&[]));
    input.is_default = true;
    let old = SubscriptionPlan::create(&pool, input).await.unwrap();
    let new = create_plan(&pool, 30, 0, limits(&[])).await;

    let mut swap = begin_serializable(&pool).await.unwrap();
    swap_default(&mut *swap, DefaultTable::SubscriptionPlans, new.id).await.unwrap();

    let reading = tokio::spawn({
        let pool = pool.clone();
        async move { SubscriptionPlan::list(&pool, true).await }
    });
    let during: Vec<_> = reading
        .await
        .expect("task panicked")
        .unwrap()
        .into_iter()
        .filter(|p| p.is_default)
        .collect();
    assert_eq!(during.len(), 1);
    assert_eq!(during[0].id, old.id);

    swap.commit().await.unwrap();

    let after: Vec<_> = SubscriptionPlan::list(&pool, true)
        .await
        .unwrap()
        .into_iter()
        .filter(|p| p.is_default)
        .collect();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].id, new.id);
}

#[tokio::test]
async fn test_plan_validation_and_update() {
    let Some(pool) = test_pool().await else { return };

    let mut bad = plan_input(30, 0, limits(&[]));
    bad.currency = "usd".to_string();
    assert!(matches!(
        SubscriptionPlan::create(&pool, bad).await,
        Err(CoreError::Validation(_))
    ));

    let mut bad = plan_input(0, 0, limits(&[]));
    bad.name = unique("zero-days");
    assert!(matches!(
        SubscriptionPlan::create(&pool, bad).await,
        Err(CoreError::Validation(_))
    ));

    let plan = create_plan(&pool, 30, 7, limits(&[("max_products", 10)])).await;
    assert_eq!(plan.limit_for("products"), Some(10));
    assert_eq!(plan.limit_for("services"), None);
    assert!(plan.offers_trial());

    let updated = SubscriptionPlan::update(
        &pool,
        plan.id,
        UpdatePlan {
            features: Some(limits(&[("max_products", 25), ("max_services", 5)])),
            trial_days: Some(0),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.limit_for("products"), Some(25));
    assert_eq!(updated.limit_for("services"), Some(5));
    assert!(!updated.offers_trial());
    assert_eq!(updated.duration_days, 30);
}
