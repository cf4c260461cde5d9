//! Shared infrastructure for API integration tests
//!
//! Tests drive the router in-process with `tower::ServiceExt::oneshot`.
//! Database-backed tests need `DATABASE_URL`; without it they return early.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use bizdir_api::app::{build_router, AppState};
use bizdir_api::config::Config;
use bizdir_shared::auth::password::hash_password;
use bizdir_shared::auth::session;
use bizdir_shared::db::migrations::run_migrations;
use bizdir_shared::models::role::SUPERUSER_ROLE;
use bizdir_shared::models::user::{CreateUser, User};
use bizdir_shared::models::user_role::UserRole;
use chrono::Duration;
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

pub const SECRET: &str = "api-integration-secret-at-least-32-bytes";
pub const PASSWORD: &str = "C0rrect-Horse!";

pub fn test_config(database_url: &str) -> Config {
    let database_url = database_url.to_string();
    Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some(database_url.clone()),
        "JWT_SECRET" => Some(SECRET.to_string()),
        _ => None,
    })
    .expect("test config")
}

/// A signed-in user and their bearer token
pub struct Caller {
    pub user: User,
    pub token: String,
}

pub struct TestContext {
    pub db: PgPool,
    pub app: Router,
    pub admin: Caller,
}

impl TestContext {
    /// App against a migrated database with a platform admin signed in
    pub async fn new() -> Option<Self> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set; skipping API test");
            return None;
        };

        let db = PgPool::connect(&url).await.expect("Failed to connect to test database");
        run_migrations(&db).await.expect("Failed to run migrations");

        let app = build_router(AppState::new(db.clone(), test_config(&url)));

        let admin = signed_in_user(&db).await;
        UserRole::assign(&db, admin.user.id, SUPERUSER_ROLE)
            .await
            .expect("Failed to grant superuser");

        Some(TestContext { db, app, admin })
    }

    /// A fresh user with no roles
    pub async fn plain_user(&self) -> Caller {
        signed_in_user(&self.db).await
    }

    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        send(&self.app, method, uri, token, body).await
    }

    pub async fn admin_send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        send(&self.app, method, uri, Some(&self.admin.token), body).await
    }
}

pub async fn signed_in_user(db: &PgPool) -> Caller {
    let user = User::create(
        db,
        CreateUser {
            email: format!("{}@example.com", unique("api-user")),
            phone: None,
            name: None,
            password_hash: hash_password(PASSWORD).expect("hash"),
        },
    )
    .await
    .expect("Failed to create user");

    let tokens = session::create(db, user.id, SECRET, Duration::hours(1))
        .await
        .expect("Failed to open session");

    Caller {
        user,
        token: tokens.access_token,
    }
}

/// Sends one request; the body is parsed as JSON when present
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }

    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };

    (status, json)
}

pub fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", &Uuid::new_v4().simple().to_string()[..12])
}
