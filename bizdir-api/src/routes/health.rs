/// Health check endpoint
///
/// ```text
/// GET /health
///
/// {"status": "healthy", "version": "0.1.0", "database": "connected"}
/// ```

use crate::app::AppState;
use axum::{extract::State, Json};
use bizdir_shared::db::pool::health_check as database_health;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,
    pub version: String,

    /// "connected" or "disconnected"
    pub database: String,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = database_health(&state.db).await.is_ok();

    Json(HealthResponse {
        status: if connected { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if connected { "connected" } else { "disconnected" }.to_string(),
    })
}
