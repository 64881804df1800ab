//! Health check endpoints

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::http::server::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct DatabaseHealth {
    pub database: bool,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /health/db
async fn database(State(state): State<Arc<AppState>>) -> Json<DatabaseHealth> {
    let ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    if !ok {
        tracing::warn!("database health check failed");
    }
    Json(DatabaseHealth { database: ok })
}

/// Health routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/health/db", get(database))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_returns_ok() {
        let Json(body) = health().await;
        assert_eq!(body.status, "ok");
    }
}
