//! Health check endpoint
//!
//! - GET /api/v1/health - Database ping

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::api::middleware::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

/// Build the health router
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health))
}

/// GET /api/v1/health
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.pool.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                database: "ok",
            }),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {:#}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    database: "unreachable",
                }),
            )
        }
    }
}
