use axum::{
    extract::State,
    response::Response,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::{
    logger::{self, LogTag},
    webserver::{state::AppState, utils::success_response},
};

/// Simple health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub uptime_seconds: u64,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        .route("/cache/stats", get(cache_stats))
        .route("/cache/clear", post(cache_clear))
}

/// GET /api/health
async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    success_response(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// GET /api/cache/stats
async fn cache_stats(State(state): State<Arc<AppState>>) -> Response {
    success_response(state.cache.stats())
}

/// POST /api/cache/clear
async fn cache_clear(State(state): State<Arc<AppState>>) -> Response {
    state.cache.clear();
    logger::info(LogTag::Webserver, "page cache cleared");
    success_response(serde_json::json!({ "cleared": true }))
}
