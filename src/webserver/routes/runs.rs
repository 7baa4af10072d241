use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    aggregator::RunFilters,
    logger::{self, LogTag},
    webserver::{
        state::AppState,
        utils::{error_response, success_response},
    },
};

const MAX_LIMIT: usize = 250;

/// Run list query parameters
#[derive(Debug, Deserialize)]
pub struct RunListQuery {
    #[serde(default = "default_project_id")]
    pub project_id: u64,
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub created_after: Option<i64>,
    #[serde(default)]
    pub created_before: Option<i64>,
    #[serde(default)]
    pub is_completed: Option<bool>,
}

fn default_project_id() -> u64 {
    1
}

fn default_limit() -> usize {
    50
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/runs", get(list_runs))
}

/// GET /api/runs
async fn list_runs(State(state): State<Arc<AppState>>, Query(query): Query<RunListQuery>) -> Response {
    let limit = query.limit.clamp(1, MAX_LIMIT);
    let filters = RunFilters {
        search: query.search,
        created_after: query.created_after,
        created_before: query.created_before,
        is_completed: query.is_completed,
    }
    .normalized();

    match state
        .aggregator
        .fetch_page(query.project_id, query.offset, limit, &filters)
        .await
    {
        Ok(page) => success_response(page),
        Err(e) => {
            logger::error(
                LogTag::Webserver,
                &format!("run listing failed for project {}: {}", query.project_id, e),
            );
            error_response(StatusCode::BAD_GATEWAY, &e.to_string())
        }
    }
}
