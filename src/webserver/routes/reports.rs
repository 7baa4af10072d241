use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    jobs::Job,
    logger::{self, LogTag},
    upstream::ReportParams,
    webserver::{
        state::AppState,
        utils::{error_response, success_response},
    },
};

/// Job snapshot plus its live queue position
#[derive(Debug, Serialize)]
struct JobView {
    #[serde(flatten)]
    job: Job,
    queue_position: Option<usize>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reports", post(enqueue_report))
        .route("/reports/stats", get(report_stats))
        .route("/reports/:id", get(get_report))
}

/// POST /api/reports
///
/// Accepts the job and returns its handle immediately; generation runs
/// on the worker pool and is polled via GET /api/reports/:id.
async fn enqueue_report(
    State(state): State<Arc<AppState>>,
    Json(params): Json<ReportParams>,
) -> Response {
    match state.engine.enqueue(params) {
        Ok(job) => {
            logger::info(
                LogTag::Webserver,
                &format!("report job {} accepted", job.id),
            );
            let queue_position = state.engine.queue_position(&job.id);
            success_response(JobView {
                job,
                queue_position,
            })
        }
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, &e.to_string()),
    }
}

/// GET /api/reports/:id
async fn get_report(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.engine.get(&id) {
        Some(job) => {
            let queue_position = state.engine.queue_position(&id);
            success_response(JobView {
                job,
                queue_position,
            })
        }
        None => error_response(StatusCode::NOT_FOUND, "unknown report job"),
    }
}

/// GET /api/reports/stats
async fn report_stats(State(state): State<Arc<AppState>>) -> Response {
    success_response(state.engine.stats())
}
