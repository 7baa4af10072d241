use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::webserver::state::AppState;

pub mod reports;
pub mod runs;
pub mod status;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(status::routes())
        .merge(runs::routes())
        .merge(reports::routes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{RunAggregator, RunPageCache};
    use crate::config::{AggregatorConfig, CacheConfig, EngineConfig};
    use crate::errors::UpstreamError;
    use crate::jobs::{JobEngine, UpstreamReportRunner};
    use crate::upstream::{
        ProgressFn, ReportArtifact, ReportParams, TestRun, UpstreamClient, UpstreamRunFilters,
    };
    use async_trait::async_trait;

    struct NullUpstream;

    #[async_trait]
    impl UpstreamClient for NullUpstream {
        async fn fetch_runs(
            &self,
            _project_id: u64,
            _filters: &UpstreamRunFilters,
            _offset: usize,
            _limit: usize,
        ) -> Result<Vec<TestRun>, UpstreamError> {
            Ok(Vec::new())
        }

        async fn run_report(
            &self,
            _params: &ReportParams,
            _progress: ProgressFn,
        ) -> Result<ReportArtifact, UpstreamError> {
            Ok(ReportArtifact {
                path: "reports/empty.html".to_string(),
                url: None,
            })
        }
    }

    #[tokio::test]
    async fn test_router_wires_up_with_injected_state() {
        let upstream: Arc<dyn UpstreamClient> = Arc::new(NullUpstream);
        let cache = Arc::new(RunPageCache::new(CacheConfig::default()));
        let aggregator = Arc::new(RunAggregator::new(
            Arc::clone(&upstream),
            Arc::clone(&cache),
            AggregatorConfig::default(),
        ));
        let engine = Arc::new(JobEngine::new(
            EngineConfig::default(),
            Arc::new(UpstreamReportRunner::new(upstream)),
        ));

        let state = Arc::new(AppState::new(aggregator, engine, cache));
        let _router = create_router(Arc::clone(&state));

        assert!(state.uptime_seconds() <= 1);
    }
}
