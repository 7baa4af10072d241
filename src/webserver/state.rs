/// Shared application state for the API layer
///
/// Holds the core components route handlers need. Instances are
/// constructor-injected; lifecycle is owned by the embedding process.
use std::sync::Arc;

use crate::aggregator::{RunAggregator, RunPageCache};
use crate::jobs::JobEngine;

/// Shared application state passed to all route handlers
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<RunAggregator>,
    pub engine: Arc<JobEngine>,
    pub cache: Arc<RunPageCache>,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(
        aggregator: Arc<RunAggregator>,
        engine: Arc<JobEngine>,
        cache: Arc<RunPageCache>,
    ) -> Self {
        Self {
            aggregator,
            engine,
            cache,
            startup_time: chrono::Utc::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        (chrono::Utc::now() - self.startup_time).num_seconds().max(0) as u64
    }
}
