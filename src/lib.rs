pub mod aggregator;
pub mod cache;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod logger;
pub mod upstream;
#[cfg(feature = "web")]
pub mod webserver;

pub use aggregator::{RunAggregator, RunFilters, RunPage};
pub use cache::ReportCache;
pub use config::{AggregatorConfig, CacheConfig, EngineConfig, UpstreamConfig};
pub use errors::{EnqueueError, FetchError, UpstreamError};
pub use jobs::{Job, JobEngine, JobStatus};
pub use upstream::{ReportArtifact, ReportParams, TestRun, UpstreamClient};
