/// Configuration types for the runtime core.
///
/// These are plain injected values; the embedding process decides where
/// they come from. Bad bounds are clamped at the point of use rather
/// than rejected, so a misconfigured component degrades instead of
/// failing request handling.
use std::time::Duration;

/// TTL/LRU cache settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Default time-to-live applied when `set` is called without one
    pub default_ttl: Duration,

    /// Maximum number of entries (LRU eviction when exceeded)
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            max_entries: 500,
        }
    }
}

impl CacheConfig {
    /// Custom configuration
    pub fn custom(ttl_secs: u64, max_entries: usize) -> Self {
        Self {
            default_ttl: Duration::from_secs(ttl_secs),
            max_entries,
        }
    }
}

/// Autoscaling job engine settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Worker floor, kept alive even when idle
    pub min_workers: usize,

    /// Worker ceiling under burst load
    pub max_workers: usize,

    /// Idle wait before a worker above the floor retires
    pub idle_timeout: Duration,

    /// Total jobs retained; oldest terminal jobs trimmed beyond this
    pub history_limit: usize,

    /// Most-recent progress events kept per job
    pub progress_cap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_workers: 1,
            max_workers: 4,
            idle_timeout: Duration::from_secs(30),
            history_limit: 50,
            progress_cap: 20,
        }
    }
}

impl EngineConfig {
    /// Clamp bounds so the pool always has a floor of one worker and a
    /// ceiling no lower than the floor.
    pub(crate) fn normalized(mut self) -> Self {
        self.min_workers = self.min_workers.max(1);
        self.max_workers = self.max_workers.max(self.min_workers);
        self.history_limit = self.history_limit.max(1);
        self.progress_cap = self.progress_cap.max(1);
        self
    }
}

/// Paginated aggregator settings.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Lower bound on the per-fetch upstream batch size
    pub batch_floor: usize,

    /// Upper bound on the per-fetch upstream batch size
    pub batch_ceiling: usize,

    /// Timeout applied to each upstream batch fetch
    pub fetch_timeout: Duration,

    /// Transient-error retries per batch before giving up
    pub fetch_retries: u32,

    /// TTL for cached result pages
    pub cache_ttl: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            batch_floor: 50,
            batch_ceiling: 250,
            fetch_timeout: Duration::from_secs(10),
            fetch_retries: 3,
            cache_ttl: Duration::from_secs(60),
        }
    }
}

impl AggregatorConfig {
    pub(crate) fn normalized(mut self) -> Self {
        self.batch_floor = self.batch_floor.max(1);
        self.batch_ceiling = self.batch_ceiling.max(self.batch_floor);
        self
    }
}

/// HTTP upstream client settings.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL of the test-management API, e.g. "https://qa.example.com"
    pub base_url: String,

    /// API key sent as a bearer token when present
    pub api_key: Option<String>,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Retry attempts for transient failures
    pub retry_attempts: u32,

    /// Base delay between retries
    pub retry_delay_ms: u64,

    /// Ceiling for the exponential backoff delay
    pub max_retry_delay_ms: u64,

    /// Poll interval while waiting on a report build
    pub report_poll_interval: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(15),
            retry_attempts: 3,
            retry_delay_ms: 500,
            max_retry_delay_ms: 8_000,
            report_poll_interval: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_clamps_bounds() {
        let cfg = EngineConfig {
            min_workers: 0,
            max_workers: 0,
            history_limit: 0,
            progress_cap: 0,
            ..Default::default()
        }
        .normalized();

        assert_eq!(cfg.min_workers, 1);
        assert_eq!(cfg.max_workers, 1);
        assert_eq!(cfg.history_limit, 1);
        assert_eq!(cfg.progress_cap, 1);
    }

    #[test]
    fn test_aggregator_config_clamps_batch_bounds() {
        let cfg = AggregatorConfig {
            batch_floor: 100,
            batch_ceiling: 10,
            ..Default::default()
        }
        .normalized();

        assert!(cfg.batch_ceiling >= cfg.batch_floor);
    }
}
