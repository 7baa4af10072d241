//! Cursor-based paginated aggregation over the upstream run list.
//!
//! The upstream only speaks raw offset/limit pagination with a narrow
//! filter set and no usable totals. This module serves a richly
//! filtered, accurately paged view on top of it: fetch a batch, filter
//! locally, accumulate survivors, and keep fetching until the window
//! is filled or the upstream is proven exhausted.

mod filters;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::cache::ReportCache;
use crate::config::AggregatorConfig;
use crate::errors::FetchError;
use crate::logger::{self, LogTag};
use crate::upstream::{TestRun, UpstreamClient, UpstreamRunFilters};

pub use filters::RunFilters;

/// Cache key for one fully-specified result window.
pub type PageKey = (u64, usize, usize, RunFilters);

/// Shared cache of aggregated result pages.
pub type RunPageCache = ReportCache<PageKey, RunPage>;

/// One aggregated, filtered result page.
#[derive(Debug, Clone, Serialize)]
pub struct RunPage {
    pub items: Vec<TestRun>,
    /// Lower bound on the filtered total; exact only when `estimated`
    /// is false
    pub total_estimate: usize,
    pub has_more: bool,
    /// True when filtering or early exit made an exact total
    /// unknowable without scanning the whole upstream resource
    pub estimated: bool,
    /// Raw upstream cursor to resume from for the next page
    pub next_offset: usize,
}

pub struct RunAggregator {
    client: Arc<dyn UpstreamClient>,
    cache: Arc<RunPageCache>,
    config: AggregatorConfig,
}

impl RunAggregator {
    pub fn new(
        client: Arc<dyn UpstreamClient>,
        cache: Arc<RunPageCache>,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            client,
            cache,
            config: config.normalized(),
        }
    }

    /// Serve one filtered window starting at the raw upstream cursor
    /// `offset`.
    ///
    /// Fetches `limit + 1` survivors so `has_more` needs no separate
    /// count call, advancing the cursor by each raw batch length (the
    /// upstream cursor tracks raw position, not survivor count). A
    /// batch shorter than requested proves the upstream exhausted.
    pub async fn fetch_page(
        &self,
        project_id: u64,
        offset: usize,
        limit: usize,
        filters: &RunFilters,
    ) -> Result<RunPage, FetchError> {
        let limit = limit.max(1);
        let filters = filters.clone().normalized();
        let key: PageKey = (project_id, offset, limit, filters.clone());

        if let Some((page, _)) = self.cache.get(&key) {
            logger::debug(
                LogTag::Aggregator,
                &format!(
                    "cache hit for project {} window ({}, {})",
                    project_id, offset, limit
                ),
            );
            return Ok(page);
        }

        let needed = limit + 1;
        let batch_size = (limit * 2).clamp(self.config.batch_floor, self.config.batch_ceiling);
        let upstream_filters = filters.upstream();

        let mut survivors: Vec<TestRun> = Vec::with_capacity(needed);
        let mut cursor = offset;
        let mut next_offset = offset;
        let mut exhausted = false;
        let mut batches = 0usize;

        while survivors.len() < needed {
            let batch = self
                .fetch_batch(project_id, &upstream_filters, cursor, batch_size)
                .await?;
            batches += 1;
            let raw_len = batch.len();

            for (index, run) in batch.into_iter().enumerate() {
                if filters.matches(&run) {
                    survivors.push(run);
                    if survivors.len() == limit {
                        next_offset = cursor + index + 1;
                    }
                }
            }

            cursor += raw_len;
            if raw_len < batch_size {
                exhausted = true;
                break;
            }
        }

        let has_more = survivors.len() > limit || !exhausted;
        let estimated = !exhausted || survivors.len() > limit;
        let total_estimate = offset + survivors.len();
        if survivors.len() <= limit {
            next_offset = cursor;
        }
        survivors.truncate(limit);

        logger::debug(
            LogTag::Aggregator,
            &format!(
                "project {} window ({}, {}): {} items after {} batches (has_more={}, exhausted={})",
                project_id,
                offset,
                limit,
                survivors.len(),
                batches,
                has_more,
                exhausted
            ),
        );

        let page = RunPage {
            items: survivors,
            total_estimate,
            has_more,
            estimated,
            next_offset,
        };
        self.cache
            .set(key, page.clone(), Some(self.config.cache_ttl));

        Ok(page)
    }

    /// One upstream batch fetch with a request timeout and a bounded
    /// number of transient-error retries.
    async fn fetch_batch(
        &self,
        project_id: u64,
        filters: &UpstreamRunFilters,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<TestRun>, FetchError> {
        let mut attempt: u32 = 0;
        loop {
            let fetch = self.client.fetch_runs(project_id, filters, offset, limit);
            match tokio::time::timeout(self.config.fetch_timeout, fetch).await {
                Ok(Ok(batch)) => return Ok(batch),
                Ok(Err(err)) if err.is_transient() && attempt < self.config.fetch_retries => {
                    attempt += 1;
                    logger::warning(
                        LogTag::Aggregator,
                        &format!(
                            "transient upstream error at offset {} (attempt {}/{}): {}",
                            offset, attempt, self.config.fetch_retries, err
                        ),
                    );
                    tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
                }
                Ok(Err(err)) => {
                    return Err(if err.is_transient() {
                        FetchError::RetriesExhausted {
                            attempts: attempt + 1,
                            last: err,
                        }
                    } else {
                        FetchError::Upstream(err)
                    });
                }
                Err(_) if attempt < self.config.fetch_retries => {
                    attempt += 1;
                    logger::warning(
                        LogTag::Aggregator,
                        &format!(
                            "upstream fetch at offset {} timed out (attempt {}/{})",
                            offset, attempt, self.config.fetch_retries
                        ),
                    );
                }
                Err(_) => return Err(FetchError::Timeout(self.config.fetch_timeout)),
            }
        }
    }
}
