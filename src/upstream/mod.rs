//! Upstream test-management API boundary.
//!
//! Everything the core needs from the external system of record goes
//! through the [`UpstreamClient`] trait: raw offset/limit pages of test
//! runs, and the long-running report operation. `http` provides the
//! production reqwest implementation.

pub mod http;
mod models;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::UpstreamError;

pub use http::HttpUpstreamClient;
pub use models::{
    ReportArtifact, ReportParams, TestRun, UpstreamRunFilters, INVALID_TIMESTAMP,
};

/// Progress callback handed to the report operation; invoked with a
/// stage label and an arbitrary JSON payload.
pub type ProgressFn = Arc<dyn Fn(&str, Value) + Send + Sync>;

/// Narrow interface over the upstream test-management API.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Fetch one raw page of test runs at `offset`, applying only the
    /// filters the upstream supports natively. Returns fewer than
    /// `limit` items when the resource is exhausted.
    async fn fetch_runs(
        &self,
        project_id: u64,
        filters: &UpstreamRunFilters,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<TestRun>, UpstreamError>;

    /// Run one long-running report operation to completion, reporting
    /// intermediate stages through `progress`.
    async fn run_report(
        &self,
        params: &ReportParams,
        progress: ProgressFn,
    ) -> Result<ReportArtifact, UpstreamError>;
}
