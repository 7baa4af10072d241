//! Autoscaling background-job engine for report generation.
//!
//! Requests enqueue work and get a job handle back immediately; a pool
//! of worker tasks sized between a floor and a ceiling drains the FIFO
//! queue, growing on bursts and retiring back to the floor when idle.
//! Status, queue position and progress are pollable at any time.

mod engine;
mod job;
mod worker;

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::UpstreamError;
use crate::upstream::{ProgressFn, ReportArtifact, ReportParams, UpstreamClient};

pub use engine::JobEngine;
pub use job::{EngineStats, Job, JobStatus, ProgressEvent};

/// The long-running operation a worker executes for each job.
#[async_trait]
pub trait ReportRunner: Send + Sync {
    async fn run(
        &self,
        params: &ReportParams,
        progress: ProgressFn,
    ) -> Result<ReportArtifact, UpstreamError>;
}

/// Adapter running jobs against the shared upstream client.
pub struct UpstreamReportRunner {
    client: Arc<dyn UpstreamClient>,
}

impl UpstreamReportRunner {
    pub fn new(client: Arc<dyn UpstreamClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReportRunner for UpstreamReportRunner {
    async fn run(
        &self,
        params: &ReportParams,
        progress: ProgressFn,
    ) -> Result<ReportArtifact, UpstreamError> {
        self.client.run_report(params, progress).await
    }
}
