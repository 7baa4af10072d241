/// Job bookkeeping types for the report engine.
use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::upstream::ReportParams;

/// Lifecycle of one report job. Transitions are monotonic:
/// queued -> running -> {success, error}; terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Success,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Error)
    }
}

/// One progress event reported by the in-flight report operation.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub stage: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

/// One tracked report-generation job.
///
/// Owned by the engine; callers only ever see cloned snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    pub params: ReportParams,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub current_stage: Option<String>,
    /// Most-recent progress events, capped by the engine config
    pub progress: VecDeque<ProgressEvent>,
    pub result_path: Option<String>,
    pub result_url: Option<String>,
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
}

impl Job {
    pub(crate) fn new(params: ReportParams) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            params,
            status: JobStatus::Queued,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            current_stage: None,
            progress: VecDeque::new(),
            result_path: None,
            result_url: None,
            error: None,
            duration_ms: None,
        }
    }
}

/// Engine counters for the monitoring endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub total: usize,
    pub running: usize,
    pub queued: usize,
    pub workers: usize,
    pub idle_workers: usize,
    pub history_limit: usize,
    pub latest_job: Option<Job>,
}

/// Registry entry for one live worker task.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkerState {
    pub id: u64,
    pub idle: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params() -> ReportParams {
        serde_json::from_value(json!({ "project_id": 1, "title": "t" })).unwrap()
    }

    #[test]
    fn test_new_job_is_queued() {
        let job = Job::new(params());
        assert_eq!(job.status, JobStatus::Queued);
        assert!(!job.id.is_empty());
        assert!(job.started_at.is_none());
        assert!(job.progress.is_empty());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Success.is_terminal());
        assert!(JobStatus::Error.is_terminal());
    }
}
