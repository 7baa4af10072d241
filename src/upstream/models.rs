/// Wire models for the test-management API.
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sentinel for creation timestamps the upstream returned in a
/// non-numeric form; always outside any requested date range.
pub const INVALID_TIMESTAMP: i64 = -1;

/// One test run as returned by the upstream list endpoint.
///
/// Pass/fail counts are carried through opaquely for the rendering
/// layer; no statistics are computed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRun {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub is_completed: bool,
    /// Creation timestamp exactly as the upstream sent it (number,
    /// string or absent); use `created_on_epoch` for comparisons.
    #[serde(default)]
    pub created_on: Value,
    #[serde(default)]
    pub passed_count: Option<u64>,
    #[serde(default)]
    pub failed_count: Option<u64>,
    #[serde(default)]
    pub untested_count: Option<u64>,
}

impl TestRun {
    /// Creation time normalized to epoch seconds; non-numeric values
    /// coerce to `INVALID_TIMESTAMP`.
    pub fn created_on_epoch(&self) -> i64 {
        match &self.created_on {
            Value::Number(n) => n.as_i64().unwrap_or(INVALID_TIMESTAMP),
            Value::String(s) => s.trim().parse().unwrap_or(INVALID_TIMESTAMP),
            _ => INVALID_TIMESTAMP,
        }
    }
}

/// The narrow filter set the upstream list endpoint supports natively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpstreamRunFilters {
    pub is_completed: Option<bool>,
}

/// Immutable input to one report-generation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportParams {
    pub project_id: u64,
    #[serde(default)]
    pub suite_id: Option<u64>,
    pub title: String,
    #[serde(default = "default_report_format")]
    pub format: String,
    /// Report options forwarded to the upstream verbatim
    #[serde(default)]
    pub options: Value,
}

fn default_report_format() -> String {
    "html".to_string()
}

/// Handle to a finished report artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportArtifact {
    pub path: String,
    #[serde(default)]
    pub url: Option<String>,
}
