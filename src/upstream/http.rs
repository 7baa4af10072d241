/// Reqwest implementation of the upstream client.
///
/// Wraps every call with a per-request timeout and bounded
/// exponential-backoff retries (with jitter) on transient failures;
/// fatal statuses surface immediately. The report operation is
/// submit-then-poll: the upstream builds the artifact asynchronously
/// and this client polls until it lands in a terminal state.
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use rand::Rng;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

use crate::config::UpstreamConfig;
use crate::errors::UpstreamError;

use super::models::{ReportArtifact, ReportParams, TestRun, UpstreamRunFilters};
use super::{ProgressFn, UpstreamClient};

const BODY_SNIPPET_LEN: usize = 200;
const JITTER_MAX_MS: u64 = 100;

pub struct HttpUpstreamClient {
    config: UpstreamConfig,
    base_url: Url,
    client: Client,
}

impl HttpUpstreamClient {
    pub fn new(config: UpstreamConfig) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        debug!(
            "upstream client ready: {} (timeout {:?}, {} retries)",
            base_url, config.request_timeout, config.retry_attempts
        );

        Ok(Self {
            config,
            base_url,
            client,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, UpstreamError> {
        self.base_url
            .join(path)
            .map_err(|e| UpstreamError::fatal(None, format!("invalid endpoint {}: {}", path, e)))
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Execute a request, retrying transient failures with exponential
    /// backoff and jitter up to the configured attempt count.
    async fn execute_with_retry<F>(&self, make: F) -> Result<Value, UpstreamError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt: u32 = 0;
        loop {
            let err = match self.request(make()).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp.json::<Value>().await.map_err(|e| {
                            UpstreamError::fatal(None, format!("invalid JSON from upstream: {}", e))
                        });
                    }
                    let body = resp.text().await.unwrap_or_default();
                    UpstreamError::from_status(status.as_u16(), snippet(&body))
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    UpstreamError::transient(None, e.to_string())
                }
                Err(e) => match e.status() {
                    Some(status) => UpstreamError::from_status(status.as_u16(), e.to_string()),
                    None => UpstreamError::transient(None, e.to_string()),
                },
            };

            if !err.is_transient() || attempt >= self.config.retry_attempts {
                return Err(err);
            }

            let delay = self.backoff_delay(attempt);
            warn!(
                "upstream request failed (attempt {}/{}), retrying in {:?}: {}",
                attempt + 1,
                self.config.retry_attempts,
                delay,
                err
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = Duration::from_millis(self.config.retry_delay_ms.max(1));
        let exponential = base * 2u32.saturating_pow(attempt);
        let capped = exponential.min(Duration::from_millis(self.config.max_retry_delay_ms.max(1)));
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=JITTER_MAX_MS));
        capped + jitter
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    async fn fetch_runs(
        &self,
        project_id: u64,
        filters: &UpstreamRunFilters,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<TestRun>, UpstreamError> {
        let url = self.endpoint(&format!("api/v2/projects/{}/runs", project_id))?;

        let mut query: Vec<(&str, String)> = vec![
            ("offset", offset.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(is_completed) = filters.is_completed {
            query.push(("is_completed", if is_completed { "1" } else { "0" }.to_string()));
        }

        debug!(
            "GET {} offset={} limit={} is_completed={:?}",
            url, offset, limit, filters.is_completed
        );

        let payload = self
            .execute_with_retry(|| self.client.get(url.clone()).query(&query))
            .await?;

        parse_runs(payload)
    }

    async fn run_report(
        &self,
        params: &ReportParams,
        progress: ProgressFn,
    ) -> Result<ReportArtifact, UpstreamError> {
        let submit_url = self.endpoint(&format!("api/v2/projects/{}/reports", params.project_id))?;
        let body = serde_json::to_value(params)
            .map_err(|e| UpstreamError::fatal(None, format!("unencodable report params: {}", e)))?;

        progress("submitting", json!({ "project_id": params.project_id }));

        let created = self
            .execute_with_retry(|| self.client.post(submit_url.clone()).json(&body))
            .await?;

        let report_id = created
            .get("report_id")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                UpstreamError::fatal(None, "report submission response missing report_id")
            })?;

        progress("submitted", json!({ "report_id": report_id }));

        let status_url = self.endpoint(&format!("api/v2/reports/{}", report_id))?;

        // The upstream builds the artifact asynchronously; poll until
        // it reaches a terminal state. Transient poll failures retry
        // inside execute_with_retry.
        loop {
            tokio::time::sleep(self.config.report_poll_interval).await;

            let status_payload = self
                .execute_with_retry(|| self.client.get(status_url.clone()))
                .await?;
            let status = status_payload
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("unknown");

            progress("building", json!({ "report_id": report_id, "status": status }));

            match status {
                "completed" => {
                    let path = status_payload
                        .get("path")
                        .and_then(Value::as_str)
                        .ok_or_else(|| {
                            UpstreamError::fatal(None, "completed report is missing its path")
                        })?;
                    let url = status_payload
                        .get("url")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    return Ok(ReportArtifact {
                        path: path.to_string(),
                        url,
                    });
                }
                "failed" => {
                    let message = status_payload
                        .get("error")
                        .and_then(Value::as_str)
                        .unwrap_or("report generation failed upstream");
                    return Err(UpstreamError::fatal(None, message));
                }
                _ => continue,
            }
        }
    }
}

/// Accept both a bare array and the `{ "runs": [...] }` envelope.
fn parse_runs(payload: Value) -> Result<Vec<TestRun>, UpstreamError> {
    let runs_value = match payload {
        Value::Array(_) => payload,
        Value::Object(ref map) => map.get("runs").cloned().unwrap_or_else(|| json!([])),
        _ => json!([]),
    };
    serde_json::from_value(runs_value)
        .map_err(|e| UpstreamError::fatal(None, format!("unparseable runs payload: {}", e)))
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= BODY_SNIPPET_LEN {
        trimmed.to_string()
    } else {
        let mut end = BODY_SNIPPET_LEN;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    }
}
