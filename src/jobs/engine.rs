/// The autoscaling job engine.
///
/// One mutex guards the job map, the insertion-order list, the FIFO
/// work queue and the worker registry, so enqueue, trimming and
/// scaling decisions are linearizable with respect to each other. The
/// lock is never held across job execution or any other await point.
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;

use crate::config::EngineConfig;
use crate::errors::{EnqueueError, UpstreamError};
use crate::logger::{self, LogTag};
use crate::upstream::{ProgressFn, ReportArtifact, ReportParams};

use super::job::{EngineStats, Job, JobStatus, WorkerState};
use super::worker::worker_loop;
use super::ReportRunner;

struct EngineInner {
    jobs: HashMap<String, Job>,
    /// Insertion order, oldest first; drives history trimming
    order: Vec<String>,
    /// FIFO work queue of still-queued job ids
    queue: VecDeque<String>,
    workers: HashMap<u64, WorkerState>,
    next_worker_id: u64,
    shutting_down: bool,
}

#[derive(Clone)]
pub struct JobEngine {
    config: EngineConfig,
    runner: Arc<dyn ReportRunner>,
    inner: Arc<Mutex<EngineInner>>,
    work_signal: Arc<Notify>,
}

impl JobEngine {
    /// Create the engine and spawn the worker floor. Must be called
    /// from within a tokio runtime.
    pub fn new(config: EngineConfig, runner: Arc<dyn ReportRunner>) -> Self {
        let config = config.normalized();
        let engine = Self {
            config: config.clone(),
            runner,
            inner: Arc::new(Mutex::new(EngineInner {
                jobs: HashMap::new(),
                order: Vec::new(),
                queue: VecDeque::new(),
                workers: HashMap::new(),
                next_worker_id: 0,
                shutting_down: false,
            })),
            work_signal: Arc::new(Notify::new()),
        };

        for _ in 0..config.min_workers {
            engine.spawn_worker();
        }

        logger::info(
            LogTag::Jobs,
            &format!(
                "job engine started: {} workers (max {}, idle timeout {:?})",
                config.min_workers, config.max_workers, config.idle_timeout
            ),
        );

        engine
    }

    /// Accept a job and return its snapshot immediately.
    ///
    /// After bookkeeping, the scaling rule decides how many workers to
    /// add: enough to cover queued work not already covered by idle
    /// workers, capped by the ceiling.
    pub fn enqueue(&self, params: ReportParams) -> Result<Job, EnqueueError> {
        let job = Job::new(params);
        let id = job.id.clone();
        let snapshot = job.clone();

        let (to_spawn, queued) = {
            let mut inner = self.inner.lock();
            if inner.shutting_down {
                return Err(EnqueueError::ShuttingDown);
            }

            inner.jobs.insert(id.clone(), job);
            inner.order.push(id.clone());
            inner.queue.push_back(id);

            let idle = inner.workers.values().filter(|w| w.idle).count();
            let headroom = self.config.max_workers.saturating_sub(inner.workers.len());
            let to_spawn = inner.queue.len().saturating_sub(idle).min(headroom);
            (to_spawn, inner.queue.len())
        };

        self.work_signal.notify_one();
        for _ in 0..to_spawn {
            self.spawn_worker();
        }

        logger::debug(
            LogTag::Jobs,
            &format!(
                "job {} enqueued ({} queued, spawning {})",
                snapshot.id, queued, to_spawn
            ),
        );

        Ok(snapshot)
    }

    /// Snapshot of a job by id.
    pub fn get(&self, id: &str) -> Option<Job> {
        self.inner.lock().jobs.get(id).cloned()
    }

    /// Number of still-queued jobs ahead of `id` in FIFO order; None
    /// once the job is running, terminal or unknown. Reflects the live
    /// queue, not the state at enqueue time.
    pub fn queue_position(&self, id: &str) -> Option<usize> {
        let inner = self.inner.lock();
        let job = inner.jobs.get(id)?;
        if job.status != JobStatus::Queued {
            return None;
        }
        inner.queue.iter().position(|queued| queued == id)
    }

    pub fn stats(&self) -> EngineStats {
        let inner = self.inner.lock();
        EngineStats {
            total: inner.jobs.len(),
            running: inner
                .jobs
                .values()
                .filter(|j| j.status == JobStatus::Running)
                .count(),
            queued: inner.queue.len(),
            workers: inner.workers.len(),
            idle_workers: inner.workers.values().filter(|w| w.idle).count(),
            history_limit: self.config.history_limit,
            latest_job: inner
                .order
                .last()
                .and_then(|id| inner.jobs.get(id))
                .cloned(),
        }
    }

    /// Append a progress event to a job's bounded history.
    ///
    /// Called by the in-flight report operation through its progress
    /// callback, not by external callers.
    pub fn report_progress(&self, id: &str, stage: &str, payload: Value) {
        let mut inner = self.inner.lock();
        if let Some(job) = inner.jobs.get_mut(id) {
            let now = Utc::now();
            job.progress.push_back(super::job::ProgressEvent {
                stage: stage.to_string(),
                payload,
                timestamp: now,
            });
            while job.progress.len() > self.config.progress_cap {
                job.progress.pop_front();
            }
            job.current_stage = Some(stage.to_string());
            job.updated_at = now;
        }
    }

    /// Stop accepting work and let idle workers exit. In-flight jobs
    /// run to completion; still-queued jobs are left unclaimed.
    pub fn shutdown(&self) {
        self.inner.lock().shutting_down = true;
        self.work_signal.notify_waiters();
        logger::info(LogTag::Jobs, "job engine shutting down");
    }

    // ---- worker-facing internals -------------------------------------------

    pub(crate) fn idle_timeout(&self) -> Duration {
        self.config.idle_timeout
    }

    pub(crate) fn work_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.work_signal)
    }

    /// During shutdown a waking worker deregisters and exits.
    pub(crate) fn deregister_on_shutdown(&self, worker_id: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.shutting_down {
            inner.workers.remove(&worker_id);
            true
        } else {
            false
        }
    }

    /// Pop the next queued job and mark it running, atomically with
    /// the worker's idle flag so queue positions and scaling stay
    /// consistent.
    pub(crate) fn claim_next(&self, worker_id: u64) -> Option<String> {
        let mut inner = self.inner.lock();
        let id = inner.queue.pop_front()?;
        if let Some(worker) = inner.workers.get_mut(&worker_id) {
            worker.idle = false;
        }
        if let Some(job) = inner.jobs.get_mut(&id) {
            let now = Utc::now();
            job.status = JobStatus::Running;
            job.started_at = Some(now);
            job.updated_at = now;
        }
        Some(id)
    }

    pub(crate) fn mark_idle(&self, worker_id: u64) {
        let mut inner = self.inner.lock();
        if let Some(worker) = inner.workers.get_mut(&worker_id) {
            worker.idle = true;
        }
    }

    /// Retire an idle worker unless that would drop the pool below its
    /// floor. Re-checks the queue under the lock: work that arrived
    /// during the idle timeout keeps the worker alive.
    pub(crate) fn retire_if_above_floor(&self, worker_id: u64) -> Option<u64> {
        let mut inner = self.inner.lock();
        if !inner.queue.is_empty() {
            return None;
        }
        if inner.workers.len() <= self.config.min_workers {
            return None;
        }
        inner.workers.remove(&worker_id).map(|state| state.id)
    }

    /// Run one claimed job to completion and record the outcome. A
    /// panicking runner is caught and recorded like any other failure;
    /// the worker task survives.
    pub(crate) async fn execute(&self, job_id: &str) {
        let params = {
            let inner = self.inner.lock();
            inner.jobs.get(job_id).map(|job| job.params.clone())
        };
        let Some(params) = params else {
            return;
        };

        logger::info(LogTag::Jobs, &format!("job {} started", job_id));

        let progress: ProgressFn = {
            let engine = self.clone();
            let id = job_id.to_string();
            Arc::new(move |stage, payload| engine.report_progress(&id, stage, payload))
        };

        let started = Instant::now();
        let outcome = AssertUnwindSafe(self.runner.run(&params, progress))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(UpstreamError::fatal(
                    None,
                    format!("report operation panicked: {}", panic_message(&panic)),
                ))
            });

        self.finish(job_id, outcome, started);
    }

    fn finish(
        &self,
        job_id: &str,
        outcome: Result<ReportArtifact, UpstreamError>,
        started: Instant,
    ) {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let failure = match &outcome {
            Ok(_) => None,
            Err(e) => Some(e.to_string()),
        };

        {
            let mut inner = self.inner.lock();
            if let Some(job) = inner.jobs.get_mut(job_id) {
                let now = Utc::now();
                job.completed_at = Some(now);
                job.updated_at = now;
                job.duration_ms = Some(elapsed_ms);
                match outcome {
                    Ok(artifact) => {
                        job.status = JobStatus::Success;
                        job.result_path = Some(artifact.path);
                        job.result_url = artifact.url;
                    }
                    Err(e) => {
                        job.status = JobStatus::Error;
                        job.error = Some(e.to_string());
                    }
                }
            }
            trim_history(&mut inner, self.config.history_limit);
        }

        match failure {
            None => logger::info(
                LogTag::Jobs,
                &format!("job {} succeeded in {}ms", job_id, elapsed_ms),
            ),
            Some(message) => logger::warning(
                LogTag::Jobs,
                &format!("job {} failed after {}ms: {}", job_id, elapsed_ms, message),
            ),
        }
    }

    fn spawn_worker(&self) {
        let worker_id = {
            let mut inner = self.inner.lock();
            if inner.shutting_down || inner.workers.len() >= self.config.max_workers {
                return;
            }
            let id = inner.next_worker_id;
            inner.next_worker_id += 1;
            inner.workers.insert(id, WorkerState { id, idle: true });
            id
        };

        let engine = self.clone();
        tokio::spawn(async move {
            worker_loop(engine, worker_id).await;
        });

        logger::debug(LogTag::Worker, &format!("worker {} spawned", worker_id));
    }
}

/// Drop the oldest jobs while the history exceeds its limit, but only
/// jobs already terminal; the first non-terminal job stops the pass so
/// queued/running work is never evicted.
fn trim_history(inner: &mut EngineInner, limit: usize) {
    while inner.order.len() > limit {
        let oldest = match inner.order.first() {
            Some(id) => id.clone(),
            None => break,
        };
        let terminal = inner
            .jobs
            .get(&oldest)
            .map(|job| job.status.is_terminal())
            .unwrap_or(true);
        if !terminal {
            break;
        }
        inner.order.remove(0);
        inner.jobs.remove(&oldest);
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::future::join_all;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;
    use tokio::time::sleep;

    fn params(title: &str) -> ReportParams {
        serde_json::from_value(json!({ "project_id": 1, "title": title })).unwrap()
    }

    fn config(min: usize, max: usize, history: usize) -> EngineConfig {
        EngineConfig {
            min_workers: min,
            max_workers: max,
            idle_timeout: Duration::from_millis(100),
            history_limit: history,
            progress_cap: 20,
        }
    }

    /// Runner that blocks on a semaphore gate until the test releases
    /// permits, making queue states deterministic.
    struct GatedRunner {
        gate: Arc<Semaphore>,
        started: Arc<Mutex<Vec<String>>>,
        concurrent: AtomicUsize,
        max_concurrent: AtomicUsize,
    }

    impl GatedRunner {
        fn new(gate: Arc<Semaphore>) -> Self {
            Self {
                gate,
                started: Arc::new(Mutex::new(Vec::new())),
                concurrent: AtomicUsize::new(0),
                max_concurrent: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ReportRunner for GatedRunner {
        async fn run(
            &self,
            params: &ReportParams,
            _progress: ProgressFn,
        ) -> Result<ReportArtifact, UpstreamError> {
            self.started.lock().push(params.title.clone());
            let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_concurrent.fetch_max(now, Ordering::SeqCst);

            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| UpstreamError::fatal(None, e.to_string()))?;
            permit.forget();

            self.concurrent.fetch_sub(1, Ordering::SeqCst);
            Ok(ReportArtifact {
                path: format!("reports/{}.html", params.title),
                url: None,
            })
        }
    }

    struct FailingRunner;

    #[async_trait]
    impl ReportRunner for FailingRunner {
        async fn run(
            &self,
            _params: &ReportParams,
            _progress: ProgressFn,
        ) -> Result<ReportArtifact, UpstreamError> {
            Err(UpstreamError::fatal(Some(400), "bad report request"))
        }
    }

    struct PanickingRunner;

    #[async_trait]
    impl ReportRunner for PanickingRunner {
        async fn run(
            &self,
            _params: &ReportParams,
            _progress: ProgressFn,
        ) -> Result<ReportArtifact, UpstreamError> {
            panic!("runner exploded");
        }
    }

    struct ProgressRunner {
        events: usize,
    }

    #[async_trait]
    impl ReportRunner for ProgressRunner {
        async fn run(
            &self,
            _params: &ReportParams,
            progress: ProgressFn,
        ) -> Result<ReportArtifact, UpstreamError> {
            for i in 0..self.events {
                progress(&format!("stage-{}", i), json!({ "step": i }));
            }
            Ok(ReportArtifact {
                path: "reports/progress.html".to_string(),
                url: None,
            })
        }
    }

    async fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if check() {
                return true;
            }
            sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fifo_queue_positions_and_completion() {
        let gate = Arc::new(Semaphore::new(0));
        let runner = Arc::new(GatedRunner::new(Arc::clone(&gate)));
        let engine = JobEngine::new(config(1, 1, 50), runner.clone() as Arc<dyn ReportRunner>);

        let j0 = engine.enqueue(params("j0")).unwrap();
        let j1 = engine.enqueue(params("j1")).unwrap();
        let j2 = engine.enqueue(params("j2")).unwrap();

        // the single worker claims j0; j1 and j2 stay queued
        assert!(
            wait_until(Duration::from_secs(2), || {
                engine.get(&j0.id).map(|j| j.status) == Some(JobStatus::Running)
            })
            .await
        );

        assert_eq!(engine.queue_position(&j0.id), None);
        assert_eq!(engine.queue_position(&j1.id), Some(0));
        assert_eq!(engine.queue_position(&j2.id), Some(1));
        assert_eq!(engine.queue_position("nope"), None);

        gate.add_permits(3);

        assert!(
            wait_until(Duration::from_secs(2), || {
                [&j0, &j1, &j2].iter().all(|j| {
                    engine.get(&j.id).map(|j| j.status) == Some(JobStatus::Success)
                })
            })
            .await
        );

        // claims happened in FIFO order
        assert_eq!(*runner.started.lock(), vec!["j0", "j1", "j2"]);

        let done = engine.get(&j0.id).unwrap();
        assert!(done.completed_at.is_some());
        assert_eq!(done.result_path.as_deref(), Some("reports/j0.html"));
        assert!(done.duration_ms.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_worker_ceiling_and_idle_shrink() {
        let gate = Arc::new(Semaphore::new(0));
        let runner = Arc::new(GatedRunner::new(Arc::clone(&gate)));
        let engine = JobEngine::new(config(1, 4, 50), runner.clone() as Arc<dyn ReportRunner>);

        let jobs: Vec<Job> = (0..6)
            .map(|i| engine.enqueue(params(&format!("burst-{}", i))).unwrap())
            .collect();

        // pool grows to the ceiling and no further
        assert!(
            wait_until(Duration::from_secs(2), || engine.stats().workers == 4).await
        );
        assert!(engine.stats().workers <= 4);

        gate.add_permits(6);

        assert!(
            wait_until(Duration::from_secs(3), || {
                jobs.iter().all(|j| {
                    engine.get(&j.id).map(|j| j.status) == Some(JobStatus::Success)
                })
            })
            .await
        );
        assert!(runner.max_concurrent.load(Ordering::SeqCst) <= 4);

        // after a sustained idle period the pool settles back to the floor
        assert!(
            wait_until(Duration::from_secs(3), || engine.stats().workers == 1).await
        );
        assert_eq!(engine.stats().idle_workers, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_single_worker_runs_serially() {
        let gate = Arc::new(Semaphore::new(10));
        let runner = Arc::new(GatedRunner::new(gate));
        let engine = JobEngine::new(config(1, 1, 50), runner.clone() as Arc<dyn ReportRunner>);

        let handles: Vec<_> = (0..3)
            .map(|i| engine.enqueue(params(&format!("serial-{}", i))).unwrap())
            .collect();

        assert!(
            wait_until(Duration::from_secs(2), || {
                handles.iter().all(|j| {
                    engine.get(&j.id).map(|j| j.status) == Some(JobStatus::Success)
                })
            })
            .await
        );

        assert_eq!(runner.max_concurrent.load(Ordering::SeqCst), 1);
        assert_eq!(
            *runner.started.lock(),
            vec!["serial-0", "serial-1", "serial-2"]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_job_recorded_and_worker_survives() {
        let engine = JobEngine::new(config(1, 1, 50), Arc::new(FailingRunner));

        let failed = engine.enqueue(params("doomed")).unwrap();
        assert!(
            wait_until(Duration::from_secs(2), || {
                engine.get(&failed.id).map(|j| j.status) == Some(JobStatus::Error)
            })
            .await
        );

        let job = engine.get(&failed.id).unwrap();
        assert!(job.error.as_deref().unwrap().contains("bad report request"));
        assert!(job.completed_at.is_some());

        // same worker keeps serving the queue
        let next = engine.enqueue(params("also-doomed")).unwrap();
        assert!(
            wait_until(Duration::from_secs(2), || {
                engine.get(&next.id).map(|j| j.status) == Some(JobStatus::Error)
            })
            .await
        );
        assert_eq!(engine.stats().workers, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_panicking_runner_recorded_as_error() {
        let engine = JobEngine::new(config(1, 1, 50), Arc::new(PanickingRunner));

        let job = engine.enqueue(params("kaboom")).unwrap();
        assert!(
            wait_until(Duration::from_secs(2), || {
                engine.get(&job.id).map(|j| j.status) == Some(JobStatus::Error)
            })
            .await
        );
        let job = engine.get(&job.id).unwrap();
        assert!(job.error.as_deref().unwrap().contains("panicked"));
        assert_eq!(engine.stats().workers, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_history_trim_never_evicts_inflight_jobs() {
        let gate = Arc::new(Semaphore::new(0));
        let runner = Arc::new(GatedRunner::new(Arc::clone(&gate)));
        let engine = JobEngine::new(config(1, 1, 3), runner.clone() as Arc<dyn ReportRunner>);

        let jobs: Vec<Job> = (0..8)
            .map(|i| engine.enqueue(params(&format!("hist-{}", i))).unwrap())
            .collect();

        // let the first six finish; the last two stay running/queued
        gate.add_permits(6);
        assert!(
            wait_until(Duration::from_secs(3), || {
                jobs[..6].iter().all(|j| {
                    let status = engine.get(&j.id).map(|j| j.status);
                    status.is_none() || status == Some(JobStatus::Success)
                }) && engine.stats().total <= 4
            })
            .await
        );

        // the two non-terminal jobs were preserved even though total
        // history exceeded the limit
        assert!(engine.get(&jobs[6].id).is_some());
        assert!(engine.get(&jobs[7].id).is_some());

        gate.add_permits(2);
        assert!(
            wait_until(Duration::from_secs(2), || {
                engine.get(&jobs[7].id).map(|j| j.status) == Some(JobStatus::Success)
            })
            .await
        );
        assert!(engine.stats().total <= 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_progress_history_is_capped() {
        let engine = JobEngine::new(config(1, 1, 50), Arc::new(ProgressRunner { events: 30 }));

        let job = engine.enqueue(params("chatty")).unwrap();
        assert!(
            wait_until(Duration::from_secs(2), || {
                engine.get(&job.id).map(|j| j.status) == Some(JobStatus::Success)
            })
            .await
        );

        let job = engine.get(&job.id).unwrap();
        assert_eq!(job.progress.len(), 20);
        // oldest events were dropped, newest kept
        assert_eq!(job.progress.front().unwrap().stage, "stage-10");
        assert_eq!(job.progress.back().unwrap().stage, "stage-29");
        assert_eq!(job.current_stage.as_deref(), Some("stage-29"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shutdown_rejects_new_work() {
        let engine = JobEngine::new(config(1, 2, 50), Arc::new(FailingRunner));
        engine.shutdown();

        assert!(matches!(
            engine.enqueue(params("late")),
            Err(EnqueueError::ShuttingDown)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_enqueues_respect_ceiling() {
        let gate = Arc::new(Semaphore::new(0));
        let runner = Arc::new(GatedRunner::new(Arc::clone(&gate)));
        let engine = JobEngine::new(config(1, 4, 100), runner.clone() as Arc<dyn ReportRunner>);

        let tasks: Vec<_> = (0..12)
            .map(|i| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.enqueue(params(&format!("par-{}", i))) })
            })
            .collect();
        let results = join_all(tasks).await;
        assert!(results.into_iter().all(|r| r.unwrap().is_ok()));

        assert!(engine.stats().workers <= 4);
        gate.add_permits(12);

        assert!(
            wait_until(Duration::from_secs(3), || {
                let stats = engine.stats();
                stats.queued == 0 && stats.running == 0
            })
            .await
        );
        assert!(runner.max_concurrent.load(Ordering::SeqCst) <= 4);
        assert_eq!(engine.stats().total, 12);
    }
}
