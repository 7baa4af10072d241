/// Worker task loop.
///
/// Each worker claims queued jobs until the queue runs dry, then
/// blocks on the work signal with an idle timeout. A timeout above the
/// worker floor retires the task; the floor keeps at least
/// `min_workers` alive through sustained quiet periods.
use tokio::time::timeout;

use crate::logger::{self, LogTag};

use super::engine::JobEngine;

pub(crate) async fn worker_loop(engine: JobEngine, worker_id: u64) {
    loop {
        if engine.deregister_on_shutdown(worker_id) {
            logger::debug(
                LogTag::Worker,
                &format!("worker {} stopping for shutdown", worker_id),
            );
            break;
        }

        if let Some(job_id) = engine.claim_next(worker_id) {
            engine.execute(&job_id).await;
            engine.mark_idle(worker_id);
            continue;
        }

        match timeout(engine.idle_timeout(), engine.work_signal().notified()).await {
            Ok(_) => {}
            Err(_) => {
                if let Some(id) = engine.retire_if_above_floor(worker_id) {
                    logger::debug(
                        LogTag::Worker,
                        &format!("worker {} retired after idle timeout", id),
                    );
                    break;
                }
            }
        }
    }
}
