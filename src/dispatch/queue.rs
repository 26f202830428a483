use uuid::Uuid;

use crate::error::AppError;
use crate::models::job::{Job, OptimizationRequest};
use crate::state::{AppState, QueuedJob};

/// Allocates a job id, records the job as queued and hands it to the worker
/// pool. Returns as soon as the job is enqueued; no solver work happens on
/// the submit path.
pub async fn submit_job(
    state: &AppState,
    request: OptimizationRequest,
) -> Result<String, AppError> {
    let job_id = Uuid::new_v4().to_string();
    state.jobs.insert(job_id.clone(), Job::queued(job_id.clone()));

    let queued = QueuedJob {
        job_id: job_id.clone(),
        request,
    };

    if let Err(err) = state.job_tx.send(queued).await {
        state.jobs.remove(&job_id);
        return Err(AppError::Internal(format!("job queue send failed: {err}")));
    }

    state.metrics.jobs_in_queue.inc();
    Ok(job_id)
}
