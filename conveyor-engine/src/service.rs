//! Job service
//!
//! Construction-time and administrative operations: creating job records
//! (with fail-fast target validation and parent linkage), seeding runs, and
//! the terminal overrides (cancel, expire) that bypass retry accounting.

use crate::clock::Clock;
use crate::error::EngineError;
use crate::registry::TargetRegistry;
use crate::store::JobStore;
use conveyor_core::{DefinitionError, JobFlags, JobRecord, JobRun};
use uuid::Uuid;

/// Creates a job record, validating it against the registry first.
///
/// Validation is fail-fast: an unresolvable target or an illegal
/// parent/StartOnSave combination is rejected synchronously and nothing is
/// persisted. When the parent exists, its `HAS_CHILD_JOBS` flag is set by
/// the store in the same atomic operation as the insert. Returns the record
/// along with the first run when the record carries `START_ON_SAVE` (a
/// child's start is driven by its parent, never by its own creation).
pub async fn create_job(
    store: &dyn JobStore,
    registry: &TargetRegistry,
    clock: &dyn Clock,
    job: JobRecord,
) -> Result<(JobRecord, Option<JobRun>), EngineError> {
    // A record could never be replayed if its target is not resolvable;
    // reject it before it hits the store.
    registry
        .resolve(
            &job.target_type,
            &job.target_method,
            job.target_parameter_count,
        )
        .map_err(|_| {
            EngineError::Definition(DefinitionError::InvalidTarget {
                target_type: job.target_type.clone(),
                target_method: job.target_method.clone(),
                parameter_count: job.target_parameter_count,
                reason: "no matching handler registered".to_string(),
            })
        })?;

    if let Some(parent_id) = job.parent_job {
        if job.flags.is_set(JobFlags::START_ON_SAVE) {
            return Err(DefinitionError::StartOnSaveWithParent {
                code: job.code.clone(),
            }
            .into());
        }
        if store.get_job(parent_id).await?.is_none() {
            return Err(DefinitionError::ParentNotFound(parent_id).into());
        }
    }

    store.insert_job(&job).await?;
    tracing::info!("Job created: {} ({})", job.id, job.code);

    let run = if job.flags.is_set(JobFlags::START_ON_SAVE) {
        Some(start_job_run(store, clock, &job, None).await?)
    } else {
        None
    };

    Ok((job, run))
}

/// Seeds and persists a fresh run for a job record.
///
/// The run starts in `Executing`, due immediately; the caller is expected
/// to dispatch it right away. A run orphaned between insert and dispatch is
/// recovered by staleness reclaim.
pub async fn start_job_run(
    store: &dyn JobStore,
    clock: &dyn Clock,
    job: &JobRecord,
    source_id: Option<Uuid>,
) -> Result<JobRun, EngineError> {
    let run = JobRun::new(job, source_id, clock.now());
    store.insert_run(&run).await?;
    tracing::info!("Job run {} created for job {}", run.id, job.code);
    Ok(run)
}

/// Looks up a job by id and seeds a fresh run for it
pub async fn start_job(
    store: &dyn JobStore,
    clock: &dyn Clock,
    job_id: Uuid,
    source_id: Option<Uuid>,
) -> Result<JobRun, EngineError> {
    let job = store
        .get_job(job_id)
        .await?
        .ok_or(crate::error::StoreError::JobNotFound(job_id))?;
    start_job_run(store, clock, &job, source_id).await
}

/// Cancels a run on external request.
///
/// Best effort: a worker mid-invocation observes the cancellation only at
/// its next transition. Returns whether the run actually moved to
/// `Cancelled` (terminal runs are left untouched).
pub async fn cancel_run(
    store: &dyn JobStore,
    clock: &dyn Clock,
    run_id: Uuid,
) -> Result<bool, EngineError> {
    let mut run = store
        .get_run(run_id)
        .await?
        .ok_or(crate::error::StoreError::RunNotFound(run_id))?;

    if !run.cancel(clock.now()) {
        tracing::warn!(
            "Cannot cancel job run {} in terminal state {:?}",
            run_id,
            run.status
        );
        return Ok(false);
    }

    store.update_run(&run).await?;
    tracing::info!("Job run {} cancelled", run_id);
    Ok(true)
}

/// Expires a run: administrative timeout unrelated to the retry policy
pub async fn expire_run(
    store: &dyn JobStore,
    clock: &dyn Clock,
    run_id: Uuid,
) -> Result<bool, EngineError> {
    let mut run = store
        .get_run(run_id)
        .await?
        .ok_or(crate::error::StoreError::RunNotFound(run_id))?;

    if !run.expire(clock.now()) {
        return Ok(false);
    }

    store.update_run(&run).await?;
    tracing::info!("Job run {} expired", run_id);
    Ok(true)
}
