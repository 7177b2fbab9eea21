//! Run executor
//!
//! Executes one claimed job run: decodes the stored arguments against the
//! registered target's parameter kinds, invokes the handler, classifies the
//! outcome and applies the retry policy, then persists the transitioned run.
//! Handler failures never propagate to whoever enqueued the job; they land
//! in the run log and drive the state machine.

use crate::clock::Clock;
use crate::context::JobRunContext;
use crate::error::{EngineError, NonRetryableError};
use crate::registry::TargetRegistry;
use crate::store::{ClaimedRun, JobStore};
use conveyor_core::{FailureTransition, JobArg, JobRecord, JobRun};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Executes claimed runs against the registry and persists the outcome
pub struct Executor {
    store: Arc<dyn JobStore>,
    registry: Arc<TargetRegistry>,
    clock: Arc<dyn Clock>,
}

impl Executor {
    /// Creates an executor over the given collaborators
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<TargetRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            registry,
            clock,
        }
    }

    /// Processes one claimed run to its next persisted state.
    ///
    /// A reclaimed run (abandoned by a crashed worker) is not re-executed
    /// here; its interrupted attempt is booked as a failure and the retry
    /// policy decides what happens next.
    pub async fn process(&self, claimed: ClaimedRun) -> Result<(), EngineError> {
        let mut run = claimed.run;

        let Some(job) = self.store.get_job(run.job_id).await? else {
            // The run references a job row that no longer exists; retrying
            // cannot succeed.
            run.fail_permanently(self.clock.now(), "corrupt record: job record missing");
            self.store.update_run(&run).await?;
            warn!("Job run {} references missing job {}", run.id, run.job_id);
            return Ok(());
        };

        if claimed.reclaimed {
            let transition = run.apply_failure(
                &job.retry_policy,
                self.clock.now(),
                "abandoned by worker (stale claim reclaimed)",
            );
            self.store.update_run(&run).await?;
            info!(
                "Reclaimed stale job run {} for job {}: {:?}",
                run.id, job.code, transition
            );
            return Ok(());
        }

        debug!("Executing job run {} for job {}", run.id, job.code);
        self.execute_attempt(&job, &mut run).await;

        // A cancellation or expiry requested mid-invocation takes effect
        // here, at the next transition: the terminal override wins over the
        // attempt's outcome.
        if let Some(stored) = self.store.get_run(run.id).await? {
            if stored.is_terminal() && stored.status != run.status {
                info!(
                    "Job run {} was overridden to {:?} during execution",
                    run.id, stored.status
                );
                return Ok(());
            }
        }

        self.store.update_run(&run).await?;
        Ok(())
    }

    /// Runs one attempt and applies the resulting transition to `run`.
    ///
    /// No store access happens in here; the claim was the only transactional
    /// step and the handler may block on external I/O for as long as it
    /// needs.
    async fn execute_attempt(&self, job: &JobRecord, run: &mut JobRun) {
        let target = match self.registry.resolve(
            &job.target_type,
            &job.target_method,
            job.target_parameter_count,
        ) {
            Ok(target) => target,
            Err(err) => {
                // Resolution failure on a persisted record is corruption,
                // never retried.
                run.fail_permanently(self.clock.now(), &format!("corrupt record: {}", err));
                warn!("Job run {} target resolution failed: {}", run.id, err);
                return;
            }
        };

        let args = match conveyor_core::decode_args(&run.current_arguments, target.params()) {
            Ok(args) => args,
            Err(err) => {
                run.fail_permanently(self.clock.now(), &format!("corrupt record: {}", err));
                warn!("Job run {} argument decoding failed: {}", run.id, err);
                return;
            }
        };

        let ctx = JobRunContext {
            run_id: run.id,
            job_id: job.id,
            job_code: job.code.clone(),
            source_id: run.source_id,
            attempt_started_at: self.clock.now(),
        };

        // Context slots travel as nulls; the live context goes alongside.
        let values: Vec<Value> = args
            .into_iter()
            .map(|arg| match arg {
                JobArg::Value(value) => value,
                JobArg::Null | JobArg::Context => Value::Null,
            })
            .collect();

        match target.invoke(ctx, values).await {
            Ok(()) => {
                run.apply_success(self.clock.now());
                info!("Job run {} succeeded for job {}", run.id, job.code);
            }
            Err(err) if err.downcast_ref::<NonRetryableError>().is_some() => {
                run.fail_permanently(self.clock.now(), &format!("non-retryable: {:#}", err));
                warn!("Job run {} failed (non-retryable): {:#}", run.id, err);
            }
            Err(err) => {
                let transition =
                    run.apply_failure(&job.retry_policy, self.clock.now(), &format!("{:#}", err));
                match transition {
                    FailureTransition::Retry { next_start_on } => {
                        warn!(
                            "Job run {} failed, retrying at {}: {:#}",
                            run.id, next_start_on, err
                        );
                    }
                    FailureTransition::NewRound { next_start_on } => {
                        warn!(
                            "Job run {} exhausted its round, next round at {}: {:#}",
                            run.id, next_start_on, err
                        );
                    }
                    FailureTransition::Exhausted => {
                        warn!("Job run {} failed terminally: {:#}", run.id, err);
                    }
                }
            }
        }
    }
}
