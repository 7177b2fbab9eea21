//! Scheduler
//!
//! The polling worker loop: claims due runs from the store and executes
//! them. Several scheduler instances may poll the same store concurrently;
//! the store's atomic claim keeps any run on exactly one worker. Each run
//! executes in its own task, bounded by a semaphore.

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::executor::Executor;
use crate::registry::TargetRegistry;
use crate::store::{ClaimedRun, JobStore};
use conveyor_core::JobRun;
use std::sync::Arc;
use tokio::sync::{Semaphore, broadcast};
use tokio::time;
use tracing::{debug, error, info, warn};

/// Polling scheduler over a shared job store
pub struct Scheduler {
    store: Arc<dyn JobStore>,
    registry: Arc<TargetRegistry>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    semaphore: Arc<Semaphore>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Scheduler {
    /// Creates a scheduler over the given collaborators
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<TargetRegistry>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_parallel_runs));
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            store,
            registry,
            clock,
            config,
            semaphore,
            shutdown_tx,
        }
    }

    /// An executor sharing this scheduler's collaborators, for dispatching
    /// freshly created runs without waiting for the next poll
    pub fn executor(&self) -> Executor {
        Executor::new(
            Arc::clone(&self.store),
            Arc::clone(&self.registry),
            Arc::clone(&self.clock),
        )
    }

    /// Dispatches a freshly created run immediately, off the polling path
    pub fn dispatch(&self, run: JobRun) -> tokio::task::JoinHandle<()> {
        let executor = self.executor();
        tokio::spawn(async move {
            let run_id = run.id;
            if let Err(e) = executor.process(ClaimedRun::fresh(run)).await {
                error!("Failed to process job run {}: {:#}", run_id, e);
            }
        })
    }

    /// Runs the polling loop until [`Scheduler::shutdown`] is called
    pub async fn run(&self) {
        info!(
            "Starting scheduler (poll interval: {:?}, max parallel runs: {})",
            self.config.poll_interval, self.config.max_parallel_runs
        );

        let mut interval = time::interval(self.config.poll_interval);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.poll_once().await {
                        Ok(claimed) => {
                            if claimed > 0 {
                                debug!("Processed {} run(s) this cycle", claimed);
                            }
                        }
                        Err(e) => {
                            error!("Error during poll cycle: {:#}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Scheduler shutting down");
                    break;
                }
            }
        }
    }

    /// Signals the polling loop to stop after the in-flight cycle
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Performs a single poll cycle.
    ///
    /// Claims up to `claim_batch_size` due runs, spawning a task per claim,
    /// and waits for the spawned tasks before returning. Claiming stops
    /// early when the parallelism budget is exhausted; those runs stay
    /// claimable for the next cycle or another worker.
    pub async fn poll_once(&self) -> Result<usize, EngineError> {
        let mut handles = Vec::new();

        for _ in 0..self.config.claim_batch_size {
            let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() else {
                debug!("Max parallel runs reached, deferring to next cycle");
                break;
            };

            let claimed = match self
                .store
                .claim_due_run(self.clock.now(), self.config.staleness_threshold)
                .await?
            {
                Some(claimed) => claimed,
                None => break,
            };

            let executor = self.executor();
            let handle = tokio::spawn(async move {
                let run_id = claimed.run.id;
                if let Err(e) = executor.process(claimed).await {
                    error!("Failed to process job run {}: {:#}", run_id, e);
                }
                drop(permit);
            });
            handles.push(handle);
        }

        let claimed = handles.len();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Job run task panicked: {}", e);
            }
        }

        Ok(claimed)
    }
}
