//! Persistence boundary
//!
//! The engine talks to its durable store through the [`JobStore`] trait;
//! [`postgres::PgJobStore`] is the production implementation and
//! [`memory::MemoryJobStore`] backs tests and light embeddings. The store is
//! the single source of truth: claims are atomic with respect to competing
//! workers, and no store lock is ever held across a handler invocation.

pub mod memory;
pub mod postgres;

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use conveyor_core::{JobRecord, JobRun};
use uuid::Uuid;

/// A run handed to exactly one worker by an atomic claim
#[derive(Debug, Clone)]
pub struct ClaimedRun {
    /// The run, already flipped to `Executing`
    pub run: JobRun,
    /// Whether this claim reclaimed a stale `Executing` run abandoned by a
    /// crashed worker; the interrupted attempt counts as a failure
    pub reclaimed: bool,
}

impl ClaimedRun {
    /// Wraps a freshly created run the creator dispatches directly
    pub fn fresh(run: JobRun) -> Self {
        Self {
            run,
            reclaimed: false,
        }
    }
}

/// Durable store for job records and job runs
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Inserts a job record.
    ///
    /// When `parent_job` is set, the parent's `HAS_CHILD_JOBS` flag is set
    /// in the same atomic operation; both writes commit together or neither
    /// does. Fails with [`StoreError::JobNotFound`] if the parent row does
    /// not exist.
    async fn insert_job(&self, job: &JobRecord) -> Result<(), StoreError>;

    /// Fetches a job record by id
    async fn get_job(&self, id: Uuid) -> Result<Option<JobRecord>, StoreError>;

    /// Jobs declaring the given job as their parent; read-only signal
    async fn children_of(&self, parent: Uuid) -> Result<Vec<JobRecord>, StoreError>;

    /// Inserts a job run
    async fn insert_run(&self, run: &JobRun) -> Result<(), StoreError>;

    /// Fetches a job run by id
    async fn get_run(&self, id: Uuid) -> Result<Option<JobRun>, StoreError>;

    /// Persists the full mutable state of a run
    async fn update_run(&self, run: &JobRun) -> Result<(), StoreError>;

    /// Atomically claims the next due run, if any.
    ///
    /// Candidates are runs in `Waiting` with `next_start_on <= now`, plus
    /// runs stuck in `Executing` whose last transition is older than
    /// `staleness` (abandoned by a crashed worker). Selection is strictly
    /// ascending `next_start_on`, ties broken by creation order. A claim
    /// lost to a concurrent worker is not an error; the result is simply
    /// the next candidate, or `None`.
    async fn claim_due_run(
        &self,
        now: DateTime<Utc>,
        staleness: Duration,
    ) -> Result<Option<ClaimedRun>, StoreError>;

    /// Lists due runs without claiming them, in claim order
    async fn due_runs(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<JobRun>, StoreError>;
}
