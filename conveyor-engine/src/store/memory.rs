//! In-memory job store
//!
//! Keeps everything under one async mutex, which makes every operation,
//! including the claim, trivially atomic. Used by the test suite and by
//! embeddings that do not need durability.

use crate::error::StoreError;
use crate::store::{ClaimedRun, JobStore};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use conveyor_core::{JobFlags, JobRecord, JobRun, JobRunStatus};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    jobs: HashMap<Uuid, JobRecord>,
    /// Runs in insertion order; the claim tiebreak relies on it
    runs: Vec<JobRun>,
}

impl Inner {
    fn run_mut(&mut self, id: Uuid) -> Option<&mut JobRun> {
        self.runs.iter_mut().find(|run| run.id == id)
    }

    /// Index of the next claimable run: due `Waiting` runs and stale
    /// `Executing` runs, earliest `next_start_on` first, insertion order on
    /// ties (stable because the scan follows insertion order).
    fn next_due_index(&self, now: DateTime<Utc>, stale_before: DateTime<Utc>) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (idx, run) in self.runs.iter().enumerate() {
            let claimable = match run.status {
                JobRunStatus::Waiting => run.next_start_on <= now,
                JobRunStatus::Executing => run.last_updated_on < stale_before,
                _ => false,
            };
            if !claimable {
                continue;
            }
            match best {
                Some(current) if self.runs[current].next_start_on <= run.next_start_on => {}
                _ => best = Some(idx),
            }
        }
        best
    }
}

/// Mutex-guarded in-memory implementation of [`JobStore`]
#[derive(Default)]
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
}

impl MemoryJobStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert_job(&self, job: &JobRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(parent_id) = job.parent_job {
            let parent = inner
                .jobs
                .get_mut(&parent_id)
                .ok_or(StoreError::JobNotFound(parent_id))?;
            parent.flags = parent.flags.with(JobFlags::HAS_CHILD_JOBS);
        }
        inner.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<JobRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.jobs.get(&id).cloned())
    }

    async fn children_of(&self, parent: Uuid) -> Result<Vec<JobRecord>, StoreError> {
        let inner = self.inner.lock().await;
        let mut children: Vec<JobRecord> = inner
            .jobs
            .values()
            .filter(|job| job.parent_job == Some(parent))
            .cloned()
            .collect();
        children.sort_by_key(|job| job.created_at);
        Ok(children)
    }

    async fn insert_run(&self, run: &JobRun) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.runs.push(run.clone());
        Ok(())
    }

    async fn get_run(&self, id: Uuid) -> Result<Option<JobRun>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.runs.iter().find(|run| run.id == id).cloned())
    }

    async fn update_run(&self, run: &JobRun) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let stored = inner
            .run_mut(run.id)
            .ok_or(StoreError::RunNotFound(run.id))?;
        *stored = run.clone();
        Ok(())
    }

    async fn claim_due_run(
        &self,
        now: DateTime<Utc>,
        staleness: Duration,
    ) -> Result<Option<ClaimedRun>, StoreError> {
        let mut inner = self.inner.lock().await;
        let stale_before = now - staleness;

        let Some(idx) = inner.next_due_index(now, stale_before) else {
            return Ok(None);
        };

        let run = &mut inner.runs[idx];
        let reclaimed = run.status == JobRunStatus::Executing;
        run.mark_executing(now);
        Ok(Some(ClaimedRun {
            run: run.clone(),
            reclaimed,
        }))
    }

    async fn due_runs(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<JobRun>, StoreError> {
        let inner = self.inner.lock().await;
        let mut due: Vec<JobRun> = inner
            .runs
            .iter()
            .filter(|run| run.status == JobRunStatus::Waiting && run.next_start_on <= now)
            .cloned()
            .collect();
        // Insertion order already breaks ties; the sort is stable.
        due.sort_by_key(|run| run.next_start_on);
        due.truncate(limit);
        Ok(due)
    }
}
