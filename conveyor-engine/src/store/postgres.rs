//! Postgres job store
//!
//! Production implementation of [`JobStore`] over sqlx. The claim runs a
//! short transaction: select one candidate with `FOR UPDATE SKIP LOCKED`,
//! flip it to `Executing`, commit. A worker that loses the race simply sees
//! the next candidate (or none); the handler invocation itself always runs
//! outside any transaction.

use crate::error::StoreError;
use crate::store::{ClaimedRun, JobStore};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use conveyor_core::{
    JobFlags, JobRecord, JobRun, JobRunStatus, RetryPolicy, ThreadAffinity,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

/// Creates a connection pool for the job store
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(database_url)
        .await
}

/// sqlx-backed implementation of [`JobStore`]
#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    /// Wraps an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the jobs and job_runs tables and their indexes
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id UUID PRIMARY KEY,
                code VARCHAR(255) NOT NULL,
                thread_affinity VARCHAR(50) NOT NULL,
                flags BIGINT NOT NULL DEFAULT 0,
                target_type VARCHAR(255) NOT NULL,
                target_method VARCHAR(255) NOT NULL,
                target_parameter_count INTEGER NOT NULL,
                arguments TEXT NOT NULL DEFAULT '',
                retry_interval_seconds BIGINT NOT NULL,
                retry_count INTEGER NOT NULL,
                retry_pause_minutes BIGINT NOT NULL,
                retry_rounds_count INTEGER NOT NULL,
                parent_job UUID REFERENCES jobs(id),
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job_runs (
                id UUID PRIMARY KEY,
                job_id UUID NOT NULL REFERENCES jobs(id),
                source_id UUID,
                status VARCHAR(50) NOT NULL,
                current_arguments TEXT NOT NULL DEFAULT '',
                remaining_retries INTEGER NOT NULL,
                remaining_rounds INTEGER NOT NULL,
                next_start_on TIMESTAMPTZ NOT NULL,
                log TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMPTZ NOT NULL,
                last_updated_on TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_job_runs_status ON job_runs(status)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_job_runs_next_start_on ON job_runs(next_start_on ASC)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_parent_job ON jobs(parent_job)")
            .execute(&self.pool)
            .await?;

        tracing::info!("Job store migrations completed");
        Ok(())
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert_job(&self, job: &JobRecord) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO jobs (id, code, thread_affinity, flags, target_type, target_method,
                              target_parameter_count, arguments, retry_interval_seconds,
                              retry_count, retry_pause_minutes, retry_rounds_count,
                              parent_job, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(job.id)
        .bind(&job.code)
        .bind(affinity_to_string(job.thread_affinity))
        .bind(job.flags.bits() as i64)
        .bind(&job.target_type)
        .bind(&job.target_method)
        .bind(job.target_parameter_count as i32)
        .bind(&job.arguments)
        .bind(job.retry_policy.interval_seconds)
        .bind(job.retry_policy.retry_count)
        .bind(job.retry_policy.pause_minutes)
        .bind(job.retry_policy.rounds_count)
        .bind(job.parent_job)
        .bind(job.created_at)
        .execute(&mut *tx)
        .await?;

        // Parent linkage and the insert commit together or not at all
        if let Some(parent_id) = job.parent_job {
            let result = sqlx::query("UPDATE jobs SET flags = flags | $1 WHERE id = $2")
                .bind(JobFlags::HAS_CHILD_JOBS.bits() as i64)
                .bind(parent_id)
                .execute(&mut *tx)
                .await?;

            if result.rows_affected() == 0 {
                tx.rollback().await?;
                return Err(StoreError::JobNotFound(parent_id));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<JobRecord>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, code, thread_affinity, flags, target_type, target_method,
                   target_parameter_count, arguments, retry_interval_seconds,
                   retry_count, retry_pause_minutes, retry_rounds_count,
                   parent_job, created_at
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn children_of(&self, parent: Uuid) -> Result<Vec<JobRecord>, StoreError> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, code, thread_affinity, flags, target_type, target_method,
                   target_parameter_count, arguments, retry_interval_seconds,
                   retry_count, retry_pause_minutes, retry_rounds_count,
                   parent_job, created_at
            FROM jobs
            WHERE parent_job = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(parent)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn insert_run(&self, run: &JobRun) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO job_runs (id, job_id, source_id, status, current_arguments,
                                  remaining_retries, remaining_rounds, next_start_on,
                                  log, created_at, last_updated_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(run.id)
        .bind(run.job_id)
        .bind(run.source_id)
        .bind(status_to_string(run.status))
        .bind(&run.current_arguments)
        .bind(run.remaining_retries)
        .bind(run.remaining_rounds)
        .bind(run.next_start_on)
        .bind(&run.log)
        .bind(run.created_at)
        .bind(run.last_updated_on)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_run(&self, id: Uuid) -> Result<Option<JobRun>, StoreError> {
        let row = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT id, job_id, source_id, status, current_arguments, remaining_retries,
                   remaining_rounds, next_start_on, log, created_at, last_updated_on
            FROM job_runs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn update_run(&self, run: &JobRun) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE job_runs
            SET status = $1, current_arguments = $2, remaining_retries = $3,
                remaining_rounds = $4, next_start_on = $5, log = $6, last_updated_on = $7
            WHERE id = $8
            "#,
        )
        .bind(status_to_string(run.status))
        .bind(&run.current_arguments)
        .bind(run.remaining_retries)
        .bind(run.remaining_rounds)
        .bind(run.next_start_on)
        .bind(&run.log)
        .bind(run.last_updated_on)
        .bind(run.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RunNotFound(run.id));
        }
        Ok(())
    }

    async fn claim_due_run(
        &self,
        now: DateTime<Utc>,
        staleness: Duration,
    ) -> Result<Option<ClaimedRun>, StoreError> {
        let stale_before = now - staleness;
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT id, job_id, source_id, status, current_arguments, remaining_retries,
                   remaining_rounds, next_start_on, log, created_at, last_updated_on
            FROM job_runs
            WHERE (status = 'Waiting' AND next_start_on <= $1)
               OR (status = 'Executing' AND last_updated_on < $2)
            ORDER BY next_start_on ASC, created_at ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(now)
        .bind(stale_before)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let reclaimed = row.status == "Executing";

        sqlx::query("UPDATE job_runs SET status = 'Executing', last_updated_on = $1 WHERE id = $2")
            .bind(now)
            .bind(row.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let mut run: JobRun = row.into();
        run.mark_executing(now);
        Ok(Some(ClaimedRun { run, reclaimed }))
    }

    async fn due_runs(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<JobRun>, StoreError> {
        let rows = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT id, job_id, source_id, status, current_arguments, remaining_retries,
                   remaining_rounds, next_start_on, log, created_at, last_updated_on
            FROM job_runs
            WHERE status = 'Waiting' AND next_start_on <= $1
            ORDER BY next_start_on ASC, created_at ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn status_to_string(status: JobRunStatus) -> &'static str {
    match status {
        JobRunStatus::Executing => "Executing",
        JobRunStatus::Succeeded => "Succeeded",
        JobRunStatus::Failed => "Failed",
        JobRunStatus::Waiting => "Waiting",
        JobRunStatus::Cancelled => "Cancelled",
        JobRunStatus::Expired => "Expired",
    }
}

fn string_to_status(s: &str) -> JobRunStatus {
    match s {
        "Executing" => JobRunStatus::Executing,
        "Succeeded" => JobRunStatus::Succeeded,
        "Failed" => JobRunStatus::Failed,
        "Waiting" => JobRunStatus::Waiting,
        "Cancelled" => JobRunStatus::Cancelled,
        "Expired" => JobRunStatus::Expired,
        _ => JobRunStatus::Failed,
    }
}

fn affinity_to_string(affinity: ThreadAffinity) -> &'static str {
    match affinity {
        ThreadAffinity::Background => "Background",
        ThreadAffinity::Pool => "Pool",
    }
}

fn string_to_affinity(s: &str) -> ThreadAffinity {
    match s {
        "Background" => ThreadAffinity::Background,
        _ => ThreadAffinity::Pool,
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    code: String,
    thread_affinity: String,
    flags: i64,
    target_type: String,
    target_method: String,
    target_parameter_count: i32,
    arguments: String,
    retry_interval_seconds: i64,
    retry_count: i32,
    retry_pause_minutes: i64,
    retry_rounds_count: i32,
    parent_job: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<JobRow> for JobRecord {
    fn from(row: JobRow) -> Self {
        JobRecord {
            id: row.id,
            code: row.code,
            thread_affinity: string_to_affinity(&row.thread_affinity),
            flags: JobFlags::from_bits(row.flags as u32),
            target_type: row.target_type,
            target_method: row.target_method,
            target_parameter_count: row.target_parameter_count.max(0) as usize,
            arguments: row.arguments,
            retry_policy: RetryPolicy::new(
                row.retry_interval_seconds,
                row.retry_count,
                row.retry_pause_minutes,
                row.retry_rounds_count,
            ),
            parent_job: row.parent_job,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RunRow {
    id: Uuid,
    job_id: Uuid,
    source_id: Option<Uuid>,
    status: String,
    current_arguments: String,
    remaining_retries: i32,
    remaining_rounds: i32,
    next_start_on: DateTime<Utc>,
    log: String,
    created_at: DateTime<Utc>,
    last_updated_on: DateTime<Utc>,
}

impl From<RunRow> for JobRun {
    fn from(row: RunRow) -> Self {
        JobRun {
            id: row.id,
            job_id: row.job_id,
            source_id: row.source_id,
            status: string_to_status(&row.status),
            current_arguments: row.current_arguments,
            remaining_retries: row.remaining_retries,
            remaining_rounds: row.remaining_rounds,
            next_start_on: row.next_start_on,
            log: row.log,
            created_at: row.created_at,
            last_updated_on: row.last_updated_on,
        }
    }
}
