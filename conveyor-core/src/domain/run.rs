//! Job run domain type and its state machine
//!
//! A [`JobRun`] is one stateful execution lifecycle of a [`JobRecord`]:
//! retry bookkeeping, scheduling time, status, and an append-only log. The
//! transition functions here are pure; the caller supplies the current
//! time and persists the mutated run afterwards.

use crate::domain::job::JobRecord;
use crate::retry::RetryPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One execution lifecycle instance of a job record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRun {
    pub id: Uuid,
    pub job_id: Uuid,
    /// Correlates the triggering event, if any
    pub source_id: Option<Uuid>,
    pub status: JobRunStatus,
    /// Begins as a copy of the job's encoded default arguments; the engine
    /// never rewrites it across retries
    pub current_arguments: String,
    pub remaining_retries: i32,
    pub remaining_rounds: i32,
    /// When the scheduler should next attempt this run
    pub next_start_on: DateTime<Utc>,
    /// Append-only human-readable trace; initialized to an empty string so
    /// appends are always well defined
    pub log: String,
    pub created_at: DateTime<Utc>,
    /// Last state-transition time; drives staleness reclaim
    pub last_updated_on: DateTime<Utc>,
}

/// Job run execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobRunStatus {
    /// Attempt in progress or about to start; initial state of a fresh run
    Executing,
    Succeeded,
    Failed,
    /// Scheduled, not yet due
    Waiting,
    Cancelled,
    Expired,
}

impl JobRunStatus {
    /// Whether no further transitions are possible from this status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobRunStatus::Succeeded
                | JobRunStatus::Failed
                | JobRunStatus::Cancelled
                | JobRunStatus::Expired
        )
    }
}

/// Outcome of applying a failed attempt to a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureTransition {
    /// Another retry is scheduled within the current round
    Retry { next_start_on: DateTime<Utc> },
    /// Retries were exhausted; a new round starts after the pause
    NewRound { next_start_on: DateTime<Utc> },
    /// Retries and rounds are exhausted; the run failed terminally
    Exhausted,
}

impl JobRun {
    /// Seeds a fresh run from a job record.
    ///
    /// The run starts in `Executing`, due immediately, with retry counters
    /// copied from the job's policy.
    pub fn new(job: &JobRecord, source_id: Option<Uuid>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id: job.id,
            source_id,
            status: JobRunStatus::Executing,
            current_arguments: job.arguments.clone(),
            remaining_retries: job.retry_policy.retry_count,
            remaining_rounds: job.retry_policy.rounds_count,
            next_start_on: now,
            log: String::new(),
            created_at: now,
            last_updated_on: now,
        }
    }

    /// Whether the run reached a terminal status
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Appends a timestamped line to the run log
    pub fn append_log(&mut self, now: DateTime<Utc>, message: &str) {
        self.log
            .push_str(&format!("[{}] {}\n", now.to_rfc3339(), message));
    }

    /// Records a successful attempt; terminal
    pub fn apply_success(&mut self, now: DateTime<Utc>) {
        self.status = JobRunStatus::Succeeded;
        self.last_updated_on = now;
        self.append_log(now, "completed successfully");
    }

    /// Records a failed attempt and schedules the next one, if any.
    ///
    /// Retries within the current round are consumed first; when they run
    /// out, the run rolls over into a new round after the policy's pause,
    /// with the retry counter reseeded. A run whose final round has no
    /// retries left fails terminally. Every counter decrement is logged.
    pub fn apply_failure(
        &mut self,
        policy: &RetryPolicy,
        now: DateTime<Utc>,
        reason: &str,
    ) -> FailureTransition {
        self.last_updated_on = now;

        if self.remaining_retries > 0 {
            self.remaining_retries -= 1;
            let next = now + policy.retry_delay();
            self.status = JobRunStatus::Waiting;
            self.next_start_on = next;
            self.append_log(
                now,
                &format!(
                    "attempt failed: {}; retrying at {} ({} retries left in this round)",
                    reason,
                    next.to_rfc3339(),
                    self.remaining_retries
                ),
            );
            return FailureTransition::Retry { next_start_on: next };
        }

        // remaining_rounds counts the current round inclusive, so a value of
        // 1 means this was the last round.
        if self.remaining_rounds > 1 {
            self.remaining_rounds -= 1;
            self.remaining_retries = policy.retry_count;
            let next = now + policy.round_pause();
            self.status = JobRunStatus::Waiting;
            self.next_start_on = next;
            self.append_log(
                now,
                &format!(
                    "attempt failed: {}; round exhausted, next round starts at {} ({} rounds left)",
                    reason,
                    next.to_rfc3339(),
                    self.remaining_rounds
                ),
            );
            return FailureTransition::NewRound { next_start_on: next };
        }

        self.status = JobRunStatus::Failed;
        self.append_log(now, &format!("failed terminally: {}", reason));
        FailureTransition::Exhausted
    }

    /// Forces a terminal failure, bypassing remaining retries and rounds.
    ///
    /// Used for non-retryable failures and corrupt persisted records, which
    /// retrying cannot fix.
    pub fn fail_permanently(&mut self, now: DateTime<Utc>, reason: &str) {
        self.status = JobRunStatus::Failed;
        self.last_updated_on = now;
        self.append_log(now, &format!("failed (not retried): {}", reason));
    }

    /// Marks the run as picked up for execution
    pub fn mark_executing(&mut self, now: DateTime<Utc>) {
        self.status = JobRunStatus::Executing;
        self.last_updated_on = now;
    }

    /// Cancels the run if it has not already reached a terminal status.
    ///
    /// Returns whether the run was actually cancelled. Bypasses retry
    /// accounting entirely.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobRunStatus::Cancelled;
        self.last_updated_on = now;
        self.append_log(now, "cancelled on external request");
        true
    }

    /// Expires the run if it has not already reached a terminal status.
    ///
    /// Administrative timeout unrelated to the retry policy.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobRunStatus::Expired;
        self.last_updated_on = now;
        self.append_log(now, "expired");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::{JobFlags, ThreadAffinity};

    fn job_with_policy(policy: RetryPolicy) -> JobRecord {
        JobRecord {
            id: Uuid::new_v4(),
            code: "test-job".to_string(),
            thread_affinity: ThreadAffinity::Pool,
            flags: JobFlags::NONE,
            target_type: "tests.Target".to_string(),
            target_method: "run".to_string(),
            target_parameter_count: 0,
            arguments: String::new(),
            retry_policy: policy,
            parent_job: None,
            created_at: Utc::now(),
        }
    }

    fn fail_until_terminal(run: &mut JobRun, policy: &RetryPolicy) -> usize {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let now = run.next_start_on;
            if let FailureTransition::Exhausted = run.apply_failure(policy, now, "boom") {
                return attempts;
            }
        }
    }

    #[test]
    fn test_new_run_seeds_counters_and_status() {
        let policy = RetryPolicy::new(30, 2, 5, 2);
        let job = job_with_policy(policy);
        let now = Utc::now();
        let run = JobRun::new(&job, None, now);

        assert_eq!(run.status, JobRunStatus::Executing);
        assert_eq!(run.remaining_retries, 2);
        assert_eq!(run.remaining_rounds, 2);
        assert_eq!(run.next_start_on, now);
        assert_eq!(run.log, "");
    }

    #[test]
    fn test_success_is_terminal_and_logged() {
        let job = job_with_policy(RetryPolicy::no_retry());
        let now = Utc::now();
        let mut run = JobRun::new(&job, None, now);

        run.apply_success(now);
        assert_eq!(run.status, JobRunStatus::Succeeded);
        assert!(run.is_terminal());
        assert!(run.log.contains("completed successfully"));
    }

    #[test]
    fn test_failure_count_matches_policy() {
        // (retries + 1) * max(rounds, 1) failed attempts before Failed
        for (retries, rounds) in [(0, 0), (0, 1), (2, 0), (2, 1), (2, 2), (1, 3)] {
            let policy = RetryPolicy::new(1, retries, 1, rounds);
            let job = job_with_policy(policy);
            let mut run = JobRun::new(&job, None, Utc::now());

            let attempts = fail_until_terminal(&mut run, &policy);
            assert_eq!(
                attempts as i64,
                policy.max_attempts(),
                "retries={retries} rounds={rounds}"
            );
            assert_eq!(run.status, JobRunStatus::Failed);
        }
    }

    #[test]
    fn test_retry_and_round_scheduling() {
        // Scenario: interval=30s, retries=2, pause=5min, rounds=2
        let policy = RetryPolicy::new(30, 2, 5, 2);
        let job = job_with_policy(policy);
        let t0 = Utc::now();
        let mut run = JobRun::new(&job, None, t0);

        let t1 = match run.apply_failure(&policy, t0, "boom") {
            FailureTransition::Retry { next_start_on } => next_start_on,
            other => panic!("expected retry, got {other:?}"),
        };
        assert_eq!(t1, t0 + chrono::Duration::seconds(30));
        assert_eq!(run.status, JobRunStatus::Waiting);
        assert_eq!(run.remaining_retries, 1);

        let t2 = match run.apply_failure(&policy, t1, "boom") {
            FailureTransition::Retry { next_start_on } => next_start_on,
            other => panic!("expected retry, got {other:?}"),
        };
        assert_eq!(t2, t1 + chrono::Duration::seconds(30));
        assert_eq!(run.remaining_retries, 0);

        // Third failure exhausts the round and rolls over
        let t3 = match run.apply_failure(&policy, t2, "boom") {
            FailureTransition::NewRound { next_start_on } => next_start_on,
            other => panic!("expected new round, got {other:?}"),
        };
        assert_eq!(t3, t2 + chrono::Duration::minutes(5));
        assert_eq!(run.remaining_rounds, 1);
        assert_eq!(run.remaining_retries, 2);
        assert_eq!(run.status, JobRunStatus::Waiting);

        // Second round: two retries, then terminal failure
        run.apply_failure(&policy, t3, "boom");
        run.apply_failure(&policy, run.next_start_on, "boom");
        let last = run.next_start_on;
        assert_eq!(
            run.apply_failure(&policy, last, "boom"),
            FailureTransition::Exhausted
        );
        assert_eq!(run.status, JobRunStatus::Failed);
    }

    #[test]
    fn test_permanent_failure_skips_retries() {
        let policy = RetryPolicy::new(30, 5, 5, 5);
        let job = job_with_policy(policy);
        let now = Utc::now();
        let mut run = JobRun::new(&job, None, now);

        run.fail_permanently(now, "corrupt record");
        assert_eq!(run.status, JobRunStatus::Failed);
        assert!(run.log.contains("not retried"));
    }

    #[test]
    fn test_cancel_bypasses_retry_accounting() {
        let policy = RetryPolicy::new(30, 5, 5, 5);
        let job = job_with_policy(policy);
        let now = Utc::now();
        let mut run = JobRun::new(&job, None, now);

        assert!(run.cancel(now));
        assert_eq!(run.status, JobRunStatus::Cancelled);
        assert_eq!(run.remaining_retries, 5);

        // Terminal runs cannot be cancelled or expired again
        assert!(!run.cancel(now));
        assert!(!run.expire(now));
    }

    #[test]
    fn test_expire_bypasses_retry_accounting() {
        let policy = RetryPolicy::new(30, 5, 5, 5);
        let job = job_with_policy(policy);
        let now = Utc::now();
        let mut run = JobRun::new(&job, None, now);
        run.status = JobRunStatus::Waiting;

        assert!(run.expire(now));
        assert_eq!(run.status, JobRunStatus::Expired);
        assert!(run.is_terminal());
        assert_eq!(run.remaining_retries, 5);
        assert_eq!(run.remaining_rounds, 5);
        assert!(run.log.contains("expired"));

        assert!(!run.expire(now));
        assert!(!run.cancel(now));
    }

    #[test]
    fn test_log_is_append_only() {
        let policy = RetryPolicy::new(1, 1, 1, 1);
        let job = job_with_policy(policy);
        let now = Utc::now();
        let mut run = JobRun::new(&job, None, now);

        run.apply_failure(&policy, now, "first");
        let after_first = run.log.clone();
        run.apply_failure(&policy, run.next_start_on, "second");
        assert!(run.log.starts_with(&after_first));
        assert!(run.log.contains("first"));
        assert!(run.log.contains("second"));
    }
}
