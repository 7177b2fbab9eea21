//! Retry policy
//!
//! Pure value type governing backoff: a number of retries within a round,
//! and paused rounds after the retries of a round are exhausted.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Retry/backoff configuration embedded in a job record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the next retry after a failure, in seconds
    pub interval_seconds: i64,
    /// Retries allowed within one round
    pub retry_count: i32,
    /// Pause before starting a new round, in minutes
    pub pause_minutes: i64,
    /// Number of rounds; 0 or 1 means no round escalation
    pub rounds_count: i32,
}

impl RetryPolicy {
    /// Creates a new policy; counts are clamped to zero
    pub fn new(interval_seconds: i64, retry_count: i32, pause_minutes: i64, rounds_count: i32) -> Self {
        Self {
            interval_seconds,
            retry_count: retry_count.max(0),
            pause_minutes,
            rounds_count: rounds_count.max(0),
        }
    }

    /// Policy with a single attempt and no retries
    pub fn no_retry() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Whether the policy allows any retry at all
    pub fn is_single_attempt(&self) -> bool {
        self.retry_count == 0 && self.rounds_count <= 1
    }

    /// Delay applied before the next retry within a round
    pub fn retry_delay(&self) -> Duration {
        Duration::seconds(self.interval_seconds)
    }

    /// Delay applied before the first attempt of a new round
    pub fn round_pause(&self) -> Duration {
        Duration::minutes(self.pause_minutes)
    }

    /// Total attempts a run makes before failing terminally: the initial
    /// attempt plus retries, repeated across rounds
    pub fn max_attempts(&self) -> i64 {
        (self.retry_count as i64 + 1) * (self.rounds_count.max(1) as i64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(30, 3, 5, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_retry_is_single_attempt() {
        let policy = RetryPolicy::no_retry();
        assert!(policy.is_single_attempt());
        assert_eq!(policy.max_attempts(), 1);
    }

    #[test]
    fn test_zero_rounds_counts_as_one() {
        let policy = RetryPolicy::new(10, 2, 1, 0);
        assert_eq!(policy.max_attempts(), 3);
    }

    #[test]
    fn test_max_attempts_across_rounds() {
        let policy = RetryPolicy::new(30, 2, 5, 2);
        assert_eq!(policy.max_attempts(), 6);
    }

    #[test]
    fn test_negative_counts_clamped() {
        let policy = RetryPolicy::new(30, -1, 5, -3);
        assert_eq!(policy.retry_count, 0);
        assert_eq!(policy.rounds_count, 0);
    }

    #[test]
    fn test_delays() {
        let policy = RetryPolicy::new(30, 2, 5, 2);
        assert_eq!(policy.retry_delay(), Duration::seconds(30));
        assert_eq!(policy.round_pause(), Duration::minutes(5));
    }
}
