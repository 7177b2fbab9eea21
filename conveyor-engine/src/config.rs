//! Engine configuration
//!
//! Defines all configurable parameters for the scheduler including polling
//! interval, parallelism and the staleness threshold for reclaiming
//! abandoned runs.

use std::time::Duration;

/// Scheduler configuration
///
/// All intervals are configurable to allow tuning for different deployment
/// scenarios (dev vs prod, fast vs slow stores).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How often the scheduler polls the store for due runs
    pub poll_interval: Duration,

    /// Max job runs executing in parallel on this worker
    pub max_parallel_runs: usize,

    /// Max runs claimed per poll cycle
    pub claim_batch_size: usize,

    /// How long a run may sit in `Executing` without a state transition
    /// before another worker may reclaim it as abandoned
    pub staleness_threshold: chrono::Duration,
}

impl EngineConfig {
    /// Creates a configuration with defaults
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_parallel_runs: 4,
            claim_batch_size: 10,
            staleness_threshold: chrono::Duration::minutes(10),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - POLL_INTERVAL (seconds, default: 5)
    /// - MAX_PARALLEL_RUNS (default: 4)
    /// - CLAIM_BATCH_SIZE (default: 10)
    /// - STALENESS_THRESHOLD (seconds, default: 600)
    pub fn from_env() -> Self {
        let defaults = Self::new();

        let poll_interval = std::env::var("POLL_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.poll_interval);

        let max_parallel_runs = std::env::var("MAX_PARALLEL_RUNS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(defaults.max_parallel_runs);

        let claim_batch_size = std::env::var("CLAIM_BATCH_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(defaults.claim_batch_size);

        let staleness_threshold = std::env::var("STALENESS_THRESHOLD")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .map(chrono::Duration::seconds)
            .unwrap_or(defaults.staleness_threshold);

        Self {
            poll_interval,
            max_parallel_runs,
            claim_batch_size,
            staleness_threshold,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
