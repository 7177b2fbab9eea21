//! Job run context
//!
//! Handed to every handler invocation; this is the live object substituted
//! for context-marker argument slots at replay time.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Execution context for one attempt of a job run
#[derive(Debug, Clone)]
pub struct JobRunContext {
    pub run_id: Uuid,
    pub job_id: Uuid,
    /// Caller-chosen job code, for handler-side logging
    pub job_code: String,
    /// Correlates the triggering event, if any
    pub source_id: Option<Uuid>,
    /// When this attempt started
    pub attempt_started_at: DateTime<Utc>,
}
