//! Job record domain types

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable definition of a schedulable unit of work
///
/// Created once per scheduled unit of work; immutable after creation except
/// for [`JobFlags::HAS_CHILD_JOBS`], which is set when a child job is
/// created referencing this record as its parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    /// Caller-chosen label, not unique
    pub code: String,
    pub thread_affinity: ThreadAffinity,
    pub flags: JobFlags,
    /// Fully qualified name of the type declaring the target method
    pub target_type: String,
    pub target_method: String,
    /// Number of parameters the target method declares, encoded argument
    /// slots included (empty slots for context-only parameters)
    pub target_parameter_count: usize,
    /// Default arguments, encoded by the argument codec
    pub arguments: String,
    pub retry_policy: RetryPolicy,
    pub parent_job: Option<Uuid>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Execution affinity hint; opaque to the engine beyond routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadAffinity {
    /// Long-running background work
    Background,
    /// Short work suitable for a shared pool
    Pool,
}

/// Bit set of job record flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobFlags(u32);

impl JobFlags {
    /// No flags set
    pub const NONE: JobFlags = JobFlags(0);
    /// Begin a run immediately when the record is created
    pub const START_ON_SAVE: JobFlags = JobFlags(1);
    /// Derived: some child job references this record as its parent
    pub const HAS_CHILD_JOBS: JobFlags = JobFlags(1 << 1);

    /// Whether every flag in `other` is set
    pub fn is_set(&self, other: JobFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of the two flag sets
    pub fn with(self, other: JobFlags) -> JobFlags {
        JobFlags(self.0 | other.0)
    }

    /// Raw bit representation, as persisted
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Reconstructs a flag set from its persisted bits
    pub fn from_bits(bits: u32) -> JobFlags {
        JobFlags(bits)
    }
}
