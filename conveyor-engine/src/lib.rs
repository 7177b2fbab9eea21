//! Conveyor Engine
//!
//! Runtime for the Conveyor job execution engine:
//! - Store: persistence boundary with Postgres and in-memory implementations
//! - Registry: maps persisted target names back to invocable handlers
//! - Service: job creation, linkage, cancellation and expiry
//! - Executor: runs one claimed job run and applies the retry policy
//! - Scheduler: polling worker loop with atomic claims and staleness reclaim
//!
//! Domain types and the pure state machine live in `conveyor-core`.

pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use context::JobRunContext;
pub use error::{EngineError, NonRetryableError, StoreError};
pub use executor::Executor;
pub use registry::{RegisteredTarget, TargetRegistry};
pub use scheduler::Scheduler;
pub use store::{ClaimedRun, JobStore, memory::MemoryJobStore, postgres::PgJobStore};
