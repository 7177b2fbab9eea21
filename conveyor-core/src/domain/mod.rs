//! Domain types
//!
//! Structure shared between the engine (persists, schedules) and callers
//! (define jobs); behavior lives in the pure transition functions on
//! [`run::JobRun`].

pub mod job;
pub mod run;
