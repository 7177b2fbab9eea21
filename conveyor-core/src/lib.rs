//! Conveyor Core
//!
//! Domain types and pure logic for the Conveyor job execution engine.
//!
//! This crate contains:
//! - Domain types: job records, job runs and their lifecycle rules
//! - Retry policy: interval/round backoff arithmetic
//! - Argument codec: delimited multi-value argument encoding
//! - Descriptor builder: turning a described call into a persistable record
//!
//! Note: Persistence, target resolution and scheduling live in
//! `conveyor-engine`; nothing in this crate performs I/O.

pub mod codec;
pub mod descriptor;
pub mod domain;
pub mod error;
pub mod retry;

pub use codec::{ARGS_DELIMITER, JobArg, ParamKind, decode_args, encode_args};
pub use descriptor::JobDescriptor;
pub use domain::job::{JobFlags, JobRecord, ThreadAffinity};
pub use domain::run::{FailureTransition, JobRun, JobRunStatus};
pub use error::{CodecError, DefinitionError};
pub use retry::RetryPolicy;
