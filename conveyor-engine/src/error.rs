//! Error types for the engine crate

use conveyor_core::DefinitionError;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the persistence boundary
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Referenced job record does not exist
    #[error("job not found: {0}")]
    JobNotFound(Uuid),

    /// Referenced job run does not exist
    #[error("job run not found: {0}")]
    RunNotFound(Uuid),
}

/// Errors surfaced by engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// A persisted target name cannot be resolved to a registered handler
    #[error("target not found: {target_type}.{target_method} with {parameter_count} parameter(s)")]
    TargetNotFound {
        target_type: String,
        target_method: String,
        parameter_count: usize,
    },

    /// Construction-time rejection of a job definition
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// Persistence failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Marker attached to a handler failure to declare it permanent.
///
/// The executor downcasts handler errors against this type; a match forces
/// an immediate terminal `Failed`, skipping remaining retries and rounds.
///
/// ```ignore
/// return Err(NonRetryableError::new("account was deleted").into());
/// ```
#[derive(Debug, Error)]
#[error("{message}")]
pub struct NonRetryableError {
    message: String,
}

impl NonRetryableError {
    /// Creates a permanent-failure marker with the given message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
