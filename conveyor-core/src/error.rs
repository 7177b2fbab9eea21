//! Error types for the core crate

use thiserror::Error;
use uuid::Uuid;

/// Errors raised while encoding or decoding argument blobs
#[derive(Debug, Error)]
pub enum CodecError {
    /// Decoded segment count does not match the target parameter count
    #[error("argument count mismatch: blob holds {actual} segment(s), target expects {expected}")]
    ArgumentCountMismatch {
        /// Number of parameters the target method declares
        expected: usize,
        /// Number of segments found in the blob
        actual: usize,
    },

    /// A non-context parameter list was decoded from an empty blob
    #[error("serialized argument values not found, expected {expected} value(s)")]
    MissingArguments {
        /// Number of parameters the target method declares
        expected: usize,
    },

    /// An individual value failed to serialize
    #[error("failed to serialize argument at slot {slot}: {source}")]
    Serialize {
        /// Zero-based argument slot
        slot: usize,
        source: serde_json::Error,
    },

    /// An individual value failed to deserialize
    #[error("failed to deserialize argument at slot {slot}: {source}")]
    Deserialize {
        /// Zero-based argument slot
        slot: usize,
        source: serde_json::Error,
    },
}

/// Errors raised at job definition time, before anything is persisted
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// StartOnSave and a parent job are mutually exclusive
    #[error("invalid job definition: StartOnSave may not be set on a job with a parent job (job code: {code})")]
    StartOnSaveWithParent {
        /// Caller-chosen job code
        code: String,
    },

    /// The declared parent job does not exist in the store
    #[error("parent job not found: {0}")]
    ParentNotFound(Uuid),

    /// The target is not resolvable, so the job could never be replayed
    #[error("invalid job target {target_type}.{target_method}/{parameter_count}: {reason}")]
    InvalidTarget {
        /// Fully qualified target type name
        target_type: String,
        /// Target method name
        target_method: String,
        /// Declared parameter count
        parameter_count: usize,
        /// Why resolution failed
        reason: String,
    },

    /// An argument captured at definition time could not be serialized
    #[error("invalid job definition {code}: unserializable argument at {detail}")]
    UnserializableArgument {
        /// Caller-chosen job code
        code: String,
        /// Slot index and serializer message
        detail: String,
    },

    /// Default arguments failed to encode
    #[error("failed to encode job arguments: {0}")]
    Codec(#[from] CodecError),
}
