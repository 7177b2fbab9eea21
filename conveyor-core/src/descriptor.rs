//! Job descriptor builder
//!
//! Captures a target reference (declaring type name, method name, parameter
//! count) and already-evaluated argument values into a persistable
//! [`JobRecord`] payload. How the argument list is obtained (macro, explicit
//! call, code generation) is the caller's concern; the builder only records
//! slots in order and encodes them.

use crate::codec::{JobArg, encode_args};
use crate::domain::job::{JobFlags, JobRecord, ThreadAffinity};
use crate::error::DefinitionError;
use crate::retry::RetryPolicy;
use serde::Serialize;
use uuid::Uuid;

/// Builder for a job record payload
#[derive(Debug, Clone)]
pub struct JobDescriptor {
    code: String,
    target_type: String,
    target_method: String,
    args: Vec<JobArg>,
    thread_affinity: ThreadAffinity,
    flags: JobFlags,
    retry_policy: RetryPolicy,
    parent_job: Option<Uuid>,
    arg_error: Option<String>,
}

impl JobDescriptor {
    /// Starts a descriptor for the given target
    pub fn new(
        code: impl Into<String>,
        target_type: impl Into<String>,
        target_method: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            target_type: target_type.into(),
            target_method: target_method.into(),
            args: Vec::new(),
            thread_affinity: ThreadAffinity::Pool,
            flags: JobFlags::NONE,
            retry_policy: RetryPolicy::default(),
            parent_job: None,
            arg_error: None,
        }
    }

    /// Appends a serializable argument slot
    pub fn arg(mut self, value: impl Serialize) -> Self {
        match serde_json::to_value(value) {
            Ok(json) => self.args.push(JobArg::Value(json)),
            // Surfaced from build(); the slot index is the current length.
            Err(err) => {
                if self.arg_error.is_none() {
                    self.arg_error = Some(format!("slot {}: {}", self.args.len(), err));
                }
                self.args.push(JobArg::Null);
            }
        }
        self
    }

    /// Appends an explicit null slot
    pub fn null_arg(mut self) -> Self {
        self.args.push(JobArg::Null);
        self
    }

    /// Appends a run-context slot.
    ///
    /// The slot is never serialized; it occupies a position so the parameter
    /// count stays aligned, and is filled with the live execution context at
    /// replay time.
    pub fn context_arg(mut self) -> Self {
        self.args.push(JobArg::Context);
        self
    }

    /// Sets the retry policy (defaults to [`RetryPolicy::default`])
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets the execution affinity hint
    pub fn thread_affinity(mut self, affinity: ThreadAffinity) -> Self {
        self.thread_affinity = affinity;
        self
    }

    /// Requests an immediate first run when the record is created
    pub fn start_on_save(mut self) -> Self {
        self.flags = self.flags.with(JobFlags::START_ON_SAVE);
        self
    }

    /// Declares a parent job.
    ///
    /// A job with a parent must not also set StartOnSave; `build` rejects
    /// the combination.
    pub fn parent(mut self, parent_job: Uuid) -> Self {
        self.parent_job = Some(parent_job);
        self
    }

    /// Encodes the captured arguments and produces the record payload.
    ///
    /// Construction-time errors (flag conflicts, encoding failures) surface
    /// here, synchronously, before anything is persisted.
    pub fn build(self) -> Result<JobRecord, DefinitionError> {
        if self.parent_job.is_some() && self.flags.is_set(JobFlags::START_ON_SAVE) {
            return Err(DefinitionError::StartOnSaveWithParent { code: self.code });
        }

        if let Some(detail) = self.arg_error {
            return Err(DefinitionError::UnserializableArgument {
                code: self.code,
                detail,
            });
        }

        let arguments = encode_args(&self.args)?;

        Ok(JobRecord {
            id: Uuid::new_v4(),
            code: self.code,
            thread_affinity: self.thread_affinity,
            flags: self.flags,
            target_type: self.target_type,
            target_method: self.target_method,
            target_parameter_count: self.args.len(),
            arguments,
            retry_policy: self.retry_policy,
            parent_job: self.parent_job,
            created_at: chrono::Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ParamKind, decode_args};
    use serde_json::json;

    #[test]
    fn test_build_encodes_arguments_in_order() {
        let record = JobDescriptor::new("send-invoice", "billing.InvoiceService", "send")
            .arg("hello")
            .context_arg()
            .arg(42)
            .build()
            .unwrap();

        assert_eq!(record.target_parameter_count, 3);
        let params = [ParamKind::Value, ParamKind::Context, ParamKind::Value];
        let decoded = decode_args(&record.arguments, &params).unwrap();
        assert_eq!(decoded[0], JobArg::Value(json!("hello")));
        assert_eq!(decoded[1], JobArg::Context);
        assert_eq!(decoded[2], JobArg::Value(json!(42)));
    }

    #[test]
    fn test_parent_with_start_on_save_rejected() {
        let err = JobDescriptor::new("child", "tests.Target", "run")
            .parent(Uuid::new_v4())
            .start_on_save()
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            DefinitionError::StartOnSaveWithParent { code } if code == "child"
        ));
    }

    #[test]
    fn test_no_arguments_builds_empty_blob() {
        let record = JobDescriptor::new("tick", "tests.Target", "tick")
            .build()
            .unwrap();
        assert_eq!(record.target_parameter_count, 0);
        assert_eq!(record.arguments, "");
    }

    #[test]
    fn test_flags_accumulate() {
        let record = JobDescriptor::new("eager", "tests.Target", "run")
            .start_on_save()
            .build()
            .unwrap();
        assert!(record.flags.is_set(JobFlags::START_ON_SAVE));
        assert!(!record.flags.is_set(JobFlags::HAS_CHILD_JOBS));
    }
}
