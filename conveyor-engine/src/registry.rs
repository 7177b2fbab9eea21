//! Target registry
//!
//! The target-resolution collaborator: maps the `(target_type,
//! target_method)` names persisted on a job record back to an invocable
//! async handler. Registration is explicit, with no reflection involved, so
//! anything registered here is resolvable, and job creation fail-fasts
//! against this registry before persisting a record that could never be
//! replayed.

use crate::context::JobRunContext;
use crate::error::EngineError;
use conveyor_core::ParamKind;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by a target handler
pub type TargetFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

type TargetHandler = Box<dyn Fn(JobRunContext, Vec<Value>) -> TargetFuture + Send + Sync>;

/// A resolvable target: declared parameter kinds plus the handler
pub struct RegisteredTarget {
    params: Vec<ParamKind>,
    handler: TargetHandler,
}

impl RegisteredTarget {
    /// Parameter kinds the target declares, in order
    pub fn params(&self) -> &[ParamKind] {
        &self.params
    }

    /// Invokes the handler.
    ///
    /// `args` holds one decoded value per parameter slot; context slots
    /// carry `Value::Null` since the live context travels separately.
    pub async fn invoke(&self, ctx: JobRunContext, args: Vec<Value>) -> anyhow::Result<()> {
        (self.handler)(ctx, args).await
    }
}

impl std::fmt::Debug for RegisteredTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTarget")
            .field("params", &self.params)
            .finish()
    }
}

/// Registry of invocable targets, keyed by declaring type and method name
#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: HashMap<(String, String), RegisteredTarget>,
}

impl TargetRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for a target type/method pair.
    ///
    /// Registering the same pair twice replaces the earlier handler.
    pub fn register<F, Fut>(
        &mut self,
        target_type: impl Into<String>,
        target_method: impl Into<String>,
        params: Vec<ParamKind>,
        handler: F,
    ) where
        F: Fn(JobRunContext, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let boxed: TargetHandler = Box::new(move |ctx, args| Box::pin(handler(ctx, args)));
        self.targets.insert(
            (target_type.into(), target_method.into()),
            RegisteredTarget {
                params,
                handler: boxed,
            },
        );
    }

    /// Resolves a persisted target reference to its registered handler.
    ///
    /// Fails with [`EngineError::TargetNotFound`] when the pair is unknown
    /// or the declared parameter count does not match the registration.
    pub fn resolve(
        &self,
        target_type: &str,
        target_method: &str,
        parameter_count: usize,
    ) -> Result<&RegisteredTarget, EngineError> {
        let target = self
            .targets
            .get(&(target_type.to_string(), target_method.to_string()))
            .filter(|target| target.params.len() == parameter_count);

        target.ok_or_else(|| EngineError::TargetNotFound {
            target_type: target_type.to_string(),
            target_method: target_method.to_string(),
            parameter_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn ctx() -> JobRunContext {
        JobRunContext {
            run_id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            job_code: "test".to_string(),
            source_id: None,
            attempt_started_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_register_and_invoke() {
        let mut registry = TargetRegistry::new();
        registry.register(
            "tests.Echo",
            "echo",
            vec![ParamKind::Value],
            |_ctx, args| async move {
                anyhow::ensure!(args == vec![serde_json::json!("ping")], "unexpected args");
                Ok(())
            },
        );

        let target = registry.resolve("tests.Echo", "echo", 1).unwrap();
        target
            .invoke(ctx(), vec![serde_json::json!("ping")])
            .await
            .unwrap();
    }

    #[test]
    fn test_resolve_unknown_target() {
        let registry = TargetRegistry::new();
        let err = registry.resolve("tests.Missing", "run", 0).unwrap_err();
        assert!(matches!(err, EngineError::TargetNotFound { .. }));
    }

    #[test]
    fn test_resolve_arity_mismatch() {
        let mut registry = TargetRegistry::new();
        registry.register("tests.Echo", "echo", vec![ParamKind::Value], |_, _| async {
            Ok(())
        });

        assert!(registry.resolve("tests.Echo", "echo", 2).is_err());
        assert!(registry.resolve("tests.Echo", "echo", 1).is_ok());
    }
}
