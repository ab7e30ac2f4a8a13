//! Invocation runtime seam.
//!
//! The drain loop continues by asking the runtime for a fresh, asynchronous
//! invocation of itself. [`LoopbackInvoker`] records those requests in
//! process so a chain can be pumped without a real runtime.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use sync_types::FunctionSettings;

use crate::error::WorkerError;

/// Function name plus the version to pin re-invocations to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionIdentity {
    pub name: String,
    pub qualifier: Option<String>,
}

impl FunctionIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            qualifier: None,
        }
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// Identity of the running function as reported by its invocation
    /// context. An empty version leaves the rechain unpinned.
    pub fn from_context(function_name: impl Into<String>, function_version: &str) -> Self {
        let identity = Self::new(function_name);
        if function_version.is_empty() {
            identity
        } else {
            identity.with_qualifier(function_version)
        }
    }

    /// Identity from config, falling back to the runtime environment.
    pub fn from_settings(settings: &FunctionSettings) -> Option<Self> {
        settings.resolved_name().map(|name| Self {
            name,
            qualifier: settings.resolved_qualifier(),
        })
    }
}

/// Asynchronous, fire-and-forget function invocation.
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Queue an invocation; returns once the runtime accepted it.
    async fn invoke_async(
        &self,
        function: &FunctionIdentity,
        payload: &Value,
    ) -> Result<(), WorkerError>;
}

/// A recorded invocation request.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub function: FunctionIdentity,
    pub payload: Value,
}

#[derive(Default)]
struct LoopbackState {
    pending: VecDeque<Invocation>,
    total: usize,
    fail_remaining: usize,
}

/// In-process runtime that queues invocations for the caller to run.
#[derive(Default)]
pub struct LoopbackInvoker {
    state: Mutex<LoopbackState>,
}

impl LoopbackInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the oldest pending invocation.
    pub fn take_next(&self) -> Option<Invocation> {
        self.lock().pending.pop_front()
    }

    /// Invocations accepted but not yet taken.
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Invocations accepted since creation.
    pub fn total(&self) -> usize {
        self.lock().total
    }

    /// Reject the next `count` invocation requests.
    pub fn fail_next(&self, count: usize) {
        self.lock().fail_remaining = count;
    }
}

#[async_trait]
impl Invoker for LoopbackInvoker {
    async fn invoke_async(
        &self,
        function: &FunctionIdentity,
        payload: &Value,
    ) -> Result<(), WorkerError> {
        let mut state = self.lock();
        if state.fail_remaining > 0 {
            state.fail_remaining -= 1;
            return Err(WorkerError::Invocation(format!(
                "injected failure invoking {}",
                function.name
            )));
        }

        state.pending.push_back(Invocation {
            function: function.clone(),
            payload: payload.clone(),
        });
        state.total += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_loopback_records_invocations() {
        let invoker = LoopbackInvoker::new();
        let identity = FunctionIdentity::new("items-dlq").with_qualifier("7");

        invoker
            .invoke_async(&identity, &json!({"source": "schedule"}))
            .await
            .unwrap();

        assert_eq!(invoker.pending(), 1);
        let invocation = invoker.take_next().unwrap();
        assert_eq!(invocation.function, identity);
        assert_eq!(invocation.payload, json!({"source": "schedule"}));
        assert_eq!(invoker.pending(), 0);
        assert_eq!(invoker.total(), 1);
    }

    #[tokio::test]
    async fn test_loopback_failure() {
        let invoker = LoopbackInvoker::new();
        invoker.fail_next(1);

        let result = invoker
            .invoke_async(&FunctionIdentity::new("items-dlq"), &json!({}))
            .await;
        assert!(matches!(result, Err(WorkerError::Invocation(_))));
        assert_eq!(invoker.total(), 0);
    }

    #[test]
    fn test_identity_from_context() {
        let pinned = FunctionIdentity::from_context("items-dlq", "$LATEST");
        assert_eq!(pinned.qualifier.as_deref(), Some("$LATEST"));

        let unpinned = FunctionIdentity::from_context("items-dlq", "");
        assert_eq!(unpinned, FunctionIdentity::new("items-dlq"));
    }

    #[test]
    fn test_identity_from_settings() {
        let settings = FunctionSettings {
            name: Some("items-dlq".to_string()),
            qualifier: Some("$LATEST".to_string()),
        };
        let identity = FunctionIdentity::from_settings(&settings).unwrap();
        assert_eq!(identity.name, "items-dlq");
        assert_eq!(identity.qualifier.as_deref(), Some("$LATEST"));
    }
}
