//! Continuations awaiting remote task outcomes, and the per-connection
//! registry matching correlation keys to them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::warn;

use crate::error::{ControlError, Result};
use crate::task::deferred::DeferredResult;
use crate::types::{CorrelationKey, RawTaskOutcome, TaskStatus};

/// A local object awaiting exactly one remote outcome for one correlation
/// key.
///
/// Completion methods consume the continuation, so exactly one of
/// `on_success` / `on_error` can ever run. They are invoked from the
/// dispatcher task only.
#[derive(Debug)]
pub struct TaskContinuation {
    key: CorrelationKey,
    result: Arc<DeferredResult<Value>>,
}

impl TaskContinuation {
    /// Create a continuation for the given key, owning the deferred result
    /// it will complete.
    pub fn new(key: CorrelationKey, result: Arc<DeferredResult<Value>>) -> Self {
        Self { key, result }
    }

    /// The correlation key this continuation is awaiting.
    pub fn key(&self) -> &CorrelationKey {
        &self.key
    }

    /// Complete the deferred result with the remote value.
    pub fn on_success(self, value: Value) {
        if let Err(error) = self.result.complete(value) {
            warn!(correlation = %self.key, error = %error, "Continuation result was already completed");
        }
    }

    /// Complete the deferred result with the remote fault.
    pub fn on_error(self, message: impl Into<String>, cause: Option<String>) {
        if let Err(error) = self.result.complete_with_failure(message, cause) {
            warn!(correlation = %self.key, error = %error, "Continuation result was already completed");
        }
    }

    /// Complete the deferred result from a raw remote outcome.
    pub fn complete_with(self, outcome: RawTaskOutcome) {
        match outcome.status {
            TaskStatus::Succeeded => self.on_success(outcome.value.unwrap_or(Value::Null)),
            TaskStatus::Failed => {
                let message = outcome
                    .fault
                    .unwrap_or_else(|| "remote task failed".to_string());
                self.on_error(message, outcome.fault_cause);
            }
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    pending: HashMap<CorrelationKey, TaskContinuation>,
    /// Outcomes that arrived before their continuation registered, held
    /// until the registration replays them or the registry closes.
    unmatched: HashMap<CorrelationKey, RawTaskOutcome>,
    /// Set by `abandon_all` with the failure message it used; a closed
    /// registry accepts no further registrations.
    closed: Option<String>,
}

/// Correlation-key → continuation registry, one per connection.
///
/// Inserts happen on the issuing task, resolutions on the dispatcher task;
/// both go through one lock. An outcome polled out before its continuation
/// registers is stashed and replayed at registration time, so neither side
/// of that race loses the result.
#[derive(Debug, Default)]
pub struct ContinuationRegistry {
    inner: Mutex<RegistryState>,
}

impl ContinuationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a continuation under its correlation key. Keys are
    /// backend-unique by construction; a duplicate is a contract violation.
    ///
    /// If the outcome for the key already arrived, the continuation is
    /// completed immediately. If the registry has closed, the continuation
    /// is failed with the closing message and the registration is rejected,
    /// so a caller racing shutdown gets an error instead of a wait that can
    /// never finish.
    pub fn register(&self, continuation: TaskContinuation) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(message) = inner.closed.clone() {
            drop(inner);
            continuation.on_error(message, None);
            return Err(ControlError::IllegalState(
                "connection is closed; no further operations are accepted".to_string(),
            ));
        }

        let key = continuation.key().clone();
        if let Some(outcome) = inner.unmatched.remove(&key) {
            drop(inner);
            continuation.complete_with(outcome);
            return Ok(());
        }

        if inner.pending.contains_key(&key) {
            return Err(ControlError::IllegalState(format!(
                "continuation already registered for correlation key {}",
                key
            )));
        }
        inner.pending.insert(key, continuation);
        Ok(())
    }

    /// Resolve an outcome against its registered continuation. Returns
    /// whether a continuation was completed; otherwise the outcome is
    /// stashed for a registration that has not happened yet.
    pub fn resolve(&self, outcome: RawTaskOutcome) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.pending.remove(&outcome.correlation) {
            Some(continuation) => {
                drop(inner);
                continuation.complete_with(outcome);
                true
            }
            None => {
                inner.unmatched.insert(outcome.correlation.clone(), outcome);
                false
            }
        }
    }

    /// Remove and return the continuation for a key, if registered.
    pub fn remove(&self, key: &CorrelationKey) -> Option<TaskContinuation> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.pending.remove(key)
    }

    /// Number of continuations still awaiting an outcome.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.pending.len()
    }

    /// Whether no continuations are pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close the registry and fail every remaining continuation with an
    /// Execution failure carrying the given message. Used when the
    /// connection closes before their outcomes arrive. Later registrations
    /// are rejected with the same message. Returns how many were failed.
    pub fn abandon_all(&self, message: &str) -> usize {
        let drained: Vec<TaskContinuation> = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.closed = Some(message.to_string());
            inner.unmatched.clear();
            inner
                .pending
                .drain()
                .map(|(_, continuation)| continuation)
                .collect()
        };
        let count = drained.len();
        for continuation in drained {
            continuation.on_error(message, None);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn continuation(key: &str) -> (TaskContinuation, Arc<DeferredResult<Value>>) {
        let result = Arc::new(DeferredResult::new());
        (
            TaskContinuation::new(CorrelationKey::new(key), result.clone()),
            result,
        )
    }

    #[tokio::test]
    async fn test_register_and_remove() {
        let registry = ContinuationRegistry::new();
        let (cont, result) = continuation("task-1");

        registry.register(cont).unwrap();
        assert_eq!(registry.len(), 1);

        let removed = registry.remove(&CorrelationKey::new("task-1")).unwrap();
        assert!(registry.is_empty());

        removed.on_success(json!(42));
        assert_eq!(result.wait().await.unwrap(), json!(42));
    }

    #[test]
    fn test_duplicate_key_is_rejected() {
        let registry = ContinuationRegistry::new();
        let (first, _r1) = continuation("task-1");
        let (second, _r2) = continuation("task-1");

        registry.register(first).unwrap();
        assert!(matches!(
            registry.register(second),
            Err(ControlError::IllegalState(_))
        ));
    }

    #[test]
    fn test_remove_unknown_key_is_none() {
        let registry = ContinuationRegistry::new();
        assert!(registry.remove(&CorrelationKey::new("missing")).is_none());
    }

    #[tokio::test]
    async fn test_outcome_arriving_before_registration_is_replayed() {
        let registry = ContinuationRegistry::new();
        let key = CorrelationKey::new("task-early");

        // The outcome lands first; nothing is registered for it yet.
        assert!(!registry.resolve(RawTaskOutcome::succeeded(key, json!(7))));
        assert!(registry.is_empty());

        // The late registration completes immediately from the stash.
        let (cont, result) = continuation("task-early");
        registry.register(cont).unwrap();
        assert!(registry.is_empty());
        assert_eq!(result.wait().await.unwrap(), json!(7));
    }

    #[tokio::test]
    async fn test_register_after_close_fails_instead_of_stranding() {
        let registry = ContinuationRegistry::new();
        registry.abandon_all("connection closed");

        let (cont, result) = continuation("task-late");
        assert!(matches!(
            registry.register(cont),
            Err(ControlError::IllegalState(_))
        ));
        assert!(registry.is_empty());

        // The result is failed rather than left pending forever.
        match result.wait().await {
            Err(ControlError::Execution { message, .. }) => {
                assert_eq!(message, "connection closed");
            }
            other => panic!("expected execution error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolve_completes_registered_continuation() {
        let registry = ContinuationRegistry::new();
        let (cont, result) = continuation("task-2");
        registry.register(cont).unwrap();

        assert!(registry.resolve(RawTaskOutcome::failed(
            CorrelationKey::new("task-2"),
            "rejected",
            None,
        )));
        assert!(registry.is_empty());
        assert!(matches!(
            result.wait().await,
            Err(ControlError::Execution { .. })
        ));
    }

    #[tokio::test]
    async fn test_abandon_all_fails_pending_continuations() {
        let registry = ContinuationRegistry::new();
        let (a, result_a) = continuation("task-a");
        let (b, result_b) = continuation("task-b");
        registry.register(a).unwrap();
        registry.register(b).unwrap();

        assert_eq!(registry.abandon_all("connection closed"), 2);
        assert!(registry.is_empty());

        for result in [result_a, result_b] {
            match result.wait().await {
                Err(ControlError::Execution { message, .. }) => {
                    assert_eq!(message, "connection closed");
                }
                other => panic!("expected execution error, got {:?}", other),
            }
        }
    }
}
