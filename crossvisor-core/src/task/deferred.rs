//! Single-writer, multi-reader completion cell.

use std::pin::pin;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;

use crate::error::{ControlError, Result};

/// Completion state of a deferred result.
#[derive(Debug)]
enum State<T> {
    Pending,
    Value(T),
    Failure {
        message: String,
        cause: Option<String>,
    },
}

/// A thread-safe completion cell: completed exactly once with a value or a
/// failure, awaited by any number of readers.
///
/// The completing side is the continuation that owns the cell until
/// completion; afterwards the cell is read-only for everyone.
#[derive(Debug)]
pub struct DeferredResult<T> {
    state: Mutex<State<T>>,
    notify: Notify,
}

impl<T: Clone> DeferredResult<T> {
    /// Create a new pending result.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Pending),
            notify: Notify::new(),
        }
    }

    /// Complete with a value. Fails with IllegalState if the result is
    /// already completed.
    pub fn complete(&self, value: T) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if !matches!(*state, State::Pending) {
                return Err(ControlError::IllegalState(
                    "result is already completed".to_string(),
                ));
            }
            *state = State::Value(value);
        }
        self.notify.notify_waiters();
        Ok(())
    }

    /// Complete with a failure. Fails with IllegalState if the result is
    /// already completed.
    pub fn complete_with_failure(
        &self,
        message: impl Into<String>,
        cause: Option<String>,
    ) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if !matches!(*state, State::Pending) {
                return Err(ControlError::IllegalState(
                    "result is already completed".to_string(),
                ));
            }
            *state = State::Failure {
                message: message.into(),
                cause,
            };
        }
        self.notify.notify_waiters();
        Ok(())
    }

    /// Whether the result has completed, with a value or a failure.
    pub fn is_done(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        !matches!(*state, State::Pending)
    }

    /// Non-blocking check: `Ok(Some(value))` when completed with a value,
    /// `Ok(None)` while pending, the stored failure wrapped as an Execution
    /// error otherwise.
    pub fn poll_result(&self) -> Result<Option<T>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match &*state {
            State::Pending => Ok(None),
            State::Value(value) => Ok(Some(value.clone())),
            State::Failure { message, cause } => Err(ControlError::Execution {
                message: message.clone(),
                cause: cause.clone(),
            }),
        }
    }

    /// Wait until the result completes. Re-raises a stored failure as an
    /// Execution error.
    pub async fn wait(&self) -> Result<T> {
        loop {
            // Register for the wakeup before re-checking the state, so a
            // completion between the check and the await is not lost.
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();

            if let Some(value) = self.poll_result()? {
                return Ok(value);
            }
            notified.await;
        }
    }

    /// Wait up to `timeout` for the result. Fails with Timeout on expiry;
    /// the underlying work is unaffected and the wait may be retried.
    pub async fn wait_timeout(&self, timeout: Duration) -> Result<T> {
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(result) => result,
            Err(_) => Err(ControlError::Timeout(timeout)),
        }
    }
}

impl<T: Clone> Default for DeferredResult<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_complete_succeeds_once() {
        let result: DeferredResult<u32> = DeferredResult::new();
        assert!(!result.is_done());

        result.complete(7).unwrap();
        assert!(result.is_done());
        assert_eq!(result.wait().await.unwrap(), 7);

        // Any second transition fails.
        assert!(matches!(
            result.complete(8),
            Err(ControlError::IllegalState(_))
        ));
        assert!(matches!(
            result.complete_with_failure("late", None),
            Err(ControlError::IllegalState(_))
        ));
    }

    #[tokio::test]
    async fn test_failure_is_reraised_as_execution_error() {
        let result: DeferredResult<u32> = DeferredResult::new();
        result
            .complete_with_failure("remote task failed", Some("disk full".to_string()))
            .unwrap();

        match result.wait().await {
            Err(ControlError::Execution { message, cause }) => {
                assert_eq!(message, "remote task failed");
                assert_eq!(cause.as_deref(), Some("disk full"));
            }
            other => panic!("expected execution error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wait_timeout_expires_without_completing() {
        let result: DeferredResult<u32> = DeferredResult::new();

        match result.wait_timeout(Duration::from_millis(20)).await {
            Err(ControlError::Timeout(_)) => {}
            other => panic!("expected timeout, got {:?}", other),
        }

        // Late completion is still recorded.
        result.complete(1).unwrap();
        assert_eq!(result.wait().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_multiple_waiters_all_observe_completion() {
        let result = Arc::new(DeferredResult::new());

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let result = result.clone();
                tokio::spawn(async move { result.wait().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(10)).await;
        result.complete("done".to_string()).unwrap();

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap().unwrap(), "done");
        }
    }
}
