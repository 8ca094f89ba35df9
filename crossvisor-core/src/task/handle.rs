//! Caller-visible operation handles.
//!
//! A handle is constructed and configured by the caller, passed to
//! `Connection::execute`, and returned bound to the deferred result of the
//! remote execution. Parameters are frozen once the handle is in flight.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::error::{ControlError, Result};
use crate::task::deferred::DeferredResult;
use crate::types::OperationKind;

/// A deferred-result proxy for one requested operation.
#[derive(Debug)]
pub struct OperationHandle {
    kind: OperationKind,
    params: serde_json::Map<String, Value>,
    result: Option<Arc<DeferredResult<Value>>>,
}

impl OperationHandle {
    /// Create an unsubmitted handle for the given operation kind.
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            params: serde_json::Map::new(),
            result: None,
        }
    }

    /// The operation kind this handle requests.
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// The configured parameters.
    pub fn params(&self) -> &serde_json::Map<String, Value> {
        &self.params
    }

    /// Set a parameter. Usable only before submission; afterwards the
    /// parameters are frozen and this fails with IllegalState.
    pub fn set_param(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
        if self.result.is_some() {
            return Err(ControlError::IllegalState(
                "handle is submitted; parameters are frozen".to_string(),
            ));
        }
        self.params.insert(key.into(), value);
        Ok(())
    }

    /// Whether the handle has been bound to a live execution.
    pub fn is_submitted(&self) -> bool {
        self.result.is_some()
    }

    /// Bind the handle to the deferred result of its execution. Usable
    /// exactly once.
    pub fn bind(&mut self, result: Arc<DeferredResult<Value>>) -> Result<()> {
        if self.result.is_some() {
            return Err(ControlError::IllegalState(
                "handle is already bound".to_string(),
            ));
        }
        self.result = Some(result);
        Ok(())
    }

    fn bound(&self) -> Result<&Arc<DeferredResult<Value>>> {
        self.result.as_ref().ok_or_else(|| {
            ControlError::IllegalState("handle is not bound to a result".to_string())
        })
    }

    /// Request cancellation. Advisory only: in-flight remote work cannot be
    /// interrupted through this subsystem, so a submitted operation always
    /// reports `false`.
    pub fn cancel(&self) -> Result<bool> {
        self.bound()?;
        debug!(operation = %self.kind, "Cancellation requested for submitted operation; not supported");
        Ok(false)
    }

    /// Whether the bound result has completed.
    pub fn is_done(&self) -> Result<bool> {
        Ok(self.bound()?.is_done())
    }

    /// Wait for the bound result.
    pub async fn wait(&self) -> Result<Value> {
        self.bound()?.wait().await
    }

    /// Wait up to `timeout` for the bound result. A timeout stops waiting
    /// locally only; a late-arriving outcome is still recorded.
    pub async fn wait_timeout(&self, timeout: Duration) -> Result<Value> {
        self.bound()?.wait_timeout(timeout).await
    }
}
