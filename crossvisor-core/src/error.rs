//! Error types for the control core.

use std::time::Duration;

use thiserror::Error;

use crate::types::{ManagedObjectKind, OperationKind};

/// Errors that can occur in the control core.
#[derive(Error, Debug, Clone)]
pub enum ControlError {
    /// A protocol contract was violated: double-bind, double-complete,
    /// a setter used after submission, or access to an unbound handle.
    /// Always a programming error, never retried.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// A local wait exceeded its deadline. The underlying remote
    /// operation is unaffected and the wait may be retried.
    #[error("Timed out after {0:?} waiting for result")]
    Timeout(Duration),

    /// The remote operation itself failed.
    #[error("Remote operation failed: {message}")]
    Execution {
        /// Fault description reported by the backend.
        message: String,
        /// Underlying cause, when the backend reported one.
        cause: Option<String>,
    },

    /// A collector could not reach the backend.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The operation kind is not supported for this object kind.
    #[error("Operation {operation} is not supported for {kind}")]
    Unsupported {
        /// Kind of the target object.
        kind: ManagedObjectKind,
        /// Operation that was requested.
        operation: OperationKind,
    },

    /// A managed object could not be resolved.
    #[error("Managed object not found: {0}")]
    ObjectNotFound(String),

    /// Failed to open a connection to a backend.
    #[error("Failed to connect: {0}")]
    ConnectFailed(String),
}

impl ControlError {
    /// Build an Execution error from a fault message and optional cause.
    pub fn execution(message: impl Into<String>, cause: Option<String>) -> Self {
        ControlError::Execution {
            message: message.into(),
            cause,
        }
    }
}

/// Result type alias for control core operations.
pub type Result<T> = std::result::Result<T, ControlError>;
