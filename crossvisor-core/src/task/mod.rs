//! Deferred-completion primitives: results, handles, continuations and the
//! shared liveness controller.

pub mod continuation;
pub mod controller;
pub mod deferred;
pub mod handle;

pub use continuation::{ContinuationRegistry, TaskContinuation};
pub use controller::TaskController;
pub use deferred::DeferredResult;
pub use handle::OperationHandle;
