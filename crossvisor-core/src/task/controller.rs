//! Shared liveness flag coordinating shutdown across background loops.

use std::time::Duration;

use tokio::sync::watch;

/// A one-way active → deactivated flag observed by any number of loops.
///
/// Deactivation wakes every observer blocked in
/// [`TaskController::await_deactivated`] immediately, so loops notice
/// shutdown without polling faster than their natural cadence.
#[derive(Debug)]
pub struct TaskController {
    active: watch::Sender<bool>,
}

impl TaskController {
    /// Create a new controller in the active state.
    pub fn new() -> Self {
        let (active, _) = watch::channel(true);
        Self { active }
    }

    /// Whether the controller is still active.
    pub fn is_active(&self) -> bool {
        *self.active.borrow()
    }

    /// Deactivate the controller. Idempotent; the transition is one-way.
    pub fn deactivate(&self) {
        self.active.send_replace(false);
    }

    /// Block until the controller is deactivated.
    pub async fn await_deactivated(&self) {
        let mut observer = self.active.subscribe();
        loop {
            if !*observer.borrow_and_update() {
                return;
            }
            if observer.changed().await.is_err() {
                return;
            }
        }
    }

    /// Block up to `timeout` for deactivation. Returns whether the
    /// controller was deactivated by then.
    pub async fn await_deactivated_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.await_deactivated())
            .await
            .is_ok()
    }
}

impl Default for TaskController {
    fn default() -> Self {
        Self::new()
    }
}
