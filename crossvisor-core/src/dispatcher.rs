//! Single-consumer dispatch loop.
//!
//! Drains the shared queue, resolves task outcomes against registered
//! continuations (outcomes that arrive first are stashed by the registry
//! and replayed on registration), forwards unsolicited events to the
//! inventory, and stops once every producer has pushed its closing marker
//! (or the queue closes because a faulted producer never will). Whatever
//! continuations remain at that point are failed explicitly so no caller
//! hangs forever.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::inventory::Inventory;
use crate::task::continuation::ContinuationRegistry;
use crate::types::{QueueItem, RawEvent, RawTaskOutcome};

/// Failure recorded against continuations orphaned by connection close.
const CLOSED_MESSAGE: &str = "connection closed before the task outcome arrived";

/// The single consumer of a connection's shared queue.
pub struct Dispatcher {
    queue: mpsc::UnboundedReceiver<QueueItem>,
    registry: Arc<ContinuationRegistry>,
    inventory: Arc<Inventory>,
    /// Number of producers feeding the queue; one closing marker is
    /// expected from each.
    producers: usize,
}

impl Dispatcher {
    /// Create a dispatcher over the queue fed by `producers` collectors.
    pub fn new(
        queue: mpsc::UnboundedReceiver<QueueItem>,
        registry: Arc<ContinuationRegistry>,
        inventory: Arc<Inventory>,
        producers: usize,
    ) -> Self {
        Self {
            queue,
            registry,
            inventory,
            producers,
        }
    }

    /// Run until every producer has closed its stream.
    pub async fn run(mut self) {
        debug!(producers = self.producers, "Dispatcher started");

        let mut closed_streams = 0;
        while closed_streams < self.producers {
            match self.queue.recv().await {
                Some(QueueItem::Closing) => {
                    closed_streams += 1;
                    debug!(closed_streams, "Closing marker received");
                }
                Some(QueueItem::Task(outcome)) => self.dispatch_task(outcome),
                Some(QueueItem::Event(event)) => self.dispatch_event(event),
                None => {
                    // Every sender is gone; a faulted collector never sends
                    // its marker, so queue closure is the implicit close.
                    debug!("Queue closed before all closing markers arrived");
                    break;
                }
            }
        }

        let abandoned = self.registry.abandon_all(CLOSED_MESSAGE);
        if abandoned > 0 {
            warn!(count = abandoned, "Failed pending continuations on connection close");
        }
        debug!("Dispatcher stopped");
    }

    fn dispatch_task(&self, outcome: RawTaskOutcome) {
        let correlation = outcome.correlation.clone();
        if !self.registry.resolve(outcome) {
            // The outcome beat its registration; the registry holds it for
            // replay when the registration arrives.
            debug!(
                correlation = %correlation,
                "No continuation registered yet for task outcome; stashed"
            );
        }
    }

    fn dispatch_event(&self, event: RawEvent) {
        let target = event.target.clone();
        if !self.inventory.deliver(event) {
            debug!(target = %target, "Dropping event for unknown or receiver-less object");
        }
    }
}
