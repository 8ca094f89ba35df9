//! Remote collectors.
//!
//! A collector is a polling loop that repeatedly asks the backend for a
//! bounded batch of new events or task outcomes and pushes them onto the
//! shared queue. Lifecycle: collecting → draining → closed. Once the
//! connection controller reports closing AND a fetched batch comes back
//! empty, the collector pushes exactly one closing marker and stops. A
//! transport fault stops the collector without a marker; the dispatcher
//! then observes end-of-stream through queue closure instead.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::connector::Connector;
use crate::polling::PollingLoop;
use crate::task::controller::TaskController;
use crate::types::QueueItem;

/// Which remote stream a collector drains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorStream {
    /// Unsolicited state-change events.
    Events,
    /// Outcomes of tracked remote tasks.
    Tasks,
}

/// A polling collector for one remote stream of one connection.
pub struct RemoteCollector {
    stream: CollectorStream,
    connector: Arc<dyn Connector>,
    queue: mpsc::UnboundedSender<QueueItem>,
    /// Closing flag shared with the owning connection.
    connection: Arc<TaskController>,
    /// Drives the polling loop; deactivated by the collector itself once
    /// drained or faulted.
    local: Arc<TaskController>,
    max_batch: usize,
    target_interval: Duration,
}

impl RemoteCollector {
    /// Create a collector for the given stream.
    pub fn new(
        stream: CollectorStream,
        connector: Arc<dyn Connector>,
        queue: mpsc::UnboundedSender<QueueItem>,
        connection: Arc<TaskController>,
        max_batch: usize,
        target_interval: Duration,
    ) -> Self {
        Self {
            stream,
            connector,
            queue,
            connection,
            local: Arc::new(TaskController::new()),
            max_batch,
            target_interval,
        }
    }

    /// Run the collector until drained or faulted.
    pub async fn run(self) {
        info!(stream = ?self.stream, address = %self.connector.address(), "Collector started");

        let poller = PollingLoop::new(self.target_interval, self.local.clone());
        poller.run(|| self.cycle()).await;

        info!(stream = ?self.stream, "Collector stopped");
    }

    /// One collect cycle: fetch a batch, enqueue it, and detect the
    /// drained-while-closing condition.
    async fn cycle(&self) -> anyhow::Result<()> {
        // Sampled before the fetch: a deactivation arriving mid-fetch is
        // observed by the next cycle.
        let closing = !self.connection.is_active();

        let batch = match self.fetch().await {
            Ok(batch) => batch,
            Err(fault) => {
                error!(
                    stream = ?self.stream,
                    error = %fault,
                    "Transport fault while polling; collector stopping without closing marker"
                );
                self.local.deactivate();
                return Ok(());
            }
        };

        let was_empty = batch.is_empty();
        for item in batch {
            if self.queue.send(item).is_err() {
                debug!(stream = ?self.stream, "Queue consumer is gone; collector stopping");
                self.local.deactivate();
                return Ok(());
            }
        }

        if closing && was_empty {
            debug!(stream = ?self.stream, "Stream drained while closing; pushing closing marker");
            let _ = self.queue.send(QueueItem::Closing);
            self.local.deactivate();
        }

        Ok(())
    }

    async fn fetch(&self) -> crate::error::Result<Vec<QueueItem>> {
        match self.stream {
            CollectorStream::Events => Ok(self
                .connector
                .poll_events(self.max_batch)
                .await?
                .into_iter()
                .map(QueueItem::Event)
                .collect()),
            CollectorStream::Tasks => Ok(self
                .connector
                .poll_tasks(self.max_batch)
                .await?
                .into_iter()
                .map(QueueItem::Task)
                .collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockConnector;
    use crate::types::{RawTaskOutcome, TaskStatus};
    use serde_json::json;

    fn collector(
        mock: &Arc<MockConnector>,
        stream: CollectorStream,
        controller: &Arc<TaskController>,
    ) -> (RemoteCollector, mpsc::UnboundedReceiver<QueueItem>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let collector = RemoteCollector::new(
            stream,
            mock.clone(),
            tx,
            controller.clone(),
            100,
            Duration::from_millis(5),
        );
        (collector, rx)
    }

    #[tokio::test]
    async fn test_drains_pending_items_then_pushes_closing_marker() {
        let mock = Arc::new(MockConnector::new("mock://lab"));
        mock.enqueue_task_outcome(RawTaskOutcome::succeeded(
            crate::types::CorrelationKey::new("task-1"),
            json!(1),
        ));

        let controller = Arc::new(TaskController::new());
        let (collector, mut rx) = collector(&mock, CollectorStream::Tasks, &controller);
        let worker = tokio::spawn(collector.run());

        // Let at least one collecting cycle happen, then close.
        tokio::time::sleep(Duration::from_millis(20)).await;
        controller.deactivate();
        worker.await.unwrap();

        let first = rx.recv().await.unwrap();
        match first {
            QueueItem::Task(outcome) => assert_eq!(outcome.status, TaskStatus::Succeeded),
            other => panic!("expected task outcome first, got {:?}", other),
        }
        assert!(matches!(rx.recv().await, Some(QueueItem::Closing)));
        // Exactly one marker, then the channel closes.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_transport_fault_stops_without_marker() {
        let mock = Arc::new(MockConnector::new("mock://lab"));
        mock.fail_next_event_poll();

        let controller = Arc::new(TaskController::new());
        let (collector, mut rx) = collector(&mock, CollectorStream::Events, &controller);

        collector.run().await;

        // The collector exited on the fault; no closing marker was pushed
        // and the channel closed when the sender dropped.
        assert!(rx.recv().await.is_none());
    }
}
