//! Connection wiring and the caller-facing operation surface.
//!
//! A connection owns one connector plus the background machinery around
//! it: two collectors feeding the shared queue and the dispatcher
//! draining it. Callers submit operations through
//! [`Connection::execute`] and get their handle back bound to the
//! eventual remote outcome.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::capability::CapabilityProfile;
use crate::collector::{CollectorStream, RemoteCollector};
use crate::config::ControlConfig;
use crate::connector::Connector;
use crate::dispatcher::Dispatcher;
use crate::error::{ControlError, Result};
use crate::inventory::Inventory;
use crate::task::continuation::{ContinuationRegistry, TaskContinuation};
use crate::task::controller::TaskController;
use crate::task::deferred::DeferredResult;
use crate::task::handle::OperationHandle;
use crate::types::{ManagedObjectId, ManagedObjectKind};

/// A live connection to one backend datacenter.
pub struct Connection {
    connector: Arc<dyn Connector>,
    profile: CapabilityProfile,
    controller: Arc<TaskController>,
    registry: Arc<ContinuationRegistry>,
    inventory: Arc<Inventory>,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Connection {
    /// Open a connection: negotiate capabilities, seed the inventory and
    /// start the collectors and the dispatcher.
    pub async fn open(connector: Arc<dyn Connector>, config: &ControlConfig) -> Result<Self> {
        let profile = connector.capabilities().await?;

        let inventory = Arc::new(Inventory::new());
        for descriptor in connector.list_objects().await? {
            inventory.register(descriptor);
        }

        let controller = Arc::new(TaskController::new());
        let registry = Arc::new(ContinuationRegistry::new());
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();

        let event_collector = RemoteCollector::new(
            CollectorStream::Events,
            connector.clone(),
            queue_tx.clone(),
            controller.clone(),
            config.polling.max_batch,
            config.polling.event_interval(),
        );
        let task_collector = RemoteCollector::new(
            CollectorStream::Tasks,
            connector.clone(),
            queue_tx,
            controller.clone(),
            config.polling.max_batch,
            config.polling.task_interval(),
        );
        let dispatcher = Dispatcher::new(queue_rx, registry.clone(), inventory.clone(), 2);

        let workers = vec![
            tokio::spawn(event_collector.run()),
            tokio::spawn(task_collector.run()),
            tokio::spawn(dispatcher.run()),
        ];

        info!(
            address = %connector.address(),
            objects = inventory.len(),
            "Connection opened"
        );

        Ok(Self {
            connector,
            profile,
            controller,
            registry,
            inventory,
            workers: tokio::sync::Mutex::new(workers),
        })
    }

    /// Address of the connected backend.
    pub fn address(&self) -> &str {
        self.connector.address()
    }

    /// Whether the connection has not been closed yet.
    pub fn is_open(&self) -> bool {
        self.controller.is_active()
    }

    /// Capability profile negotiated at open time.
    pub fn capability_profile(&self) -> &CapabilityProfile {
        &self.profile
    }

    /// Operation kinds available for a managed-object kind.
    pub fn commands_for(&self, kind: ManagedObjectKind) -> BTreeSet<crate::types::OperationKind> {
        self.profile.operations_for(kind)
    }

    /// The managed-object inventory of this connection.
    pub fn inventory(&self) -> &Arc<Inventory> {
        &self.inventory
    }

    /// Continuations still awaiting remote outcomes.
    pub fn pending_operations(&self) -> usize {
        self.registry.len()
    }

    /// Submit an operation against a managed object.
    ///
    /// The capability check runs before anything touches the backend. On
    /// success the same handle is returned, bound to the deferred result
    /// its outcome will complete. A close racing the submission surfaces
    /// as an error from the registration step, never as a handle whose
    /// wait cannot finish.
    pub async fn execute(
        &self,
        target: &ManagedObjectId,
        mut handle: OperationHandle,
    ) -> Result<OperationHandle> {
        if !self.controller.is_active() {
            return Err(ControlError::IllegalState(
                "connection is closed".to_string(),
            ));
        }
        if handle.is_submitted() {
            return Err(ControlError::IllegalState(
                "operation handle is already submitted".to_string(),
            ));
        }
        if !self.profile.supports_operation(target.kind, handle.kind()) {
            return Err(ControlError::Unsupported {
                kind: target.kind,
                operation: handle.kind(),
            });
        }

        if !self.inventory.contains(target) {
            match self.connector.lookup_object(target).await? {
                Some(descriptor) => self.inventory.register(descriptor),
                None => return Err(ControlError::ObjectNotFound(target.to_string())),
            }
        }

        let result = Arc::new(DeferredResult::new());
        let key = self
            .connector
            .issue_operation(target, handle.kind(), handle.params())
            .await?;
        self.registry
            .register(TaskContinuation::new(key.clone(), result.clone()))?;
        handle.bind(result)?;

        debug!(
            target = %target,
            operation = %handle.kind(),
            correlation = %key,
            "Operation submitted"
        );
        Ok(handle)
    }

    /// Close the connection: deactivate the controller, let the collectors
    /// drain and push their closing markers, and join every worker task.
    /// The connection counts as fully drained only once all joins return.
    /// Idempotent.
    pub async fn close(&self) {
        self.controller.deactivate();

        let drained: Vec<JoinHandle<()>> = {
            let mut workers = self.workers.lock().await;
            workers.drain(..).collect()
        };
        if drained.is_empty() {
            return;
        }

        for joined in futures::future::join_all(drained).await {
            if let Err(error) = joined {
                warn!(error = %error, "Worker task failed during shutdown");
            }
        }
        info!(address = %self.connector.address(), "Connection closed");
    }
}
