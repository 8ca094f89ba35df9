//! Backend connector abstraction.
//!
//! A connector is the thin marshalling layer over one vendor control plane
//! (SOAP, SSH, REST). It exposes raw, point-in-time query and command
//! primitives; everything asynchronous is built on top of it by the
//! connection machinery. Wire-level encoding lives entirely inside
//! connector implementations.

use std::sync::Arc;

use async_trait::async_trait;

use crate::capability::CapabilityProfile;
use crate::error::{ControlError, Result};
use crate::types::{
    CorrelationKey, ManagedObjectDescriptor, ManagedObjectId, OperationKind, RawEvent,
    RawTaskOutcome,
};

/// Raw control-plane primitives implemented per backend.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Address of the datacenter this connector is bound to.
    fn address(&self) -> &str;

    // =========================================================================
    // Capabilities & Inventory
    // =========================================================================

    /// Operations the backend supports, per managed-object kind.
    async fn capabilities(&self) -> Result<CapabilityProfile>;

    /// All managed objects currently visible on the backend.
    async fn list_objects(&self) -> Result<Vec<ManagedObjectDescriptor>>;

    /// Resolve one managed object by identity.
    async fn lookup_object(
        &self,
        id: &ManagedObjectId,
    ) -> Result<Option<ManagedObjectDescriptor>>;

    // =========================================================================
    // Polling
    // =========================================================================

    /// Fetch up to `max_batch` new events. An empty batch is a heartbeat,
    /// not an error; only transport faults are errors.
    async fn poll_events(&self, max_batch: usize) -> Result<Vec<RawEvent>>;

    /// Fetch up to `max_batch` new task outcomes. Same contract as
    /// [`Connector::poll_events`].
    async fn poll_tasks(&self, max_batch: usize) -> Result<Vec<RawTaskOutcome>>;

    // =========================================================================
    // Commands
    // =========================================================================

    /// Synchronous handshake starting remote execution of an operation.
    /// Returns the correlation key its outcome will carry.
    async fn issue_operation(
        &self,
        target: &ManagedObjectId,
        kind: OperationKind,
        params: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<CorrelationKey>;
}

/// Opens connectors for the addresses it recognizes.
#[async_trait]
pub trait ConnectorFactory: Send + Sync {
    /// Whether this factory can open the given address.
    fn accepts(&self, address: &str) -> bool;

    /// Open a connector for the address.
    async fn open(&self, address: &str) -> Result<Arc<dyn Connector>>;
}

/// An explicit, ordered list of connector factories, constructed at startup
/// and passed into the entry point. The first factory accepting an address
/// wins.
pub struct ConnectorSet {
    factories: Vec<Arc<dyn ConnectorFactory>>,
}

impl ConnectorSet {
    /// Build a connector set from an ordered factory list.
    pub fn new(factories: Vec<Arc<dyn ConnectorFactory>>) -> Self {
        Self { factories }
    }

    /// Open a connector for the address using the first accepting factory.
    pub async fn connect(&self, address: &str) -> Result<Arc<dyn Connector>> {
        for factory in &self.factories {
            if factory.accepts(address) {
                return factory.open(address).await;
            }
        }
        Err(ControlError::ConnectFailed(format!(
            "no connector factory accepts address {}",
            address
        )))
    }
}
