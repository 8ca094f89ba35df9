//! # Crossvisor Core
//!
//! Cross-hypervisor control core: a stable object model (datacenters,
//! hosts, computers, snapshots) backed by pluggable connectors, with an
//! asynchronous command/event completion subsystem on top.
//!
//! Backends expose only raw, point-in-time primitives and have no native
//! push mechanism, so the core polls them and routes eventually-arriving
//! outcomes back to the callers waiting on them.
//!
//! ## Architecture
//!
//! ```text
//!  caller ── execute(handle) ──▶ Connection ── issue_operation ──▶ Connector
//!     │                             │
//!     ◀── handle (bound) ───────────┘ register continuation
//!     │
//!     ▼ wait()
//!  DeferredResult ◀── Dispatcher ◀── shared queue ◀── RemoteCollector(s)
//!                                                       │ poll_events /
//!                                                       │ poll_tasks
//!                                                       ▼
//!                                                    Connector
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use crossvisor_core::{
//!     Connection, ControlConfig, MockConnector, OperationHandle, OperationKind,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let connector = Arc::new(MockConnector::new("mock://lab"));
//!     let vm = connector.add_computer("my-vm");
//!
//!     let connection = Connection::open(connector, &ControlConfig::default())
//!         .await
//!         .unwrap();
//!     let handle = connection
//!         .execute(&vm, OperationHandle::new(OperationKind::Start))
//!         .await
//!         .unwrap();
//!     let outcome = handle.wait().await.unwrap();
//!     println!("started: {outcome}");
//!
//!     connection.close().await;
//! }
//! ```

pub mod capability;
pub mod collector;
pub mod config;
pub mod connection;
pub mod connector;
pub mod dispatcher;
pub mod error;
pub mod inventory;
pub mod mock;
pub mod polling;
pub mod task;
pub mod types;

pub use capability::{CapabilityProfile, CapabilityProfileBuilder};
pub use collector::{CollectorStream, RemoteCollector};
pub use config::{ControlConfig, PollingConfig};
pub use connection::Connection;
pub use connector::{Connector, ConnectorFactory, ConnectorSet};
pub use dispatcher::Dispatcher;
pub use error::{ControlError, Result};
pub use inventory::Inventory;
pub use mock::{MockConnector, MockConnectorFactory, PowerState};
pub use polling::{PollingLoop, PollingStats};
pub use task::{
    ContinuationRegistry, DeferredResult, OperationHandle, TaskContinuation, TaskController,
};
pub use types::{
    CorrelationKey, ManagedObjectDescriptor, ManagedObjectId, ManagedObjectKind, OperationKind,
    QueueItem, RawEvent, RawTaskOutcome, TaskStatus,
};
