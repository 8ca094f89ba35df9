//! Mock connector for testing and development.
//!
//! Simulates a remote control plane in memory: operations are validated
//! against object state, and their outcomes (plus matching state-change
//! events) are queued internally until the collectors poll them out, the
//! same way a real backend reports asynchronously.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use crate::capability::CapabilityProfile;
use crate::connector::{Connector, ConnectorFactory};
use crate::error::{ControlError, Result};
use crate::types::{
    CorrelationKey, ManagedObjectDescriptor, ManagedObjectId, ManagedObjectKind, OperationKind,
    RawEvent, RawTaskOutcome,
};

/// Simulated power state of a mock object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Running,
    Stopped,
    Paused,
}

#[derive(Debug)]
struct MockObject {
    descriptor: ManagedObjectDescriptor,
    state: PowerState,
}

/// In-memory connector backend.
pub struct MockConnector {
    address: String,
    profile: CapabilityProfile,
    datacenter: ManagedObjectId,
    host: ManagedObjectId,
    objects: RwLock<HashMap<ManagedObjectId, MockObject>>,
    pending_events: Mutex<VecDeque<RawEvent>>,
    pending_tasks: Mutex<VecDeque<RawTaskOutcome>>,
    next_key: AtomicU64,
    next_event: AtomicU64,
    issued: AtomicU64,
    fail_next_event_poll: AtomicBool,
    fail_next_task_poll: AtomicBool,
}

impl MockConnector {
    /// Create a mock connector with a seeded datacenter and host.
    pub fn new(address: impl Into<String>) -> Self {
        let address = address.into();
        info!(address = %address, "Creating mock connector");

        use OperationKind::*;
        let profile = CapabilityProfile::builder()
            .with_kind(ManagedObjectKind::Datacenter)
            .with_kind(ManagedObjectKind::Snapshot)
            .with_operations(ManagedObjectKind::Host, [Reboot])
            .with_operations(
                ManagedObjectKind::Computer,
                [
                    Start,
                    Stop,
                    ForceStop,
                    Reboot,
                    Pause,
                    Resume,
                    Delete,
                    CreateSnapshot,
                    RevertSnapshot,
                    DeleteSnapshot,
                    Migrate,
                ],
            )
            .build();

        let datacenter = ManagedObjectId::new(ManagedObjectKind::Datacenter, &address, "dc-0");
        let host = ManagedObjectId::new(ManagedObjectKind::Host, &address, "host-0");

        let mut objects = HashMap::new();
        objects.insert(
            datacenter.clone(),
            MockObject {
                descriptor: ManagedObjectDescriptor {
                    id: datacenter.clone(),
                    name: "mock-datacenter".to_string(),
                    parent: None,
                },
                state: PowerState::Running,
            },
        );
        objects.insert(
            host.clone(),
            MockObject {
                descriptor: ManagedObjectDescriptor {
                    id: host.clone(),
                    name: "mock-host".to_string(),
                    parent: Some(datacenter.clone()),
                },
                state: PowerState::Running,
            },
        );

        Self {
            address,
            profile,
            datacenter,
            host,
            objects: RwLock::new(objects),
            pending_events: Mutex::new(VecDeque::new()),
            pending_tasks: Mutex::new(VecDeque::new()),
            next_key: AtomicU64::new(0),
            next_event: AtomicU64::new(0),
            issued: AtomicU64::new(0),
            fail_next_event_poll: AtomicBool::new(false),
            fail_next_task_poll: AtomicBool::new(false),
        }
    }

    /// Identity of the seeded datacenter.
    pub fn datacenter_id(&self) -> ManagedObjectId {
        self.datacenter.clone()
    }

    /// Identity of the seeded host.
    pub fn host_id(&self) -> ManagedObjectId {
        self.host.clone()
    }

    /// Add a stopped computer under the seeded host.
    pub fn add_computer(&self, name: &str) -> ManagedObjectId {
        let id = ManagedObjectId::new(
            ManagedObjectKind::Computer,
            &self.address,
            uuid::Uuid::new_v4().to_string(),
        );
        let mut objects = self.objects.write().unwrap_or_else(|e| e.into_inner());
        objects.insert(
            id.clone(),
            MockObject {
                descriptor: ManagedObjectDescriptor {
                    id: id.clone(),
                    name: name.to_string(),
                    parent: Some(self.host.clone()),
                },
                state: PowerState::Stopped,
            },
        );
        id
    }

    /// Queue an unsolicited event for the next event poll.
    pub fn inject_event(&self, target: &ManagedObjectId, description: &str) {
        let event = RawEvent {
            id: format!("event-{}", self.next_event.fetch_add(1, Ordering::SeqCst) + 1),
            target: target.clone(),
            description: description.to_string(),
            timestamp: Utc::now(),
            detail: None,
        };
        let mut pending = self
            .pending_events
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        pending.push_back(event);
    }

    /// Queue a task outcome directly, bypassing `issue_operation`.
    pub fn enqueue_task_outcome(&self, outcome: RawTaskOutcome) {
        let mut pending = self.pending_tasks.lock().unwrap_or_else(|e| e.into_inner());
        pending.push_back(outcome);
    }

    /// Arm a one-shot transport fault for the next event poll.
    pub fn fail_next_event_poll(&self) {
        self.fail_next_event_poll.store(true, Ordering::SeqCst);
    }

    /// Arm a one-shot transport fault for the next task poll.
    pub fn fail_next_task_poll(&self) {
        self.fail_next_task_poll.store(true, Ordering::SeqCst);
    }

    /// How many operations have been issued against this connector.
    pub fn issued_operations(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    /// Current power state of an object.
    pub fn power_state(&self, id: &ManagedObjectId) -> Option<PowerState> {
        let objects = self.objects.read().unwrap_or_else(|e| e.into_inner());
        objects.get(id).map(|object| object.state)
    }

    fn mint_key(&self) -> CorrelationKey {
        CorrelationKey::new(format!(
            "task-{}",
            self.next_key.fetch_add(1, Ordering::SeqCst) + 1
        ))
    }

    fn drain<T>(pending: &Mutex<VecDeque<T>>, max_batch: usize) -> Vec<T> {
        let mut pending = pending.lock().unwrap_or_else(|e| e.into_inner());
        let take = max_batch.min(pending.len());
        pending.drain(..take).collect()
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn address(&self) -> &str {
        &self.address
    }

    async fn capabilities(&self) -> Result<CapabilityProfile> {
        Ok(self.profile.clone())
    }

    async fn list_objects(&self) -> Result<Vec<ManagedObjectDescriptor>> {
        let objects = self.objects.read().unwrap_or_else(|e| e.into_inner());
        Ok(objects
            .values()
            .map(|object| object.descriptor.clone())
            .collect())
    }

    async fn lookup_object(
        &self,
        id: &ManagedObjectId,
    ) -> Result<Option<ManagedObjectDescriptor>> {
        let objects = self.objects.read().unwrap_or_else(|e| e.into_inner());
        Ok(objects.get(id).map(|object| object.descriptor.clone()))
    }

    async fn poll_events(&self, max_batch: usize) -> Result<Vec<RawEvent>> {
        if self.fail_next_event_poll.swap(false, Ordering::SeqCst) {
            return Err(ControlError::Transport(
                "injected event poll fault".to_string(),
            ));
        }
        Ok(Self::drain(&self.pending_events, max_batch))
    }

    async fn poll_tasks(&self, max_batch: usize) -> Result<Vec<RawTaskOutcome>> {
        if self.fail_next_task_poll.swap(false, Ordering::SeqCst) {
            return Err(ControlError::Transport(
                "injected task poll fault".to_string(),
            ));
        }
        Ok(Self::drain(&self.pending_tasks, max_batch))
    }

    async fn issue_operation(
        &self,
        target: &ManagedObjectId,
        kind: OperationKind,
        _params: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<CorrelationKey> {
        self.issued.fetch_add(1, Ordering::SeqCst);
        let key = self.mint_key();
        debug!(target = %target, operation = %kind, correlation = %key, "Issuing mock operation");

        let mut objects = self.objects.write().unwrap_or_else(|e| e.into_inner());
        let object = objects
            .get_mut(target)
            .ok_or_else(|| ControlError::ObjectNotFound(target.to_string()))?;

        use OperationKind::*;
        let outcome = match (kind, object.state) {
            (Start, PowerState::Stopped) => {
                object.state = PowerState::Running;
                RawTaskOutcome::succeeded(key.clone(), json!({"state": "running"}))
            }
            (Start, _) => RawTaskOutcome::failed(key.clone(), "computer is not stopped", None),
            (Stop | ForceStop, PowerState::Running) => {
                object.state = PowerState::Stopped;
                RawTaskOutcome::succeeded(key.clone(), json!({"state": "stopped"}))
            }
            (Stop | ForceStop, _) => {
                RawTaskOutcome::failed(key.clone(), "computer is not running", None)
            }
            (Reboot, PowerState::Running) => {
                RawTaskOutcome::succeeded(key.clone(), json!({"state": "running"}))
            }
            (Reboot, _) => RawTaskOutcome::failed(key.clone(), "computer is not running", None),
            (Pause, PowerState::Running) => {
                object.state = PowerState::Paused;
                RawTaskOutcome::succeeded(key.clone(), json!({"state": "paused"}))
            }
            (Pause, _) => RawTaskOutcome::failed(key.clone(), "computer is not running", None),
            (Resume, PowerState::Paused) => {
                object.state = PowerState::Running;
                RawTaskOutcome::succeeded(key.clone(), json!({"state": "running"}))
            }
            (Resume, _) => RawTaskOutcome::failed(key.clone(), "computer is not paused", None),
            (Delete, PowerState::Stopped) => {
                objects.remove(target);
                RawTaskOutcome::succeeded(key.clone(), json!({"deleted": true}))
            }
            (Delete, _) => RawTaskOutcome::failed(
                key.clone(),
                "computer must be stopped before deletion",
                None,
            ),
            (CreateSnapshot, _) => {
                let snapshot = ManagedObjectId::new(
                    ManagedObjectKind::Snapshot,
                    &self.address,
                    uuid::Uuid::new_v4().to_string(),
                );
                let parent = target.clone();
                objects.insert(
                    snapshot.clone(),
                    MockObject {
                        descriptor: ManagedObjectDescriptor {
                            id: snapshot.clone(),
                            name: format!("snapshot-of-{}", parent.reference),
                            parent: Some(parent),
                        },
                        state: PowerState::Stopped,
                    },
                );
                RawTaskOutcome::succeeded(key.clone(), json!({"snapshot": snapshot.reference}))
            }
            (RevertSnapshot | DeleteSnapshot | Migrate | AttachDisk | DetachDisk, _) => {
                RawTaskOutcome::succeeded(key.clone(), json!({}))
            }
        };
        drop(objects);

        if let Some(value) = &outcome.value {
            self.inject_event(target, &format!("{} applied: {}", kind, value));
        }
        self.enqueue_task_outcome(outcome);

        Ok(key)
    }
}

/// Factory opening [`MockConnector`]s for `mock://` addresses.
pub struct MockConnectorFactory;

#[async_trait]
impl ConnectorFactory for MockConnectorFactory {
    fn accepts(&self, address: &str) -> bool {
        address.starts_with("mock://")
    }

    async fn open(&self, address: &str) -> Result<Arc<dyn Connector>> {
        Ok(Arc::new(MockConnector::new(address)))
    }
}
