//! Type definitions for managed objects, operations and queue items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// MANAGED OBJECTS
// =============================================================================

/// Category of a managed object within a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagedObjectKind {
    /// A datacenter, the root of the object tree for one backend address.
    Datacenter,
    /// A physical host running the hypervisor.
    Host,
    /// A virtual machine.
    Computer,
    /// A point-in-time snapshot of a computer.
    Snapshot,
    /// A grouping of computers sharing placement or quota.
    ResourceGroup,
    /// A storage pool visible to hosts.
    StoragePool,
}

impl std::fmt::Display for ManagedObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManagedObjectKind::Datacenter => write!(f, "datacenter"),
            ManagedObjectKind::Host => write!(f, "host"),
            ManagedObjectKind::Computer => write!(f, "computer"),
            ManagedObjectKind::Snapshot => write!(f, "snapshot"),
            ManagedObjectKind::ResourceGroup => write!(f, "resource-group"),
            ManagedObjectKind::StoragePool => write!(f, "storage-pool"),
        }
    }
}

/// Stable identity of a managed object.
///
/// Equality and hashing cover the full tuple. The `reference` component is
/// backend-private: connectors mint it and interpret it, nothing else does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedObjectId {
    /// Object category.
    pub kind: ManagedObjectKind,
    /// Address of the owning datacenter connection.
    pub datacenter: String,
    /// Backend-specific opaque reference.
    pub reference: String,
}

impl ManagedObjectId {
    /// Create a new managed object identity.
    pub fn new(
        kind: ManagedObjectKind,
        datacenter: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            datacenter: datacenter.into(),
            reference: reference.into(),
        }
    }
}

impl std::fmt::Display for ManagedObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.datacenter, self.kind, self.reference)
    }
}

/// Descriptor of a managed object as reported by a connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedObjectDescriptor {
    /// Stable identity.
    pub id: ManagedObjectId,
    /// Human-readable name.
    pub name: String,
    /// Identity of the containing object, if any.
    pub parent: Option<ManagedObjectId>,
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// A state-changing action that can be requested against a managed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
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
    AttachDisk,
    DetachDisk,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OperationKind::Start => "start",
            OperationKind::Stop => "stop",
            OperationKind::ForceStop => "force-stop",
            OperationKind::Reboot => "reboot",
            OperationKind::Pause => "pause",
            OperationKind::Resume => "resume",
            OperationKind::Delete => "delete",
            OperationKind::CreateSnapshot => "create-snapshot",
            OperationKind::RevertSnapshot => "revert-snapshot",
            OperationKind::DeleteSnapshot => "delete-snapshot",
            OperationKind::Migrate => "migrate",
            OperationKind::AttachDisk => "attach-disk",
            OperationKind::DetachDisk => "detach-disk",
        };
        write!(f, "{}", name)
    }
}

/// Backend-issued identifier linking an issued operation to its eventual
/// outcome.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationKey(pub String);

impl CorrelationKey {
    /// Create a new correlation key from a backend identifier.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl std::fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// REMOTE ITEMS
// =============================================================================

/// An unsolicited state-change notification reported by a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    /// Backend-assigned event identifier.
    pub id: String,
    /// Object the event concerns.
    pub target: ManagedObjectId,
    /// Human-readable description.
    pub description: String,
    /// Event timestamp.
    pub timestamp: DateTime<Utc>,
    /// Optional structured details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

/// Terminal status of a remote task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Succeeded,
    Failed,
}

/// The outcome of a remote task, matched back to a pending continuation by
/// its correlation key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTaskOutcome {
    /// Key issued when the operation was submitted.
    pub correlation: CorrelationKey,
    /// Terminal status.
    pub status: TaskStatus,
    /// Result value on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Fault message on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
    /// Underlying fault cause, when the backend reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault_cause: Option<String>,
}

impl RawTaskOutcome {
    /// Build a successful outcome.
    pub fn succeeded(correlation: CorrelationKey, value: serde_json::Value) -> Self {
        Self {
            correlation,
            status: TaskStatus::Succeeded,
            value: Some(value),
            fault: None,
            fault_cause: None,
        }
    }

    /// Build a failed outcome.
    pub fn failed(
        correlation: CorrelationKey,
        fault: impl Into<String>,
        cause: Option<String>,
    ) -> Self {
        Self {
            correlation,
            status: TaskStatus::Failed,
            value: None,
            fault: Some(fault.into()),
            fault_cause: cause,
        }
    }
}

// =============================================================================
// QUEUE ITEMS
// =============================================================================

/// An item carried on the shared collector queue.
#[derive(Debug, Clone)]
pub enum QueueItem {
    /// An unsolicited backend event.
    Event(RawEvent),
    /// The outcome of a tracked remote task.
    Task(RawTaskOutcome),
    /// End-of-stream sentinel pushed by a draining collector.
    Closing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_equality_covers_full_tuple() {
        let a = ManagedObjectId::new(ManagedObjectKind::Computer, "mock://dc1", "vm-1");
        let b = ManagedObjectId::new(ManagedObjectKind::Computer, "mock://dc1", "vm-1");
        let c = ManagedObjectId::new(ManagedObjectKind::Computer, "mock://dc2", "vm-1");
        let d = ManagedObjectId::new(ManagedObjectKind::Snapshot, "mock://dc1", "vm-1");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_task_outcome_constructors() {
        let key = CorrelationKey::new("task-7");
        let ok = RawTaskOutcome::succeeded(key.clone(), serde_json::json!(42));
        assert_eq!(ok.status, TaskStatus::Succeeded);
        assert_eq!(ok.value, Some(serde_json::json!(42)));
        assert!(ok.fault.is_none());

        let failed = RawTaskOutcome::failed(key, "disk full", Some("ENOSPC".to_string()));
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.fault.as_deref(), Some("disk full"));
        assert_eq!(failed.fault_cause.as_deref(), Some("ENOSPC"));
    }
}
