//! Managed-object inventory.
//!
//! One generic resource container covers the whole object taxonomy:
//! every registered object can hold children (direct or recursive
//! traversal) and can expose an event receiver, regardless of its kind.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{ControlError, Result};
use crate::types::{ManagedObjectDescriptor, ManagedObjectId, RawEvent};

#[derive(Debug)]
struct ManagedObjectEntry {
    descriptor: ManagedObjectDescriptor,
    receiver: Option<mpsc::UnboundedSender<RawEvent>>,
}

/// Registry of the managed objects known on one connection.
#[derive(Debug, Default)]
pub struct Inventory {
    objects: RwLock<HashMap<ManagedObjectId, ManagedObjectEntry>>,
}

impl Inventory {
    /// Create an empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object, or update its descriptor if already present.
    /// An existing event receiver survives the update.
    pub fn register(&self, descriptor: ManagedObjectDescriptor) {
        let mut objects = self.objects.write().unwrap_or_else(|e| e.into_inner());
        match objects.get_mut(&descriptor.id) {
            Some(entry) => entry.descriptor = descriptor,
            None => {
                objects.insert(
                    descriptor.id.clone(),
                    ManagedObjectEntry {
                        descriptor,
                        receiver: None,
                    },
                );
            }
        }
    }

    /// Remove an object, detaching its direct children rather than
    /// cascading. Returns the removed descriptor, if any.
    pub fn remove(&self, id: &ManagedObjectId) -> Option<ManagedObjectDescriptor> {
        let mut objects = self.objects.write().unwrap_or_else(|e| e.into_inner());
        let removed = objects.remove(id).map(|entry| entry.descriptor);
        if removed.is_some() {
            for entry in objects.values_mut() {
                if entry.descriptor.parent.as_ref() == Some(id) {
                    entry.descriptor.parent = None;
                }
            }
        }
        removed
    }

    /// Descriptor of a registered object.
    pub fn get(&self, id: &ManagedObjectId) -> Option<ManagedObjectDescriptor> {
        let objects = self.objects.read().unwrap_or_else(|e| e.into_inner());
        objects.get(id).map(|entry| entry.descriptor.clone())
    }

    /// Whether the object is registered.
    pub fn contains(&self, id: &ManagedObjectId) -> bool {
        let objects = self.objects.read().unwrap_or_else(|e| e.into_inner());
        objects.contains_key(id)
    }

    /// Number of registered objects.
    pub fn len(&self) -> usize {
        let objects = self.objects.read().unwrap_or_else(|e| e.into_inner());
        objects.len()
    }

    /// Whether the inventory is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attach an event receiver to a registered object. Unsolicited events
    /// targeting the object are forwarded to it by the dispatcher.
    pub fn set_event_receiver(
        &self,
        id: &ManagedObjectId,
        receiver: mpsc::UnboundedSender<RawEvent>,
    ) -> Result<()> {
        let mut objects = self.objects.write().unwrap_or_else(|e| e.into_inner());
        let entry = objects
            .get_mut(id)
            .ok_or_else(|| ControlError::ObjectNotFound(id.to_string()))?;
        entry.receiver = Some(receiver);
        Ok(())
    }

    /// Direct children of an object.
    pub fn direct_children(&self, id: &ManagedObjectId) -> Vec<ManagedObjectDescriptor> {
        let objects = self.objects.read().unwrap_or_else(|e| e.into_inner());
        objects
            .values()
            .filter(|entry| entry.descriptor.parent.as_ref() == Some(id))
            .map(|entry| entry.descriptor.clone())
            .collect()
    }

    /// All descendants of an object, in no particular order.
    pub fn descendants(&self, id: &ManagedObjectId) -> Vec<ManagedObjectDescriptor> {
        let objects = self.objects.read().unwrap_or_else(|e| e.into_inner());
        let mut found = Vec::new();
        let mut frontier = vec![id.clone()];

        while let Some(current) = frontier.pop() {
            for entry in objects.values() {
                if entry.descriptor.parent.as_ref() == Some(&current) {
                    frontier.push(entry.descriptor.id.clone());
                    found.push(entry.descriptor.clone());
                }
            }
        }
        found
    }

    /// Deliver an event to its target object's receiver. Returns whether a
    /// receiver accepted it; unknown targets and receiver-less objects are
    /// reported as undelivered.
    pub fn deliver(&self, event: RawEvent) -> bool {
        let objects = self.objects.read().unwrap_or_else(|e| e.into_inner());
        match objects.get(&event.target) {
            Some(entry) => match &entry.receiver {
                Some(receiver) => receiver.send(event).is_ok(),
                None => {
                    debug!(target = %event.target, "Object has no event receiver");
                    false
                }
            },
            None => false,
        }
    }
}
