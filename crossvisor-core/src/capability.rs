//! Capability profiles: which operation kinds a backend supports per
//! managed-object kind.
//!
//! Profiles are immutable once built. Combining profiles always unions the
//! operation sets per kind; nothing is ever silently overwritten.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::{ManagedObjectKind, OperationKind};

/// Immutable mapping from managed-object kind to the set of operation kinds
/// the backend supports for it.
///
/// A kind declared with an explicitly empty operation set is still a member
/// of [`CapabilityProfile::kinds`]; an undeclared kind is not. Both yield an
/// empty set from [`CapabilityProfile::operations_for`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityProfile {
    map: BTreeMap<ManagedObjectKind, BTreeSet<OperationKind>>,
}

impl CapabilityProfile {
    /// An empty profile supporting nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start building a profile from scratch.
    pub fn builder() -> CapabilityProfileBuilder {
        CapabilityProfileBuilder {
            map: BTreeMap::new(),
        }
    }

    /// Start building a profile on top of a base profile. Additions union
    /// with what the base already declares for each kind.
    pub fn extend(base: &CapabilityProfile) -> CapabilityProfileBuilder {
        CapabilityProfileBuilder {
            map: base.map.clone(),
        }
    }

    /// Merge any number of profiles into a new one, unioning the operation
    /// sets per kind. Commutative and associative.
    pub fn merge<'a>(profiles: impl IntoIterator<Item = &'a CapabilityProfile>) -> Self {
        let mut map: BTreeMap<ManagedObjectKind, BTreeSet<OperationKind>> = BTreeMap::new();
        for profile in profiles {
            for (kind, ops) in &profile.map {
                map.entry(*kind).or_default().extend(ops.iter().copied());
            }
        }
        Self { map }
    }

    /// Operations supported for the given kind. Empty set for unknown kinds.
    pub fn operations_for(&self, kind: ManagedObjectKind) -> BTreeSet<OperationKind> {
        self.map.get(&kind).cloned().unwrap_or_default()
    }

    /// Kinds this profile declares, including kinds declared with an empty
    /// operation set.
    pub fn kinds(&self) -> BTreeSet<ManagedObjectKind> {
        self.map.keys().copied().collect()
    }

    /// Whether the operation is declared for the kind.
    pub fn supports_operation(&self, kind: ManagedObjectKind, operation: OperationKind) -> bool {
        self.map
            .get(&kind)
            .map(|ops| ops.contains(&operation))
            .unwrap_or(false)
    }

    /// Whether this profile can service everything `other` requires: every
    /// (kind, operation) pair declared in `other` is also declared here.
    pub fn supports(&self, other: &CapabilityProfile) -> bool {
        other.map.iter().all(|(kind, ops)| {
            ops.iter()
                .all(|op| self.supports_operation(*kind, *op))
        })
    }
}

/// Builder accumulating per-kind operation sets for a [`CapabilityProfile`].
#[derive(Debug, Clone)]
pub struct CapabilityProfileBuilder {
    map: BTreeMap<ManagedObjectKind, BTreeSet<OperationKind>>,
}

impl CapabilityProfileBuilder {
    /// Declare a kind with the given operations, unioned with anything
    /// already declared for it.
    pub fn with_operations(
        mut self,
        kind: ManagedObjectKind,
        operations: impl IntoIterator<Item = OperationKind>,
    ) -> Self {
        self.map.entry(kind).or_default().extend(operations);
        self
    }

    /// Declare a kind with no operations. Distinct from leaving the kind
    /// undeclared: the kind becomes a member of `kinds()`.
    pub fn with_kind(mut self, kind: ManagedObjectKind) -> Self {
        self.map.entry(kind).or_default();
        self
    }

    /// Finish building the immutable profile.
    pub fn build(self) -> CapabilityProfile {
        CapabilityProfile { map: self.map }
    }
}
