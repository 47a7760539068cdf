//! Diff computation for managed instances

use crate::instance::{Ensure, Managed};
use crate::provider::Provider;
use crate::value::Value;
use std::collections::BTreeMap;

/// A property whose current value does not satisfy the desired one
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChange {
    pub property: String,
    /// `None` when the backend has no value
    pub current: Option<Value>,
    pub desired: Value,
}

/// Drifted properties of an existing instance.
///
/// Only declared properties are compared. Write-only properties are skipped
/// since the backend never returns them.
pub fn property_changes(managed: &Managed) -> Vec<PropertyChange> {
    let Some(current) = managed.current() else {
        return Vec::new();
    };

    managed
        .descriptor()
        .properties
        .iter()
        .filter(|spec| !spec.write_only)
        .filter_map(|spec| {
            let desired = managed.desired().get(spec.name)?;
            let observed = current.get(spec.name);
            (!desired.in_sync(observed)).then(|| PropertyChange {
                property: spec.name.to_string(),
                current: observed.cloned(),
                desired: desired.clone(),
            })
        })
        .collect()
}

/// What converging an instance will do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffAction {
    Create,
    Update,
    Destroy,
}

/// Pending change for one managed instance
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDiff {
    /// Declared title
    pub title: String,
    /// Type of the resource
    pub resource_type: String,
    /// Provider that will apply the change
    pub provider: String,
    /// Display form of the instance key
    pub key: String,
    pub action: DiffAction,
    /// Drifted properties for updates; every declared property for creates
    pub changes: Vec<PropertyChange>,
}

impl ResourceDiff {
    /// Diff a prefetched instance, returning None if no changes needed
    pub fn from_managed(provider: &dyn Provider, managed: &Managed) -> Option<Self> {
        let (action, changes) = match (managed.ensure(), provider.exists(managed)) {
            (Ensure::Present, false) => {
                let changes = managed
                    .desired()
                    .attributes
                    .iter()
                    .filter(|(_, value)| !value.is_absent())
                    .map(|(property, value)| PropertyChange {
                        property: property.clone(),
                        current: None,
                        desired: value.clone(),
                    })
                    .collect();
                (DiffAction::Create, changes)
            }
            (Ensure::Present, true) => {
                let changes = property_changes(managed);
                if changes.is_empty() {
                    return None;
                }
                (DiffAction::Update, changes)
            }
            (Ensure::Absent, true) => (DiffAction::Destroy, Vec::new()),
            (Ensure::Absent, false) => return None,
        };

        Some(Self {
            title: managed.title().to_string(),
            resource_type: managed.descriptor().type_name.to_string(),
            provider: provider.name().to_string(),
            key: managed.key().to_string(),
            action,
            changes,
        })
    }

    /// Check if this diff represents an addition
    pub fn is_addition(&self) -> bool {
        self.action == DiffAction::Create
    }

    /// Check if this diff represents a removal
    pub fn is_removal(&self) -> bool {
        self.action == DiffAction::Destroy
    }

    /// Check if this diff represents a modification
    pub fn is_modification(&self) -> bool {
        self.action == DiffAction::Update
    }
}

/// Diff summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    /// Number of instances to create
    pub additions: usize,
    /// Number of instances to remove
    pub removals: usize,
    /// Number of instances to update
    pub modifications: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[ResourceDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            match diff.action {
                DiffAction::Create => summary.additions += 1,
                DiffAction::Destroy => summary.removals += 1,
                DiffAction::Update => summary.modifications += 1,
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group diffs by resource type
pub fn group_by_type(diffs: &[ResourceDiff]) -> BTreeMap<String, Vec<&ResourceDiff>> {
    let mut groups: BTreeMap<String, Vec<&ResourceDiff>> = BTreeMap::new();
    for diff in diffs {
        groups.entry(diff.resource_type.clone()).or_default().push(diff);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Reconciler;
    use crate::testing::{MemoryStore, WIDGET, declare};
    use serde_json::json;

    fn prefetched(store: &MemoryStore, title: &str, ensure: Ensure) -> (Reconciler<MemoryStore>, Managed) {
        let provider = Reconciler::new(store.clone(), &WIDGET);
        let mut managed = vec![Managed::new(declare(title, ensure))];
        provider.prefetch(&mut managed).unwrap();
        (provider, managed.remove(0))
    }

    #[test]
    fn test_missing_instance_is_addition() {
        let store = MemoryStore::new();
        let (provider, managed) = prefetched(&store, "a", Ensure::Present);

        let diff = ResourceDiff::from_managed(&provider, &managed).unwrap();
        assert!(diff.is_addition());
        assert_eq!(diff.key, "a in default");
        assert_eq!(diff.provider, "memory");
        assert!(diff.changes.iter().any(|c| c.property == "command"));
    }

    #[test]
    fn test_drift_is_modification() {
        let store = MemoryStore::new();
        store.seed(
            "default",
            json!({"metadata": {"name": "a", "namespace": "default"},
                "command": "x", "interval": 30, "publish": true, "unknown": 1}),
        );
        let (provider, managed) = prefetched(&store, "a", Ensure::Present);

        let changes = property_changes(&managed);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].property, "interval");
        assert_eq!(changes[0].current, Some(Value::Int(30)));
        assert_eq!(changes[0].desired, Value::Int(60));
        assert!(ResourceDiff::from_managed(&provider, &managed).unwrap().is_modification());
    }

    #[test]
    fn test_in_sync_and_absent_have_no_diff() {
        let store = MemoryStore::new();
        store.seed(
            "default",
            json!({"metadata": {"name": "a"}, "command": "x", "interval": 60, "publish": true}),
        );
        let (provider, managed) = prefetched(&store, "a", Ensure::Present);
        assert!(ResourceDiff::from_managed(&provider, &managed).is_none());

        let (provider, managed) = prefetched(&store, "b", Ensure::Absent);
        assert!(ResourceDiff::from_managed(&provider, &managed).is_none());

        let (provider, managed) = prefetched(&store, "a", Ensure::Absent);
        assert!(ResourceDiff::from_managed(&provider, &managed).unwrap().is_removal());
    }

    #[test]
    fn test_summary_and_grouping() {
        let store = MemoryStore::new();
        let (provider, managed) = prefetched(&store, "a", Ensure::Present);
        let diffs = vec![ResourceDiff::from_managed(&provider, &managed).unwrap()];

        let summary = DiffSummary::from_diffs(&diffs);
        assert_eq!(summary.additions, 1);
        assert!(summary.has_changes());

        let groups = group_by_type(&diffs);
        assert_eq!(groups["widget"].len(), 1);
    }
}
