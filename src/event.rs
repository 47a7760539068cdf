//! Provider for events
//!
//! Agents create events; this provider only resolves or deletes them.
//! Resolving rewrites the event with its check status set, in a single
//! update. An event that does not exist has nothing to resolve and is in
//! sync.

use crate::types::{EVENT, RESOLVED};
use anyhow::{Context, Result, bail};
use declarative::{Descriptor, Instance, InstanceKey, Managed, Provider, Store, Value};
use serde_json::{Map, Value as Json, json};
use std::collections::{BTreeMap, BTreeSet};

/// Output written to the check of a manually resolved event
const RESOLVED_OUTPUT: &str = "Resolved manually by sensu-converge";

pub struct EventProvider<S> {
    store: S,
}

impl<S: Store> EventProvider<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Instance of a flat event record: keyed by check, entity and namespace.
    fn normalize(flat: &Map<String, Json>, listed_in: &str) -> Option<Instance> {
        let check = flat.get("check")?;
        let check_name = check.pointer("/metadata/name")?.as_str()?;
        let entity = flat.get("entity")?.pointer("/metadata/name")?.as_str()?;
        let namespace = flat
            .get("metadata")
            .and_then(|m| m.get("namespace"))
            .and_then(Json::as_str)
            .unwrap_or(listed_in);

        let mut instance = Instance::new(InstanceKey {
            name: check_name.to_string(),
            namespace: Some(namespace.to_string()),
            parent: Some(entity.to_string()),
        });
        let status = check.get("status").and_then(Json::as_i64).unwrap_or(RESOLVED);
        instance.set("status", Value::Int(status));
        Some(instance)
    }

    /// Flat event records of one namespace, keyed like their instances
    fn events(&self, namespace: &str) -> Result<BTreeMap<InstanceKey, (Instance, Map<String, Json>)>> {
        let records = self.store.list(&EVENT, Some(namespace))?;
        Ok(records
            .iter()
            .filter_map(|raw| EVENT.unwrap_record(raw))
            .filter_map(|flat| {
                let instance = Self::normalize(&flat, namespace)?;
                Some((instance.key.clone(), (instance, flat)))
            })
            .collect())
    }
}

impl<S: Store> Provider for EventProvider<S> {
    fn name(&self) -> &'static str {
        self.store.name()
    }

    fn descriptor(&self) -> &'static Descriptor {
        &EVENT
    }

    fn instances(&self) -> Result<Vec<Instance>> {
        let mut instances = Vec::new();
        for namespace in self.store.namespaces()? {
            instances.extend(self.events(&namespace)?.into_values().map(|(instance, _)| instance));
        }
        Ok(instances)
    }

    fn prefetch(&self, managed: &mut [Managed]) -> Result<()> {
        let namespaces: BTreeSet<String> = managed
            .iter()
            .filter_map(|m| m.key().namespace.clone())
            .collect();

        let mut found = BTreeMap::new();
        for namespace in &namespaces {
            for (key, (instance, _)) in self.events(namespace)? {
                found.insert(key, instance);
            }
        }

        for m in managed.iter_mut() {
            let current = match found.remove(m.key()) {
                Some(instance) => Some(instance),
                None if m.ensure() == declarative::Ensure::Present => {
                    log::debug!("No event {}, nothing to resolve", m.key());
                    Some(m.desired().clone())
                }
                None => None,
            };
            m.set_current(current);
        }
        Ok(())
    }

    fn create(&self, managed: &mut Managed) -> Result<()> {
        bail!("Event {} cannot be created; events come from agents", managed.key())
    }

    fn flush(&self, managed: &mut Managed) -> Result<()> {
        let staged = managed.take_pending();
        if let Some(status) = staged.get("status") {
            let Value::Int(status) = *status else {
                bail!("Event status must be an integer");
            };
            let key = managed.key().clone();
            let namespace = key.namespace.as_deref().unwrap_or("default");
            let (_, mut record) = self
                .events(namespace)?
                .remove(&key)
                .with_context(|| format!("Event {key} disappeared before it could be resolved"))?;

            if let Some(check) = record.get_mut("check").and_then(Json::as_object_mut) {
                check.insert("status".to_string(), json!(status));
                if status == RESOLVED {
                    check.insert("output".to_string(), json!(RESOLVED_OUTPUT));
                }
            }
            log::info!("Setting status of event {key} to {status}");
            self.store.update(&EVENT, &key, &Json::Object(record))?;
        }
        managed.set_current(Some(managed.desired().clone()));
        Ok(())
    }

    fn destroy(&self, managed: &mut Managed) -> Result<()> {
        log::info!("Deleting event {}", managed.key());
        self.store.delete(&EVENT, managed.key())?;
        managed.set_current(None);
        Ok(())
    }
}
