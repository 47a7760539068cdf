//! Provider and store traits, and the generic store-backed reconciler
//!
//! A [`Provider`] converges instances of one type. Most types share the same
//! algorithm and differ only in where records live, so [`Reconciler`] carries
//! the algorithm and delegates I/O to a [`Store`].

use crate::descriptor::Descriptor;
use crate::instance::{Instance, InstanceKey, Managed, PropertyFlush};
use anyhow::Result;
use serde_json::Value as Json;
use std::collections::{BTreeMap, BTreeSet};

/// Converges the instances of one resource type.
pub trait Provider {
    /// Provider name, e.g. `sensu_api`
    fn name(&self) -> &'static str;

    fn descriptor(&self) -> &'static Descriptor;

    /// Every instance of the type that exists on the backend.
    fn instances(&self) -> Result<Vec<Instance>>;

    /// Observe the current state of every requested instance.
    ///
    /// Instances that are not found are left absent.
    fn prefetch(&self, managed: &mut [Managed]) -> Result<()>;

    /// Whether the last prefetch found the instance. Performs no I/O.
    fn exists(&self, managed: &Managed) -> bool {
        managed.exists()
    }

    fn create(&self, managed: &mut Managed) -> Result<()>;

    /// Write staged properties in a single update.
    ///
    /// With nothing staged no write is made. Either way the local snapshot is
    /// refreshed from the desired state.
    fn flush(&self, managed: &mut Managed) -> Result<()>;

    fn destroy(&self, managed: &mut Managed) -> Result<()>;
}

/// Where the records of a type live.
pub trait Store {
    /// Provider name this store backs
    fn name(&self) -> &'static str;

    /// Names of every namespace on the backend.
    fn namespaces(&self) -> Result<Vec<String>>;

    /// Raw records of a type. A missing collection is an empty list.
    fn list(&self, descriptor: &Descriptor, namespace: Option<&str>) -> Result<Vec<Json>>;

    /// Create a record from a flat body.
    fn create(&self, descriptor: &Descriptor, key: &InstanceKey, body: &Json) -> Result<()>;

    /// Replace a record with a flat body.
    fn update(&self, descriptor: &Descriptor, key: &InstanceKey, body: &Json) -> Result<()>;

    fn delete(&self, descriptor: &Descriptor, key: &InstanceKey) -> Result<()>;
}

/// Flat body for a flush: staged values win over desired values.
///
/// Unset properties are skipped and absent ones are sent as `null` so the
/// backend clears them.
pub fn flush_body(descriptor: &Descriptor, desired: &Instance, staged: &PropertyFlush) -> Json {
    let values = descriptor.properties.iter().filter_map(|spec| {
        staged
            .get(spec.name)
            .or_else(|| desired.get(spec.name))
            .map(|value| (spec, value.to_json()))
    });
    descriptor.record(&desired.key, values)
}

/// Generic reconciler over a [`Store`].
pub struct Reconciler<S> {
    store: S,
    descriptor: &'static Descriptor,
}

impl<S: Store> Reconciler<S> {
    pub fn new(store: S, descriptor: &'static Descriptor) -> Self {
        Self { store, descriptor }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn list_normalized(&self, namespace: Option<&str>) -> Result<Vec<Instance>> {
        let records = self.store.list(self.descriptor, namespace)?;
        Ok(records
            .iter()
            .filter_map(|raw| self.descriptor.normalize(raw, namespace))
            .collect())
    }
}

impl<S: Store> Provider for Reconciler<S> {
    fn name(&self) -> &'static str {
        self.store.name()
    }

    fn descriptor(&self) -> &'static Descriptor {
        self.descriptor
    }

    fn instances(&self) -> Result<Vec<Instance>> {
        if !self.descriptor.is_namespaced() {
            return self.list_normalized(None);
        }

        let mut instances = Vec::new();
        for namespace in self.store.namespaces()? {
            instances.extend(self.list_normalized(Some(&namespace))?);
        }
        Ok(instances)
    }

    fn prefetch(&self, managed: &mut [Managed]) -> Result<()> {
        let namespaces: BTreeSet<Option<String>> =
            managed.iter().map(|m| m.key().namespace.clone()).collect();

        let mut found = BTreeMap::new();
        for namespace in &namespaces {
            log::debug!(
                "Prefetching {} in {}",
                self.descriptor.type_name,
                namespace.as_deref().unwrap_or("cluster scope")
            );
            for instance in self.list_normalized(namespace.as_deref())? {
                found.insert(instance.key.clone(), instance);
            }
        }

        for m in managed.iter_mut() {
            let current = found.get(m.key()).cloned();
            m.set_current(current);
        }
        Ok(())
    }

    fn create(&self, managed: &mut Managed) -> Result<()> {
        let body = self.descriptor.denormalize(managed.desired());
        log::info!("Creating {} {}", self.descriptor.type_name, managed.key());
        self.store.create(self.descriptor, managed.key(), &body)?;
        managed.set_current(Some(managed.desired().clone()));
        Ok(())
    }

    fn flush(&self, managed: &mut Managed) -> Result<()> {
        let staged = managed.take_pending();
        let mut snapshot = managed.desired().clone();

        if !staged.is_empty() {
            let body = flush_body(self.descriptor, managed.desired(), &staged);
            log::info!(
                "Updating {} {} ({} properties)",
                self.descriptor.type_name,
                managed.key(),
                staged.len()
            );
            self.store.update(self.descriptor, managed.key(), &body)?;
            for (property, value) in staged.iter() {
                snapshot.set(property.clone(), value.clone());
            }
        }

        managed.set_current(Some(snapshot));
        Ok(())
    }

    fn destroy(&self, managed: &mut Managed) -> Result<()> {
        log::info!("Deleting {} {}", self.descriptor.type_name, managed.key());
        self.store.delete(self.descriptor, managed.key())?;
        managed.set_current(None);
        Ok(())
    }
}
