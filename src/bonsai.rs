//! Provider for assets installed from Bonsai
//!
//! The installed asset is an ordinary backend asset built from the release
//! definition Bonsai publishes, with the release recorded in the
//! `io.sensu.bonsai.version` annotation. Writes go through the same store as
//! plain assets, so both providers install the same way.

use crate::types::{ASSET, BONSAI_ASSET};
use anyhow::{Context, Result, anyhow};
use declarative::{Descriptor, Ensure, Instance, InstanceKey, Managed, Provider, Store, Value};
use sensukit::Bonsai;
use sensukit::bonsai::{LATEST, VERSION_ANNOTATION};
use serde_json::{Map, Value as Json, json};
use std::collections::{BTreeMap, BTreeSet};

pub struct BonsaiAssetProvider<'a, S> {
    store: S,
    bonsai: &'a Bonsai,
}

/// Backend asset name and the Bonsai release it was installed from
fn installed(raw: &Json) -> Option<(String, Option<String>)> {
    let flat = ASSET.unwrap_record(raw)?;
    let metadata = flat.get("metadata")?;
    let name = metadata.get("name")?.as_str()?.to_string();
    let version = metadata
        .get("annotations")
        .and_then(|a| a.get(VERSION_ANNOTATION))
        .and_then(Json::as_str)
        .map(str::to_string);
    Some((name, version))
}

impl<'a, S: Store> BonsaiAssetProvider<'a, S> {
    pub fn new(store: S, bonsai: &'a Bonsai) -> Self {
        Self { store, bonsai }
    }

    /// Key of the backend asset a declaration installs.
    fn asset_key(managed: &Managed) -> InstanceKey {
        let key = managed.key();
        let name = managed
            .desired()
            .get("rename")
            .and_then(Value::as_str)
            .unwrap_or(&key.name);
        InstanceKey::new(name, key.namespace.as_deref())
    }

    fn desired_version(managed: &Managed) -> &str {
        managed
            .desired()
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or(LATEST)
    }

    /// Installed versions by asset key, for the given namespaces
    fn installed_in(&self, namespaces: &BTreeSet<String>) -> Result<BTreeMap<InstanceKey, Option<String>>> {
        let mut found = BTreeMap::new();
        for namespace in namespaces {
            for raw in self.store.list(&ASSET, Some(namespace))? {
                if let Some((name, version)) = installed(&raw) {
                    found.insert(InstanceKey::new(name, Some(namespace.as_str())), version);
                }
            }
        }
        Ok(found)
    }

    /// Version reported for an installed asset. A declaration asking for
    /// `latest` is in sync while the installed release is the newest one.
    fn reported_version(&self, managed: &Managed, installed: &str) -> Result<String> {
        if managed.ensure() == Ensure::Absent || Self::desired_version(managed) != LATEST {
            return Ok(installed.to_string());
        }
        let latest = self.bonsai.latest(&managed.key().name)?;
        log::debug!("Latest release of {} is {latest}", managed.key().name);
        Ok(if latest == installed {
            LATEST.to_string()
        } else {
            installed.to_string()
        })
    }

    /// Flat asset record for the declared release of a Bonsai asset.
    fn release_record(&self, managed: &Managed) -> Result<(InstanceKey, Json)> {
        let name = &managed.key().name;
        let version = self.bonsai.resolve(name, Self::desired_version(managed))?;
        let release = self.bonsai.release(name, &version)?;
        let mut flat = ASSET
            .unwrap_record(&release)
            .ok_or_else(|| anyhow!("Bonsai returned no asset definition for {name} {version}"))?;

        let key = Self::asset_key(managed);
        let metadata = flat
            .entry("metadata")
            .or_insert_with(|| Json::Object(Map::new()))
            .as_object_mut()
            .context("Bonsai asset metadata is not an object")?;
        metadata.insert("name".to_string(), json!(key.name));
        if let Some(namespace) = &key.namespace {
            metadata.insert("namespace".to_string(), json!(namespace));
        }
        let annotations = metadata
            .entry("annotations")
            .or_insert_with(|| Json::Object(Map::new()))
            .as_object_mut()
            .context("Bonsai asset annotations are not an object")?;
        annotations.insert(VERSION_ANNOTATION.to_string(), json!(version));

        log::info!("Installing {name} {version} as {key}");
        Ok((key, Json::Object(flat)))
    }
}

impl<S: Store> Provider for BonsaiAssetProvider<'_, S> {
    fn name(&self) -> &'static str {
        self.store.name()
    }

    fn descriptor(&self) -> &'static Descriptor {
        &BONSAI_ASSET
    }

    /// Assets carrying a Bonsai version annotation.
    fn instances(&self) -> Result<Vec<Instance>> {
        let namespaces: BTreeSet<String> = self.store.namespaces()?.into_iter().collect();
        Ok(self
            .installed_in(&namespaces)?
            .into_iter()
            .filter_map(|(key, version)| {
                let mut instance = Instance::new(key);
                instance.set("version", Value::Str(version?));
                Some(instance)
            })
            .collect())
    }

    fn prefetch(&self, managed: &mut [Managed]) -> Result<()> {
        let namespaces: BTreeSet<String> = managed
            .iter()
            .filter_map(|m| m.key().namespace.clone())
            .collect();
        let found = self.installed_in(&namespaces)?;

        for m in managed.iter_mut() {
            let current = match found.get(&Self::asset_key(m)) {
                None => None,
                Some(version) => {
                    let mut instance = Instance::new(m.key().clone());
                    if let Some(version) = version {
                        instance.set("version", Value::Str(self.reported_version(m, version)?));
                    }
                    if let Some(rename) = m.desired().get("rename") {
                        instance.set("rename", rename.clone());
                    }
                    Some(instance)
                }
            };
            m.set_current(current);
        }
        Ok(())
    }

    fn create(&self, managed: &mut Managed) -> Result<()> {
        let (key, record) = self.release_record(managed)?;
        self.store.create(&ASSET, &key, &record)?;
        managed.set_current(Some(managed.desired().clone()));
        Ok(())
    }

    fn flush(&self, managed: &mut Managed) -> Result<()> {
        let staged = managed.take_pending();
        if !staged.is_empty() {
            let (key, record) = self.release_record(managed)?;
            self.store.update(&ASSET, &key, &record)?;
        }
        managed.set_current(Some(managed.desired().clone()));
        Ok(())
    }

    fn destroy(&self, managed: &mut Managed) -> Result<()> {
        let key = Self::asset_key(managed);
        log::info!("Removing Bonsai asset {key}");
        self.store.delete(&ASSET, &key)?;
        managed.set_current(None);
        Ok(())
    }
}
