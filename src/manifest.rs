//! Manifest of declared resources
//!
//! TOML (`.toml`) or JSON (anything else) with one entry per resource:
//!
//! ```toml
//! [[resource]]
//! type = "sensu_check"
//! name = "check-cpu in dev"
//! command = "check-cpu.sh -w 75 -c 90"
//! interval = 60
//! subscriptions = ["linux"]
//!
//! [[resource]]
//! type = "sensu_agent_subscription"
//! name = "linux on agent1"
//! ensure = "absent"
//! provider = "sensu_api"
//! ```
//!
//! `name` is the resource title; every key besides `type`, `name`, `ensure`
//! and `provider` is a property. Properties whose name clashes with one of
//! those keys (a handler's `type`) go in a `properties` table:
//!
//! ```toml
//! [[resource]]
//! type = "sensu_handler"
//! name = "slack"
//! command = "sensu-slack-handler"
//! properties = { type = "pipe" }
//! ```

use crate::registry::{Backends, ProviderKind, Registry};
use crate::types;
use anyhow::{Context, Result, bail};
use declarative::{Batch, Declared, Ensure, ExecutionPlan, InstanceKey, Managed, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "resource", default)]
    pub resources: Vec<ResourceEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEntry {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ensure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Explicit property table, merged over the inline properties
    #[serde(rename = "properties", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub explicit: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub properties: BTreeMap<String, Value>,
}

/// A validated entry and the provider it runs through
#[derive(Debug, Clone)]
pub struct Resolved {
    pub declared: Declared,
    pub provider: ProviderKind,
}

/// A manifest entry that failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("resource #{index} ({label}): {error}")]
pub struct EntryError {
    /// 1-based position in the manifest
    pub index: usize,
    pub label: String,
    pub error: ValidationError,
}

impl ResourceEntry {
    fn label(&self) -> String {
        format!("{} '{}'", self.resource_type, self.name)
    }

    fn resolve(&self, registry: &Registry) -> Result<Resolved, ValidationError> {
        let descriptor = registry.descriptor(&self.resource_type)?;
        let ensure = match self.ensure.as_deref() {
            Some(ensure) => descriptor.parse_ensure(ensure)?,
            None => Ensure::Present,
        };
        let provider = registry.resolve_provider(self.provider.as_deref())?;
        let declared = if self.explicit.is_empty() {
            descriptor.declare(&self.name, ensure, &self.properties)?
        } else {
            let mut input = self.properties.clone();
            input.extend(self.explicit.iter().map(|(k, v)| (k.clone(), v.clone())));
            descriptor.declare(&self.name, ensure, &input)?
        };
        Ok(Resolved { declared, provider })
    }
}

impl Manifest {
    /// Load a manifest, choosing the format by extension.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read manifest {}", path.display()))?;

        let is_toml = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let manifest = if is_toml {
            Self::from_toml(&content)
        } else {
            Self::from_json(&content)
        };
        manifest.with_context(|| format!("Invalid manifest {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML")
    }

    /// A JSON manifest is either `{"resource": [...]}` or a bare array.
    pub fn from_json(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content).context("Invalid JSON")?;
        let manifest = match value {
            Value::Array(_) => Self {
                resources: serde_json::from_value(value).context("Invalid resource list")?,
            },
            other => serde_json::from_value(other).context("Invalid manifest object")?,
        };
        Ok(manifest)
    }

    /// Validate every entry, collecting all failures.
    ///
    /// Two entries naming the same instance of the same type are rejected.
    pub fn check(&self, registry: &Registry) -> (Vec<Resolved>, Vec<EntryError>) {
        let mut resolved = Vec::with_capacity(self.resources.len());
        let mut errors = Vec::new();
        let mut seen: BTreeSet<(&'static str, InstanceKey)> = BTreeSet::new();

        for (i, entry) in self.resources.iter().enumerate() {
            let result = entry.resolve(registry).and_then(|r| {
                let key = (r.declared.descriptor.type_name, r.declared.instance.key.clone());
                if seen.insert(key) {
                    Ok(r)
                } else {
                    Err(ValidationError::Duplicate(format!(
                        "{} '{}'",
                        r.declared.descriptor.type_name, r.declared.instance.key
                    )))
                }
            });
            match result {
                Ok(r) => resolved.push(r),
                Err(error) => errors.push(EntryError {
                    index: i + 1,
                    label: entry.label(),
                    error,
                }),
            }
        }

        (resolved, errors)
    }

    /// Validate every entry, failing with all errors at once.
    pub fn resolve(&self, registry: &Registry) -> Result<Vec<Resolved>> {
        let (resolved, errors) = self.check(registry);
        if !errors.is_empty() {
            let lines: Vec<String> = errors.iter().map(ToString::to_string).collect();
            bail!(
                "{} invalid resource{}:\n  {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                lines.join("\n  ")
            );
        }
        Ok(resolved)
    }
}

/// Group resolved entries into batches, one per type and provider.
///
/// Batches follow the catalog's apply order; entries keep manifest order
/// within a batch.
pub fn build_plan<'a>(
    resolved: Vec<Resolved>,
    registry: &Registry,
    backends: &Backends<'a>,
) -> ExecutionPlan<'a> {
    let mut groups: BTreeMap<(usize, ProviderKind), Vec<Managed>> = BTreeMap::new();
    for r in resolved {
        groups
            .entry((types::order(r.declared.descriptor), r.provider))
            .or_default()
            .push(Managed::new(r.declared));
    }

    let mut plan = ExecutionPlan::new();
    for ((_, kind), managed) in groups {
        let Some(descriptor) = managed.first().map(Managed::descriptor) else {
            continue;
        };
        plan.add_batch(Batch::new(registry.provider(descriptor, kind, backends), managed));
    }
    plan
}
