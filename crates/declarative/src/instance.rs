//! Desired and observed resource instances.

use crate::descriptor::Descriptor;
use crate::error::ValidationError;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Identity of an instance within its type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceKey {
    pub name: String,
    /// `None` for cluster-scoped types
    pub namespace: Option<String>,
    /// Enclosing object, for types that live inside another object
    pub parent: Option<String>,
}

impl InstanceKey {
    pub fn new(name: impl Into<String>, namespace: Option<&str>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.map(str::to_string),
            parent: None,
        }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(parent) = &self.parent {
            write!(f, " on {parent}")?;
        }
        if let Some(namespace) = &self.namespace {
            write!(f, " in {namespace}")?;
        }
        Ok(())
    }
}

/// A resource as declared or as observed.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub key: InstanceKey,
    pub attributes: BTreeMap<String, Value>,
}

impl Instance {
    pub fn new(key: InstanceKey) -> Self {
        Self {
            key,
            attributes: BTreeMap::new(),
        }
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.attributes.get(property)
    }

    pub fn set(&mut self, property: impl Into<String>, value: Value) {
        self.attributes.insert(property.into(), value);
    }
}

/// Whether an instance should exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    #[default]
    Present,
    Absent,
}

impl FromStr for Ensure {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches(':') {
            "present" => Ok(Ensure::Present),
            "absent" => Ok(Ensure::Absent),
            _ => Err(ValidationError::InvalidEnsure {
                value: s.to_string(),
                present: "present",
            }),
        }
    }
}

impl fmt::Display for Ensure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ensure::Present => write!(f, "present"),
            Ensure::Absent => write!(f, "absent"),
        }
    }
}

/// A validated declaration.
#[derive(Debug, Clone)]
pub struct Declared {
    pub descriptor: &'static Descriptor,
    pub title: String,
    pub ensure: Ensure,
    pub instance: Instance,
}

/// Property writes staged for the next flush.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyFlush(BTreeMap<String, Value>);

impl PropertyFlush {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.0.get(property)
    }

    pub fn insert(&mut self, property: impl Into<String>, value: Value) {
        self.0.insert(property.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

/// A declared instance under management: the declaration, the last observed
/// state, and the writes staged against it.
#[derive(Debug, Clone)]
pub struct Managed {
    declared: Declared,
    current: Option<Instance>,
    pending: PropertyFlush,
}

impl Managed {
    pub fn new(declared: Declared) -> Self {
        Self {
            declared,
            current: None,
            pending: PropertyFlush::new(),
        }
    }

    pub fn declared(&self) -> &Declared {
        &self.declared
    }

    pub fn descriptor(&self) -> &'static Descriptor {
        self.declared.descriptor
    }

    pub fn title(&self) -> &str {
        &self.declared.title
    }

    pub fn ensure(&self) -> Ensure {
        self.declared.ensure
    }

    pub fn desired(&self) -> &Instance {
        &self.declared.instance
    }

    pub fn key(&self) -> &InstanceKey {
        &self.declared.instance.key
    }

    /// Whether the last observation found the instance.
    pub fn exists(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&Instance> {
        self.current.as_ref()
    }

    pub fn set_current(&mut self, current: Option<Instance>) {
        self.current = current;
    }

    /// Stage a property write. Nothing is sent until the next flush.
    pub fn stage(&mut self, property: impl Into<String>, value: Value) {
        self.pending.insert(property, value);
    }

    pub fn pending(&self) -> &PropertyFlush {
        &self.pending
    }

    pub fn take_pending(&mut self) -> PropertyFlush {
        std::mem::take(&mut self.pending)
    }
}
