//! In-memory store and sample type shared by unit tests.

use crate::descriptor::{DefaultValue, Descriptor, LABELS, PropertySpec};
use crate::instance::{Declared, Ensure, InstanceKey};
use crate::provider::Store;
use crate::value::PropertyKind;
use anyhow::{Result, bail};
use serde_json::{Value as Json, json};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

static WIDGET_PROPERTIES: &[PropertySpec] = &[
    PropertySpec::new("command", PropertyKind::Str).required(),
    PropertySpec::new("interval", PropertyKind::Int),
    PropertySpec::new("publish", PropertyKind::Bool).default_value(DefaultValue::Bool(true)),
    PropertySpec::new("subscriptions", PropertyKind::StrList),
    PropertySpec::new("secret", PropertyKind::Str).write_only(),
    LABELS,
];

pub static WIDGET: Descriptor =
    Descriptor::namespaced("widget", "Widget", "widgets", "widget", WIDGET_PROPERTIES);

/// Declare a widget with a fixed command and interval.
pub fn declare(title: &str, ensure: Ensure) -> Declared {
    let input: BTreeMap<String, Json> = [
        ("command".to_string(), json!("x")),
        ("interval".to_string(), json!(60)),
    ]
    .into_iter()
    .collect();
    WIDGET.declare(title, ensure, &input).unwrap()
}

#[derive(Default)]
struct State {
    records: BTreeMap<String, Vec<Json>>,
    list_calls: Vec<Option<String>>,
    writes: Vec<(String, Json)>,
    fail_lists: bool,
}

/// Store keeping flat records per namespace.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

fn record_name(record: &Json) -> Option<&str> {
    record.get("metadata")?.get("name")?.as_str()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, namespace: &str, record: Json) {
        let mut state = self.state.lock().unwrap();
        state.records.entry(namespace.to_string()).or_default().push(record);
    }

    pub fn fail_lists(&self) {
        self.state.lock().unwrap().fail_lists = true;
    }

    pub fn list_calls(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().list_calls.clone()
    }

    /// `("<op> <key>", body)` for every write, in order.
    pub fn writes(&self) -> Vec<(String, Json)> {
        self.state.lock().unwrap().writes.clone()
    }

    fn bucket(key: &InstanceKey) -> String {
        key.namespace.clone().unwrap_or_default()
    }
}

impl Store for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn namespaces(&self) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        let mut names: BTreeSet<String> = state.records.keys().cloned().collect();
        names.insert("default".to_string());
        Ok(names.into_iter().collect())
    }

    fn list(&self, _descriptor: &Descriptor, namespace: Option<&str>) -> Result<Vec<Json>> {
        let mut state = self.state.lock().unwrap();
        state.list_calls.push(namespace.map(str::to_string));
        if state.fail_lists {
            bail!("list failed");
        }
        Ok(state
            .records
            .get(namespace.unwrap_or_default())
            .cloned()
            .unwrap_or_default())
    }

    fn create(&self, _descriptor: &Descriptor, key: &InstanceKey, body: &Json) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.writes.push((format!("create {key}"), body.clone()));
        let records = state.records.entry(Self::bucket(key)).or_default();
        if records.iter().any(|r| record_name(r) == Some(key.name.as_str())) {
            bail!("{key} already exists");
        }
        records.push(body.clone());
        Ok(())
    }

    fn update(&self, _descriptor: &Descriptor, key: &InstanceKey, body: &Json) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.writes.push((format!("update {key}"), body.clone()));
        let records = state.records.entry(Self::bucket(key)).or_default();
        records.retain(|r| record_name(r) != Some(key.name.as_str()));
        records.push(body.clone());
        Ok(())
    }

    fn delete(&self, _descriptor: &Descriptor, key: &InstanceKey) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.writes.push((format!("delete {key}"), Json::Null));
        let records = state.records.entry(Self::bucket(key)).or_default();
        records.retain(|r| record_name(r) != Some(key.name.as_str()));
        Ok(())
    }
}
