//! Provider for agent subscriptions
//!
//! A subscription is present when the `subscriptions` list of its entity
//! contains it. Creating or destroying one re-reads the entity and writes it
//! back whole with the list edited, so every other entity field is preserved.

use crate::types::{AGENT_SUBSCRIPTION, ENTITY, ENTITY_SUBSCRIPTION_PREFIX};
use anyhow::{Context, Result, anyhow};
use declarative::{Descriptor, Instance, InstanceKey, Managed, Provider, Store};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

pub struct SubscriptionProvider<S> {
    store: S,
}

impl<S: Store> SubscriptionProvider<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Flat entity records of one namespace, keyed by entity name
    fn entities(&self, namespace: &str) -> Result<BTreeMap<String, Map<String, Value>>> {
        let records = self.store.list(&ENTITY, Some(namespace))?;
        Ok(records
            .iter()
            .filter_map(|raw| ENTITY.unwrap_record(raw))
            .filter_map(|flat| {
                let name = flat.get("metadata")?.get("name")?.as_str()?.to_string();
                Some((name, flat))
            })
            .collect())
    }

    fn subscriptions_of(namespace: &str, entity: &str, record: &Map<String, Value>) -> Vec<Instance> {
        record
            .get("subscriptions")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .filter(|s| !s.starts_with(ENTITY_SUBSCRIPTION_PREFIX))
            .map(|subscription| {
                Instance::new(InstanceKey {
                    name: subscription.to_string(),
                    namespace: Some(namespace.to_string()),
                    parent: Some(entity.to_string()),
                })
            })
            .collect()
    }

    fn list_namespace(&self, namespace: &str) -> Result<Vec<Instance>> {
        Ok(self
            .entities(namespace)?
            .iter()
            .flat_map(|(entity, record)| Self::subscriptions_of(namespace, entity, record))
            .collect())
    }

    /// Rewrite the subscriptions of the entity owning `key`.
    fn edit(&self, key: &InstanceKey, edit: impl FnOnce(&mut Vec<Value>)) -> Result<()> {
        let namespace = key.namespace.as_deref().unwrap_or("default");
        let entity = key
            .parent
            .as_deref()
            .ok_or_else(|| anyhow!("subscription {key} has no entity"))?;

        let mut record = self
            .entities(namespace)?
            .remove(entity)
            .with_context(|| format!("Entity {entity} not found in namespace {namespace}"))?;

        let mut subscriptions = record
            .get("subscriptions")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        edit(&mut subscriptions);
        record.insert("subscriptions".to_string(), Value::Array(subscriptions));

        let entity_key = InstanceKey::new(entity, Some(namespace));
        self.store.update(&ENTITY, &entity_key, &Value::Object(record))
    }
}

impl<S: Store> Provider for SubscriptionProvider<S> {
    fn name(&self) -> &'static str {
        self.store.name()
    }

    fn descriptor(&self) -> &'static Descriptor {
        &AGENT_SUBSCRIPTION
    }

    fn instances(&self) -> Result<Vec<Instance>> {
        let mut instances = Vec::new();
        for namespace in self.store.namespaces()? {
            instances.extend(self.list_namespace(&namespace)?);
        }
        Ok(instances)
    }

    fn prefetch(&self, managed: &mut [Managed]) -> Result<()> {
        let namespaces: BTreeSet<String> = managed
            .iter()
            .filter_map(|m| m.key().namespace.clone())
            .collect();

        let mut found = BTreeSet::new();
        for namespace in &namespaces {
            for instance in self.list_namespace(namespace)? {
                found.insert(instance.key);
            }
        }

        for m in managed.iter_mut() {
            let current = found
                .contains(m.key())
                .then(|| Instance::new(m.key().clone()));
            m.set_current(current);
        }
        Ok(())
    }

    fn create(&self, managed: &mut Managed) -> Result<()> {
        let subscription = managed.key().name.clone();
        log::info!("Adding subscription {}", managed.key());
        self.edit(managed.key(), |subscriptions| {
            if !subscriptions.iter().any(|s| s.as_str() == Some(subscription.as_str())) {
                subscriptions.push(Value::String(subscription));
            }
        })?;
        managed.set_current(Some(managed.desired().clone()));
        Ok(())
    }

    /// Subscriptions carry no properties; nothing is ever written.
    fn flush(&self, managed: &mut Managed) -> Result<()> {
        managed.take_pending();
        managed.set_current(Some(managed.desired().clone()));
        Ok(())
    }

    fn destroy(&self, managed: &mut Managed) -> Result<()> {
        let subscription = managed.key().name.clone();
        log::info!("Removing subscription {}", managed.key());
        self.edit(managed.key(), |subscriptions| {
            subscriptions.retain(|s| s.as_str() != Some(subscription.as_str()));
        })?;
        managed.set_current(None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ApiStore, CliStore};
    use declarative::{ApplyResult, Ensure, converge};
    use sensukit::sensuctl::MockRunner;
    use sensukit::transport::MockTransport;
    use sensukit::{Client, ClientConfig, Method, Sensuctl};
    use serde_json::json;

    fn managed(title: &str, ensure: Ensure) -> Managed {
        Managed::new(AGENT_SUBSCRIPTION.declare(title, ensure, &BTreeMap::new()).unwrap())
    }

    fn agent() -> Value {
        json!({
            "metadata": {"name": "agent", "namespace": "default", "labels": {"os": "linux"}},
            "entity_class": "agent",
            "subscriptions": ["base", "entity:agent"],
        })
    }

    #[test]
    fn test_add_subscription_rewrites_entity() {
        let mock = MockTransport::new();
        mock.seed(Some("default"), "entities", agent());
        let client = Client::with_transport(ClientConfig::default(), Box::new(mock.clone()));
        let provider = SubscriptionProvider::new(ApiStore::new(&client));

        let mut all = vec![managed("linux on agent", Ensure::Present), managed("base on agent", Ensure::Present)];
        provider.prefetch(&mut all).unwrap();
        assert!(!provider.exists(&all[0]));
        assert!(provider.exists(&all[1]));

        assert_eq!(converge(&provider, &mut all[0]).unwrap(), ApplyResult::Created);
        assert_eq!(converge(&provider, &mut all[1]).unwrap(), ApplyResult::NoChange);

        let writes = mock.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].method, Method::Put);
        assert!(writes[0].url.ends_with("/namespaces/default/entities/agent"));

        let stored = mock.object(Some("default"), "entities", "agent").unwrap();
        assert_eq!(stored["subscriptions"], json!(["base", "entity:agent", "linux"]));
        assert_eq!(stored["metadata"]["labels"]["os"], "linux");
        assert_eq!(stored["entity_class"], "agent");
    }

    #[test]
    fn test_remove_subscription() {
        let mock = MockTransport::new();
        mock.seed(Some("default"), "entities", agent());
        let client = Client::with_transport(ClientConfig::default(), Box::new(mock.clone()));
        let provider = SubscriptionProvider::new(ApiStore::new(&client));

        let mut all = vec![managed("base on agent", Ensure::Absent)];
        provider.prefetch(&mut all).unwrap();
        assert_eq!(converge(&provider, &mut all[0]).unwrap(), ApplyResult::Removed);

        let stored = mock.object(Some("default"), "entities", "agent").unwrap();
        assert_eq!(stored["subscriptions"], json!(["entity:agent"]));
    }

    #[test]
    fn test_missing_entity_is_an_error() {
        let mock = MockTransport::new();
        let client = Client::with_transport(ClientConfig::default(), Box::new(mock.clone()));
        let provider = SubscriptionProvider::new(ApiStore::new(&client));

        let mut all = vec![managed("linux on ghost", Ensure::Present)];
        provider.prefetch(&mut all).unwrap();
        let err = converge(&provider, &mut all[0]).unwrap_err();
        assert!(err.to_string().contains("Entity ghost not found"));
    }

    #[test]
    fn test_instances_skip_entity_subscription() {
        let runner = MockRunner::new();
        runner.push_stdout(&json!([{"name": "default"}]).to_string());
        runner.push_stdout(&json!([agent()]).to_string());
        let sensuctl = Sensuctl::with_runner("sensuctl", Box::new(runner.clone()));
        let provider = SubscriptionProvider::new(CliStore::new(&sensuctl));

        let names: Vec<String> = provider
            .instances()
            .unwrap()
            .iter()
            .map(|i| i.key.to_string())
            .collect();
        assert_eq!(names, vec!["base on agent in default"]);
    }
}
