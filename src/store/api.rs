//! Store backed by the REST API

use anyhow::{Result, bail};
use declarative::{Descriptor, Envelope, InstanceKey, Store};
use sensukit::{Client, Method, RequestOptions, path_segment};
use serde_json::Value;

/// Reads and writes records through [`sensukit::Client`].
pub struct ApiStore<'a> {
    client: &'a Client,
}

impl<'a> ApiStore<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn options(descriptor: &Descriptor, method: Method, key: Option<&InstanceKey>) -> RequestOptions {
        RequestOptions::new(method)
            .namespace(key.and_then(|k| k.namespace.as_deref()))
            .api_group(descriptor.api_group)
    }

    /// `<collection>/<name>`, or `<collection>/<parent>/<name>` for objects
    /// addressed through their parent (events).
    fn item(descriptor: &Descriptor, key: &InstanceKey) -> String {
        let mut item = descriptor.collection.to_string();
        for segment in key.parent.iter().chain([&key.name]) {
            item.push('/');
            item.push_str(&path_segment(segment));
        }
        item
    }

    fn body(descriptor: &Descriptor, body: &Value) -> Value {
        match descriptor.envelope {
            Envelope::Flat => body.clone(),
            Envelope::Wrapped => descriptor.wrap(body),
        }
    }
}

impl Store for ApiStore<'_> {
    fn name(&self) -> &'static str {
        "sensu_api"
    }

    fn namespaces(&self) -> Result<Vec<String>> {
        Ok(self.client.namespaces()?)
    }

    fn list(&self, descriptor: &Descriptor, namespace: Option<&str>) -> Result<Vec<Value>> {
        let opts = RequestOptions::new(Method::Get)
            .namespace(namespace)
            .api_group(descriptor.api_group);
        match self.client.request(descriptor.collection, None, &opts)? {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(records)) => Ok(records),
            Some(other) => bail!(
                "Unexpected response listing {}: {other}",
                descriptor.collection
            ),
        }
    }

    /// POST to the collection. Wrapped types have no POST endpoint and are
    /// created with a PUT to the item instead, as are types whose records
    /// outlive their removal (disabled users).
    fn create(&self, descriptor: &Descriptor, key: &InstanceKey, body: &Value) -> Result<()> {
        let payload = Self::body(descriptor, body);
        if descriptor.create_by_put || descriptor.envelope == Envelope::Wrapped {
            self.client.request(
                &Self::item(descriptor, key),
                Some(&payload),
                &Self::options(descriptor, Method::Put, Some(key)),
            )?;
        } else {
            self.client.request(
                descriptor.collection,
                Some(&payload),
                &Self::options(descriptor, Method::Post, Some(key)),
            )?;
        }
        Ok(())
    }

    fn update(&self, descriptor: &Descriptor, key: &InstanceKey, body: &Value) -> Result<()> {
        self.client.request(
            &Self::item(descriptor, key),
            Some(&Self::body(descriptor, body)),
            &Self::options(descriptor, Method::Put, Some(key)),
        )?;
        Ok(())
    }

    fn delete(&self, descriptor: &Descriptor, key: &InstanceKey) -> Result<()> {
        self.client.request(
            &Self::item(descriptor, key),
            None,
            &Self::options(descriptor, Method::Delete, Some(key)),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AD_AUTH, ASSET, CHECK, ETCD_REPLICATOR, EVENT, ROLE_BINDING, SILENCED, USER};
    use declarative::{Ensure, Managed, Provider, Reconciler, converge};
    use sensukit::ClientConfig;
    use sensukit::transport::MockTransport;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn client(mock: &MockTransport) -> Client {
        Client::with_transport(ClientConfig::default(), Box::new(mock.clone()))
    }

    fn declare(descriptor: &'static Descriptor, title: &str, input: Value) -> Managed {
        let input: BTreeMap<String, Value> = serde_json::from_value(input).unwrap();
        Managed::new(descriptor.declare(title, Ensure::Present, &input).unwrap())
    }

    fn run(provider: &dyn Provider, managed: &mut Managed) -> declarative::ApplyResult {
        provider.prefetch(std::slice::from_mut(managed)).unwrap();
        converge(provider, managed).unwrap()
    }

    fn check() -> Managed {
        declare(
            &CHECK,
            "test",
            json!({"command": "foobar", "interval": 60, "subscriptions": ["demo"]}),
        )
    }

    #[test]
    fn test_check_create_then_idempotent() {
        let mock = MockTransport::new();
        let client = client(&mock);
        let provider = Reconciler::new(ApiStore::new(&client), &CHECK);

        let mut managed = check();
        assert_eq!(run(&provider, &mut managed), declarative::ApplyResult::Created);

        let writes = mock.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].method, Method::Post);
        assert!(writes[0].url.ends_with("/api/core/v2/namespaces/default/checks"));
        let body = writes[0].body.as_ref().unwrap();
        assert_eq!(body["metadata"]["name"], "test");
        assert_eq!(body["metadata"]["namespace"], "default");
        assert_eq!(body["command"], "foobar");

        mock.clear_requests();
        let mut again = check();
        assert_eq!(run(&provider, &mut again), declarative::ApplyResult::NoChange);
        assert!(mock.writes().is_empty());
    }

    #[test]
    fn test_round_trip_through_backend() {
        let mock = MockTransport::new();
        let client = client(&mock);
        let provider = Reconciler::new(ApiStore::new(&client), &CHECK);

        let mut managed = declare(
            &CHECK,
            "test",
            json!({"command": "foobar", "interval": 60, "subscriptions": ["demo"],
                "publish": "true", "labels": {"team": "ops"}, "cron": "absent"}),
        );
        provider.create(&mut managed).unwrap();

        let mut fresh = check();
        provider.prefetch(std::slice::from_mut(&mut fresh)).unwrap();
        let mut expected = managed.desired().clone();
        expected.attributes.remove("cron");
        assert_eq!(fresh.current(), Some(&expected));
    }

    #[test]
    fn test_role_binding_subjects_update_is_one_put() {
        let mock = MockTransport::new();
        mock.seed(
            Some("default"),
            "rolebindings",
            json!({"metadata": {"name": "test", "namespace": "default"},
                "role_ref": {"type": "Role", "name": "test"},
                "subjects": [{"type": "User", "name": "admin"}]}),
        );
        let client = client(&mock);
        let provider = Reconciler::new(ApiStore::new(&client), &ROLE_BINDING);

        let subjects = json!([{"type": "User", "name": "admin"}, {"type": "Group", "name": "ops"}]);
        let mut managed = declare(
            &ROLE_BINDING,
            "test",
            json!({"role_ref": {"type": "Role", "name": "test"}, "subjects": subjects}),
        );
        assert_eq!(run(&provider, &mut managed), declarative::ApplyResult::Modified);

        let writes = mock.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].method, Method::Put);
        assert!(writes[0].url.ends_with("/namespaces/default/rolebindings/test"));
        assert_eq!(writes[0].body.as_ref().unwrap()["subjects"], subjects);

        let stored = mock.object(Some("default"), "rolebindings", "test").unwrap();
        assert_eq!(stored["subjects"], subjects);
    }

    #[test]
    fn test_destroy_then_prefetch_omits() {
        let mock = MockTransport::new();
        let client = client(&mock);
        let provider = Reconciler::new(ApiStore::new(&client), &CHECK);

        let mut managed = check();
        run(&provider, &mut managed);
        provider.destroy(&mut managed).unwrap();
        assert!(!provider.exists(&managed));
        assert_eq!(mock.writes().last().unwrap().method, Method::Delete);

        let mut fresh = check();
        provider.prefetch(std::slice::from_mut(&mut fresh)).unwrap();
        assert!(!provider.exists(&fresh));
    }

    #[test]
    fn test_missing_namespace_lists_empty() {
        let mock = MockTransport::new();
        let client = client(&mock);
        let store = ApiStore::new(&client);
        assert!(store.list(&CHECK, Some("nowhere")).unwrap().is_empty());
    }

    #[test]
    fn test_wrapped_type_is_put_in_its_group() {
        let mock = MockTransport::new();
        let client = client(&mock);
        let provider = Reconciler::new(ApiStore::new(&client), &AD_AUTH);

        let mut managed = declare(
            &AD_AUTH,
            "corp",
            json!({"servers": [{"host": "dc.example.com"}]}),
        );
        assert_eq!(run(&provider, &mut managed), declarative::ApplyResult::Created);

        let write = &mock.writes()[0];
        assert_eq!(write.method, Method::Put);
        assert!(write.url.ends_with("/api/enterprise/authentication/v2/authproviders/corp"));
        assert_eq!(write.body.as_ref().unwrap()["type"], "ad");

        let mut again = declare(
            &AD_AUTH,
            "corp",
            json!({"servers": [{"host": "dc.example.com"}]}),
        );
        assert_eq!(run(&provider, &mut again), declarative::ApplyResult::NoChange);
    }

    #[test]
    fn test_disabled_user_is_enabled_again_with_put() {
        let mock = MockTransport::new();
        mock.seed(None, "users", json!({"username": "alice", "groups": ["ops"], "disabled": true}));
        let client = client(&mock);
        let provider = Reconciler::new(ApiStore::new(&client), &USER);

        let mut managed = declare(&USER, "alice", json!({"password": "secret", "groups": ["ops"]}));
        assert_eq!(run(&provider, &mut managed), declarative::ApplyResult::Created);

        let writes = mock.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].method, Method::Put);
        assert!(writes[0].url.ends_with("/api/core/v2/users/alice"));

        let stored = mock.object(None, "users", "alice").unwrap();
        assert!(stored.get("disabled").is_none());

        mock.clear_requests();
        let mut again = declare(&USER, "alice", json!({"password": "secret", "groups": ["ops"]}));
        assert_eq!(run(&provider, &mut again), declarative::ApplyResult::NoChange);
        assert!(mock.writes().is_empty());
    }

    #[test]
    fn test_item_paths_are_escaped() {
        let key = InstanceKey::new("sensu/sensu-slack-handler", Some("default"));
        assert_eq!(ApiStore::item(&ASSET, &key), "assets/sensu%2Fsensu-slack-handler");

        let mut key = InstanceKey::new("check-cpu", Some("default"));
        key.parent = Some("agent".to_string());
        assert_eq!(ApiStore::item(&EVENT, &key), "events/agent/check-cpu");
    }

    #[test]
    fn test_replicator_is_put_in_federation_group() {
        let mock = MockTransport::new();
        let client = client(&mock);
        let provider = Reconciler::new(ApiStore::new(&client), &ETCD_REPLICATOR);

        let input = json!({"url": "http://127.0.0.1:3379", "resource": "Role"});
        let mut managed = declare(&ETCD_REPLICATOR, "role_replicator", input.clone());
        assert_eq!(run(&provider, &mut managed), declarative::ApplyResult::Created);

        let write = &mock.writes()[0];
        assert_eq!(write.method, Method::Put);
        assert!(write.url.ends_with("/api/enterprise/federation/v1/etcd-replicators/role_replicator"));
        assert_eq!(write.body.as_ref().unwrap()["spec"]["replication_interval_seconds"], 30);

        let mut again = declare(&ETCD_REPLICATOR, "role_replicator", input);
        assert_eq!(run(&provider, &mut again), declarative::ApplyResult::NoChange);
    }

    #[test]
    fn test_silenced_is_posted_under_derived_name() {
        let mock = MockTransport::new();
        let client = client(&mock);
        let provider = Reconciler::new(ApiStore::new(&client), &SILENCED);

        let mut managed = declare(&SILENCED, "test", json!({"subscription": "test", "expire": 600}));
        assert_eq!(run(&provider, &mut managed), declarative::ApplyResult::Created);
        assert!(mock.object(Some("default"), "silenced", "test:*").is_some());

        let mut again = declare(&SILENCED, "test", json!({"subscription": "test", "expire": 600}));
        assert_eq!(run(&provider, &mut again), declarative::ApplyResult::NoChange);
    }
}
