//! Store backed by the `sensuctl` CLI

use anyhow::Result;
use declarative::{Descriptor, InstanceKey, Store};
use sensukit::Sensuctl;
use serde_json::Value;

/// Reads with `sensuctl <command> list`, writes with `sensuctl create` and
/// removes with `sensuctl <command> delete`. Types without a command of their
/// own go through `sensuctl dump` and `sensuctl delete`.
pub struct CliStore<'a> {
    sensuctl: &'a Sensuctl,
}

impl<'a> CliStore<'a> {
    pub fn new(sensuctl: &'a Sensuctl) -> Self {
        Self { sensuctl }
    }
}

impl Store for CliStore<'_> {
    fn name(&self) -> &'static str {
        "sensuctl"
    }

    fn namespaces(&self) -> Result<Vec<String>> {
        Ok(self.sensuctl.namespaces()?)
    }

    fn list(&self, descriptor: &Descriptor, namespace: Option<&str>) -> Result<Vec<Value>> {
        match descriptor.cli_dump {
            Some(resource) => Ok(self.sensuctl.dump(resource, namespace)?),
            None => Ok(self.sensuctl.list(descriptor.cli_command, namespace)?),
        }
    }

    fn create(&self, descriptor: &Descriptor, _key: &InstanceKey, body: &Value) -> Result<()> {
        Ok(self.sensuctl.create(&descriptor.wrap(body))?)
    }

    /// `sensuctl create` replaces an existing object, so updates go the same way.
    fn update(&self, descriptor: &Descriptor, _key: &InstanceKey, body: &Value) -> Result<()> {
        Ok(self.sensuctl.create(&descriptor.wrap(body))?)
    }

    fn delete(&self, descriptor: &Descriptor, key: &InstanceKey) -> Result<()> {
        if descriptor.cli_dump.is_some() {
            let resource = descriptor.wrap(&descriptor.record(key, std::iter::empty()));
            return Ok(self.sensuctl.delete_resource(&resource)?);
        }
        let ids: Vec<&str> = key
            .parent
            .iter()
            .chain([&key.name])
            .map(String::as_str)
            .collect();
        Ok(self.sensuctl.delete(
            descriptor.cli_command,
            descriptor.cli_delete_verb,
            &ids,
            key.namespace.as_deref(),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CHECK, ETCD_REPLICATOR, USER};
    use declarative::{ApplyResult, Ensure, Managed, Provider, Reconciler, converge};
    use sensukit::sensuctl::MockRunner;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn sensuctl(runner: &MockRunner) -> Sensuctl {
        Sensuctl::with_runner("sensuctl", Box::new(runner.clone()))
    }

    fn declare(descriptor: &'static Descriptor, title: &str, ensure: Ensure, input: Value) -> Managed {
        let input: BTreeMap<String, Value> = serde_json::from_value(input).unwrap();
        Managed::new(descriptor.declare(title, ensure, &input).unwrap())
    }

    fn check(ensure: Ensure) -> Managed {
        declare(
            &CHECK,
            "test in dev",
            ensure,
            json!({"command": "foobar", "interval": 60, "subscriptions": ["demo"]}),
        )
    }

    #[test]
    fn test_create_pipes_wrapped_json() {
        let runner = MockRunner::new();
        runner.push_stdout("null");
        let sensuctl = sensuctl(&runner);
        let provider = Reconciler::new(CliStore::new(&sensuctl), &CHECK);

        let mut managed = vec![check(Ensure::Present)];
        provider.prefetch(&mut managed).unwrap();
        assert_eq!(converge(&provider, &mut managed[0]).unwrap(), ApplyResult::Created);

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0].args,
            vec!["check", "list", "--format", "json", "--namespace", "dev"]
        );
        assert_eq!(calls[1].args, vec!["create"]);
        let stdin: Value = serde_json::from_str(calls[1].stdin.as_deref().unwrap()).unwrap();
        assert_eq!(stdin["type"], "CheckConfig");
        assert_eq!(stdin["metadata"]["namespace"], "dev");
        assert_eq!(stdin["spec"]["command"], "foobar");
    }

    #[test]
    fn test_listed_records_are_normalized() {
        let runner = MockRunner::new();
        runner.push_stdout(
            &json!([{"metadata": {"name": "test", "namespace": "dev"},
                "command": "foobar", "interval": 60, "subscriptions": ["demo"], "publish": true}])
            .to_string(),
        );
        let sensuctl = sensuctl(&runner);
        let provider = Reconciler::new(CliStore::new(&sensuctl), &CHECK);

        let mut managed = vec![check(Ensure::Present)];
        provider.prefetch(&mut managed).unwrap();
        assert_eq!(converge(&provider, &mut managed[0]).unwrap(), ApplyResult::NoChange);
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_destroy_uses_delete_verb() {
        let runner = MockRunner::new();
        runner.push_stdout(&json!([{"username": "alice"}]).to_string());
        let sensuctl = sensuctl(&runner);
        let provider = Reconciler::new(CliStore::new(&sensuctl), &USER);

        let mut managed = vec![declare(&USER, "alice", Ensure::Absent, json!({}))];
        provider.prefetch(&mut managed).unwrap();
        assert_eq!(converge(&provider, &mut managed[0]).unwrap(), ApplyResult::Removed);

        let calls = runner.calls();
        assert_eq!(calls[0].args, vec!["user", "list", "--format", "json"]);
        assert_eq!(calls[1].args, vec!["user", "disable", "alice", "--skip-confirm"]);
    }

    #[test]
    fn test_disabled_user_stays_removed() {
        let runner = MockRunner::new();
        runner.push_stdout(&json!([{"username": "alice", "disabled": true}]).to_string());
        let sensuctl = sensuctl(&runner);
        let provider = Reconciler::new(CliStore::new(&sensuctl), &USER);

        let mut managed = vec![declare(&USER, "alice", Ensure::Absent, json!({}))];
        provider.prefetch(&mut managed).unwrap();
        assert_eq!(converge(&provider, &mut managed[0]).unwrap(), ApplyResult::NoChange);
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_command_failure_propagates() {
        let runner = MockRunner::new();
        runner.push_failure("Error: not authorized");
        let sensuctl = sensuctl(&runner);
        let provider = Reconciler::new(CliStore::new(&sensuctl), &CHECK);

        let mut managed = vec![check(Ensure::Present)];
        let err = provider.prefetch(&mut managed).unwrap_err();
        assert!(err.to_string().contains("not authorized"));
    }

    #[test]
    fn test_replicator_goes_through_dump_and_delete() {
        let runner = MockRunner::new();
        runner.push_stdout(
            &json!({"type": "EtcdReplicator", "api_version": "federation/v1",
                "metadata": {"name": "role_replicator"},
                "spec": {"url": "http://127.0.0.1:3379", "resource": "Role"}})
            .to_string(),
        );
        let sensuctl = sensuctl(&runner);
        let provider = Reconciler::new(CliStore::new(&sensuctl), &ETCD_REPLICATOR);

        let mut managed = vec![declare(&ETCD_REPLICATOR, "role_replicator", Ensure::Absent, json!({}))];
        provider.prefetch(&mut managed).unwrap();
        assert_eq!(converge(&provider, &mut managed[0]).unwrap(), ApplyResult::Removed);

        let calls = runner.calls();
        assert_eq!(
            calls[0].args,
            vec!["dump", "federation/v1.EtcdReplicator", "--format", "json", "--all-namespaces"]
        );
        assert_eq!(calls[1].args, vec!["delete"]);
        let stdin: Value = serde_json::from_str(calls[1].stdin.as_deref().unwrap()).unwrap();
        assert_eq!(stdin["type"], "EtcdReplicator");
        assert_eq!(stdin["metadata"]["name"], "role_replicator");
    }
}
