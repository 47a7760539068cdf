//! Provider for etcd cluster members
//!
//! Members are addressed by a numeric id the backend assigns. A member added
//! through the API has no name until it starts and joins, so prefetch matches
//! declared members by name first and then by peer URLs.

use crate::types::CLUSTER_MEMBER;
use anyhow::{Result, anyhow, bail};
use declarative::{Descriptor, Instance, InstanceKey, Managed, Provider, Value};
use sensukit::{Client, ClusterMember, Sensuctl};
use serde_json::json;
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Where cluster membership is read and changed.
pub trait MemberBackend {
    /// Provider name this backend backs
    fn name(&self) -> &'static str;

    fn list(&self) -> Result<Vec<ClusterMember>>;

    fn add(&self, name: &str, peer_urls: &[String]) -> Result<()>;

    fn update(&self, id: u64, peer_urls: &[String]) -> Result<()>;

    fn remove(&self, id: u64) -> Result<()>;
}

/// Membership through the `cluster/members` API.
pub struct ApiMembers<'a> {
    client: &'a Client,
}

impl<'a> ApiMembers<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }
}

impl MemberBackend for ApiMembers<'_> {
    fn name(&self) -> &'static str {
        "sensu_api"
    }

    fn list(&self) -> Result<Vec<ClusterMember>> {
        Ok(self.client.cluster_members()?)
    }

    /// The API takes no name; the member reports its own when it joins.
    fn add(&self, name: &str, peer_urls: &[String]) -> Result<()> {
        log::debug!("Adding {name} by peer URLs only");
        Ok(self.client.add_cluster_member(peer_urls)?)
    }

    fn update(&self, id: u64, peer_urls: &[String]) -> Result<()> {
        Ok(self.client.update_cluster_member(id, peer_urls)?)
    }

    fn remove(&self, id: u64) -> Result<()> {
        Ok(self.client.remove_cluster_member(id)?)
    }
}

/// Membership through `sensuctl cluster`.
pub struct CliMembers<'a> {
    sensuctl: &'a Sensuctl,
}

impl<'a> CliMembers<'a> {
    pub fn new(sensuctl: &'a Sensuctl) -> Self {
        Self { sensuctl }
    }
}

impl MemberBackend for CliMembers<'_> {
    fn name(&self) -> &'static str {
        "sensuctl"
    }

    fn list(&self) -> Result<Vec<ClusterMember>> {
        Ok(self.sensuctl.member_list()?)
    }

    fn add(&self, name: &str, peer_urls: &[String]) -> Result<()> {
        Ok(self.sensuctl.member_add(name, peer_urls)?)
    }

    fn update(&self, id: u64, peer_urls: &[String]) -> Result<()> {
        Ok(self.sensuctl.member_update(id, peer_urls)?)
    }

    fn remove(&self, id: u64) -> Result<()> {
        Ok(self.sensuctl.member_remove(id)?)
    }
}

pub struct ClusterMemberProvider<B> {
    backend: B,
    /// Member ids found by the last prefetch, by declared name
    ids: RefCell<BTreeMap<String, u64>>,
}

impl<B: MemberBackend> ClusterMemberProvider<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            ids: RefCell::new(BTreeMap::new()),
        }
    }

    fn instance(name: &str, member: &ClusterMember) -> Instance {
        let mut instance = Instance::new(InstanceKey::new(name, None));
        let urls = member.peer_urls.iter().map(|url| json!(url)).collect();
        instance.set("peer_urls", Value::List(urls));
        instance
    }

    fn peer_urls(managed: &Managed) -> Result<Vec<String>> {
        managed
            .desired()
            .get("peer_urls")
            .and_then(Value::as_str_list)
            .ok_or_else(|| anyhow!("cluster member {} has no peer_urls", managed.key()))
    }

    fn id(&self, managed: &Managed) -> Result<u64> {
        self.ids
            .borrow()
            .get(&managed.key().name)
            .copied()
            .ok_or_else(|| anyhow!("cluster member {} was not found", managed.key()))
    }
}

fn same_urls(a: &[String], b: &[String]) -> bool {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort();
    b.sort();
    a == b
}

impl<B: MemberBackend> Provider for ClusterMemberProvider<B> {
    fn name(&self) -> &'static str {
        self.backend.name()
    }

    fn descriptor(&self) -> &'static Descriptor {
        &CLUSTER_MEMBER
    }

    /// Started members; members still waiting to join have no name yet.
    fn instances(&self) -> Result<Vec<Instance>> {
        Ok(self
            .backend
            .list()?
            .iter()
            .filter(|m| !m.name.is_empty())
            .map(|m| Self::instance(&m.name, m))
            .collect())
    }

    fn prefetch(&self, managed: &mut [Managed]) -> Result<()> {
        let members = self.backend.list()?;
        let mut ids = self.ids.borrow_mut();
        ids.clear();

        for m in managed.iter_mut() {
            let name = m.key().name.clone();
            let declared_urls = m.desired().get("peer_urls").and_then(Value::as_str_list);
            let found = members.iter().find(|member| member.name == name).or_else(|| {
                let urls = declared_urls.as_deref()?;
                members
                    .iter()
                    .find(|member| member.name.is_empty() && same_urls(&member.peer_urls, urls))
            });

            match found {
                Some(member) => {
                    log::debug!("Cluster member {name} has id {:x}", member.id);
                    ids.insert(name.clone(), member.id);
                    m.set_current(Some(Self::instance(&name, member)));
                }
                None => m.set_current(None),
            }
        }
        Ok(())
    }

    fn create(&self, managed: &mut Managed) -> Result<()> {
        let peer_urls = Self::peer_urls(managed)?;
        log::info!("Adding cluster member {}", managed.key());
        self.backend.add(&managed.key().name, &peer_urls)?;
        managed.set_current(Some(managed.desired().clone()));
        Ok(())
    }

    fn flush(&self, managed: &mut Managed) -> Result<()> {
        let staged = managed.take_pending();
        if staged.get("peer_urls").is_some() {
            let id = self.id(managed)?;
            let peer_urls = Self::peer_urls(managed)?;
            log::info!("Updating peer URLs of cluster member {}", managed.key());
            self.backend.update(id, &peer_urls)?;
        } else if !staged.is_empty() {
            bail!("cluster member {} can only change its peer_urls", managed.key());
        }
        managed.set_current(Some(managed.desired().clone()));
        Ok(())
    }

    fn destroy(&self, managed: &mut Managed) -> Result<()> {
        let id = self.id(managed)?;
        log::info!("Removing cluster member {}", managed.key());
        self.backend.remove(id)?;
        self.ids.borrow_mut().remove(&managed.key().name);
        managed.set_current(None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{ApplyResult, Ensure, converge};
    use sensukit::sensuctl::MockRunner;
    use sensukit::transport::MockTransport;
    use sensukit::{ClientConfig, Method};
    use serde_json::Value as Json;

    fn member(title: &str, ensure: Ensure, peer_urls: &[&str]) -> Managed {
        let mut input = BTreeMap::new();
        if !peer_urls.is_empty() {
            input.insert("peer_urls".to_string(), json!(peer_urls));
        }
        Managed::new(CLUSTER_MEMBER.declare(title, ensure, &input).unwrap())
    }

    fn client(mock: &MockTransport) -> Client {
        Client::with_transport(ClientConfig::default(), Box::new(mock.clone()))
    }

    #[test]
    fn test_add_member_then_match_by_peer_urls() {
        let mock = MockTransport::new();
        mock.add_member("backend-1", &["http://10.0.0.1:2380"]);
        let client = client(&mock);
        let provider = ClusterMemberProvider::new(ApiMembers::new(&client));

        let mut all = vec![member("backend-2", Ensure::Present, &["http://10.0.0.2:2380"])];
        provider.prefetch(&mut all).unwrap();
        assert_eq!(converge(&provider, &mut all[0]).unwrap(), ApplyResult::Created);

        let members = mock.members();
        assert_eq!(members.len(), 2);
        assert!(members[1].name.is_empty());
        assert_eq!(members[1].peer_urls, ["http://10.0.0.2:2380"]);

        // not started yet, so still unnamed
        mock.clear_requests();
        let mut again = vec![member("backend-2", Ensure::Present, &["http://10.0.0.2:2380"])];
        provider.prefetch(&mut again).unwrap();
        assert_eq!(converge(&provider, &mut again[0]).unwrap(), ApplyResult::NoChange);
        assert!(mock.writes().is_empty());
    }

    #[test]
    fn test_update_and_remove_by_id() {
        let mock = MockTransport::new();
        let id = mock.add_member("backend-1", &["http://10.0.0.1:2380"]);
        mock.add_member("backend-2", &["http://10.0.0.2:2380"]);
        let client = client(&mock);
        let provider = ClusterMemberProvider::new(ApiMembers::new(&client));

        let mut all = vec![
            member("backend-1", Ensure::Present, &["http://10.0.1.1:2380"]),
            member("backend-2", Ensure::Absent, &[]),
        ];
        provider.prefetch(&mut all).unwrap();
        assert_eq!(converge(&provider, &mut all[0]).unwrap(), ApplyResult::Modified);
        assert_eq!(converge(&provider, &mut all[1]).unwrap(), ApplyResult::Removed);

        let writes = mock.writes();
        assert_eq!(writes[0].method, Method::Put);
        assert!(writes[0].url.contains(&format!("/cluster/members/{id:x}?")));
        assert_eq!(writes[1].method, Method::Delete);

        let members = mock.members();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].peer_urls, ["http://10.0.1.1:2380"]);
    }

    #[test]
    fn test_sensuctl_member_add() {
        let runner = MockRunner::new();
        runner.push_stdout(r#"{"members":[{"ID":1,"name":"backend-1","peerURLs":["http://a:2380"]}]}"#);
        let sensuctl = Sensuctl::with_runner("sensuctl", Box::new(runner.clone()));
        let provider = ClusterMemberProvider::new(CliMembers::new(&sensuctl));

        let mut all = vec![
            member("backend-1", Ensure::Present, &["http://a:2380"]),
            member("backend-2", Ensure::Present, &["http://b:2380"]),
        ];
        provider.prefetch(&mut all).unwrap();
        assert_eq!(converge(&provider, &mut all[0]).unwrap(), ApplyResult::NoChange);
        assert_eq!(converge(&provider, &mut all[1]).unwrap(), ApplyResult::Created);

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].args, ["cluster", "member-add", "backend-2", "http://b:2380"]);
    }

    #[test]
    fn test_instances_skip_unstarted_members() {
        let mock = MockTransport::new();
        mock.add_member("backend-1", &["http://10.0.0.1:2380"]);
        let client = client(&mock);
        client.add_cluster_member(&["http://10.0.0.9:2380".to_string()]).unwrap();
        let provider = ClusterMemberProvider::new(ApiMembers::new(&client));

        let instances = provider.instances().unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].key.name, "backend-1");
        assert_eq!(
            instances[0].get("peer_urls"),
            Some(&Value::List(vec![Json::from("http://10.0.0.1:2380")]))
        );
    }
}
