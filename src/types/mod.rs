//! Resource type catalog

mod auth;
mod cluster;
mod events;
mod objects;
mod rbac;
mod subscription;

pub use auth::{AD_AUTH, LDAP_AUTH, OIDC_AUTH};
pub use cluster::{CLUSTER_MEMBER, ETCD_REPLICATOR};
pub use events::{EVENT, RESOLVED};
pub use objects::{
    ASSET, BONSAI_ASSET, CHECK, ENTITY, FILTER, HANDLER, HOOK, MUTATOR, NAMESPACE, SILENCED, USER,
};
pub use rbac::{CLUSTER_ROLE, CLUSTER_ROLE_BINDING, ROLE, ROLE_BINDING};
pub use subscription::{AGENT_SUBSCRIPTION, ENTITY_SUBSCRIPTION_PREFIX};

use declarative::Descriptor;

/// Every known type, in apply order: cluster members, namespaces and RBAC
/// before the objects that live in them.
pub static ALL: &[&Descriptor] = &[
    &CLUSTER_MEMBER,
    &NAMESPACE,
    &USER,
    &CLUSTER_ROLE,
    &CLUSTER_ROLE_BINDING,
    &ROLE,
    &ROLE_BINDING,
    &AD_AUTH,
    &LDAP_AUTH,
    &OIDC_AUTH,
    &ETCD_REPLICATOR,
    &ASSET,
    &BONSAI_ASSET,
    &HOOK,
    &FILTER,
    &MUTATOR,
    &HANDLER,
    &CHECK,
    &SILENCED,
    &ENTITY,
    &EVENT,
    &AGENT_SUBSCRIPTION,
];

/// Look up a type by name; the `sensu_` prefix may be omitted.
pub fn find(type_name: &str) -> Option<&'static Descriptor> {
    ALL.iter().copied().find(|d| {
        d.type_name == type_name || d.type_name.strip_prefix("sensu_") == Some(type_name)
    })
}

/// Position of a type in [`ALL`]
pub fn order(descriptor: &Descriptor) -> usize {
    ALL.iter()
        .position(|d| d.type_name == descriptor.type_name)
        .unwrap_or(ALL.len())
}
