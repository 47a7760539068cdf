//! Cluster-level types: etcd members and federation replicators.

use declarative::value::PropertyKind::{Bool, Int, Str, StrList};
use declarative::{DefaultValue, Descriptor, Envelope, PropertySpec as P};

static MEMBER_PROPERTIES: &[P] = &[P::new("peer_urls", StrList).required()];

/// A backend in the etcd cluster. Managed by its own provider; members are
/// addressed by numeric id, which is looked up by name or peer URLs.
pub static CLUSTER_MEMBER: Descriptor = Descriptor::cluster(
    "sensu_cluster_member",
    "ClusterMember",
    "cluster/members",
    "cluster",
    MEMBER_PROPERTIES,
);

// The replicated `namespace` field is not exposed: it would clash with the
// namespace parameter every declaration carries.
static REPLICATOR_PROPERTIES: &[P] = &[
    P::new("ca_cert", Str),
    P::new("cert", Str),
    P::new("key", Str),
    P::new("insecure", Bool),
    P::new("url", Str).required(),
    P::new("api_version", Str).default_value(DefaultValue::Str("core/v2")),
    P::new("resource", Str).required(),
    P::new("replication_interval_seconds", Int).default_value(DefaultValue::Int(30)),
];

/// Replicates one resource kind to a federated cluster.
pub static ETCD_REPLICATOR: Descriptor = Descriptor {
    api_group: "enterprise/federation/v1",
    api_version: "federation/v1",
    envelope: Envelope::Wrapped,
    create_by_put: true,
    cli_dump: Some("federation/v1.EtcdReplicator"),
    ..Descriptor::cluster(
        "sensu_etcd_replicator",
        "EtcdReplicator",
        "etcd-replicators",
        "etcd-replicator",
        REPLICATOR_PROPERTIES,
    )
};
