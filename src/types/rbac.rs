//! Role-based access control types.

use declarative::value::PropertyKind::{Map, ObjectList};
use declarative::{ANNOTATIONS, Descriptor, LABELS, PropertySpec as P};

static ROLE_PROPERTIES: &[P] = &[
    P::new("rules", ObjectList).required(),
    LABELS,
    ANNOTATIONS,
];

static BINDING_PROPERTIES: &[P] = &[
    P::new("role_ref", Map).required(),
    P::new("subjects", ObjectList).required(),
    LABELS,
    ANNOTATIONS,
];

pub static ROLE: Descriptor =
    Descriptor::namespaced("sensu_role", "Role", "roles", "role", ROLE_PROPERTIES);

pub static ROLE_BINDING: Descriptor = Descriptor::namespaced(
    "sensu_role_binding",
    "RoleBinding",
    "rolebindings",
    "role-binding",
    BINDING_PROPERTIES,
);

pub static CLUSTER_ROLE: Descriptor = Descriptor::cluster(
    "sensu_cluster_role",
    "ClusterRole",
    "clusterroles",
    "cluster-role",
    ROLE_PROPERTIES,
);

pub static CLUSTER_ROLE_BINDING: Descriptor = Descriptor::cluster(
    "sensu_cluster_role_binding",
    "ClusterRoleBinding",
    "clusterrolebindings",
    "cluster-role-binding",
    BINDING_PROPERTIES,
);
