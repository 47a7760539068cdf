//! Enterprise authentication providers.
//!
//! All three kinds share the `authproviders` collection and are told apart by
//! the `type` tag of the wrapped record.

use declarative::value::PropertyKind::{Bool, ObjectList, Str, StrList};
use declarative::{ANNOTATIONS, Descriptor, Envelope, LABELS, PropertySpec as P};

const AUTH_GROUP: &str = "enterprise/authentication/v2";
const AUTH_VERSION: &str = "authentication/v2";

static DIRECTORY_PROPERTIES: &[P] = &[
    P::new("servers", ObjectList).required(),
    P::new("groups_prefix", Str),
    P::new("username_prefix", Str),
    LABELS,
    ANNOTATIONS,
];

static OIDC_PROPERTIES: &[P] = &[
    P::new("client_id", Str).required(),
    P::new("client_secret", Str).required().write_only(),
    P::new("server", Str).required(),
    P::new("redirect_uri", Str),
    P::new("additional_scopes", StrList),
    P::new("disable_offline_access", Bool),
    P::new("groups_claim", Str),
    P::new("groups_prefix", Str),
    P::new("username_claim", Str),
    P::new("username_prefix", Str),
    LABELS,
    ANNOTATIONS,
];

const fn auth_provider(
    type_name: &'static str,
    kind: &'static str,
    properties: &'static [P],
) -> Descriptor {
    let mut descriptor = Descriptor::cluster(type_name, kind, "authproviders", "auth", properties);
    descriptor.api_group = AUTH_GROUP;
    descriptor.api_version = AUTH_VERSION;
    descriptor.envelope = Envelope::Wrapped;
    descriptor.shared_collection = true;
    descriptor
}

pub static AD_AUTH: Descriptor = auth_provider("sensu_ad_auth", "ad", DIRECTORY_PROPERTIES);

pub static LDAP_AUTH: Descriptor = auth_provider("sensu_ldap_auth", "ldap", DIRECTORY_PROPERTIES);

pub static OIDC_AUTH: Descriptor = auth_provider("sensu_oidc_auth", "oidc", OIDC_PROPERTIES);
