//! Plain `core/v2` object types.

use declarative::value::PropertyKind::{Bool, Enum, Int, Map, ObjectList, Str, StrList};
use declarative::{ANNOTATIONS, DefaultValue, Descriptor, LABELS, NameField, PropertySpec as P, Value};
use std::collections::BTreeMap;

const METRIC_FORMATS: &[&str] = &[
    "nagios_perfdata",
    "graphite_plaintext",
    "influxdb_line",
    "opentsdb_line",
];

static CHECK_PROPERTIES: &[P] = &[
    P::new("command", Str).required(),
    P::new("subscriptions", StrList).required(),
    P::new("handlers", StrList),
    P::new("interval", Int),
    P::new("cron", Str),
    P::new("publish", Bool),
    P::new("timeout", Int),
    P::new("ttl", Int),
    P::new("stdin", Bool),
    P::new("low_flap_threshold", Int),
    P::new("high_flap_threshold", Int),
    P::new("runtime_assets", StrList),
    P::new("check_hooks", ObjectList),
    P::new("proxy_entity_name", Str),
    P::new("proxy_requests", Map),
    P::new("round_robin", Bool),
    P::new("output_metric_format", Enum(METRIC_FORMATS)),
    P::new("output_metric_handlers", StrList),
    P::new("env_vars", StrList),
    LABELS,
    ANNOTATIONS,
];

pub static CHECK: Descriptor = Descriptor {
    requires_one_of: &["interval", "cron"],
    ..Descriptor::namespaced("sensu_check", "CheckConfig", "checks", "check", CHECK_PROPERTIES)
};

static FILTER_PROPERTIES: &[P] = &[
    P::new("action", Enum(&["allow", "deny"])).required(),
    P::new("expressions", StrList).required(),
    P::new("runtime_assets", StrList),
    LABELS,
    ANNOTATIONS,
];

pub static FILTER: Descriptor =
    Descriptor::namespaced("sensu_filter", "EventFilter", "filters", "filter", FILTER_PROPERTIES);

static HANDLER_PROPERTIES: &[P] = &[
    P::new("type", Enum(&["pipe", "tcp", "udp", "set"])).required(),
    P::new("filters", StrList),
    P::new("mutator", Str),
    P::new("timeout", Int),
    P::new("command", Str),
    P::new("env_vars", StrList),
    P::new("socket", Map),
    P::new("handlers", StrList),
    P::new("runtime_assets", StrList),
    LABELS,
    ANNOTATIONS,
];

pub static HANDLER: Descriptor =
    Descriptor::namespaced("sensu_handler", "Handler", "handlers", "handler", HANDLER_PROPERTIES);

static MUTATOR_PROPERTIES: &[P] = &[
    P::new("command", Str).required(),
    P::new("timeout", Int),
    P::new("env_vars", StrList),
    P::new("runtime_assets", StrList),
    LABELS,
    ANNOTATIONS,
];

pub static MUTATOR: Descriptor =
    Descriptor::namespaced("sensu_mutator", "Mutator", "mutators", "mutator", MUTATOR_PROPERTIES);

static HOOK_PROPERTIES: &[P] = &[
    P::new("command", Str).required(),
    P::new("timeout", Int),
    P::new("stdin", Bool),
    P::new("runtime_assets", StrList),
    LABELS,
    ANNOTATIONS,
];

pub static HOOK: Descriptor =
    Descriptor::namespaced("sensu_hook", "HookConfig", "hooks", "hook", HOOK_PROPERTIES);

static ASSET_PROPERTIES: &[P] = &[
    P::new("url", Str),
    P::new("sha512", Str),
    P::new("filters", StrList),
    P::new("headers", Map),
    P::new("builds", ObjectList),
    LABELS,
    ANNOTATIONS,
];

pub static ASSET: Descriptor =
    Descriptor::namespaced("sensu_asset", "Asset", "assets", "asset", ASSET_PROPERTIES);

static BONSAI_ASSET_PROPERTIES: &[P] = &[
    P::new("version", Str).default_value(DefaultValue::Str("latest")),
    P::new("rename", Str),
];

/// An asset installed from Bonsai, named `<bonsai namespace>/<asset>`.
pub static BONSAI_ASSET: Descriptor = Descriptor {
    name_pattern: r"^[\w.\-]+/[\w.\-]+$",
    ..Descriptor::namespaced("sensu_bonsai_asset", "Asset", "assets", "asset", BONSAI_ASSET_PROPERTIES)
};

static SILENCED_PROPERTIES: &[P] = &[
    P::new("check", Str),
    P::new("subscription", Str),
    P::new("begin", Int),
    // counted down by the backend
    P::new("expire", Int).write_only(),
    P::new("expire_on_resolve", Bool),
    P::new("creator", Str),
    P::new("reason", Str),
    LABELS,
    ANNOTATIONS,
];

/// `<subscription>:<check>`, with `*` standing in for the missing half.
fn silenced_name(attributes: &BTreeMap<String, Value>) -> Option<String> {
    let part = |property: &str| attributes.get(property).and_then(Value::as_str);
    let (subscription, check) = (part("subscription"), part("check"));
    if subscription.is_none() && check.is_none() {
        return None;
    }
    Some(format!("{}:{}", subscription.unwrap_or("*"), check.unwrap_or("*")))
}

pub static SILENCED: Descriptor = Descriptor {
    name_pattern: r"^[\w.\-*:]+$",
    derive_name: Some(silenced_name),
    requires_one_of: &["check", "subscription"],
    ..Descriptor::namespaced("sensu_silenced", "Silenced", "silenced", "silenced", SILENCED_PROPERTIES)
};

static ENTITY_PROPERTIES: &[P] = &[
    P::new("entity_class", Str).required(),
    P::new("subscriptions", StrList),
    P::new("system", Map),
    P::new("deregister", Bool),
    P::new("deregistration", Map),
    P::new("redact", StrList),
    P::new("user", Str),
    LABELS,
    ANNOTATIONS,
];

pub static ENTITY: Descriptor =
    Descriptor::namespaced("sensu_entity", "Entity", "entities", "entity", ENTITY_PROPERTIES);

pub static NAMESPACE: Descriptor = Descriptor {
    name_field: NameField::Field("name"),
    ..Descriptor::cluster("sensu_namespace", "Namespace", "namespaces", "namespace", &[])
};

static USER_PROPERTIES: &[P] = &[
    P::new("password", Str).required().write_only(),
    P::new("groups", StrList),
];

/// Users cannot be deleted, only disabled. A disabled user reads as absent and
/// is re-enabled by writing it again.
pub static USER: Descriptor = Descriptor {
    name_field: NameField::Field("username"),
    cli_delete_verb: "disable",
    disabled_flag: Some("disabled"),
    create_by_put: true,
    ..Descriptor::cluster("sensu_user", "User", "users", "user", USER_PROPERTIES)
};
