//! Agent subscriptions.
//!
//! A subscription is not an object of its own: it is one entry in the
//! `subscriptions` list of an entity. Titles name both, e.g.
//! `"linux on agent1 in dev"`.

use declarative::Descriptor;

pub const SUBSCRIPTION_TITLES: &[&str] = &[
    r"^(?P<subscription>\S+) on (?P<entity>\S+) in (?P<namespace>\S+)$",
    r"^(?P<subscription>\S+) on (?P<entity>\S+)$",
    r"^(?P<subscription>(?s:.+))$",
];

/// Every agent holds `entity:<name>` for itself; it is never declared.
pub const ENTITY_SUBSCRIPTION_PREFIX: &str = "entity:";

pub static AGENT_SUBSCRIPTION: Descriptor = Descriptor {
    key_attribute: "subscription",
    parent_attribute: Some("entity"),
    title_patterns: SUBSCRIPTION_TITLES,
    name_pattern: r"^[\w.\-:]+$",
    reserved_prefixes: &[ENTITY_SUBSCRIPTION_PREFIX],
    ..Descriptor::namespaced("sensu_agent_subscription", "Entity", "entities", "entity", &[])
};
