//! Events.
//!
//! Events are produced by agents, so they can only be resolved or deleted.
//! An event belongs to a check on an entity; titles name both, e.g.
//! `"check-cpu for agent1 in dev"`.

use declarative::value::PropertyKind::Int;
use declarative::{DefaultValue, Descriptor, PropertySpec as P};

pub const EVENT_TITLES: &[&str] = &[
    r"^(?P<check>\S+) (?:for|on) (?P<entity>\S+) in (?P<namespace>\S+)$",
    r"^(?P<check>\S+) (?:for|on) (?P<entity>\S+)$",
    r"^(?P<check>(?s:.+))$",
];

/// Status the check of a resolved event is set to.
pub const RESOLVED: i64 = 0;

static EVENT_PROPERTIES: &[P] = &[P::new("status", Int).default_value(DefaultValue::Int(RESOLVED))];

pub static EVENT: Descriptor = Descriptor {
    key_attribute: "check",
    parent_attribute: Some("entity"),
    title_patterns: EVENT_TITLES,
    present_verb: "resolve",
    ..Descriptor::namespaced("sensu_event", "Event", "events", "event", EVENT_PROPERTIES)
};
