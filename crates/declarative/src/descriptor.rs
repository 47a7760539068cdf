//! Static description of a resource type.
//!
//! A [`Descriptor`] tells the generic reconciler everything it needs about a
//! type: where its objects live, how they are named, which properties they
//! carry and how to move them between the flat JSON records of the backend and
//! [`Instance`] values.

use crate::error::ValidationError;
use crate::instance::{Declared, Ensure, Instance, InstanceKey};
use crate::value::{PropertyKind, Value};
use regex::Regex;
use serde_json::{Map, Value as Json, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::{LazyLock, Mutex, PoisonError};

/// Title patterns for namespaced types: `"<name> in <namespace>"` or `"<name>"`.
pub const NAMESPACED_TITLES: &[&str] = &[
    r"^(?P<resource_name>\S+) in (?P<namespace>\S+)$",
    r"^(?P<resource_name>(?s:.+))$",
];

/// Title patterns for cluster-scoped types.
pub const CLUSTER_TITLES: &[&str] = &[r"^(?P<resource_name>(?s:.+))$"];

/// Names accepted by the backend for most objects.
pub const DEFAULT_NAME_PATTERN: &str = r"^[\w.\-]+$";

/// Reserved parameter holding the object name.
pub const RESOURCE_NAME: &str = "resource_name";

/// Reserved parameter holding the namespace.
pub const NAMESPACE: &str = "namespace";

/// Compiled patterns, keyed by their source. Descriptors are static, so each
/// pattern is compiled once per process.
static PATTERNS: LazyLock<Mutex<HashMap<&'static str, Regex>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn compiled(pattern: &'static str) -> Result<Regex, ValidationError> {
    let mut cache = PATTERNS.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(regex) = cache.get(pattern) {
        return Ok(regex.clone());
    }
    let regex = Regex::new(pattern).map_err(|e| ValidationError::Pattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;
    cache.insert(pattern, regex.clone());
    Ok(regex)
}

/// Builds the object name from declared properties
pub type NameFn = fn(&BTreeMap<String, Value>) -> Option<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Namespaced,
    Cluster,
}

/// How the backend lays out an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// `{metadata, <fields>}`
    Flat,
    /// `{type, api_version, metadata, spec: {<fields>}}`
    Wrapped,
}

/// Where the object name lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameField {
    /// `metadata.name`
    Metadata,
    /// A top-level field such as `username`
    Field(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Metadata,
    Spec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Optional,
    /// Required when `ensure = present`
    WhenPresent,
    /// Required for every declaration
    Always,
}

/// Default applied when a declaration leaves a property unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    Str(&'static str),
}

impl DefaultValue {
    fn value(self, kind: PropertyKind) -> Value {
        match (self, kind) {
            (DefaultValue::Bool(b), _) => Value::Bool(b),
            (DefaultValue::Int(i), _) => Value::Int(i),
            (DefaultValue::Str(s), PropertyKind::Enum(_)) => Value::Enum(s.to_string()),
            (DefaultValue::Str(s), _) => Value::Str(s.to_string()),
        }
    }
}

/// One property of a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertySpec {
    pub name: &'static str,
    pub kind: PropertyKind,
    pub placement: Placement,
    pub requirement: Requirement,
    pub default: Option<DefaultValue>,
    /// Sent to the backend but never read back, so never compared
    pub write_only: bool,
}

impl PropertySpec {
    pub const fn new(name: &'static str, kind: PropertyKind) -> Self {
        Self {
            name,
            kind,
            placement: Placement::Spec,
            requirement: Requirement::Optional,
            default: None,
            write_only: false,
        }
    }

    pub const fn required(mut self) -> Self {
        self.requirement = Requirement::WhenPresent;
        self
    }

    pub const fn always_required(mut self) -> Self {
        self.requirement = Requirement::Always;
        self
    }

    pub const fn metadata(mut self) -> Self {
        self.placement = Placement::Metadata;
        self
    }

    pub const fn default_value(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    pub const fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }
}

/// `metadata.labels`
pub const LABELS: PropertySpec = PropertySpec::new("labels", PropertyKind::Map).metadata();

/// `metadata.annotations`
pub const ANNOTATIONS: PropertySpec = PropertySpec::new("annotations", PropertyKind::Map).metadata();

/// Static description of a resource type.
#[derive(Debug)]
pub struct Descriptor {
    /// Declared type name, e.g. `sensu_check`
    pub type_name: &'static str,
    /// Envelope `type`, e.g. `CheckConfig`
    pub kind: &'static str,
    /// URL group, e.g. `core/v2`
    pub api_group: &'static str,
    /// Envelope `api_version`
    pub api_version: &'static str,
    pub collection: &'static str,
    pub cli_command: &'static str,
    pub cli_delete_verb: &'static str,
    pub scope: Scope,
    pub envelope: Envelope,
    /// Several kinds share the collection; records are told apart by `type`
    pub shared_collection: bool,
    pub name_field: NameField,
    /// Parameter that holds the instance name
    pub key_attribute: &'static str,
    /// Parameter naming the object this one lives inside, if any
    pub parent_attribute: Option<&'static str>,
    pub name_pattern: &'static str,
    pub title_patterns: &'static [&'static str],
    pub properties: &'static [PropertySpec],
    /// At least one of these must be set when present
    pub requires_one_of: &'static [&'static str],
    /// Names with these prefixes belong to the backend and cannot be declared
    pub reserved_prefixes: &'static [&'static str],
    /// Derives the name from properties unless one is given explicitly
    pub derive_name: Option<NameFn>,
    /// Ensure value meaning "present", e.g. `resolve` for events
    pub present_verb: &'static str,
    /// Created with a PUT to the item instead of a POST to the collection
    pub create_by_put: bool,
    /// Boolean field marking a record as removed; such records are not found
    pub disabled_flag: Option<&'static str>,
    /// Resource listed with `sensuctl dump` and removed with `sensuctl delete`,
    /// for types without a sensuctl command of their own
    pub cli_dump: Option<&'static str>,
}

impl Descriptor {
    /// Base descriptor for a namespaced `core/v2` type with a flat layout.
    pub const fn namespaced(
        type_name: &'static str,
        kind: &'static str,
        collection: &'static str,
        cli_command: &'static str,
        properties: &'static [PropertySpec],
    ) -> Self {
        Self {
            type_name,
            kind,
            api_group: "core/v2",
            api_version: "core/v2",
            collection,
            cli_command,
            cli_delete_verb: "delete",
            scope: Scope::Namespaced,
            envelope: Envelope::Flat,
            shared_collection: false,
            name_field: NameField::Metadata,
            key_attribute: RESOURCE_NAME,
            parent_attribute: None,
            name_pattern: DEFAULT_NAME_PATTERN,
            title_patterns: NAMESPACED_TITLES,
            properties,
            requires_one_of: &[],
            reserved_prefixes: &[],
            derive_name: None,
            present_verb: "present",
            create_by_put: false,
            disabled_flag: None,
            cli_dump: None,
        }
    }

    /// Base descriptor for a cluster-scoped `core/v2` type with a flat layout.
    pub const fn cluster(
        type_name: &'static str,
        kind: &'static str,
        collection: &'static str,
        cli_command: &'static str,
        properties: &'static [PropertySpec],
    ) -> Self {
        let mut descriptor = Self::namespaced(type_name, kind, collection, cli_command, properties);
        descriptor.scope = Scope::Cluster;
        descriptor.title_patterns = CLUSTER_TITLES;
        descriptor
    }

    pub fn is_namespaced(&self) -> bool {
        self.scope == Scope::Namespaced
    }

    /// Look up a property by name.
    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Parse an ensure value. `absent` always works; the present value is
    /// [`Self::present_verb`].
    pub fn parse_ensure(&self, value: &str) -> Result<Ensure, ValidationError> {
        match value.trim_start_matches(':') {
            "absent" => Ok(Ensure::Absent),
            v if v == self.present_verb => Ok(Ensure::Present),
            _ => Err(ValidationError::InvalidEnsure {
                value: value.to_string(),
                present: self.present_verb,
            }),
        }
    }

    fn is_parameter(&self, name: &str) -> bool {
        name == RESOURCE_NAME
            || name == self.key_attribute
            || name == NAMESPACE
            || self.parent_attribute == Some(name)
    }

    // =========================================================================
    // Titles
    // =========================================================================

    /// Match a title against the title patterns; first match wins.
    ///
    /// Returns the named captures of the matching pattern.
    pub fn parse_title(&self, title: &str) -> Result<BTreeMap<String, String>, ValidationError> {
        for pattern in self.title_patterns {
            let regex = compiled(pattern)?;
            if let Some(captures) = regex.captures(title) {
                return Ok(regex
                    .capture_names()
                    .flatten()
                    .filter_map(|name| {
                        captures
                            .name(name)
                            .map(|m| (name.to_string(), m.as_str().to_string()))
                    })
                    .collect());
            }
        }
        Err(ValidationError::UnparsableTitle {
            type_name: self.type_name,
            title: title.to_string(),
        })
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    /// Validate a declaration and build its desired instance.
    ///
    /// Explicit parameters in `input` win over values captured from the
    /// title, and a name derived from properties wins over the title.
    /// Defaults fill unset properties.
    pub fn declare(
        &'static self,
        title: &str,
        ensure: Ensure,
        input: &BTreeMap<String, Json>,
    ) -> Result<Declared, ValidationError> {
        let captures = self.parse_title(title)?;
        let parameter = |name: &str| -> Result<Option<String>, ValidationError> {
            match input.get(name) {
                Some(Json::String(s)) => Ok(Some(s.clone())),
                Some(_) => Err(ValidationError::WrongKind {
                    property: name.to_string(),
                    expected: PropertyKind::Str.expected(),
                }),
                None => Ok(captures.get(name).cloned()),
            }
        };

        let mut attributes = BTreeMap::new();
        for (property, raw) in input {
            if self.is_parameter(property) {
                continue;
            }
            let spec = self.property(property).ok_or_else(|| ValidationError::UnknownProperty {
                type_name: self.type_name,
                property: property.clone(),
            })?;
            attributes.insert(property.clone(), spec.kind.coerce(property, raw)?);
        }

        for spec in self.properties {
            if let Some(default) = spec.default
                && !attributes.contains_key(spec.name)
            {
                attributes.insert(spec.name.to_string(), default.value(spec.kind));
            }
        }

        let explicit_name = input.contains_key(self.key_attribute) || input.contains_key(RESOURCE_NAME);
        let derived = self
            .derive_name
            .filter(|_| !explicit_name)
            .and_then(|derive| derive(&attributes));
        let name = match derived {
            Some(name) => name,
            None => match parameter(self.key_attribute)? {
                Some(name) => name,
                None => parameter(RESOURCE_NAME)?.unwrap_or_else(|| title.to_string()),
            },
        };
        if !compiled(self.name_pattern)?.is_match(&name) {
            return Err(ValidationError::InvalidName {
                type_name: self.type_name,
                name,
            });
        }
        if self.reserved_prefixes.iter().any(|p| name.starts_with(p)) {
            return Err(ValidationError::ReservedName {
                type_name: self.type_name,
                name,
            });
        }

        let namespace = match self.scope {
            Scope::Namespaced => {
                let namespace = parameter(NAMESPACE)?.unwrap_or_else(|| "default".to_string());
                if !compiled(DEFAULT_NAME_PATTERN)?.is_match(&namespace) {
                    return Err(ValidationError::InvalidNamespace(namespace));
                }
                Some(namespace)
            }
            Scope::Cluster => {
                if input.contains_key(NAMESPACE) {
                    return Err(ValidationError::NamespaceNotAllowed {
                        type_name: self.type_name,
                    });
                }
                None
            }
        };

        let parent = match self.parent_attribute {
            Some(attribute) => {
                let parent = parameter(attribute)?.ok_or_else(|| ValidationError::MissingRequired {
                    property: attribute.to_string(),
                })?;
                if !compiled(DEFAULT_NAME_PATTERN)?.is_match(&parent) {
                    return Err(ValidationError::InvalidName {
                        type_name: self.type_name,
                        name: parent,
                    });
                }
                Some(parent)
            }
            None => None,
        };

        let is_set = |name: &str| attributes.get(name).is_some_and(|v| !v.is_absent());
        for spec in self.properties {
            let needed = match spec.requirement {
                Requirement::Optional => false,
                Requirement::WhenPresent => ensure == Ensure::Present,
                Requirement::Always => true,
            };
            if needed && !is_set(spec.name) {
                return Err(ValidationError::MissingRequired {
                    property: spec.name.to_string(),
                });
            }
        }
        if ensure == Ensure::Present
            && !self.requires_one_of.is_empty()
            && !self.requires_one_of.iter().any(|p| is_set(p))
        {
            return Err(ValidationError::MissingOneOf {
                properties: self.requires_one_of.join(", "),
            });
        }

        Ok(Declared {
            descriptor: self,
            title: title.to_string(),
            ensure,
            instance: Instance {
                key: InstanceKey {
                    name,
                    namespace,
                    parent,
                },
                attributes,
            },
        })
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Flatten a backend record, or `None` if it belongs to another kind.
    ///
    /// Accepts both flat and wrapped layouts regardless of [`Self::envelope`],
    /// since `sensuctl` may print either.
    pub fn unwrap_record(&self, raw: &Json) -> Option<Map<String, Json>> {
        let object = raw.as_object()?;
        if self.shared_collection
            && let Some(tag) = object.get("type").and_then(Json::as_str)
            && tag != self.kind
        {
            return None;
        }

        match object.get("spec").and_then(Json::as_object) {
            Some(spec) if object.contains_key("api_version") || object.contains_key("type") => {
                let mut flat = spec.clone();
                if let Some(metadata) = object.get("metadata") {
                    flat.insert("metadata".to_string(), metadata.clone());
                }
                Some(flat)
            }
            _ => Some(object.clone()),
        }
    }

    /// Build an instance from a backend record.
    ///
    /// Only known properties are kept; `listed_in` is used when the record
    /// carries no namespace of its own.
    pub fn normalize(&self, raw: &Json, listed_in: Option<&str>) -> Option<Instance> {
        let flat = self.unwrap_record(raw)?;
        if let Some(flag) = self.disabled_flag
            && flat.get(flag).and_then(Json::as_bool) == Some(true)
        {
            return None;
        }
        let metadata = flat.get("metadata").and_then(Json::as_object);

        let name = match self.name_field {
            NameField::Metadata => metadata?.get("name")?.as_str()?,
            NameField::Field(field) => flat.get(field)?.as_str()?,
        };
        let namespace = match self.scope {
            Scope::Namespaced => Some(
                metadata
                    .and_then(|m| m.get("namespace"))
                    .and_then(Json::as_str)
                    .or(listed_in)?
                    .to_string(),
            ),
            Scope::Cluster => None,
        };

        let mut attributes = BTreeMap::new();
        for spec in self.properties.iter().filter(|p| !p.write_only) {
            let raw_value = match spec.placement {
                Placement::Metadata => metadata.and_then(|m| m.get(spec.name)),
                Placement::Spec => flat.get(spec.name),
            };
            if let Some(value) = raw_value.and_then(|v| spec.kind.from_api(v)) {
                attributes.insert(spec.name.to_string(), value);
            }
        }

        Some(Instance {
            key: InstanceKey {
                name: name.to_string(),
                namespace,
                parent: None,
            },
            attributes,
        })
    }

    /// Flat backend record for an instance. Absent values are omitted.
    pub fn denormalize(&self, instance: &Instance) -> Json {
        let values = self
            .properties
            .iter()
            .filter_map(|spec| instance.get(spec.name).map(|v| (spec, v)))
            .filter(|(_, v)| !v.is_absent())
            .map(|(spec, v)| (spec, v.to_json()));
        self.record(&instance.key, values)
    }

    /// Assemble a flat record from the key and `(property, json)` pairs.
    pub fn record<'a>(
        &self,
        key: &InstanceKey,
        values: impl IntoIterator<Item = (&'a PropertySpec, Json)>,
    ) -> Json {
        let mut metadata = Map::new();
        let mut object = Map::new();

        match self.name_field {
            NameField::Metadata => {
                metadata.insert("name".to_string(), json!(key.name));
            }
            NameField::Field(field) => {
                object.insert(field.to_string(), json!(key.name));
            }
        }
        if let Some(namespace) = &key.namespace {
            metadata.insert(NAMESPACE.to_string(), json!(namespace));
        }

        for (spec, value) in values {
            match spec.placement {
                Placement::Metadata => metadata.insert(spec.name.to_string(), value),
                Placement::Spec => object.insert(spec.name.to_string(), value),
            };
        }

        if !metadata.is_empty() {
            object.insert("metadata".to_string(), Json::Object(metadata));
        }
        Json::Object(object)
    }

    /// Wrap a flat record as `{type, api_version, metadata, spec}`.
    pub fn wrap(&self, flat: &Json) -> Json {
        let mut spec = flat.as_object().cloned().unwrap_or_default();
        let metadata = spec.remove("metadata");

        let mut wrapped = Map::new();
        wrapped.insert("type".to_string(), json!(self.kind));
        wrapped.insert("api_version".to_string(), json!(self.api_version));
        if let Some(metadata) = metadata {
            wrapped.insert("metadata".to_string(), metadata);
        }
        wrapped.insert("spec".to_string(), Json::Object(spec));
        Json::Object(wrapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static PROPS: &[PropertySpec] = &[
        PropertySpec::new("command", PropertyKind::Str).required(),
        PropertySpec::new("interval", PropertyKind::Int),
        PropertySpec::new("cron", PropertyKind::Str),
        PropertySpec::new("publish", PropertyKind::Bool).default_value(DefaultValue::Bool(true)),
        PropertySpec::new("subscriptions", PropertyKind::StrList),
        PropertySpec::new("token", PropertyKind::Str).write_only(),
        LABELS,
        ANNOTATIONS,
    ];

    static WIDGET: Descriptor = Descriptor {
        requires_one_of: &["interval", "cron"],
        ..Descriptor::namespaced("widget", "Widget", "widgets", "widget", PROPS)
    };

    static GLOBAL: Descriptor = Descriptor::cluster("global_widget", "GlobalWidget", "globals", "global", PROPS);

    static MEMBERSHIP: Descriptor = Descriptor {
        key_attribute: "subscription",
        parent_attribute: Some("entity"),
        title_patterns: &[
            r"^(?P<subscription>\S+) on (?P<entity>\S+) in (?P<namespace>\S+)$",
            r"^(?P<subscription>\S+) on (?P<entity>\S+)$",
            r"^(?P<subscription>(?s:.+))$",
        ],
        ..Descriptor::namespaced("membership", "Membership", "members", "member", &[])
    };

    fn input(pairs: &[(&str, Json)]) -> BTreeMap<String, Json> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    fn valid() -> BTreeMap<String, Json> {
        input(&[("command", json!("true")), ("interval", json!(60))])
    }

    #[test]
    fn test_title_with_namespace() {
        let declared = WIDGET.declare("test in dev", Ensure::Present, &valid()).unwrap();
        assert_eq!(declared.instance.key.name, "test");
        assert_eq!(declared.instance.key.namespace.as_deref(), Some("dev"));
    }

    #[test]
    fn test_plain_title_gets_default_namespace() {
        let declared = WIDGET.declare("test", Ensure::Present, &valid()).unwrap();
        assert_eq!(declared.instance.key.name, "test");
        assert_eq!(declared.instance.key.namespace.as_deref(), Some("default"));
    }

    #[test]
    fn test_explicit_parameters_win_over_title() {
        let mut params = valid();
        params.insert("namespace".into(), json!("test"));
        params.insert("resource_name".into(), json!("other"));
        let declared = WIDGET.declare("foo in qa", Ensure::Present, &params).unwrap();
        assert_eq!(declared.instance.key.name, "other");
        assert_eq!(declared.instance.key.namespace.as_deref(), Some("test"));
    }

    #[test]
    fn test_composite_title() {
        let declared = MEMBERSHIP
            .declare("test on agent in dev", Ensure::Present, &BTreeMap::new())
            .unwrap();
        let key = &declared.instance.key;
        assert_eq!(key.name, "test");
        assert_eq!(key.parent.as_deref(), Some("agent"));
        assert_eq!(key.namespace.as_deref(), Some("dev"));

        let declared = MEMBERSHIP
            .declare("test", Ensure::Present, &input(&[("entity", json!("agent"))]))
            .unwrap();
        assert_eq!(declared.instance.key.parent.as_deref(), Some("agent"));
        assert_eq!(declared.instance.key.namespace.as_deref(), Some("default"));
    }

    #[test]
    fn test_parent_required_for_both_ensure_values() {
        for ensure in [Ensure::Present, Ensure::Absent] {
            let err = MEMBERSHIP.declare("test", ensure, &BTreeMap::new()).unwrap_err();
            assert_eq!(err.to_string(), "entity is required");
        }
    }

    #[test]
    fn test_required_only_when_present() {
        let err = WIDGET
            .declare("test", Ensure::Present, &input(&[("interval", json!(10))]))
            .unwrap_err();
        assert_eq!(err.to_string(), "command is required");

        assert!(WIDGET.declare("test", Ensure::Absent, &BTreeMap::new()).is_ok());
    }

    #[test]
    fn test_requires_one_of() {
        let err = WIDGET
            .declare("test", Ensure::Present, &input(&[("command", json!("true"))]))
            .unwrap_err();
        assert_eq!(err.to_string(), "one of interval, cron is required");
    }

    #[test]
    fn test_unknown_property_and_bad_name() {
        let mut params = valid();
        params.insert("colour".into(), json!("red"));
        assert!(matches!(
            WIDGET.declare("test", Ensure::Present, &params),
            Err(ValidationError::UnknownProperty { .. })
        ));

        assert!(matches!(
            WIDGET.declare("has/slash", Ensure::Present, &valid()),
            Err(ValidationError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_cluster_type_rejects_namespace() {
        let mut params = valid();
        params.insert("namespace".into(), json!("dev"));
        assert!(matches!(
            GLOBAL.declare("test", Ensure::Present, &params),
            Err(ValidationError::NamespaceNotAllowed { .. })
        ));

        let declared = GLOBAL.declare("test in dev", Ensure::Absent, &BTreeMap::new());
        assert!(matches!(declared, Err(ValidationError::InvalidName { .. })));
    }

    #[test]
    fn test_defaults_fill_unset() {
        let declared = WIDGET.declare("test", Ensure::Present, &valid()).unwrap();
        assert_eq!(declared.instance.get("publish"), Some(&Value::Bool(true)));

        let mut params = valid();
        params.insert("publish".into(), json!("false"));
        let declared = WIDGET.declare("test", Ensure::Present, &params).unwrap();
        assert_eq!(declared.instance.get("publish"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_normalize_flat_record() {
        let raw = json!({
            "command": "check-cpu.sh",
            "interval": 60,
            "publish": true,
            "cron": null,
            "proxy_requests": {"entity_attributes": []},
            "metadata": {"name": "cpu", "namespace": "dev", "labels": {"team": "ops"}, "created_by": "admin"},
        });
        let instance = WIDGET.normalize(&raw, None).unwrap();

        assert_eq!(instance.key.name, "cpu");
        assert_eq!(instance.key.namespace.as_deref(), Some("dev"));
        assert_eq!(instance.get("publish"), Some(&Value::Bool(true)));
        assert_eq!(instance.get("interval"), Some(&Value::Int(60)));
        assert!(instance.get("cron").is_none());
        assert!(instance.get("proxy_requests").is_none());
        assert!(instance.get("labels").is_some());
        assert!(instance.get("created_by").is_none());
    }

    #[test]
    fn test_normalize_wrapped_record_with_type_tag() {
        static TAGGED: Descriptor = Descriptor {
            envelope: Envelope::Wrapped,
            shared_collection: true,
            ..Descriptor::cluster("ad", "ad", "authproviders", "auth", PROPS)
        };
        let ours = json!({"type": "ad", "api_version": "authentication/v2",
            "metadata": {"name": "corp"}, "spec": {"command": "x"}});
        let theirs = json!({"type": "ldap", "api_version": "authentication/v2",
            "metadata": {"name": "corp"}, "spec": {"command": "x"}});

        let instance = TAGGED.normalize(&ours, None).unwrap();
        assert_eq!(instance.key.name, "corp");
        assert_eq!(instance.get("command"), Some(&Value::Str("x".into())));
        assert!(TAGGED.normalize(&theirs, None).is_none());
    }

    #[test]
    fn test_normalize_denormalize_round_trip() {
        let mut params = valid();
        params.insert("subscriptions".into(), json!(["linux", "web"]));
        params.insert("labels".into(), json!({"team": "ops"}));
        params.insert("cron".into(), json!("absent"));
        params.insert("token".into(), json!("secret"));
        let declared = WIDGET.declare("cpu in dev", Ensure::Present, &params).unwrap();

        let record = WIDGET.denormalize(&declared.instance);
        assert!(record.get("cron").is_none());
        assert_eq!(record["token"], "secret");
        assert_eq!(record["metadata"]["labels"]["team"], "ops");

        let back = WIDGET.normalize(&record, None).unwrap();
        let mut expected = declared.instance.clone();
        expected.attributes.remove("cron");
        expected.attributes.remove("token");
        assert_eq!(back, expected);
    }

    #[test]
    fn test_wrap_moves_fields_into_spec() {
        let declared = WIDGET.declare("cpu", Ensure::Present, &valid()).unwrap();
        let wrapped = WIDGET.wrap(&WIDGET.denormalize(&declared.instance));

        assert_eq!(wrapped["type"], "Widget");
        assert_eq!(wrapped["api_version"], "core/v2");
        assert_eq!(wrapped["metadata"]["name"], "cpu");
        assert_eq!(wrapped["spec"]["command"], "true");
        assert!(wrapped["spec"].get("metadata").is_none());

        let flat = WIDGET.unwrap_record(&wrapped).unwrap();
        assert_eq!(flat["interval"], 60);
    }

    #[test]
    fn test_top_level_name_field() {
        static ACCOUNT: Descriptor = Descriptor {
            name_field: NameField::Field("username"),
            ..Descriptor::cluster("account", "User", "users", "user", &[])
        };
        let declared = ACCOUNT.declare("alice", Ensure::Present, &BTreeMap::new()).unwrap();
        let record = ACCOUNT.denormalize(&declared.instance);
        assert_eq!(record, json!({"username": "alice"}));
        assert_eq!(ACCOUNT.normalize(&record, None).unwrap().key.name, "alice");
    }
    #[test]
    fn test_namespace_and_parent_must_be_valid_names() {
        let mut params = valid();
        params.insert("namespace".into(), json!("../etc"));
        assert_eq!(
            WIDGET.declare("cpu", Ensure::Present, &params).unwrap_err(),
            ValidationError::InvalidNamespace("../etc".to_string())
        );
        assert!(matches!(
            WIDGET.declare("cpu in a/b", Ensure::Present, &valid()),
            Err(ValidationError::InvalidNamespace(_))
        ));
        assert!(matches!(
            MEMBERSHIP.declare("test on a/b", Ensure::Present, &BTreeMap::new()),
            Err(ValidationError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_reserved_prefix() {
        static TAGS: Descriptor = Descriptor {
            name_pattern: r"^[\w.\-:]+$",
            reserved_prefixes: &["entity:"],
            ..Descriptor::namespaced("tag", "Tag", "tags", "tag", &[])
        };
        assert!(TAGS.declare("roundrobin:web", Ensure::Present, &BTreeMap::new()).is_ok());
        assert_eq!(
            TAGS.declare("entity:agent", Ensure::Absent, &BTreeMap::new()).unwrap_err(),
            ValidationError::ReservedName {
                type_name: "tag",
                name: "entity:agent".to_string(),
            }
        );
    }

    #[test]
    fn test_derived_name() {
        static SILENCE_PROPS: &[PropertySpec] = &[
            PropertySpec::new("check", PropertyKind::Str),
            PropertySpec::new("subscription", PropertyKind::Str),
        ];
        fn silence_name(attributes: &BTreeMap<String, Value>) -> Option<String> {
            let part = |p: &str| match attributes.get(p) {
                Some(Value::Str(s)) => s.clone(),
                _ => "*".to_string(),
            };
            (attributes.contains_key("check") || attributes.contains_key("subscription"))
                .then(|| format!("{}:{}", part("subscription"), part("check")))
        }
        static SILENCE: Descriptor = Descriptor {
            name_pattern: r"^[\w.\-*:]+$",
            derive_name: Some(silence_name),
            ..Descriptor::namespaced("silence", "Silenced", "silenced", "silenced", SILENCE_PROPS)
        };

        let declared = SILENCE
            .declare("quiet in dev", Ensure::Present, &input(&[("subscription", json!("linux"))]))
            .unwrap();
        assert_eq!(declared.instance.key.name, "linux:*");
        assert_eq!(declared.instance.key.namespace.as_deref(), Some("dev"));

        let declared = SILENCE.declare("linux:cpu", Ensure::Absent, &BTreeMap::new()).unwrap();
        assert_eq!(declared.instance.key.name, "linux:cpu");

        let params = input(&[("check", json!("cpu")), ("resource_name", json!("custom"))]);
        let declared = SILENCE.declare("quiet", Ensure::Present, &params).unwrap();
        assert_eq!(declared.instance.key.name, "custom");
    }

    #[test]
    fn test_parse_ensure_uses_present_verb() {
        static ALERT: Descriptor = Descriptor {
            present_verb: "resolve",
            ..Descriptor::namespaced("alert", "Event", "events", "event", &[])
        };
        assert_eq!(ALERT.parse_ensure("resolve").unwrap(), Ensure::Present);
        assert_eq!(ALERT.parse_ensure(":absent").unwrap(), Ensure::Absent);
        assert_eq!(
            ALERT.parse_ensure("present").unwrap_err().to_string(),
            "invalid ensure value 'present' (expected resolve or absent)"
        );
        assert_eq!(WIDGET.parse_ensure("present").unwrap(), Ensure::Present);
    }

    #[test]
    fn test_disabled_records_are_not_found() {
        static ACCOUNT: Descriptor = Descriptor {
            name_field: NameField::Field("username"),
            disabled_flag: Some("disabled"),
            ..Descriptor::cluster("account", "User", "users", "user", &[])
        };
        assert!(ACCOUNT.normalize(&json!({"username": "alice", "disabled": true}), None).is_none());
        assert!(ACCOUNT.normalize(&json!({"username": "alice", "disabled": false}), None).is_some());
        assert!(ACCOUNT.normalize(&json!({"username": "alice"}), None).is_some());
    }

    #[test]
    fn test_patterns_are_compiled_once() {
        WIDGET.declare("cpu", Ensure::Present, &valid()).unwrap();
        let first = compiled(DEFAULT_NAME_PATTERN).unwrap();
        let cache = PATTERNS.lock().unwrap();
        assert!(cache.contains_key(NAMESPACED_TITLES[0]));
        assert_eq!(cache[DEFAULT_NAME_PATTERN].as_str(), first.as_str());
    }
}
