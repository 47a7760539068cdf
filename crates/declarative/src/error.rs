//! Validation errors raised before any backend call.

use thiserror::Error;

/// A declared resource is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Value outside an enumerated set (booleans included)
    #[error("Invalid value \"{value}\". Valid values are {valid}")]
    InvalidValue {
        property: String,
        value: String,
        valid: String,
    },

    /// Value of the wrong shape
    #[error("{property} should be {expected}")]
    WrongKind {
        property: String,
        expected: &'static str,
    },

    #[error("{type_name} has no property '{property}'")]
    UnknownProperty {
        type_name: &'static str,
        property: String,
    },

    #[error("{property} is required")]
    MissingRequired { property: String },

    #[error("one of {properties} is required")]
    MissingOneOf { properties: String },

    #[error("{type_name} name '{name}' is invalid")]
    InvalidName {
        type_name: &'static str,
        name: String,
    },

    #[error("{type_name} name '{name}' is reserved for the backend")]
    ReservedName {
        type_name: &'static str,
        name: String,
    },

    #[error("namespace '{0}' is invalid")]
    InvalidNamespace(String),

    #[error("{type_name} is cluster-scoped and does not take a namespace")]
    NamespaceNotAllowed { type_name: &'static str },

    #[error("title '{title}' does not match any title pattern of {type_name}")]
    UnparsableTitle {
        type_name: &'static str,
        title: String,
    },

    #[error("invalid title pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("unknown resource type '{0}'")]
    UnknownType(String),

    #[error("unknown provider '{0}' (expected sensu_api or sensuctl)")]
    UnknownProvider(String),

    #[error("invalid ensure value '{value}' (expected {present} or absent)")]
    InvalidEnsure { value: String, present: &'static str },

    #[error("{0} is declared more than once")]
    Duplicate(String),
}
