//! Property values and their coercion rules.
//!
//! Declared input and backend records are both JSON, but they are read with
//! different strictness: declared input is validated and coerced
//! ([`PropertyKind::coerce`]), while backend records are read leniently
//! ([`PropertyKind::from_api`]) so an unexpected field never aborts a run.

use crate::error::ValidationError;
use serde_json::{Map, Value as Json};
use std::fmt;

/// Accepted spellings of a boolean in declared input.
const BOOL_TRUE: &[&str] = &["true", ":true"];
const BOOL_FALSE: &[&str] = &["false", ":false"];

/// Value of one property.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicitly unset. Matches a missing field; clears the field on update.
    Absent,
    Bool(bool),
    Int(i64),
    Str(String),
    /// Member of an enumerated set
    Enum(String),
    /// Array of scalars or of objects
    List(Vec<Json>),
    /// Nested object
    Map(Map<String, Json>),
}

impl Value {
    /// Whether this is the absent marker.
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    /// Text of a string or enum value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// Items of a string list; non-string items are skipped.
    pub fn as_str_list(&self) -> Option<Vec<String>> {
        match self {
            Value::List(items) => Some(
                items
                    .iter()
                    .filter_map(Json::as_str)
                    .map(str::to_string)
                    .collect(),
            ),
            _ => None,
        }
    }

    /// JSON form sent to the backend. `Absent` becomes `null`.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Absent => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Str(s) | Value::Enum(s) => Json::String(s.clone()),
            Value::List(items) => Json::Array(items.clone()),
            Value::Map(map) => Json::Object(map.clone()),
        }
    }

    /// Whether the current value satisfies this desired value.
    ///
    /// `Absent` matches a missing value. Lists and maps compare as JSON with
    /// `null` members treated as missing; list order matters.
    pub fn in_sync(&self, current: Option<&Value>) -> bool {
        match (self, current) {
            (Value::Absent, None | Some(Value::Absent)) => true,
            (_, None) => false,
            (Value::List(_) | Value::Map(_), Some(current)) => {
                strip_nulls(&self.to_json()) == strip_nulls(&current.to_json())
            }
            (desired, Some(current)) => desired == current,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Absent => write!(f, "absent"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Str(s) => write!(f, "\"{s}\""),
            Value::Enum(s) => write!(f, "{s}"),
            Value::List(_) | Value::Map(_) => write!(f, "{}", self.to_json()),
        }
    }
}

/// Recursively drop object members whose value is `null`.
pub fn strip_nulls(value: &Json) -> Json {
    match value {
        Json::Object(map) => Json::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), strip_nulls(v)))
                .collect(),
        ),
        Json::Array(items) => Json::Array(items.iter().map(strip_nulls).collect()),
        other => other.clone(),
    }
}

/// Shape of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Str,
    Bool,
    Int,
    StrList,
    ObjectList,
    Map,
    Enum(&'static [&'static str]),
}

fn display_input(input: &Json) -> String {
    match input {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl PropertyKind {
    /// Human-readable shape, used in error messages.
    pub fn expected(&self) -> &'static str {
        match self {
            PropertyKind::Str => "a String",
            PropertyKind::Bool => "a Boolean",
            PropertyKind::Int => "an Integer",
            PropertyKind::StrList => "an Array of Strings",
            PropertyKind::ObjectList => "an Array of Hashes",
            PropertyKind::Map => "a Hash",
            PropertyKind::Enum(_) => "one of the allowed values",
        }
    }

    fn wrong_kind(&self, property: &str) -> ValidationError {
        ValidationError::WrongKind {
            property: property.to_string(),
            expected: self.expected(),
        }
    }

    /// Validate and coerce a declared value.
    ///
    /// The string `"absent"` is accepted for every kind and yields
    /// [`Value::Absent`].
    pub fn coerce(&self, property: &str, input: &Json) -> Result<Value, ValidationError> {
        if input.as_str() == Some("absent") {
            return Ok(Value::Absent);
        }

        match (self, input) {
            (PropertyKind::Str, Json::String(s)) => Ok(Value::Str(s.clone())),

            (PropertyKind::Bool, Json::Bool(b)) => Ok(Value::Bool(*b)),
            (PropertyKind::Bool, Json::String(s)) if BOOL_TRUE.contains(&s.as_str()) => {
                Ok(Value::Bool(true))
            }
            (PropertyKind::Bool, Json::String(s)) if BOOL_FALSE.contains(&s.as_str()) => {
                Ok(Value::Bool(false))
            }
            (PropertyKind::Bool, other) => Err(ValidationError::InvalidValue {
                property: property.to_string(),
                value: display_input(other),
                valid: "true, false".to_string(),
            }),

            (PropertyKind::Int, Json::Number(n)) => {
                n.as_i64().map(Value::Int).ok_or_else(|| self.wrong_kind(property))
            }
            (PropertyKind::Int, Json::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| self.wrong_kind(property)),

            (PropertyKind::StrList, Json::String(s)) => Ok(Value::List(vec![Json::String(s.clone())])),
            (PropertyKind::StrList, Json::Array(items)) if items.iter().all(Json::is_string) => {
                Ok(Value::List(items.clone()))
            }

            (PropertyKind::ObjectList, Json::Object(_)) => Ok(Value::List(vec![input.clone()])),
            (PropertyKind::ObjectList, Json::Array(items)) if items.iter().all(Json::is_object) => {
                Ok(Value::List(items.clone()))
            }

            (PropertyKind::Map, Json::Object(map)) => Ok(Value::Map(map.clone())),

            (PropertyKind::Enum(valid), Json::String(s)) => {
                let symbol = s.trim_start_matches(':');
                if valid.contains(&symbol) {
                    Ok(Value::Enum(symbol.to_string()))
                } else {
                    Err(ValidationError::InvalidValue {
                        property: property.to_string(),
                        value: s.clone(),
                        valid: valid.join(", "),
                    })
                }
            }
            (PropertyKind::Enum(valid), other) => Err(ValidationError::InvalidValue {
                property: property.to_string(),
                value: display_input(other),
                valid: valid.join(", "),
            }),

            _ => Err(self.wrong_kind(property)),
        }
    }

    /// Read a value from a backend record.
    ///
    /// `null` means unset. JSON booleans always become [`Value::Bool`].
    /// Values of an unexpected shape are dropped.
    pub fn from_api(&self, input: &Json) -> Option<Value> {
        match (self, input) {
            (_, Json::Null) => None,
            (_, Json::Bool(b)) => Some(Value::Bool(*b)),
            (PropertyKind::Str, Json::String(s)) => Some(Value::Str(s.clone())),
            (PropertyKind::Enum(_), Json::String(s)) => Some(Value::Enum(s.clone())),
            (PropertyKind::Int, Json::Number(n)) => n.as_i64().map(Value::Int),
            (PropertyKind::StrList | PropertyKind::ObjectList, Json::Array(items)) => {
                Some(Value::List(items.clone()))
            }
            (PropertyKind::Map, Json::Object(map)) => Some(Value::Map(map.clone())),
            _ => None,
        }
    }
}
