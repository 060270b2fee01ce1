//! Runtime Value Model
//!
//! Closed tagged union threaded through path resolution and the
//! transformation pipeline. Context data arrives as JSON and is converted
//! once at the lookup boundary; every later step matches exhaustively on
//! [`Value`] instead of probing types at runtime.
//!
//! # Components
//!
//! - [`Value`]: the value type itself, with JSON conversions and serialization
//! - [`coerce`]: string/number/date coercions shared by the transformations

pub mod coerce;

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

pub use coerce::{format_number, parse_date, parse_float};

/// A value addressed by a path or produced by a transformation.
///
/// `Undefined` is the "unresolved" marker: it is never produced from JSON
/// input, only by failed lookups or transformations that yield nothing
/// (e.g. `first` on an empty array).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Returns true for the unresolved marker.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Returns true for `null` or undefined.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Looks up a key on an object value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Short type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Stringifies a value for substitution into template text.
    ///
    /// Primitives use their natural form, dates use ISO-8601, and arrays or
    /// objects are serialized as JSON (falling back to `[Object]`).
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Date(d) => iso_string(d),
            Value::Array(_) | Value::Object(_) => {
                serde_json::to_string(self).unwrap_or_else(|_| "[Object]".to_string())
            }
        }
    }

    /// Plain string coercion, as used by the `string`, `join` and encoding
    /// transformations.
    ///
    /// Arrays join their elements with `,` (null and undefined elements
    /// become empty), objects become `[object Object]`.
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Undefined | Value::Null => String::new(),
                    other => other.to_js_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
            other => other.to_display_string(),
        }
    }

    /// Numeric coercion. Unparseable input yields `NaN`.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => coerce::string_to_number(s),
            Value::Date(d) => d.timestamp_millis() as f64,
            Value::Array(_) => coerce::string_to_number(&self.to_js_string()),
            Value::Object(_) => f64::NAN,
        }
    }
}

/// Formats a date the way substituted output expects (`2024-01-15T10:30:00.000Z`).
pub fn iso_string(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from(&json)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Serializes with JSON.stringify rules: non-finite numbers become `null`,
/// undefined object members are dropped and undefined array items become
/// `null`.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => serialize_number(*n, serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Date(d) => serializer.serialize_str(&iso_string(d)),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(map) => {
                let defined: Vec<_> = map.iter().filter(|(_, v)| !v.is_undefined()).collect();
                let mut out = serializer.serialize_map(Some(defined.len()))?;
                for (key, value) in defined {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

/// Largest integer an f64 represents exactly (2^53).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

fn serialize_number<S: Serializer>(n: f64, serializer: S) -> Result<S::Ok, S::Error> {
    if !n.is_finite() {
        serializer.serialize_unit()
    } else if n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER {
        serializer.serialize_i64(n as i64)
    } else {
        serializer.serialize_f64(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_from_json_nested() {
        let value = Value::from(json!({"a": [1, "x", null], "b": true}));
        let Value::Object(map) = value else {
            panic!("expected object");
        };
        assert_eq!(
            map["a"],
            Value::Array(vec![
                Value::Number(1.0),
                Value::String("x".into()),
                Value::Null
            ])
        );
        assert_eq!(map["b"], Value::Bool(true));
    }

    #[test]
    fn test_display_string_primitives() {
        assert_eq!(Value::Undefined.to_display_string(), "undefined");
        assert_eq!(Value::Null.to_display_string(), "null");
        assert_eq!(Value::Bool(false).to_display_string(), "false");
        assert_eq!(Value::Number(42.0).to_display_string(), "42");
        assert_eq!(Value::Number(2.5).to_display_string(), "2.5");
        assert_eq!(Value::Number(f64::NAN).to_display_string(), "NaN");
    }

    #[test]
    fn test_display_string_composites_are_json() {
        let value = Value::from(json!({"name": "Ada", "tags": ["x", 1]}));
        assert_eq!(value.to_display_string(), r#"{"name":"Ada","tags":["x",1]}"#);
    }

    #[test]
    fn test_display_string_date_is_iso() {
        let date = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(
            Value::Date(date).to_display_string(),
            "2024-01-15T10:30:00.000Z"
        );
    }

    #[test]
    fn test_serialize_drops_undefined_members() {
        let mut map = BTreeMap::new();
        map.insert("gone".to_string(), Value::Undefined);
        map.insert("kept".to_string(), Value::Number(1.0));
        map.insert("nan".to_string(), Value::Number(f64::NAN));
        let json = serde_json::to_string(&Value::Object(map)).unwrap();
        assert_eq!(json, r#"{"kept":1,"nan":null}"#);

        let array = Value::Array(vec![Value::Undefined, Value::Number(0.5)]);
        assert_eq!(serde_json::to_string(&array).unwrap(), "[null,0.5]");
    }

    #[test]
    fn test_js_string_arrays_and_objects() {
        let value = Value::from(json!(["a", null, 3]));
        assert_eq!(value.to_js_string(), "a,,3");
        assert_eq!(Value::from(json!({"a": 1})).to_js_string(), "[object Object]");
    }

    #[test]
    fn test_to_number() {
        assert_eq!(Value::from(" 12 ").to_number(), 12.0);
        assert_eq!(Value::from("").to_number(), 0.0);
        assert!(Value::from("12abc").to_number().is_nan());
        assert_eq!(Value::Bool(true).to_number(), 1.0);
        assert_eq!(Value::Null.to_number(), 0.0);
        assert!(Value::Undefined.to_number().is_nan());
        assert_eq!(Value::from(json!([7])).to_number(), 7.0);
        assert!(Value::from(json!({})).to_number().is_nan());
    }

    #[test]
    fn test_type_name_and_accessors() {
        let value = Value::from(json!({"k": "v"}));
        assert_eq!(value.type_name(), "object");
        assert_eq!(value.get("k").and_then(Value::as_str), Some("v"));
        assert!(value.get("missing").is_none());
        assert!(Value::Null.is_nullish());
        assert!(!Value::from("").is_nullish());
    }
}
