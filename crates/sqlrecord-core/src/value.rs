//! Dynamic SQL values.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, TypeError};

/// One SQL cell.
///
/// Column values of a record, bound statement parameters and fetched
/// result cells are all carried as `Value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,

    Bool(bool),

    Int(i64),

    Float(f64),

    Text(String),

    Bytes(Vec<u8>),

    /// Structured JSON value (nested relation payloads, JSON columns)
    Json(serde_json::Value),

    /// Array of values, bound as a parenthesized list (`IN (...)`)
    Array(Vec<Value>),
}

impl Value {
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// JSON and arrays; these are never coerced to a column type.
    pub const fn is_structured(&self) -> bool {
        matches!(self, Value::Json(_) | Value::Array(_))
    }

    /// SQL-ish name of the variant, used in type errors.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Int(_) => "INTEGER",
            Value::Float(_) => "FLOAT",
            Value::Text(_) => "TEXT",
            Value::Bytes(_) => "BLOB",
            Value::Json(_) => "JSON",
            Value::Array(_) => "ARRAY",
        }
    }

    /// Whether this value counts as an absent primary key.
    ///
    /// Null, `false`, `0`, `0.0` and the empty string are empty. The
    /// string `"0"` is a valid key.
    pub fn is_empty_key(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !*b,
            Value::Int(v) => *v == 0,
            Value::Float(v) => *v == 0.0,
            Value::Text(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::Json(j) => j.is_null(),
            Value::Array(a) => a.is_empty(),
        }
    }

    /// Integers read as booleans too.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bool(v) => Some(i64::from(*v)),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Convert into a JSON value.
    ///
    /// Bytes are rendered as an array of numbers.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(v) => serde_json::Value::from(*v),
            Value::Float(v) => serde_json::Number::from_f64(*v)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::Array(
                b.iter().map(|byte| serde_json::Value::from(*byte)).collect(),
            ),
            Value::Json(j) => j.clone(),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
        }
    }

    /// Convert a JSON scalar into the matching value.
    ///
    /// Objects stay structured (`Value::Json`); arrays become `Value::Array`.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .or_else(|| n.as_f64().map(Value::Float))
                .unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            object @ serde_json::Value::Object(_) => Value::Json(object),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", if *b { "1" } else { "0" }),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Bytes(b) => write!(f, "[BLOB: {} bytes]", b.len()),
            Value::Json(j) => write!(f, "{j}"),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl From<&Value> for Value {
    fn from(v: &Value) -> Self {
        v.clone()
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Vec<i64>> for Value {
    fn from(items: Vec<i64>) -> Self {
        Value::Array(items.into_iter().map(Value::Int).collect())
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::Array(items.into_iter().map(Value::Text).collect())
    }
}

impl TryFrom<Value> for bool {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_bool().ok_or_else(|| type_error("bool", &value))
    }
}

impl TryFrom<Value> for i64 {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Int(v) => Ok(v),
            Value::Bool(v) => Ok(i64::from(v)),
            other => Err(type_error("i64", &other)),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Int(v) => Ok(v as f64),
            other => Err(type_error("f64", &other)),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Text(v) => Ok(v),
            other => Err(type_error("String", &other)),
        }
    }
}

/// `Null` extracts as `None`.
impl<T> TryFrom<Value> for Option<T>
where
    T: TryFrom<Value, Error = Error>,
{
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(None),
            v => T::try_from(v).map(Some),
        }
    }
}

fn type_error(expected: &'static str, actual: &Value) -> Error {
    Error::Type(TypeError {
        expected,
        actual: actual.type_name().to_string(),
        column: None,
        rust_type: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_rules() {
        assert!(Value::Null.is_empty_key());
        assert!(Value::Int(0).is_empty_key());
        assert!(Value::Text(String::new()).is_empty_key());
        assert!(!Value::Text("0".to_string()).is_empty_key());
        assert!(!Value::Int(7).is_empty_key());
    }

    #[test]
    fn json_conversion_keeps_objects_structured() {
        let json = serde_json::json!({"name": "x"});
        assert_eq!(Value::from_json(json.clone()), Value::Json(json));
        assert_eq!(Value::from_json(serde_json::json!(3)), Value::Int(3));
        assert_eq!(
            Value::from_json(serde_json::json!([1, "a"])),
            Value::Array(vec![Value::Int(1), Value::Text("a".to_string())])
        );
    }

    #[test]
    fn option_and_vec_conversions() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::Text("a".to_string()));
        assert_eq!(
            Value::from(vec![1_i64, 2]),
            Value::Array(vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!(Value::from(vec![0_u8, 1]), Value::Bytes(vec![0, 1]));
    }

    #[test]
    fn try_from_reports_type_name() {
        let err = i64::try_from(Value::Text("x".to_string())).unwrap_err();
        assert!(err.to_string().contains("TEXT"));
        assert_eq!(Option::<i64>::try_from(Value::Null).unwrap(), None);
    }
}
