//! Deserializers that only accept records in map form.
//!
//! serde's derived struct visitors also accept positional sequences, so a
//! unit cell could arrive as `[10, 10, 10, 90, 90, 90]`. Record-typed fields
//! route through these helpers instead, which require a JSON object.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn from_object<T, E>(value: Value) -> Result<T, E>
where
    T: DeserializeOwned,
    E: serde::de::Error,
{
    if !value.is_object() {
        return Err(E::custom(format!(
            "expected a record given as a map, found {}",
            describe(&value)
        )));
    }
    T::deserialize(value).map_err(E::custom)
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a map",
    }
}

/// A single record.
pub fn record<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    from_object(Value::deserialize(deserializer)?)
}

/// An optional record; `null` maps to `None`.
pub fn optional_record<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        value => from_object(value).map(Some),
    }
}

/// A sequence of records. `null` and a lone record are both rejected.
pub fn records<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => items.into_iter().map(from_object).collect(),
        other => Err(D::Error::custom(format!(
            "expected a sequence of records, found {}",
            describe(&other)
        ))),
    }
}
