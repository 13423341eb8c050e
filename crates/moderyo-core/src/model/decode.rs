//! Coercion helpers for decoding the heterogeneous wire payload.
//!
//! The service emits optional, nested and loosely-typed JSON; these helpers
//! make every decode total over partial input. Missing keys (and `null`
//! values, which the service uses interchangeably with absence) yield the
//! caller's default. A present value that cannot be coerced to the expected
//! primitive is a [`Error::Decode`].

use serde_json::{Map, Value};

use crate::error::Error;

pub(crate) type JsonMap = Map<String, Value>;

pub(crate) fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a JsonMap, Error> {
    value
        .as_object()
        .ok_or_else(|| Error::Decode(format!("expected {what} to be a JSON object")))
}

/// Look up a key, treating `null` as absent.
pub(crate) fn field<'a>(map: &'a JsonMap, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|value| !value.is_null())
}

pub(crate) fn f64_or(map: &JsonMap, key: &str, default: f64) -> Result<f64, Error> {
    field(map, key).map_or(Ok(default), |value| coerce_f64(value, key))
}

pub(crate) fn opt_f64(map: &JsonMap, key: &str) -> Result<Option<f64>, Error> {
    field(map, key).map(|value| coerce_f64(value, key)).transpose()
}

pub(crate) fn opt_i64(map: &JsonMap, key: &str) -> Result<Option<i64>, Error> {
    field(map, key).map(|value| coerce_i64(value, key)).transpose()
}

pub(crate) fn str_or(map: &JsonMap, key: &str, default: &str) -> Result<String, Error> {
    field(map, key).map_or_else(|| Ok(default.to_string()), |value| coerce_string(value, key))
}

pub(crate) fn opt_str(map: &JsonMap, key: &str) -> Result<Option<String>, Error> {
    field(map, key).map(|value| coerce_string(value, key)).transpose()
}

pub(crate) fn bool_or(map: &JsonMap, key: &str, default: bool) -> Result<bool, Error> {
    field(map, key).map_or(Ok(default), |value| coerce_bool(value, key))
}

/// A list-valued field whose elements must be objects. Absent means empty.
pub(crate) fn object_items<'a>(map: &'a JsonMap, key: &str) -> Result<Vec<&'a JsonMap>, Error> {
    let Some(value) = field(map, key) else {
        return Ok(Vec::new());
    };
    let items = value
        .as_array()
        .ok_or_else(|| Error::Decode(format!("expected `{key}` to be a list")))?;
    items
        .iter()
        .map(|item| as_object(item, &format!("`{key}` entry")))
        .collect()
}

pub(crate) fn opt_object<'a>(map: &'a JsonMap, key: &str) -> Result<Option<&'a JsonMap>, Error> {
    field(map, key)
        .map(|value| as_object(value, &format!("`{key}`")))
        .transpose()
}

fn coerce_f64(value: &Value, key: &str) -> Result<f64, Error> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| Error::Decode(format!("`{key}` is out of range for a float"))),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::Decode(format!("expected a number for `{key}`, got `{s}`"))),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => Err(Error::Decode(format!(
            "expected a number for `{key}`, got {}",
            type_name(other)
        ))),
    }
}

fn coerce_i64(value: &Value, key: &str) -> Result<i64, Error> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| Error::Decode(format!("`{key}` is out of range for an integer"))),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .or_else(|_| trimmed.parse::<f64>().map(|f| f as i64))
                .map_err(|_| Error::Decode(format!("expected an integer for `{key}`, got `{s}`")))
        }
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(Error::Decode(format!(
            "expected an integer for `{key}`, got {}",
            type_name(other)
        ))),
    }
}

fn coerce_string(value: &Value, key: &str) -> Result<String, Error> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(Error::Decode(format!(
            "expected a string for `{key}`, got {}",
            type_name(other)
        ))),
    }
}

/// Truthiness coercion: the service emits `true`/`1`/`"true"` interchangeably
/// for flag fields.
fn coerce_bool(value: &Value, key: &str) -> Result<bool, Error> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => Ok(!s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false")),
        other => Err(Error::Decode(format!(
            "expected a boolean for `{key}`, got {}",
            type_name(other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> JsonMap {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn null_counts_as_absent() {
        let data = map(json!({ "score": null }));
        assert_eq!(f64_or(&data, "score", 0.25).unwrap(), 0.25);
        assert_eq!(opt_f64(&data, "score").unwrap(), None);
    }

    #[test]
    fn numeric_strings_coerce_to_floats() {
        let data = map(json!({ "score": "0.75" }));
        assert_eq!(f64_or(&data, "score", 0.0).unwrap(), 0.75);
    }

    #[test]
    fn non_numeric_string_is_a_decode_error() {
        let data = map(json!({ "score": "high" }));
        let err = f64_or(&data, "score", 0.0).unwrap_err();
        assert!(matches!(err, Error::Decode(ref msg) if msg.contains("score")));
    }

    #[test]
    fn numbers_coerce_to_strings() {
        let data = map(json!({ "id": 42 }));
        assert_eq!(str_or(&data, "id", "").unwrap(), "42");
    }

    #[test]
    fn objects_do_not_coerce_to_strings() {
        let data = map(json!({ "id": {} }));
        assert!(str_or(&data, "id", "").is_err());
    }

    #[test]
    fn truthiness_matches_wire_conventions() {
        let data = map(json!({
            "a": true, "b": 1, "c": "yes", "d": 0, "e": "", "f": "0", "g": "false"
        }));
        for truthy in ["a", "b", "c"] {
            assert!(bool_or(&data, truthy, false).unwrap(), "{truthy}");
        }
        for falsy in ["d", "e", "f", "g"] {
            assert!(!bool_or(&data, falsy, true).unwrap(), "{falsy}");
        }
    }

    #[test]
    fn fractional_values_truncate_to_integers() {
        let data = map(json!({ "count": 12.9, "index": "3" }));
        assert_eq!(opt_i64(&data, "count").unwrap(), Some(12));
        assert_eq!(opt_i64(&data, "index").unwrap(), Some(3));
    }

    #[test]
    fn object_items_default_to_empty() {
        let data = map(json!({}));
        assert!(object_items(&data, "highlights").unwrap().is_empty());
    }

    #[test]
    fn object_items_reject_non_object_entries() {
        let data = map(json!({ "highlights": [1, 2] }));
        assert!(object_items(&data, "highlights").is_err());
    }
}
