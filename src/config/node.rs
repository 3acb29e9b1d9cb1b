//! Helpers for reading decoded document nodes.
//!
//! Test documents allow both `{a: 1, b: 2}` and `[{a: 1}, {b: 2}]` for the
//! same map, and keys are case-insensitive.

use serde_json::{Map, Value};

use crate::error::ParseError;

/// Merge a list of maps into one map. Non-list input is returned unchanged.
pub fn flatten_dictionaries(node: &Value) -> Result<Value, ParseError> {
    let Value::Array(items) = node else {
        return Ok(node.clone());
    };

    let mut output = Map::new();
    for item in items {
        let Value::Object(entries) = item else {
            return Err(ParseError::field(
                "map",
                format!("expected a list of maps, found `{item}`"),
            ));
        };
        for (key, value) in entries {
            output.insert(key.clone(), value.clone());
        }
    }
    Ok(Value::Object(output))
}

/// Lowercase the keys of a map. Other nodes are returned unchanged.
pub fn lowercase_keys(node: &Value) -> Value {
    match node {
        Value::Object(entries) => Value::Object(
            entries
                .iter()
                .map(|(key, value)| (key.to_lowercase(), value.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Flatten then lowercase, the normal form for a configuration map.
pub fn normalize_map(field: &str, node: &Value) -> Result<Map<String, Value>, ParseError> {
    match lowercase_keys(&flatten_dictionaries(node)?) {
        Value::Object(entries) => Ok(entries),
        other => Err(ParseError::field(field, format!("expected a map, found `{other}`"))),
    }
}

/// The key and value of a map with exactly one entry.
pub fn single_entry(node: &Value) -> Option<(&str, &Value)> {
    match node {
        Value::Object(entries) if entries.len() == 1 => {
            entries.iter().next().map(|(key, value)| (key.as_str(), value))
        }
        _ => None,
    }
}

pub fn scalar_to_string(node: &Value) -> Option<String> {
    match node {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

pub fn require_string(field: &str, node: &Value) -> Result<String, ParseError> {
    scalar_to_string(node)
        .ok_or_else(|| ParseError::field(field, format!("expected a scalar, found `{node}`")))
}

/// Integers, or strings holding an integer.
pub fn to_integer(field: &str, node: &Value) -> Result<i64, ParseError> {
    let parsed = match node {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ParseError::field(field, format!("expected an integer, found `{node}`")))
}

/// Booleans, or the strings `true` / `false` in any case.
pub fn safe_to_bool(field: &str, node: &Value) -> Result<bool, ParseError> {
    match node {
        Value::Bool(flag) => Ok(*flag),
        Value::String(text) if text.eq_ignore_ascii_case("true") => Ok(true),
        Value::String(text) if text.eq_ignore_ascii_case("false") => Ok(false),
        other => Err(ParseError::field(field, format!("expected a boolean, found `{other}`"))),
    }
}
