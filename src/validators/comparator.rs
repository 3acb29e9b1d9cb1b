use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::str::FromStr;

use regex::Regex;
use serde_json::Value;

use crate::context::template_value;
use crate::error::ParseError;

/// Comparison operator applied as `actual <op> expected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Contains,
    ContainedBy,
    Type,
    Regex,
    Exists,
}

impl Comparator {
    pub const ALL: [Comparator; 11] = [
        Comparator::Equals,
        Comparator::NotEquals,
        Comparator::LessThan,
        Comparator::LessThanOrEqual,
        Comparator::GreaterThan,
        Comparator::GreaterThanOrEqual,
        Comparator::Contains,
        Comparator::ContainedBy,
        Comparator::Type,
        Comparator::Regex,
        Comparator::Exists,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Comparator::Equals => "eq",
            Comparator::NotEquals => "ne",
            Comparator::LessThan => "lt",
            Comparator::LessThanOrEqual => "le",
            Comparator::GreaterThan => "gt",
            Comparator::GreaterThanOrEqual => "ge",
            Comparator::Contains => "contains",
            Comparator::ContainedBy => "contained_by",
            Comparator::Type => "type",
            Comparator::Regex => "regex",
            Comparator::Exists => "exists",
        }
    }

    /// Whether the comparator needs an `expected` operand.
    pub fn takes_expected(self) -> bool {
        !matches!(self, Comparator::Exists)
    }

    /// Compare an extracted value against the expected one. `Err` carries a
    /// message for operands the comparator cannot work with.
    pub fn compare(self, actual: &Value, expected: &Value) -> Result<bool, String> {
        match self {
            Comparator::Equals => Ok(values_equal(actual, expected)),
            Comparator::NotEquals => Ok(!values_equal(actual, expected)),
            Comparator::LessThan => Ok(order(actual, expected) == Some(Ordering::Less)),
            Comparator::LessThanOrEqual => Ok(matches!(
                order(actual, expected),
                Some(Ordering::Less | Ordering::Equal)
            )),
            Comparator::GreaterThan => Ok(order(actual, expected) == Some(Ordering::Greater)),
            Comparator::GreaterThanOrEqual => Ok(matches!(
                order(actual, expected),
                Some(Ordering::Greater | Ordering::Equal)
            )),
            Comparator::Contains => Ok(contains(actual, expected)),
            Comparator::ContainedBy => Ok(contains(expected, actual)),
            Comparator::Type => {
                let type_name = expected
                    .as_str()
                    .ok_or_else(|| format!("type name must be a string, found `{expected}`"))?;
                matches_type(actual, type_name)
            }
            Comparator::Regex => {
                let pattern = expected
                    .as_str()
                    .ok_or_else(|| format!("regex must be a string, found `{expected}`"))?;
                let regex =
                    Regex::new(pattern).map_err(|err| format!("invalid regex `{pattern}`: {err}"))?;
                Ok(regex.is_match(&template_value(actual)))
            }
            Comparator::Exists => Ok(true),
        }
    }
}

impl Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Comparator {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let comparator = match value.trim().to_ascii_lowercase().as_str() {
            "eq" | "equals" | "==" => Comparator::Equals,
            "ne" | "not_equals" | "!=" => Comparator::NotEquals,
            "lt" | "less_than" | "<" => Comparator::LessThan,
            "le" | "less_than_or_equal" | "<=" => Comparator::LessThanOrEqual,
            "gt" | "greater_than" | ">" => Comparator::GreaterThan,
            "ge" | "greater_than_or_equal" | ">=" => Comparator::GreaterThanOrEqual,
            "contains" => Comparator::Contains,
            "contained_by" => Comparator::ContainedBy,
            "type" => Comparator::Type,
            "regex" => Comparator::Regex,
            "exists" => Comparator::Exists,
            _ => return Err(ParseError::UnknownComparator(value.to_string())),
        };
        Ok(comparator)
    }
}

/// JSON equality, except that integers and floats compare by numeric value
/// at any depth.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, value)| b.get(key).is_some_and(|other| values_equal(value, other)))
        }
        _ => left == right,
    }
}

/// Numbers order numerically and strings lexicographically; nothing else orders.
fn order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn contains(container: &Value, item: &Value) -> bool {
    match container {
        Value::String(text) => match item {
            Value::String(needle) => text.contains(needle.as_str()),
            Value::Number(_) | Value::Bool(_) => text.contains(&template_value(item)),
            _ => false,
        },
        Value::Array(items) => items.iter().any(|candidate| values_equal(candidate, item)),
        Value::Object(entries) => item.as_str().is_some_and(|key| entries.contains_key(key)),
        _ => false,
    }
}

fn matches_type(value: &Value, type_name: &str) -> Result<bool, String> {
    let matched = match type_name.to_ascii_lowercase().as_str() {
        "string" | "str" => value.is_string(),
        "int" | "integer" => value.is_i64() || value.is_u64(),
        "float" => value.is_f64(),
        "number" => value.is_number(),
        "boolean" | "bool" => value.is_boolean(),
        "array" | "list" => value.is_array(),
        "object" | "map" | "dict" => value.is_object(),
        "null" | "none" => value.is_null(),
        "scalar" => value.is_string() || value.is_number() || value.is_boolean(),
        "collection" => value.is_array() || value.is_object(),
        other => return Err(format!("unknown type name `{other}`")),
    };
    Ok(matched)
}
