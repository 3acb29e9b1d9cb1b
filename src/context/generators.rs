//! Value generators that can be bound into a [`Context`](super::Context).

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::config::node::{flatten_dictionaries, lowercase_keys, scalar_to_string};
use crate::error::ParseError;
use crate::template::safe_substitute;

/// A stateful, possibly infinite sequence of values.
///
/// Reading a value advances the sequence, so a generator is never shared:
/// the owning context is the only thing that pulls from it.
pub struct Generator {
    values: Box<dyn Iterator<Item = Value> + Send>,
}

impl Generator {
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: Send + 'static,
    {
        Self {
            values: Box::new(values.into_iter()),
        }
    }

    /// 1, 2, 3, ...
    pub fn basic_ids() -> Self {
        Self::number_sequence(1, 1)
    }

    pub fn number_sequence(start: i64, increment: i64) -> Self {
        Self::from_values(
            std::iter::successors(Some(start), move |current| current.checked_add(increment))
                .map(Value::from),
        )
    }

    /// Cycles through `values` forever. An empty list is immediately exhausted.
    pub fn fixed_sequence(values: Vec<Value>) -> Self {
        Self::from_values(values.into_iter().cycle())
    }

    /// Repeats the current value of an OS environment variable.
    pub fn env_variable(variable_name: String) -> Self {
        Self::from_values(std::iter::repeat_with(move || {
            Value::String(std::env::var(&variable_name).unwrap_or_default())
        }))
    }

    /// Repeats `template` substituted against the OS environment.
    pub fn env_string(template: String) -> Self {
        Self::from_values(std::iter::repeat_with(move || {
            let environment: HashMap<String, String> = std::env::vars().collect();
            Value::String(safe_substitute(&template, &environment))
        }))
    }
}

impl Iterator for Generator {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        self.values.next()
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator").finish_non_exhaustive()
    }
}

/// Declarative description of a generator, turned into a fresh [`Generator`]
/// every time a test set starts running.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorSpec {
    BasicIds,
    NumberSequence { start: i64, increment: i64 },
    FixedSequence(Vec<Value>),
    EnvVariable(String),
    EnvString(String),
}

impl GeneratorSpec {
    pub fn parse(name: &str, node: &Value) -> Result<Self, ParseError> {
        let invalid = |reason: &str| ParseError::Generator {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        let node = lowercase_keys(&flatten_dictionaries(node)?);
        let Value::Object(fields) = node else {
            return Err(invalid("expected a map with a `type` entry"));
        };
        let kind = fields
            .get("type")
            .and_then(scalar_to_string)
            .ok_or_else(|| invalid("missing `type`"))?;

        let integer = |key: &str, default: i64| -> Result<i64, ParseError> {
            match fields.get(key) {
                None => Ok(default),
                Some(Value::Number(number)) => number
                    .as_i64()
                    .ok_or_else(|| invalid(&format!("`{key}` must be an integer"))),
                Some(Value::String(text)) => text
                    .trim()
                    .parse()
                    .map_err(|_| invalid(&format!("`{key}` must be an integer"))),
                Some(_) => Err(invalid(&format!("`{key}` must be an integer"))),
            }
        };

        match kind.to_ascii_lowercase().as_str() {
            "basic_ids" | "ids" => Ok(GeneratorSpec::BasicIds),
            "number_sequence" => Ok(GeneratorSpec::NumberSequence {
                start: integer("start", 1)?,
                increment: integer("increment", 1)?,
            }),
            "fixed_sequence" => match fields.get("values") {
                Some(Value::Array(values)) if !values.is_empty() => {
                    Ok(GeneratorSpec::FixedSequence(values.clone()))
                }
                _ => Err(invalid("`values` must be a non-empty list")),
            },
            "env_variable" => fields
                .get("variable_name")
                .and_then(scalar_to_string)
                .map(GeneratorSpec::EnvVariable)
                .ok_or_else(|| invalid("missing `variable_name`")),
            "env_string" => fields
                .get("string")
                .and_then(scalar_to_string)
                .map(GeneratorSpec::EnvString)
                .ok_or_else(|| invalid("missing `string`")),
            other => Err(invalid(&format!("unknown type `{other}`"))),
        }
    }

    pub fn build(&self) -> Generator {
        match self {
            GeneratorSpec::BasicIds => Generator::basic_ids(),
            GeneratorSpec::NumberSequence { start, increment } => {
                Generator::number_sequence(*start, *increment)
            }
            GeneratorSpec::FixedSequence(values) => Generator::fixed_sequence(values.clone()),
            GeneratorSpec::EnvVariable(name) => Generator::env_variable(name.clone()),
            GeneratorSpec::EnvString(template) => Generator::env_string(template.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn basic_ids_count_from_one() {
        let ids: Vec<Value> = Generator::basic_ids().take(3).collect();
        assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn number_sequence_uses_start_and_increment() {
        let values: Vec<Value> = Generator::number_sequence(10, -5).take(3).collect();
        assert_eq!(values, vec![json!(10), json!(5), json!(0)]);
    }

    #[test]
    fn fixed_sequence_cycles() {
        let values: Vec<Value> = Generator::fixed_sequence(vec![json!("a"), json!("b")])
            .take(5)
            .collect();
        assert_eq!(values, vec![json!("a"), json!("b"), json!("a"), json!("b"), json!("a")]);
    }

    #[test]
    fn empty_fixed_sequence_is_exhausted() {
        assert_eq!(Generator::fixed_sequence(Vec::new()).next(), None);
    }

    #[test]
    fn parse_number_sequence_with_defaults() {
        let spec = GeneratorSpec::parse("ids", &json!({"type": "number_sequence", "start": "5"}))
            .expect("valid generator");
        assert_eq!(spec, GeneratorSpec::NumberSequence { start: 5, increment: 1 });
    }

    #[test]
    fn parse_accepts_list_of_single_key_maps() {
        let spec = GeneratorSpec::parse(
            "ids",
            &json!([{"TYPE": "number_sequence"}, {"increment": 2}]),
        )
        .expect("valid generator");
        assert_eq!(spec, GeneratorSpec::NumberSequence { start: 1, increment: 2 });
    }

    #[test]
    fn parse_rejects_bad_specs() {
        assert!(GeneratorSpec::parse("g", &json!({"type": "random_walk"})).is_err());
        assert!(GeneratorSpec::parse("g", &json!({"start": 1})).is_err());
        assert!(GeneratorSpec::parse("g", &json!({"type": "fixed_sequence", "values": []})).is_err());
        assert!(GeneratorSpec::parse("g", &json!("basic_ids")).is_err());
    }

    #[test]
    fn built_generators_restart_from_the_beginning() {
        let spec = GeneratorSpec::BasicIds;
        let mut first = spec.build();
        first.next();
        first.next();
        assert_eq!(spec.build().next(), Some(json!(1)));
    }
}
