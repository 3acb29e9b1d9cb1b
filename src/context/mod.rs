//! # Test Run Context
//!
//! Variables and generators shared by the tests of one test-set run. Tests
//! run strictly in declaration order and the context is threaded through
//! them as a single `&mut` value, so a test always observes the bindings
//! left by every test before it plus its own pre-bindings.

pub mod generators;

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::error::{Error, Result};
pub use generators::{Generator, GeneratorSpec};

#[derive(Default)]
pub struct Context {
    variables: HashMap<String, Value>,
    generators: HashMap<String, Generator>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_variable(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Bind several variables at once. Later entries win on duplicate names.
    pub fn bind_variables<I, K, V>(&mut self, bindings: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (name, value) in bindings {
            self.bind_variable(name, value);
        }
    }

    pub fn get_value(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Like [`Context::get_value`] but an unbound name is an error.
    pub fn require_value(&self, name: &str) -> Result<&Value> {
        self.variables
            .get(name)
            .ok_or_else(|| Error::Lookup(name.to_string()))
    }

    /// Snapshot of all variables rendered as template substitution values.
    pub fn get_values(&self) -> HashMap<String, String> {
        self.variables
            .iter()
            .map(|(name, value)| (name.clone(), template_value(value)))
            .collect()
    }

    pub fn add_generator(&mut self, name: impl Into<String>, generator: Generator) {
        self.generators.insert(name.into(), generator);
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Pull the next value from `generator` and bind it to `variable`.
    pub(crate) fn advance_generator(&mut self, variable: &str, generator: &str) -> Result<&Value> {
        let value = self
            .generators
            .get_mut(generator)
            .ok_or_else(|| Error::UnknownGenerator(generator.to_string()))?
            .next()
            .ok_or_else(|| Error::GeneratorExhausted(generator.to_string()))?;
        self.variables.insert(variable.to_string(), value);
        self.require_value(variable)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut generator_names: Vec<&String> = self.generators.keys().collect();
        generator_names.sort();
        f.debug_struct("Context")
            .field("variables", &self.variables)
            .field("generators", &generator_names)
            .finish()
    }
}

/// Strings substitute verbatim, everything else as its JSON text.
pub fn template_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
