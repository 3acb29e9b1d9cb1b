//! # Response Validators
//!
//! Validators assert on the JSON body of a response:
//!
//! ```yaml
//! validators:
//!   - compare: {jsonpath_mini: 'key.val', comparator: 'eq', expected: 3}
//!   - compare: {jsonpath_mini: {template: 'items.$index'}, comparator: 'exists'}
//!   - compare: {jsonpath_mini: 'key.val', comparator: 'eq', expected: {jsonpath_mini: 'id'}}
//!   - extract_test: {jsonpath_mini: 'error', test: 'not_exists'}
//! ```

pub mod comparator;
pub mod extractor;

use serde::Serialize;
use serde_json::Value;

use crate::config::node::{normalize_map, require_string, single_entry};
use crate::context::Context;
use crate::error::{Error, ParseError};
use crate::template::safe_substitute;
pub use comparator::Comparator;
pub use extractor::{Extractor, query_value};

/// Outcome of running one validator against a response body.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub validator: String,
    pub passed: bool,
    pub actual: Option<Value>,
    pub expected: Option<Value>,
    pub message: String,
}

impl ValidationResult {
    fn failed(validator: String, message: impl Into<String>) -> Self {
        Self {
            validator,
            passed: false,
            actual: None,
            expected: None,
            message: message.into(),
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Expected {
    Literal(Value),
    Template(String),
    Extract(Extractor),
}

impl Expected {
    pub fn parse(node: &Value) -> Result<Self, ParseError> {
        if let Some((key, inner)) = single_entry(node) {
            match key.to_ascii_lowercase().as_str() {
                "template" => return Ok(Expected::Template(require_string("expected", inner)?)),
                "jsonpath_mini" => return Ok(Expected::Extract(Extractor::parse(inner)?)),
                _ => {}
            }
        }
        Ok(Expected::Literal(node.clone()))
    }

    /// Resolve against the decoded body. A templated expectation compared to a
    /// non-string value is read back as a JSON scalar when it parses as one,
    /// so `$id` bound to `3` equals the number `3`. `None` when a nested
    /// extractor misses.
    fn resolve(&self, document: &Value, actual: &Value, context: Option<&Context>) -> Option<Value> {
        let value = match self {
            Expected::Literal(value) => value.clone(),
            Expected::Extract(extractor) => extractor.extract_from_value(document, context)?.clone(),
            Expected::Template(template) => {
                let text = match context {
                    Some(context) => safe_substitute(template, &context.get_values()),
                    None => template.clone(),
                };
                if actual.is_string() {
                    return Some(Value::String(text));
                }
                match serde_json::from_str::<Value>(&text) {
                    Ok(scalar) if !scalar.is_array() && !scalar.is_object() => scalar,
                    _ => Value::String(text),
                }
            }
        };
        Some(value)
    }
}

/// Extracts a value and compares it with an expected operand.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparatorValidator {
    pub extractor: Extractor,
    pub comparator: Comparator,
    pub expected: Option<Expected>,
}

impl ComparatorValidator {
    pub fn parse(node: &Value) -> Result<Self, ParseError> {
        let fields = normalize_map("compare", node)?;

        let extractor = fields
            .get("jsonpath_mini")
            .ok_or_else(|| ParseError::field("compare", "missing `jsonpath_mini`"))
            .and_then(Extractor::parse)?;
        let comparator = match fields.get("comparator") {
            Some(name) => require_string("comparator", name)?.parse::<Comparator>()?,
            None => Comparator::Equals,
        };
        let expected = match fields.get("expected") {
            Some(node) => Some(Expected::parse(node)?),
            None if comparator.takes_expected() => {
                return Err(ParseError::field("compare", "missing `expected`"));
            }
            None => None,
        };

        Ok(Self {
            extractor,
            comparator,
            expected,
        })
    }

    pub fn describe(&self) -> String {
        format!("{} {}", self.extractor.query, self.comparator)
    }

    pub fn validate(&self, body: &str, context: Option<&Context>) -> ValidationResult {
        match serde_json::from_str::<Value>(body) {
            Ok(document) => self.validate_document(&document, context),
            Err(err) => ValidationResult::failed(self.describe(), Error::Decode(err).to_string()),
        }
    }

    pub fn validate_document(&self, document: &Value, context: Option<&Context>) -> ValidationResult {
        let validator = self.describe();
        let actual = self.extractor.extract_from_value(document, context);

        if self.comparator == Comparator::Exists {
            let passed = actual.is_some();
            return ValidationResult {
                validator,
                passed,
                actual: actual.cloned(),
                expected: None,
                message: if passed {
                    String::new()
                } else {
                    format!("no value at `{}`", self.extractor.resolve_query(context))
                },
            };
        }

        let Some(actual) = actual else {
            return ValidationResult::failed(
                validator,
                format!("no value at `{}`", self.extractor.resolve_query(context)),
            );
        };
        let expected = match &self.expected {
            Some(expected) => match expected.resolve(document, actual, context) {
                Some(value) => value,
                None => {
                    let mut result = ValidationResult::failed(
                        validator,
                        "no value for the expected operand",
                    );
                    result.actual = Some(actual.clone());
                    return result;
                }
            },
            None => Value::Null,
        };

        let (passed, message) = match self.comparator.compare(actual, &expected) {
            Ok(true) => (true, String::new()),
            Ok(false) => (
                false,
                format!("expected {actual} {} {expected}", self.comparator),
            ),
            Err(reason) => (false, reason),
        };

        ValidationResult {
            validator,
            passed,
            actual: Some(actual.clone()),
            expected: Some(expected),
            message,
        }
    }
}

/// Existence checks without an expected operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractTest {
    Exists,
    NotExists,
}

impl ExtractTest {
    pub fn name(self) -> &'static str {
        match self {
            ExtractTest::Exists => "exists",
            ExtractTest::NotExists => "not_exists",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractTestValidator {
    pub extractor: Extractor,
    pub test: ExtractTest,
}

impl ExtractTestValidator {
    pub fn parse(node: &Value) -> Result<Self, ParseError> {
        let fields = normalize_map("extract_test", node)?;
        let extractor = fields
            .get("jsonpath_mini")
            .ok_or_else(|| ParseError::field("extract_test", "missing `jsonpath_mini`"))
            .and_then(Extractor::parse)?;
        let test = match fields.get("test").map(|node| require_string("test", node)).transpose()? {
            Some(name) if name.eq_ignore_ascii_case("exists") => ExtractTest::Exists,
            Some(name) if name.eq_ignore_ascii_case("not_exists") => ExtractTest::NotExists,
            Some(name) => return Err(ParseError::field("test", format!("unknown test `{name}`"))),
            None => return Err(ParseError::field("extract_test", "missing `test`")),
        };
        Ok(Self { extractor, test })
    }

    fn validate_document(&self, document: &Value, context: Option<&Context>) -> ValidationResult {
        let actual = self.extractor.extract_from_value(document, context);
        let passed = match self.test {
            ExtractTest::Exists => actual.is_some(),
            ExtractTest::NotExists => actual.is_none(),
        };
        let query = self.extractor.resolve_query(context);
        ValidationResult {
            validator: format!("{query} {}", self.test.name()),
            passed,
            actual: actual.cloned(),
            expected: None,
            message: match (passed, self.test) {
                (true, _) => String::new(),
                (false, ExtractTest::Exists) => format!("no value at `{query}`"),
                (false, ExtractTest::NotExists) => format!("unexpected value at `{query}`"),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Validator {
    Compare(ComparatorValidator),
    ExtractTest(ExtractTestValidator),
}

impl Validator {
    /// `{compare: {...}}`, `{extract_test: {...}}`, or a bare comparison map.
    pub fn parse(node: &Value) -> Result<Self, ParseError> {
        if let Some((key, inner)) = single_entry(node) {
            match key.to_ascii_lowercase().as_str() {
                "compare" => return Ok(Validator::Compare(ComparatorValidator::parse(inner)?)),
                "extract_test" => {
                    return Ok(Validator::ExtractTest(ExtractTestValidator::parse(inner)?));
                }
                "jsonpath_mini" => {}
                other => return Err(ParseError::UnknownValidator(other.to_string())),
            }
        }
        Ok(Validator::Compare(ComparatorValidator::parse(node)?))
    }

    pub fn parse_list(node: &Value) -> Result<Vec<Self>, ParseError> {
        match node {
            Value::Array(items) => items.iter().map(Self::parse).collect(),
            Value::Null => Ok(Vec::new()),
            other => Ok(vec![Self::parse(other)?]),
        }
    }

    pub fn validate(&self, body: &str, context: Option<&Context>) -> ValidationResult {
        match serde_json::from_str::<Value>(body) {
            Ok(document) => self.validate_document(&document, context),
            Err(err) => ValidationResult::failed(self.describe(), Error::Decode(err).to_string()),
        }
    }

    pub fn validate_document(&self, document: &Value, context: Option<&Context>) -> ValidationResult {
        match self {
            Validator::Compare(validator) => validator.validate_document(document, context),
            Validator::ExtractTest(validator) => validator.validate_document(document, context),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Validator::Compare(validator) => validator.describe(),
            Validator::ExtractTest(validator) => {
                format!("{} {}", validator.extractor.query, validator.test.name())
            }
        }
    }
}

/// Run every validator against one decoding of `body`.
pub fn validate_all(
    validators: &[Validator],
    body: &str,
    context: Option<&Context>,
) -> Vec<ValidationResult> {
    if validators.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Value>(body) {
        Ok(document) => validators
            .iter()
            .map(|validator| validator.validate_document(&document, context))
            .collect(),
        Err(err) => {
            let message = Error::Decode(err).to_string();
            validators
                .iter()
                .map(|validator| ValidationResult::failed(validator.describe(), message.clone()))
                .collect()
        }
    }
}
