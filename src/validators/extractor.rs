//! Dotted-path queries over decoded JSON (`key.0.name`).
//!
//! A segment is looked up as a key on maps and as an index on lists. A digit
//! segment against a map is still a key lookup, so `key.0` never reaches into
//! a map's first entry. Every failed step is a miss, not an error.

use serde_json::Value;

use crate::config::node::single_entry;
use crate::context::Context;
use crate::error::{ParseError, Result};
use crate::template::safe_substitute;

/// Walk `query` through `document`. An empty query selects the whole document.
pub fn query_value<'a>(query: &str, document: &'a Value) -> Option<&'a Value> {
    if query.is_empty() {
        return Some(document);
    }

    query.split('.').try_fold(document, |node, segment| match node {
        Value::Object(entries) => entries.get(segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get(index)),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extractor {
    pub query: String,
    pub is_templated: bool,
}

impl Extractor {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            is_templated: false,
        }
    }

    pub fn templated(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            is_templated: true,
        }
    }

    /// A query string, or `{template: query}`.
    pub fn parse(node: &Value) -> std::result::Result<Self, ParseError> {
        match node {
            Value::String(query) => Ok(Self::new(query.clone())),
            Value::Object(_) => match single_entry(node) {
                Some((key, Value::String(query))) if key.eq_ignore_ascii_case("template") => {
                    Ok(Self::templated(query.clone()))
                }
                _ => Err(ParseError::field(
                    "jsonpath_mini",
                    format!("expected a query or {{template: query}}, found `{node}`"),
                )),
            },
            other => Err(ParseError::field(
                "jsonpath_mini",
                format!("expected a query string, found `{other}`"),
            )),
        }
    }

    /// The query with templating applied. Without a context the raw query is used.
    pub fn resolve_query(&self, context: Option<&Context>) -> String {
        match context {
            Some(context) if self.is_templated => {
                safe_substitute(&self.query, &context.get_values())
            }
            _ => self.query.clone(),
        }
    }

    pub fn extract_from_value<'a>(
        &self,
        document: &'a Value,
        context: Option<&Context>,
    ) -> Option<&'a Value> {
        query_value(&self.resolve_query(context), document)
    }

    /// Decode `body` as JSON and run the query. Only malformed JSON is an error.
    pub fn extract(&self, body: &str, context: Option<&Context>) -> Result<Option<Value>> {
        let document: Value = serde_json::from_str(body)?;
        Ok(self.extract_from_value(&document, context).cloned())
    }
}
