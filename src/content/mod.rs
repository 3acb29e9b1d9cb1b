//! # Content Handling
//!
//! Request bodies (and anything else shaped like one) can be given inline,
//! read from a file, templated, or any nesting of those:
//!
//! ```yaml
//! body: 'inline text'
//! body: {file: 'body.json'}
//! body: {template: 'hello $name'}
//! body: {template: {file: 'body.json'}}          # templated file content
//! body: {file: {template: '$dir/body.json'}}     # templated file path
//! body: {template: {file: {template: '$dir/body.json'}}}
//! ```

use serde_json::Value;

use crate::config::node::{scalar_to_string, single_entry};
use crate::context::Context;
use crate::error::{ParseError, Result};
use crate::storage;
use crate::template::safe_substitute;

/// Parsed shape of a content definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentNode {
    Literal(String),
    File(Box<ContentNode>),
    Template(Box<ContentNode>),
}

impl ContentNode {
    pub fn parse(node: &Value) -> std::result::Result<Self, ParseError> {
        match node {
            Value::String(text) => Ok(ContentNode::Literal(text.clone())),
            Value::Number(_) | Value::Bool(_) => {
                Ok(ContentNode::Literal(scalar_to_string(node).unwrap_or_default()))
            }
            Value::Object(_) => match wrapper(node)? {
                ("file", inner) => Ok(ContentNode::File(Box::new(Self::parse_path(inner)?))),
                (_, inner) => Ok(ContentNode::Template(Box::new(Self::parse_templated(inner)?))),
            },
            other => Err(invalid(format!("unsupported content `{other}`"))),
        }
    }

    /// Value under `file`: a path string, or `{template: path}`.
    fn parse_path(node: &Value) -> std::result::Result<Self, ParseError> {
        match node {
            Value::String(path) => Ok(ContentNode::Literal(path.clone())),
            Value::Object(_) => match wrapper(node)? {
                ("template", Value::String(path)) => Ok(ContentNode::Template(Box::new(
                    ContentNode::Literal(path.clone()),
                ))),
                ("template", other) => Err(invalid(format!(
                    "templated file path must be a string, found `{other}`"
                ))),
                (other, _) => Err(invalid(format!(
                    "unknown key `{other}` under `file`, expected `template`"
                ))),
            },
            other => Err(invalid(format!("file path must be a string, found `{other}`"))),
        }
    }

    /// Value under `template`: inline text, or `{file: ...}`.
    fn parse_templated(node: &Value) -> std::result::Result<Self, ParseError> {
        match node {
            Value::String(text) => Ok(ContentNode::Literal(text.clone())),
            Value::Object(_) => match wrapper(node)? {
                ("file", inner) => Ok(ContentNode::File(Box::new(Self::parse_path(inner)?))),
                (other, _) => Err(invalid(format!(
                    "unknown key `{other}` under `template`, expected `file`"
                ))),
            },
            other => Err(invalid(format!("template must be a string, found `{other}`"))),
        }
    }
}

fn wrapper(node: &Value) -> std::result::Result<(&'static str, &Value), ParseError> {
    let (key, inner) = single_entry(node)
        .ok_or_else(|| invalid(format!("expected a single-key map, found `{node}`")))?;
    match key.to_lowercase().as_str() {
        "file" => Ok(("file", inner)),
        "template" => Ok(("template", inner)),
        _ => Err(invalid(format!(
            "unknown key `{key}`, expected `file` or `template`"
        ))),
    }
}

fn invalid(reason: String) -> ParseError {
    ParseError::Content(reason)
}

/// Resolves a content definition to a string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentHandler {
    pub content: String,
    pub is_file: bool,
    pub is_template_path: bool,
    pub is_template_content: bool,
}

impl ContentHandler {
    pub fn setup(
        content: impl Into<String>,
        is_file: bool,
        is_template_path: bool,
        is_template_content: bool,
    ) -> Self {
        Self {
            content: content.into(),
            is_file,
            is_template_path,
            is_template_content,
        }
    }

    pub fn literal(content: impl Into<String>) -> Self {
        Self::setup(content, false, false, false)
    }

    pub fn parse_content(node: &Value) -> std::result::Result<Self, ParseError> {
        Ok(Self::from_node(ContentNode::parse(node)?))
    }

    pub fn from_node(node: ContentNode) -> Self {
        let mut handler = Self::default();
        handler.apply(node, false);
        handler
    }

    fn apply(&mut self, node: ContentNode, under_file: bool) {
        match node {
            ContentNode::Literal(text) => self.content = text,
            ContentNode::File(inner) => {
                self.is_file = true;
                self.apply(*inner, true);
            }
            ContentNode::Template(inner) => {
                if under_file {
                    self.is_template_path = true;
                } else {
                    self.is_template_content = true;
                }
                self.apply(*inner, under_file);
            }
        }
    }

    /// True when a context is needed to fully resolve the content.
    pub fn is_dynamic(&self) -> bool {
        self.is_template_path || self.is_template_content
    }

    pub fn get_content(&self, context: Option<&Context>) -> Result<String> {
        let variables = context.map(Context::get_values).unwrap_or_default();

        let source = if self.is_template_path {
            safe_substitute(&self.content, &variables)
        } else {
            self.content.clone()
        };

        let text = if self.is_file {
            storage::read_text(&source)?
        } else {
            source
        };

        if self.is_template_content && context.is_some() {
            Ok(safe_substitute(&text, &variables))
        } else {
            Ok(text)
        }
    }
}
