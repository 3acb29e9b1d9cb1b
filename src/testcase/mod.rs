//! # Tests
//!
//! A [`Test`] is the parsed, reusable description of one request. Running it
//! goes through [`Test::realize`], which applies the test's bindings to the
//! shared [`Context`] and resolves every templated field into a concrete
//! [`RealizedTest`]. The `Test` itself is never modified by a run.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::config::node::{
    flatten_dictionaries, normalize_map, require_string, scalar_to_string, single_entry,
    to_integer,
};
use crate::content::ContentHandler;
use crate::context::Context;
use crate::error::{ParseError, Result};
use crate::http::{HttpMethod, HttpRequest};
use crate::template::safe_substitute;
use crate::validators::Validator;

pub const DEFAULT_NAME: &str = "Unnamed";
pub const DEFAULT_GROUP: &str = "Default";

/// Which plain-string fields are templates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemplateFlags {
    pub url: bool,
    pub headers: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Test {
    pub name: String,
    pub group: String,
    pub url: String,
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    pub body: Option<ContentHandler>,
    pub expected_status: Vec<u16>,
    pub variable_binds: BTreeMap<String, Value>,
    pub generator_binds: BTreeMap<String, String>,
    pub validators: Vec<Validator>,
    pub templates: TemplateFlags,
}

impl Default for Test {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            group: DEFAULT_GROUP.to_string(),
            url: String::new(),
            method: HttpMethod::Get,
            headers: BTreeMap::new(),
            body: None,
            expected_status: HttpMethod::Get.default_expected_status(),
            variable_binds: BTreeMap::new(),
            generator_binds: BTreeMap::new(),
            validators: Vec::new(),
            templates: TemplateFlags::default(),
        }
    }
}

/// A test with every template resolved, ready to hand to an HTTP client.
#[derive(Debug, Clone, PartialEq)]
pub struct RealizedTest {
    pub name: String,
    pub group: String,
    pub request: HttpRequest,
    pub expected_status: Vec<u16>,
}

impl RealizedTest {
    pub fn url(&self) -> &str {
        &self.request.url
    }

    pub fn body(&self) -> Option<&str> {
        self.request.body.as_deref()
    }

    pub fn status_expected(&self, status: u16) -> bool {
        self.expected_status.contains(&status)
    }
}

/// Keys a `test` node understands.
pub const TEST_FIELDS: &[&str] = &[
    "url",
    "method",
    "name",
    "group",
    "body",
    "headers",
    "expected_status",
    "variable_binds",
    "generator_binds",
    "validators",
];

impl Test {
    /// Build a test from its document node: a map, or a list of single-key
    /// maps. Keys are case-insensitive; unknown keys are logged and skipped.
    pub fn build_test(base_url: &str, node: &Value) -> Result<Test> {
        Self::build_with_extra_fields(base_url, node, &[])
    }

    /// Like [`Test::build_test`], leaving `extra_fields` to the caller
    /// (benchmarks add their own keys on top of the test's).
    pub(crate) fn build_with_extra_fields(
        base_url: &str,
        node: &Value,
        extra_fields: &[&str],
    ) -> Result<Test> {
        let fields = normalize_map("test", node)?;
        for field in unknown_fields(&fields, extra_fields) {
            tracing::warn!(field, "ignoring unknown test field");
        }
        let mut test = Test::default();
        let mut expected_status = None;

        for (key, value) in &fields {
            match key.as_str() {
                "url" => {
                    let (path, is_template) = parse_url(value)?;
                    test.set_url(format!("{base_url}{path}"), is_template);
                }
                "method" => test.method = require_string("method", value)?.parse()?,
                "name" => test.name = require_string("name", value)?,
                "group" => test.group = require_string("group", value)?,
                "body" => test.set_body(ContentHandler::parse_content(value)?),
                "headers" => {
                    let (headers, is_template) = parse_headers(value)?;
                    test.headers = headers;
                    test.templates.headers = is_template;
                }
                "expected_status" => expected_status = Some(parse_expected_status(value)?),
                "variable_binds" => test.variable_binds = parse_variable_binds(value)?,
                "generator_binds" => test.generator_binds = parse_generator_binds(value)?,
                "validators" => test.validators = Validator::parse_list(value)?,
                _ => {}
            }
        }

        test.expected_status =
            expected_status.unwrap_or_else(|| test.method.default_expected_status());
        Ok(test)
    }

    pub fn set_url(&mut self, url: impl Into<String>, is_template: bool) {
        self.url = url.into();
        self.templates.url = is_template;
    }

    /// The url, substituted against `context` when it is a template.
    pub fn get_url(&self, context: Option<&Context>) -> String {
        match context {
            Some(context) if self.templates.url => safe_substitute(&self.url, &context.get_values()),
            _ => self.url.clone(),
        }
    }

    pub fn set_body(&mut self, body: ContentHandler) {
        self.body = Some(body);
    }

    /// True when realizing needs a context: any templated field.
    pub fn is_dynamic(&self) -> bool {
        self.templates.url
            || self.templates.headers
            || self.body.as_ref().is_some_and(ContentHandler::is_dynamic)
    }

    pub fn is_context_modifier(&self) -> bool {
        !self.variable_binds.is_empty() || !self.generator_binds.is_empty()
    }

    /// Apply this test's bindings: static variables first, then one value
    /// from each bound generator.
    pub fn update_context_before(&self, context: &mut Context) -> Result<()> {
        context.bind_variables(
            self.variable_binds
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        for (variable, generator) in &self.generator_binds {
            let value = context.advance_generator(variable, generator)?;
            tracing::debug!(variable = %variable, generator = %generator, value = %value, "bound generated value");
        }
        Ok(())
    }

    pub fn realize(&self, context: &mut Context) -> Result<RealizedTest> {
        self.update_context_before(context)?;
        let context = &*context;

        let headers = if self.templates.headers {
            let variables = context.get_values();
            self.headers
                .iter()
                .map(|(name, value)| (name.clone(), safe_substitute(value, &variables)))
                .collect()
        } else {
            self.headers.clone()
        };
        let body = self
            .body
            .as_ref()
            .map(|body| body.get_content(Some(context)))
            .transpose()?;

        Ok(RealizedTest {
            name: self.name.clone(),
            group: self.group.clone(),
            request: HttpRequest {
                method: self.method,
                url: self.get_url(Some(context)),
                headers,
                body,
            },
            expected_status: self.expected_status.clone(),
        })
    }
}

/// Keys that are neither test fields nor listed in `extra_fields`.
fn unknown_fields<'a>(fields: &'a Map<String, Value>, extra_fields: &[&str]) -> Vec<&'a str> {
    fields
        .keys()
        .map(String::as_str)
        .filter(|key| !TEST_FIELDS.contains(key) && !extra_fields.contains(key))
        .collect()
}

fn parse_url(node: &Value) -> std::result::Result<(String, bool), ParseError> {
    if let Some((key, inner)) = single_entry(node) {
        if key.eq_ignore_ascii_case("template") {
            return Ok((require_string("url", inner)?, true));
        }
    }
    Ok((require_string("url", node)?, false))
}

fn parse_headers(
    node: &Value,
) -> std::result::Result<(BTreeMap<String, String>, bool), ParseError> {
    if let Some((key, inner)) = single_entry(node) {
        if key.eq_ignore_ascii_case("template") {
            return Ok((parse_header_map(inner)?, true));
        }
    }
    Ok((parse_header_map(node)?, false))
}

fn parse_header_map(node: &Value) -> std::result::Result<BTreeMap<String, String>, ParseError> {
    match flatten_dictionaries(node)? {
        Value::Object(entries) => entries
            .iter()
            .map(|(name, value)| Ok((name.clone(), require_string("headers", value)?)))
            .collect(),
        other => Err(ParseError::field(
            "headers",
            format!("expected a map of headers, found `{other}`"),
        )),
    }
}

fn parse_expected_status(node: &Value) -> std::result::Result<Vec<u16>, ParseError> {
    let status = |item: &Value| {
        to_integer("expected_status", item)
            .ok()
            .and_then(|code| u16::try_from(code).ok())
            .ok_or_else(|| ParseError::ExpectedStatus(item.to_string()))
    };
    match node {
        Value::Array(items) => items.iter().map(status).collect(),
        Value::Number(_) | Value::String(_) => Ok(vec![status(node)?]),
        other => Err(ParseError::ExpectedStatus(other.to_string())),
    }
}

fn parse_variable_binds(node: &Value) -> std::result::Result<BTreeMap<String, Value>, ParseError> {
    match flatten_dictionaries(node)? {
        Value::Object(entries) => Ok(entries.into_iter().collect()),
        other => Err(ParseError::field(
            "variable_binds",
            format!("expected a map, found `{other}`"),
        )),
    }
}

fn parse_generator_binds(
    node: &Value,
) -> std::result::Result<BTreeMap<String, String>, ParseError> {
    match flatten_dictionaries(node)? {
        Value::Object(entries) => entries
            .iter()
            .map(|(variable, generator)| {
                let generator = scalar_to_string(generator).ok_or_else(|| {
                    ParseError::field(
                        "generator_binds",
                        format!("generator name for `{variable}` must be a string"),
                    )
                })?;
                Ok((variable.clone(), generator))
            })
            .collect(),
        other => Err(ParseError::field(
            "generator_binds",
            format!("expected a map, found `{other}`"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Generator;
    use crate::error::Error;
    use serde_json::json;

    #[test]
    fn build_basic_delete() {
        let node = json!({
            "url": "/ping",
            "method": "DELETE",
            "NAME": "foo",
            "group": "bar",
            "body": "<xml>input</xml>",
            "headers": {"Accept": "Application/json"}
        });
        let test = Test::build_test("", &node).expect("valid test");

        assert_eq!(test.url, "/ping");
        assert_eq!(test.method, HttpMethod::Delete);
        assert_eq!(test.name, "foo");
        assert_eq!(test.group, "bar");
        assert_eq!(test.body, Some(ContentHandler::literal("<xml>input</xml>")));
        assert_eq!(
            test.headers.get("Accept").map(String::as_str),
            Some("Application/json")
        );
        assert_eq!(test.expected_status, vec![200, 202, 204]);
    }

    #[test]
    fn build_post_accepts_created_and_no_content() {
        let test = Test::build_test("", &json!({"url": "/ping", "meThod": "POST"}))
            .expect("valid test");
        assert_eq!(test.method, HttpMethod::Post);
        assert_eq!(test.expected_status, vec![200, 201, 204]);
    }

    #[test]
    fn build_merges_header_list() {
        let node = json!({
            "url": "/ping",
            "method": "GET",
            "headers": [{"Accept": "application/json"}, {"Accept-Encoding": "gzip"}]
        });
        let test = Test::build_test("", &node).expect("valid test");

        let expected = BTreeMap::from([
            ("Accept".to_string(), "application/json".to_string()),
            ("Accept-Encoding".to_string(), "gzip".to_string()),
        ]);
        assert_eq!(test.headers, expected);
        assert_eq!(test.expected_status, vec![200]);
        assert!(!test.templates.headers);
    }

    #[test]
    fn build_from_list_converts_expected_status() {
        let node = json!([{"url": "/ping"}, {"name": "cheese"}, {"expected_status": ["200", 204, "202"]}]);
        let test = Test::build_test("", &node).expect("valid test");

        assert_eq!(test.name, "cheese");
        assert_eq!(test.expected_status, vec![200, 204, 202]);
        assert!(!test.is_context_modifier());
    }

    #[test]
    fn build_prefixes_base_url_and_keeps_defaults() {
        let test = Test::build_test("http://localhost:8000", &json!({"url": "/api/person/"}))
            .expect("valid test");
        assert_eq!(test.url, "http://localhost:8000/api/person/");
        assert_eq!(test.name, DEFAULT_NAME);
        assert_eq!(test.group, DEFAULT_GROUP);
        assert!(!test.is_dynamic());
    }

    #[test]
    fn build_rejects_bad_expected_status() {
        for status in [json!("two hundred"), json!([200, "x"]), json!({"code": 200}), json!(70000)] {
            let node = json!({"url": "/ping", "expected_status": status});
            assert!(
                matches!(
                    Test::build_test("", &node),
                    Err(Error::Parse(ParseError::ExpectedStatus(_)))
                ),
                "accepted {status}"
            );
        }
    }

    #[test]
    fn build_rejects_unknown_method() {
        let node = json!({"url": "/ping", "method": "TELEPORT"});
        assert!(matches!(
            Test::build_test("", &node),
            Err(Error::Parse(ParseError::Method(_)))
        ));
    }

    #[test]
    fn build_templated_url_and_headers() {
        let node = json!({
            "url": {"template": "/api/person/$id"},
            "headers": {"template": {"X-Login": "$login"}}
        });
        let test = Test::build_test("http://host", &node).expect("valid test");
        assert_eq!(test.url, "http://host/api/person/$id");
        assert!(test.templates.url);
        assert!(test.templates.headers);
        assert!(test.is_dynamic());

        let mut context = Context::new();
        context.bind_variables([("id", json!(7)), ("login", json!("gbaltar"))]);
        let realized = test.realize(&mut context).expect("realized");
        assert_eq!(realized.url(), "http://host/api/person/7");
        assert_eq!(
            realized.request.headers.get("X-Login").map(String::as_str),
            Some("gbaltar")
        );
    }

    #[test]
    fn header_template_needs_a_map() {
        let node = json!({"url": "/ping", "headers": {"template": "X-Login: $login"}});
        assert!(matches!(
            Test::build_test("", &node),
            Err(Error::Parse(ParseError::Field { .. }))
        ));
    }

    #[test]
    fn unknown_fields_skip_test_and_extra_keys() {
        let fields = normalize_map(
            "test",
            &json!({"url": "/ping", "timeout": 3, "warmup_runs": 2, "Bogus": true}),
        )
        .expect("map");
        assert_eq!(unknown_fields(&fields, &[]), vec!["bogus", "timeout", "warmup_runs"]);
        assert_eq!(unknown_fields(&fields, &["warmup_runs"]), vec!["bogus", "timeout"]);

        let test = Test::build_test("", &json!({"url": "/ping", "timeout": 3})).expect("valid test");
        assert_eq!(test.url, "/ping");
    }

    #[test]
    fn variable_binding() {
        let node = json!([
            {"url": "/ping"},
            {"name": "cheese"},
            {"expected_status": ["200", 204, "202"]},
            {"variable_binds": {"var": "value"}}
        ]);
        let test = Test::build_test("", &node).expect("valid test");
        assert_eq!(test.variable_binds.len(), 1);
        assert_eq!(test.variable_binds.get("var"), Some(&json!("value")));

        let mut context = Context::new();
        test.update_context_before(&mut context).expect("bound");
        assert_eq!(context.get_value("var"), Some(&json!("value")));
        assert!(test.is_context_modifier());
    }

    #[test]
    fn url_templating() {
        let mut test = Test::default();
        test.set_url("$cheese", true);
        assert!(test.is_dynamic());
        assert_eq!(test.get_url(None), "$cheese");
        assert!(test.templates.url);

        let mut context = Context::new();
        context.bind_variable("cheese", "stilton");
        assert_eq!(test.get_url(Some(&context)), "stilton");

        let realized = test.realize(&mut context).expect("realized");
        assert_eq!(realized.url(), "stilton");
    }

    #[test]
    fn content_templating() {
        let template = r#"{"first_name": "Gaius","id": "$id","last_name": "Baltar","login": "$login"}"#;
        let mut test = Test::default();
        test.set_body(ContentHandler::setup(template, false, false, true));

        let mut context = Context::new();
        context.bind_variables([("id", json!(9)), ("login", json!("kvothe"))]);

        let realized = test.realize(&mut context).expect("realized");
        assert_eq!(
            realized.body(),
            Some(r#"{"first_name": "Gaius","id": "9","last_name": "Baltar","login": "kvothe"}"#)
        );
    }

    #[test]
    fn update_context_overwrites_variables() {
        let mut test = Test::default();
        test.variable_binds = BTreeMap::from([
            ("foo".to_string(), json!("correct")),
            ("test".to_string(), json!("value")),
        ]);

        let mut context = Context::new();
        context.bind_variable("foo", "broken");
        test.update_context_before(&mut context).expect("bound");

        assert_eq!(context.get_value("foo"), Some(&json!("correct")));
        assert_eq!(context.get_value("test"), Some(&json!("value")));
    }

    #[test]
    fn update_context_from_generators() {
        let mut test = Test::default();
        test.variable_binds = BTreeMap::from([("foo".to_string(), json!("initial_value"))]);
        test.generator_binds = BTreeMap::from([("foo".to_string(), "gen".to_string())]);

        let mut context = Context::new();
        context.bind_variable("foo", "broken");
        context.add_generator("gen", Generator::basic_ids());

        test.update_context_before(&mut context).expect("bound");
        assert_eq!(context.get_value("foo"), Some(&json!(1)));
        test.update_context_before(&mut context).expect("bound");
        assert_eq!(context.get_value("foo"), Some(&json!(2)));
    }

    #[test]
    fn unknown_generator_fails_realize() {
        let mut test = Test::default();
        test.generator_binds = BTreeMap::from([("id".to_string(), "missing".to_string())]);
        let mut context = Context::new();
        assert!(matches!(
            test.realize(&mut context),
            Err(Error::UnknownGenerator(name)) if name == "missing"
        ));
    }

    #[test]
    fn realize_leaves_test_untouched() {
        let node = json!({"url": {"template": "/$id"}, "generator_binds": {"id": "ids"}});
        let test = Test::build_test("", &node).expect("valid test");
        let snapshot = test.clone();

        let mut context = Context::new();
        context.add_generator("ids", Generator::basic_ids());
        let first = test.realize(&mut context).expect("realized");
        let second = test.realize(&mut context).expect("realized");

        assert_eq!(first.url(), "/1");
        assert_eq!(second.url(), "/2");
        assert_eq!(test, snapshot);
    }
}
