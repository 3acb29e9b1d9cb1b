//! # Test-Set Documents
//!
//! A test file is a YAML list of single-key maps:
//!
//! ```yaml
//! - config:
//!     - timeout: 5
//!     - variable_binds: {login: 'gbaltar'}
//!     - generators:
//!         - ids: {type: 'number_sequence', start: 10}
//! - url: '/api/person/'
//! - test:
//!     - url: {template: '/api/person/$id/'}
//!     - generator_binds: {id: ids}
//! - benchmark:
//!     - url: '/api/person/'
//!     - metrics: [total_time]
//! - import: 'more_tests.yaml'
//! ```
//!
//! Every file becomes one [`TestSet`]; imports add their own sets after it.
//! An imported file without a `config` section runs with the importing
//! file's configuration.

pub mod node;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;

use crate::benchmark::BenchmarkConfig;
use crate::context::{Context, GeneratorSpec};
use crate::error::{Error, ParseError, Result};
use crate::http::ClientOptions;
use crate::storage;
use crate::testcase::Test;
use node::{flatten_dictionaries, lowercase_keys, normalize_map, require_string, safe_to_bool, to_integer};

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Per test-set settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TestConfig {
    pub timeout: u64,
    pub print_bodies: bool,
    pub retries: u32,
    pub verbose: bool,
    pub variable_binds: BTreeMap<String, Value>,
    pub generators: BTreeMap<String, GeneratorSpec>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT_SECS,
            print_bodies: false,
            retries: 0,
            verbose: false,
            variable_binds: BTreeMap::new(),
            generators: BTreeMap::new(),
        }
    }
}

impl TestConfig {
    pub fn make_configuration(node: &Value) -> std::result::Result<Self, ParseError> {
        let mut config = TestConfig::default();

        for (key, value) in normalize_map("config", node)? {
            match key.as_str() {
                "timeout" => {
                    let timeout = to_integer("timeout", &value)?;
                    config.timeout = u64::try_from(timeout).map_err(|_| {
                        ParseError::field("timeout", format!("must not be negative, found {timeout}"))
                    })?;
                }
                "print_bodies" => config.print_bodies = safe_to_bool("print_bodies", &value)?,
                "retries" => {
                    let retries = to_integer("retries", &value)?;
                    config.retries = u32::try_from(retries).map_err(|_| {
                        ParseError::field("retries", format!("must not be negative, found {retries}"))
                    })?;
                }
                "verbose" => config.verbose = safe_to_bool("verbose", &value)?,
                "variable_binds" => match flatten_dictionaries(&value)? {
                    Value::Object(entries) => config.variable_binds = entries.into_iter().collect(),
                    other => {
                        return Err(ParseError::field(
                            "variable_binds",
                            format!("expected a map, found `{other}`"),
                        ));
                    }
                },
                "generators" => match flatten_dictionaries(&value)? {
                    Value::Object(entries) => {
                        for (name, spec) in &entries {
                            config
                                .generators
                                .insert(name.clone(), GeneratorSpec::parse(name, spec)?);
                        }
                    }
                    other => {
                        return Err(ParseError::field(
                            "generators",
                            format!("expected a map of generators, found `{other}`"),
                        ));
                    }
                },
                other => tracing::warn!(key = other, "ignoring unknown configuration key"),
            }
        }

        Ok(config)
    }

    /// A fresh context for one run: configured variables plus newly built
    /// generators.
    pub fn build_context(&self) -> Context {
        let mut context = Context::new();
        context.bind_variables(
            self.variable_binds
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        for (name, spec) in &self.generators {
            context.add_generator(name.clone(), spec.build());
        }
        context
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout: Duration::from_secs(self.timeout),
            retries: self.retries,
            ..ClientOptions::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestSet {
    pub name: String,
    /// File the set was read from, if any. Benchmark output paths resolve
    /// against its directory.
    pub source: Option<PathBuf>,
    pub tests: Vec<Test>,
    pub benchmarks: Vec<BenchmarkConfig>,
    pub config: TestConfig,
}

pub fn read_test_file(path: impl AsRef<Path>) -> Result<Value> {
    let text = storage::read_text(path)?;
    Ok(serde_yaml::from_str::<Value>(&text)?)
}

/// Read `path` and every file it imports.
pub fn parse_testsets(base_url: &str, path: impl AsRef<Path>) -> Result<Vec<TestSet>> {
    let path = path.as_ref();
    let document = read_test_file(path)?;
    let mut importing = vec![path.canonicalize().map_err(|err| Error::io(path, err))?];
    build_testsets(base_url, &document, Some(path), &mut importing)
}

/// Build the test sets of one decoded document. `importing` holds the files
/// currently being read, so an import that leads back to one of them is
/// rejected.
pub fn build_testsets(
    base_url: &str,
    document: &Value,
    source: Option<&Path>,
    importing: &mut Vec<PathBuf>,
) -> Result<Vec<TestSet>> {
    let sets = build_document(base_url, document, source, importing)?;
    let root_config = sets
        .first()
        .map(|(set, _)| set.config.clone())
        .unwrap_or_default();
    Ok(sets
        .into_iter()
        .map(|(mut set, configured)| {
            if !configured {
                set.config = root_config.clone();
            }
            set
        })
        .collect())
}

/// The document's own set followed by its imports, each flagged with whether
/// its configuration has been settled.
fn build_document(
    base_url: &str,
    document: &Value,
    source: Option<&Path>,
    importing: &mut Vec<PathBuf>,
) -> Result<Vec<(TestSet, bool)>> {
    let mut testset = TestSet {
        name: source
            .and_then(Path::file_stem)
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "inline".to_string()),
        source: source.map(Path::to_path_buf),
        ..TestSet::default()
    };
    let mut configured = false;
    let mut imported: Vec<(TestSet, bool)> = Vec::new();

    let elements: &[Value] = match document {
        Value::Array(elements) => elements.as_slice(),
        Value::Null => &[],
        other => {
            return Err(ParseError::field(
                "document",
                format!("expected a list of test elements, found `{other}`"),
            )
            .into());
        }
    };

    for element in elements {
        let Value::Object(entries) = lowercase_keys(element) else {
            return Err(ParseError::field(
                "document",
                format!("expected a map, found `{element}`"),
            )
            .into());
        };

        for (key, value) in &entries {
            match key.as_str() {
                "url" => {
                    let mut test = Test::default();
                    test.set_url(format!("{base_url}{}", require_string("url", value)?), false);
                    testset.tests.push(test);
                }
                "test" => testset.tests.push(Test::build_test(base_url, value)?),
                "benchmark" => testset
                    .benchmarks
                    .push(BenchmarkConfig::build(base_url, value)?),
                "config" | "configuration" => {
                    testset.config = TestConfig::make_configuration(value)?;
                    configured = true;
                }
                "import" => {
                    let target = require_string("import", value)?;
                    imported.extend(import_document(base_url, &target, source, importing)?);
                }
                other => tracing::warn!(key = other, "ignoring unknown test-set element"),
            }
        }
    }

    if configured {
        for (set, settled) in imported.iter_mut().filter(|(_, settled)| !*settled) {
            set.config = testset.config.clone();
            *settled = true;
        }
    }

    let mut sets = vec![(testset, configured)];
    sets.extend(imported);
    Ok(sets)
}

fn import_document(
    base_url: &str,
    target: &str,
    source: Option<&Path>,
    importing: &mut Vec<PathBuf>,
) -> Result<Vec<(TestSet, bool)>> {
    let path = match source.and_then(Path::parent) {
        Some(directory) => storage::resolve_relative(directory, target),
        None => PathBuf::from(target),
    };
    let canonical = path
        .canonicalize()
        .map_err(|err| Error::io(path.clone(), err))?;

    if importing.contains(&canonical) {
        return Err(ParseError::field(
            "import",
            format!("import cycle through `{}`", path.display()),
        )
        .into());
    }

    tracing::debug!(path = %path.display(), "importing test set");
    let document = read_test_file(&path)?;
    importing.push(canonical);
    let sets = build_document(base_url, &document, Some(&path), importing);
    importing.pop();
    sets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use serde_json::json;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).expect("write test file");
        path
    }

    #[test]
    fn make_configuration_reads_all_fields() {
        let node = json!([
            {"Timeout": "5"},
            {"print_bodies": "TRUE"},
            {"retries": 2},
            {"verbose": false},
            {"variable_binds": {"login": "gbaltar"}},
            {"generators": [{"ids": {"type": "number_sequence", "start": 10}}]}
        ]);
        let config = TestConfig::make_configuration(&node).expect("valid config");

        assert_eq!(config.timeout, 5);
        assert!(config.print_bodies);
        assert_eq!(config.retries, 2);
        assert!(!config.verbose);
        assert_eq!(config.variable_binds.get("login"), Some(&json!("gbaltar")));
        assert_eq!(
            config.generators.get("ids"),
            Some(&GeneratorSpec::NumberSequence { start: 10, increment: 1 })
        );

        let options = config.client_options();
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.retries, 2);
    }

    #[test]
    fn make_configuration_rejects_bad_values() {
        assert!(TestConfig::make_configuration(&json!({"print_bodies": "maybe"})).is_err());
        assert!(TestConfig::make_configuration(&json!({"timeout": -3})).is_err());
        assert!(TestConfig::make_configuration(&json!({"generators": {"g": {"type": "dice"}}})).is_err());
    }

    #[test]
    fn build_context_restarts_generators() {
        let config = TestConfig::make_configuration(&json!({
            "variable_binds": {"login": "gbaltar"},
            "generators": {"ids": {"type": "basic_ids"}}
        }))
        .expect("valid config");

        for _ in 0..2 {
            let mut context = config.build_context();
            assert_eq!(context.get_value("login"), Some(&json!("gbaltar")));
            assert_eq!(context.advance_generator("id", "ids").ok(), Some(&json!(1)));
        }
    }

    #[test]
    fn build_testsets_reads_each_element() {
        let document = json!([
            {"config": {"timeout": 3}},
            {"url": "/api/person/"},
            {"test": {"url": "/api/person/1/", "method": "DELETE", "name": "delete"}},
            {"benchmark": {"url": "/api/person/", "metrics": ["total_time"], "benchmark_runs": 5}}
        ]);
        let mut importing = Vec::new();
        let sets = build_testsets("http://localhost", &document, None, &mut importing)
            .expect("valid document");

        assert_eq!(sets.len(), 1);
        let set = &sets[0];
        assert_eq!(set.name, "inline");
        assert_eq!(set.config.timeout, 3);
        assert_eq!(set.tests.len(), 2);
        assert_eq!(set.tests[0].url, "http://localhost/api/person/");
        assert_eq!(set.tests[0].method, HttpMethod::Get);
        assert_eq!(set.tests[1].expected_status, vec![200, 202, 204]);
        assert_eq!(set.benchmarks.len(), 1);
        assert_eq!(set.benchmarks[0].benchmark_runs, 5);
    }

    #[test]
    fn build_testsets_rejects_non_lists() {
        let mut importing = Vec::new();
        assert!(build_testsets("", &json!({"url": "/"}), None, &mut importing).is_err());
        assert!(build_testsets("", &json!(["/api"]), None, &mut importing).is_err());
        let empty = build_testsets("", &Value::Null, None, &mut importing).expect("empty");
        assert!(empty[0].tests.is_empty());
    }

    #[test]
    fn parse_yaml_file_with_import() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_file(
            dir.path(),
            "extra.yaml",
            "- test:\n    - url: '/api/extra/'\n    - name: 'extra'\n",
        );
        let root = write_file(
            dir.path(),
            "root.yaml",
            "- config:\n    - timeout: 4\n- url: '/api/person/'\n- import: 'extra.yaml'\n",
        );

        let sets = parse_testsets("http://host", &root).expect("valid documents");
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].name, "root");
        assert_eq!(sets[1].name, "extra");
        assert_eq!(sets[1].tests[0].url, "http://host/api/extra/");
        assert_eq!(sets[1].config.timeout, 4);
    }

    #[test]
    fn imported_config_wins_over_parent() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_file(dir.path(), "child.yaml", "- config: {timeout: 9}\n- url: '/child'\n");
        let root = write_file(
            dir.path(),
            "root.yaml",
            "- import: 'child.yaml'\n- config: {timeout: 2}\n",
        );

        let sets = parse_testsets("", &root).expect("valid documents");
        assert_eq!(sets[0].config.timeout, 2);
        assert_eq!(sets[1].config.timeout, 9);
    }

    #[test]
    fn import_cycles_are_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_file(dir.path(), "a.yaml", "- import: 'b.yaml'\n");
        write_file(dir.path(), "b.yaml", "- import: 'a.yaml'\n");

        let err = parse_testsets("", dir.path().join("a.yaml")).unwrap_err();
        assert!(err.to_string().contains("import cycle"), "{err}");
    }

    #[test]
    fn imports_resolve_next_to_a_nested_test_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let suite = dir.path().join("suite");
        std::fs::create_dir(&suite).expect("suite dir");
        write_file(&suite, "extra.yaml", "- url: '/extra'\n");
        let root = write_file(&suite, "root.yaml", "- import: 'extra.yaml'\n");

        let sets = parse_testsets("http://host", &root).expect("import found beside root");
        assert_eq!(sets.len(), 2);
        let source = sets[1].source.as_deref().expect("imported source");
        assert!(source.ends_with("suite/extra.yaml"), "{}", source.display());
        assert_eq!(sets[1].tests[0].url, "http://host/extra");
    }

    #[test]
    fn missing_import_is_an_io_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = write_file(dir.path(), "root.yaml", "- import: 'nope.yaml'\n");
        assert!(matches!(parse_testsets("", &root), Err(Error::Io { .. })));
    }
}
