//! # Test-Set Runner
//!
//! Runs the tests of a set strictly in declaration order, threading one
//! [`Context`] through them, then runs the set's benchmarks against the
//! context the tests left behind.

use std::time::Instant;

use serde::Serialize;

use crate::benchmark::{BenchmarkResult, run_benchmark, write_benchmark};
use crate::config::{TestConfig, TestSet};
use crate::context::Context;
use crate::http::{HttpClient, HttpMethod};
use crate::testcase::Test;
use crate::validators::{ValidationResult, validate_all};

/// Outcome of one executed test.
#[derive(Debug, Clone, Serialize)]
pub struct TestResponse {
    pub name: String,
    pub group: String,
    pub method: HttpMethod,
    pub url: String,
    /// `None` when no response arrived.
    pub response_code: Option<u16>,
    pub passed: bool,
    pub failures: Vec<String>,
    pub validator_results: Vec<ValidationResult>,
    /// Kept alongside `body`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub response_headers: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub duration_ms: u128,
}

impl TestResponse {
    fn new(test: &Test) -> Self {
        Self {
            name: test.name.clone(),
            group: test.group.clone(),
            method: test.method,
            url: test.url.clone(),
            response_code: None,
            passed: false,
            failures: Vec::new(),
            validator_results: Vec::new(),
            response_headers: Vec::new(),
            body: None,
            duration_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub group: String,
    pub total: usize,
    pub passed: usize,
}

impl GroupSummary {
    pub fn succeeded(&self) -> bool {
        self.passed == self.total
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TestSetReport {
    pub name: String,
    pub results: Vec<TestResponse>,
    pub groups: Vec<GroupSummary>,
    pub benchmarks: Vec<BenchmarkResult>,
    /// Benchmarks that could not run or whose output could not be written.
    pub errors: Vec<String>,
}

impl TestSetReport {
    pub fn passed(&self) -> bool {
        self.errors.is_empty() && self.results.iter().all(|result| result.passed)
    }
}

/// Summary report for a whole run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u128,
    pub testsets: Vec<TestSetReport>,
}

impl RunReport {
    pub fn new(testsets: Vec<TestSetReport>, duration_ms: u128) -> Self {
        let total = testsets.iter().map(|set| set.results.len()).sum();
        let passed = testsets
            .iter()
            .flat_map(|set| &set.results)
            .filter(|result| result.passed)
            .count();
        Self {
            total,
            passed,
            failed: total - passed,
            duration_ms,
            testsets,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.testsets.iter().all(TestSetReport::passed)
    }
}

/// Realize and send one test, then check its status and validators.
/// Realization and transport failures become failed responses.
pub async fn run_test(
    test: &Test,
    config: &TestConfig,
    client: &dyn HttpClient,
    context: &mut Context,
) -> TestResponse {
    let mut result = TestResponse::new(test);

    let realized = match test.realize(context) {
        Ok(realized) => realized,
        Err(err) => {
            result.failures.push(err.to_string());
            return result;
        }
    };
    result.url = realized.request.url.clone();
    if config.verbose {
        tracing::info!(
            test = %realized.name,
            method = %realized.request.method,
            url = %realized.request.url,
            headers = ?realized.request.headers,
            "sending request"
        );
    } else {
        tracing::debug!(
            test = %realized.name,
            method = %realized.request.method,
            url = %realized.request.url,
            "sending request"
        );
    }

    let started = Instant::now();
    let response = match client.execute(&realized.request).await {
        Ok(response) => response,
        Err(err) => {
            result.duration_ms = started.elapsed().as_millis();
            result.failures.push(err.to_string());
            return result;
        }
    };
    result.duration_ms = started.elapsed().as_millis();
    result.response_code = Some(response.status);

    if realized.status_expected(response.status) {
        result.validator_results = validate_all(&test.validators, &response.body, Some(&*context));
        result.failures.extend(
            result
                .validator_results
                .iter()
                .filter(|validation| !validation.passed)
                .map(|validation| format!("{}: {}", validation.validator, validation.message)),
        );
    } else {
        result.failures.push(format!(
            "Invalid HTTP response code: response code {} not in expected codes {:?}",
            response.status, realized.expected_status
        ));
    }

    result.passed = result.failures.is_empty();
    if config.print_bodies || !result.passed {
        result.response_headers = response.headers;
        result.body = Some(response.body);
    }
    result
}

pub async fn execute_testset(testset: &TestSet, client: &dyn HttpClient) -> TestSetReport {
    let mut context = testset.config.build_context();
    let mut report = TestSetReport {
        name: testset.name.clone(),
        ..TestSetReport::default()
    };

    for test in &testset.tests {
        let result = run_test(test, &testset.config, client, &mut context).await;
        if result.passed {
            tracing::debug!(test = %result.name, url = %result.url, "test passed");
        } else {
            tracing::warn!(
                test = %result.name,
                url = %result.url,
                failures = ?result.failures,
                "test failed"
            );
        }
        record_group(&mut report.groups, &result);
        report.results.push(result);
    }

    for group in &report.groups {
        if group.succeeded() {
            tracing::info!(
                "Test Group {} SUCCEEDED: {}/{} Tests Passed!",
                group.group,
                group.passed,
                group.total
            );
        } else {
            tracing::warn!(
                "Test Group {} FAILED: {}/{} Tests Passed!",
                group.group,
                group.passed,
                group.total
            );
        }
    }

    let output_dir = testset.source.as_deref().and_then(std::path::Path::parent);
    for benchmark in &testset.benchmarks {
        match run_benchmark(benchmark, client, &mut context).await {
            Ok(result) => {
                if let Err(err) = write_benchmark(&result, benchmark, output_dir) {
                    report.errors.push(err.to_string());
                }
                report.benchmarks.push(result);
            }
            Err(err) => {
                tracing::warn!(benchmark = %benchmark.test.name, error = %err, "benchmark failed");
                report
                    .errors
                    .push(format!("benchmark `{}`: {err}", benchmark.test.name));
            }
        }
    }

    report
}

fn record_group(groups: &mut Vec<GroupSummary>, result: &TestResponse) {
    let index = match groups.iter().position(|group| group.group == result.group) {
        Some(index) => index,
        None => {
            groups.push(GroupSummary {
                group: result.group.clone(),
                ..GroupSummary::default()
            });
            groups.len() - 1
        }
    };
    let group = &mut groups[index];
    group.total += 1;
    if result.passed {
        group.passed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::http::{HttpRequest, HttpResponse};
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedClient {
        status: u16,
        body: &'static str,
    }

    #[async_trait]
    impl HttpClient for FixedClient {
        async fn execute(&self, _request: &HttpRequest) -> Result<HttpResponse> {
            Ok(HttpResponse {
                status: self.status,
                headers: vec![("content-type".into(), "application/json".into())],
                body: self.body.to_string(),
                ..HttpResponse::default()
            })
        }
    }

    struct RefusingClient;

    #[async_trait]
    impl HttpClient for RefusingClient {
        async fn execute(&self, _request: &HttpRequest) -> Result<HttpResponse> {
            Err(Error::Transport("connection refused".into()))
        }
    }

    fn test_from(node: serde_json::Value) -> Test {
        Test::build_test("http://host", &node).expect("valid test")
    }

    #[tokio::test]
    async fn status_and_validators_pass() {
        let test = test_from(json!({
            "url": "/api",
            "validators": [{"compare": {"jsonpath_mini": "id", "comparator": "eq", "expected": 3}}]
        }));
        let client = FixedClient { status: 200, body: r#"{"id": 3}"# };
        let mut context = Context::new();

        let result = run_test(&test, &TestConfig::default(), &client, &mut context).await;
        assert!(result.passed, "{:?}", result.failures);
        assert_eq!(result.response_code, Some(200));
        assert_eq!(result.validator_results.len(), 1);
        assert_eq!(result.body, None);
        assert!(result.response_headers.is_empty());
    }

    #[tokio::test]
    async fn unexpected_status_fails_and_keeps_body() {
        let test = test_from(json!({"url": "/api", "method": "POST"}));
        let client = FixedClient { status: 500, body: "boom" };
        let mut context = Context::new();

        let result = run_test(&test, &TestConfig::default(), &client, &mut context).await;
        assert!(!result.passed);
        assert_eq!(result.response_code, Some(500));
        assert!(result.failures[0].contains("500"));
        assert_eq!(result.body.as_deref(), Some("boom"));
        assert_eq!(
            result.response_headers,
            vec![("content-type".to_string(), "application/json".to_string())]
        );
    }

    #[tokio::test]
    async fn transport_error_has_no_response_code() {
        let test = test_from(json!({"url": "/api"}));
        let mut context = Context::new();

        let result = run_test(&test, &TestConfig::default(), &RefusingClient, &mut context).await;
        assert!(!result.passed);
        assert_eq!(result.response_code, None);
        assert!(result.failures[0].contains("connection refused"));
    }

    #[tokio::test]
    async fn print_bodies_keeps_passing_bodies() {
        let test = test_from(json!({"url": "/api"}));
        let config = TestConfig {
            print_bodies: true,
            ..TestConfig::default()
        };
        let client = FixedClient { status: 200, body: "ok" };
        let mut context = Context::new();

        let result = run_test(&test, &config, &client, &mut context).await;
        assert!(result.passed);
        assert_eq!(result.body.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn groups_are_summarized_in_order() {
        let testset = TestSet {
            name: "groups".into(),
            tests: vec![
                test_from(json!({"url": "/a", "group": "Quick"})),
                test_from(json!({"url": "/b", "group": "Slow", "expected_status": 404})),
                test_from(json!({"url": "/c", "group": "Quick"})),
            ],
            ..TestSet::default()
        };
        let client = FixedClient { status: 200, body: "{}" };

        let report = execute_testset(&testset, &client).await;
        assert_eq!(
            report.groups,
            vec![
                GroupSummary { group: "Quick".into(), total: 2, passed: 2 },
                GroupSummary { group: "Slow".into(), total: 1, passed: 0 },
            ]
        );
        assert!(!report.passed());

        let run = RunReport::new(vec![report], 5);
        assert_eq!((run.total, run.passed, run.failed), (3, 2, 1));
        assert!(!run.succeeded());
    }
}
