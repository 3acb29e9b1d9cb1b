//! # CLI
//!
//! `resttest <base-url> <test-file>` runs every test set in the file and
//! exits non-zero when any test fails, for use in CI pipelines.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, ValueEnum};

use crate::config::{TestConfig, parse_testsets};
use crate::error::{Error, Result};
use crate::http::ReqwestClient;
use crate::runner::{RunReport, execute_testset};
use crate::storage;

/// Declarative REST API tests and benchmarks
#[derive(Debug, Clone, Parser)]
#[command(name = "resttest", version)]
pub struct Cli {
    /// Base URL prepended to every test url
    pub url: String,

    /// YAML test file
    pub test_file: PathBuf,

    /// Log realized requests and test details
    #[arg(long)]
    pub verbose: bool,

    /// Keep response bodies of passing tests in the report
    #[arg(long)]
    pub print_bodies: bool,

    /// Request timeout in seconds, overriding the test file
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Retries after a transport error, overriding the test file
    #[arg(long)]
    pub retries: Option<u32>,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Also write the report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Output format for CLI reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl Cli {
    /// Command-line flags win over the test file's `config` section.
    pub fn apply_overrides(&self, config: &mut TestConfig) {
        config.verbose |= self.verbose;
        config.print_bodies |= self.print_bodies;
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
    }

    /// Run every test set and print the report. Returns whether all passed.
    pub async fn execute(&self) -> Result<bool> {
        let started = Instant::now();
        let mut testsets = parse_testsets(&self.url, &self.test_file)?;

        let mut reports = Vec::with_capacity(testsets.len());
        for testset in &mut testsets {
            self.apply_overrides(&mut testset.config);
            let client = ReqwestClient::new(testset.config.client_options())?;
            tracing::info!(testset = %testset.name, tests = testset.tests.len(), "running test set");
            reports.push(execute_testset(testset, &client).await);
        }

        let report = RunReport::new(reports, started.elapsed().as_millis());
        let rendered = render_report(&report, self.format)?;
        println!("{rendered}");
        if let Some(path) = &self.report {
            storage::write_text(path, &rendered)?;
        }
        Ok(report.succeeded())
    }
}

pub fn render_report(report: &RunReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)
            .map_err(|err| Error::Encode(err.to_string())),
        OutputFormat::Text => Ok(render_text(report)),
    }
}

fn render_text(report: &RunReport) -> String {
    let mut out = String::new();

    for testset in &report.testsets {
        let _ = writeln!(out, "== {} ==", testset.name);
        for result in &testset.results {
            let status = result
                .response_code
                .map(|code| code.to_string())
                .unwrap_or_else(|| "---".to_string());
            let verdict = if result.passed { "PASS" } else { "FAIL" };
            let _ = writeln!(
                out,
                "[{verdict}] {} {} {} ({status}, {} ms)",
                result.name, result.method, result.url, result.duration_ms
            );
            for failure in &result.failures {
                let _ = writeln!(out, "    {failure}");
            }
            for (name, value) in &result.response_headers {
                let _ = writeln!(out, "    {name}: {value}");
            }
            if let Some(body) = &result.body {
                let _ = writeln!(out, "    body: {body}");
            }
        }
        for group in &testset.groups {
            let verdict = if group.succeeded() { "SUCCEEDED" } else { "FAILED" };
            let _ = writeln!(
                out,
                "Test Group {} {verdict}: {}/{} Tests Passed!",
                group.group, group.passed, group.total
            );
        }
        for benchmark in &testset.benchmarks {
            let _ = writeln!(
                out,
                "Benchmark {} ({} failures)",
                benchmark.name, benchmark.failures
            );
            for (metric, aggregates) in &benchmark.aggregates {
                for (aggregate, value) in aggregates {
                    let _ = writeln!(out, "    {metric} {aggregate}: {value:.6}");
                }
            }
        }
        for error in &testset.errors {
            let _ = writeln!(out, "ERROR {error}");
        }
    }

    let _ = write!(
        out,
        "{} tests, {} passed, {} failed in {} ms",
        report.total, report.passed, report.failed, report.duration_ms
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{GroupSummary, TestSetReport};

    #[test]
    fn parses_flags() {
        let cli = Cli::try_parse_from([
            "resttest",
            "http://localhost:8000",
            "tests.yaml",
            "--timeout",
            "3",
            "--print-bodies",
            "--format",
            "json",
        ])
        .expect("valid arguments");

        assert_eq!(cli.url, "http://localhost:8000");
        assert_eq!(cli.test_file, PathBuf::from("tests.yaml"));
        assert_eq!(cli.timeout, Some(3));
        assert!(cli.print_bodies);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.retries, None);
    }

    #[test]
    fn missing_test_file_is_rejected() {
        assert!(Cli::try_parse_from(["resttest", "http://localhost"]).is_err());
    }

    #[test]
    fn overrides_only_touch_given_flags() {
        let cli = Cli::try_parse_from(["resttest", "http://h", "t.yaml", "--retries", "4"])
            .expect("valid arguments");
        let mut config = TestConfig {
            timeout: 30,
            print_bodies: true,
            ..TestConfig::default()
        };
        cli.apply_overrides(&mut config);

        assert_eq!(config.timeout, 30);
        assert_eq!(config.retries, 4);
        assert!(config.print_bodies);
        assert!(!config.verbose);
    }

    #[test]
    fn text_report_lists_groups_and_totals() {
        let report = RunReport::new(
            vec![TestSetReport {
                name: "smoke".into(),
                groups: vec![GroupSummary {
                    group: "Quick".into(),
                    total: 2,
                    passed: 2,
                }],
                ..TestSetReport::default()
            }],
            12,
        );
        let text = render_report(&report, OutputFormat::Text).expect("rendered");
        assert!(text.contains("== smoke =="));
        assert!(text.contains("Test Group Quick SUCCEEDED: 2/2 Tests Passed!"));
        assert!(text.ends_with("0 tests, 0 passed, 0 failed in 12 ms"));

        let json = render_report(&report, OutputFormat::Json).expect("rendered");
        assert!(json.contains("\"testsets\""));
    }
}
