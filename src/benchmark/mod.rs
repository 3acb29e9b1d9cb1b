//! # Benchmarks
//!
//! A benchmark repeats one test many times and reduces the per-request
//! metrics the HTTP client reports:
//!
//! ```yaml
//! - benchmark:
//!     - url: '/api/person/'
//!     - warmup_runs: 7
//!     - benchmark_runs: 101
//!     - output_file: 'miniapp-benchmark.csv'
//!     - output_format: csv
//!     - metrics:
//!         - total_time
//!         - total_time: mean
//!         - size_download: [mean_harmonic, median]
//! ```
//!
//! A metric listed bare (or with `all`) keeps every sample; a metric listed
//! with aggregates is reduced to one number per aggregate.

pub mod aggregates;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::config::node::{normalize_map, require_string, to_integer};
use crate::context::Context;
use crate::error::{Error, ParseError, Result};
use crate::http::{HttpClient, Metric};
use crate::storage;
use crate::testcase::{RealizedTest, Test};
pub use aggregates::{Aggregate, AggregateError, parse_aggregate};

pub const DEFAULT_WARMUP_RUNS: u32 = 10;
pub const DEFAULT_BENCHMARK_RUNS: u32 = 100;

/// Keys a `benchmark` node accepts beyond the test fields.
pub const BENCHMARK_FIELDS: &[&str] = &[
    "warmup_runs",
    "benchmark_runs",
    "output_format",
    "output_file",
    "metrics",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ParseError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(ParseError::field(
                "output_format",
                format!("expected `json` or `csv`, found `{other}`"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkConfig {
    pub test: Test,
    pub warmup_runs: u32,
    pub benchmark_runs: u32,
    /// Every metric that is sampled.
    pub metrics: BTreeSet<Metric>,
    /// Metrics whose raw samples end up in the result.
    pub raw_metrics: BTreeSet<Metric>,
    pub aggregated_metrics: BTreeMap<Metric, BTreeSet<Aggregate>>,
    pub output_format: OutputFormat,
    pub output_file: Option<PathBuf>,
}

impl BenchmarkConfig {
    pub fn new(test: Test) -> Self {
        Self {
            test,
            warmup_runs: DEFAULT_WARMUP_RUNS,
            benchmark_runs: DEFAULT_BENCHMARK_RUNS,
            metrics: BTreeSet::new(),
            raw_metrics: BTreeSet::new(),
            aggregated_metrics: BTreeMap::new(),
            output_format: OutputFormat::default(),
            output_file: None,
        }
    }

    /// Sample `metric`; keep raw samples when `aggregate` is `None`.
    pub fn add_metric(&mut self, metric: Metric, aggregate: Option<Aggregate>) -> &mut Self {
        self.metrics.insert(metric);
        match aggregate {
            None => {
                self.raw_metrics.insert(metric);
            }
            Some(aggregate) => {
                self.aggregated_metrics
                    .entry(metric)
                    .or_default()
                    .insert(aggregate);
            }
        }
        self
    }

    /// Build from a `benchmark` node: every test field plus the benchmark's own.
    pub fn build(base_url: &str, node: &Value) -> Result<Self> {
        let test = Test::build_with_extra_fields(base_url, node, BENCHMARK_FIELDS)?;
        let mut config = BenchmarkConfig::new(test);
        let fields = normalize_map("benchmark", node)?;

        for (key, value) in &fields {
            match key.as_str() {
                "warmup_runs" => config.warmup_runs = parse_run_count("warmup_runs", value)?,
                "benchmark_runs" => {
                    config.benchmark_runs = parse_run_count("benchmark_runs", value)?
                }
                "output_format" => {
                    config.output_format = require_string("output_format", value)?.parse()?
                }
                "output_file" => {
                    config.output_file = Some(PathBuf::from(require_string("output_file", value)?))
                }
                "metrics" => config.parse_metrics(value)?,
                // test fields, already handled
                _ => {}
            }
        }

        Ok(config)
    }

    /// `name`, `{name: aggregate}`, `{name: [aggregates]}`, or a list of those.
    fn parse_metrics(&mut self, node: &Value) -> std::result::Result<(), ParseError> {
        match node {
            Value::String(name) => {
                self.add_metric(name.parse()?, None);
            }
            Value::Array(items) => {
                for item in items {
                    self.parse_metrics(item)?;
                }
            }
            Value::Object(entries) => {
                for (name, aggregates) in entries {
                    let metric: Metric = name.parse()?;
                    match aggregates {
                        Value::Array(items) => {
                            for item in items {
                                let aggregate = require_string("metrics", item)?;
                                self.add_metric(metric, parse_aggregate(&aggregate)?);
                            }
                        }
                        other => {
                            let aggregate = require_string("metrics", other)?;
                            self.add_metric(metric, parse_aggregate(&aggregate)?);
                        }
                    }
                }
            }
            other => {
                return Err(ParseError::field(
                    "metrics",
                    format!("expected a metric name or map, found `{other}`"),
                ));
            }
        }
        Ok(())
    }

    /// Whether each run has to be realized again rather than reusing one request.
    fn realizes_per_run(&self) -> bool {
        self.test.is_dynamic() || self.test.is_context_modifier()
    }
}

fn parse_run_count(field: &str, node: &Value) -> std::result::Result<u32, ParseError> {
    let count = to_integer(field, node)?;
    u32::try_from(count)
        .ok()
        .filter(|count| *count > 0)
        .ok_or_else(|| ParseError::field(field, format!("must be a positive count, found {count}")))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BenchmarkResult {
    pub name: String,
    pub group: String,
    pub results: BTreeMap<String, Vec<f64>>,
    pub aggregates: BTreeMap<String, BTreeMap<String, f64>>,
    pub failures: u32,
}

/// Copy raw metrics into the result and compute the configured aggregates.
pub fn analyze_benchmark_results(
    raw: &BTreeMap<Metric, Vec<f64>>,
    config: &BenchmarkConfig,
) -> BenchmarkResult {
    let mut result = BenchmarkResult {
        name: config.test.name.clone(),
        group: config.test.group.clone(),
        ..BenchmarkResult::default()
    };

    for metric in &config.raw_metrics {
        if let Some(samples) = raw.get(metric) {
            result.results.insert(metric.to_string(), samples.clone());
        }
    }

    for (metric, aggregates) in &config.aggregated_metrics {
        let Some(samples) = raw.get(metric) else {
            continue;
        };
        let mut computed = BTreeMap::new();
        for aggregate in aggregates {
            match aggregate.apply(samples) {
                Ok(value) => {
                    computed.insert(aggregate.to_string(), value);
                }
                Err(err) => {
                    tracing::warn!(
                        benchmark = %config.test.name,
                        metric = %metric,
                        aggregate = %aggregate,
                        "skipping aggregate: {err}"
                    );
                }
            }
        }
        result.aggregates.insert(metric.to_string(), computed);
    }

    result
}

/// Header row of metric names plus one row per sample index. Shorter sample
/// lists leave `None` cells.
pub fn metrics_to_tuples(
    results: &BTreeMap<String, Vec<f64>>,
) -> (Vec<String>, Vec<Vec<Option<f64>>>) {
    let header = results.keys().cloned().collect();
    let length = results.values().map(Vec::len).max().unwrap_or(0);
    let rows = (0..length)
        .map(|index| {
            results
                .values()
                .map(|samples| samples.get(index).copied())
                .collect()
        })
        .collect();
    (header, rows)
}

/// Run warmups, then sampled runs, and analyze the samples. Transport
/// failures are counted rather than sampled.
pub async fn run_benchmark(
    config: &BenchmarkConfig,
    client: &dyn HttpClient,
    context: &mut Context,
) -> Result<BenchmarkResult> {
    if config.warmup_runs == 0 || config.benchmark_runs == 0 {
        return Err(Error::Benchmark(format!(
            "`{}` needs at least one warmup run and one benchmark run, found {} and {}",
            config.test.name, config.warmup_runs, config.benchmark_runs
        )));
    }

    let per_run = config.realizes_per_run();
    let fixed = if per_run {
        None
    } else {
        Some(config.test.realize(context)?)
    };

    tracing::info!(
        benchmark = %config.test.name,
        warmup_runs = config.warmup_runs,
        benchmark_runs = config.benchmark_runs,
        "benchmark starting"
    );

    for _ in 0..config.warmup_runs {
        let realized = next_realized(config, context, fixed.as_ref())?;
        if let Err(err) = client.execute(&realized.request).await {
            tracing::debug!(benchmark = %config.test.name, error = %err, "warmup request failed");
        }
    }

    let mut samples: BTreeMap<Metric, Vec<f64>> = BTreeMap::new();
    let mut failures = 0;
    for _ in 0..config.benchmark_runs {
        let realized = next_realized(config, context, fixed.as_ref())?;
        match client.execute(&realized.request).await {
            Ok(response) => {
                for metric in &config.metrics {
                    if let Some(value) = response.metric(*metric) {
                        samples.entry(*metric).or_default().push(value);
                    }
                }
            }
            Err(err) => {
                failures += 1;
                tracing::warn!(benchmark = %config.test.name, error = %err, "benchmark request failed");
            }
        }
    }

    tracing::info!(benchmark = %config.test.name, failures, "benchmark finished");

    let mut result = analyze_benchmark_results(&samples, config);
    result.failures = failures;
    Ok(result)
}

fn next_realized(
    config: &BenchmarkConfig,
    context: &mut Context,
    fixed: Option<&RealizedTest>,
) -> Result<RealizedTest> {
    match fixed {
        Some(realized) => Ok(realized.clone()),
        None => config.test.realize(context),
    }
}

/// Write the result to the configured output file, if any.
pub fn write_benchmark(
    result: &BenchmarkResult,
    config: &BenchmarkConfig,
    base_dir: Option<&Path>,
) -> Result<Option<PathBuf>> {
    let Some(output_file) = &config.output_file else {
        return Ok(None);
    };
    let path = match base_dir {
        Some(base) => storage::resolve_relative(base, &output_file.to_string_lossy()),
        None => output_file.clone(),
    };

    let contents = match config.output_format {
        OutputFormat::Json => serde_json::to_string_pretty(result)
            .map_err(|err| Error::Encode(err.to_string()))?,
        OutputFormat::Csv => benchmark_csv(result),
    };
    storage::write_text(&path, &contents)?;
    tracing::info!(benchmark = %result.name, path = %path.display(), "wrote benchmark output");
    Ok(Some(path))
}

fn benchmark_csv(result: &BenchmarkResult) -> String {
    let mut lines = vec![
        csv_row(["Benchmark", result.name.as_str()]),
        csv_row(["Group", result.group.as_str()]),
        csv_row(["Failures".to_string(), result.failures.to_string()]),
    ];

    if !result.results.is_empty() {
        let (header, rows) = metrics_to_tuples(&result.results);
        lines.push(csv_row(header));
        lines.extend(rows.into_iter().map(|row| {
            csv_row(
                row.into_iter()
                    .map(|cell| cell.map(|value| value.to_string()).unwrap_or_default()),
            )
        }));
    }

    if !result.aggregates.is_empty() {
        lines.push(csv_row(["Aggregates"]));
        for (metric, values) in &result.aggregates {
            for (aggregate, value) in values {
                lines.push(csv_row([metric.clone(), aggregate.clone(), value.to_string()]));
            }
        }
    }

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn csv_row<I, S>(cells: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    cells
        .into_iter()
        .map(|cell| {
            let cell = cell.as_ref();
            if cell.contains([',', '"', '\n']) {
                format!("\"{}\"", cell.replace('"', "\"\""))
            } else {
                cell.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}
