use std::fmt::{self, Display};
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::error::ParseError;

/// Keyword asking for raw samples instead of an aggregate.
pub const ALL_SAMPLES: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    MeanArithmetic,
    MeanHarmonic,
    Median,
    StdDeviation,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error("no samples to aggregate")]
    Empty,

    #[error("harmonic mean is undefined for a zero sample")]
    ZeroSample,
}

impl Aggregate {
    pub const ALL: [Aggregate; 4] = [
        Aggregate::MeanArithmetic,
        Aggregate::MeanHarmonic,
        Aggregate::Median,
        Aggregate::StdDeviation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Aggregate::MeanArithmetic => "mean_arithmetic",
            Aggregate::MeanHarmonic => "mean_harmonic",
            Aggregate::Median => "median",
            Aggregate::StdDeviation => "std_deviation",
        }
    }

    pub fn apply(self, samples: &[f64]) -> Result<f64, AggregateError> {
        if samples.is_empty() {
            return Err(AggregateError::Empty);
        }
        match self {
            Aggregate::MeanArithmetic => Ok(mean_arithmetic(samples)),
            Aggregate::MeanHarmonic => mean_harmonic(samples),
            Aggregate::Median => Ok(median(samples)),
            Aggregate::StdDeviation => Ok(std_deviation(samples)),
        }
    }
}

impl Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Aggregate {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mean" | "mean_arithmetic" => Ok(Aggregate::MeanArithmetic),
            "mean_harmonic" => Ok(Aggregate::MeanHarmonic),
            "median" => Ok(Aggregate::Median),
            "std_deviation" => Ok(Aggregate::StdDeviation),
            _ => Err(ParseError::UnknownAggregate(value.to_string())),
        }
    }
}

/// Parse an aggregate name where `all` means "keep the raw samples".
pub fn parse_aggregate(value: &str) -> Result<Option<Aggregate>, ParseError> {
    if value.trim().eq_ignore_ascii_case(ALL_SAMPLES) {
        Ok(None)
    } else {
        value.parse().map(Some)
    }
}

fn mean_arithmetic(samples: &[f64]) -> f64 {
    samples.iter().sum::<f64>() / samples.len() as f64
}

fn mean_harmonic(samples: &[f64]) -> Result<f64, AggregateError> {
    if samples.contains(&0.0) {
        return Err(AggregateError::ZeroSample);
    }
    let reciprocal_sum: f64 = samples.iter().map(|value| 1.0 / value).sum();
    Ok(samples.len() as f64 / reciprocal_sum)
}

fn median(samples: &[f64]) -> f64 {
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    let middle = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[middle]
    } else {
        (sorted[middle - 1] + sorted[middle]) / 2.0
    }
}

/// Population standard deviation.
fn std_deviation(samples: &[f64]) -> f64 {
    if samples.len() == 1 {
        return 0.0;
    }
    let mean = mean_arithmetic(samples);
    let variance = samples
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / samples.len() as f64;
    variance.sqrt()
}
