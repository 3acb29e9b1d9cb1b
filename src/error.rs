//! Error types for building and running test sets.

use std::path::PathBuf;

use thiserror::Error;

/// Malformed input found while building a test, validator or benchmark.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid content definition: {0}")]
    Content(String),

    #[error("Unsupported comparator `{0}`")]
    UnknownComparator(String),

    #[error("Unknown validator `{0}`")]
    UnknownValidator(String),

    #[error("Invalid expected status `{0}`")]
    ExpectedStatus(String),

    #[error("Unsupported HTTP method `{0}`")]
    Method(String),

    #[error("Unknown benchmark metric `{0}`")]
    UnknownMetric(String),

    #[error("Unknown aggregate `{0}`")]
    UnknownAggregate(String),

    #[error("Invalid generator `{name}`: {reason}")]
    Generator { name: String, reason: String },

    #[error("Invalid value for `{field}`: {reason}")]
    Field { field: String, reason: String },
}

impl ParseError {
    pub fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ParseError::Field {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Failed to read `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Response body is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Failed to parse test document: {0}")]
    Document(#[from] serde_yaml::Error),

    #[error("Variable `{0}` is not bound")]
    Lookup(String),

    #[error("Generator `{0}` is not registered")]
    UnknownGenerator(String),

    #[error("Generator `{0}` is exhausted")]
    GeneratorExhausted(String),

    #[error("Invalid benchmark configuration: {0}")]
    Benchmark(String),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Failed to encode output: {0}")]
    Encode(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
