//! Declarative HTTP tests: YAML test sets with templated requests, variable
//! binding across tests, JSON response validators and request benchmarks.

pub mod benchmark;
pub mod cli;
pub mod config;
pub mod content;
pub mod context;
pub mod error;
pub mod http;
pub mod logging;
pub mod runner;
pub mod storage;
pub mod template;
pub mod testcase;
pub mod validators;

pub use config::{TestConfig, TestSet, parse_testsets};
pub use context::Context;
pub use error::{Error, ParseError, Result};
pub use testcase::{RealizedTest, Test};
