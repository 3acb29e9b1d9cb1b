//! Logging bootstrap.
//!
//! Filter directives come from `RESTTEST_LOG` when it is set, otherwise from
//! the `--verbose` flag. Logs go to stderr so stdout stays free for reports.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_ENV: &str = "RESTTEST_LOG";

pub fn init_logging(verbose: bool) -> Result<(), TryInitError> {
    Registry::default()
        .with(build_env_filter(verbose))
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
}

fn build_env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level(verbose)))
}

fn default_level(verbose: bool) -> &'static str {
    if verbose { "resttest=debug,info" } else { "info" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_crate_level() {
        assert_eq!(default_level(false), "info");
        assert!(default_level(true).contains("resttest=debug"));
    }
}
