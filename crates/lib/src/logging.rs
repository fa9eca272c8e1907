//! Diagnostic output for build programs.

use tracing_subscriber::EnvFilter;

use crate::dispatch::Verbosity;

/// The filter for a run: `RUST_LOG` when set and valid, otherwise the verbosity's default.
pub fn filter_for(verbosity: Verbosity) -> EnvFilter {
  EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.filter()))
}

/// Install the process-wide subscriber, writing to stderr.
///
/// Only the first call in a process takes effect.
pub fn init(verbosity: Verbosity) {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter_for(verbosity))
    .with_writer(std::io::stderr)
    .with_target(false)
    .without_time()
    .try_init();
}
