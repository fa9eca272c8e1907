//! Launcher status messages.
//!
//! Everything goes to stderr: stdout belongs to the build program being run.

use std::time::Duration;

use owo_colors::{OwoColorize, Stream};

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const ARROW: &str = "→";
}

/// Elapsed time rounded to milliseconds: `1s 250ms`.
pub fn format_elapsed(elapsed: Duration) -> String {
  let millis = Duration::from_millis(elapsed.as_millis() as u64);
  humantime::format_duration(millis).to_string()
}

pub fn print_step(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ARROW.if_supports_color(Stream::Stderr, |s| s.cyan()),
    message
  );
}

pub fn print_success(message: &str) {
  eprintln!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stderr, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}
