//! Exit codes and environment variables shared by build programs and the launcher.

/// Every requested target succeeded.
pub const EXIT_SUCCESS: i32 = 0;

/// Help or the target listing was printed; no target ran.
pub const EXIT_HELP_SHOWN: i32 = 1;

/// The build program is older than its sources and must be recompiled and rerun.
pub const EXIT_STALE: i32 = 2;

/// A target failed.
pub const EXIT_TARGET_FAILED: i32 = 3;

/// The command line or the target graph did not resolve (EX_USAGE).
pub const EXIT_USAGE: i32 = 64;

/// Default verbosity applied before command-line options.
pub const VERBOSITY_ENV: &str = "KILN_VERBOSITY";

/// Set to `1` to skip the self-rebuild check.
pub const NO_REBUILD_ENV: &str = "KILN_NO_REBUILD";
