//! Collaborators for target bodies: processes, globbing and file timestamps.

pub mod fs;
pub mod glob;
pub mod process;

#[cfg(test)]
pub mod testutil;

pub use fs::{copy_if_newer, hard_link_or_copy, is_out_of_date, newest_modification};
pub use glob::{Glob, GlobError, Pattern};
pub use process::{ProcessError, ProcessOutput, ProcessSpec, run_process};
