//! Owners wrapping external tools, for use as collaborators of build owners.
//!
//! Each is registered once per directory through [`RunContext::owner`](crate::RunContext::owner),
//! so every owner of a run asking for the same repository or project shares
//! its memoized results.

pub mod cargo;
pub mod git;

pub use cargo::{Cargo, Profile};
pub use git::Git;
