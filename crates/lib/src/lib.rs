//! kiln-lib: a build-orchestration runtime where build logic is ordinary Rust.
//!
//! A build program groups related operations ("targets") on owner types:
//! - `target`: registration of an owner's targets and their descriptors
//! - `memo`: run-at-most-once memoization of every (target, input) invocation
//! - `context`: the per-run registry of owner instances
//! - `dispatch`: command-line parsing, abbreviation matching and exit codes
//! - `rebuild`: the self-rebuild protocol shared with the `kiln` launcher
//!
//! Targets call into the collaborators under `util` (processes, globbing,
//! file helpers) and the tool owners under `tools`.

pub mod consts;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod memo;
pub mod rebuild;
pub mod target;
pub mod tools;
pub mod util;

pub use context::RunContext;
pub use dispatch::{Dispatcher, RunStatus, Verbosity};
pub use error::{ConfigurationError, UsageError};
pub use memo::{InvocationFailure, Memo, spawn};
pub use rebuild::{RebuildCheck, Staleness};
pub use target::{TargetDescriptor, TargetOwner, TargetTable};
