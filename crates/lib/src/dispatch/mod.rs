//! The command-line front end of a build program.
//!
//! [`Dispatcher::run`] turns an argument vector into target invocations on a
//! fresh owner instance and maps the outcome to an exit code:
//!
//! 1. self-rebuild check (stale artifact: notice, exit 2)
//! 2. target table and option schema validation (exit 64)
//! 3. `--help` short-circuit (exit 1)
//! 4. option binding, left to right, on the newly created owner
//! 5. target resolution by abbreviation, then sequential execution
//!
//! Nothing runs when any step before execution fails.

pub mod abbrev;
pub mod args;
pub mod help;
pub mod options;

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info};

use crate::consts::{EXIT_HELP_SHOWN, EXIT_STALE, EXIT_SUCCESS, EXIT_TARGET_FAILED, EXIT_USAGE, VERBOSITY_ENV};
use crate::context::RunContext;
use crate::error::{ConfigurationError, UsageError};
use crate::logging;
use crate::memo::InvocationFailure;
use crate::rebuild::{RebuildCheck, Staleness};
use crate::target::{BoundInput, TargetOwner, TargetTable, owner_name};

use abbrev::Resolution;
use args::{BUILTIN_LONG, BUILTIN_SHORT, TargetToken};
use options::OptionSchema;

pub use options::Verbosity;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
  Success,
  /// Help or the target listing was printed; nothing ran.
  HelpShown,
  /// The executable is older than its sources; nothing ran.
  Stale,
  TargetFailed,
  /// The command line or the owner's declarations are invalid; nothing ran.
  UsageError,
}

impl RunStatus {
  pub fn code(self) -> i32 {
    match self {
      RunStatus::Success => EXIT_SUCCESS,
      RunStatus::HelpShown => EXIT_HELP_SHOWN,
      RunStatus::Stale => EXIT_STALE,
      RunStatus::TargetFailed => EXIT_TARGET_FAILED,
      RunStatus::UsageError => EXIT_USAGE,
    }
  }
}

#[derive(Debug, Error)]
enum DispatchError {
  #[error(transparent)]
  Usage(#[from] UsageError),

  #[error(transparent)]
  Configuration(#[from] ConfigurationError),
}

/// A resolved top-level target selection.
struct Invocation {
  index: usize,
  input: Option<BoundInput>,
}

pub struct Dispatcher {
  program: String,
  rebuild: Option<RebuildCheck>,
}

impl Dispatcher {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      rebuild: None,
    }
  }

  /// Refuse to run when the executable is older than the sources `check` covers.
  pub fn self_rebuild(mut self, check: RebuildCheck) -> Self {
    self.rebuild = Some(check);
    self
  }

  /// Run with the process arguments and exit with the resulting code.
  pub fn main<O, F>(self, create: F) -> !
  where
    O: TargetOwner,
    F: FnOnce(&Arc<RunContext>) -> O,
  {
    let args: Vec<String> = std::env::args_os()
      .skip(1)
      .map(|arg| arg.to_string_lossy().into_owned())
      .collect();

    let runtime = match tokio::runtime::Runtime::new() {
      Ok(runtime) => runtime,
      Err(err) => {
        eprintln!("error: failed to start the async runtime: {}", err);
        std::process::exit(EXIT_TARGET_FAILED);
      }
    };

    let status = runtime.block_on(self.run(&args, create, &mut io::stdout(), &mut io::stderr()));
    let _ = io::stdout().flush();
    std::process::exit(status.code())
  }

  /// Dispatch `args` against a new owner built by `create`.
  ///
  /// Help, listings and target output go to `out`; diagnostics go to `err`.
  pub async fn run<O, F>(&self, args: &[String], create: F, out: &mut dyn Write, err: &mut dyn Write) -> RunStatus
  where
    O: TargetOwner,
    F: FnOnce(&Arc<RunContext>) -> O,
  {
    match self.dispatch(args, create, out, err).await {
      Ok(status) => status,
      Err(io_err) => {
        debug!(error = %io_err, "failed to write output");
        RunStatus::TargetFailed
      }
    }
  }

  async fn dispatch<O, F>(
    &self,
    args: &[String],
    create: F,
    out: &mut dyn Write,
    err: &mut dyn Write,
  ) -> io::Result<RunStatus>
  where
    O: TargetOwner,
    F: FnOnce(&Arc<RunContext>) -> O,
  {
    if let Some(check) = &self.rebuild
      && !RebuildCheck::disabled()
    {
      match check.check() {
        Ok(Staleness::Fresh) => {}
        Ok(Staleness::Stale { artifact, source }) => {
          writeln!(
            err,
            "{}: {} is not newer than {}; rebuild required",
            self.program,
            artifact.display(),
            source.display()
          )?;
          return Ok(RunStatus::Stale);
        }
        Err(check_err) => writeln!(err, "warning: skipping rebuild check: {}", check_err)?,
      }
    }

    let (table, schema) = match load::<O>() {
      Ok(loaded) => loaded,
      Err(config_err) => {
        writeln!(err, "error: {}", config_err)?;
        return Ok(RunStatus::UsageError);
      }
    };
    let help_text = help::render(&self.program, &table, &schema);

    if args::requests_help(args, &schema) {
      out.write_all(help_text.as_bytes())?;
      return Ok(RunStatus::HelpShown);
    }

    let line = match args::parse(args, &schema) {
      Ok(line) => line,
      Err(usage) => {
        writeln!(err, "error: {}", usage)?;
        out.write_all(help_text.as_bytes())?;
        return Ok(RunStatus::UsageError);
      }
    };

    if line.help {
      out.write_all(help_text.as_bytes())?;
      return Ok(RunStatus::HelpShown);
    }
    if line.list_targets {
      let listing = serde_json::to_string_pretty(&table.descriptors()).map_err(io::Error::other)?;
      writeln!(out, "{}", listing)?;
      return Ok(RunStatus::HelpShown);
    }

    let verbosity = match line.verbosity {
      Some(level) => level,
      None => env_verbosity(err)?,
    };
    logging::init(verbosity);

    let invocations = match resolve_targets(&table, &line.targets) {
      Ok(invocations) => invocations,
      Err(DispatchError::Usage(usage)) => {
        writeln!(err, "error: {}", usage)?;
        out.write_all(help_text.as_bytes())?;
        return Ok(RunStatus::UsageError);
      }
      Err(DispatchError::Configuration(config_err)) => {
        writeln!(err, "error: {}", config_err)?;
        return Ok(RunStatus::UsageError);
      }
    };

    let ctx = RunContext::new(verbosity);
    let mut owner = create(&ctx);
    for (index, value) in line.bindings {
      let spec = &schema.specs()[index];
      debug!(option = %spec.long, value = ?value, "binding option");
      spec.apply(&mut owner, value);
    }
    let owner = ctx.adopt((), owner);

    for invocation in invocations {
      let entry = &table.entries()[invocation.index];
      info!(name = %entry.name(), "starting target");
      let started = Instant::now();

      match entry.start(Arc::clone(&owner), invocation.input).await {
        Ok(result) => info!(
          name = %entry.name(),
          elapsed = ?started.elapsed(),
          result = result.as_deref().unwrap_or("()"),
          "target succeeded"
        ),
        Err(failure) => {
          report_failure(&failure, verbosity, err)?;
          return Ok(RunStatus::TargetFailed);
        }
      }
    }

    Ok(RunStatus::Success)
  }
}

fn load<O: TargetOwner>() -> Result<(TargetTable<O>, OptionSchema<O>), ConfigurationError> {
  let table = TargetTable::<O>::of()?;
  let mut schema = OptionSchema::default();
  O::options(&mut schema);
  schema.validate(&BUILTIN_LONG, &BUILTIN_SHORT)?;
  Ok((table, schema))
}

fn env_verbosity(err: &mut dyn Write) -> io::Result<Verbosity> {
  let Ok(raw) = std::env::var(VERBOSITY_ENV) else {
    return Ok(Verbosity::default());
  };
  match raw.parse::<Verbosity>() {
    Ok(level) => Ok(level),
    Err(reason) => {
      writeln!(err, "warning: ignoring {}={}: {}", VERBOSITY_ENV, raw, reason)?;
      Ok(Verbosity::default())
    }
  }
}

fn resolve_targets<O: TargetOwner>(
  table: &TargetTable<O>,
  tokens: &[TargetToken],
) -> Result<Vec<Invocation>, DispatchError> {
  if tokens.is_empty() {
    let index = table
      .entries()
      .iter()
      .position(|entry| entry.descriptor().is_default)
      .ok_or_else(|| ConfigurationError::MissingDefault { owner: owner_name::<O>() })?;
    return Ok(vec![Invocation { index, input: None }]);
  }

  tokens
    .iter()
    .map(|token| resolve_token(table, token).map_err(DispatchError::from))
    .collect()
}

fn resolve_token<O>(table: &TargetTable<O>, token: &TargetToken) -> Result<Invocation, UsageError> {
  let names = table.entries().iter().map(|entry| entry.name());
  let index = match abbrev::resolve(&token.name, names, table.substring_matching()) {
    Resolution::Unique(index) => index,
    Resolution::NotFound => return Err(UsageError::UnknownTarget(token.name.clone())),
    Resolution::Ambiguous(candidates) => {
      return Err(UsageError::AmbiguousTarget {
        query: token.name.clone(),
        candidates,
      });
    }
  };

  let entry = &table.entries()[index];
  let target = entry.name().to_string();
  let input = match (&token.input, entry.takes_input()) {
    (None, false) => None,
    (Some(_), false) => return Err(UsageError::UnexpectedInput { target }),
    (None, true) => {
      return Err(UsageError::MissingInput {
        input: entry.descriptor().input.clone().unwrap_or_default(),
        target,
      });
    }
    (Some(raw), true) => Some(entry.parse_input(raw).map_err(|reason| UsageError::InvalidInput {
      target,
      value: raw.clone(),
      reason,
    })?),
  };

  Ok(Invocation { index, input })
}

/// One line by default; the whole cause chain at `detailed`.
fn report_failure(failure: &InvocationFailure, verbosity: Verbosity, err: &mut dyn Write) -> io::Result<()> {
  if verbosity >= Verbosity::Detailed {
    let chain = failure.chain();
    let mut messages = chain.iter();
    if let Some(first) = messages.next() {
      writeln!(err, "error: {}", first)?;
    }
    for cause in messages {
      writeln!(err, "  caused by: {}", cause)?;
    }
    Ok(())
  } else {
    writeln!(err, "error: {}: {}", failure, failure.root_cause())
  }
}
