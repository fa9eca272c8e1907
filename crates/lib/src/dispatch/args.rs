//! Tokenizing a build program's argument vector.
//!
//! Tokens are either target selections (`Name` or `Name:input`) or options
//! (`--name=value`, `--name value`, `-x`, `-x<value>`). Option names resolve
//! by abbreviation among the built-ins and the owner's declared options.
//! `--` ends option parsing.

use crate::dispatch::abbrev::{Resolution, resolve};
use crate::dispatch::options::{OptionSchema, OptionValue, Verbosity};
use crate::error::UsageError;

/// Built-in long options, reserved for every owner.
pub const BUILTIN_LONG: [&str; 3] = ["help", "verbosity", "list-targets"];

/// Built-in short options, reserved for every owner.
pub const BUILTIN_SHORT: [char; 2] = ['h', 'v'];

/// A target selection as typed on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetToken {
  pub name: String,
  pub input: Option<String>,
}

impl TargetToken {
  fn parse(token: &str) -> Self {
    match token.split_once(':') {
      Some((name, input)) => Self {
        name: name.to_string(),
        input: Some(input.to_string()),
      },
      None => Self {
        name: token.to_string(),
        input: None,
      },
    }
  }
}

/// The command line, split into built-in switches, option bindings and target tokens.
#[derive(Debug, Default, PartialEq)]
pub struct CommandLine {
  pub help: bool,
  pub list_targets: bool,
  pub verbosity: Option<Verbosity>,
  /// Option bindings in command-line order: (index into the schema, value).
  pub bindings: Vec<(usize, OptionValue)>,
  pub targets: Vec<TargetToken>,
}

enum Flag {
  Help,
  Verbosity,
  ListTargets,
  Owner(usize),
}

/// True when `-h` or `--help` appears as an option before any `--`.
///
/// Help short-circuits even when the rest of the command line is invalid.
/// A token consumed as the value of the preceding option (`--out -h`) is not
/// a help request; unknown options are skipped without error.
pub fn requests_help<O>(args: &[String], schema: &OptionSchema<O>) -> bool {
  let mut tokens = args.iter();
  while let Some(token) = tokens.next() {
    match token.as_str() {
      "--" => return false,
      "-h" | "--help" | "-?" => return true,
      _ if takes_separate_value(token, schema) => {
        tokens.next();
      }
      _ => {}
    }
  }
  false
}

/// True for an option token whose value is the following argument.
fn takes_separate_value<O>(token: &str, schema: &OptionSchema<O>) -> bool {
  let flag = if let Some(long) = token.strip_prefix("--") {
    if long.contains('=') {
      return false;
    }
    long_flag(long, schema)
  } else if let Some(short) = token.strip_prefix('-') {
    let mut chars = short.chars();
    match (chars.next(), chars.as_str()) {
      (Some(c), "") => short_flag(c, schema),
      _ => return false,
    }
  } else {
    return false;
  };

  match flag {
    Ok(Flag::Verbosity) => true,
    Ok(Flag::Owner(index)) => schema.specs()[index].kind.takes_value(),
    _ => false,
  }
}

pub fn parse<O>(args: &[String], schema: &OptionSchema<O>) -> Result<CommandLine, UsageError> {
  let mut line = CommandLine::default();
  let mut tokens = args.iter();
  let mut options_done = false;

  while let Some(token) = tokens.next() {
    if options_done || !token.starts_with('-') || token == "-" {
      line.targets.push(TargetToken::parse(token));
      continue;
    }
    if token == "--" {
      options_done = true;
      continue;
    }

    let (flag, display, inline) = if let Some(long) = token.strip_prefix("--") {
      let (name, value) = match long.split_once('=') {
        Some((name, value)) => (name, Some(value.to_string())),
        None => (long, None),
      };
      (long_flag(name, schema)?, format!("--{}", name), value)
    } else {
      let mut chars = token[1..].chars();
      let short = chars.next().unwrap_or('-');
      let rest = chars.as_str();
      let value = (!rest.is_empty()).then(|| rest.to_string());
      (short_flag(short, schema)?, format!("-{}", short), value)
    };

    match flag {
      Flag::Help => line.help = true,
      Flag::ListTargets => line.list_targets = true,
      Flag::Verbosity => {
        let raw = value_for(&display, inline, &mut tokens)?;
        let level = raw.parse::<Verbosity>().map_err(|reason| UsageError::InvalidValue {
          option: display.clone(),
          value: raw.clone(),
          reason,
        })?;
        line.verbosity = Some(level);
      }
      Flag::Owner(index) => {
        let spec = &schema.specs()[index];
        let raw = if spec.kind.takes_value() {
          value_for(&display, inline, &mut tokens)?
        } else {
          inline.unwrap_or_else(|| "true".to_string())
        };
        let value = spec.kind.coerce(&raw).map_err(|reason| UsageError::InvalidValue {
          option: format!("--{}", spec.long),
          value: raw.clone(),
          reason,
        })?;
        line.bindings.push((index, value));
      }
    }
  }

  Ok(line)
}

fn value_for<'a>(
  option: &str,
  inline: Option<String>,
  tokens: &mut impl Iterator<Item = &'a String>,
) -> Result<String, UsageError> {
  inline
    .or_else(|| tokens.next().cloned())
    .ok_or_else(|| UsageError::MissingValue {
      option: option.to_string(),
    })
}

fn long_flag<O>(name: &str, schema: &OptionSchema<O>) -> Result<Flag, UsageError> {
  let candidates: Vec<&str> = BUILTIN_LONG
    .iter()
    .copied()
    .chain(schema.specs().iter().map(|spec| spec.long.as_str()))
    .collect();

  match resolve(name, candidates.iter().copied(), false) {
    Resolution::Unique(0) => Ok(Flag::Help),
    Resolution::Unique(1) => Ok(Flag::Verbosity),
    Resolution::Unique(2) => Ok(Flag::ListTargets),
    Resolution::Unique(index) => Ok(Flag::Owner(index - BUILTIN_LONG.len())),
    Resolution::NotFound => Err(UsageError::UnknownOption(format!("--{}", name))),
    Resolution::Ambiguous(matches) => Err(UsageError::AmbiguousOption {
      query: format!("--{}", name),
      candidates: matches.iter().map(|m| format!("--{}", m)).collect(),
    }),
  }
}

fn short_flag<O>(short: char, schema: &OptionSchema<O>) -> Result<Flag, UsageError> {
  match short {
    'h' | '?' => Ok(Flag::Help),
    'v' => Ok(Flag::Verbosity),
    _ => schema
      .specs()
      .iter()
      .position(|spec| spec.short == Some(short))
      .map(Flag::Owner)
      .ok_or_else(|| UsageError::UnknownOption(format!("-{}", short))),
  }
}
