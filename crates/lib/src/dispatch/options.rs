//! Declared configuration options and value coercion.
//!
//! Each owner lists its options in an [`OptionSchema`]: long name, optional
//! short flag, a type tag and a setter. The dispatcher walks the schema; no
//! runtime introspection is involved. Coercion from the raw command-line text
//! is a closed table: string, boolean, or one of a fixed set of values.

use std::fmt;
use std::str::FromStr;

use crate::dispatch::abbrev::{Resolution, resolve};
use crate::error::ConfigurationError;

/// Diagnostic output volume. Never affects control flow or exit codes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verbosity {
  Quiet,
  Minimal,
  #[default]
  Normal,
  Detailed,
}

impl Verbosity {
  pub const ALL: [Verbosity; 4] = [Verbosity::Quiet, Verbosity::Minimal, Verbosity::Normal, Verbosity::Detailed];

  pub fn as_str(self) -> &'static str {
    match self {
      Verbosity::Quiet => "quiet",
      Verbosity::Minimal => "minimal",
      Verbosity::Normal => "normal",
      Verbosity::Detailed => "detailed",
    }
  }

  /// Default `tracing` filter directive for this level.
  pub fn filter(self) -> &'static str {
    match self {
      Verbosity::Quiet => "error",
      Verbosity::Minimal => "warn",
      Verbosity::Normal => "info",
      Verbosity::Detailed => "debug",
    }
  }
}

impl fmt::Display for Verbosity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Verbosity {
  type Err = String;

  /// Accepts any unambiguous abbreviation: `q`, `min`, `det`.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match resolve(s, Self::ALL.iter().map(|v| v.as_str()), false) {
      Resolution::Unique(index) => Ok(Self::ALL[index]),
      Resolution::NotFound => Err("expected one of quiet, minimal, normal, detailed".to_string()),
      Resolution::Ambiguous(candidates) => Err(format!("ambiguous between {}", candidates.join(", "))),
    }
  }
}

/// Type tag of a declared option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionKind {
  String,
  Bool,
  Choice(Vec<String>),
}

/// A coerced option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
  String(String),
  Bool(bool),
  /// The canonical spelling of the selected value.
  Choice(String),
}

impl OptionKind {
  pub fn takes_value(&self) -> bool {
    !matches!(self, OptionKind::Bool)
  }

  /// Convert raw command-line text to a value of this kind.
  pub fn coerce(&self, raw: &str) -> Result<OptionValue, String> {
    match self {
      OptionKind::String => Ok(OptionValue::String(raw.to_string())),
      OptionKind::Bool => parse_bool(raw).map(OptionValue::Bool),
      OptionKind::Choice(values) => match resolve(raw, values.iter().map(String::as_str), false) {
        Resolution::Unique(index) => Ok(OptionValue::Choice(values[index].clone())),
        Resolution::NotFound => Err(format!("expected one of {}", values.join(", "))),
        Resolution::Ambiguous(candidates) => Err(format!("ambiguous between {}", candidates.join(", "))),
      },
    }
  }
}

fn parse_bool(raw: &str) -> Result<bool, String> {
  match raw.to_lowercase().as_str() {
    "true" | "yes" | "on" | "1" => Ok(true),
    "false" | "no" | "off" | "0" => Ok(false),
    _ => Err("expected true or false".to_string()),
  }
}

type Setter<O> = Box<dyn Fn(&mut O, OptionValue) + Send + Sync>;

/// One declared option.
pub struct OptionSpec<O> {
  pub long: String,
  pub short: Option<char>,
  pub kind: OptionKind,
  pub description: String,
  setter: Setter<O>,
}

impl<O> OptionSpec<O> {
  pub fn apply(&self, owner: &mut O, value: OptionValue) {
    (self.setter)(owner, value)
  }
}

/// The options an owner type accepts.
pub struct OptionSchema<O> {
  specs: Vec<OptionSpec<O>>,
}

impl<O> Default for OptionSchema<O> {
  fn default() -> Self {
    Self { specs: Vec::new() }
  }
}

impl<O> OptionSchema<O> {
  pub fn specs(&self) -> &[OptionSpec<O>] {
    &self.specs
  }

  /// Check the schema against itself and the reserved built-in names.
  pub fn validate(&self, reserved_long: &[&str], reserved_short: &[char]) -> Result<(), ConfigurationError> {
    for (i, spec) in self.specs.iter().enumerate() {
      let clashes_builtin = reserved_long.iter().any(|r| r.eq_ignore_ascii_case(&spec.long));
      let clashes_earlier = self.specs[..i].iter().any(|s| s.long.eq_ignore_ascii_case(&spec.long));
      if clashes_builtin || clashes_earlier {
        return Err(ConfigurationError::DuplicateOption {
          name: spec.long.clone(),
        });
      }

      if let Some(short) = spec.short
        && (reserved_short.contains(&short) || self.specs[..i].iter().any(|s| s.short == Some(short)))
      {
        return Err(ConfigurationError::DuplicateShortOption { short });
      }

      if let OptionKind::Choice(values) = &spec.kind
        && values.is_empty()
      {
        return Err(ConfigurationError::EmptyChoice {
          name: spec.long.clone(),
        });
      }
    }
    Ok(())
  }
}

impl<O: 'static> OptionSchema<O> {
  /// A free-form string option.
  pub fn string<F>(&mut self, long: &str, description: &str, set: F) -> OptionBuilder<'_, O>
  where
    F: Fn(&mut O, String) + Send + Sync + 'static,
  {
    self.push(
      long,
      description,
      OptionKind::String,
      Box::new(move |owner: &mut O, value: OptionValue| {
        if let OptionValue::String(value) = value {
          set(owner, value)
        }
      }),
    )
  }

  /// A boolean switch; `--name` alone means `true`.
  pub fn flag<F>(&mut self, long: &str, description: &str, set: F) -> OptionBuilder<'_, O>
  where
    F: Fn(&mut O, bool) + Send + Sync + 'static,
  {
    self.push(
      long,
      description,
      OptionKind::Bool,
      Box::new(move |owner: &mut O, value: OptionValue| {
        if let OptionValue::Bool(value) = value {
          set(owner, value)
        }
      }),
    )
  }

  /// One of a fixed set of values; abbreviations of a value are accepted.
  pub fn choice<F>(&mut self, long: &str, values: &[&str], description: &str, set: F) -> OptionBuilder<'_, O>
  where
    F: Fn(&mut O, String) + Send + Sync + 'static,
  {
    self.push(
      long,
      description,
      OptionKind::Choice(values.iter().map(|v| v.to_string()).collect()),
      Box::new(move |owner: &mut O, value: OptionValue| {
        if let OptionValue::Choice(value) = value {
          set(owner, value)
        }
      }),
    )
  }

  fn push(&mut self, long: &str, description: &str, kind: OptionKind, setter: Setter<O>) -> OptionBuilder<'_, O> {
    self.specs.push(OptionSpec {
      long: long.to_string(),
      short: None,
      kind,
      description: description.to_string(),
      setter,
    });
    let last = self.specs.len() - 1;
    OptionBuilder {
      spec: &mut self.specs[last],
    }
  }
}

pub struct OptionBuilder<'a, O> {
  spec: &'a mut OptionSpec<O>,
}

impl<O> OptionBuilder<'_, O> {
  /// Also accept `-c` / `-c<value>`.
  pub fn short(self, short: char) -> Self {
    self.spec.short = Some(short);
    self
  }
}
