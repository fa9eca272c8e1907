//! Errors raised before any target runs.

use thiserror::Error;

/// The target graph or option schema of an owner type is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
  /// Nothing was selected on the command line and there is nothing to fall back to.
  #[error("no target was selected and {owner} declares no default target")]
  MissingDefault { owner: String },

  #[error("{owner} declares more than one default target: {}", names.join(", "))]
  MultipleDefaults { owner: String, names: Vec<String> },

  #[error("{owner} declares the default target {name} with an input")]
  DefaultTakesInput { owner: String, name: String },

  /// Two target names are equal ignoring case, so abbreviations cannot tell them apart.
  #[error("{owner} declares ambiguous targets {first} and {second}")]
  DuplicateTarget { owner: String, first: String, second: String },

  #[error("option --{name} is declared more than once")]
  DuplicateOption { name: String },

  #[error("short option -{short} is declared more than once")]
  DuplicateShortOption { short: char },

  #[error("option --{name} declares no allowed values")]
  EmptyChoice { name: String },
}

/// The command line does not resolve against the owner's targets and options.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
  #[error("unknown target '{0}'")]
  UnknownTarget(String),

  #[error("'{query}' is ambiguous between targets {}", candidates.join(", "))]
  AmbiguousTarget { query: String, candidates: Vec<String> },

  #[error("unknown option '{0}'")]
  UnknownOption(String),

  #[error("'{query}' is ambiguous between options {}", candidates.join(", "))]
  AmbiguousOption { query: String, candidates: Vec<String> },

  #[error("option {option} requires a value")]
  MissingValue { option: String },

  #[error("invalid value '{value}' for option {option}: {reason}")]
  InvalidValue {
    option: String,
    value: String,
    reason: String,
  },

  #[error("target {target} requires an input of type {input} (use {target}:<value>)")]
  MissingInput { target: String, input: String },

  #[error("target {target} takes no input")]
  UnexpectedInput { target: String },

  #[error("invalid input '{value}' for target {target}: {reason}")]
  InvalidInput {
    target: String,
    value: String,
    reason: String,
  },
}
