//! Target registration and descriptors.
//!
//! An owner type lists its targets once, in [`TargetOwner::targets`]. The
//! resulting [`TargetTable`] describes every target (name, input and result
//! types, description, default flag) without running anything, and holds the
//! entry points the dispatcher calls.

pub mod key;

use std::any::{Any, TypeId, type_name};
use std::fmt::{Debug, Display};
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

use crate::dispatch::options::OptionSchema;
use crate::error::ConfigurationError;
use crate::memo::{InvocationFailure, Memo};

pub use key::{InputKey, InvocationKey, TargetInput};

/// A target's future as seen by the dispatcher: the `Debug` rendering of its
/// result, if it has one.
pub type TargetFuture = Pin<Box<dyn Future<Output = Result<Option<String>, InvocationFailure>> + Send>>;

/// An input parsed from the command line, ready to hand to a target body.
pub type BoundInput = Box<dyn Any + Send>;

type PlainBody<O> = Arc<dyn Fn(Arc<O>) -> TargetFuture + Send + Sync>;
type InputBody<O> = Arc<dyn Fn(Arc<O>, BoundInput) -> TargetFuture + Send + Sync>;
type InputParser = Arc<dyn Fn(&str) -> Result<BoundInput, String> + Send + Sync>;

/// An object grouping related targets.
///
/// Registered targets run through the owner's [`Memo`], so every (name, input)
/// pair runs once per owner however often it is selected. Owner methods that
/// call each other as prerequisites route their bodies through the same memo.
pub trait TargetOwner: Send + Sync + Sized + 'static {
  /// Register the owner's targets.
  fn targets(table: &mut TargetTable<Self>);

  /// The memoization table of this instance.
  fn memo(&self) -> &Memo;

  /// Declare configuration options bound from the command line.
  fn options(_schema: &mut OptionSchema<Self>) {}
}

/// Immutable description of one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetDescriptor {
  pub name: String,
  pub input: Option<String>,
  pub result: Option<String>,
  pub description: String,
  pub is_default: bool,
}

enum Body<O> {
  Plain(PlainBody<O>),
  WithInput { parse: InputParser, body: InputBody<O> },
}

/// A registered target: its descriptor plus how to start it.
pub struct TargetEntry<O> {
  descriptor: TargetDescriptor,
  body: Body<O>,
}

impl<O> TargetEntry<O> {
  pub fn descriptor(&self) -> &TargetDescriptor {
    &self.descriptor
  }

  pub fn name(&self) -> &str {
    &self.descriptor.name
  }

  pub fn takes_input(&self) -> bool {
    matches!(self.body, Body::WithInput { .. })
  }

  /// Parse a command-line input for this target.
  pub fn parse_input(&self, raw: &str) -> Result<BoundInput, String> {
    match &self.body {
      Body::WithInput { parse, .. } => parse(raw),
      Body::Plain(_) => Err("target takes no input".to_string()),
    }
  }

  /// Start the target on an owner instance.
  ///
  /// `input` must come from [`parse_input`](Self::parse_input) of this entry
  /// when the target takes an input, and be `None` otherwise.
  pub fn start(&self, owner: Arc<O>, input: Option<BoundInput>) -> TargetFuture {
    let name = self.descriptor.name.clone();
    match (&self.body, input) {
      (Body::Plain(body), None) => body(owner),
      (Body::WithInput { body, .. }, Some(input)) => body(owner, input),
      (Body::Plain(_), Some(_)) => mismatched(name, "target takes no input"),
      (Body::WithInput { .. }, None) => mismatched(name, "target requires an input"),
    }
  }
}

fn mismatched(name: String, message: &'static str) -> TargetFuture {
  Box::pin(async move {
    Err(InvocationFailure::from_message(
      InvocationKey::new(name, InputKey::none()),
      message,
    ))
  })
}

/// Declarative table of an owner type's targets.
pub struct TargetTable<O> {
  entries: Vec<TargetEntry<O>>,
  substring_matching: bool,
}

impl<O: TargetOwner> TargetTable<O> {
  /// Build and validate the table for an owner type.
  pub fn of() -> Result<Self, ConfigurationError> {
    let mut table = Self {
      entries: Vec::new(),
      substring_matching: false,
    };
    O::targets(&mut table);
    table.validate()?;
    Ok(table)
  }

  /// Register a target without input.
  pub fn target<R, F, Fut>(&mut self, name: &str, body: F) -> TargetBuilder<'_>
  where
    R: Debug + Send + 'static,
    F: Fn(Arc<O>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, InvocationFailure>> + Send + 'static,
  {
    let target = name.to_string();
    let body: PlainBody<O> = Arc::new(move |owner: Arc<O>| -> TargetFuture {
      let key = InvocationKey::new(target.clone(), InputKey::none());
      let fut = body(Arc::clone(&owner));
      Box::pin(async move {
        owner
          .memo()
          .run_selected(key, async move { fut.await.map(render_result) })
          .await
      })
    });
    self.push(name, None, result_type::<R>(), Body::Plain(body))
  }

  /// Register a target taking one input, parsed from `Name:value` on the command line.
  pub fn target_with_input<I, R, F, Fut>(&mut self, name: &str, body: F) -> TargetBuilder<'_>
  where
    I: TargetInput + Clone + FromStr,
    I::Err: Display,
    R: Debug + Send + 'static,
    F: Fn(Arc<O>, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, InvocationFailure>> + Send + 'static,
  {
    let parse: InputParser = Arc::new(|raw: &str| -> Result<BoundInput, String> {
      raw
        .parse::<I>()
        .map(|value| Box::new(value) as BoundInput)
        .map_err(|err| err.to_string())
    });
    let target = name.to_string();
    let body: InputBody<O> = Arc::new(move |owner: Arc<O>, input: BoundInput| -> TargetFuture {
      match input.downcast::<I>() {
        Ok(input) => {
          let key = InvocationKey::new(target.clone(), InputKey::of((*input).clone()));
          let fut = body(Arc::clone(&owner), *input);
          Box::pin(async move {
            owner
              .memo()
              .run_selected(key, async move { fut.await.map(render_result) })
              .await
          })
        }
        Err(_) => mismatched(target.clone(), "input has the wrong type"),
      }
    });
    self.push(
      name,
      Some(short_type_name(type_name::<I>())),
      result_type::<R>(),
      Body::WithInput { parse, body },
    )
  }

  /// Let abbreviations match a unique substring when no prefix matches.
  pub fn match_substrings(&mut self) {
    self.substring_matching = true;
  }

  fn push(&mut self, name: &str, input: Option<String>, result: Option<String>, body: Body<O>) -> TargetBuilder<'_> {
    self.entries.push(TargetEntry {
      descriptor: TargetDescriptor {
        name: name.to_string(),
        input,
        result,
        description: String::new(),
        is_default: false,
      },
      body,
    });
    let last = self.entries.len() - 1;
    TargetBuilder {
      descriptor: &mut self.entries[last].descriptor,
    }
  }

  fn validate(&self) -> Result<(), ConfigurationError> {
    let owner = owner_name::<O>();

    for (i, entry) in self.entries.iter().enumerate() {
      if let Some(other) = self.entries[..i]
        .iter()
        .find(|other| other.name().eq_ignore_ascii_case(entry.name()))
      {
        return Err(ConfigurationError::DuplicateTarget {
          owner,
          first: other.name().to_string(),
          second: entry.name().to_string(),
        });
      }
    }

    let defaults: Vec<String> = self
      .entries
      .iter()
      .filter(|entry| entry.descriptor.is_default)
      .map(|entry| entry.name().to_string())
      .collect();
    if defaults.len() > 1 {
      return Err(ConfigurationError::MultipleDefaults { owner, names: defaults });
    }

    if let Some(entry) = self.default_entry()
      && entry.takes_input()
    {
      return Err(ConfigurationError::DefaultTakesInput {
        owner,
        name: entry.name().to_string(),
      });
    }

    Ok(())
  }
}

impl<O> TargetTable<O> {
  pub fn entries(&self) -> &[TargetEntry<O>] {
    &self.entries
  }

  pub fn descriptors(&self) -> Vec<TargetDescriptor> {
    self.entries.iter().map(|entry| entry.descriptor.clone()).collect()
  }

  pub fn default_entry(&self) -> Option<&TargetEntry<O>> {
    self.entries.iter().find(|entry| entry.descriptor.is_default)
  }

  pub fn substring_matching(&self) -> bool {
    self.substring_matching
  }
}

/// Sets the descriptive parts of a freshly registered target.
pub struct TargetBuilder<'a> {
  descriptor: &'a mut TargetDescriptor,
}

impl TargetBuilder<'_> {
  pub fn description(self, text: &str) -> Self {
    self.descriptor.description = text.to_string();
    self
  }

  /// Run this target when the command line selects none.
  pub fn as_default(self) -> Self {
    self.descriptor.is_default = true;
    self
  }
}

fn render_result<R: Debug + 'static>(value: R) -> Option<String> {
  if TypeId::of::<R>() == TypeId::of::<()>() {
    None
  } else {
    Some(format!("{:?}", value))
  }
}

fn result_type<R: 'static>() -> Option<String> {
  if TypeId::of::<R>() == TypeId::of::<()>() {
    None
  } else {
    Some(short_type_name(type_name::<R>()))
  }
}

/// Readable name of an owner type for diagnostics.
pub fn owner_name<O>() -> String {
  short_type_name(type_name::<O>())
}

/// Strip module paths from a type name: `alloc::vec::Vec<std::path::PathBuf>` → `Vec<PathBuf>`.
pub fn short_type_name(full: &str) -> String {
  let mut out = String::with_capacity(full.len());
  let mut token = String::new();
  for ch in full.chars() {
    if ch.is_alphanumeric() || ch == '_' || ch == ':' {
      token.push(ch);
    } else {
      out.push_str(token.rsplit("::").next().unwrap_or(""));
      token.clear();
      out.push(ch);
    }
  }
  out.push_str(token.rsplit("::").next().unwrap_or(""));
  out
}
