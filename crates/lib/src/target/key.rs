//! Structural keys for memoized invocations and owner instances.
//!
//! Inputs of different types share one table, so keys are type-erased: two
//! keys are equal only when their values have the same concrete type and
//! compare equal.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Bound for target inputs and owner construction arguments.
///
/// Memoization needs structural equality, so an input type that is not
/// `Eq + Hash` is rejected when the target is registered rather than at run time.
pub trait TargetInput: fmt::Debug + Eq + Hash + Send + Sync + 'static {}

impl<T> TargetInput for T where T: fmt::Debug + Eq + Hash + Send + Sync + 'static {}

trait DynKey: Send + Sync {
  fn as_any(&self) -> &dyn Any;
  fn eq_dyn(&self, other: &dyn DynKey) -> bool;
  fn hash_dyn(&self, state: &mut dyn Hasher);
  fn fmt_dyn(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<T: TargetInput> DynKey for T {
  fn as_any(&self) -> &dyn Any {
    self
  }

  fn eq_dyn(&self, other: &dyn DynKey) -> bool {
    other.as_any().downcast_ref::<T>().is_some_and(|other| other == self)
  }

  fn hash_dyn(&self, mut state: &mut dyn Hasher) {
    TypeId::of::<T>().hash(&mut state);
    self.hash(&mut state);
  }

  fn fmt_dyn(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(self, f)
  }
}

/// An input value, or the dedicated "no input" sentinel.
///
/// The sentinel is distinct from every real value, `None` and `()` included.
#[derive(Clone)]
pub struct InputKey(Option<Arc<dyn DynKey>>);

impl InputKey {
  /// The "no input" sentinel.
  pub fn none() -> Self {
    Self(None)
  }

  pub fn of<T: TargetInput>(value: T) -> Self {
    Self(Some(Arc::new(value)))
  }

  pub fn is_none(&self) -> bool {
    self.0.is_none()
  }
}

impl PartialEq for InputKey {
  fn eq(&self, other: &Self) -> bool {
    match (&self.0, &other.0) {
      (None, None) => true,
      (Some(a), Some(b)) => a.eq_dyn(b.as_ref()),
      _ => false,
    }
  }
}

impl Eq for InputKey {}

impl Hash for InputKey {
  fn hash<H: Hasher>(&self, state: &mut H) {
    match &self.0 {
      None => state.write_u8(0),
      Some(value) => {
        state.write_u8(1);
        value.hash_dyn(state);
      }
    }
  }
}

impl fmt::Debug for InputKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.0 {
      None => f.write_str("<no input>"),
      Some(value) => value.fmt_dyn(f),
    }
  }
}

/// Identity of one target invocation: the target name plus its input.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct InvocationKey {
  pub target: String,
  pub input: InputKey,
}

impl InvocationKey {
  pub fn new(target: impl Into<String>, input: InputKey) -> Self {
    Self {
      target: target.into(),
      input,
    }
  }
}

impl fmt::Display for InvocationKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.input.is_none() {
      f.write_str(&self.target)
    } else {
      write!(f, "{}({:?})", self.target, self.input)
    }
  }
}

impl fmt::Debug for InvocationKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(self, f)
  }
}
