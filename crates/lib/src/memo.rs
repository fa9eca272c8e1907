//! Run-at-most-once memoization of target invocations.
//!
//! Every owner instance embeds a [`Memo`]. A target method routes its body
//! through [`Memo::run`] or [`Memo::run_with`], so repeated calls with an equal
//! (target, input) pair share a single outcome: the first caller installs a
//! pending cell and runs the body, every other caller awaits that cell. The
//! outcome, value or failure, is kept for the lifetime of the owner. Targets
//! registered in a [`TargetTable`](crate::TargetTable) are memoized the same
//! way through the owner's memo, whether or not their body calls it.
//!
//! Bodies that fan out onto other tasks should use [`spawn`] rather than
//! `tokio::spawn`, so that a prerequisite requesting its own dependent is still
//! reported as a cycle.

use std::any::Any;
use std::collections::HashMap;
use std::error::Error;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::target::key::{InputKey, InvocationKey, TargetInput};

type SharedValue = Arc<dyn Any + Send + Sync>;
type Outcome = Result<SharedValue, InvocationFailure>;

/// Invocations currently being executed by this task, innermost last.
///
/// Each entry pairs the address of the owning `Memo` with the key, so equal
/// target names on different owners do not collide.
type CallChain = Arc<Vec<(usize, InvocationKey)>>;

tokio::task_local! {
  static CALL_CHAIN: CallChain;
}

/// Spawn `future` on the runtime, carrying the current chain of running invocations.
///
/// Inside a target body this is the way to run prerequisites on other tasks:
/// a plain `tokio::spawn` starts with an empty chain, so a spawned request for
/// an invocation that is waiting on it would never complete.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
  F: Future + Send + 'static,
  F::Output: Send + 'static,
{
  let chain = CALL_CHAIN.try_with(Arc::clone).unwrap_or_default();
  tokio::spawn(CALL_CHAIN.scope(chain, future))
}

/// A target body failed.
///
/// Carries the failing invocation's identity and is replayed, unchanged, to
/// every caller of that invocation.
#[derive(Debug, Clone, Error)]
#[error("target {invocation} failed")]
pub struct InvocationFailure {
  invocation: String,
  #[source]
  cause: Arc<dyn Error + Send + Sync>,
}

impl InvocationFailure {
  fn new(key: &InvocationKey, cause: anyhow::Error) -> Self {
    let cause: Box<dyn Error + Send + Sync> = cause.into();
    Self {
      invocation: key.to_string(),
      cause: Arc::from(cause),
    }
  }

  pub(crate) fn from_message(key: InvocationKey, message: &'static str) -> Self {
    Self::new(&key, anyhow::anyhow!(message))
  }

  /// Name and input of the invocation that failed.
  pub fn invocation(&self) -> &str {
    &self.invocation
  }

  /// The innermost error in the cause chain.
  pub fn root_cause(&self) -> &(dyn Error + 'static) {
    let mut current: &(dyn Error + 'static) = self.cause.as_ref();
    while let Some(next) = current.source() {
      current = next;
    }
    current
  }

  /// Every message in the chain, outermost first.
  pub fn chain(&self) -> Vec<String> {
    let mut messages = vec![self.to_string()];
    let mut current: Option<&(dyn Error + 'static)> = Some(self.cause.as_ref());
    while let Some(err) = current {
      let message = err.to_string();
      if messages.last() != Some(&message) {
        messages.push(message);
      }
      current = err.source();
    }
    messages
  }
}

/// What a target started from the command line reports back to the dispatcher.
pub(crate) type Selected = Result<Option<String>, InvocationFailure>;

/// Memoization table of one owner instance.
///
/// Invocations made through registered targets are recorded apart from the
/// ones made by owner methods, so a registered body that itself calls
/// [`Memo::run`] with the same key is not mistaken for a cycle.
#[derive(Default)]
pub struct Memo {
  entries: Mutex<HashMap<InvocationKey, Arc<OnceCell<Outcome>>>>,
  selected: Mutex<HashMap<InvocationKey, Arc<OnceCell<Selected>>>>,
}

impl Memo {
  pub fn new() -> Self {
    Self::default()
  }

  /// Run the body of an input-less target at most once.
  pub async fn run<R, F>(&self, target: &str, body: F) -> Result<R, InvocationFailure>
  where
    R: Clone + Send + Sync + 'static,
    F: Future<Output = anyhow::Result<R>>,
  {
    self.invoke(InvocationKey::new(target, InputKey::none()), body).await
  }

  /// Run the body of a target at most once per distinct input.
  ///
  /// The body receives the input by value; a clone is kept as part of the key.
  pub async fn run_with<I, R, F, Fut>(&self, target: &str, input: I, body: F) -> Result<R, InvocationFailure>
  where
    I: TargetInput + Clone,
    R: Clone + Send + Sync + 'static,
    F: FnOnce(I) -> Fut,
    Fut: Future<Output = anyhow::Result<R>>,
  {
    let key = InvocationKey::new(target, InputKey::of(input.clone()));
    self.invoke(key, body(input)).await
  }

  /// Number of distinct invocations recorded so far.
  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  async fn invoke<R, F>(&self, key: InvocationKey, body: F) -> Result<R, InvocationFailure>
  where
    R: Clone + Send + Sync + 'static,
    F: Future<Output = anyhow::Result<R>>,
  {
    let id = self as *const Memo as usize;
    let chain = CALL_CHAIN.try_with(Arc::clone).unwrap_or_default();

    if let Some(start) = chain.iter().position(|(owner, active)| *owner == id && *active == key) {
      let cycle: Vec<String> = chain[start..]
        .iter()
        .map(|(_, k)| k.to_string())
        .chain(std::iter::once(key.to_string()))
        .collect();
      warn!(invocation = %key, "dependency cycle detected");
      return Err(InvocationFailure::new(
        &key,
        anyhow::anyhow!("dependency cycle: {}", cycle.join(" -> ")),
      ));
    }

    // The single synchronization point: insert-if-absent under the lock.
    let cell = {
      let mut entries = self.lock();
      Arc::clone(entries.entry(key.clone()).or_default())
    };

    let outcome = cell
      .get_or_init(|| async {
        debug!(invocation = %key, "executing target body");
        let mut extended = chain.as_ref().clone();
        extended.push((id, key.clone()));
        match CALL_CHAIN.scope(Arc::new(extended), body).await {
          Ok(value) => {
            debug!(invocation = %key, "target body completed");
            Ok(Arc::new(value) as SharedValue)
          }
          Err(err) => {
            debug!(invocation = %key, error = %err, "target body failed");
            Err(InvocationFailure::new(&key, err))
          }
        }
      })
      .await;

    match outcome {
      Ok(value) => value.downcast_ref::<R>().cloned().ok_or_else(|| {
        InvocationFailure::new(
          &key,
          anyhow::anyhow!(
            "target was previously invoked with a different result type than {}",
            std::any::type_name::<R>()
          ),
        )
      }),
      Err(failure) => Err(failure.clone()),
    }
  }

  /// Run a registered target's body at most once per key.
  pub(crate) async fn run_selected<F>(&self, key: InvocationKey, body: F) -> Selected
  where
    F: Future<Output = Selected>,
  {
    let cell = {
      let mut selected = self.selected.lock().unwrap_or_else(PoisonError::into_inner);
      Arc::clone(selected.entry(key).or_default())
    };
    cell.get_or_init(|| body).await.clone()
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<InvocationKey, Arc<OnceCell<Outcome>>>> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
