//! The per-run registry of owner instances.
//!
//! Owners are singletons per (owner type, construction arguments) within one
//! run. The registry is owned by the run and handed to owners that need
//! collaborators; there is no global state.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::dispatch::Verbosity;
use crate::target::key::{InputKey, TargetInput};

type OwnerSlot = Arc<dyn Any + Send + Sync>;

pub struct RunContext {
  verbosity: Verbosity,
  owners: Mutex<HashMap<(TypeId, InputKey), OwnerSlot>>,
}

impl RunContext {
  pub fn new(verbosity: Verbosity) -> Arc<Self> {
    Arc::new(Self {
      verbosity,
      owners: Mutex::new(HashMap::new()),
    })
  }

  pub fn verbosity(&self) -> Verbosity {
    self.verbosity
  }

  /// The instance of `O` for `args`, constructed on first request.
  ///
  /// `create` runs without the registry lock held, so constructors may request
  /// their own collaborators. If two callers race, the first insertion wins and
  /// both receive it.
  pub fn owner<O, A, F>(self: &Arc<Self>, args: A, create: F) -> Arc<O>
  where
    O: Send + Sync + 'static,
    A: TargetInput + Clone,
    F: FnOnce(&Arc<RunContext>, A) -> O,
  {
    let key = (TypeId::of::<O>(), InputKey::of(args.clone()));
    if let Some(existing) = self.lookup::<O>(&key) {
      return existing;
    }

    debug!(owner = std::any::type_name::<O>(), args = ?args, "constructing owner");
    let created = Arc::new(create(self, args));
    self.adopt_keyed(key, created)
  }

  /// Register an already constructed instance of `O` for `args`.
  ///
  /// Returns the registered instance, which is `owner` unless one was already present.
  pub fn adopt<O, A>(&self, args: A, owner: O) -> Arc<O>
  where
    O: Send + Sync + 'static,
    A: TargetInput,
  {
    self.adopt_keyed((TypeId::of::<O>(), InputKey::of(args)), Arc::new(owner))
  }

  /// The instance of `O` for `args`, if one was registered.
  pub fn existing<O, A>(&self, args: A) -> Option<Arc<O>>
  where
    O: Send + Sync + 'static,
    A: TargetInput,
  {
    self.lookup::<O>(&(TypeId::of::<O>(), InputKey::of(args)))
  }

  /// Number of owner instances constructed so far.
  pub fn owner_count(&self) -> usize {
    self.lock().len()
  }

  fn lookup<O: Send + Sync + 'static>(&self, key: &(TypeId, InputKey)) -> Option<Arc<O>> {
    let slot = self.lock().get(key).cloned()?;
    slot.downcast::<O>().ok()
  }

  fn adopt_keyed<O: Send + Sync + 'static>(&self, key: (TypeId, InputKey), owner: Arc<O>) -> Arc<O> {
    let mut owners = self.lock();
    let slot = owners.entry(key).or_insert_with(|| owner.clone() as OwnerSlot).clone();
    drop(owners);
    slot.downcast::<O>().unwrap_or(owner)
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<(TypeId, InputKey), OwnerSlot>> {
    self.owners.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
