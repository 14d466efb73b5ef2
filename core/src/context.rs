// core/src/context.rs
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// Shared, lockable state for one flow run.
///
/// Cloning is cheap and every clone points at the same data, so a caller can keep
/// one handle, hand another to `Flow::run`, and read the results afterwards.
///
/// Guards are blocking `parking_lot` guards. Drop them before any `.await`.
#[derive(Debug)]
pub struct FlowCtx<T: Send + Sync + 'static>(Arc<RwLock<T>>);

impl<T: Send + Sync + 'static> FlowCtx<T> {
  pub fn new(data: T) -> Self {
    FlowCtx(Arc::new(RwLock::new(data)))
  }

  pub fn read(&self) -> RwLockReadGuard<'_, T> {
    self.0.read()
  }

  pub fn write(&self) -> RwLockWriteGuard<'_, T> {
    self.0.write()
  }

  /// Read guard narrowed to one part of the context, e.g. `ctx.map_read(|c| &c.order_id)`.
  pub fn map_read<F, U: ?Sized>(&self, f: F) -> MappedRwLockReadGuard<'_, U>
  where
    F: FnOnce(&T) -> &U,
  {
    RwLockReadGuard::map(self.read(), f)
  }

  /// Runs `f` under the write lock and returns its result.
  pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
    f(&mut self.write())
  }

  /// Clones a value out under the read lock.
  pub fn snapshot<R>(&self, f: impl FnOnce(&T) -> R) -> R {
    f(&self.read())
  }
}

impl<T: Send + Sync + 'static> Clone for FlowCtx<T> {
  fn clone(&self) -> Self {
    FlowCtx(Arc::clone(&self.0))
  }
}

impl<T: Send + Sync + 'static + Default> Default for FlowCtx<T> {
  fn default() -> Self {
    Self::new(T::default())
  }
}
