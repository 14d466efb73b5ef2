// core/src/registry.rs

//! `FlowRegistry<E>`: one flow per context type, run by context type.

use crate::context::FlowCtx;
use crate::control::Outcome;
use crate::error::FlowError;
use crate::flow::Flow;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{event, Level};

/// Object-safe view of a `Flow<T, E>` with `T` erased.
#[async_trait]
trait ErasedFlow<E>: Send + Sync
where
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  fn name(&self) -> &str;

  /// `ctx` must be a boxed `FlowCtx<T>` for this flow's `T`.
  async fn run_erased(&self, ctx: Box<dyn Any + Send>) -> Result<Outcome, E>;
}

#[async_trait]
impl<T, E> ErasedFlow<E> for Flow<T, E>
where
  T: 'static + Send + Sync,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  fn name(&self) -> &str {
    Flow::name(self)
  }

  async fn run_erased(&self, ctx: Box<dyn Any + Send>) -> Result<Outcome, E> {
    let typed = ctx.downcast::<FlowCtx<T>>().map_err(|_| {
      E::from(FlowError::TypeMismatch {
        expected_type: std::any::type_name::<FlowCtx<T>>().to_string(),
      })
    })?;
    self.run(*typed).await
  }
}

/// Holds flows keyed by their context type.
pub struct FlowRegistry<E = FlowError>
where
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  flows: RwLock<HashMap<TypeId, Arc<dyn ErasedFlow<E>>>>,
}

impl<E> Default for FlowRegistry<E>
where
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<E> FlowRegistry<E>
where
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      flows: RwLock::new(HashMap::new()),
    }
  }

  /// Registers `flow` for its context type, replacing any earlier flow for that type.
  pub fn register<T>(&self, flow: Flow<T, E>)
  where
    T: 'static + Send + Sync,
  {
    event!(Level::DEBUG, flow = %flow.name(), context_type = %std::any::type_name::<T>(), "registering flow");
    if let Some(previous) = self.flows.write().insert(TypeId::of::<T>(), Arc::new(flow)) {
      event!(Level::WARN, replaced = %previous.name(), "flow replaced for context type");
    }
  }

  pub fn is_registered<T: 'static>(&self) -> bool {
    self.flows.read().contains_key(&TypeId::of::<T>())
  }

  pub fn len(&self) -> usize {
    self.flows.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.flows.read().is_empty()
  }

  /// Runs the flow registered for `T` against `ctx`.
  pub async fn run<T>(&self, ctx: FlowCtx<T>) -> Result<Outcome, E>
  where
    T: 'static + Send + Sync,
  {
    let flow = self.flows.read().get(&TypeId::of::<T>()).cloned().ok_or_else(|| {
      let context_type = std::any::type_name::<T>().to_string();
      event!(Level::ERROR, %context_type, "no flow registered");
      E::from(FlowError::NotRegistered { context_type })
    })?;
    flow.run_erased(Box::new(ctx)).await
  }
}
