// core/src/flow/hooks.rs

//! `before` / `on` / `after` handler registration.
//!
//! Handlers may fail with any error convertible into the flow's `E`, which lets a
//! step call straight into services that return their own error types.

use crate::context::FlowCtx;
use crate::control::Control;
use crate::error::FlowError;
use crate::flow::definition::{Flow, Handler};
use std::future::Future;

#[derive(Clone, Copy)]
enum Phase {
  Before,
  On,
  After,
}

impl<T, E> Flow<T, E>
where
  T: 'static + Send + Sync,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub fn before<F, UE>(&mut self, step_name: &str, handler_fn: impl Fn(FlowCtx<T>) -> F + Send + Sync + 'static)
  where
    F: Future<Output = Result<Control, UE>> + Send + 'static,
    UE: Into<E> + Send + 'static,
  {
    self.push_handler(Phase::Before, step_name, handler_fn);
  }

  pub fn on<F, UE>(&mut self, step_name: &str, handler_fn: impl Fn(FlowCtx<T>) -> F + Send + Sync + 'static)
  where
    F: Future<Output = Result<Control, UE>> + Send + 'static,
    UE: Into<E> + Send + 'static,
  {
    self.push_handler(Phase::On, step_name, handler_fn);
  }

  pub fn after<F, UE>(&mut self, step_name: &str, handler_fn: impl Fn(FlowCtx<T>) -> F + Send + Sync + 'static)
  where
    F: Future<Output = Result<Control, UE>> + Send + 'static,
    UE: Into<E> + Send + 'static,
  {
    self.push_handler(Phase::After, step_name, handler_fn);
  }

  fn push_handler<F, UE>(
    &mut self,
    phase: Phase,
    step_name: &str,
    handler_fn: impl Fn(FlowCtx<T>) -> F + Send + Sync + 'static,
  ) where
    F: Future<Output = Result<Control, UE>> + Send + 'static,
    UE: Into<E> + Send + 'static,
  {
    self.assert_step(step_name);
    let boxed: Handler<T, E> = Box::new(move |ctx| {
      let fut = handler_fn(ctx);
      Box::pin(async move { fut.await.map_err(Into::into) })
    });
    let slot = self.handlers.entry(step_name.to_string()).or_default();
    match phase {
      Phase::Before => slot.before.push(boxed),
      Phase::On => slot.on.push(boxed),
      Phase::After => slot.after.push(boxed),
    }
  }
}
