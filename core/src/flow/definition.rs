// core/src/flow/definition.rs

use crate::context::FlowCtx;
use crate::control::Control;
use crate::error::{FlowError, FlowResult};
use crate::step::{SkipIf, StepSpec};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed async handler operating on the flow's context.
pub type Handler<T, E> =
  Box<dyn Fn(FlowCtx<T>) -> Pin<Box<dyn Future<Output = Result<Control, E>> + Send>> + Send + Sync>;

/// Handler lists for one step.
pub(crate) struct StepHandlers<T: 'static + Send + Sync, E> {
  pub(crate) before: Vec<Handler<T, E>>,
  pub(crate) on: Vec<Handler<T, E>>,
  pub(crate) after: Vec<Handler<T, E>>,
}

impl<T: 'static + Send + Sync, E> Default for StepHandlers<T, E> {
  fn default() -> Self {
    Self {
      before: Vec::new(),
      on: Vec::new(),
      after: Vec::new(),
    }
  }
}

impl<T: 'static + Send + Sync, E> StepHandlers<T, E> {
  pub(crate) fn is_empty(&self) -> bool {
    self.before.is_empty() && self.on.is_empty() && self.after.is_empty()
  }
}

/// An ordered list of named steps over context `T`, with handlers failing with `E`.
///
/// `E` must absorb `FlowError` so engine-level failures (a required step with no
/// handlers, a missing registration) surface through the same error type the
/// handlers use.
pub struct Flow<T, E>
where
  T: 'static + Send + Sync,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) name: String,
  pub(crate) steps: Vec<StepSpec<T>>,
  pub(crate) handlers: HashMap<String, StepHandlers<T, E>>,
}

impl<T, E> Flow<T, E>
where
  T: 'static + Send + Sync,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub fn new(name: impl Into<String>, steps: Vec<StepSpec<T>>) -> Self {
    Self {
      name: name.into(),
      steps,
      handlers: HashMap::new(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  fn position(&self, step_name: &str) -> Option<usize> {
    self.steps.iter().position(|s| s.name == step_name)
  }

  /// Panics on unknown steps: a typo in a step name is a wiring bug, caught at startup.
  pub(crate) fn assert_step(&self, step_name: &str) {
    if self.position(step_name).is_none() {
      panic!("flow '{}': step '{}' is not defined", self.name, step_name);
    }
  }

  pub fn insert_after(&mut self, existing: &str, step: StepSpec<T>) -> FlowResult<()> {
    let idx = self.position(existing).ok_or_else(|| FlowError::StepNotFound {
      step_name: existing.to_string(),
    })?;
    if self.position(&step.name).is_some() {
      return Err(FlowError::DuplicateStep { step_name: step.name });
    }
    self.steps.insert(idx + 1, step);
    Ok(())
  }

  pub fn remove_step(&mut self, step_name: &str) -> FlowResult<()> {
    let idx = self.position(step_name).ok_or_else(|| FlowError::StepNotFound {
      step_name: step_name.to_string(),
    })?;
    self.steps.remove(idx);
    self.handlers.remove(step_name);
    Ok(())
  }

  pub fn set_skip_if(&mut self, step_name: &str, cond: Option<SkipIf<T>>) -> FlowResult<()> {
    let step = self
      .steps
      .iter_mut()
      .find(|s| s.name == step_name)
      .ok_or_else(|| FlowError::StepNotFound {
        step_name: step_name.to_string(),
      })?;
    step.skip_if = cond;
    Ok(())
  }

  pub fn set_skip_when(
    &mut self,
    step_name: &str,
    cond: impl Fn(&T) -> bool + Send + Sync + 'static,
  ) -> FlowResult<()> {
    self.set_skip_if(step_name, Some(Arc::new(cond)))
  }
}
