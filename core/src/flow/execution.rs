// core/src/flow/execution.rs

use crate::context::FlowCtx;
use crate::control::{Control, Outcome};
use crate::error::FlowError;
use crate::flow::definition::{Flow, Handler};
use tracing::{event, info_span, Instrument, Level};

impl<T, E> Flow<T, E>
where
  T: 'static + Send + Sync,
  E: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Runs every step in order against `ctx`.
  ///
  /// Returns `Outcome::Halted` as soon as a handler halts, or the first handler
  /// error unchanged.
  pub async fn run(&self, ctx: FlowCtx<T>) -> Result<Outcome, E> {
    event!(Level::DEBUG, flow = %self.name, steps = self.steps.len(), "flow starting");

    for (idx, step) in self.steps.iter().enumerate() {
      let span = info_span!("flow_step", flow = %self.name, step = %step.name, index = idx);

      if step.should_skip(&ctx) {
        event!(parent: &span, Level::DEBUG, "step skipped by condition");
        continue;
      }

      let handlers = match self.handlers.get(&step.name) {
        Some(h) if !h.is_empty() => h,
        _ if step.optional => {
          event!(parent: &span, Level::DEBUG, "optional step has no handlers");
          continue;
        }
        _ => {
          event!(parent: &span, Level::ERROR, "required step has no handlers");
          return Err(E::from(FlowError::HandlerMissing {
            step_name: step.name.clone(),
          }));
        }
      };

      let phases: [(&str, &Vec<Handler<T, E>>); 3] =
        [("before", &handlers.before), ("on", &handlers.on), ("after", &handlers.after)];
      for (phase, list) in phases {
        if run_phase(list, &ctx).instrument(span.clone()).await.map_err(|e| {
          event!(parent: &span, Level::WARN, phase, error = %e, "handler failed");
          e
        })? == Control::Halt
        {
          event!(parent: &span, Level::DEBUG, phase, "flow halted");
          return Ok(Outcome::Halted);
        }
      }
    }

    event!(Level::DEBUG, flow = %self.name, "flow finished");
    Ok(Outcome::Finished)
  }
}

async fn run_phase<T, E>(handlers: &[Handler<T, E>], ctx: &FlowCtx<T>) -> Result<Control, E>
where
  T: 'static + Send + Sync,
{
  for handler in handlers {
    if handler(ctx.clone()).await? == Control::Halt {
      return Ok(Control::Halt);
    }
  }
  Ok(Control::Next)
}
