// core/src/control.rs

//! Signals returned by handlers and the outcome of a whole run.

/// Returned by every handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
  /// Keep going: remaining handlers of this step, then the next step.
  Next,
  /// End the run now. Nothing after this handler executes.
  Halt,
}

/// How a run ended when no handler failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  /// Every step ran (or was skipped).
  Finished,
  /// A handler returned `Control::Halt`.
  Halted,
}

impl Outcome {
  pub fn is_finished(self) -> bool {
    matches!(self, Outcome::Finished)
  }
}
