// src/lib.rs

//! Hatua: a small asynchronous step-flow engine.
//!
//! A [`Flow`] is an ordered list of named steps that all operate on one shared,
//! lockable context ([`FlowCtx`]). Each step can carry:
//!  - `before`, `on` and `after` handler lists, run in that order.
//!  - An `optional` flag (an optional step without handlers is skipped silently).
//!  - A skip condition evaluated against the context right before the step.
//!
//! Handlers are async and return [`Control::Next`] to keep going or
//! [`Control::Halt`] to end the run early. A [`FlowRegistry`] keeps one flow per
//! context type so callers can run "the flow for this context" without holding
//! on to the flow itself.

pub mod context;
pub mod control;
pub mod error;
pub mod flow;
pub mod registry;
pub mod step;

pub use crate::context::FlowCtx;
pub use crate::control::{Control, Outcome};
pub use crate::error::{FlowError, FlowResult};
pub use crate::flow::{Flow, Handler};
pub use crate::registry::FlowRegistry;
pub use crate::step::{SkipIf, StepSpec};

/*
    Typical wiring:
    1. Define a context struct `MyCtx` holding the inputs and outputs of one run.
    2. Create a `Flow<MyCtx, MyError>` from a list of `StepSpec`s.
    3. Attach async handlers with `.on()`, `.before()`, `.after()`.
    4. Register the flow with a `FlowRegistry<MyError>` at startup.
    5. Per request: `registry.run(FlowCtx::new(my_ctx)).await`, then read the
       results back out of the same `FlowCtx`.
*/
