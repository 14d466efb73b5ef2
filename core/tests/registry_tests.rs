// tests/registry_tests.rs
mod common;

use common::*;
use hatua::{Control, Flow, FlowCtx, FlowRegistry, Outcome, StepSpec};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn registry_runs_flow_by_context_type() {
  setup_tracing();
  let registry = FlowRegistry::<TestError>::new();

  let mut main = Flow::<TestContext, TestError>::new("main", vec![StepSpec::required("count")]);
  main.on("count", recording_handler("count", "c"));
  registry.register(main);

  let mut other = Flow::<OtherContext, TestError>::new("other", vec![StepSpec::required("touch")]);
  other.on("touch", |ctx: FlowCtx<OtherContext>| async move {
    ctx.write().touched = true;
    Ok::<_, TestError>(Control::Next)
  });
  registry.register(other);

  assert_eq!(registry.len(), 2);
  assert!(registry.is_registered::<TestContext>());

  let main_ctx = FlowCtx::new(TestContext::default());
  let other_ctx = FlowCtx::new(OtherContext::default());
  assert_eq!(registry.run(main_ctx.clone()).await, Ok(Outcome::Finished));
  assert_eq!(registry.run(other_ctx.clone()).await, Ok(Outcome::Finished));

  assert_eq!(main_ctx.read().counter, 1);
  assert!(other_ctx.read().touched);
}

#[tokio::test]
#[serial]
async fn unregistered_context_type_is_an_error() {
  setup_tracing();
  let registry = FlowRegistry::<TestError>::new();

  let err = registry
    .run(FlowCtx::new(OtherContext::default()))
    .await
    .expect_err("nothing registered");
  match err {
    TestError::Flow(msg) => assert!(msg.contains("NotRegistered"), "unexpected: {msg}"),
    other => panic!("expected flow error, got {other:?}"),
  }
}

#[tokio::test]
#[serial]
async fn second_registration_replaces_the_first() {
  setup_tracing();
  let registry = FlowRegistry::<TestError>::new();

  let mut first = Flow::<TestContext, TestError>::new("first", vec![StepSpec::required("s")]);
  first.on("s", recording_handler("s", "first"));
  registry.register(first);

  let mut second = Flow::<TestContext, TestError>::new("second", vec![StepSpec::required("s")]);
  second.on("s", recording_handler("s", "second"));
  registry.register(second);

  let ctx = FlowCtx::new(TestContext::default());
  registry.run(ctx.clone()).await.expect("flow runs");

  assert_eq!(registry.len(), 1);
  assert_eq!(ctx.read().message, "second");
}

#[tokio::test]
#[serial]
async fn flow_can_run_a_nested_flow_through_the_registry() {
  setup_tracing();
  let registry = std::sync::Arc::new(FlowRegistry::<TestError>::new());

  let mut inner = Flow::<OtherContext, TestError>::new("inner", vec![StepSpec::required("touch")]);
  inner.on("touch", |ctx: FlowCtx<OtherContext>| async move {
    ctx.write().touched = true;
    Ok::<_, TestError>(Control::Next)
  });
  registry.register(inner);

  let nested_registry = registry.clone();
  let mut outer = Flow::<TestContext, TestError>::new("outer", vec![StepSpec::required("delegate")]);
  outer.on("delegate", move |ctx: FlowCtx<TestContext>| {
    let registry = nested_registry.clone();
    async move {
      let inner_ctx = FlowCtx::new(OtherContext::default());
      registry.run(inner_ctx.clone()).await?;
      if inner_ctx.read().touched {
        ctx.write().message.push_str("inner ran");
      }
      Ok::<_, TestError>(Control::Next)
    }
  });
  registry.register(outer);

  let ctx = FlowCtx::new(TestContext::default());
  registry.run(ctx.clone()).await.expect("outer flow runs");
  assert_eq!(ctx.read().message, "inner ran");
}
