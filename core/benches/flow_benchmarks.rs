use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use hatua::{Control, Flow, FlowCtx, FlowError, FlowRegistry, StepSpec};
use tokio::runtime::Runtime;

#[derive(Clone, Debug, Default)]
struct BenchContext {
  counter: u64,
}

fn increment_handler(iterations: u64) -> hatua::Handler<BenchContext, FlowError> {
  Box::new(move |ctx: FlowCtx<BenchContext>| {
    Box::pin(async move {
      let mut data = ctx.write();
      for _ in 0..iterations {
        data.counter = data.counter.wrapping_add(1);
      }
      Ok(Control::Next)
    })
  })
}

fn build_flow(num_steps: usize, iterations: u64) -> Flow<BenchContext, FlowError> {
  let specs = (0..num_steps).map(|i| StepSpec::required(format!("step_{i}"))).collect();
  let mut flow = Flow::new("bench", specs);
  for i in 0..num_steps {
    flow.on(&format!("step_{i}"), increment_handler(iterations));
  }
  flow
}

fn bench_direct_run(c: &mut Criterion) {
  let mut group = c.benchmark_group("FlowRun");
  let rt = Runtime::new().unwrap();

  for num_steps in [1usize, 5, 10] {
    let flow = build_flow(num_steps, 10);
    group.bench_with_input(BenchmarkId::from_parameter(num_steps), &num_steps, |b, _| {
      b.to_async(&rt).iter(|| async {
        let ctx = FlowCtx::new(BenchContext::default());
        flow.run(ctx).await.unwrap();
      });
    });
  }
  group.finish();
}

fn bench_registry_dispatch(c: &mut Criterion) {
  let rt = Runtime::new().unwrap();
  let registry = FlowRegistry::<FlowError>::new();
  registry.register(build_flow(5, 10));

  c.bench_function("RegistryDispatch/5_steps", |b| {
    b.to_async(&rt).iter(|| async {
      let ctx = FlowCtx::new(BenchContext::default());
      registry.run(ctx).await.unwrap();
    });
  });
}

criterion_group!(benches, bench_direct_run, bench_registry_dispatch);
criterion_main!(benches);
