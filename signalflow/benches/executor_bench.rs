//! Benchmarks for DAG execution.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use signalflow::context::RunContext;
use signalflow::pipeline::{DagExecutor, HandlerRegistry, StageDefinition, StageGraph};

/// One root, `width` parallel enrichers and a join.
fn fan_out_executor(width: usize) -> DagExecutor {
    let branches: Vec<String> = (0..width).map(|i| format!("enrich_{i}")).collect();

    let mut stages = vec![StageDefinition::new("parse")];
    stages.extend(
        branches
            .iter()
            .map(|id| StageDefinition::new(id.clone()).with_dependency("parse")),
    );
    stages.push(StageDefinition::new("score").with_dependencies(branches.clone()));

    let mut registry = HandlerRegistry::new()
        .with_fn("parse", |v, _| Ok(v))
        .with_fn("score", |v, _| Ok(json!({ "parents": v["parents"].as_array().map_or(0, Vec::len) })));
    for id in &branches {
        registry = registry.with_fn(id.clone(), |v, _| Ok(json!({ "seen": v })));
    }

    let graph = StageGraph::build(stages).expect("valid graph");
    DagExecutor::from_registry(graph, &registry).expect("handlers resolve")
}

fn executor_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let mut group = c.benchmark_group("dag_fan_out");

    for width in [1, 8, 32] {
        let executor = fan_out_executor(width);
        group.bench_with_input(BenchmarkId::from_parameter(width), &executor, |b, executor| {
            b.to_async(&runtime).iter(|| async {
                let ctx = RunContext::new();
                black_box(executor.run(json!({ "symbol": "BTCUSDT" }), &ctx).await)
            });
        });
    }
    group.finish();
}

fn graph_build_benchmark(c: &mut Criterion) {
    c.bench_function("graph_build_chain_64", |b| {
        b.iter(|| {
            let stages: Vec<StageDefinition> = (0..64)
                .map(|i| {
                    let stage = StageDefinition::new(format!("s{i}"));
                    if i == 0 {
                        stage
                    } else {
                        stage.with_dependency(format!("s{}", i - 1))
                    }
                })
                .collect();
            black_box(StageGraph::build(stages))
        });
    });
}

criterion_group!(benches, executor_benchmark, graph_build_benchmark);
criterion_main!(benches);
