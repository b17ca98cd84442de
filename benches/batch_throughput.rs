//! Measures batch fan-out throughput: cells completed per second for a
//! trivial echo flow at varying table sizes and worker counts.

use std::sync::Arc;

use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use loomflow::batch::{BatchOptions, BatchRunner, Table};
use loomflow::behavior::{
    BehaviorRegistry, NodeBehavior, NodeStep, StepContext, StepError, StepOutput,
};
use loomflow::edits::{EditEvent, FlowBuilder};
use loomflow::graph::FlowSnapshot;
use loomflow::run::FlowRunner;
use loomflow::types::NodeKind;
use tokio::runtime::Runtime;

const ROW_COUNTS: &[usize] = &[4, 16, 64];
const WORKER_COUNTS: &[usize] = &[1, 4];

struct Echo;

#[async_trait]
impl NodeStep for Echo {
    async fn execute(&self, ctx: StepContext) -> Result<StepOutput, StepError> {
        Ok(StepOutput::single(ctx.arg("text")))
    }
}

fn registry() -> BehaviorRegistry {
    BehaviorRegistry::new().with_behavior(
        NodeBehavior::new(NodeKind::Custom("echo".into()))
            .with_input("text")
            .with_output("result")
            .with_step(Arc::new(Echo)),
    )
}

fn bound_flow() -> FlowSnapshot {
    let mut engine = FlowBuilder::new(registry())
        .add_node("in", NodeKind::FlowInput)
        .add_node("work", NodeKind::Custom("echo".into()))
        .add_node("out", NodeKind::FlowOutput)
        .connect("in", "input", "work", "text")
        .connect("work", "result", "out", "output")
        .into_engine();
    let input = engine
        .snapshot()
        .connector_named(&"in".into(), "input")
        .expect("flow input")
        .id
        .clone();
    engine
        .submit(EditEvent::set_column_binding(input, Some(0)))
        .expect("column binding");
    engine.into_snapshot()
}

fn table_with_rows(rows: usize) -> Table {
    let data: Vec<Vec<String>> = (0..rows).map(|i| vec![format!("row-{i}")]).collect();
    Table::new(vec!["name".to_string()], data)
}

fn bench_batch_cells(c: &mut Criterion) {
    let runtime = Runtime::new().expect("tokio runtime");
    let snapshot = Arc::new(bound_flow());
    let registry = Arc::new(registry());

    let mut group = c.benchmark_group("batch_cell_throughput");
    for &rows in ROW_COUNTS {
        for &workers in WORKER_COUNTS {
            group.throughput(Throughput::Elements(rows as u64));
            group.bench_with_input(
                BenchmarkId::from_parameter(format!("{rows}rows_{workers}workers")),
                &(rows, workers),
                |b, &(rows, workers)| {
                    b.to_async(&runtime).iter(|| {
                        let runner =
                            FlowRunner::new(Arc::clone(&snapshot), Arc::clone(&registry));
                        async move {
                            let (events, rx) = flume::unbounded();
                            let handle = BatchRunner::new(runner, events).start(
                                table_with_rows(rows),
                                BatchOptions::default().with_concurrency_limit(workers),
                            );
                            let report = handle.wait().await;
                            drop(rx);
                            assert_eq!(report.completed, rows);
                            report
                        }
                    });
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_batch_cells);
criterion_main!(benches);
