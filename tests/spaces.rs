//! The space façade: open, edit, run, batch, and persist through one handle.

mod common;

use std::time::Duration;

use common::*;
use loomflow::batch::Table;
use loomflow::edits::EditEvent;
use loomflow::event_bus::FlowEvent;
use loomflow::graph::FlowNode;
use loomflow::runtime::{FlowSpace, RuntimeConfig};
use loomflow::types::{CellStatus, CellTag, NodeKind, SpaceId};
use loomflow::value::FlowValue;

fn quiet_config() -> RuntimeConfig {
    RuntimeConfig::default()
        .with_space_id(SpaceId::new("test-space"))
        .with_memory_event_bus()
        .with_save_debounce(Duration::from_millis(10))
}

async fn open_linear_space() -> FlowSpace {
    let mut space = FlowSpace::open(quiet_config(), test_registry())
        .await
        .unwrap();
    space
        .submit(EditEvent::add_node(FlowNode::new(
            "in",
            NodeKind::FlowInput,
        )))
        .unwrap();
    space
        .submit(EditEvent::add_node(FlowNode::new(
            "work",
            NodeKind::Custom("upper".into()),
        )))
        .unwrap();
    space
        .submit(EditEvent::add_node(FlowNode::new(
            "out",
            NodeKind::FlowOutput,
        )))
        .unwrap();

    let input = connector_id(space.snapshot(), "in", "input");
    let work_in = connector_id(space.snapshot(), "work", "text");
    let work_out = connector_id(space.snapshot(), "work", "result");
    let output = connector_id(space.snapshot(), "out", "output");
    space
        .submit(EditEvent::connect(loomflow::graph::Edge::new(
            "e1", input.clone(), work_in,
        )))
        .unwrap();
    space
        .submit(EditEvent::connect(loomflow::graph::Edge::new(
            "e2", work_out, output,
        )))
        .unwrap();
    space
        .submit(EditEvent::set_live_value(
            input,
            FlowValue::Text("hello".into()),
        ))
        .unwrap();
    space
}

#[tokio::test]
async fn an_opened_space_edits_and_runs() {
    let space = open_linear_space().await;

    let report = space.run_interactive().await;

    assert!(report.is_completed());
    assert_eq!(
        scope_value(&report, space.snapshot(), "out", "output"),
        FlowValue::Text("HELLO".into())
    );
    space.close().await;
}

#[tokio::test]
async fn runs_pin_the_snapshot_at_launch_time() {
    let mut space = open_linear_space().await;
    let runner = space.runner();

    // Edits after the runner was taken do not affect it.
    space.submit(EditEvent::remove_node("work")).unwrap();
    assert!(!space.snapshot().contains_node(&"work".into()));

    let (events, _rx) = flume::unbounded();
    let report = runner.run(loomflow::run::RunOptions::new(events)).await;
    assert!(report.is_completed());
    assert_eq!(
        scope_value(&report, runner.snapshot(), "work", "result"),
        FlowValue::Text("HELLO".into())
    );
    space.close().await;
}

#[tokio::test]
async fn subscribers_see_run_events() {
    let space = open_linear_space().await;
    let mut stream = space.subscribe();

    let report = space.run_interactive().await;
    assert!(report.is_completed());

    let mut saw_node_event = false;
    while let Some(event) = stream.next_timeout(Duration::from_millis(200)).await {
        if matches!(event, FlowEvent::Node(_)) {
            saw_node_event = true;
            break;
        }
    }
    assert!(saw_node_event, "no node lifecycle event reached subscribers");
    space.close().await;
}

#[tokio::test]
async fn spaces_run_batches_with_configured_knobs() {
    let mut space = FlowSpace::open(
        quiet_config().with_repeat_times(2).with_concurrency_limit(2),
        test_registry(),
    )
    .await
    .unwrap();
    space
        .submit(EditEvent::add_node(FlowNode::new(
            "in",
            NodeKind::FlowInput,
        )))
        .unwrap();
    space
        .submit(EditEvent::add_node(FlowNode::new(
            "work",
            NodeKind::Custom("echo".into()),
        )))
        .unwrap();
    let input = connector_id(space.snapshot(), "in", "input");
    let work_in = connector_id(space.snapshot(), "work", "text");
    space
        .submit(EditEvent::connect(loomflow::graph::Edge::new(
            "e1", input.clone(), work_in,
        )))
        .unwrap();
    space
        .submit(EditEvent::set_column_binding(input, Some(0)))
        .unwrap();

    let table = Table::parse("name\na\nb").unwrap();
    let handle = space.start_batch(table);
    let board = handle.board();
    let report = handle.wait().await;

    assert_eq!(report.total_cells, 4);
    assert_eq!(report.completed, 4);
    assert_eq!(board.status(&CellTag::new(1, 1)), CellStatus::Complete);
    space.close().await;
}

#[tokio::test]
async fn configured_column_bindings_apply_on_open_when_valid() {
    // A binding for a connector that does not exist yet is skipped with a
    // warning, not a failure.
    let config = quiet_config().with_column_binding("ghost-connector", Some(0));
    let space = FlowSpace::open(config, test_registry()).await.unwrap();
    assert!(space.snapshot().column_bindings().is_empty());
    space.close().await;
}
