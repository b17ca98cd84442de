//! Flow graph fixtures shared across integration tests.

use std::sync::Arc;
use std::time::Duration;

use loomflow::behavior::{BehaviorRegistry, ConnectorSpec, NodeBehavior, NodeStep};
use loomflow::edits::{EditEvent, FlowBuilder};
use loomflow::graph::{Connector, FlowSnapshot};
use loomflow::types::{BranchPolicy, ConnectorKind, NodeKind};
use loomflow::value::FlowValue;
use serde_json::json;

use super::steps::{EchoStep, FailStep, SlowStep, StallStep, StreamStep, UpperStep};

/// Registry with the shared test step kinds registered.
pub fn test_registry() -> BehaviorRegistry {
    BehaviorRegistry::new()
        .with_behavior(step_behavior("echo", Arc::new(EchoStep)))
        .with_behavior(step_behavior("upper", Arc::new(UpperStep)))
        .with_behavior(step_behavior("fail", Arc::new(FailStep::new("boom"))))
        .with_behavior(step_behavior("stream", Arc::new(StreamStep)))
        .with_behavior(step_behavior(
            "slow",
            Arc::new(SlowStep::new(Duration::from_secs(30))),
        ))
        .with_behavior(step_behavior("stall", Arc::new(StallStep)))
        .with_behavior(
            // Echo with a condition target so a branch must enable it.
            NodeBehavior::new(NodeKind::Custom("gated".into()))
                .with_connector(ConnectorSpec::new(ConnectorKind::ConditionTarget, "when"))
                .with_input("text")
                .with_output("result")
                .with_step(Arc::new(EchoStep)),
        )
}

/// One `text` in, one `result` out, backed by `step`.
pub fn step_behavior(tag: &str, step: Arc<dyn NodeStep>) -> NodeBehavior {
    NodeBehavior::new(NodeKind::Custom(tag.into()))
        .with_input("text")
        .with_output("result")
        .with_step(step)
}

/// `in -> work -> out` where `work` runs the given custom kind, with the
/// flow input seeded to `input`.
pub fn linear_flow(registry: BehaviorRegistry, work_kind: &str, input: &str) -> FlowSnapshot {
    FlowBuilder::new(registry)
        .add_node("in", NodeKind::FlowInput)
        .add_node("work", NodeKind::Custom(work_kind.into()))
        .add_node("out", NodeKind::FlowOutput)
        .connect("in", "input", "work", "text")
        .connect("work", "result", "out", "output")
        .live_value("in", "input", FlowValue::Text(input.into()))
        .build()
}

/// `in -> up -> boom -> tail -> out`: `boom` always fails, so `tail` and
/// `out` should never run.
pub fn failing_flow(input: &str) -> FlowSnapshot {
    FlowBuilder::new(test_registry())
        .add_node("in", NodeKind::FlowInput)
        .add_node("up", NodeKind::Custom("upper".into()))
        .add_node("boom", NodeKind::Custom("fail".into()))
        .add_node("tail", NodeKind::Custom("echo".into()))
        .add_node("out", NodeKind::FlowOutput)
        .connect("in", "input", "up", "text")
        .connect("up", "result", "boom", "text")
        .connect("boom", "result", "tail", "text")
        .connect("tail", "result", "out", "output")
        .live_value("in", "input", FlowValue::Text(input.into()))
        .build()
}

/// A conditional fan-out:
///
/// ```text
/// in ──────────────────┬──> a.text   (gated by branch condition 1)
///    └─> branch.value  ├──> b.text   (gated by branch condition 2)
///                      └──> d.text   (gated by the default branch)
/// a.result ──> out
/// ```
///
/// Condition 1 is `is_truthy(value)`, condition 2 is `value == "go"`, so an
/// input of `"go"` satisfies both and an empty input satisfies neither.
pub fn conditional_flow(policy: BranchPolicy, input: &str) -> FlowSnapshot {
    FlowBuilder::new(test_registry())
        .add_node("in", NodeKind::FlowInput)
        .add_node_with_config(
            "branch",
            NodeKind::IfElse,
            json!({
                "branch_policy": policy,
                "conditions": [
                    { "input": "value", "operator": "is_truthy" },
                    { "input": "value", "operator": "equals", "compare": "go" },
                ],
            }),
        )
        .add_node("a", NodeKind::Custom("gated".into()))
        .add_node("b", NodeKind::Custom("gated".into()))
        .add_node("d", NodeKind::Custom("gated".into()))
        .add_node("out", NodeKind::FlowOutput)
        .apply(EditEvent::add_connector(Connector::new(
            "branch-value",
            "branch",
            ConnectorKind::NodeInput,
            0,
            "value",
        )))
        .apply(EditEvent::add_connector(Connector::new(
            "branch-c1",
            "branch",
            ConnectorKind::Condition,
            1,
            "c1",
        )))
        .apply(EditEvent::add_connector(Connector::new(
            "branch-c2",
            "branch",
            ConnectorKind::Condition,
            2,
            "c2",
        )))
        .connect("in", "input", "branch", "value")
        .connect("branch", "c1", "a", "when")
        .connect("branch", "c2", "b", "when")
        .connect("branch", "default", "d", "when")
        .connect("in", "input", "a", "text")
        .connect("in", "input", "b", "text")
        .connect("in", "input", "d", "text")
        .connect("a", "result", "out", "output")
        .live_value("in", "input", FlowValue::Text(input.into()))
        .build()
}

/// `in -> work -> out` with the flow input bound to table column 0.
pub fn batch_flow(registry: BehaviorRegistry, work_kind: &str) -> FlowSnapshot {
    let mut engine = FlowBuilder::new(registry)
        .add_node("in", NodeKind::FlowInput)
        .add_node("work", NodeKind::Custom(work_kind.into()))
        .add_node("out", NodeKind::FlowOutput)
        .connect("in", "input", "work", "text")
        .connect("work", "result", "out", "output")
        .into_engine();
    let input = engine
        .snapshot()
        .connector_named(&"in".into(), "input")
        .expect("flow input connector")
        .id
        .clone();
    engine
        .submit(EditEvent::set_column_binding(input, Some(0)))
        .expect("column binding");
    engine.into_snapshot()
}
