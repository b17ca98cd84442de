//! Derivation engine behavior through the public edit surface.

mod common;

use common::*;
use loomflow::edits::{EditError, EditEvent, FlowBuilder, FlowEngine};
use loomflow::graph::{Connector, Edge, Position};
use loomflow::types::{ConnectorKind, NodeKind};
use loomflow::value::{FlowValue, ValueKind};

fn linear_engine() -> FlowEngine {
    FlowBuilder::new(test_registry())
        .add_node("in", NodeKind::FlowInput)
        .add_node("work", NodeKind::Custom("echo".into()))
        .add_node("out", NodeKind::FlowOutput)
        .connect("in", "input", "work", "text")
        .connect("work", "result", "out", "output")
        .live_value("in", "input", FlowValue::Text("x".into()))
        .into_engine()
}

#[test]
fn removing_a_node_cascades_connectors_edges_and_values() {
    let mut engine = linear_engine();
    assert_eq!(engine.snapshot().edge_count(), 2);

    let report = engine.submit(EditEvent::remove_node("work")).unwrap();

    assert!(report.content_changed);
    let snapshot = engine.snapshot();
    assert!(!snapshot.contains_node(&"work".into()));
    assert!(snapshot.connectors_of_node(&"work".into()).is_empty());
    assert_eq!(snapshot.edge_count(), 0);
    assert_no_orphans(snapshot);
}

#[test]
fn removing_an_absent_node_is_a_clean_no_op() {
    let mut engine = linear_engine();
    let before = engine.snapshot().clone();

    let report = engine.submit(EditEvent::remove_node("ghost")).unwrap();

    assert!(!report.content_changed);
    assert_eq!(engine.snapshot(), &before);
}

#[test]
fn moving_a_node_to_its_current_position_changes_nothing() {
    let mut engine = linear_engine();
    let report = engine
        .submit(EditEvent::move_node("work", Position::default()))
        .unwrap();
    assert!(!report.content_changed);

    let report = engine
        .submit(EditEvent::move_node("work", Position::new(10.0, 4.0)))
        .unwrap();
    assert!(report.content_changed);
}

#[test]
fn setting_the_same_live_value_twice_is_a_no_op() {
    let mut engine = linear_engine();
    let input = connector_id(engine.snapshot(), "in", "input");

    let report = engine
        .submit(EditEvent::set_live_value(
            input,
            FlowValue::Text("x".into()),
        ))
        .unwrap();

    assert!(!report.content_changed);
}

#[test]
fn connecting_onto_an_occupied_input_replaces_the_edge() {
    let mut engine = FlowBuilder::new(test_registry())
        .add_node("a", NodeKind::Custom("echo".into()))
        .add_node("b", NodeKind::Custom("echo".into()))
        .add_node("c", NodeKind::Custom("echo".into()))
        .connect("a", "result", "c", "text")
        .into_engine();
    let old_edge = engine
        .snapshot()
        .edge_into(&connector_id(engine.snapshot(), "c", "text"))
        .unwrap()
        .id
        .clone();

    let b_out = connector_id(engine.snapshot(), "b", "result");
    let c_in = connector_id(engine.snapshot(), "c", "text");
    engine
        .submit(EditEvent::connect(Edge::new("e-replace", b_out.clone(), c_in.clone())))
        .unwrap();

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.edge_count(), 1);
    assert!(!snapshot.contains_edge(&old_edge));
    assert_eq!(
        snapshot.edge_into(&c_in).unwrap().source_connector_id,
        b_out
    );
    assert_no_orphans(snapshot);
}

#[test]
fn rewiring_the_same_source_is_a_no_op() {
    let mut engine = linear_engine();
    let source = connector_id(engine.snapshot(), "in", "input");
    let target = connector_id(engine.snapshot(), "work", "text");

    let report = engine
        .submit(EditEvent::connect(Edge::new("e-dup", source, target)))
        .unwrap();

    assert!(!report.content_changed);
    assert_eq!(engine.snapshot().edge_count(), 2);
}

#[test]
fn audio_source_is_refused_by_a_typed_target() {
    let mut engine = FlowBuilder::new(test_registry())
        .add_node("mic", NodeKind::Custom("echo".into()))
        .add_node("sink", NodeKind::Custom("echo".into()))
        .into_engine();
    let mic_out = connector_id(engine.snapshot(), "mic", "result");
    let sink_in = connector_id(engine.snapshot(), "sink", "text");
    engine
        .submit(EditEvent::retype_connector(
            mic_out.clone(),
            Some(ValueKind::Audio),
        ))
        .unwrap();
    engine
        .submit(EditEvent::retype_connector(
            sink_in.clone(),
            Some(ValueKind::Number),
        ))
        .unwrap();

    let err = engine
        .submit(EditEvent::connect(Edge::new("e-audio", mic_out, sink_in)))
        .unwrap_err();

    assert!(matches!(err, EditError::ConnectionRejected { .. }));
    assert_eq!(engine.snapshot().edge_count(), 0);
}

#[test]
fn audio_connect_retypes_an_untyped_target() {
    let mut engine = FlowBuilder::new(test_registry())
        .add_node("mic", NodeKind::Custom("echo".into()))
        .add_node("sink", NodeKind::Custom("echo".into()))
        .into_engine();
    let mic_out = connector_id(engine.snapshot(), "mic", "result");
    let sink_in = connector_id(engine.snapshot(), "sink", "text");
    engine
        .submit(EditEvent::retype_connector(
            mic_out.clone(),
            Some(ValueKind::Audio),
        ))
        .unwrap();

    engine
        .submit(EditEvent::connect(Edge::new(
            "e-audio",
            mic_out.clone(),
            sink_in.clone(),
        )))
        .unwrap();
    assert_eq!(
        engine.snapshot().connector(&sink_in).unwrap().value_kind,
        Some(ValueKind::Audio)
    );

    // Losing the last audio source downgrades the target to text.
    engine.submit(EditEvent::remove_edge("e-audio")).unwrap();
    assert_eq!(
        engine.snapshot().connector(&sink_in).unwrap().value_kind,
        Some(ValueKind::Text)
    );
}

#[test]
fn replacing_an_audio_source_with_text_downgrades_the_target() {
    let mut engine = FlowBuilder::new(test_registry())
        .add_node("mic", NodeKind::Custom("echo".into()))
        .add_node("script", NodeKind::Custom("echo".into()))
        .add_node("sink", NodeKind::Custom("echo".into()))
        .into_engine();
    let mic_out = connector_id(engine.snapshot(), "mic", "result");
    let script_out = connector_id(engine.snapshot(), "script", "result");
    let sink_in = connector_id(engine.snapshot(), "sink", "text");
    engine
        .submit(EditEvent::retype_connector(
            mic_out.clone(),
            Some(ValueKind::Audio),
        ))
        .unwrap();
    engine
        .submit(EditEvent::retype_connector(
            script_out.clone(),
            Some(ValueKind::Text),
        ))
        .unwrap();
    engine
        .submit(EditEvent::connect(Edge::new(
            "e-audio",
            mic_out,
            sink_in.clone(),
        )))
        .unwrap();
    assert_eq!(
        engine.snapshot().connector(&sink_in).unwrap().value_kind,
        Some(ValueKind::Audio)
    );

    engine
        .submit(EditEvent::connect(Edge::new(
            "e-text",
            script_out,
            sink_in.clone(),
        )))
        .unwrap();

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.edge_count(), 1);
    assert_eq!(
        snapshot.connector(&sink_in).unwrap().value_kind,
        Some(ValueKind::Text)
    );
    assert_no_orphans(snapshot);
}

#[test]
fn self_wiring_is_rejected() {
    let mut engine = FlowBuilder::new(test_registry())
        .add_node("a", NodeKind::Custom("echo".into()))
        .into_engine();
    let out = connector_id(engine.snapshot(), "a", "result");
    let input = connector_id(engine.snapshot(), "a", "text");

    let err = engine
        .submit(EditEvent::connect(Edge::new("e-self", out, input)))
        .unwrap_err();

    assert!(matches!(err, EditError::ConnectionRejected { .. }));
}

#[test]
fn condition_targets_allow_fan_in() {
    let mut engine = FlowBuilder::new(test_registry())
        .add_node("c1", NodeKind::IfElse)
        .add_node("c2", NodeKind::IfElse)
        .add_node("g", NodeKind::Custom("gated".into()))
        .into_engine();
    let when = connector_id(engine.snapshot(), "g", "when");
    let d1 = connector_id(engine.snapshot(), "c1", "default");
    let d2 = connector_id(engine.snapshot(), "c2", "default");

    engine
        .submit(EditEvent::connect(Edge::new("e1", d1, when.clone())))
        .unwrap();
    engine
        .submit(EditEvent::connect(Edge::new("e2", d2, when.clone())))
        .unwrap();

    assert_eq!(engine.snapshot().edges_into(&when).len(), 2);
}

#[test]
fn column_bindings_only_apply_to_flow_inputs() {
    let mut engine = linear_engine();
    let input = connector_id(engine.snapshot(), "in", "input");
    let node_input = connector_id(engine.snapshot(), "work", "text");

    engine
        .submit(EditEvent::set_column_binding(input.clone(), Some(2)))
        .unwrap();
    assert_eq!(engine.snapshot().column_binding(&input), Some(2));

    let err = engine
        .submit(EditEvent::set_column_binding(node_input, Some(0)))
        .unwrap_err();
    assert!(matches!(err, EditError::Invalid { .. }));
}

#[test]
fn removing_a_connector_leaves_sibling_indices_untouched() {
    let mut engine = FlowBuilder::new(test_registry())
        .add_node("n", NodeKind::Custom("echo".into()))
        .apply(EditEvent::add_connector(Connector::new(
            "n-extra",
            "n",
            ConnectorKind::NodeInput,
            1,
            "extra",
        )))
        .into_engine();
    let first = connector_id(engine.snapshot(), "n", "text");

    engine
        .submit(EditEvent::remove_connector(first))
        .unwrap();

    let extra = engine
        .snapshot()
        .connector_named(&"n".into(), "extra")
        .unwrap();
    assert_eq!(extra.index, 1);
}

#[test]
fn a_failed_edit_leaves_the_snapshot_untouched() {
    let mut engine = linear_engine();
    let before = engine.snapshot().clone();

    let err = engine.submit(EditEvent::set_live_value(
        "ghost-connector",
        FlowValue::Text("x".into()),
    ));

    assert!(matches!(err, Err(EditError::NotFound { .. })));
    assert_eq!(engine.snapshot(), &before);
}
