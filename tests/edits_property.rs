//! Property tests for edit cascades and the persisted payload shape.

mod common;

use common::*;
use loomflow::edits::{EditEvent, FlowEngine};
use loomflow::graph::{Edge, FlowNode, FlowSnapshot};
use loomflow::runtime::PersistedSpace;
use loomflow::types::{NodeId, NodeKind};
use loomflow::utils::json_ext::JsonSerializable;
use loomflow::value::FlowValue;
use proptest::prelude::*;

/// Build a flow by driving the engine with generated nodes and wiring
/// attempts; illegal attempts (self-wires, duplicates) are simply refused
/// by the engine and skipped here.
fn build_flow(node_count: usize, wires: &[(usize, usize)]) -> FlowEngine {
    let mut engine = FlowEngine::new(test_registry());
    for i in 0..node_count {
        engine
            .submit(EditEvent::add_node(FlowNode::new(
                format!("n{i}"),
                NodeKind::Custom("echo".into()),
            )))
            .expect("fresh node ids never collide");
    }
    for (w, (from, to)) in wires.iter().enumerate() {
        let source = engine
            .snapshot()
            .connector_named(&NodeId::from(format!("n{}", from % node_count)), "result")
            .expect("every node has a result connector")
            .id
            .clone();
        let target = engine
            .snapshot()
            .connector_named(&NodeId::from(format!("n{}", to % node_count)), "text")
            .expect("every node has a text connector")
            .id
            .clone();
        let _ = engine.submit(EditEvent::connect(Edge::new(
            format!("e{w}"),
            source,
            target,
        )));
    }
    engine
}

proptest! {
    #[test]
    fn node_removal_never_leaves_orphans(
        node_count in 1usize..6,
        wires in proptest::collection::vec((0usize..6, 0usize..6), 0..10),
        victim in 0usize..6,
    ) {
        let mut engine = build_flow(node_count, &wires);
        let victim = NodeId::from(format!("n{}", victim % node_count));

        engine.submit(EditEvent::remove_node(victim.clone())).unwrap();

        let snapshot = engine.snapshot();
        prop_assert!(!snapshot.contains_node(&victim));
        prop_assert!(snapshot.connectors_of_node(&victim).is_empty());
        assert_no_orphans(snapshot);
    }

    #[test]
    fn exclusive_inputs_hold_at_most_one_edge(
        node_count in 2usize..6,
        wires in proptest::collection::vec((0usize..6, 0usize..6), 0..12),
    ) {
        let engine = build_flow(node_count, &wires);

        for connector in engine.snapshot().connectors() {
            if connector.kind.is_exclusive_target() {
                prop_assert!(
                    engine.snapshot().edges_into(&connector.id).len() <= 1,
                    "input {} holds more than one edge",
                    connector.id
                );
            }
        }
    }

    #[test]
    fn persisted_payload_round_trips(
        node_count in 1usize..6,
        wires in proptest::collection::vec((0usize..6, 0usize..6), 0..10),
        seed in ".{0,12}",
    ) {
        let mut engine = build_flow(node_count, &wires);
        let first_input = engine
            .snapshot()
            .connector_named(&"n0".into(), "text")
            .unwrap()
            .id
            .clone();
        engine
            .submit(EditEvent::set_live_value(first_input, FlowValue::Text(seed)))
            .unwrap();

        let snapshot = engine.snapshot();
        let restored = FlowSnapshot::from(PersistedSpace::from(snapshot));
        prop_assert_eq!(&restored, snapshot);
    }

    #[test]
    fn persisted_payload_serializes_deterministically(
        node_count in 1usize..6,
        wires in proptest::collection::vec((0usize..6, 0usize..6), 0..10),
    ) {
        let engine = build_flow(node_count, &wires);

        let mut a = PersistedSpace::from(engine.snapshot());
        let mut b = PersistedSpace::from(engine.snapshot());
        a.saved_at = String::new();
        b.saved_at = String::new();
        prop_assert_eq!(
            a.to_json_string().unwrap(),
            b.to_json_string().unwrap()
        );
    }
}
