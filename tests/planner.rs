//! Run ordering and branch activation.

mod common;

use common::*;
use loomflow::graph::{Connector, Edge, FlowNode, FlowSnapshot};
use loomflow::planner::{PlanError, Planner};
use loomflow::run::VariableScope;
use loomflow::types::{BranchPolicy, ConnectorKind, NodeId, NodeKind};
use loomflow::value::FlowValue;

#[test]
fn run_order_respects_dependencies() {
    let snapshot = linear_flow(test_registry(), "upper", "x");
    let order = Planner::new(&snapshot).run_order().unwrap();

    assert_eq!(
        order,
        vec![
            NodeId::from("in"),
            NodeId::from("work"),
            NodeId::from("out"),
        ]
    );
}

#[test]
fn independent_nodes_order_by_id() {
    let snapshot = FlowSnapshot::new()
        .with_node(FlowNode::new("zeta", NodeKind::Custom("echo".into())))
        .with_node(FlowNode::new("alpha", NodeKind::Custom("echo".into())))
        .with_node(FlowNode::new("mid", NodeKind::Custom("echo".into())));

    let order = Planner::new(&snapshot).run_order().unwrap();

    assert_eq!(
        order,
        vec![
            NodeId::from("alpha"),
            NodeId::from("mid"),
            NodeId::from("zeta"),
        ]
    );
}

#[test]
fn a_cycle_fails_to_plan() {
    let snapshot = FlowSnapshot::new()
        .with_node(FlowNode::new("a", NodeKind::Custom("echo".into())))
        .with_node(FlowNode::new("b", NodeKind::Custom("echo".into())))
        .with_connector(Connector::new("a-in", "a", ConnectorKind::NodeInput, 0, "text"))
        .with_connector(Connector::new("a-out", "a", ConnectorKind::NodeOutput, 0, "result"))
        .with_connector(Connector::new("b-in", "b", ConnectorKind::NodeInput, 0, "text"))
        .with_connector(Connector::new("b-out", "b", ConnectorKind::NodeOutput, 0, "result"))
        .with_edge(Edge::new("e1", "a-out", "b-in"))
        .with_edge(Edge::new("e2", "b-out", "a-in"));

    let err = Planner::new(&snapshot).run_order().unwrap_err();

    assert!(matches!(err, PlanError::Cycle { .. }));
}

fn branch_decision(
    policy: BranchPolicy,
    input: &str,
) -> (FlowSnapshot, loomflow::planner::BranchDecision) {
    let snapshot = conditional_flow(policy, input);
    let mut scope = VariableScope::new();
    scope.set(
        connector_id(&snapshot, "in", "input"),
        FlowValue::Text(input.into()),
    );
    let node = snapshot.node(&"branch".into()).unwrap();
    let decision = Planner::new(&snapshot)
        .decide_branches(node, &scope)
        .unwrap();
    (snapshot, decision)
}

#[test]
fn first_match_stops_at_the_first_holding_condition() {
    // "go" satisfies both conditions; only the first branch activates.
    let (snapshot, decision) = branch_decision(BranchPolicy::FirstMatch, "go");

    assert_eq!(
        decision.active_conditions,
        vec![connector_id(&snapshot, "branch", "c1")]
    );
    assert!(!decision.took_default);
    assert_eq!(decision.active_edges.len(), 1);
    assert_eq!(decision.inactive_edges.len(), 2);
}

#[test]
fn evaluate_all_activates_every_holding_condition() {
    let (snapshot, decision) = branch_decision(BranchPolicy::EvaluateAll, "go");

    assert_eq!(
        decision.active_conditions,
        vec![
            connector_id(&snapshot, "branch", "c1"),
            connector_id(&snapshot, "branch", "c2"),
        ]
    );
    assert!(!decision.took_default);
    assert_eq!(decision.active_edges.len(), 2);
}

#[test]
fn default_branch_activates_only_when_nothing_matches() {
    let (snapshot, decision) = branch_decision(BranchPolicy::FirstMatch, "");

    assert!(decision.took_default);
    assert_eq!(
        decision.active_conditions,
        vec![connector_id(&snapshot, "branch", "default")]
    );
    assert_eq!(decision.active_edges.len(), 1);
}

#[test]
fn malformed_conditional_config_is_an_invalid_config_error() {
    let snapshot = FlowSnapshot::new().with_node(
        FlowNode::new("branch", NodeKind::IfElse)
            .with_config(serde_json::json!({ "conditions": "not-a-list" })),
    );
    let node = snapshot.node(&"branch".into()).unwrap();

    let err = Planner::new(&snapshot)
        .decide_branches(node, &VariableScope::new())
        .unwrap_err();

    assert!(matches!(err, PlanError::InvalidConfig { .. }));
}

#[test]
fn non_conditional_nodes_keep_all_outgoing_edges_active() {
    let snapshot = linear_flow(test_registry(), "upper", "x");
    let node = snapshot.node(&"in".into()).unwrap();

    let active = Planner::new(&snapshot)
        .active_outgoing(node, &VariableScope::new())
        .unwrap();

    assert_eq!(active.len(), 1);
}
