//! Lookup and assertion helpers for integration tests.

use loomflow::graph::FlowSnapshot;
use loomflow::run::RunReport;
use loomflow::types::{ConnectorId, NodeId};
use loomflow::value::FlowValue;

/// Resolve the id of the connector named `name` on node `node`.
pub fn connector_id(snapshot: &FlowSnapshot, node: &str, name: &str) -> ConnectorId {
    snapshot
        .connector_named(&NodeId::from(node), name)
        .unwrap_or_else(|| panic!("no connector named {name} on node {node}"))
        .id
        .clone()
}

/// The value a run produced at `node`'s connector `name`, or empty.
pub fn scope_value(
    report: &RunReport,
    snapshot: &FlowSnapshot,
    node: &str,
    name: &str,
) -> FlowValue {
    report
        .scope
        .value_or_empty(&connector_id(snapshot, node, name))
}

/// Assert referential integrity: every connector belongs to a present node
/// and every edge joins two present connectors.
pub fn assert_no_orphans(snapshot: &FlowSnapshot) {
    for connector in snapshot.connectors() {
        assert!(
            snapshot.contains_node(&connector.node_id),
            "connector {} references missing node {}",
            connector.id,
            connector.node_id
        );
    }
    for edge in snapshot.edges() {
        assert!(
            snapshot.contains_connector(&edge.source_connector_id),
            "edge {} references missing source connector {}",
            edge.id,
            edge.source_connector_id
        );
        assert!(
            snapshot.contains_connector(&edge.target_connector_id),
            "edge {} references missing target connector {}",
            edge.id,
            edge.target_connector_id
        );
    }
}

/// Assert that `node` is among the report's ran nodes.
pub fn assert_ran(report: &RunReport, node: &str) {
    assert!(
        report.ran_nodes.contains(&NodeId::from(node)),
        "expected node {node} to have run; ran: {:?}",
        report.ran_nodes
    );
}

/// Assert that `node` is among the report's skipped nodes.
pub fn assert_skipped(report: &RunReport, node: &str) {
    assert!(
        report.skipped_nodes.contains(&NodeId::from(node)),
        "expected node {node} to have been skipped; skipped: {:?}",
        report.skipped_nodes
    );
}
