//! Patches: the only way a snapshot changes.
//!
//! A [`SnapshotPatch`] is an ordered list of primitive operations produced
//! by the derivation engine (or a loader). [`FlowSnapshot::apply`] folds the
//! operations into a fresh snapshot; it is a pure function and never fails
//! for well-formed patches — removals of absent entities are no-ops.

use super::snapshot::{Connector, Edge, FlowNode, FlowSnapshot};
use crate::types::{CellTag, ConnectorId, EdgeId, NodeId};
use crate::value::FlowValue;

/// One primitive change to a snapshot.
#[derive(Clone, Debug, PartialEq)]
pub enum PatchOp {
    /// Insert or replace a node.
    PutNode(FlowNode),
    /// Remove a node. Owned connectors are removed by their own ops; the
    /// derivation engine guarantees they accompany this one.
    RemoveNode(NodeId),
    /// Insert or replace a connector.
    PutConnector(Connector),
    /// Remove a connector.
    RemoveConnector(ConnectorId),
    /// Insert or replace an edge.
    PutEdge(Edge),
    /// Remove an edge.
    RemoveEdge(EdgeId),
    /// Set a connector's value in the live (slot 0) map.
    SetLiveValue(ConnectorId, FlowValue),
    /// Set a connector's value in one batch cell's map.
    SetCellValue(CellTag, ConnectorId, FlowValue),
    /// Drop a connector's entries from the live map, every cell map, and
    /// the column bindings. Emitted whenever a connector disappears.
    PurgeConnectorValues(ConnectorId),
    /// Set or clear a FlowInput connector's batch column binding.
    SetColumnBinding(ConnectorId, Option<usize>),
    /// Drop every batch cell map (a new batch run starts clean).
    ClearCellValues,
}

/// An ordered collection of [`PatchOp`]s applied atomically.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SnapshotPatch {
    ops: Vec<PatchOp>,
}

impl SnapshotPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: PatchOp) {
        self.ops.push(op);
    }

    /// Append all of `other`'s operations after this patch's own.
    pub fn extend(&mut self, other: SnapshotPatch) {
        self.ops.extend(other.ops);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[PatchOp] {
        &self.ops
    }

    #[must_use]
    pub fn with(mut self, op: PatchOp) -> Self {
        self.push(op);
        self
    }
}

impl From<Vec<PatchOp>> for SnapshotPatch {
    fn from(ops: Vec<PatchOp>) -> Self {
        Self { ops }
    }
}

impl FlowSnapshot {
    /// Apply a patch, producing the successor snapshot.
    ///
    /// Operations apply in order. The function is total: putting over an
    /// existing id replaces it, removing an absent id does nothing. Invariant
    /// checking happens earlier, in the derivation engine; by the time a
    /// patch exists it is legal by construction.
    #[must_use]
    pub fn apply(&self, patch: &SnapshotPatch) -> FlowSnapshot {
        let mut next = self.clone();
        for op in patch.ops() {
            match op {
                PatchOp::PutNode(node) => {
                    next.nodes_mut().insert(node.id.clone(), node.clone());
                }
                PatchOp::RemoveNode(id) => {
                    next.nodes_mut().remove(id);
                }
                PatchOp::PutConnector(connector) => {
                    next.connectors_mut()
                        .insert(connector.id.clone(), connector.clone());
                }
                PatchOp::RemoveConnector(id) => {
                    next.connectors_mut().remove(id);
                }
                PatchOp::PutEdge(edge) => {
                    next.edges_mut().insert(edge.id.clone(), edge.clone());
                }
                PatchOp::RemoveEdge(id) => {
                    next.edges_mut().remove(id);
                }
                PatchOp::SetLiveValue(id, value) => {
                    next.live_values_mut().insert(id.clone(), value.clone());
                }
                PatchOp::SetCellValue(tag, id, value) => {
                    next.cell_values_mut()
                        .entry(*tag)
                        .or_default()
                        .insert(id.clone(), value.clone());
                }
                PatchOp::PurgeConnectorValues(id) => {
                    next.live_values_mut().remove(id);
                    for cell_map in next.cell_values_mut().values_mut() {
                        cell_map.remove(id);
                    }
                    next.column_bindings_mut().remove(id);
                }
                PatchOp::SetColumnBinding(id, column) => {
                    next.column_bindings_mut().insert(id.clone(), *column);
                }
                PatchOp::ClearCellValues => {
                    next.cell_values_mut().clear();
                }
            }
        }
        next
    }
}
