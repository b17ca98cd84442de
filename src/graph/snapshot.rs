//! Immutable flow graph snapshots.
//!
//! A [`FlowSnapshot`] is the authoritative in-memory picture of a flow:
//! nodes, connectors, edges, the live variable value map, per-cell batch
//! value maps, and the batch column bindings. Snapshots are never mutated
//! in place; every edit produces a new snapshot through
//! [`FlowSnapshot::apply`](crate::graph::SnapshotPatch), so "nothing
//! changed" is a plain equality check and executors can hold a snapshot
//! without any locking.
//!
//! # Core Types
//!
//! - [`FlowNode`]: a node with kind, canvas position, and kind-specific config
//! - [`Connector`]: a typed, ordered slot on a node
//! - [`Edge`]: a wire between two connectors
//! - [`FlowSnapshot`]: the whole graph plus its value maps
//!
//! # Examples
//!
//! ```rust
//! use loomflow::graph::{Connector, Edge, FlowNode, FlowSnapshot};
//! use loomflow::types::{ConnectorKind, NodeKind};
//!
//! let node = FlowNode::new("n1", NodeKind::Custom("script".into()));
//! let out = Connector::new("c1", "n1", ConnectorKind::NodeOutput, 0, "result");
//!
//! let snapshot = FlowSnapshot::new()
//!     .with_node(node)
//!     .with_connector(out);
//!
//! assert_eq!(snapshot.connectors_of_node(&"n1".into()).len(), 1);
//! ```

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::types::{CellTag, ConnectorId, ConnectorKind, EdgeId, NodeId, NodeKind};
use crate::value::{FlowValue, ValueKind};

/// Canvas position of a node. Carried through edits untouched; the engine
/// never interprets it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A node in a flow graph.
///
/// `config` is the kind-specific record (script text, model name, branch
/// policy) the behavior registry and node steps interpret; the engine treats
/// it as opaque JSON except for the few keys it owns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: NodeId,
    pub kind: NodeKind,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub config: serde_json::Value,
}

impl FlowNode {
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            position: Position::default(),
            config: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }
}

/// A typed, named slot on a node that edges can wire to other connectors.
///
/// `index` orders siblings of the same node; sibling indices are stable
/// under removal (no re-indexing when a slot is detached).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    pub id: ConnectorId,
    pub node_id: NodeId,
    pub kind: ConnectorKind,
    pub index: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_kind: Option<ValueKind>,
}

impl Connector {
    pub fn new(
        id: impl Into<ConnectorId>,
        node_id: impl Into<NodeId>,
        kind: ConnectorKind,
        index: u32,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            node_id: node_id.into(),
            kind,
            index,
            name: name.into(),
            value_kind: None,
        }
    }

    #[must_use]
    pub fn with_value_kind(mut self, value_kind: ValueKind) -> Self {
        self.value_kind = Some(value_kind);
        self
    }
}

/// A wire between a source connector and a target connector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source_connector_id: ConnectorId,
    pub target_connector_id: ConnectorId,
}

impl Edge {
    pub fn new(
        id: impl Into<EdgeId>,
        source: impl Into<ConnectorId>,
        target: impl Into<ConnectorId>,
    ) -> Self {
        Self {
            id: id.into(),
            source_connector_id: source.into(),
            target_connector_id: target.into(),
        }
    }
}

/// The authoritative, immutable picture of one flow space.
///
/// Read accessors that enumerate entities return them in a deterministic
/// order (connectors by `(index, id)`, edges by id) so cascades derived
/// from a snapshot are reproducible independent of hash-map iteration
/// order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlowSnapshot {
    nodes: FxHashMap<NodeId, FlowNode>,
    connectors: FxHashMap<ConnectorId, Connector>,
    edges: FxHashMap<EdgeId, Edge>,
    /// Slot 0: the live/interactive variable value map.
    live_values: FxHashMap<ConnectorId, FlowValue>,
    /// Batch result maps, one per (row, iteration) cell.
    cell_values: FxHashMap<CellTag, FxHashMap<ConnectorId, FlowValue>>,
    /// FlowInput connector -> source column index (None = no override).
    column_bindings: FxHashMap<ConnectorId, Option<usize>>,
}

impl FlowSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ---- builder-style construction (tests, loaders) ----

    #[must_use]
    pub fn with_node(mut self, node: FlowNode) -> Self {
        self.nodes.insert(node.id.clone(), node);
        self
    }

    #[must_use]
    pub fn with_connector(mut self, connector: Connector) -> Self {
        self.connectors.insert(connector.id.clone(), connector);
        self
    }

    #[must_use]
    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.edges.insert(edge.id.clone(), edge);
        self
    }

    #[must_use]
    pub fn with_live_value(mut self, connector: impl Into<ConnectorId>, value: FlowValue) -> Self {
        self.live_values.insert(connector.into(), value);
        self
    }

    #[must_use]
    pub fn with_column_binding(
        mut self,
        connector: impl Into<ConnectorId>,
        column: Option<usize>,
    ) -> Self {
        self.column_bindings.insert(connector.into(), column);
        self
    }

    // ---- single-entity lookups ----

    pub fn node(&self, id: &NodeId) -> Option<&FlowNode> {
        self.nodes.get(id)
    }

    pub fn connector(&self, id: &ConnectorId) -> Option<&Connector> {
        self.connectors.get(id)
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn contains_connector(&self, id: &ConnectorId) -> bool {
        self.connectors.contains_key(id)
    }

    pub fn contains_edge(&self, id: &EdgeId) -> bool {
        self.edges.contains_key(id)
    }

    // ---- iteration ----

    pub fn nodes(&self) -> impl Iterator<Item = &FlowNode> {
        self.nodes.values()
    }

    pub fn connectors(&self) -> impl Iterator<Item = &Connector> {
        self.connectors.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn connector_count(&self) -> usize {
        self.connectors.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Nodes ordered by id, for deterministic enumeration.
    pub fn nodes_ordered(&self) -> Vec<&FlowNode> {
        let mut nodes: Vec<&FlowNode> = self.nodes.values().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    // ---- indexed accessors ----

    /// All connectors owned by `node_id`, ordered by `(index, id)`.
    pub fn connectors_of_node(&self, node_id: &NodeId) -> Vec<&Connector> {
        let mut owned: Vec<&Connector> = self
            .connectors
            .values()
            .filter(|c| &c.node_id == node_id)
            .collect();
        owned.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.id.cmp(&b.id)));
        owned
    }

    /// Connectors of one kind on `node_id`, ordered by `(index, id)`.
    pub fn connectors_of_kind(&self, node_id: &NodeId, kind: ConnectorKind) -> Vec<&Connector> {
        let mut owned: Vec<&Connector> = self
            .connectors
            .values()
            .filter(|c| &c.node_id == node_id && c.kind == kind)
            .collect();
        owned.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.id.cmp(&b.id)));
        owned
    }

    /// The connector named `name` on `node_id`. Among duplicates the lowest
    /// `(index, id)` wins, consistent with the ordered accessors.
    pub fn connector_named(&self, node_id: &NodeId, name: &str) -> Option<&Connector> {
        self.connectors_of_node(node_id)
            .into_iter()
            .find(|c| c.name == name)
    }

    /// Every edge with either endpoint on `connector_id`, ordered by id.
    pub fn edges_touching(&self, connector_id: &ConnectorId) -> Vec<&Edge> {
        let mut touching: Vec<&Edge> = self
            .edges
            .values()
            .filter(|e| {
                &e.source_connector_id == connector_id || &e.target_connector_id == connector_id
            })
            .collect();
        touching.sort_by(|a, b| a.id.cmp(&b.id));
        touching
    }

    /// Edges originating at `connector_id`, ordered by id.
    pub fn edges_from(&self, connector_id: &ConnectorId) -> Vec<&Edge> {
        let mut from: Vec<&Edge> = self
            .edges
            .values()
            .filter(|e| &e.source_connector_id == connector_id)
            .collect();
        from.sort_by(|a, b| a.id.cmp(&b.id));
        from
    }

    /// Edges terminating at `connector_id`, ordered by id.
    pub fn edges_into(&self, connector_id: &ConnectorId) -> Vec<&Edge> {
        let mut into: Vec<&Edge> = self
            .edges
            .values()
            .filter(|e| &e.target_connector_id == connector_id)
            .collect();
        into.sort_by(|a, b| a.id.cmp(&b.id));
        into
    }

    /// The single incoming edge of an exclusive target, if wired.
    ///
    /// Exclusive targets hold at most one incoming edge by invariant; if a
    /// malformed snapshot ever held more, the lowest edge id wins so reads
    /// stay deterministic.
    pub fn edge_into(&self, connector_id: &ConnectorId) -> Option<&Edge> {
        self.edges_into(connector_id).into_iter().next()
    }

    // ---- value maps ----

    pub fn live_value(&self, connector_id: &ConnectorId) -> Option<&FlowValue> {
        self.live_values.get(connector_id)
    }

    pub fn live_values(&self) -> &FxHashMap<ConnectorId, FlowValue> {
        &self.live_values
    }

    pub fn cell_values(&self, tag: &CellTag) -> Option<&FxHashMap<ConnectorId, FlowValue>> {
        self.cell_values.get(tag)
    }

    pub fn cell_tags(&self) -> impl Iterator<Item = &CellTag> {
        self.cell_values.keys()
    }

    pub fn column_binding(&self, connector_id: &ConnectorId) -> Option<usize> {
        self.column_bindings.get(connector_id).copied().flatten()
    }

    pub fn column_bindings(&self) -> &FxHashMap<ConnectorId, Option<usize>> {
        &self.column_bindings
    }

    // ---- internal mutation, only reachable through patch application ----

    pub(crate) fn nodes_mut(&mut self) -> &mut FxHashMap<NodeId, FlowNode> {
        &mut self.nodes
    }

    pub(crate) fn connectors_mut(&mut self) -> &mut FxHashMap<ConnectorId, Connector> {
        &mut self.connectors
    }

    pub(crate) fn edges_mut(&mut self) -> &mut FxHashMap<EdgeId, Edge> {
        &mut self.edges
    }

    pub(crate) fn live_values_mut(&mut self) -> &mut FxHashMap<ConnectorId, FlowValue> {
        &mut self.live_values
    }

    pub(crate) fn cell_values_mut(
        &mut self,
    ) -> &mut FxHashMap<CellTag, FxHashMap<ConnectorId, FlowValue>> {
        &mut self.cell_values
    }

    pub(crate) fn column_bindings_mut(&mut self) -> &mut FxHashMap<ConnectorId, Option<usize>> {
        &mut self.column_bindings
    }
}
