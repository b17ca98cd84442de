use std::fmt;

use crate::graph::{Connector, Edge, FlowNode, Position};
use crate::types::{ConnectorId, EdgeId, NodeId};
use crate::value::{FlowValue, ValueKind};

/// One edit to a flow graph: either a primary event originating outside the
/// engine or a derived event the engine produced while cascading.
///
/// Primary and derived events share this type; what distinguishes a derived
/// event is that it was emitted by a handler and validated against the
/// [allow-list](crate::edits::allowlist) keyed by its parent's
/// [`EditEventKind`].
#[derive(Clone, Debug, PartialEq)]
pub enum EditEvent {
    /// Create a node. Cascades into the connectors its behavior declares.
    AddNode { node: FlowNode },
    /// Delete a node and, transitively, everything it owns.
    RemoveNode { node_id: NodeId },
    /// Replace a node's kind-specific config record.
    UpdateNodeConfig {
        node_id: NodeId,
        config: serde_json::Value,
    },
    /// Move a node on the canvas.
    MoveNode { node_id: NodeId, position: Position },
    /// Attach one connector to an existing node.
    AddConnector { connector: Connector },
    /// Detach one connector; touching edges and value entries go with it.
    RemoveConnector { connector_id: ConnectorId },
    /// Rename and/or retype a connector.
    ///
    /// `None` fields stay untouched; `value_kind: Some(None)` explicitly
    /// clears the declared kind.
    UpdateConnector {
        connector_id: ConnectorId,
        name: Option<String>,
        value_kind: Option<Option<ValueKind>>,
    },
    /// Wire an edge. Landing on an occupied exclusive target displaces the
    /// existing edge (replace semantics).
    ConnectEdge { edge: Edge },
    /// Unwire an edge.
    RemoveEdge { edge_id: EdgeId },
    /// Set a connector's value in the live (slot 0) map.
    SetLiveValue {
        connector_id: ConnectorId,
        value: FlowValue,
    },
    /// Bind or unbind a FlowInput connector to a batch table column.
    SetColumnBinding {
        connector_id: ConnectorId,
        column: Option<usize>,
    },
}

impl EditEvent {
    pub fn add_node(node: FlowNode) -> Self {
        EditEvent::AddNode { node }
    }

    pub fn remove_node(node_id: impl Into<NodeId>) -> Self {
        EditEvent::RemoveNode {
            node_id: node_id.into(),
        }
    }

    pub fn update_node_config(node_id: impl Into<NodeId>, config: serde_json::Value) -> Self {
        EditEvent::UpdateNodeConfig {
            node_id: node_id.into(),
            config,
        }
    }

    pub fn move_node(node_id: impl Into<NodeId>, position: Position) -> Self {
        EditEvent::MoveNode {
            node_id: node_id.into(),
            position,
        }
    }

    pub fn add_connector(connector: Connector) -> Self {
        EditEvent::AddConnector { connector }
    }

    pub fn remove_connector(connector_id: impl Into<ConnectorId>) -> Self {
        EditEvent::RemoveConnector {
            connector_id: connector_id.into(),
        }
    }

    pub fn rename_connector(connector_id: impl Into<ConnectorId>, name: impl Into<String>) -> Self {
        EditEvent::UpdateConnector {
            connector_id: connector_id.into(),
            name: Some(name.into()),
            value_kind: None,
        }
    }

    pub fn retype_connector(
        connector_id: impl Into<ConnectorId>,
        value_kind: Option<ValueKind>,
    ) -> Self {
        EditEvent::UpdateConnector {
            connector_id: connector_id.into(),
            name: None,
            value_kind: Some(value_kind),
        }
    }

    pub fn connect(edge: Edge) -> Self {
        EditEvent::ConnectEdge { edge }
    }

    pub fn remove_edge(edge_id: impl Into<EdgeId>) -> Self {
        EditEvent::RemoveEdge {
            edge_id: edge_id.into(),
        }
    }

    pub fn set_live_value(connector_id: impl Into<ConnectorId>, value: FlowValue) -> Self {
        EditEvent::SetLiveValue {
            connector_id: connector_id.into(),
            value,
        }
    }

    pub fn set_column_binding(connector_id: impl Into<ConnectorId>, column: Option<usize>) -> Self {
        EditEvent::SetColumnBinding {
            connector_id: connector_id.into(),
            column,
        }
    }

    /// The allow-list key for this event.
    #[must_use]
    pub fn kind(&self) -> EditEventKind {
        match self {
            EditEvent::AddNode { .. } => EditEventKind::AddNode,
            EditEvent::RemoveNode { .. } => EditEventKind::RemoveNode,
            EditEvent::UpdateNodeConfig { .. } => EditEventKind::UpdateNodeConfig,
            EditEvent::MoveNode { .. } => EditEventKind::MoveNode,
            EditEvent::AddConnector { .. } => EditEventKind::AddConnector,
            EditEvent::RemoveConnector { .. } => EditEventKind::RemoveConnector,
            EditEvent::UpdateConnector { .. } => EditEventKind::UpdateConnector,
            EditEvent::ConnectEdge { .. } => EditEventKind::ConnectEdge,
            EditEvent::RemoveEdge { .. } => EditEventKind::RemoveEdge,
            EditEvent::SetLiveValue { .. } => EditEventKind::SetLiveValue,
            EditEvent::SetColumnBinding { .. } => EditEventKind::SetColumnBinding,
        }
    }
}

impl fmt::Display for EditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditEvent::AddNode { node } => write!(f, "add-node {}", node.id),
            EditEvent::RemoveNode { node_id } => write!(f, "remove-node {node_id}"),
            EditEvent::UpdateNodeConfig { node_id, .. } => {
                write!(f, "update-node-config {node_id}")
            }
            EditEvent::MoveNode { node_id, .. } => write!(f, "move-node {node_id}"),
            EditEvent::AddConnector { connector } => write!(f, "add-connector {}", connector.id),
            EditEvent::RemoveConnector { connector_id } => {
                write!(f, "remove-connector {connector_id}")
            }
            EditEvent::UpdateConnector { connector_id, .. } => {
                write!(f, "update-connector {connector_id}")
            }
            EditEvent::ConnectEdge { edge } => write!(f, "connect-edge {}", edge.id),
            EditEvent::RemoveEdge { edge_id } => write!(f, "remove-edge {edge_id}"),
            EditEvent::SetLiveValue { connector_id, .. } => {
                write!(f, "set-live-value {connector_id}")
            }
            EditEvent::SetColumnBinding { connector_id, .. } => {
                write!(f, "set-column-binding {connector_id}")
            }
        }
    }
}

/// Fieldless discriminant of [`EditEvent`], used as the allow-list key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EditEventKind {
    AddNode,
    RemoveNode,
    UpdateNodeConfig,
    MoveNode,
    AddConnector,
    RemoveConnector,
    UpdateConnector,
    ConnectEdge,
    RemoveEdge,
    SetLiveValue,
    SetColumnBinding,
}

impl fmt::Display for EditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EditEventKind::AddNode => "add-node",
            EditEventKind::RemoveNode => "remove-node",
            EditEventKind::UpdateNodeConfig => "update-node-config",
            EditEventKind::MoveNode => "move-node",
            EditEventKind::AddConnector => "add-connector",
            EditEventKind::RemoveConnector => "remove-connector",
            EditEventKind::UpdateConnector => "update-connector",
            EditEventKind::ConnectEdge => "connect-edge",
            EditEventKind::RemoveEdge => "remove-edge",
            EditEventKind::SetLiveValue => "set-live-value",
            EditEventKind::SetColumnBinding => "set-column-binding",
        };
        write!(f, "{label}")
    }
}
