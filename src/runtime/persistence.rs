//! Serde shapes for persisted flow spaces.
//!
//! These structs are deliberately decoupled from the in-memory snapshot
//! types: node kinds travel as encoded strings (unknown encodings load as
//! custom kinds), timestamps as RFC3339 strings, and every collection is
//! sorted by id so the same snapshot always serializes to the same bytes.
//! No I/O happens here; stores serialize through these shapes.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::graph::{Connector, Edge, FlowNode, FlowSnapshot, Position};
use crate::types::{CellTag, ConnectorKind, NodeKind};
use crate::utils::json_ext::JsonSerializable;
use crate::value::{FlowValue, ValueKind};

use miette::Diagnostic;
use thiserror::Error;

/// Serialization errors for persisted space payloads.
#[derive(Debug, Error, Diagnostic)]
pub enum PersistenceError {
    #[error("serialization error: {source}")]
    #[diagnostic(
        code(loomflow::persistence::serde),
        help("Check the persisted space payload shape.")
    )]
    Serde {
        #[from]
        source: serde_json::Error,
    },
}

/// Blanket JSON round-trip for every serde-capable persisted shape.
impl<T> JsonSerializable<PersistenceError> for T
where
    T: serde::Serialize + for<'de> serde::de::DeserializeOwned,
{
    fn to_json_string(&self) -> Result<String, PersistenceError> {
        serde_json::to_string(self).map_err(|e| PersistenceError::Serde { source: e })
    }

    fn from_json_str(s: &str) -> Result<Self, PersistenceError> {
        serde_json::from_str(s).map_err(|e| PersistenceError::Serde { source: e })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedNode {
    pub id: String,
    /// `NodeKind::encode()` form; unknown encodings load as custom kinds.
    pub kind: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedConnector {
    pub id: String,
    pub node_id: String,
    pub kind: ConnectorKind,
    pub index: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_kind: Option<ValueKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistedEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedValue {
    pub connector: String,
    pub value: FlowValue,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedCell {
    pub row: usize,
    pub iteration: usize,
    #[serde(default)]
    pub values: Vec<PersistedValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedBinding {
    pub connector: String,
    pub column: Option<usize>,
}

/// Whole-space payload: one of these is the value of a store entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedSpace {
    /// RFC3339 save time.
    pub saved_at: String,
    pub nodes: Vec<PersistedNode>,
    pub connectors: Vec<PersistedConnector>,
    pub edges: Vec<PersistedEdge>,
    #[serde(default)]
    pub live_values: Vec<PersistedValue>,
    #[serde(default)]
    pub cells: Vec<PersistedCell>,
    #[serde(default)]
    pub column_bindings: Vec<PersistedBinding>,
}

fn sorted_values(map: &rustc_hash::FxHashMap<crate::types::ConnectorId, FlowValue>) -> Vec<PersistedValue> {
    let mut values: Vec<PersistedValue> = map
        .iter()
        .map(|(connector, value)| PersistedValue {
            connector: connector.as_str().to_string(),
            value: value.clone(),
        })
        .collect();
    values.sort_by(|a, b| a.connector.cmp(&b.connector));
    values
}

impl From<&FlowSnapshot> for PersistedSpace {
    fn from(snapshot: &FlowSnapshot) -> Self {
        let mut nodes: Vec<PersistedNode> = snapshot
            .nodes()
            .map(|node| PersistedNode {
                id: node.id.as_str().to_string(),
                kind: node.kind.encode(),
                x: node.position.x,
                y: node.position.y,
                config: node.config.clone(),
            })
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut connectors: Vec<PersistedConnector> = snapshot
            .connectors()
            .map(|c| PersistedConnector {
                id: c.id.as_str().to_string(),
                node_id: c.node_id.as_str().to_string(),
                kind: c.kind,
                index: c.index,
                name: c.name.clone(),
                value_kind: c.value_kind,
            })
            .collect();
        connectors.sort_by(|a, b| a.id.cmp(&b.id));

        let mut edges: Vec<PersistedEdge> = snapshot
            .edges()
            .map(|e| PersistedEdge {
                id: e.id.as_str().to_string(),
                source: e.source_connector_id.as_str().to_string(),
                target: e.target_connector_id.as_str().to_string(),
            })
            .collect();
        edges.sort_by(|a, b| a.id.cmp(&b.id));

        let mut cells: Vec<PersistedCell> = snapshot
            .cell_tags()
            .map(|tag| PersistedCell {
                row: tag.row,
                iteration: tag.iteration,
                values: snapshot
                    .cell_values(tag)
                    .map(sorted_values)
                    .unwrap_or_default(),
            })
            .collect();
        cells.sort_by(|a, b| (a.row, a.iteration).cmp(&(b.row, b.iteration)));

        let mut column_bindings: Vec<PersistedBinding> = snapshot
            .column_bindings()
            .iter()
            .map(|(connector, column)| PersistedBinding {
                connector: connector.as_str().to_string(),
                column: *column,
            })
            .collect();
        column_bindings.sort_by(|a, b| a.connector.cmp(&b.connector));

        Self {
            saved_at: Utc::now().to_rfc3339(),
            nodes,
            connectors,
            edges,
            live_values: sorted_values(snapshot.live_values()),
            cells,
            column_bindings,
        }
    }
}

impl From<PersistedSpace> for FlowSnapshot {
    fn from(persisted: PersistedSpace) -> Self {
        let mut snapshot = FlowSnapshot::new();
        for node in persisted.nodes {
            snapshot = snapshot.with_node(
                FlowNode::new(node.id, NodeKind::decode(&node.kind))
                    .with_position(Position::new(node.x, node.y))
                    .with_config(node.config),
            );
        }
        for c in persisted.connectors {
            let mut connector = Connector::new(c.id, c.node_id, c.kind, c.index, c.name);
            connector.value_kind = c.value_kind;
            snapshot = snapshot.with_connector(connector);
        }
        for e in persisted.edges {
            snapshot = snapshot.with_edge(Edge::new(e.id, e.source, e.target));
        }
        for entry in persisted.live_values {
            snapshot = snapshot.with_live_value(entry.connector, entry.value);
        }
        for binding in persisted.column_bindings {
            snapshot = snapshot.with_column_binding(binding.connector, binding.column);
        }
        for cell in persisted.cells {
            let tag = CellTag::new(cell.row, cell.iteration);
            let values = snapshot.cell_values_mut().entry(tag).or_default();
            for entry in cell.values {
                values.insert(entry.connector.into(), entry.value);
            }
        }
        snapshot
    }
}
