use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{CellTag, RunStatus};
use crate::value::FlowValue;

pub const STREAM_END_SCOPE: &str = "__loomflow_stream_end__";

/// One entry in the lifecycle stream executors emit while a flow runs.
///
/// Batch cells carry the same variants as interactive runs; the batch runner
/// stamps each event with its [`CellTag`] via [`FlowEvent::tagged`] so one
/// interleaved stream stays demultiplexable.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum FlowEvent {
    Node(NodeLifecycleEvent),
    Variable(VariableValueEvent),
    Run(RunTransitionEvent),
    Diagnostic(DiagnosticEvent),
}

impl FlowEvent {
    pub fn node_started(run_id: impl Into<String>, node_id: impl Into<String>) -> Self {
        FlowEvent::Node(NodeLifecycleEvent::new(
            run_id.into(),
            node_id.into(),
            NodePhase::Started,
            None,
        ))
    }

    pub fn node_finished(run_id: impl Into<String>, node_id: impl Into<String>) -> Self {
        FlowEvent::Node(NodeLifecycleEvent::new(
            run_id.into(),
            node_id.into(),
            NodePhase::Finished,
            None,
        ))
    }

    pub fn node_errors(
        run_id: impl Into<String>,
        node_id: impl Into<String>,
        messages: Vec<String>,
    ) -> Self {
        FlowEvent::Node(NodeLifecycleEvent::new(
            run_id.into(),
            node_id.into(),
            NodePhase::Errors { messages },
            None,
        ))
    }

    /// A committed, terminal value for a connector.
    pub fn variable_final(
        run_id: impl Into<String>,
        connector_id: impl Into<String>,
        value: FlowValue,
    ) -> Self {
        FlowEvent::Variable(VariableValueEvent::new(
            run_id.into(),
            connector_id.into(),
            value,
            true,
            None,
        ))
    }

    /// An incremental, non-terminal value for a connector (streaming step
    /// output). The run has not produced this connector's value until a
    /// final event follows.
    pub fn variable_partial(
        run_id: impl Into<String>,
        connector_id: impl Into<String>,
        value: FlowValue,
    ) -> Self {
        FlowEvent::Variable(VariableValueEvent::new(
            run_id.into(),
            connector_id.into(),
            value,
            false,
            None,
        ))
    }

    pub fn run_transition(run_id: impl Into<String>, status: RunStatus) -> Self {
        FlowEvent::Run(RunTransitionEvent::new(run_id.into(), status, None))
    }

    pub fn diagnostic(scope: impl Into<String>, message: impl Into<String>) -> Self {
        FlowEvent::Diagnostic(DiagnosticEvent {
            scope: scope.into(),
            message: message.into(),
        })
    }

    /// Stamp this event with a batch cell identity. Diagnostics pass through
    /// untouched; they are bus-level, not cell-level.
    #[must_use]
    pub fn tagged(mut self, tag: CellTag) -> Self {
        match &mut self {
            FlowEvent::Node(ev) => ev.cell = Some(tag),
            FlowEvent::Variable(ev) => ev.cell = Some(tag),
            FlowEvent::Run(ev) => ev.cell = Some(tag),
            FlowEvent::Diagnostic(_) => {}
        }
        self
    }

    /// The cell this event belongs to, when it came from a batch run.
    pub fn cell(&self) -> Option<CellTag> {
        match self {
            FlowEvent::Node(ev) => ev.cell,
            FlowEvent::Variable(ev) => ev.cell,
            FlowEvent::Run(ev) => ev.cell,
            FlowEvent::Diagnostic(_) => None,
        }
    }

    pub fn scope_label(&self) -> Option<&str> {
        match self {
            FlowEvent::Node(ev) => Some(ev.phase.label()),
            FlowEvent::Variable(ev) => {
                if ev.is_final() {
                    Some("value")
                } else {
                    Some("value-partial")
                }
            }
            FlowEvent::Run(_) => Some("run"),
            FlowEvent::Diagnostic(diag) => Some(diag.scope()),
        }
    }

    pub fn message(&self) -> String {
        match self {
            FlowEvent::Node(ev) => match &ev.phase {
                NodePhase::Started => format!("node {} started", ev.node_id),
                NodePhase::Finished => format!("node {} finished", ev.node_id),
                NodePhase::Errors { messages } => {
                    format!("node {} errors: {}", ev.node_id, messages.join("; "))
                }
            },
            FlowEvent::Variable(ev) => {
                format!("{} = {}", ev.connector_id, ev.value.preview())
            }
            FlowEvent::Run(ev) => format!("run {} -> {}", ev.run_id, ev.status),
            FlowEvent::Diagnostic(diag) => diag.message().to_string(),
        }
    }

    /// Convert event to structured JSON value with normalized schema.
    ///
    /// Returns a JSON object with the following structure:
    /// ```json
    /// {
    ///   "type": "node" | "variable" | "run" | "diagnostic",
    ///   "scope": "scope_label",
    ///   "message": "event_message",
    ///   "timestamp": "2026-08-12T12:34:56.789Z",
    ///   "metadata": { /* variant-specific fields */ }
    /// }
    /// ```
    ///
    /// # Example
    ///
    /// ```
    /// use loomflow::event_bus::FlowEvent;
    ///
    /// let event = FlowEvent::node_started("run-1", "node-9");
    /// let json = event.to_json_value();
    ///
    /// assert_eq!(json["type"], "node");
    /// assert_eq!(json["metadata"]["node_id"], "node-9");
    /// assert_eq!(json["metadata"]["run_id"], "run-1");
    /// ```
    pub fn to_json_value(&self) -> serde_json::Value {
        use serde_json::json;

        let (event_type, metadata) = match self {
            FlowEvent::Node(ev) => {
                let mut meta = serde_json::Map::new();
                meta.insert("run_id".to_string(), json!(ev.run_id));
                meta.insert("node_id".to_string(), json!(ev.node_id));
                if let NodePhase::Errors { messages } = &ev.phase {
                    meta.insert("messages".to_string(), json!(messages));
                }
                if let Some(cell) = ev.cell {
                    meta.insert("row".to_string(), json!(cell.row));
                    meta.insert("iteration".to_string(), json!(cell.iteration));
                }
                ("node", Value::Object(meta))
            }
            FlowEvent::Variable(ev) => {
                let mut meta = serde_json::Map::new();
                meta.insert("run_id".to_string(), json!(ev.run_id));
                meta.insert("connector_id".to_string(), json!(ev.connector_id));
                meta.insert("is_final".to_string(), json!(ev.is_final));
                meta.insert(
                    "value".to_string(),
                    serde_json::to_value(&ev.value).unwrap_or(Value::Null),
                );
                if let Some(cell) = ev.cell {
                    meta.insert("row".to_string(), json!(cell.row));
                    meta.insert("iteration".to_string(), json!(cell.iteration));
                }
                ("variable", Value::Object(meta))
            }
            FlowEvent::Run(ev) => {
                let mut meta = serde_json::Map::new();
                meta.insert("run_id".to_string(), json!(ev.run_id));
                meta.insert("status".to_string(), json!(ev.status.to_string()));
                if let Some(cell) = ev.cell {
                    meta.insert("row".to_string(), json!(cell.row));
                    meta.insert("iteration".to_string(), json!(cell.iteration));
                }
                ("run", Value::Object(meta))
            }
            FlowEvent::Diagnostic(_) => {
                let meta = serde_json::Map::new();
                ("diagnostic", Value::Object(meta))
            }
        };

        let timestamp = match self {
            FlowEvent::Variable(ev) => ev.timestamp,
            _ => Utc::now(),
        };

        json!({
            "type": event_type,
            "scope": self.scope_label(),
            "message": self.message(),
            "timestamp": timestamp.to_rfc3339(),
            "metadata": metadata,
        })
    }

    /// Convert event to compact JSON string representation.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_json_value())
    }

    /// Convert event to pretty-printed JSON string with indentation.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_json_value())
    }
}

impl fmt::Display for FlowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell() {
            Some(cell) => write!(f, "[{cell}] {}", self.message()),
            None => write!(f, "{}", self.message()),
        }
    }
}

/// Phase marker for node lifecycle events.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum NodePhase {
    Started,
    Finished,
    Errors { messages: Vec<String> },
}

impl NodePhase {
    pub fn label(&self) -> &'static str {
        match self {
            NodePhase::Started => "node-started",
            NodePhase::Finished => "node-finished",
            NodePhase::Errors { .. } => "node-errors",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeLifecycleEvent {
    run_id: String,
    node_id: String,
    phase: NodePhase,
    cell: Option<CellTag>,
}

impl NodeLifecycleEvent {
    pub fn new(run_id: String, node_id: String, phase: NodePhase, cell: Option<CellTag>) -> Self {
        Self {
            run_id,
            node_id,
            phase,
            cell,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn phase(&self) -> &NodePhase {
        &self.phase
    }

    pub fn cell(&self) -> Option<CellTag> {
        self.cell
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VariableValueEvent {
    run_id: String,
    connector_id: String,
    value: FlowValue,
    is_final: bool,
    cell: Option<CellTag>,
    timestamp: DateTime<Utc>,
}

impl VariableValueEvent {
    pub fn new(
        run_id: String,
        connector_id: String,
        value: FlowValue,
        is_final: bool,
        cell: Option<CellTag>,
    ) -> Self {
        Self {
            run_id,
            connector_id,
            value,
            is_final,
            cell,
            timestamp: Utc::now(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn connector_id(&self) -> &str {
        &self.connector_id
    }

    pub fn value(&self) -> &FlowValue {
        &self.value
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn cell(&self) -> Option<CellTag> {
        self.cell
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunTransitionEvent {
    run_id: String,
    status: RunStatus,
    cell: Option<CellTag>,
}

impl RunTransitionEvent {
    pub fn new(run_id: String, status: RunStatus, cell: Option<CellTag>) -> Self {
        Self {
            run_id,
            status,
            cell,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn cell(&self) -> Option<CellTag> {
        self.cell
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticEvent {
    scope: String,
    message: String,
}

impl DiagnosticEvent {
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
