//! Core types for the loomflow engine.
//!
//! This module defines the fundamental vocabulary used throughout the system
//! for identifying nodes, connectors, and edges in flow graphs. These are the
//! domain concepts that define what a flow *is*; runtime machinery (runs,
//! batches, events) lives in its own modules and builds on these.
//!
//! # Key Types
//!
//! - [`NodeKind`]: tags the behavior family of a node in a flow graph
//! - [`ConnectorKind`]: classifies the slots a node exposes for wiring
//! - [`BranchPolicy`]: how a conditional node evaluates its branches
//! - [`NodeId`], [`ConnectorId`], [`EdgeId`], [`RunId`], [`SpaceId`]: typed
//!   identifiers so the wrong id cannot be passed where another is expected
//! - [`CellTag`]: the stable (row, iteration) identity of one batch cell
//!
//! # Examples
//!
//! ```rust
//! use loomflow::types::{NodeKind, ConnectorKind, NodeId};
//!
//! let kind = NodeKind::Custom("llm_call".to_string());
//! assert_eq!(kind.encode(), "Custom:llm_call");
//!
//! let id = NodeId::generate();
//! assert!(ConnectorKind::NodeInput.is_exclusive_target());
//! assert!(!id.as_str().is_empty());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Tags the behavior family of a node within a flow graph.
///
/// The engine treats three structural families specially: flow-level inputs,
/// flow-level outputs, and conditionals. Every other family (LLM calls,
/// script steps, transforms) is a [`Custom`](Self::Custom) kind whose
/// capabilities are resolved through the behavior registry.
///
/// # Persistence
///
/// `NodeKind` supports serialization through both serde and the
/// [`encode`](Self::encode)/[`decode`](Self::decode) methods; `decode` is
/// forward-compatible and folds unknown encodings into `Custom`.
///
/// # Examples
///
/// ```rust
/// use loomflow::types::NodeKind;
///
/// let input = NodeKind::FlowInput;
/// let branch = NodeKind::IfElse;
/// let llm = NodeKind::Custom("llm_call".to_string());
///
/// let encoded = llm.encode();
/// assert_eq!(NodeKind::decode(&encoded), llm);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Flow-level input node. Owns the [`ConnectorKind::FlowInput`]
    /// connectors that carry initial values into a run.
    FlowInput,

    /// Flow-level output node. Owns the [`ConnectorKind::FlowOutput`]
    /// connectors that collect a run's final values.
    FlowOutput,

    /// Conditional node. Owns [`ConnectorKind::Condition`] connectors whose
    /// branches the planner activates per [`BranchPolicy`].
    IfElse,

    /// Registry-defined node family identified by a tag string.
    ///
    /// The tag should be unique within the registry. Common patterns include
    /// step names such as `"llm_call"` or `"script"`.
    Custom(String),
}

impl NodeKind {
    /// Encode a NodeKind into its persisted string form.
    ///
    /// - `FlowInput` → `"FlowInput"`
    /// - `FlowOutput` → `"FlowOutput"`
    /// - `IfElse` → `"IfElse"`
    /// - `Custom("x")` → `"Custom:x"`
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            NodeKind::FlowInput => "FlowInput".to_string(),
            NodeKind::FlowOutput => "FlowOutput".to_string(),
            NodeKind::IfElse => "IfElse".to_string(),
            NodeKind::Custom(s) => format!("Custom:{s}"),
        }
    }

    /// Decode a persisted string form back into a NodeKind.
    ///
    /// Unrecognized encodings fall back to `Custom(s)` so snapshots written
    /// by newer revisions still load.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use loomflow::types::NodeKind;
    /// assert_eq!(NodeKind::decode("IfElse"), NodeKind::IfElse);
    /// assert_eq!(
    ///     NodeKind::decode("Custom:script"),
    ///     NodeKind::Custom("script".to_string()),
    /// );
    /// assert_eq!(
    ///     NodeKind::decode("Mystery"),
    ///     NodeKind::Custom("Mystery".to_string()),
    /// );
    /// ```
    pub fn decode(s: &str) -> Self {
        if s == "FlowInput" {
            NodeKind::FlowInput
        } else if s == "FlowOutput" {
            NodeKind::FlowOutput
        } else if s == "IfElse" {
            NodeKind::IfElse
        } else if let Some(rest) = s.strip_prefix("Custom:") {
            NodeKind::Custom(rest.to_string())
        } else {
            NodeKind::Custom(s.to_string())
        }
    }

    /// Returns `true` if this is a [`FlowInput`](Self::FlowInput) node.
    #[must_use]
    pub fn is_flow_input(&self) -> bool {
        matches!(self, Self::FlowInput)
    }

    /// Returns `true` if this is a [`FlowOutput`](Self::FlowOutput) node.
    #[must_use]
    pub fn is_flow_output(&self) -> bool {
        matches!(self, Self::FlowOutput)
    }

    /// Returns `true` if this node branches conditionally.
    #[must_use]
    pub fn is_conditional(&self) -> bool {
        matches!(self, Self::IfElse)
    }

    /// Returns `true` if this is a registry-defined node.
    #[must_use]
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FlowInput => write!(f, "FlowInput"),
            Self::FlowOutput => write!(f, "FlowOutput"),
            Self::IfElse => write!(f, "IfElse"),
            Self::Custom(name) => write!(f, "{}", name),
        }
    }
}

// Developer Experience: allow using string literals where a NodeKind is expected.
impl From<&str> for NodeKind {
    fn from(s: &str) -> Self {
        match s {
            "FlowInput" => NodeKind::FlowInput,
            "FlowOutput" => NodeKind::FlowOutput,
            "IfElse" => NodeKind::IfElse,
            other => NodeKind::Custom(other.to_string()),
        }
    }
}

/// Classifies the wiring slots a node exposes.
///
/// Data flows from source-role connectors (`FlowInput`, `NodeOutput`) into
/// target-role connectors (`NodeInput`, `FlowOutput`). `Condition` and
/// `ConditionTarget` express branch activation between conditional nodes and
/// their successors, separate from data-carrying variables.
///
/// # Examples
///
/// ```rust
/// use loomflow::types::ConnectorKind;
///
/// assert!(ConnectorKind::NodeOutput.is_data_source());
/// assert!(ConnectorKind::FlowOutput.is_data_target());
/// assert!(ConnectorKind::Condition.is_condition_side());
/// // Condition targets may fan in; data targets may not.
/// assert!(!ConnectorKind::ConditionTarget.is_exclusive_target());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectorKind {
    /// Initial-value slot on a flow-level input node. Source role.
    FlowInput,
    /// Final-value slot on a flow-level output node. Target role.
    FlowOutput,
    /// Input slot on a regular node. Target role.
    NodeInput,
    /// Output slot on a regular node. Source role.
    NodeOutput,
    /// One branch origin on a conditional node.
    Condition,
    /// Branch activation slot on a successor node.
    ConditionTarget,
}

impl ConnectorKind {
    /// Returns `true` for connectors that originate data edges.
    #[must_use]
    pub fn is_data_source(&self) -> bool {
        matches!(self, Self::FlowInput | Self::NodeOutput)
    }

    /// Returns `true` for connectors that receive data edges.
    #[must_use]
    pub fn is_data_target(&self) -> bool {
        matches!(self, Self::NodeInput | Self::FlowOutput)
    }

    /// Returns `true` for the condition/condition-target pair.
    #[must_use]
    pub fn is_condition_side(&self) -> bool {
        matches!(self, Self::Condition | Self::ConditionTarget)
    }

    /// Returns `true` if a connector of this kind may be the target of at
    /// most one edge at a time. A new connection onto such a connector
    /// replaces the existing edge. Condition targets are exempt.
    #[must_use]
    pub fn is_exclusive_target(&self) -> bool {
        matches!(self, Self::NodeInput | Self::FlowOutput)
    }
}

impl fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FlowInput => write!(f, "flow-input"),
            Self::FlowOutput => write!(f, "flow-output"),
            Self::NodeInput => write!(f, "node-input"),
            Self::NodeOutput => write!(f, "node-output"),
            Self::Condition => write!(f, "condition"),
            Self::ConditionTarget => write!(f, "condition-target"),
        }
    }
}

/// Branch evaluation policy for a conditional node.
///
/// Conditions are always evaluated in declared index order, excluding the
/// reserved default branch at index 0; the policy decides how far evaluation
/// proceeds once a predicate holds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchPolicy {
    /// Stop at the first condition whose predicate holds; only that branch
    /// is activated.
    #[default]
    FirstMatch,
    /// Evaluate every condition independently; each matching branch is
    /// activated.
    EvaluateAll,
}

impl fmt::Display for BranchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstMatch => write!(f, "first-match"),
            Self::EvaluateAll => write!(f, "evaluate-all"),
        }
    }
}

/// Lifecycle of one flow run.
///
/// Transitions are `Idle → Running → (Completed | Failed | Cancelled)`.
/// Terminal states are never left.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Returns `true` once the run can no longer change state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Lifecycle of one batch cell.
///
/// `Waiting` means the cell sits in the dispatch queue; `Running` cells are
/// bounded by the batch concurrency limit. Terminal states are `Complete`
/// (inner run finished clean) and `Interrupted` (errored or cancelled).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    #[default]
    NotStarted,
    Waiting,
    Running,
    Complete,
    Interrupted,
}

impl CellStatus {
    /// Returns `true` once the cell can no longer change state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Interrupted)
    }
}

impl fmt::Display for CellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not-started"),
            Self::Waiting => write!(f, "waiting"),
            Self::Running => write!(f, "running"),
            Self::Complete => write!(f, "complete"),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh, globally unique identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(format!(concat!($prefix, "-{}"), Uuid::new_v4()))
            }

            /// View the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Identifier of a node within a flow graph.
    NodeId,
    "node"
);
string_id!(
    /// Identifier of a connector (variable or condition slot).
    ConnectorId,
    "conn"
);
string_id!(
    /// Identifier of an edge between two connectors.
    EdgeId,
    "edge"
);
string_id!(
    /// Identifier of one execution of a flow (interactive or batch cell).
    RunId,
    "run"
);
string_id!(
    /// Identifier of a persisted flow space.
    SpaceId,
    "space"
);

/// Stable identity of one batch cell: the (row, iteration) pair.
///
/// Attached to every lifecycle event the cell's inner run produces so
/// consumers can demultiplex an interleaved batch event stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellTag {
    /// Zero-based row index into the batch table.
    pub row: usize,
    /// Zero-based repeat index within the row.
    pub iteration: usize,
}

impl CellTag {
    #[must_use]
    pub fn new(row: usize, iteration: usize) -> Self {
        Self { row, iteration }
    }
}

impl fmt::Display for CellTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}i{}", self.row, self.iteration)
    }
}
