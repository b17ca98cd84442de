//! Node behavior registry: the capability set behind each node kind.
//!
//! A [`NodeBehavior`] declares what a node kind looks like (its initial
//! connector shape and default config) and how it executes (its
//! [`NodeStep`], when it has one). The [`BehaviorRegistry`] resolves kinds
//! at graph-edit and run time; it is plain data passed by reference, never
//! a process-wide singleton.
//!
//! The three structural kinds — flow input, flow output, conditional — are
//! pre-registered with connector shapes and no step; the executor handles
//! them structurally.

use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use super::step::NodeStep;
use crate::graph::Connector;
use crate::types::{BranchPolicy, ConnectorId, ConnectorKind, NodeId, NodeKind};
use crate::value::ValueKind;

/// Declared shape of one connector a node kind starts with.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectorSpec {
    pub kind: ConnectorKind,
    pub name: String,
    pub value_kind: Option<ValueKind>,
}

impl ConnectorSpec {
    pub fn new(kind: ConnectorKind, name: impl Into<String>) -> Self {
        Self {
            kind,
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

/// Capability set for one node kind.
#[derive(Clone)]
pub struct NodeBehavior {
    pub kind: NodeKind,
    /// Initial connectors in declared order. Indices are assigned within
    /// each [`ConnectorKind`] group, in declaration order.
    pub connectors: Vec<ConnectorSpec>,
    pub default_config: serde_json::Value,
    /// The executable step; `None` for structural kinds the executor
    /// handles itself.
    pub step: Option<Arc<dyn NodeStep>>,
}

impl std::fmt::Debug for NodeBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeBehavior")
            .field("kind", &self.kind)
            .field("connectors", &self.connectors)
            .field("default_config", &self.default_config)
            .field("step", &self.step.as_ref().map(|_| "<step>"))
            .finish()
    }
}

impl NodeBehavior {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            connectors: Vec::new(),
            default_config: serde_json::Value::Null,
            step: None,
        }
    }

    #[must_use]
    pub fn with_connector(mut self, spec: ConnectorSpec) -> Self {
        self.connectors.push(spec);
        self
    }

    /// Shorthand for an input slot.
    #[must_use]
    pub fn with_input(self, name: impl Into<String>) -> Self {
        self.with_connector(ConnectorSpec::new(ConnectorKind::NodeInput, name))
    }

    /// Shorthand for an output slot.
    #[must_use]
    pub fn with_output(self, name: impl Into<String>) -> Self {
        self.with_connector(ConnectorSpec::new(ConnectorKind::NodeOutput, name))
    }

    #[must_use]
    pub fn with_default_config(mut self, config: serde_json::Value) -> Self {
        self.default_config = config;
        self
    }

    #[must_use]
    pub fn with_step(mut self, step: Arc<dyn NodeStep>) -> Self {
        self.step = Some(step);
        self
    }

    /// Materialize this behavior's declared connectors for a fresh node.
    ///
    /// Connector ids are generated; indices count up within each kind
    /// group so a later removal never disturbs siblings.
    pub fn initial_connectors(&self, node_id: &NodeId) -> Vec<Connector> {
        let mut per_kind: FxHashMap<ConnectorKind, u32> = FxHashMap::default();
        self.connectors
            .iter()
            .map(|spec| {
                let index = per_kind.entry(spec.kind).or_insert(0);
                let connector = Connector {
                    id: ConnectorId::generate(),
                    node_id: node_id.clone(),
                    kind: spec.kind,
                    index: *index,
                    name: spec.name.clone(),
                    value_kind: spec.value_kind,
                };
                *index += 1;
                connector
            })
            .collect()
    }
}

/// Lookup from node kind to its capability set.
///
/// # Examples
///
/// ```rust
/// use loomflow::behavior::{BehaviorRegistry, NodeBehavior};
/// use loomflow::types::NodeKind;
///
/// let registry = BehaviorRegistry::new().with_behavior(
///     NodeBehavior::new(NodeKind::Custom("script".into()))
///         .with_input("input")
///         .with_output("result"),
/// );
///
/// assert!(registry.get(&NodeKind::Custom("script".into())).is_some());
/// assert!(registry.get(&NodeKind::IfElse).is_some()); // structural built-in
/// ```
#[derive(Clone, Debug)]
pub struct BehaviorRegistry {
    behaviors: FxHashMap<NodeKind, Arc<NodeBehavior>>,
}

impl Default for BehaviorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BehaviorRegistry {
    /// Create a registry with the structural kinds pre-registered.
    pub fn new() -> Self {
        let mut registry = Self {
            behaviors: FxHashMap::default(),
        };
        registry.register(
            NodeBehavior::new(NodeKind::FlowInput)
                .with_connector(ConnectorSpec::new(ConnectorKind::FlowInput, "input")),
        );
        registry.register(
            NodeBehavior::new(NodeKind::FlowOutput)
                .with_connector(ConnectorSpec::new(ConnectorKind::FlowOutput, "output")),
        );
        registry.register(
            NodeBehavior::new(NodeKind::IfElse)
                .with_connector(ConnectorSpec::new(ConnectorKind::ConditionTarget, "when"))
                .with_connector(ConnectorSpec::new(ConnectorKind::Condition, "default"))
                .with_default_config(serde_json::json!({
                    "branch_policy": BranchPolicy::FirstMatch,
                })),
        );
        registry
    }

    /// Register (or replace) a behavior.
    pub fn register(&mut self, behavior: NodeBehavior) {
        self.behaviors
            .insert(behavior.kind.clone(), Arc::new(behavior));
    }

    /// Builder-style registration.
    #[must_use]
    pub fn with_behavior(mut self, behavior: NodeBehavior) -> Self {
        self.register(behavior);
        self
    }

    pub fn get(&self, kind: &NodeKind) -> Option<&Arc<NodeBehavior>> {
        self.behaviors.get(kind)
    }

    /// Resolve a kind, erroring when it was never registered.
    pub fn behavior(&self, kind: &NodeKind) -> Result<&Arc<NodeBehavior>, BehaviorError> {
        self.behaviors
            .get(kind)
            .ok_or_else(|| BehaviorError::UnknownKind {
                kind: kind.to_string(),
            })
    }

    /// Resolve a kind's step, erroring when the kind is unknown or has no
    /// executable step.
    pub fn step(&self, kind: &NodeKind) -> Result<Arc<dyn NodeStep>, BehaviorError> {
        let behavior = self.behavior(kind)?;
        behavior
            .step
            .clone()
            .ok_or_else(|| BehaviorError::StepMissing {
                kind: kind.to_string(),
            })
    }

    pub fn kinds(&self) -> impl Iterator<Item = &NodeKind> {
        self.behaviors.keys()
    }
}

/// Errors from behavior resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum BehaviorError {
    /// The node kind was never registered.
    #[error("unknown node kind: {kind}")]
    #[diagnostic(
        code(loomflow::behavior::unknown_kind),
        help("Register a NodeBehavior for this kind before referencing it.")
    )]
    UnknownKind { kind: String },

    /// The node kind is registered but carries no executable step.
    #[error("node kind has no executable step: {kind}")]
    #[diagnostic(
        code(loomflow::behavior::step_missing),
        help("Structural kinds run without steps; custom kinds need with_step().")
    )]
    StepMissing { kind: String },
}
