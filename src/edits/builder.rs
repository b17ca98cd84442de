//! Fluent construction of flow graphs.
//!
//! [`FlowBuilder`] is sugar over [`FlowEngine`]: every helper delegates to
//! the derivation engine, so programmatic construction passes the same
//! consistency path as interactive editing. Out-of-contract input (an
//! illegal connection, an unknown name) is warned and ignored rather than
//! failing the whole build; callers that need the error use the engine
//! directly.

use crate::behavior::BehaviorRegistry;
use crate::graph::{Edge, FlowSnapshot};
use crate::types::{EdgeId, NodeId, NodeKind};
use crate::value::FlowValue;

use super::engine::FlowEngine;
use super::event::EditEvent;

/// Builder for assembling a flow graph through the derivation engine.
///
/// Connectors are addressed by `(node id, connector name)`; the behavior
/// registry declares them when the node is added, so callers never juggle
/// generated connector ids.
///
/// # Examples
///
/// ```rust
/// use loomflow::behavior::{BehaviorRegistry, NodeBehavior};
/// use loomflow::edits::FlowBuilder;
/// use loomflow::types::NodeKind;
///
/// let registry = BehaviorRegistry::new().with_behavior(
///     NodeBehavior::new(NodeKind::Custom("upper".into()))
///         .with_input("input")
///         .with_output("result"),
/// );
///
/// let snapshot = FlowBuilder::new(registry)
///     .add_node("in", NodeKind::FlowInput)
///     .add_node("step", NodeKind::Custom("upper".into()))
///     .add_node("out", NodeKind::FlowOutput)
///     .connect("in", "input", "step", "input")
///     .connect("step", "result", "out", "output")
///     .build();
///
/// assert_eq!(snapshot.node_count(), 3);
/// assert_eq!(snapshot.edge_count(), 2);
/// ```
pub struct FlowBuilder {
    engine: FlowEngine,
}

impl FlowBuilder {
    pub fn new(registry: BehaviorRegistry) -> Self {
        Self {
            engine: FlowEngine::new(registry),
        }
    }

    /// Continue building on top of an existing snapshot.
    pub fn from_snapshot(registry: BehaviorRegistry, snapshot: FlowSnapshot) -> Self {
        Self {
            engine: FlowEngine::with_snapshot(registry, snapshot),
        }
    }

    /// Add a node of the given kind; its behavior's connectors cascade in.
    #[must_use]
    pub fn add_node(self, id: impl Into<NodeId>, kind: NodeKind) -> Self {
        let node = crate::graph::FlowNode::new(id, kind);
        self.apply(EditEvent::add_node(node))
    }

    /// Add a node with a kind-specific config record (deep-merged over the
    /// behavior's default config).
    #[must_use]
    pub fn add_node_with_config(
        self,
        id: impl Into<NodeId>,
        kind: NodeKind,
        config: serde_json::Value,
    ) -> Self {
        let node = crate::graph::FlowNode::new(id, kind).with_config(config);
        self.apply(EditEvent::add_node(node))
    }

    /// Wire `source_node.source_name` into `target_node.target_name`.
    #[must_use]
    pub fn connect(
        self,
        source_node: impl Into<NodeId>,
        source_name: &str,
        target_node: impl Into<NodeId>,
        target_name: &str,
    ) -> Self {
        let source_node = source_node.into();
        let target_node = target_node.into();
        let Some(source) = self
            .engine
            .snapshot()
            .connector_named(&source_node, source_name)
        else {
            tracing::warn!(node = %source_node, name = source_name, "unknown source connector; skipping edge");
            return self;
        };
        let Some(target) = self
            .engine
            .snapshot()
            .connector_named(&target_node, target_name)
        else {
            tracing::warn!(node = %target_node, name = target_name, "unknown target connector; skipping edge");
            return self;
        };
        let edge = Edge::new(EdgeId::generate(), source.id.clone(), target.id.clone());
        self.apply(EditEvent::connect(edge))
    }

    /// Seed a connector's live (slot 0) value.
    #[must_use]
    pub fn live_value(
        self,
        node: impl Into<NodeId>,
        connector_name: &str,
        value: impl Into<FlowValue>,
    ) -> Self {
        let node = node.into();
        let Some(connector) = self.engine.snapshot().connector_named(&node, connector_name) else {
            tracing::warn!(node = %node, name = connector_name, "unknown connector; skipping live value");
            return self;
        };
        let id = connector.id.clone();
        self.apply(EditEvent::set_live_value(id, value.into()))
    }

    /// Apply an arbitrary edit event, warning and continuing on error.
    #[must_use]
    pub fn apply(mut self, event: EditEvent) -> Self {
        if let Err(err) = self.engine.submit(event) {
            tracing::warn!(error = %err, "builder edit ignored");
        }
        self
    }

    /// Finish, yielding the built snapshot.
    #[must_use]
    pub fn build(self) -> FlowSnapshot {
        self.engine.into_snapshot()
    }

    /// Finish, yielding the engine so editing can continue.
    #[must_use]
    pub fn into_engine(self) -> FlowEngine {
        self.engine
    }
}
