//! The event derivation engine.
//!
//! [`FlowEngine`] owns the authoritative snapshot and is the single entry
//! point for edits. One primary [`EditEvent`] is handled against the current
//! snapshot; the handler contributes patch operations plus zero or more
//! derived events, which are pushed onto a FIFO work queue and drained
//! breadth-first until quiescent. All first-order effects of an event are
//! therefore processed before any second-order effect they trigger, and the
//! cascade order is deterministic for a given snapshot.
//!
//! Every event popped off the queue is checked against the static
//! [allow-list](super::allowlist) keyed by its parent's kind. A handler
//! emitting an event type not declared reachable from its trigger is a
//! programming error: the whole edit aborts and no patch applies.
//!
//! A single content-changed flag is OR-merged across the cascade; a later
//! no-op event never clears a dirty flag set earlier in the same edit.

use std::collections::VecDeque;

use miette::Diagnostic;
use thiserror::Error;
use tracing::instrument;

use super::allowlist::is_allowed;
use super::event::{EditEvent, EditEventKind};
use crate::behavior::{BehaviorError, BehaviorRegistry};
use crate::graph::{Edge, FlowSnapshot, PatchOp, SnapshotPatch};
use crate::utils::json_ext::{MergeStrategy, deep_merge};
use crate::value::ValueKind;

/// Errors an edit can fail with. On any error the engine's snapshot is
/// untouched and no patch has been applied.
#[derive(Debug, Error, Diagnostic)]
pub enum EditError {
    /// A handler derived an event type outside its parent's allow-list.
    /// This is a programming-invariant violation, not a user error.
    #[error("cascade violation: {child} is not derivable from {parent}")]
    #[diagnostic(
        code(loomflow::edits::cascade_violation),
        help("The static allow-list in edits::allowlist declares every legal derivation.")
    )]
    CascadeViolation {
        parent: EditEventKind,
        child: EditEventKind,
    },

    /// The requested connection is not legal and was refused at the edit
    /// boundary. No event was emitted and no patch was produced.
    #[error("connection rejected: {reason}")]
    #[diagnostic(code(loomflow::edits::connection_rejected))]
    ConnectionRejected { reason: String },

    /// The event referenced an entity that does not exist in the snapshot.
    #[error("{entity} not found: {id}")]
    #[diagnostic(code(loomflow::edits::not_found))]
    NotFound { entity: &'static str, id: String },

    /// The event would create an entity whose id is already taken.
    #[error("{entity} already exists: {id}")]
    #[diagnostic(code(loomflow::edits::already_exists))]
    AlreadyExists { entity: &'static str, id: String },

    /// The event is structurally malformed for the current snapshot.
    #[error("invalid edit: {reason}")]
    #[diagnostic(code(loomflow::edits::invalid))]
    Invalid { reason: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Behavior(#[from] BehaviorError),
}

/// What one successful edit did: the patch that was applied, whether any
/// content actually changed, and the full cascade in processing order
/// (primary event first).
#[derive(Clone, Debug)]
pub struct EditReport {
    pub patch: SnapshotPatch,
    pub content_changed: bool,
    pub cascade: Vec<EditEvent>,
}

/// One handler's contribution: patch ops, derived children, and whether the
/// ops change content.
#[derive(Debug, Default)]
struct Derived {
    ops: Vec<PatchOp>,
    children: Vec<EditEvent>,
    changed: bool,
}

struct Queued {
    event: EditEvent,
    parent: Option<EditEventKind>,
}

/// The consistency engine: an explicit, passed-by-reference instance owning
/// its snapshot. No process-wide state.
///
/// # Examples
///
/// ```rust
/// use loomflow::behavior::BehaviorRegistry;
/// use loomflow::edits::{EditEvent, FlowEngine};
/// use loomflow::graph::FlowNode;
/// use loomflow::types::NodeKind;
///
/// let mut engine = FlowEngine::new(BehaviorRegistry::new());
/// let node = FlowNode::new("in", NodeKind::FlowInput);
/// let report = engine.submit(EditEvent::add_node(node)).unwrap();
///
/// assert!(report.content_changed);
/// // The behavior's declared connector cascaded in.
/// assert_eq!(engine.snapshot().connectors_of_node(&"in".into()).len(), 1);
/// ```
pub struct FlowEngine {
    snapshot: FlowSnapshot,
    registry: BehaviorRegistry,
}

impl FlowEngine {
    pub fn new(registry: BehaviorRegistry) -> Self {
        Self {
            snapshot: FlowSnapshot::new(),
            registry,
        }
    }

    /// Wrap an existing snapshot (e.g. one loaded from a space store).
    pub fn with_snapshot(registry: BehaviorRegistry, snapshot: FlowSnapshot) -> Self {
        Self { snapshot, registry }
    }

    pub fn snapshot(&self) -> &FlowSnapshot {
        &self.snapshot
    }

    pub fn registry(&self) -> &BehaviorRegistry {
        &self.registry
    }

    /// Consume the engine, yielding its snapshot.
    #[must_use]
    pub fn into_snapshot(self) -> FlowSnapshot {
        self.snapshot
    }

    /// Apply one primary edit, cascading derived events to quiescence.
    ///
    /// On success the engine's snapshot advances and the report describes
    /// the applied patch. On any error nothing was applied.
    #[instrument(skip(self, event), fields(event = %event), err)]
    pub fn submit(&mut self, event: EditEvent) -> Result<EditReport, EditError> {
        let (next, report) = self.derive(event)?;
        self.snapshot = next;
        Ok(report)
    }

    /// Apply a sequence of primary edits, stopping at the first error.
    pub fn submit_all(
        &mut self,
        events: impl IntoIterator<Item = EditEvent>,
    ) -> Result<Vec<EditReport>, EditError> {
        events.into_iter().map(|ev| self.submit(ev)).collect()
    }

    /// Compute the successor snapshot for one primary edit without
    /// committing it.
    pub fn derive(&self, event: EditEvent) -> Result<(FlowSnapshot, EditReport), EditError> {
        let mut queue = VecDeque::new();
        queue.push_back(Queued {
            event,
            parent: None,
        });
        self.drain(queue)
    }

    /// Drain a seeded work queue breadth-first. Separated from [`derive`]
    /// so the cascade-violation abort path is testable.
    fn drain(
        &self,
        mut queue: VecDeque<Queued>,
    ) -> Result<(FlowSnapshot, EditReport), EditError> {
        let mut working = self.snapshot.clone();
        let mut patch = SnapshotPatch::new();
        let mut content_changed = false;
        let mut cascade = Vec::new();

        while let Some(Queued { event, parent }) = queue.pop_front() {
            if let Some(parent) = parent {
                let child = event.kind();
                if !is_allowed(parent, child) {
                    tracing::error!(
                        %parent,
                        %child,
                        "derived event outside allow-list; aborting edit"
                    );
                    return Err(EditError::CascadeViolation { parent, child });
                }
            }

            let kind = event.kind();
            let derived = self.handle(&working, &event)?;

            // OR-merge: a later no-op never clears an earlier dirty flag.
            content_changed |= derived.changed;

            let step: SnapshotPatch = derived.ops.into();
            working = working.apply(&step);
            patch.extend(step);

            for child in derived.children {
                queue.push_back(Queued {
                    event: child,
                    parent: Some(kind),
                });
            }
            cascade.push(event);
        }

        Ok((
            working,
            EditReport {
                patch,
                content_changed,
                cascade,
            },
        ))
    }

    /// Handle one event against the working snapshot. Pure with respect to
    /// the engine; all effects travel back as [`Derived`].
    fn handle(&self, snapshot: &FlowSnapshot, event: &EditEvent) -> Result<Derived, EditError> {
        match event {
            EditEvent::AddNode { node } => {
                if snapshot.contains_node(&node.id) {
                    return Err(EditError::AlreadyExists {
                        entity: "node",
                        id: node.id.to_string(),
                    });
                }
                let behavior = self.registry.behavior(&node.kind)?;
                let mut node = node.clone();
                node.config = deep_merge(
                    &behavior.default_config,
                    &node.config,
                    MergeStrategy::PreferRight,
                );
                let children = behavior
                    .initial_connectors(&node.id)
                    .into_iter()
                    .map(EditEvent::add_connector)
                    .collect();
                Ok(Derived {
                    ops: vec![PatchOp::PutNode(node)],
                    children,
                    changed: true,
                })
            }

            EditEvent::RemoveNode { node_id } => {
                if !snapshot.contains_node(node_id) {
                    return Ok(Derived::default());
                }
                let children = snapshot
                    .connectors_of_node(node_id)
                    .into_iter()
                    .map(|c| EditEvent::remove_connector(c.id.clone()))
                    .collect();
                Ok(Derived {
                    ops: vec![PatchOp::RemoveNode(node_id.clone())],
                    children,
                    changed: true,
                })
            }

            EditEvent::UpdateNodeConfig { node_id, config } => {
                let node = snapshot.node(node_id).ok_or_else(|| EditError::NotFound {
                    entity: "node",
                    id: node_id.to_string(),
                })?;
                if &node.config == config {
                    return Ok(Derived::default());
                }
                let mut node = node.clone();
                node.config = config.clone();
                Ok(Derived {
                    ops: vec![PatchOp::PutNode(node)],
                    children: vec![],
                    changed: true,
                })
            }

            EditEvent::MoveNode { node_id, position } => {
                let node = snapshot.node(node_id).ok_or_else(|| EditError::NotFound {
                    entity: "node",
                    id: node_id.to_string(),
                })?;
                if &node.position == position {
                    return Ok(Derived::default());
                }
                let mut node = node.clone();
                node.position = *position;
                Ok(Derived {
                    ops: vec![PatchOp::PutNode(node)],
                    children: vec![],
                    changed: true,
                })
            }

            EditEvent::AddConnector { connector } => {
                if !snapshot.contains_node(&connector.node_id) {
                    return Err(EditError::NotFound {
                        entity: "node",
                        id: connector.node_id.to_string(),
                    });
                }
                if snapshot.contains_connector(&connector.id) {
                    return Err(EditError::AlreadyExists {
                        entity: "connector",
                        id: connector.id.to_string(),
                    });
                }
                Ok(Derived {
                    ops: vec![PatchOp::PutConnector(connector.clone())],
                    children: vec![],
                    changed: true,
                })
            }

            EditEvent::RemoveConnector { connector_id } => {
                if !snapshot.contains_connector(connector_id) {
                    return Ok(Derived::default());
                }
                // Sibling indices stay untouched; no re-indexing on detach.
                let children = snapshot
                    .edges_touching(connector_id)
                    .into_iter()
                    .map(|e| EditEvent::remove_edge(e.id.clone()))
                    .collect();
                Ok(Derived {
                    ops: vec![
                        PatchOp::RemoveConnector(connector_id.clone()),
                        PatchOp::PurgeConnectorValues(connector_id.clone()),
                    ],
                    children,
                    changed: true,
                })
            }

            EditEvent::UpdateConnector {
                connector_id,
                name,
                value_kind,
            } => {
                let connector =
                    snapshot
                        .connector(connector_id)
                        .ok_or_else(|| EditError::NotFound {
                            entity: "connector",
                            id: connector_id.to_string(),
                        })?;
                let mut updated = connector.clone();
                if let Some(name) = name {
                    updated.name = name.clone();
                }
                if let Some(value_kind) = value_kind {
                    updated.value_kind = *value_kind;
                }
                if &updated == connector {
                    return Ok(Derived::default());
                }
                Ok(Derived {
                    ops: vec![PatchOp::PutConnector(updated)],
                    children: vec![],
                    changed: true,
                })
            }

            EditEvent::ConnectEdge { edge } => self.handle_connect(snapshot, edge),

            EditEvent::RemoveEdge { edge_id } => {
                let Some(edge) = snapshot.edge(edge_id) else {
                    // Both endpoints of an edge may cascade its removal; the
                    // second arrival is a no-op.
                    return Ok(Derived::default());
                };
                let source_kind = snapshot
                    .connector(&edge.source_connector_id)
                    .and_then(|c| c.value_kind);
                let target = snapshot.connector(&edge.target_connector_id);

                let mut children = Vec::new();
                // Losing an audio source downgrades the surviving target to
                // the generic text kind, but only when this was its last
                // incoming edge (a replacing edge keeps the target wired).
                if let Some(target) = target {
                    let remaining = snapshot
                        .edges_into(&target.id)
                        .iter()
                        .filter(|e| e.id != edge.id)
                        .count();
                    if remaining == 0 {
                        if let Some(kind) =
                            ValueKind::coerce_on_disconnect(source_kind, target.value_kind)
                        {
                            children.push(EditEvent::retype_connector(
                                target.id.clone(),
                                Some(kind),
                            ));
                        }
                    }
                }
                Ok(Derived {
                    ops: vec![PatchOp::RemoveEdge(edge_id.clone())],
                    children,
                    changed: true,
                })
            }

            EditEvent::SetLiveValue {
                connector_id,
                value,
            } => {
                if !snapshot.contains_connector(connector_id) {
                    return Err(EditError::NotFound {
                        entity: "connector",
                        id: connector_id.to_string(),
                    });
                }
                if snapshot.live_value(connector_id) == Some(value) {
                    return Ok(Derived::default());
                }
                Ok(Derived {
                    ops: vec![PatchOp::SetLiveValue(connector_id.clone(), value.clone())],
                    children: vec![],
                    changed: true,
                })
            }

            EditEvent::SetColumnBinding {
                connector_id,
                column,
            } => {
                let connector =
                    snapshot
                        .connector(connector_id)
                        .ok_or_else(|| EditError::NotFound {
                            entity: "connector",
                            id: connector_id.to_string(),
                        })?;
                if connector.kind != crate::types::ConnectorKind::FlowInput {
                    return Err(EditError::Invalid {
                        reason: format!(
                            "column bindings only apply to flow-input connectors, got {}",
                            connector.kind
                        ),
                    });
                }
                let current = snapshot.column_bindings().get(connector_id).copied();
                if current == Some(*column) {
                    return Ok(Derived::default());
                }
                Ok(Derived {
                    ops: vec![PatchOp::SetColumnBinding(connector_id.clone(), *column)],
                    children: vec![],
                    changed: true,
                })
            }
        }
    }

    /// Connect-edge semantics: role validation, value-kind acceptance,
    /// replace-on-occupied-target, and declared-kind coercion.
    fn handle_connect(&self, snapshot: &FlowSnapshot, edge: &Edge) -> Result<Derived, EditError> {
        let source = snapshot
            .connector(&edge.source_connector_id)
            .ok_or_else(|| EditError::NotFound {
                entity: "connector",
                id: edge.source_connector_id.to_string(),
            })?;
        let target = snapshot
            .connector(&edge.target_connector_id)
            .ok_or_else(|| EditError::NotFound {
                entity: "connector",
                id: edge.target_connector_id.to_string(),
            })?;

        if snapshot.contains_edge(&edge.id) {
            return Err(EditError::AlreadyExists {
                entity: "edge",
                id: edge.id.to_string(),
            });
        }
        if source.node_id == target.node_id {
            return Err(EditError::ConnectionRejected {
                reason: format!("cannot wire node {} to itself", source.node_id),
            });
        }

        let legal_pair = (source.kind.is_data_source() && target.kind.is_data_target())
            || (source.kind == crate::types::ConnectorKind::Condition
                && target.kind == crate::types::ConnectorKind::ConditionTarget);
        if !legal_pair {
            return Err(EditError::ConnectionRejected {
                reason: format!(
                    "{} cannot feed {} ({} -> {})",
                    source.id, target.id, source.kind, target.kind
                ),
            });
        }

        // The distinguished incompatible kind is refused outright: no patch,
        // no events.
        if !ValueKind::accepts(source.value_kind, target.value_kind) {
            return Err(EditError::ConnectionRejected {
                reason: format!(
                    "{} output of {} is not accepted by {} input of {}",
                    source
                        .value_kind
                        .map_or_else(|| "untyped".to_string(), |k| k.to_string()),
                    source.id,
                    target
                        .value_kind
                        .map_or_else(|| "untyped".to_string(), |k| k.to_string()),
                    target.id
                ),
            });
        }

        // Rewiring the same source onto the same target changes nothing.
        if snapshot
            .edges_into(&target.id)
            .iter()
            .any(|e| e.source_connector_id == source.id)
        {
            return Ok(Derived::default());
        }

        let mut children = Vec::new();
        let displaced = if target.kind.is_exclusive_target() {
            snapshot.edge_into(&target.id).cloned()
        } else {
            None
        };

        match &displaced {
            Some(displaced_edge) => {
                children.push(EditEvent::remove_edge(displaced_edge.id.clone()));
                let displaced_kind = snapshot
                    .connector(&displaced_edge.source_connector_id)
                    .and_then(|c| c.value_kind);
                if let Some(kind) = ValueKind::coerce_on_replace(displaced_kind, source.value_kind)
                {
                    children.push(EditEvent::retype_connector(target.id.clone(), Some(kind)));
                }
            }
            None => {
                if let Some(kind) = ValueKind::coerce_on_connect(source.value_kind, target.value_kind)
                {
                    children.push(EditEvent::retype_connector(target.id.clone(), Some(kind)));
                }
            }
        }

        Ok(Derived {
            ops: vec![PatchOp::PutEdge(edge.clone())],
            children,
            changed: true,
        })
    }
}
