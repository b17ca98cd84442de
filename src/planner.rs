//! Execution planning: dependency-respecting run order and conditional
//! branch activation.
//!
//! The planner is a read-only view over one snapshot. It answers two
//! questions for the executor:
//!
//! 1. In what order may nodes run so every input is resolvable when its
//!    node's turn comes ([`Planner::run_order`])?
//! 2. Which outgoing edges of a conditional node are active for a given
//!    scope ([`Planner::decide_branches`])? Non-conditional nodes have all
//!    outgoing edges always active.
//!
//! Conditions are evaluated in declared index order, excluding the reserved
//! default branch at index 0. The per-node [`BranchPolicy`] decides whether
//! evaluation stops at the first match or covers every branch; when no
//! non-default condition matches, the default branch is the active one.

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::graph::{Connector, FlowNode, FlowSnapshot};
use crate::run::VariableScope;
use crate::types::{BranchPolicy, ConnectorId, ConnectorKind, EdgeId, NodeId};
use crate::value::FlowValue;

/// Planning failures. These indicate a malformed graph, not a runtime
/// error: the derivation engine prevents dangling endpoints, so a cycle is
/// the only way a well-edited graph fails to plan.
#[derive(Debug, Error, Diagnostic)]
pub enum PlanError {
    /// The dependency graph contains a cycle; no run order exists.
    #[error("flow graph contains a dependency cycle through {through}")]
    #[diagnostic(
        code(loomflow::planner::cycle),
        help("Break the cycle by removing one of the edges along it.")
    )]
    Cycle { through: NodeId },

    /// A conditional node's config could not be interpreted.
    #[error("invalid conditional config on node {node_id}: {reason}")]
    #[diagnostic(code(loomflow::planner::invalid_config))]
    InvalidConfig { node_id: NodeId, reason: String },
}

/// Comparison applied by one condition branch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    /// The resolved input is truthy (non-empty, non-zero, non-false).
    #[default]
    IsTruthy,
    Equals,
    NotEquals,
    /// Text containment for text values; element containment for JSON
    /// arrays.
    Contains,
}

/// One non-default branch's predicate, as stored in the conditional node's
/// config. `conditions[i]` governs the Condition connector at index `i + 1`
/// (index 0 is the reserved default and carries no predicate).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionSpec {
    /// Name of the node input connector whose resolved value is tested.
    pub input: String,
    #[serde(default)]
    pub operator: ConditionOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare: Option<serde_json::Value>,
}

impl ConditionSpec {
    pub fn new(input: impl Into<String>, operator: ConditionOperator) -> Self {
        Self {
            input: input.into(),
            operator,
            compare: None,
        }
    }

    #[must_use]
    pub fn comparing(mut self, compare: serde_json::Value) -> Self {
        self.compare = Some(compare);
        self
    }

    fn holds(&self, value: &FlowValue) -> bool {
        match self.operator {
            ConditionOperator::IsTruthy => value.is_truthy(),
            ConditionOperator::Equals => {
                self.compare.as_ref().is_some_and(|c| &value.as_json() == c)
            }
            ConditionOperator::NotEquals => {
                self.compare.as_ref().is_some_and(|c| &value.as_json() != c)
            }
            ConditionOperator::Contains => match (&value.as_json(), &self.compare) {
                (serde_json::Value::String(hay), Some(serde_json::Value::String(needle))) => {
                    hay.contains(needle.as_str())
                }
                (serde_json::Value::Array(items), Some(needle)) => items.contains(needle),
                _ => false,
            },
        }
    }
}

/// Deserialized shape of a conditional node's config record.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct ConditionalConfig {
    #[serde(default)]
    branch_policy: BranchPolicy,
    #[serde(default)]
    conditions: Vec<ConditionSpec>,
}

/// The planner's verdict for one conditional node under one scope.
#[derive(Clone, Debug, Default)]
pub struct BranchDecision {
    /// Condition connectors whose branch is active, in index order.
    pub active_conditions: Vec<ConnectorId>,
    /// Outgoing condition edges that are active.
    pub active_edges: Vec<EdgeId>,
    /// Outgoing condition edges that are inactive.
    pub inactive_edges: Vec<EdgeId>,
    /// Whether activation fell through to the reserved default branch.
    pub took_default: bool,
}

/// Read-only planning view over one snapshot.
pub struct Planner<'a> {
    snapshot: &'a FlowSnapshot,
}

impl<'a> Planner<'a> {
    pub fn new(snapshot: &'a FlowSnapshot) -> Self {
        Self { snapshot }
    }

    /// Node of an edge endpoint, looked up through its connector.
    fn node_of(&self, connector_id: &ConnectorId) -> Option<&NodeId> {
        self.snapshot.connector(connector_id).map(|c| &c.node_id)
    }

    /// Dependency-respecting run order over all nodes.
    ///
    /// Kahn's algorithm over node-level dependencies derived from edges
    /// (both data and condition edges order the nodes). Ready nodes are
    /// taken in id order, so the result is deterministic for a snapshot.
    #[instrument(skip(self), err)]
    pub fn run_order(&self) -> Result<Vec<NodeId>, PlanError> {
        let mut indegree: FxHashMap<&NodeId, usize> = FxHashMap::default();
        let mut successors: FxHashMap<&NodeId, FxHashSet<&NodeId>> = FxHashMap::default();
        for node in self.snapshot.nodes() {
            indegree.entry(&node.id).or_insert(0);
        }

        let mut dependencies: FxHashSet<(&NodeId, &NodeId)> = FxHashSet::default();
        for edge in self.snapshot.edges() {
            let (Some(from), Some(to)) = (
                self.node_of(&edge.source_connector_id),
                self.node_of(&edge.target_connector_id),
            ) else {
                continue;
            };
            if from == to || !dependencies.insert((from, to)) {
                continue;
            }
            successors.entry(from).or_default().insert(to);
            *indegree.entry(to).or_insert(0) += 1;
        }

        let mut ready: Vec<&NodeId> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut order = Vec::with_capacity(indegree.len());
        // Kept sorted descending so pop() yields the smallest id.
        ready.sort_by(|a, b| b.cmp(a));
        while let Some(next) = ready.pop() {
            order.push(next.clone());
            if let Some(succs) = successors.get(next) {
                for succ in succs {
                    let d = indegree
                        .get_mut(succ)
                        .expect("successor seeded in indegree map");
                    *d -= 1;
                    if *d == 0 {
                        ready.push(succ);
                    }
                }
                ready.sort_by(|a, b| b.cmp(a));
            }
        }

        if order.len() < indegree.len() {
            let through = self
                .snapshot
                .nodes_ordered()
                .into_iter()
                .map(|n| &n.id)
                .find(|id| !order.contains(id))
                .cloned()
                .unwrap_or_else(|| NodeId::new("unknown"));
            return Err(PlanError::Cycle { through });
        }
        Ok(order)
    }

    /// Active outgoing edges of `node` under `scope`.
    ///
    /// Conditional nodes defer to [`decide_branches`](Self::decide_branches);
    /// every other node's outgoing edges are always active.
    pub fn active_outgoing(
        &self,
        node: &FlowNode,
        scope: &VariableScope,
    ) -> Result<Vec<EdgeId>, PlanError> {
        if node.kind.is_conditional() {
            return Ok(self.decide_branches(node, scope)?.active_edges);
        }
        let mut edges = Vec::new();
        for connector in self.snapshot.connectors_of_node(&node.id) {
            if connector.kind.is_data_source() {
                edges.extend(
                    self.snapshot
                        .edges_from(&connector.id)
                        .into_iter()
                        .map(|e| e.id.clone()),
                );
            }
        }
        Ok(edges)
    }

    /// Evaluate a conditional node's branches against `scope`.
    #[instrument(skip(self, node, scope), fields(node_id = %node.id), err)]
    pub fn decide_branches(
        &self,
        node: &FlowNode,
        scope: &VariableScope,
    ) -> Result<BranchDecision, PlanError> {
        let config: ConditionalConfig = if node.config.is_null() {
            ConditionalConfig::default()
        } else {
            serde_json::from_value(node.config.clone()).map_err(|e| PlanError::InvalidConfig {
                node_id: node.id.clone(),
                reason: e.to_string(),
            })?
        };

        let conditions = self
            .snapshot
            .connectors_of_kind(&node.id, ConnectorKind::Condition);
        let mut decision = BranchDecision::default();
        let mut matched = false;

        for connector in &conditions {
            if connector.index == 0 {
                continue; // reserved default, decided after the loop
            }
            let stop_satisfied = matched && config.branch_policy == BranchPolicy::FirstMatch;
            let active = if stop_satisfied {
                false
            } else {
                let spec = config
                    .conditions
                    .get(connector.index as usize - 1)
                    .cloned()
                    .unwrap_or_default();
                let value = self.resolve_input(node, &spec.input, scope);
                spec.holds(&value)
            };
            if active {
                matched = true;
                decision.active_conditions.push(connector.id.clone());
            }
            self.collect_branch_edges(connector, active, &mut decision);
        }

        if !matched {
            decision.took_default = true;
            if let Some(default) = conditions.iter().find(|c| c.index == 0) {
                decision.active_conditions.insert(0, default.id.clone());
                self.collect_branch_edges(default, true, &mut decision);
            }
        } else if let Some(default) = conditions.iter().find(|c| c.index == 0) {
            self.collect_branch_edges(default, false, &mut decision);
        }

        tracing::debug!(
            active = decision.active_conditions.len(),
            took_default = decision.took_default,
            "branches decided"
        );
        Ok(decision)
    }

    fn collect_branch_edges(
        &self,
        condition: &Connector,
        active: bool,
        decision: &mut BranchDecision,
    ) {
        for edge in self.snapshot.edges_from(&condition.id) {
            if active {
                decision.active_edges.push(edge.id.clone());
            } else {
                decision.inactive_edges.push(edge.id.clone());
            }
        }
    }

    /// Resolve the conditional node's named input through its incoming edge
    /// into `scope`. Disconnected or unproduced inputs read as empty.
    fn resolve_input(&self, node: &FlowNode, input_name: &str, scope: &VariableScope) -> FlowValue {
        let Some(input) = self.snapshot.connector_named(&node.id, input_name) else {
            return FlowValue::Empty;
        };
        let Some(edge) = self.snapshot.edge_into(&input.id) else {
            return FlowValue::Empty;
        };
        scope.get(&edge.source_connector_id).cloned().unwrap_or(FlowValue::Empty)
    }
}
