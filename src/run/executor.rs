//! Single-run executor: drives one flow snapshot from inputs to outputs.
//!
//! The executor holds an immutable snapshot for the whole run, so edits made
//! while a run is in flight never bleed into it. Nodes run sequentially in
//! the planner's dependency order; each node's step sees the values its
//! predecessors produced through the run's [`VariableScope`].
//!
//! Cancellation is cooperative. The token is checked at every node boundary
//! and raced against each in-flight step; a step that keeps computing after
//! the token fires has its result discarded, never committed to the scope.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::behavior::{BehaviorRegistry, StepContext, StepError, StepOutput};
use crate::errors::{ErrorDetail, ErrorEvent};
use crate::event_bus::FlowEvent;
use crate::graph::{FlowNode, FlowSnapshot};
use crate::planner::Planner;
use crate::run::VariableScope;
use crate::types::{CellTag, ConnectorId, ConnectorKind, NodeId, NodeKind, RunId, RunStatus};
use crate::value::FlowValue;

/// Per-run parameters handed to [`FlowRunner::run`].
pub struct RunOptions {
    pub run_id: RunId,
    /// Initial-value overrides keyed by flow input connector. An override
    /// wins over the connector's live value.
    pub overrides: FxHashMap<ConnectorId, FlowValue>,
    /// Where lifecycle events go; typically the ingress side of an event
    /// bus.
    pub events: flume::Sender<FlowEvent>,
    pub cancel: CancellationToken,
    /// Batch cell identity stamped onto every event, when this run is a
    /// batch cell.
    pub cell: Option<CellTag>,
}

impl RunOptions {
    pub fn new(events: flume::Sender<FlowEvent>) -> Self {
        Self {
            run_id: RunId::generate(),
            overrides: FxHashMap::default(),
            events,
            cancel: CancellationToken::new(),
            cell: None,
        }
    }

    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<RunId>) -> Self {
        self.run_id = run_id.into();
        self
    }

    #[must_use]
    pub fn with_override(mut self, connector: impl Into<ConnectorId>, value: FlowValue) -> Self {
        self.overrides.insert(connector.into(), value);
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_cell(mut self, cell: CellTag) -> Self {
        self.cell = Some(cell);
        self
    }
}

/// What one run did, returned after the final transition event is emitted.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub run_id: RunId,
    pub status: RunStatus,
    /// Nodes that executed, in run order.
    pub ran_nodes: Vec<NodeId>,
    /// Gated nodes whose activating branch never fired.
    pub skipped_nodes: Vec<NodeId>,
    /// The node at which the run halted, when it did not complete.
    pub halted_at: Option<NodeId>,
    pub errors: Vec<ErrorEvent>,
    /// Every value produced, keyed by connector.
    pub scope: VariableScope,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Executes one snapshot. Cheap to clone; batch workers share one runner.
#[derive(Clone)]
pub struct FlowRunner {
    snapshot: Arc<FlowSnapshot>,
    registry: Arc<BehaviorRegistry>,
}

impl FlowRunner {
    pub fn new(snapshot: Arc<FlowSnapshot>, registry: Arc<BehaviorRegistry>) -> Self {
        Self { snapshot, registry }
    }

    pub fn snapshot(&self) -> &FlowSnapshot {
        &self.snapshot
    }

    /// Drive the whole flow once.
    ///
    /// Never returns early through `?`: every failure mode lands in the
    /// report (and on the event stream) so batch workers can treat each
    /// cell uniformly.
    #[instrument(skip(self, options), fields(run_id = %options.run_id, cell = ?options.cell))]
    pub async fn run(&self, options: RunOptions) -> RunReport {
        let mut run = ActiveRun {
            runner: self,
            run_id: options.run_id,
            events: options.events,
            cancel: options.cancel,
            cell: options.cell,
            scope: VariableScope::new(),
            enabled_targets: FxHashSet::default(),
            report_errors: Vec::new(),
            ran: Vec::new(),
            skipped: Vec::new(),
        };
        run.emit(FlowEvent::run_transition(
            run.run_id.as_str(),
            RunStatus::Running,
        ));

        let order = match Planner::new(&self.snapshot).run_order() {
            Ok(order) => order,
            Err(err) => {
                run.report_errors
                    .push(ErrorEvent::run(run.run_id.as_str(), ErrorDetail::msg(err.to_string())));
                return run.finish(RunStatus::Failed, None);
            }
        };

        run.seed_inputs(&options.overrides);

        for node_id in order {
            if run.cancel.is_cancelled() {
                return run.finish(RunStatus::Cancelled, Some(node_id));
            }
            let Some(node) = self.snapshot.node(&node_id) else {
                continue;
            };
            if run.is_gated_off(node) {
                run.skipped.push(node_id);
                continue;
            }
            let outcome = run.run_node(node).await;
            match outcome {
                NodeOutcome::Done => run.ran.push(node_id),
                NodeOutcome::Halt(status) => {
                    return run.finish(status, Some(node_id));
                }
            }
        }

        run.finish(RunStatus::Completed, None)
    }
}

enum NodeOutcome {
    Done,
    Halt(RunStatus),
}

/// Mutable state of one in-flight run.
struct ActiveRun<'a> {
    runner: &'a FlowRunner,
    run_id: RunId,
    events: flume::Sender<FlowEvent>,
    cancel: CancellationToken,
    cell: Option<CellTag>,
    scope: VariableScope,
    /// Condition-target connectors an active branch has enabled.
    enabled_targets: FxHashSet<ConnectorId>,
    report_errors: Vec<ErrorEvent>,
    ran: Vec<NodeId>,
    skipped: Vec<NodeId>,
}

impl ActiveRun<'_> {
    fn snapshot(&self) -> &FlowSnapshot {
        &self.runner.snapshot
    }

    fn emit(&self, event: FlowEvent) {
        let event = match self.cell {
            Some(cell) => event.tagged(cell),
            None => event,
        };
        if self.events.send(event).is_err() {
            tracing::warn!(run_id = %self.run_id, "event channel closed; event dropped");
        }
    }

    fn emit_final_value(&self, connector: &ConnectorId, value: FlowValue) {
        self.emit(FlowEvent::variable_final(
            self.run_id.as_str(),
            connector.as_str(),
            value,
        ));
    }

    /// Seed flow-level inputs: override wins over live value, absent both
    /// reads empty. Seeded values are announced as finals so subscribers see
    /// the run's starting point.
    fn seed_inputs(&mut self, overrides: &FxHashMap<ConnectorId, FlowValue>) {
        let inputs: Vec<(ConnectorId, FlowValue)> = self
            .snapshot()
            .nodes_ordered()
            .into_iter()
            .filter(|n| n.kind.is_flow_input())
            .flat_map(|n| self.snapshot().connectors_of_node(&n.id))
            .filter(|c| c.kind == ConnectorKind::FlowInput)
            .map(|c| {
                let value = overrides
                    .get(&c.id)
                    .or_else(|| self.snapshot().live_value(&c.id))
                    .cloned()
                    .unwrap_or(FlowValue::Empty);
                (c.id.clone(), value)
            })
            .collect();
        for (connector, value) in inputs {
            self.emit_final_value(&connector, value.clone());
            self.scope.set(connector, value);
        }
    }

    /// A node is gated when it owns a condition target with at least one
    /// incoming condition edge; it runs only once an active branch enabled
    /// that target.
    fn is_gated_off(&self, node: &FlowNode) -> bool {
        let mut gated = false;
        for target in self
            .snapshot()
            .connectors_of_kind(&node.id, ConnectorKind::ConditionTarget)
        {
            if self.snapshot().edges_into(&target.id).is_empty() {
                continue;
            }
            if self.enabled_targets.contains(&target.id) {
                return false;
            }
            gated = true;
        }
        gated
    }

    async fn run_node(&mut self, node: &FlowNode) -> NodeOutcome {
        match &node.kind {
            NodeKind::FlowInput => NodeOutcome::Done, // seeded before the loop
            NodeKind::FlowOutput => self.run_flow_output(node),
            NodeKind::IfElse => self.run_conditional(node),
            NodeKind::Custom(_) => self.run_custom(node).await,
        }
    }

    /// Pull each output connector's value through its incoming edge.
    fn run_flow_output(&mut self, node: &FlowNode) -> NodeOutcome {
        let pulled: Vec<(ConnectorId, FlowValue)> = self
            .snapshot()
            .connectors_of_kind(&node.id, ConnectorKind::FlowOutput)
            .into_iter()
            .map(|c| {
                let value = self
                    .snapshot()
                    .edge_into(&c.id)
                    .map(|e| self.scope.value_or_empty(&e.source_connector_id))
                    .unwrap_or(FlowValue::Empty);
                (c.id.clone(), value)
            })
            .collect();
        for (connector, value) in pulled {
            self.emit_final_value(&connector, value.clone());
            self.scope.set(connector, value);
        }
        NodeOutcome::Done
    }

    /// Evaluate branches and enable the condition targets behind the active
    /// edges.
    fn run_conditional(&mut self, node: &FlowNode) -> NodeOutcome {
        let decision = match Planner::new(self.snapshot()).decide_branches(node, &self.scope) {
            Ok(decision) => decision,
            Err(err) => {
                return self.node_failed(node, err.to_string());
            }
        };
        tracing::debug!(
            node_id = %node.id,
            active = decision.active_edges.len(),
            took_default = decision.took_default,
            "conditional evaluated"
        );
        let enabled: Vec<ConnectorId> = decision
            .active_edges
            .iter()
            .filter_map(|edge_id| self.snapshot().edge(edge_id))
            .filter_map(|edge| self.snapshot().connector(&edge.target_connector_id))
            .filter(|target| target.kind == ConnectorKind::ConditionTarget)
            .map(|target| target.id.clone())
            .collect();
        self.enabled_targets.extend(enabled);
        NodeOutcome::Done
    }

    async fn run_custom(&mut self, node: &FlowNode) -> NodeOutcome {
        let step = match self.runner.registry.step(&node.kind) {
            Ok(step) => step,
            Err(err) => return self.node_failed(node, err.to_string()),
        };

        self.emit(FlowEvent::node_started(
            self.run_id.as_str(),
            node.id.as_str(),
        ));

        let (args, primary_output) = self.resolve_io(node);
        let ctx = StepContext {
            run_id: self.run_id.clone(),
            node_id: node.id.clone(),
            config: node.config.clone(),
            args,
            scope: self.scope.clone(),
            cancel: self.cancel.clone(),
            event_sender: self.events.clone(),
            primary_output,
            cell: self.cell,
        };

        // Race the step against cancellation; a result arriving after the
        // token fires is discarded, never committed.
        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(StepError::Cancelled),
            result = step.execute(ctx) => result,
        };

        match result {
            Ok(output) => {
                self.commit_outputs(node, output);
                self.emit(FlowEvent::node_finished(
                    self.run_id.as_str(),
                    node.id.as_str(),
                ));
                NodeOutcome::Done
            }
            Err(StepError::Cancelled) => NodeOutcome::Halt(RunStatus::Cancelled),
            Err(err) => self.node_failed(node, err.to_string()),
        }
    }

    /// Resolve a node's input arguments (by input connector name, through
    /// incoming edges) and its primary output connector.
    fn resolve_io(&self, node: &FlowNode) -> (FxHashMap<String, FlowValue>, Option<ConnectorId>) {
        let mut args = FxHashMap::default();
        for input in self
            .snapshot()
            .connectors_of_kind(&node.id, ConnectorKind::NodeInput)
        {
            let value = self
                .snapshot()
                .edge_into(&input.id)
                .map(|e| self.scope.value_or_empty(&e.source_connector_id))
                .unwrap_or(FlowValue::Empty);
            args.insert(input.name.clone(), value);
        }
        let primary_output = self
            .snapshot()
            .connectors_of_kind(&node.id, ConnectorKind::NodeOutput)
            .first()
            .map(|c| c.id.clone());
        (args, primary_output)
    }

    /// Write a step's declared outputs into the scope and announce them.
    fn commit_outputs(&mut self, node: &FlowNode, output: StepOutput) {
        let outputs = self
            .snapshot()
            .connectors_of_kind(&node.id, ConnectorKind::NodeOutput);
        match output {
            StepOutput::Single(value) => {
                if let Some(connector) = outputs.first() {
                    let id = connector.id.clone();
                    self.emit_final_value(&id, value.clone());
                    self.scope.set(id, value);
                } else {
                    tracing::warn!(
                        node_id = %node.id,
                        "step produced a value but node has no output connector"
                    );
                }
            }
            StepOutput::Named(mut values) => {
                let targets: Vec<(ConnectorId, String)> = outputs
                    .iter()
                    .map(|c| (c.id.clone(), c.name.clone()))
                    .collect();
                for (id, name) in targets {
                    if let Some(value) = values.remove(&name) {
                        self.emit_final_value(&id, value.clone());
                        self.scope.set(id, value);
                    }
                }
                for leftover in values.keys() {
                    tracing::warn!(
                        node_id = %node.id,
                        output = %leftover,
                        "step produced a value for an unknown output name"
                    );
                }
            }
            StepOutput::None => {}
        }
    }

    fn node_failed(&mut self, node: &FlowNode, message: String) -> NodeOutcome {
        self.emit(FlowEvent::node_errors(
            self.run_id.as_str(),
            node.id.as_str(),
            vec![message.clone()],
        ));
        self.report_errors.push(
            ErrorEvent::node(
                node.id.as_str(),
                self.run_id.as_str(),
                ErrorDetail::msg(message),
            )
            .with_tag("execution"),
        );
        NodeOutcome::Halt(RunStatus::Failed)
    }

    fn finish(self, status: RunStatus, halted_at: Option<NodeId>) -> RunReport {
        self.emit(FlowEvent::run_transition(self.run_id.as_str(), status));
        tracing::info!(
            run_id = %self.run_id,
            %status,
            ran = self.ran.len(),
            skipped = self.skipped.len(),
            "run finished"
        );
        RunReport {
            run_id: self.run_id,
            status,
            ran_nodes: self.ran,
            skipped_nodes: self.skipped,
            halted_at: if status == RunStatus::Completed {
                None
            } else {
                halted_at
            },
            errors: self.report_errors,
            scope: self.scope,
        }
    }
}
