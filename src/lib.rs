//! # Loomflow: Flow Graph Consistency Engine & Execution Runtime
//!
//! Loomflow keeps a graph of typed nodes, connectors, and edges internally
//! consistent under edits, and executes it — once for interactive runs, many
//! times concurrently for batch evaluation over tabular input.
//!
//! ## Core Concepts
//!
//! - **Snapshot**: the immutable picture of one flow; edits produce new
//!   snapshots, never mutate in place
//! - **Edits**: one primary edit event cascades into derived events under a
//!   static allow-list; an illegal derivation aborts the whole edit
//! - **Behaviors**: a registry maps node kinds to connector shapes, default
//!   configs, and executable steps
//! - **Runs**: the executor drives nodes in dependency order, resolving
//!   inputs through edges and gating conditional branches
//! - **Batches**: rows × repeats independent cell runs over a bounded
//!   worker pool, each stamped with its (row, iteration) identity
//!
//! ## Quick Start
//!
//! ### Editing a flow graph
//!
//! Every mutation goes through the derivation engine, which keeps the graph
//! consistent (removing a node removes its connectors and their edges in
//! the same transaction):
//!
//! ```rust
//! use loomflow::behavior::{BehaviorRegistry, NodeBehavior};
//! use loomflow::edits::{EditEvent, FlowBuilder};
//! use loomflow::types::NodeKind;
//! use loomflow::value::FlowValue;
//!
//! let registry = BehaviorRegistry::new().with_behavior(
//!     NodeBehavior::new(NodeKind::Custom("script".into()))
//!         .with_input("text")
//!         .with_output("result"),
//! );
//!
//! let mut engine = FlowBuilder::new(registry)
//!     .add_node("in", NodeKind::FlowInput)
//!     .add_node("work", NodeKind::Custom("script".into()))
//!     .add_node("out", NodeKind::FlowOutput)
//!     .connect("in", "input", "work", "text")
//!     .connect("work", "result", "out", "output")
//!     .live_value("in", "input", FlowValue::Text("hello".into()))
//!     .into_engine();
//!
//! // Removing the middle node cascades: its connectors and both edges go.
//! let report = engine.submit(EditEvent::remove_node("work")).unwrap();
//! assert!(report.content_changed);
//! assert_eq!(engine.snapshot().edge_count(), 0);
//! ```
//!
//! ### Running a flow
//!
//! Steps are async and stream lifecycle events while they execute:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use loomflow::behavior::{BehaviorRegistry, NodeBehavior, NodeStep, StepContext, StepError, StepOutput};
//! use loomflow::run::{FlowRunner, RunOptions};
//! use loomflow::types::NodeKind;
//! use loomflow::value::FlowValue;
//!
//! struct Upper;
//!
//! #[async_trait]
//! impl NodeStep for Upper {
//!     async fn execute(&self, ctx: StepContext) -> Result<StepOutput, StepError> {
//!         let text = ctx.arg("text").as_text().unwrap_or_default().to_string();
//!         Ok(StepOutput::single(FlowValue::Text(text.to_uppercase())))
//!     }
//! }
//!
//! # async fn demo(snapshot: loomflow::graph::FlowSnapshot) {
//! let registry = BehaviorRegistry::new().with_behavior(
//!     NodeBehavior::new(NodeKind::Custom("upper".into()))
//!         .with_input("text")
//!         .with_output("result")
//!         .with_step(Arc::new(Upper)),
//! );
//!
//! let (events, _lifecycle) = flume::unbounded();
//! let runner = FlowRunner::new(Arc::new(snapshot), Arc::new(registry));
//! let report = runner.run(RunOptions::new(events)).await;
//! assert!(report.is_completed());
//! # }
//! ```
//!
//! ## Module Guide
//!
//! - [`types`] - node/connector kinds, ids, statuses, cell tags
//! - [`value`] - flow values and the declared value-kind policy
//! - [`graph`] - immutable snapshots and the patches that evolve them
//! - [`edits`] - the event derivation engine and graph builder
//! - [`behavior`] - node behavior registry and the step contract
//! - [`planner`] - run order and conditional branch activation
//! - [`run`] - the single-run executor
//! - [`batch`] - table parsing and the batch worker pool
//! - [`event_bus`] - lifecycle event fan-out, sinks, and subscriber streams
//! - [`runtime`] - configuration, space persistence, and the [`runtime::FlowSpace`] façade
//! - [`errors`] - structured error events for run and cell reports
//! - [`telemetry`] - tracing setup and event rendering

pub mod batch;
pub mod behavior;
pub mod edits;
pub mod errors;
pub mod event_bus;
pub mod graph;
pub mod planner;
pub mod run;
pub mod runtime;
pub mod telemetry;
pub mod types;
pub mod utils;
pub mod value;
